/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

pub mod ast;
pub mod codegen;
pub mod emitter;
pub mod errors;
pub mod file_reader;
pub mod symbols;

use serde::{Deserialize, Serialize};

use ast::Program;
use symbols::SymbolEnvironment;

/// The on-disk artifact this crate consumes: a type-checked program paired
/// with the symbol environment its (external) front end resolved. Lexing,
/// parsing, preprocessing and type checking all happen upstream of this
/// crate and are out of scope here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledUnit {
    pub program: Program,
    pub symbols: SymbolEnvironment,
}

/// Lowers a compiled unit straight to 8080 assembly text.
pub fn generate(unit: &CompiledUnit) -> Result<String, errors::CodegenError> {
    codegen::generate(&unit.program, &unit.symbols)
}
