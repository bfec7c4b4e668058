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

use crate::ast::{Program, Stmt};
use crate::errors::CodegenError;

use super::Generator;

impl<'a> Generator<'a> {
    pub fn gen_program(&mut self, program: &Program) -> Result<(), CodegenError> {
        self.emitter.emit("; Generated by cicoder");
        self.emitter.emit("");
        self.emitter.emit("\t.8080");
        self.emitter.emit("");
        self.emitter.emit("\tCSEG");
        self.emitter.emit("");
        self.emitter.emit("\tJMP\t_main");
        self.emitter.emit("");
        self.emitter.emit("\tINCLUDE\t'runtime.mac'");
        self.emitter.emit("");

        // Pre-pass: allocate every global so subroutines can reference
        // them regardless of declaration order (§4.5).
        for stmt in &program.statements {
            if let Stmt::VarDecl { name, typ, .. } = stmt {
                self.allocate_var(name, typ.clone());
            }
        }

        for decl in &program.declarations {
            self.gen_sub(decl)?;
        }

        self.emitter.emit("");
        self.emitter.emit("; Main program");
        self.emitter.emit_label("_main");

        for stmt in &program.statements {
            self.gen_stmt(stmt)?;
        }

        self.emitter.emit("\tJMP\t0");
        self.emitter.emit("");

        self.emit_data_segment();

        Ok(())
    }

    fn emit_data_segment(&mut self) {
        self.emitter.emit_data("; Data segment");
        let label = "_data".to_string();
        self.emitter.emit_data(format!("{label}:"));

        let names: Vec<String> = self.var_order().to_vec();
        for name in names {
            let slot = &self.variables[&name];
            let mangled = self.emitter.mangle_var(&name);
            self.emitter
                .emit_data(format!("{mangled}:\tDS\t{}", slot.size));
        }

        let strings: Vec<(String, String)> = self
            .emitter
            .strings()
            .map(|(v, l)| (v.to_string(), l.to_string()))
            .collect();
        for (value, label) in strings {
            if value.is_empty() {
                self.emitter.emit_data(format!("{label}:\tDB\t0"));
            } else {
                let bytes = value
                    .bytes()
                    .map(|b| b.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                self.emitter.emit_data(format!("{label}:\tDB\t{bytes},0"));
            }
        }

        self.emitter.emit_data("");
        self.emitter.emit_data("\tEND");
    }
}
