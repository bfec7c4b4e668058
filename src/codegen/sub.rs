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

use crate::ast::SubDecl;
use crate::errors::CodegenError;

use super::Generator;

impl<'a> Generator<'a> {
    /// Lowers one subroutine. Parameters and returns are global storage
    /// slots, not an activation frame (§4.4): the prologue reads each
    /// argument off the stack at a fixed `SP`-relative offset without
    /// popping it (the caller, not the callee, balances the stack), and the
    /// epilogue loads the first return value into `HL` before `RET` so
    /// callers can treat a call like any other expression.
    pub fn gen_sub(&mut self, decl: &SubDecl) -> Result<(), CodegenError> {
        let label = decl
            .extern_name
            .clone()
            .unwrap_or_else(|| self.emitter.mangle_sub(&decl.name));

        // A body-less declaration is a forward declaration: it exists so
        // other subroutines can reference the name ahead of its definition,
        // and emits nothing itself. `EXTRN` is not one of the directives
        // this dialect supports (§6); the name simply isn't defined until
        // its real declaration is lowered.
        let body = match &decl.body {
            None => return Ok(()),
            Some(body) => body,
        };

        for param in &decl.params {
            self.allocate_var(&param.name, param.typ.clone());
        }
        for ret in &decl.returns {
            self.allocate_var(&ret.name, ret.typ.clone());
        }

        self.emitter.emit("");
        self.emitter.emit(format!("; Subroutine {}", decl.name));
        if decl.extern_name.is_some() {
            self.emitter.emit(format!("\tPUBLIC\t{label}"));
        }
        self.emitter.emit_label(&label);

        // Every argument occupies one full word on the stack regardless of
        // its own width (§5 "Arguments occupy contiguous words"), at
        // `SP + 2 + 2k` — the return address takes the first two bytes.
        for (k, param) in decl.params.iter().enumerate() {
            let offset = 2 + 2 * k as u16;
            let mangled = self.emitter.mangle_var(&param.name);
            self.emitter.emit(format!("\tLXI\tH,{offset}"));
            self.emitter.emit("\tDAD\tSP");
            self.emitter.emit("\tMOV\tE,M");
            self.emitter.emit("\tINX\tH");
            self.emitter.emit("\tMOV\tD,M");
            if self.symbols.type_size(&param.typ) == 1 {
                self.emitter.emit("\tMOV\tA,E");
                self.emitter.emit(format!("\tSTA\t{mangled}"));
            } else {
                self.emitter.emit("\tXCHG");
                self.emitter.emit(format!("\tSHLD\t{mangled}"));
            }
        }

        let outer_sub = self.current_sub.replace(decl.name.clone());
        self.nested_sub_queues.push(Vec::new());

        for stmt in body {
            self.gen_stmt(stmt)?;
        }

        if let Some(first_return) = decl.returns.first() {
            let mangled = self.emitter.mangle_var(&first_return.name);
            if self.symbols.type_size(&first_return.typ) == 1 {
                self.emitter.emit(format!("\tLDA\t{mangled}"));
                self.widen_a_to_hl();
            } else {
                self.emitter.emit(format!("\tLHLD\t{mangled}"));
            }
        }
        self.emitter.emit("\tRET");

        let nested = self.nested_sub_queues.pop().unwrap_or_default();
        self.current_sub = outer_sub;

        for nested_decl in nested {
            self.gen_sub(&nested_decl)?;
        }

        Ok(())
    }
}
