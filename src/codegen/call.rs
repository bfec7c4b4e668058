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

use crate::ast::{CowType, Expr};
use crate::errors::CodegenError;
use crate::symbols::Resolution;

use super::{Generator, Target};

impl<'a> Generator<'a> {
    /// Lowers a subroutine call. Arguments are pushed in reverse order (the
    /// last argument first) so the first parameter ends up nearest the
    /// return address; the caller, never the callee, cleans the stack
    /// afterwards (§4.4 "Calling convention" — parameters and returns live
    /// in static storage, not an activation frame, so there is no callee
    /// epilogue to do it).
    pub fn gen_call(&mut self, expr: &Expr, target: Target) -> Result<(), CodegenError> {
        let (callee, args, resolved_type) = match expr {
            Expr::Call {
                target: callee,
                args,
                resolved_type,
            } => (callee.as_ref(), args, resolved_type.clone()),
            _ => unreachable!("gen_call called on non-call expression"),
        };

        if let Expr::Ident(name) = callee {
            if Some(name.as_str()) == self.current_sub.as_deref() {
                return Err(CodegenError::InvalidRecursion {
                    subroutine: name.clone(),
                });
            }
        }

        // Every argument is pushed as a full word via `PUSH H`, value in `L`
        // (the low byte), since the callee's prologue reads the parameter's
        // low byte out of `M` at its stack offset (`codegen::sub`). A 1-byte
        // argument is widened from `A` into `HL` first rather than pushed
        // with `PUSH PSW`, whose low byte is the flags register, not `A`.
        for arg in args.iter().rev() {
            let size = self.symbols.type_size(&self.resolved_type_of(arg));
            if size == 1 {
                self.gen_expr(arg, Target::A)?;
                self.widen_a_to_hl();
                self.emitter.emit("\tPUSH\tH");
            } else {
                self.gen_expr(arg, Target::Hl)?;
                self.emitter.emit("\tPUSH\tH");
            }
        }

        match self.call_kind(callee) {
            CallKind::Direct(mangled) => self.emitter.emit(format!("\tCALL\t{mangled}")),
            CallKind::Indirect => {
                self.gen_expr(callee, Target::Hl)?;
                self.emitter.emit("\tCALL\t_callhl");
            }
        }

        self.cleanup_args(args);

        if let Some(ref typ) = resolved_type {
            if self.symbols.type_size(typ) == 1 && target == Target::A {
                // already narrowed by the callee convention; nothing to do
            } else if self.symbols.type_size(typ) == 1 && target == Target::Hl {
                self.widen_a_to_hl();
            } else if target == Target::A {
                self.narrow_hl_to_a();
            }
        }

        Ok(())
    }

    fn call_kind(&self, callee: &Expr) -> CallKind {
        if let Expr::Ident(name) = callee {
            if let Resolution::Subroutine(_) = self.symbols.resolve(name) {
                return CallKind::Direct(self.emitter.mangle_sub(name));
            }
        }
        CallKind::Indirect
    }

    /// Pops the pushed argument bytes back off the stack. Every argument
    /// occupies one full word regardless of its own width (§5), so the
    /// total is always twice the argument count. Two and four byte totals
    /// use a matching pair of `POP`s so the destination register is never
    /// disturbed; anything larger is cleared by adding straight to `SP`
    /// (§4.4).
    fn cleanup_args(&mut self, args: &[Expr]) {
        let total: u16 = args.len() as u16 * 2;
        match total {
            0 => {}
            2 => self.emitter.emit("\tPOP\tD"),
            4 => {
                self.emitter.emit("\tPOP\tD");
                self.emitter.emit("\tPOP\tD");
            }
            n => {
                self.emitter.emit("\tPUSH\tH");
                self.emitter.emit(format!("\tLXI\tH,{n}"));
                self.emitter.emit("\tDAD\tSP");
                self.emitter.emit("\tSPHL");
                self.emitter.emit("\tPOP\tH");
            }
        }
    }
}

enum CallKind {
    Direct(String),
    Indirect,
}
