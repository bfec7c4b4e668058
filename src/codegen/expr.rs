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

use crate::ast::{CowType, Expr, UnaryOp};
use crate::errors::CodegenError;
use crate::symbols::Resolution;

use super::{Generator, Target};

impl<'a> Generator<'a> {
    /// Lowers `expr`, leaving its value in `target` on exit (§4.2).
    pub fn gen_expr(&mut self, expr: &Expr, target: Target) -> Result<(), CodegenError> {
        match expr {
            Expr::Number(value) => self.gen_number_literal(*value, target),
            Expr::Str(value) => self.gen_string_literal(value, target),
            Expr::Nil => self.gen_nil_literal(target),
            Expr::Ident(name) => self.gen_identifier(name, target),
            Expr::Unary { op, operand, .. } => self.gen_unary(*op, operand, target)?,
            Expr::Binary {
                op, left, right, ..
            } => {
                let resolved = self.resolved_type_of(expr);
                self.gen_binop(*op, left, right, &resolved, target)?
            }
            Expr::Compare { op, left, right } => {
                self.gen_comparison(*op, left, right)?;
                if target == Target::Hl {
                    self.widen_a_to_hl();
                }
            }
            Expr::Logical { op, left, right } => {
                self.gen_logical(*op, left, right)?;
                if target == Target::Hl {
                    self.widen_a_to_hl();
                }
            }
            Expr::Not(operand) => {
                self.gen_not(operand)?;
                if target == Target::Hl {
                    self.widen_a_to_hl();
                }
            }
            Expr::Cast { expr: inner, .. } => self.gen_expr(inner, target)?,
            Expr::ArrayAccess { .. } => self.gen_array_access(expr, target)?,
            Expr::FieldAccess { .. } => self.gen_field_access(expr, target)?,
            Expr::Dereference { pointer, .. } => self.gen_dereference(expr, pointer, target)?,
            Expr::AddressOf(operand) => self.gen_address_of(operand)?,
            Expr::Call { .. } => self.gen_call(expr, target)?,
            Expr::SizeOf(operand) => self.gen_size_of(operand, target),
            Expr::BytesOf(operand) => self.gen_bytes_of(operand, target),
            Expr::Next { pointer, .. } => self.gen_next(pointer, target)?,
            Expr::Prev { pointer, .. } => self.gen_prev(pointer, target)?,
            Expr::ArrayInitializer(_) => {
                // Only valid as a variable initializer; handled directly by
                // `gen_var_decl` and never reached through `gen_expr`.
            }
        }
        Ok(())
    }

    fn gen_number_literal(&mut self, value: i64, target: Target) {
        match target {
            Target::A => self
                .emitter
                .emit(format!("\tMVI\tA,{}", (value as i64 & 0xFF) as u8)),
            Target::Hl => self
                .emitter
                .emit(format!("\tLXI\tH,{}", (value as i64 & 0xFFFF) as u16)),
        }
    }

    fn gen_string_literal(&mut self, value: &str, _target: Target) {
        let label = self.emitter.intern_string(value);
        self.emitter.emit(format!("\tLXI\tH,{label}"));
    }

    fn gen_nil_literal(&mut self, target: Target) {
        match target {
            Target::A => self.emitter.emit("\tXRA\tA"),
            Target::Hl => self.emitter.emit("\tLXI\tH,0"),
        }
    }

    /// Resolves an identifier reference to exactly one category and emits
    /// the matching load (§3's invariant, §4.2 "Identifiers").
    fn gen_identifier(&mut self, name: &str, target: Target) {
        if let Some(slot) = self.variables.get(name).cloned() {
            let mangled = self.emitter.mangle_var(name);
            if slot.size == 1 {
                self.emitter.emit(format!("\tLDA\t{mangled}"));
                if target == Target::Hl {
                    self.widen_a_to_hl();
                }
            } else {
                self.emitter.emit(format!("\tLHLD\t{mangled}"));
                if target == Target::A {
                    self.narrow_hl_to_a();
                }
            }
            return;
        }

        match self.symbols.resolve(name) {
            Resolution::Constant(value) => self.gen_number_literal(value, target),
            Resolution::Subroutine(_) => {
                let mangled = self.emitter.mangle_sub(name);
                self.emitter.emit(format!("\tLXI\tH,{mangled}"));
                if target == Target::A {
                    self.narrow_hl_to_a();
                }
            }
            // Unresolvable identifier: fall back to an external-symbol
            // reference rather than failing (§7's deliberate escape hatch).
            Resolution::External => {
                self.emitter.emit(format!("\tLXI\tH,{name}"));
                if target == Target::A {
                    self.narrow_hl_to_a();
                }
            }
        }
    }

    fn gen_unary(&mut self, op: UnaryOp, operand: &Expr, target: Target) -> Result<(), CodegenError> {
        self.gen_expr(operand, target)?;
        match (op, target) {
            (UnaryOp::Neg, Target::A) => {
                self.emitter.emit("\tCMA");
                self.emitter.emit("\tINR\tA");
            }
            (UnaryOp::Neg, Target::Hl) => {
                self.emitter.emit("\tMOV\tA,L");
                self.emitter.emit("\tCMA");
                self.emitter.emit("\tMOV\tL,A");
                self.emitter.emit("\tMOV\tA,H");
                self.emitter.emit("\tCMA");
                self.emitter.emit("\tMOV\tH,A");
                self.emitter.emit("\tINX\tH");
            }
            (UnaryOp::Not, Target::A) => self.emitter.emit("\tCMA"),
            (UnaryOp::Not, Target::Hl) => {
                self.emitter.emit("\tMOV\tA,L");
                self.emitter.emit("\tCMA");
                self.emitter.emit("\tMOV\tL,A");
                self.emitter.emit("\tMOV\tA,H");
                self.emitter.emit("\tCMA");
                self.emitter.emit("\tMOV\tH,A");
            }
        }
        Ok(())
    }

    /// Dereference: load the pointer into `HL`, then read through it
    /// (assumes little-endian in-memory layout for 2-byte values, §4.2).
    fn gen_dereference(
        &mut self,
        expr: &Expr,
        pointer: &Expr,
        target: Target,
    ) -> Result<(), CodegenError> {
        self.gen_expr(pointer, Target::Hl)?;
        let size = self.symbols.type_size(&self.resolved_type_of(expr));
        if size == 1 {
            self.emitter.emit("\tMOV\tA,M");
            if target == Target::Hl {
                self.widen_a_to_hl();
            }
        } else {
            self.emitter.emit("\tMOV\tE,M");
            self.emitter.emit("\tINX\tH");
            self.emitter.emit("\tMOV\tD,M");
            self.emitter.emit("\tXCHG");
            if target == Target::A {
                self.narrow_hl_to_a();
            }
        }
        Ok(())
    }

    /// `&operand`: only identifiers, field accesses and array accesses can
    /// be addressed (§4.2 "Address-of", §7).
    fn gen_address_of(&mut self, operand: &Expr) -> Result<(), CodegenError> {
        match operand {
            Expr::Ident(name) => {
                let mangled = self.emitter.mangle_var(name);
                self.emitter.emit(format!("\tLXI\tH,{mangled}"));
                Ok(())
            }
            Expr::FieldAccess { .. } => self.gen_field_address(operand),
            Expr::ArrayAccess { .. } => self.gen_array_address(operand),
            other => Err(CodegenError::UnsupportedAddressOf {
                operand_kind: format!("{other:?}")
                    .split(['(', '{'])
                    .next()
                    .unwrap_or("expression")
                    .trim()
                    .to_string(),
            }),
        }
    }

    fn gen_next(&mut self, pointer: &Expr, target: Target) -> Result<(), CodegenError> {
        self.gen_expr(pointer, Target::Hl)?;
        let elem_size = self.pointee_size(pointer);
        if elem_size == 1 {
            self.emitter.emit("\tINX\tH");
        } else {
            self.emitter.emit(format!("\tLXI\tD,{elem_size}"));
            self.emitter.emit("\tDAD\tD");
        }
        if target == Target::A {
            self.narrow_hl_to_a();
        }
        Ok(())
    }

    fn gen_prev(&mut self, pointer: &Expr, target: Target) -> Result<(), CodegenError> {
        self.gen_expr(pointer, Target::Hl)?;
        let elem_size = self.pointee_size(pointer);
        if elem_size == 1 {
            self.emitter.emit("\tDCX\tH");
        } else {
            self.emitter.emit(format!("\tLXI\tD,-{elem_size}"));
            self.emitter.emit("\tDAD\tD");
        }
        if target == Target::A {
            self.narrow_hl_to_a();
        }
        Ok(())
    }

    fn pointee_size(&self, pointer: &Expr) -> u16 {
        match self.resolved_type_of(pointer) {
            CowType::Ptr(inner) => self.symbols.type_size(&inner),
            _ => 1,
        }
    }

    /// `SizeOf` returns an array's *element count*, never its byte size —
    /// the asymmetry with `BytesOf` is intentional and pinned by tests
    /// (§9 "SizeOf vs BytesOf").
    fn gen_size_of(&mut self, operand: &Expr, target: Target) {
        let count = match self.resolved_type_of(operand) {
            CowType::Array { count, .. } => count as i64,
            _ => 0,
        };
        self.gen_number_literal(count, target);
    }

    fn gen_bytes_of(&mut self, operand: &Expr, target: Target) {
        let size = self.symbols.type_size(&self.resolved_type_of(operand)) as i64;
        self.gen_number_literal(size, target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolEnvironment;

    fn gen() -> Generator<'static> {
        let symbols: &'static SymbolEnvironment = Box::leak(Box::new(SymbolEnvironment::default()));
        Generator::new(symbols)
    }

    #[test]
    fn one_byte_immediate_is_masked() {
        let mut g = gen();
        g.gen_expr(&Expr::Number(0x1FF), Target::A).unwrap();
        assert_eq!(g.emitter.code(), &["\tMVI\tA,255"]);
    }

    #[test]
    fn two_byte_immediate_is_masked() {
        let mut g = gen();
        g.gen_expr(&Expr::Number(0x1_0001), Target::Hl).unwrap();
        assert_eq!(g.emitter.code(), &["\tLXI\tH,1"]);
    }

    #[test]
    fn address_of_non_lvalue_is_rejected() {
        let mut g = gen();
        let err = g
            .gen_address_of(&Expr::Number(1))
            .expect_err("address-of a literal must fail");
        assert!(matches!(err, CodegenError::UnsupportedAddressOf { .. }));
    }

    #[test]
    fn size_of_and_bytes_of_differ_for_arrays() {
        let mut g = gen();
        let arr = Expr::Ident("arr".to_string());
        g.allocate_var(
            "arr",
            CowType::Array {
                element: Box::new(CowType::Int {
                    width: 2,
                    signed: false,
                }),
                count: 4,
            },
        );
        g.gen_expr(&Expr::SizeOf(Box::new(arr.clone())), Target::Hl)
            .unwrap();
        assert_eq!(g.emitter.code().last().unwrap(), "\tLXI\tH,4");
        g.gen_expr(&Expr::BytesOf(Box::new(arr)), Target::Hl)
            .unwrap();
        assert_eq!(g.emitter.code().last().unwrap(), "\tLXI\tH,8");
    }
}
