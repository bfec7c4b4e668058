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

use crate::ast::{BinOp, CowType, Expr};
use crate::errors::CodegenError;

use super::{Generator, Target};

impl<'a> Generator<'a> {
    /// Lowers a binary arithmetic/bitwise expression. 1-byte operands are
    /// routed through `A`/`B`; 2-byte operands through `HL`/`DE` (§4.2).
    pub fn gen_binop(
        &mut self,
        op: BinOp,
        left: &Expr,
        right: &Expr,
        resolved_type: &CowType,
        target: Target,
    ) -> Result<(), CodegenError> {
        if self.symbols.type_size(resolved_type) == 1 {
            self.gen_binop_8(op, left, right)?;
            if target == Target::Hl {
                self.widen_a_to_hl();
            }
        } else {
            self.gen_binop_16(op, left, right)?;
            if target == Target::A {
                self.narrow_hl_to_a();
            }
        }
        Ok(())
    }

    fn gen_binop_8(&mut self, op: BinOp, left: &Expr, right: &Expr) -> Result<(), CodegenError> {
        self.gen_expr(left, Target::A)?;
        self.emitter.emit("\tPUSH\tPSW");
        self.gen_expr(right, Target::A)?;
        self.emitter.emit("\tMOV\tB,A");
        self.emitter.emit("\tPOP\tPSW");

        match op {
            BinOp::Add => self.emitter.emit("\tADD\tB"),
            BinOp::Sub => self.emitter.emit("\tSUB\tB"),
            BinOp::And => self.emitter.emit("\tANA\tB"),
            BinOp::Or => self.emitter.emit("\tORA\tB"),
            BinOp::Xor => self.emitter.emit("\tXRA\tB"),
            BinOp::Mul => self.emitter.emit("\tCALL\t_mul8"),
            BinOp::Div => self.emitter.emit("\tCALL\t_div8"),
            BinOp::Mod => self.emitter.emit("\tCALL\t_mod8"),
            BinOp::Shl => self.gen_variable_shift("SHL", "SHLE", true),
            BinOp::Shr => self.gen_variable_shift("SHR", "SHRE", false),
        }
        Ok(())
    }

    /// Open-coded counted-loop variable shift: `B` counts down, `A` (via
    /// `C`) accumulates the shifted value (§4.2).
    fn gen_variable_shift(&mut self, loop_prefix: &str, end_prefix: &str, left: bool) {
        let loop_label = self.emitter.new_label(loop_prefix);
        let end_label = self.emitter.new_label(end_prefix);
        self.emitter.emit_label(&loop_label);
        self.emitter.emit("\tMOV\tC,A");
        self.emitter.emit("\tMOV\tA,B");
        self.emitter.emit("\tORA\tA");
        self.emitter.emit(format!("\tJZ\t{end_label}"));
        self.emitter.emit("\tDCR\tB");
        self.emitter.emit("\tMOV\tA,C");
        if left {
            self.emitter.emit("\tADD\tA");
        } else {
            self.emitter.emit("\tORA\tA");
            self.emitter.emit("\tRAR");
        }
        self.emitter.emit(format!("\tJMP\t{loop_label}"));
        self.emitter.emit_label(&end_label);
    }

    fn gen_binop_16(&mut self, op: BinOp, left: &Expr, right: &Expr) -> Result<(), CodegenError> {
        self.gen_expr(left, Target::Hl)?;
        self.emitter.emit("\tPUSH\tH");
        self.gen_expr(right, Target::Hl)?;
        self.emitter.emit("\tXCHG");
        self.emitter.emit("\tPOP\tH");

        match op {
            BinOp::Add => self.emitter.emit("\tDAD\tD"),
            BinOp::Sub => {
                self.emitter.emit("\tMOV\tA,L");
                self.emitter.emit("\tSUB\tE");
                self.emitter.emit("\tMOV\tL,A");
                self.emitter.emit("\tMOV\tA,H");
                self.emitter.emit("\tSBB\tD");
                self.emitter.emit("\tMOV\tH,A");
            }
            BinOp::And => {
                self.emitter.emit("\tMOV\tA,L");
                self.emitter.emit("\tANA\tE");
                self.emitter.emit("\tMOV\tL,A");
                self.emitter.emit("\tMOV\tA,H");
                self.emitter.emit("\tANA\tD");
                self.emitter.emit("\tMOV\tH,A");
            }
            BinOp::Or => {
                self.emitter.emit("\tMOV\tA,L");
                self.emitter.emit("\tORA\tE");
                self.emitter.emit("\tMOV\tL,A");
                self.emitter.emit("\tMOV\tA,H");
                self.emitter.emit("\tORA\tD");
                self.emitter.emit("\tMOV\tH,A");
            }
            BinOp::Xor => {
                self.emitter.emit("\tMOV\tA,L");
                self.emitter.emit("\tXRA\tE");
                self.emitter.emit("\tMOV\tL,A");
                self.emitter.emit("\tMOV\tA,H");
                self.emitter.emit("\tXRA\tD");
                self.emitter.emit("\tMOV\tH,A");
            }
            BinOp::Mul => self.emitter.emit("\tCALL\t_mul16"),
            BinOp::Div => self.emitter.emit("\tCALL\t_div16"),
            BinOp::Mod => self.emitter.emit("\tCALL\t_mod16"),
            BinOp::Shl => self.emitter.emit("\tCALL\t_shl16"),
            BinOp::Shr => self.emitter.emit("\tCALL\t_shr16"),
        }
        Ok(())
    }
}
