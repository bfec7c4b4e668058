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

mod access;
mod binop;
mod call;
mod compare;
mod expr;
mod program;
mod stmt;
mod sub;

use std::collections::HashMap;

use crate::ast::{BinOp, CowType, Expr, Program, UnaryOp};
use crate::emitter::Emitter;
use crate::errors::CodegenError;
use crate::symbols::{Resolution, SymbolEnvironment};

/// Destination a lowered expression's value must end up in: `A` holds only
/// the low byte, `HL` holds the full 16-bit (zero-extended) value (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    A,
    Hl,
}

#[derive(Debug, Clone)]
pub struct VarSlot {
    pub typ: CowType,
    pub size: u16,
}

/// Owns every piece of mutable state the lowering engine needs: the live
/// variable table, the break/continue label stacks, and a queue of nested
/// subroutines pending emission. Passed by reference everywhere instead of
/// living as ambient global state (§9 "Implicit global state").
pub struct Generator<'a> {
    pub emitter: Emitter,
    pub symbols: &'a SymbolEnvironment,
    pub variables: HashMap<String, VarSlot>,
    /// Insertion order of `variables`, since the data segment must list
    /// allocations in the order they occurred (§4.5) and a `HashMap`
    /// doesn't remember that.
    var_order: Vec<String>,
    break_labels: Vec<String>,
    continue_labels: Vec<String>,
    /// One queue per currently-open `gen_sub` call. A nested subroutine
    /// discovered while lowering the body of the subroutine at the top of
    /// this stack is pushed onto that frame, never into a single shared
    /// field — this is what makes re-entrant nested-subroutine lowering
    /// safe (§9 "Nested subroutine queue").
    nested_sub_queues: Vec<Vec<crate::ast::SubDecl>>,
    current_sub: Option<String>,
}

impl<'a> Generator<'a> {
    pub fn new(symbols: &'a SymbolEnvironment) -> Self {
        Self {
            emitter: Emitter::new(),
            symbols,
            variables: HashMap::new(),
            var_order: Vec::new(),
            break_labels: Vec::new(),
            continue_labels: Vec::new(),
            nested_sub_queues: Vec::new(),
            current_sub: None,
        }
    }

    pub fn allocate_var(&mut self, name: &str, typ: CowType) -> &VarSlot {
        let size = self.symbols.type_size(&typ);
        if !self.variables.contains_key(name) {
            self.var_order.push(name.to_string());
        }
        self.variables
            .entry(name.to_string())
            .or_insert(VarSlot { typ, size })
    }

    pub fn var_order(&self) -> &[String] {
        &self.var_order
    }

    /// Reconstructs the resolved type of an expression. Compound nodes
    /// carry their own `resolved_type` straight from the type checker;
    /// leaves that don't (identifiers, literals) derive it from the live
    /// variable table or a sensible default, mirroring how the front end
    /// attaches a resolved type to every expression node.
    pub fn resolved_type_of(&self, expr: &crate::ast::Expr) -> CowType {
        use crate::ast::Expr;
        match expr {
            Expr::Number(_) => CowType::Int {
                width: 2,
                signed: true,
            },
            Expr::Nil => CowType::Int {
                width: 2,
                signed: false,
            },
            Expr::Str(_) => CowType::Ptr(Box::new(CowType::Int {
                width: 1,
                signed: false,
            })),
            Expr::Ident(name) => self
                .variables
                .get(name)
                .map(|v| v.typ.clone())
                .unwrap_or(CowType::Int {
                    width: 2,
                    signed: true,
                }),
            Expr::Unary { resolved_type, .. }
            | Expr::Binary { resolved_type, .. }
            | Expr::Cast { resolved_type, .. }
            | Expr::ArrayAccess { resolved_type, .. }
            | Expr::FieldAccess { resolved_type, .. }
            | Expr::Dereference { resolved_type, .. }
            | Expr::Next { resolved_type, .. }
            | Expr::Prev { resolved_type, .. } => resolved_type.clone(),
            Expr::Compare { .. } | Expr::Logical { .. } | Expr::Not(_) => CowType::Int {
                width: 1,
                signed: false,
            },
            Expr::Call { resolved_type, .. } => resolved_type.clone().unwrap_or(CowType::Int {
                width: 2,
                signed: true,
            }),
            Expr::AddressOf(inner) => CowType::Ptr(Box::new(self.resolved_type_of(inner))),
            Expr::SizeOf(_) | Expr::BytesOf(_) => CowType::Int {
                width: 2,
                signed: false,
            },
            Expr::ArrayInitializer(_) => CowType::Int {
                width: 2,
                signed: false,
            },
        }
    }

    /// Folds an expression to a compile-time integer constant. Used only by
    /// inline-assembly sub-expression fragments (§4.3 "Asm"), which are
    /// substituted as literal text rather than lowered to instructions.
    pub fn const_eval(&self, expr: &Expr) -> Result<i64, CodegenError> {
        let unsupported = |kind: &str| {
            Err(CodegenError::NonConstantAsmExpr {
                kind: kind.to_string(),
            })
        };
        match expr {
            Expr::Number(value) => Ok(*value),
            Expr::Nil => Ok(0),
            Expr::Ident(name) => match self.symbols.resolve(name) {
                Resolution::Constant(value) => Ok(value),
                _ => unsupported(&format!("identifier \"{name}\"")),
            },
            Expr::Unary { op, operand, .. } => {
                let value = self.const_eval(operand)?;
                Ok(match op {
                    UnaryOp::Neg => -value,
                    UnaryOp::Not => !value,
                })
            }
            Expr::Binary {
                op, left, right, ..
            } => {
                let l = self.const_eval(left)?;
                let r = self.const_eval(right)?;
                Ok(match op {
                    BinOp::Add => l + r,
                    BinOp::Sub => l - r,
                    BinOp::And => l & r,
                    BinOp::Or => l | r,
                    BinOp::Xor => l ^ r,
                    BinOp::Mul => l * r,
                    BinOp::Div => l / r,
                    BinOp::Mod => l % r,
                    BinOp::Shl => l << r,
                    BinOp::Shr => l >> r,
                })
            }
            Expr::SizeOf(operand) => Ok(match self.resolved_type_of(operand) {
                CowType::Array { count, .. } => count as i64,
                _ => 0,
            }),
            Expr::BytesOf(operand) => {
                Ok(self.symbols.type_size(&self.resolved_type_of(operand)) as i64)
            }
            other => unsupported(
                format!("{other:?}")
                    .split(['(', '{'])
                    .next()
                    .unwrap_or("expression")
                    .trim(),
            ),
        }
    }

    fn widen_a_to_hl(&mut self) {
        self.emitter.emit("\tMOV\tL,A");
        self.emitter.emit("\tMVI\tH,0");
    }

    fn narrow_hl_to_a(&mut self) {
        self.emitter.emit("\tMOV\tA,L");
    }

    fn finish(self) -> String {
        let mut lines = Vec::new();
        lines.extend(self.emitter.code().iter().cloned());
        lines.extend(self.emitter.data().iter().cloned());
        lines.join("\n")
    }
}

/// Entry point: lower a whole type-checked program against its symbol
/// environment into a single 8080 assembly text stream (§4.5).
pub fn generate(program: &Program, symbols: &SymbolEnvironment) -> Result<String, CodegenError> {
    let mut gen = Generator::new(symbols);
    gen.gen_program(program)?;
    Ok(gen.finish())
}
