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

use crate::ast::{AsmPart, Expr, Stmt};
use crate::errors::CodegenError;

use super::{Generator, Target};

impl<'a> Generator<'a> {
    pub fn gen_stmt(&mut self, stmt: &Stmt) -> Result<(), CodegenError> {
        match stmt {
            Stmt::VarDecl { name, typ, init } => self.gen_var_decl(name, typ, init.as_ref())?,
            // Constants, records and typedefs are pure compile-time
            // bookkeeping already folded into the symbol environment; they
            // emit nothing (§4.5).
            Stmt::ConstDecl | Stmt::RecordDecl | Stmt::TypedefDecl => {}
            Stmt::Assignment { target, value } => self.gen_assignment(target, value)?,
            Stmt::MultiAssignment { targets, value } => self.gen_multi_assignment(targets, value)?,
            Stmt::If {
                condition,
                then_body,
                elseifs,
                else_body,
            } => self.gen_if(condition, then_body, elseifs, else_body.as_deref())?,
            Stmt::While { condition, body } => self.gen_while(condition, body)?,
            Stmt::Loop { body } => self.gen_loop(body)?,
            Stmt::Break => {
                let label = self
                    .break_labels
                    .last()
                    .cloned()
                    .expect("break outside a loop");
                self.emitter.emit(format!("\tJMP\t{label}"));
            }
            Stmt::Continue => {
                let label = self
                    .continue_labels
                    .last()
                    .cloned()
                    .expect("continue outside a loop");
                self.emitter.emit(format!("\tJMP\t{label}"));
            }
            Stmt::Return => {
                self.emitter.emit("\tRET");
            }
            Stmt::Case {
                expr,
                whens,
                else_body,
            } => self.gen_case(expr, whens, else_body.as_deref())?,
            Stmt::ExprStmt(expr) => self.gen_expr(expr, Target::Hl)?,
            Stmt::Asm(parts) => self.gen_asm(parts)?,
            Stmt::NestedSub(decl) => {
                self.nested_sub_queues
                    .last_mut()
                    .expect("nested sub declared outside a subroutine body")
                    .push(decl.clone());
            }
            Stmt::Sub(decl) => self.gen_sub(decl)?,
        }
        Ok(())
    }

    fn gen_var_decl(
        &mut self,
        name: &str,
        typ: &crate::ast::CowType,
        init: Option<&Expr>,
    ) -> Result<(), CodegenError> {
        self.allocate_var(name, typ.clone());
        match init {
            None => Ok(()),
            Some(Expr::ArrayInitializer(elements)) => self.gen_array_init(name, typ, elements),
            Some(value) => self.gen_assignment(&Expr::Ident(name.to_string()), value),
        }
    }

    /// `{1, 2, 3}`-style initializers store one element at a time at
    /// increasing offsets from the array's base address (§4.3).
    fn gen_array_init(
        &mut self,
        name: &str,
        typ: &crate::ast::CowType,
        elements: &[Expr],
    ) -> Result<(), CodegenError> {
        let elem_size = match typ {
            crate::ast::CowType::Array { element, .. } => self.symbols.type_size(element),
            _ => 1,
        };
        let mangled = self.emitter.mangle_var(name);
        for (i, elem) in elements.iter().enumerate() {
            let offset = i as u16 * elem_size;
            if elem_size == 1 {
                self.gen_expr(elem, Target::A)?;
                if offset == 0 {
                    self.emitter.emit(format!("\tSTA\t{mangled}"));
                } else {
                    self.emitter.emit(format!("\tLXI\tH,{mangled}+{offset}"));
                    self.emitter.emit("\tMOV\tM,A");
                }
            } else {
                self.gen_expr(elem, Target::Hl)?;
                if offset == 0 {
                    self.emitter.emit(format!("\tSHLD\t{mangled}"));
                } else {
                    self.emitter.emit("\tXCHG");
                    self.emitter.emit(format!("\tLXI\tH,{mangled}+{offset}"));
                    self.emitter.emit("\tMOV\tM,E");
                    self.emitter.emit("\tINX\tH");
                    self.emitter.emit("\tMOV\tM,D");
                }
            }
        }
        Ok(())
    }

    pub fn gen_assignment(&mut self, target: &Expr, value: &Expr) -> Result<(), CodegenError> {
        let size = self.symbols.type_size(&self.resolved_type_of(target));
        self.store_to_target(target, size, |g, t| g.gen_expr(value, t))
    }

    /// Stores a value — produced by `load_value` into whichever register the
    /// target's width calls for — into `target`. Factored out from
    /// `gen_assignment` so `gen_multi_assignment` can reuse the exact same
    /// per-target-shape store logic without re-lowering the right-hand side
    /// for every target (§4.2 "Assignment", §4.3 "Multi-target assignment").
    fn store_to_target(
        &mut self,
        target: &Expr,
        size: u16,
        load_value: impl FnOnce(&mut Self, Target) -> Result<(), CodegenError>,
    ) -> Result<(), CodegenError> {
        match target {
            Expr::Ident(name) => {
                let mangled = self.emitter.mangle_var(name);
                if size == 1 {
                    load_value(self, Target::A)?;
                    self.emitter.emit(format!("\tSTA\t{mangled}"));
                } else {
                    load_value(self, Target::Hl)?;
                    self.emitter.emit(format!("\tSHLD\t{mangled}"));
                }
                Ok(())
            }
            Expr::ArrayAccess { .. } => {
                self.gen_store_through_address(size, load_value, |g| g.gen_array_address(target))
            }
            Expr::FieldAccess { .. } => {
                self.gen_store_through_address(size, load_value, |g| g.gen_field_address(target))
            }
            Expr::Dereference { pointer, .. } => {
                self.gen_store_through_address(size, load_value, |g| g.gen_expr(pointer, Target::Hl))
            }
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

    /// Computes the value first, stashes it on the stack, computes the
    /// target address, then stores through it — keeps either computation
    /// from clobbering the other regardless of which registers it needs
    /// (§4.2 "Assignment").
    fn gen_store_through_address(
        &mut self,
        size: u16,
        load_value: impl FnOnce(&mut Self, Target) -> Result<(), CodegenError>,
        address_of: impl FnOnce(&mut Self) -> Result<(), CodegenError>,
    ) -> Result<(), CodegenError> {
        if size == 1 {
            load_value(self, Target::A)?;
            self.emitter.emit("\tPUSH\tPSW");
            address_of(self)?;
            self.emitter.emit("\tPOP\tPSW");
            self.emitter.emit("\tMOV\tM,A");
        } else {
            load_value(self, Target::Hl)?;
            self.emitter.emit("\tPUSH\tH");
            address_of(self)?;
            self.emitter.emit("\tXCHG");
            self.emitter.emit("\tPOP\tH");
            self.emitter.emit("\tMOV\tM,L");
            self.emitter.emit("\tINX\tH");
            self.emitter.emit("\tMOV\tM,H");
        }
        Ok(())
    }

    /// `a, b := f()`: the right-hand call is lowered exactly once, leaving
    /// its first return in `HL`; every subsequent target instead `POP\tH`s
    /// its value off the stack, matching the callee's "first return in `HL`,
    /// the rest pushed in declaration order" convention (§4.3 "Multi-target
    /// assignment"). Lowering the call once, rather than once per target,
    /// matters beyond efficiency: a call has side effects, and re-lowering
    /// it per target would run it once per target instead of once overall.
    fn gen_multi_assignment(&mut self, targets: &[Expr], value: &Expr) -> Result<(), CodegenError> {
        self.gen_expr(value, Target::Hl)?;
        for (i, target) in targets.iter().enumerate() {
            if i > 0 {
                self.emitter.emit("\tPOP\tH");
            }
            let size = self.symbols.type_size(&self.resolved_type_of(target));
            self.store_to_target(target, size, |g, t| {
                if t == Target::A {
                    g.narrow_hl_to_a();
                }
                Ok(())
            })?;
        }
        Ok(())
    }

    fn gen_if(
        &mut self,
        condition: &Expr,
        then_body: &[Stmt],
        elseifs: &[(Expr, Vec<Stmt>)],
        else_body: Option<&[Stmt]>,
    ) -> Result<(), CodegenError> {
        let end_label = self.emitter.new_label("ENDIF");
        let mut next_label = if elseifs.is_empty() && else_body.is_none() {
            end_label.clone()
        } else {
            self.emitter.new_label("ELIF")
        };

        self.gen_expr(condition, Target::A)?;
        self.emitter.emit("\tORA\tA");
        self.emitter.emit(format!("\tJZ\t{next_label}"));
        for stmt in then_body {
            self.gen_stmt(stmt)?;
        }
        if next_label != end_label {
            self.emitter.emit(format!("\tJMP\t{end_label}"));
        }

        for (i, (elif_cond, elif_body)) in elseifs.iter().enumerate() {
            self.emitter.emit_label(&next_label);
            let is_last = i + 1 == elseifs.len();
            next_label = if is_last && else_body.is_none() {
                end_label.clone()
            } else {
                self.emitter.new_label("ELIF")
            };
            self.gen_expr(elif_cond, Target::A)?;
            self.emitter.emit("\tORA\tA");
            self.emitter.emit(format!("\tJZ\t{next_label}"));
            for stmt in elif_body {
                self.gen_stmt(stmt)?;
            }
            if next_label != end_label {
                self.emitter.emit(format!("\tJMP\t{end_label}"));
            }
        }

        if let Some(body) = else_body {
            self.emitter.emit_label(&next_label);
            for stmt in body {
                self.gen_stmt(stmt)?;
            }
        }

        self.emitter.emit_label(&end_label);
        Ok(())
    }

    fn gen_while(&mut self, condition: &Expr, body: &[Stmt]) -> Result<(), CodegenError> {
        let while_label = self.emitter.new_label("WHILE");
        let end_label = self.emitter.new_label("ENDW");

        self.emitter.emit_label(&while_label);
        self.gen_expr(condition, Target::A)?;
        self.emitter.emit("\tORA\tA");
        self.emitter.emit(format!("\tJZ\t{end_label}"));

        self.break_labels.push(end_label.clone());
        self.continue_labels.push(while_label.clone());
        for stmt in body {
            self.gen_stmt(stmt)?;
        }
        self.break_labels.pop();
        self.continue_labels.pop();

        self.emitter.emit(format!("\tJMP\t{while_label}"));
        self.emitter.emit_label(&end_label);
        Ok(())
    }

    fn gen_loop(&mut self, body: &[Stmt]) -> Result<(), CodegenError> {
        let loop_label = self.emitter.new_label("LOOP");
        let end_label = self.emitter.new_label("ENDL");

        self.emitter.emit_label(&loop_label);
        self.break_labels.push(end_label.clone());
        self.continue_labels.push(loop_label.clone());
        for stmt in body {
            self.gen_stmt(stmt)?;
        }
        self.break_labels.pop();
        self.continue_labels.pop();

        self.emitter.emit(format!("\tJMP\t{loop_label}"));
        self.emitter.emit_label(&end_label);
        Ok(())
    }

    /// Evaluates the scrutinee exactly once and leaves it pushed on the
    /// stack for the rest of the statement (§4.3 "Case"). Each `when` value
    /// is evaluated in turn and compared against a non-destructive peek of
    /// the pushed scrutinee (`POP H` followed immediately by `PUSH H`, which
    /// reads it without disturbing the stack since neither instruction
    /// touches flags); a match on any value runs that arm's body, and a
    /// miss on every value in an arm falls through to the next one. Only
    /// evaluating the scrutinee once matters beyond efficiency: if it were
    /// re-evaluated per value, a scrutinee with a side effect (e.g. a call)
    /// would run once per comparison instead of once overall.
    fn gen_case(
        &mut self,
        expr: &Expr,
        whens: &[(Vec<Expr>, Vec<Stmt>)],
        else_body: Option<&[Stmt]>,
    ) -> Result<(), CodegenError> {
        let end_label = self.emitter.new_label("ENDC");

        self.gen_expr(expr, Target::Hl)?;
        self.emitter.emit("\tPUSH\tH");

        for (values, body) in whens {
            let arm_label = self.emitter.new_label("WHEN");
            let next_arm_label = self.emitter.new_label("WHEN");

            for value in values {
                self.gen_expr(value, Target::Hl)?;
                self.emitter.emit("\tXCHG");
                self.emitter.emit("\tPOP\tH");
                self.emitter.emit("\tPUSH\tH");

                let skip_label = self.emitter.new_label("L");
                self.emitter.emit("\tMOV\tA,H");
                self.emitter.emit("\tCMP\tD");
                self.emitter.emit(format!("\tJNZ\t{skip_label}"));
                self.emitter.emit("\tMOV\tA,L");
                self.emitter.emit("\tCMP\tE");
                self.emitter.emit_label(&skip_label);
                self.emitter.emit(format!("\tJZ\t{arm_label}"));
            }
            self.emitter.emit(format!("\tJMP\t{next_arm_label}"));

            self.emitter.emit_label(&arm_label);
            self.emitter.emit("\tPOP\tH");
            for stmt in body {
                self.gen_stmt(stmt)?;
            }
            self.emitter.emit(format!("\tJMP\t{end_label}"));
            self.emitter.emit_label(&next_arm_label);
        }

        self.emitter.emit("\tPOP\tH");
        if let Some(body) = else_body {
            for stmt in body {
                self.gen_stmt(stmt)?;
            }
        }

        self.emitter.emit_label(&end_label);
        Ok(())
    }

    /// Inline assembly: literal fragments pass through verbatim; identifier
    /// fragments are substituted by constant value, mangled subroutine
    /// label, or (the default) mangled variable label, in that order; a
    /// non-identifier fragment must fold to a compile-time constant. Parts
    /// are joined with a single tab wherever two adjacent fragments would
    /// otherwise run together, and the whole line gets one leading tab
    /// (§4.3 "Asm").
    fn gen_asm(&mut self, parts: &[AsmPart]) -> Result<(), CodegenError> {
        let mut pieces = Vec::with_capacity(parts.len());
        for part in parts {
            let piece = match part {
                AsmPart::Literal(text) => text.clone(),
                AsmPart::Ident(name) => match self.symbols.resolve(name) {
                    crate::symbols::Resolution::Constant(value) => value.to_string(),
                    crate::symbols::Resolution::Subroutine(_) => self.emitter.mangle_sub(name),
                    crate::symbols::Resolution::External => self.emitter.mangle_var(name),
                },
                AsmPart::Expr(expr) => self.const_eval(expr)?.to_string(),
            };
            pieces.push(piece);
        }

        let mut line = String::from("\t");
        for (i, piece) in pieces.iter().enumerate() {
            if i > 0 {
                let prev_ends_ws = pieces[i - 1].ends_with(char::is_whitespace);
                let cur_starts_ws = piece.starts_with(char::is_whitespace);
                if !prev_ends_ws && !cur_starts_ws && !piece.is_empty() {
                    line.push('\t');
                }
            }
            line.push_str(piece);
        }
        self.emitter.emit(line);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CowType;
    use crate::symbols::{SubroutineSignature, SymbolEnvironment};
    use std::collections::HashMap;

    fn gen() -> Generator<'static> {
        let symbols: &'static SymbolEnvironment = Box::leak(Box::new(SymbolEnvironment::default()));
        Generator::new(symbols)
    }

    #[test]
    fn multi_assignment_lowers_the_call_once_and_pops_later_targets() {
        let mut subroutines = HashMap::new();
        subroutines.insert(
            "div_mod".to_string(),
            SubroutineSignature {
                params: vec![],
                returns: vec![],
            },
        );
        let symbols: &'static SymbolEnvironment = Box::leak(Box::new(SymbolEnvironment {
            subroutines,
            ..Default::default()
        }));
        let mut g = Generator::new(symbols);
        g.allocate_var(
            "q",
            CowType::Int {
                width: 2,
                signed: false,
            },
        );
        g.allocate_var(
            "r",
            CowType::Int {
                width: 2,
                signed: false,
            },
        );
        g.gen_multi_assignment(
            &[
                Expr::Ident("q".to_string()),
                Expr::Ident("r".to_string()),
            ],
            &Expr::Call {
                target: Box::new(Expr::Ident("div_mod".to_string())),
                args: vec![],
                resolved_type: None,
            },
        )
        .unwrap();
        let code = g.emitter.code();
        assert_eq!(
            code.iter().filter(|l| l.as_str() == "\tCALL\tdiv_mod").count(),
            1
        );
        assert_eq!(code.iter().filter(|l| l.as_str() == "\tPOP\tH").count(), 1);
        assert!(code.contains(&"\tSHLD\tv_q".to_string()));
        assert!(code.contains(&"\tSHLD\tv_r".to_string()));
        // The POP for the second target must come after the call and before
        // its store, not before the call (which would pop garbage).
        let call_idx = code.iter().position(|l| l == "\tCALL\tdiv_mod").unwrap();
        let pop_idx = code.iter().position(|l| l == "\tPOP\tH").unwrap();
        let second_store_idx = code.iter().rposition(|l| l == "\tSHLD\tv_r").unwrap();
        assert!(call_idx < pop_idx);
        assert!(pop_idx < second_store_idx);
    }

    #[test]
    fn case_evaluates_scrutinee_exactly_once() {
        let mut subroutines = HashMap::new();
        subroutines.insert(
            "read_sensor".to_string(),
            SubroutineSignature {
                params: vec![],
                returns: vec![],
            },
        );
        let symbols: &'static SymbolEnvironment = Box::leak(Box::new(SymbolEnvironment {
            subroutines,
            ..Default::default()
        }));
        let mut g = Generator::new(symbols);
        g.gen_case(
            &Expr::Call {
                target: Box::new(Expr::Ident("read_sensor".to_string())),
                args: vec![],
                resolved_type: None,
            },
            &[
                (vec![Expr::Number(1)], vec![]),
                (vec![Expr::Number(2)], vec![]),
            ],
            None,
        )
        .unwrap();
        let calls = g
            .emitter
            .code()
            .iter()
            .filter(|l| l.as_str() == "\tCALL\tread_sensor")
            .count();
        assert_eq!(calls, 1);
    }

    #[test]
    fn case_matches_any_value_in_a_multi_value_arm() {
        let mut g = gen();
        g.allocate_var(
            "x",
            CowType::Int {
                width: 2,
                signed: false,
            },
        );
        g.gen_case(
            &Expr::Ident("x".to_string()),
            &[(
                vec![Expr::Number(1), Expr::Number(2), Expr::Number(3)],
                vec![Stmt::ExprStmt(Expr::Number(0))],
            )],
            None,
        )
        .unwrap();
        let code = g.emitter.code();
        // Every value gets its own comparison chain, each of which can jump
        // straight to the (single) arm body on a match.
        assert_eq!(code.iter().filter(|l| l.starts_with("WHEN") && l.ends_with(':')).count(), 2);
        assert!(code.iter().any(|l| l == "\tLXI\tH,2"));
        assert!(code.iter().any(|l| l == "\tLXI\tH,3"));
    }

    #[test]
    fn case_cleans_the_stack_on_every_path() {
        let mut g = gen();
        g.gen_case(&Expr::Number(1), &[(vec![Expr::Number(1)], vec![])], None)
            .unwrap();
        let code = g.emitter.code();
        assert_eq!(code.iter().filter(|l| l.as_str() == "\tPOP\tH").count(), 2);
    }

    #[test]
    fn asm_substitutes_constant_value() {
        let mut constants = HashMap::new();
        constants.insert("MAX".to_string(), 42);
        let symbols: &'static SymbolEnvironment = Box::leak(Box::new(SymbolEnvironment {
            constants,
            ..Default::default()
        }));
        let mut g = Generator::new(symbols);
        g.gen_asm(&[
            AsmPart::Literal("MVI A,".to_string()),
            AsmPart::Ident("MAX".to_string()),
        ])
        .unwrap();
        // A tab is inserted between the two fragments since neither edge is
        // whitespace — only a pre-existing space suppresses it.
        assert_eq!(g.emitter.code(), &["\tMVI A,\t42".to_string()]);
    }

    #[test]
    fn asm_inserts_tab_only_between_non_whitespace_fragments() {
        let mut g = gen();
        g.allocate_var(
            "counter",
            CowType::Int {
                width: 1,
                signed: false,
            },
        );
        g.gen_asm(&[
            AsmPart::Literal("INR".to_string()),
            AsmPart::Literal(" ".to_string()),
            AsmPart::Ident("counter".to_string()),
        ])
        .unwrap();
        assert_eq!(g.emitter.code(), &["\tINR v_counter".to_string()]);
    }

    #[test]
    fn asm_expr_fragment_folds_sizeof_to_a_literal() {
        let mut g = gen();
        g.allocate_var(
            "buf",
            CowType::Array {
                element: Box::new(CowType::Int {
                    width: 1,
                    signed: false,
                }),
                count: 16,
            },
        );
        g.gen_asm(&[
            AsmPart::Literal("DW".to_string()),
            AsmPart::Literal(" ".to_string()),
            AsmPart::Expr(Box::new(Expr::SizeOf(Box::new(Expr::Ident(
                "buf".to_string(),
            ))))),
        ])
        .unwrap();
        assert_eq!(g.emitter.code(), &["\tDW 16".to_string()]);
    }
}
