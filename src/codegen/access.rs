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

use super::{Generator, Target};

impl<'a> Generator<'a> {
    /// Leaves the *address* of `array[index]` in `HL`: base + index *
    /// element size, using `_mul16` whenever the element is wider than a
    /// byte (§4.2 "Array access").
    pub fn gen_array_address(&mut self, expr: &Expr) -> Result<(), CodegenError> {
        let (array, index) = match expr {
            Expr::ArrayAccess { array, index, .. } => (array.as_ref(), index.as_ref()),
            _ => unreachable!("gen_array_address called on non-array-access expression"),
        };
        let elem_size = self.array_element_size(array);

        self.gen_expr(index, Target::Hl)?;
        if elem_size > 1 {
            self.emitter.emit("\tPUSH\tH");
            self.emitter.emit(format!("\tLXI\tD,{elem_size}"));
            self.emitter.emit("\tPOP\tH");
            self.emitter.emit("\tCALL\t_mul16");
        }
        self.emitter.emit("\tPUSH\tH");
        self.gen_array_base_address(array)?;
        self.emitter.emit("\tXCHG");
        self.emitter.emit("\tPOP\tH");
        self.emitter.emit("\tDAD\tD");
        Ok(())
    }

    /// Leaves the array's own *address* in `HL` — never its contents. An
    /// identifier names the array's data-segment label directly (§4.2 "Base
    /// is taken from the mangled label when the array expression is an
    /// identifier"); anything else (a nested field/array access or a pointer
    /// expression already yielding an address) is reached through the normal
    /// lowering.
    fn gen_array_base_address(&mut self, array: &Expr) -> Result<(), CodegenError> {
        match array {
            Expr::Ident(name) if self.variables.contains_key(name) => {
                let mangled = self.emitter.mangle_var(name);
                self.emitter.emit(format!("\tLXI\tH,{mangled}"));
                Ok(())
            }
            Expr::Ident(name) => {
                self.emitter.emit(format!("\tLXI\tH,{name}"));
                Ok(())
            }
            other => self.gen_expr(other, Target::Hl),
        }
    }

    pub fn gen_array_access(&mut self, expr: &Expr, target: Target) -> Result<(), CodegenError> {
        let size = self.symbols.type_size(&self.resolved_type_of(expr));
        self.gen_array_address(expr)?;
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

    fn array_element_size(&self, array: &Expr) -> u16 {
        match self.resolved_type_of(array) {
            CowType::Array { element, .. } => self.symbols.type_size(&element),
            CowType::Ptr(inner) => self.symbols.type_size(&inner),
            _ => 1,
        }
    }

    /// Leaves the address of `record.field` in `HL`: the record's own
    /// address plus the field's fixed offset (§4.2 "Field access").
    pub fn gen_field_address(&mut self, expr: &Expr) -> Result<(), CodegenError> {
        let (record, field) = match expr {
            Expr::FieldAccess { record, field, .. } => (record.as_ref(), field.as_str()),
            _ => unreachable!("gen_field_address called on non-field-access expression"),
        };
        let record_name = self.record_type_name(record)?;
        let offset = self.symbols.field_offset(&record_name, field)?;

        self.gen_record_address(record)?;
        if offset != 0 {
            self.emitter.emit(format!("\tLXI\tD,{offset}"));
            self.emitter.emit("\tDAD\tD");
        }
        Ok(())
    }

    pub fn gen_field_access(&mut self, expr: &Expr, target: Target) -> Result<(), CodegenError> {
        let size = self.symbols.type_size(&self.resolved_type_of(expr));
        self.gen_field_address(expr)?;
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

    /// A record operand is always addressed, never loaded by value — it is
    /// either a plain identifier (its own address) or a nested field/array
    /// access that already resolves to an address.
    fn gen_record_address(&mut self, record: &Expr) -> Result<(), CodegenError> {
        match record {
            Expr::Ident(name) => {
                let mangled = self.emitter.mangle_var(name);
                self.emitter.emit(format!("\tLXI\tH,{mangled}"));
                Ok(())
            }
            Expr::FieldAccess { .. } => self.gen_field_address(record),
            Expr::ArrayAccess { .. } => self.gen_array_address(record),
            Expr::Dereference { pointer, .. } => self.gen_expr(pointer, Target::Hl),
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

    fn record_type_name(&self, record: &Expr) -> Result<String, CodegenError> {
        match self.resolved_type_of(record) {
            CowType::Record(name) => Ok(name),
            other => Err(CodegenError::UnknownRecord(format!("{other:?}"))),
        }
    }
}
