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

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ast::{CowType, NamedSlot};
use crate::errors::CodegenError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordField {
    pub name: String,
    pub typ: CowType,
    pub offset: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordLayout {
    pub fields: Vec<RecordField>,
    pub size: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubroutineSignature {
    pub params: Vec<NamedSlot>,
    pub returns: Vec<NamedSlot>,
}

/// The read-only symbol & layout oracle: answers type-size queries and
/// resolves identifiers to exactly one category (§3 of the spec). Built by
/// the (external) type checker; the generator never mutates it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolEnvironment {
    pub constants: HashMap<String, i64>,
    pub subroutines: HashMap<String, SubroutineSignature>,
    pub records: HashMap<String, RecordLayout>,
}

/// The one resolution an identifier reference can take, per §3's invariant
/// that "for every referenced identifier, exactly one resolution path is
/// taken". `Variable` is resolved by the generator itself (it owns the
/// live variable table); everything else comes from the oracle.
pub enum Resolution<'a> {
    Constant(i64),
    Subroutine(&'a SubroutineSignature),
    External,
}

impl SymbolEnvironment {
    pub fn resolve(&self, name: &str) -> Resolution<'_> {
        if let Some(&value) = self.constants.get(name) {
            return Resolution::Constant(value);
        }
        if let Some(sig) = self.subroutines.get(name) {
            return Resolution::Subroutine(sig);
        }
        Resolution::External
    }

    pub fn record(&self, name: &str) -> Result<&RecordLayout, CodegenError> {
        self.records
            .get(name)
            .ok_or_else(|| CodegenError::UnknownRecord(name.to_string()))
    }

    pub fn field_offset(&self, record: &str, field: &str) -> Result<u16, CodegenError> {
        let layout = self.record(record)?;
        layout
            .fields
            .iter()
            .find(|f| f.name == field)
            .map(|f| f.offset)
            .ok_or_else(|| CodegenError::MissingFieldOffset {
                record: record.to_string(),
                field: field.to_string(),
            })
    }

    /// Size of a type in bytes. Arrays and records recurse through this
    /// table; everything else is self-describing.
    pub fn type_size(&self, typ: &CowType) -> u16 {
        match typ {
            CowType::Int { width, .. } => *width as u16,
            CowType::Ptr(_) | CowType::Interface => 2,
            CowType::Array { element, count } => self.type_size(element) * (*count as u16),
            CowType::Record(name) => self.records.get(name).map(|r| r.size).unwrap_or(0),
        }
    }
}
