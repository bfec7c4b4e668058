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

/// Registers and bare mnemonics a user identifier must never collide with
/// (§6). Subroutine names only get the `s_` prefix when they clash with one
/// of these, case-insensitively; variables are always mangled.
const RESERVED_BARE_NAMES: &[&str] = &["A", "B", "C", "D", "E", "H", "L", "M", "SP", "PSW"];

/// Buffers the two output streams and hands out collision-free labels and
/// mangled names. One label counter is shared across every prefix so that
/// two call sites can never coincidentally emit the same label (§4.1).
#[derive(Debug, Default)]
pub struct Emitter {
    code: Vec<String>,
    data: Vec<String>,
    label_counter: u32,
    string_literals: HashMap<String, String>,
    string_order: Vec<String>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, line: impl Into<String>) {
        self.code.push(line.into());
    }

    pub fn emit_label(&mut self, label: &str) {
        self.code.push(format!("{label}:"));
    }

    pub fn emit_data(&mut self, line: impl Into<String>) {
        self.data.push(line.into());
    }

    pub fn new_label(&mut self, prefix: &str) -> String {
        self.label_counter += 1;
        format!("{prefix}{}", self.label_counter)
    }

    /// `v_<name>` — variables are always mangled, since `v_` is a reserved
    /// prefix no user identifier may otherwise produce (§6).
    pub fn mangle_var(&self, name: &str) -> String {
        format!("v_{name}")
    }

    /// `s_<name>` only when the upper-cased name collides with a register
    /// or `PSW`/`SP` mnemonic; otherwise the subroutine keeps its own name
    /// so hand-written assembly can call it directly.
    pub fn mangle_sub(&self, name: &str) -> String {
        if RESERVED_BARE_NAMES.contains(&name.to_uppercase().as_str()) {
            format!("s_{name}")
        } else {
            name.to_string()
        }
    }

    /// Interns a string literal, returning its (possibly pre-existing)
    /// label. Equal values always share one label (§4.1, §8).
    pub fn intern_string(&mut self, value: &str) -> String {
        if let Some(label) = self.string_literals.get(value) {
            return label.clone();
        }
        let label = self.new_label("STR");
        self.string_literals.insert(value.to_string(), label.clone());
        self.string_order.push(value.to_string());
        label
    }

    pub fn strings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.string_order
            .iter()
            .map(|value| (value.as_str(), self.string_literals[value].as_str()))
    }

    pub fn code(&self) -> &[String] {
        &self.code
    }

    pub fn data(&self) -> &[String] {
        &self.data
    }
}
