// idb - instrumentation debugger for Rust
// Copyright (C) 2025 idb contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Lexical scope tracking during the walk.
//!
//! A flat stack of binding names: blocks snapshot the depth on entry and
//! truncate on exit, so a name is in scope at an injection point iff its
//! declaration preceded the point inside a still-open block. Bindings come
//! from real pattern nodes, not from textual scanning.

use tree_sitter::Node;

/// The live binding stack.
#[derive(Debug, Default)]
pub struct ScopeStack {
    names: Vec<String>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.names.len()
    }

    pub fn push(&mut self, name: impl Into<String>) {
        self.names.push(name.into());
    }

    /// Block exit: drop everything declared past the snapshot.
    pub fn truncate(&mut self, depth: usize) {
        self.names.truncate(depth);
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

/// Collects the names a pattern binds, in source order.
///
/// Paths (`Mode::Idle`) and type positions never bind. A plain
/// uppercase-initial identifier in pattern position is almost always a unit
/// variant or constant rather than a binding, and capturing one would not
/// compile at the injection site, so those are skipped too.
pub fn collect_pattern_names(node: Node<'_>, source: &str, out: &mut Vec<String>) {
    match node.kind() {
        "identifier" | "shorthand_field_identifier" => {
            if let Ok(text) = node.utf8_text(source.as_bytes()) {
                if binds_as_variable(text) {
                    out.push(text.to_string());
                }
            }
        }
        // Paths in patterns are matches against constants, not bindings.
        "scoped_identifier" => {}
        _ => {
            let mut cursor = node.walk();
            if cursor.goto_first_child() {
                loop {
                    // Type paths and match-arm guards live inside pattern
                    // nodes but bind nothing.
                    if !matches!(cursor.field_name(), Some("type") | Some("condition")) {
                        collect_pattern_names(cursor.node(), source, out);
                    }
                    if !cursor.goto_next_sibling() {
                        break;
                    }
                }
            }
        }
    }
}

fn binds_as_variable(name: &str) -> bool {
    match name.chars().next() {
        Some(first) => first.is_lowercase() || first == '_',
        None => false,
    }
}
