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

//! File-level global scan.
//!
//! One pass over the top-level items before any function is walked. Only
//! this file's globals are collected; imports from other files are
//! intentionally not auto-captured. Imports, type aliases, and type
//! definitions are not value declarations and never appear here.

use tree_sitter::Node;

/// Classification of a file-level value declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalKind {
    Static,
    StaticMut,
    ThreadLocal,
    Const,
    PubStatic,
    PubConst,
}

/// A file-level variable or constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Global {
    pub name: String,
    pub kind: GlobalKind,
}

impl Global {
    /// Whether an injected call site can take a plain shared reference to
    /// this global. Thread-locals live behind `with` accessors and mutable
    /// statics behind `unsafe`, so neither is captured.
    pub fn capturable(&self) -> bool {
        matches!(
            self.kind,
            GlobalKind::Static | GlobalKind::Const | GlobalKind::PubStatic | GlobalKind::PubConst
        )
    }
}

/// Scans the top-level items of a parsed file.
pub fn scan_globals(root: Node<'_>, source: &str) -> Vec<Global> {
    let mut globals = Vec::new();
    let mut cursor = root.walk();
    for item in root.named_children(&mut cursor) {
        match item.kind() {
            "static_item" => {
                if let Some(name) = item_name(item, source) {
                    let kind = match (is_public(item), is_mutable(item)) {
                        (_, true) => GlobalKind::StaticMut,
                        (true, false) => GlobalKind::PubStatic,
                        (false, false) => GlobalKind::Static,
                    };
                    globals.push(Global { name, kind });
                }
            }
            "const_item" => {
                if has_include_initializer(item, source) {
                    continue;
                }
                if let Some(name) = item_name(item, source) {
                    let kind =
                        if is_public(item) { GlobalKind::PubConst } else { GlobalKind::Const };
                    globals.push(Global { name, kind });
                }
            }
            "macro_invocation" => {
                if macro_name(item, source) == Some("thread_local") {
                    collect_thread_local_names(item, source, &mut globals);
                }
            }
            _ => {}
        }
    }
    globals
}

fn item_name(item: Node<'_>, source: &str) -> Option<String> {
    let name = item.child_by_field_name("name")?;
    name.utf8_text(source.as_bytes()).ok().map(str::to_string)
}

fn is_public(item: Node<'_>) -> bool {
    child_of_kind(item, "visibility_modifier").is_some()
}

fn is_mutable(item: Node<'_>) -> bool {
    child_of_kind(item, "mutable_specifier").is_some()
}

fn child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    (0..node.child_count()).map(|i| node.child(i).unwrap()).find(|c| c.kind() == kind)
}

fn macro_name<'s>(node: Node<'_>, source: &'s str) -> Option<&'s str> {
    let name = node.child_by_field_name("macro")?;
    name.utf8_text(source.as_bytes()).ok()
}

/// `include!`-style initializers splice foreign code in; the declaration is
/// an import in disguise and is excluded, matching the import-alias rule.
fn has_include_initializer(item: Node<'_>, source: &str) -> bool {
    let Some(value) = item.child_by_field_name("value") else { return false };
    value.kind() == "macro_invocation"
        && macro_name(value, source).is_some_and(|name| name.starts_with("include"))
}

/// Inside `thread_local! { static NAME: ... = ...; }` the token tree is
/// unstructured; every identifier following a `static` token is a name.
fn collect_thread_local_names(node: Node<'_>, source: &str, globals: &mut Vec<Global>) {
    let Some(tokens) = child_of_kind(node, "token_tree") else { return };
    let mut take_next_identifier = false;
    let mut cursor = tokens.walk();
    if !cursor.goto_first_child() {
        return;
    }
    loop {
        let child = cursor.node();
        match child.kind() {
            "static" => take_next_identifier = true,
            "identifier" if take_next_identifier => {
                take_next_identifier = false;
                if let Ok(name) = child.utf8_text(source.as_bytes()) {
                    globals.push(Global {
                        name: name.to_string(),
                        kind: GlobalKind::ThreadLocal,
                    });
                }
            }
            _ => {}
        }
        if !cursor.goto_next_sibling() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> Vec<Global> {
        let mut parser = tree_sitter::Parser::new();
        parser.set_language(&tree_sitter_rust::LANGUAGE.into()).unwrap();
        let tree = parser.parse(source, None).unwrap();
        scan_globals(tree.root_node(), source)
    }

    #[test]
    fn test_kind_classification() {
        let globals = scan(
            "static COUNT: u32 = 0;\n\
             static mut DANGER: u32 = 0;\n\
             pub static SHARED: u32 = 0;\n\
             const LIMIT: usize = 10;\n\
             pub const VERSION: &str = \"1\";\n",
        );
        let kinds: Vec<(&str, GlobalKind)> =
            globals.iter().map(|g| (g.name.as_str(), g.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("COUNT", GlobalKind::Static),
                ("DANGER", GlobalKind::StaticMut),
                ("SHARED", GlobalKind::PubStatic),
                ("LIMIT", GlobalKind::Const),
                ("VERSION", GlobalKind::PubConst),
            ]
        );
    }

    #[test]
    fn test_capturable_excludes_unsafe_and_thread_local() {
        let globals = scan(
            "static OK: u32 = 0;\n\
             static mut NO: u32 = 0;\n\
             thread_local! { static TLS: u32 = 0; }\n",
        );
        let capturable: Vec<&str> =
            globals.iter().filter(|g| g.capturable()).map(|g| g.name.as_str()).collect();
        assert_eq!(capturable, vec!["OK"]);
        assert!(globals.iter().any(|g| g.name == "TLS" && g.kind == GlobalKind::ThreadLocal));
    }

    #[test]
    fn test_imports_and_types_excluded() {
        let globals = scan(
            "use std::collections::HashMap;\n\
             type Alias = u32;\n\
             struct S { x: u32 }\n\
             enum E { A }\n\
             fn f() {}\n",
        );
        assert!(globals.is_empty());
    }

    #[test]
    fn test_include_initializer_excluded() {
        let globals = scan(
            "const GENERATED: &str = include_str!(\"gen.rs\");\n\
             const KEPT: u32 = 1;\n",
        );
        assert_eq!(globals.len(), 1);
        assert_eq!(globals[0].name, "KEPT");
    }

    #[test]
    fn test_thread_local_multiple_names() {
        let globals = scan(
            "thread_local! {\n\
                 static A: u32 = 0;\n\
                 static B: u32 = 0;\n\
             }\n",
        );
        let names: Vec<&str> = globals.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }
}
