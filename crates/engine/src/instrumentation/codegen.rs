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

//! Text generation for injected code.
//!
//! Everything the transformer plants in a source file is built here: the
//! header block and the two hook invocations. The hooks go through the
//! runtime's `break_here!`/`step_here!` macros so an injection stays on one
//! line with names and values aligned by construction.

/// Marker comment identifying an instrumented file; its presence makes a
/// second transformer pass a no-op.
pub const HEADER_MARKER: &str = "---- instrumented by idb (do not edit) ----";

/// Default runtime crate, imported under the `debug` alias.
pub const DEFAULT_RUNTIME_CRATE: &str = "idb_runtime";

/// The header inserted after leading doc comments and inner attributes.
pub fn header(runtime_crate: &str) -> String {
    format!(
        "// {HEADER_MARKER}\n\
         #[allow(unused_imports)]\n\
         use {runtime_crate} as debug;\n"
    )
}

/// Whether a source is our own output; a second transformer pass over it is
/// a no-op.
pub fn has_header_marker(source: &str) -> bool {
    source.contains(HEADER_MARKER)
}

/// Whether the runtime is already imported (for instance by hand); the
/// header edit is skipped then, but instrumentation still proceeds.
pub fn has_runtime_import(source: &str, runtime_crate: &str) -> bool {
    source.contains(&format!("use {runtime_crate} as debug"))
}

/// Replacement for a `BREAK;` marker line.
pub fn break_call(function: &str, file_hash: u32, line: u32, vars: &[String]) -> String {
    format!(
        "debug::break_here!({function:?}, 0x{file_hash:08x}u32, {line}, [{}]);",
        vars.join(", ")
    )
}

/// Step hook injected before a candidate statement.
pub fn step_call(
    function: &str,
    file_hash: u32,
    line: u32,
    line_text: &str,
    vars: &[String],
) -> String {
    format!(
        "debug::step_here!({function:?}, 0x{file_hash:08x}u32, {line}, {:?}, [{}]);",
        line_text.trim(),
        vars.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_break_call_shape() {
        let call = break_call("main", 0x9a3c1f42, 42, &["x".into(), "count".into()]);
        assert_eq!(
            call,
            "debug::break_here!(\"main\", 0x9a3c1f42u32, 42, [x, count]);"
        );
    }

    #[test]
    fn test_break_call_empty_scope() {
        assert_eq!(break_call("f", 1, 2, &[]), "debug::break_here!(\"f\", 0x00000001u32, 2, []);");
    }

    #[test]
    fn test_step_call_escapes_statement_text() {
        let call = step_call("main", 0xdeadbeef, 7, "  let s = \"a\\nb\";  ", &["s".into()]);
        assert_eq!(
            call,
            "debug::step_here!(\"main\", 0xdeadbeefu32, 7, \"let s = \\\"a\\\\nb\\\";\", [s]);"
        );
    }

    #[test]
    fn test_header_and_idempotence_guard() {
        let header = header(DEFAULT_RUNTIME_CRATE);
        assert!(header.contains("use idb_runtime as debug;"));
        assert!(has_header_marker(&header));
        assert!(has_runtime_import(&header, DEFAULT_RUNTIME_CRATE));
        assert!(!has_header_marker("fn main() {}"));
        assert!(!has_runtime_import("fn main() {}", DEFAULT_RUNTIME_CRATE));
    }
}
