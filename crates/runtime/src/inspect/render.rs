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

//! Rendering primitives for the value formatter.
//!
//! All output goes through [`Sink`], a capacity-bounded string writer that
//! silently drops any append that would overflow. That is what keeps the
//! formatter total: for any value and any depth it terminates having
//! written bounded bytes, and a runaway rendering degrades to truncation
//! instead of an error surfacing inside the debuggee.

use std::fmt;

use super::Inspect;

/// Byte budget for one formatted value.
pub const FORMAT_LIMIT: usize = 16 * 1024;
/// Strings and byte strings are cut at this many bytes.
pub const STRING_TRUNCATE: usize = 120;
/// Sequences show at most this many elements.
pub const SEQUENCE_LIMIT: usize = 20;
/// Structs with more fields than this collapse to `Name{ ... }`.
pub const STRUCT_COLLAPSE_FIELDS: usize = 16;
/// Cap for the generic `Debug` fallback rendering.
pub const DEBUG_FALLBACK_CAP: usize = 128;

/// A bounded, silently-truncating string writer.
///
/// Each append is all-or-nothing: if it would push the buffer past the
/// limit, the buffer is left unchanged and the append is dropped.
pub struct Sink<'a> {
    buf: &'a mut String,
    limit: usize,
}

impl<'a> Sink<'a> {
    pub fn new(buf: &'a mut String, limit: usize) -> Self {
        Self { buf, limit }
    }

    pub fn push_str(&mut self, s: &str) {
        if str::len(self.buf) + s.len() <= self.limit {
            self.buf.push_str(s);
        }
    }

    /// `write!`-compatible append with the same all-or-nothing contract.
    pub fn write_fmt(&mut self, args: fmt::Arguments<'_>) {
        self.push_str(&args.to_string());
    }

    fn newline_indent(&mut self, indent: usize) {
        self.push_str("\n");
        for _ in 0..indent {
            self.push_str("  ");
        }
    }
}

/// Formats a value to a fresh string; containers span multiple lines,
/// indented two spaces per level.
pub fn format_value(value: &dyn Inspect, max_depth: usize) -> String {
    let mut buf = String::new();
    let mut sink = Sink::new(&mut buf, FORMAT_LIMIT);
    value.render(&mut sink, max_depth, 0);
    buf
}

/// Formats a value and collapses the rendering onto one line, for the state
/// file's per-variable summaries.
pub fn format_one_line(value: &dyn Inspect, max_depth: usize) -> String {
    let rendered = format_value(value, max_depth);
    if !rendered.contains('\n') {
        return rendered;
    }
    rendered.lines().map(str::trim).collect::<Vec<_>>().join(" ")
}

/// Short display name for a type: the last `::` segment with any generic
/// argument suffix stripped, so `alloc::vec::Vec<alloc::string::String>`
/// becomes `Vec`.
pub fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).trim()
}

/// Renders a struct: short type name, then fields in declaration order, each
/// one level deeper. Oversized structs collapse; at depth zero only the
/// name appears.
pub fn render_struct(
    out: &mut Sink<'_>,
    name: &str,
    fields: &[(&str, &dyn Inspect)],
    depth: usize,
    indent: usize,
) {
    if depth == 0 {
        out.push_str(name);
        return;
    }
    if fields.len() > STRUCT_COLLAPSE_FIELDS {
        out.push_str(name);
        out.push_str("{ ... }");
        return;
    }
    out.push_str(name);
    out.push_str("{");
    for (field_name, value) in fields {
        out.newline_indent(indent + 1);
        out.push_str(field_name);
        out.push_str(": ");
        value.render(out, depth - 1, indent + 1);
    }
    out.newline_indent(indent);
    out.push_str("}");
}

/// Renders a sequence through its [`Inspect`] element accessors. Sequences
/// whose elements are bytes render as a quoted byte string.
pub fn render_sequence(out: &mut Sink<'_>, seq: &dyn Inspect, depth: usize, indent: usize) {
    let len = seq.len().unwrap_or(0);

    if len > 0 && seq.element(0).and_then(Inspect::as_byte).is_some() {
        render_byte_string(out, seq, len);
        return;
    }

    if depth == 0 {
        out.push_str(short_type_name(seq.type_name()));
        return;
    }

    out.write_fmt(format_args!("[]({len} items)"));
    let shown = len.min(SEQUENCE_LIMIT);
    for i in 0..shown {
        let Some(element) = seq.element(i) else { break };
        out.newline_indent(indent + 1);
        out.write_fmt(format_args!("[{i}]: "));
        element.render(out, depth - 1, indent + 1);
    }
    if len > SEQUENCE_LIMIT {
        out.newline_indent(indent + 1);
        out.write_fmt(format_args!("... ({len} items total)"));
    }
}

fn render_byte_string(out: &mut Sink<'_>, seq: &dyn Inspect, len: usize) {
    let shown = len.min(STRING_TRUNCATE);
    out.push_str("\"");
    for i in 0..shown {
        let Some(byte) = seq.element(i).and_then(Inspect::as_byte) else { break };
        out.write_fmt(format_args!("{}", std::ascii::escape_default(byte)));
    }
    out.push_str("\"");
    if len > STRING_TRUNCATE {
        out.write_fmt(format_args!("...({len} bytes)"));
    }
}

/// Renders UTF-8 text: quoted, escaped, truncated on a char boundary.
pub fn render_str(out: &mut Sink<'_>, text: &str) {
    if text.len() <= STRING_TRUNCATE {
        out.write_fmt(format_args!("\"{}\"", text.escape_debug()));
        return;
    }
    let mut cut = STRING_TRUNCATE;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    out.write_fmt(format_args!(
        "\"{}\"...({} bytes)",
        text[..cut].escape_debug(),
        text.len()
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_truncates_silently() {
        let mut buf = String::new();
        let mut sink = Sink::new(&mut buf, 8);
        sink.push_str("12345");
        sink.push_str("678");
        // This append would overflow and must be dropped whole.
        sink.push_str("x");
        assert_eq!(buf, "12345678");
    }

    #[test]
    fn test_sink_overflowing_append_leaves_buffer_unchanged() {
        let mut buf = String::new();
        {
            let mut sink = Sink::new(&mut buf, 4);
            sink.push_str("abcdef");
        }
        assert_eq!(buf, "");
        {
            let mut sink = Sink::new(&mut buf, 4);
            sink.push_str("ab");
        }
        assert_eq!(buf, "ab");
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("i32"), "i32");
        assert_eq!(short_type_name("alloc::string::String"), "String");
        assert_eq!(short_type_name("alloc::vec::Vec<alloc::string::String>"), "Vec");
        assert_eq!(short_type_name("core::option::Option<i32>"), "Option");
        assert_eq!(short_type_name("fn(i32) -> i32"), "fn(i32) -> i32");
    }

    #[test]
    fn test_render_str_truncation() {
        let mut buf = String::new();
        let mut sink = Sink::new(&mut buf, FORMAT_LIMIT);
        let long = "a".repeat(200);
        render_str(&mut sink, &long);
        assert!(buf.starts_with('"'));
        assert!(buf.ends_with("...(200 bytes)"));
        // 120 payload bytes plus quotes and suffix.
        assert!(buf.contains(&"a".repeat(120)));
        assert!(!buf.contains(&"a".repeat(121)));
    }

    #[test]
    fn test_render_str_short() {
        let mut buf = String::new();
        let mut sink = Sink::new(&mut buf, FORMAT_LIMIT);
        render_str(&mut sink, "hi\nthere");
        assert_eq!(buf, "\"hi\\nthere\"");
    }
}
