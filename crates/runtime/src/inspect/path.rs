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

//! Variable-path queries from the UI.
//!
//! While halted, the command file may carry expressions like `player.hp`,
//! `items[2]`, or `buf[0..8]`. The path is walked over the live typed value
//! through the [`Inspect`] accessors; pointers and `Some` unwrap
//! transparently without consuming path depth. Errors come back as plain
//! sentences destined for the output file, never as panics.

use super::{format_one_line, format_value, short_type_name, Inspect};

/// Struct descents allowed beyond the query root.
pub const MAX_FIELD_DEPTH: usize = 3;
/// Structs wider than this refuse field access.
pub const MAX_ACCESSIBLE_FIELDS: usize = 20;
/// Rendering depth for query responses.
const QUERY_DEPTH: usize = 3;

/// One step of a parsed query path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    Index(usize),
    Range(usize, usize),
}

/// Parses `NAME(.field | [i] | [i..j])*`. The error is the sentence the UI
/// should see.
pub fn parse_query(expr: &str) -> Result<(String, Vec<PathSegment>), String> {
    let expr = expr.trim();
    let bytes = expr.as_bytes();
    let err = || format!("Unknown variable or command: {expr}");

    let mut pos = 0;
    let name = scan_ident(bytes, &mut pos).ok_or_else(err)?;
    let mut segments = Vec::new();

    while pos < bytes.len() {
        match bytes[pos] {
            b'.' => {
                pos += 1;
                let field = scan_ident(bytes, &mut pos).ok_or_else(err)?;
                segments.push(PathSegment::Field(field.to_string()));
            }
            b'[' => {
                pos += 1;
                let lo = scan_number(bytes, &mut pos).ok_or_else(err)?;
                if bytes.get(pos) == Some(&b']') {
                    pos += 1;
                    segments.push(PathSegment::Index(lo));
                } else if bytes.get(pos) == Some(&b'.') && bytes.get(pos + 1) == Some(&b'.') {
                    pos += 2;
                    let hi = scan_number(bytes, &mut pos).ok_or_else(err)?;
                    if bytes.get(pos) != Some(&b']') {
                        return Err(err());
                    }
                    pos += 1;
                    segments.push(PathSegment::Range(lo, hi));
                } else {
                    return Err(err());
                }
            }
            _ => return Err(err()),
        }
    }

    Ok((name.to_string(), segments))
}

fn scan_ident<'a>(bytes: &'a [u8], pos: &mut usize) -> Option<&'a str> {
    let start = *pos;
    if *pos >= bytes.len() || !(bytes[*pos].is_ascii_alphabetic() || bytes[*pos] == b'_') {
        return None;
    }
    while *pos < bytes.len() && (bytes[*pos].is_ascii_alphanumeric() || bytes[*pos] == b'_') {
        *pos += 1;
    }
    std::str::from_utf8(&bytes[start..*pos]).ok()
}

fn scan_number(bytes: &[u8], pos: &mut usize) -> Option<usize> {
    let start = *pos;
    while *pos < bytes.len() && bytes[*pos].is_ascii_digit() {
        *pos += 1;
    }
    if *pos == start {
        return None;
    }
    std::str::from_utf8(&bytes[start..*pos]).ok()?.parse().ok()
}

/// Pointers and `Some` are invisible to path navigation.
fn unwrap_transparent(mut value: &dyn Inspect) -> &dyn Inspect {
    // Bounded so a misbehaving impl cannot loop the debuggee.
    for _ in 0..32 {
        match value.transparent() {
            Some(inner) => value = inner,
            None => break,
        }
    }
    value
}

/// Resolves a query against the captured scope and renders the response
/// body for the output file. `Err` carries the error sentence.
pub fn run_query(
    names: &[&str],
    values: &[&dyn Inspect],
    expr: &str,
) -> Result<String, String> {
    let (name, segments) = parse_query(expr)?;

    let root = match names.iter().position(|n| *n == name) {
        Some(i) => values[i],
        None => return Err(format!("Unknown variable or command: {name}")),
    };

    let mut current = unwrap_transparent(root);
    let mut struct_levels = 0;
    let mut title = name;

    for (i, segment) in segments.iter().enumerate() {
        let type_short = short_type_name(current.type_name());
        match segment {
            PathSegment::Field(field) => {
                if current.field_count() > MAX_ACCESSIBLE_FIELDS {
                    return Err(format!(
                        "Field access refused on {type_short}: more than \
                         {MAX_ACCESSIBLE_FIELDS} fields"
                    ));
                }
                struct_levels += 1;
                if struct_levels > MAX_FIELD_DEPTH {
                    return Err(format!("Path deeper than {MAX_FIELD_DEPTH} levels: {expr}"));
                }
                current = match current.field(field) {
                    Some(value) => value,
                    None => return Err(format!("No field '{field}' on {type_short}")),
                };
                title = field.clone();
            }
            PathSegment::Index(index) => {
                current = match current.element(*index) {
                    Some(value) => value,
                    None => {
                        return Err(format!("Index {index} out of bounds on {type_short}"))
                    }
                };
                title = format!("{title}[{index}]");
            }
            PathSegment::Range(lo, hi) => {
                if i + 1 != segments.len() {
                    return Err(format!("Range must be the last path segment: {expr}"));
                }
                return render_range(current, &title, *lo, *hi);
            }
        }
        current = unwrap_transparent(current);
    }

    Ok(format!(
        "{title}: {}\n{}\n",
        short_type_name(current.type_name()),
        format_value(current, QUERY_DEPTH)
    ))
}

fn render_range(
    seq: &dyn Inspect,
    title: &str,
    lo: usize,
    hi: usize,
) -> Result<String, String> {
    let type_short = short_type_name(seq.type_name());
    let len = match seq.len() {
        Some(len) => len,
        None => return Err(format!("{type_short} is not indexable")),
    };
    let hi = hi.min(len);
    let mut out = format!("{title}[{lo}..{hi}]: {type_short}\n");
    for index in lo..hi {
        match seq.element(index) {
            Some(element) => {
                out.push_str(&format!("[{index}]: {}\n", format_one_line(element, 2)))
            }
            None => break,
        }
    }
    Ok(out)
}
