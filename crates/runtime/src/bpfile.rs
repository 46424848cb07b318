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

//! Breakpoint-file parsing.
//!
//! The breakpoint file uses the target language's own literal syntax:
//!
//! ```text
//! Breakpoints {
//!     breakpoints: [
//!         Breakpoint { file: "src/main.rs", line: 42 },
//!         Breakpoint { file: "src/util.rs", line: 7, enabled: false },
//!     ],
//! }
//! ```
//!
//! It is lexed with `proc-macro2` (the ecosystem Rust tokenizer, which also
//! strips comments and tolerates arbitrary whitespace) and consumed by a
//! small state machine. Unknown fields are skipped, a missing `enabled`
//! defaults to true, trailing commas are fine, and an entry without both
//! `file` and `line` is dropped with a diagnostic rather than failing the
//! whole file.

use eyre::{eyre, Result};
use proc_macro2::{Delimiter, TokenStream, TokenTree};

use idb_common::Breakpoint;

/// Parses the breakpoint-file text into entries, in file order.
///
/// Only a tokenization failure is an error; the caller keeps its previous
/// set in that case. Capacity enforcement is the store's job.
pub fn parse_breakpoint_file(text: &str) -> Result<Vec<Breakpoint>> {
    let stream: TokenStream =
        text.parse().map_err(|e| eyre!("breakpoint file does not tokenize: {e}"))?;
    let mut entries = Vec::new();
    collect_from_stream(stream, &mut entries);
    Ok(entries)
}

/// Finds every `breakpoints: [ ... ]` list, recursing through brace and
/// paren groups so the surrounding `Breakpoints { ... }` wrapper (or its
/// absence) does not matter.
fn collect_from_stream(stream: TokenStream, entries: &mut Vec<Breakpoint>) {
    let tokens: Vec<TokenTree> = stream.into_iter().collect();
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            TokenTree::Ident(ident) if ident == "breakpoints" => {
                if let (Some(TokenTree::Punct(punct)), Some(TokenTree::Group(group))) =
                    (tokens.get(i + 1), tokens.get(i + 2))
                {
                    if punct.as_char() == ':' && group.delimiter() == Delimiter::Bracket {
                        parse_entry_list(group.stream(), entries);
                        i += 3;
                        continue;
                    }
                }
                i += 1;
            }
            TokenTree::Group(group)
                if matches!(group.delimiter(), Delimiter::Brace | Delimiter::Parenthesis) =>
            {
                collect_from_stream(group.stream(), entries);
                i += 1;
            }
            _ => i += 1,
        }
    }
}

/// Each brace group in the list is one entry; leading idents (like the
/// `Breakpoint` constructor name) and commas are skipped.
fn parse_entry_list(stream: TokenStream, entries: &mut Vec<Breakpoint>) {
    for tree in stream {
        if let TokenTree::Group(group) = &tree {
            if group.delimiter() == Delimiter::Brace {
                match parse_entry(group.stream()) {
                    Some(bp) => entries.push(bp),
                    None => eprintln!("idb: skipping malformed breakpoint entry: {group}"),
                }
            }
        }
    }
}

/// One field value; anything else is skipped as unknown.
enum FieldValue {
    Str(String),
    Int(u32),
    Bool(bool),
}

/// State machine over `field : value ,` triples.
fn parse_entry(stream: TokenStream) -> Option<Breakpoint> {
    let mut file = None;
    let mut line = None;
    let mut enabled = true;
    let mut condition = None;

    let tokens: Vec<TokenTree> = stream.into_iter().collect();
    let mut i = 0;
    while i < tokens.len() {
        // Field name.
        let TokenTree::Ident(field) = &tokens[i] else {
            i += 1;
            continue;
        };
        // Separator.
        let Some(TokenTree::Punct(sep)) = tokens.get(i + 1) else {
            i += 1;
            continue;
        };
        if sep.as_char() != ':' {
            i += 1;
            continue;
        }
        // Value.
        let value = tokens.get(i + 2).and_then(parse_value);
        match (field.to_string().as_str(), value) {
            ("file", Some(FieldValue::Str(s))) => file = Some(s),
            ("line", Some(FieldValue::Int(n))) => line = Some(n),
            ("enabled", Some(FieldValue::Bool(b))) => enabled = b,
            ("condition", Some(FieldValue::Str(s))) => condition = Some(s),
            // Unknown fields (and ill-typed known ones) are ignored.
            _ => {}
        }
        i += 3;
        // Optional trailing comma.
        if let Some(TokenTree::Punct(punct)) = tokens.get(i) {
            if punct.as_char() == ',' {
                i += 1;
            }
        }
    }

    let (file, line) = (file?, line?);
    let mut bp = Breakpoint::new(file, line).with_enabled(enabled);
    bp.condition = condition;
    Some(bp)
}

fn parse_value(tree: &TokenTree) -> Option<FieldValue> {
    match tree {
        TokenTree::Literal(lit) => {
            let text = lit.to_string();
            if let Some(stripped) = unquote(&text) {
                return Some(FieldValue::Str(stripped));
            }
            // Integer literals may carry `_` separators or a type suffix.
            let digits: String =
                text.chars().take_while(|c| c.is_ascii_digit() || *c == '_').collect();
            let digits = digits.replace('_', "");
            digits.parse().ok().map(FieldValue::Int)
        }
        TokenTree::Ident(ident) if ident == "true" => Some(FieldValue::Bool(true)),
        TokenTree::Ident(ident) if ident == "false" => Some(FieldValue::Bool(false)),
        _ => None,
    }
}

/// Strips quotes and resolves the escapes a path or condition can contain.
fn unquote(lit: &str) -> Option<String> {
    let inner = lit.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => break,
        }
    }
    Some(out)
}
