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

//! In-memory model of one source file.
//!
//! Keeps the text (after an optional byte-order mark) together with a line
//! index, so the walker can move between byte offsets, 1-based line
//! numbers, and line slices. All edit offsets are relative to the body;
//! [`SourceFile::bom`] is re-attached when the result is written.

use eyre::{bail, Result};

/// Inputs are bounded; anything larger is refused up front.
pub const MAX_SOURCE_BYTES: usize = 10 * 1024 * 1024;

const BOM: &str = "\u{feff}";

#[derive(Debug)]
pub struct SourceFile {
    body: String,
    /// Byte offset of each line start within `body`.
    line_starts: Vec<usize>,
    has_bom: bool,
}

impl SourceFile {
    pub fn new(raw: String) -> Result<Self> {
        if raw.len() > MAX_SOURCE_BYTES {
            bail!("source exceeds {} bytes ({})", MAX_SOURCE_BYTES, raw.len());
        }
        let (has_bom, body) = match raw.strip_prefix(BOM) {
            Some(stripped) => (true, stripped.to_string()),
            None => (false, raw),
        };
        let mut line_starts = vec![0];
        for (i, b) in body.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Ok(Self { body, line_starts, has_bom })
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn has_bom(&self) -> bool {
        self.has_bom
    }

    /// The byte-order mark to re-attach on output, if any.
    pub fn bom(&self) -> &'static str {
        if self.has_bom {
            BOM
        } else {
            ""
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// 1-based line number of a byte offset.
    pub fn line_of(&self, offset: usize) -> u32 {
        self.line_starts.partition_point(|&start| start <= offset) as u32
    }

    /// Byte range of a 1-based line, excluding the trailing newline.
    pub fn line_range(&self, line: u32) -> (usize, usize) {
        let index = (line as usize).saturating_sub(1).min(self.line_starts.len() - 1);
        let start = self.line_starts[index];
        let end = match self.line_starts.get(index + 1) {
            Some(&next) => next - 1,
            None => self.body.len(),
        };
        (start, end)
    }

    pub fn line_text(&self, line: u32) -> &str {
        let (start, end) = self.line_range(line);
        &self.body[start..end]
    }

    /// Leading whitespace of a line, for indentation-preserving edits.
    pub fn line_indent(&self, line: u32) -> &str {
        let text = self.line_text(line);
        let trimmed = text.trim_start();
        &text[..text.len() - trimmed.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(text: &str) -> SourceFile {
        SourceFile::new(text.to_string()).unwrap()
    }

    #[test]
    fn test_line_index() {
        let s = source("ab\ncd\n\nef");
        assert_eq!(s.line_count(), 4);
        assert_eq!(s.line_of(0), 1);
        assert_eq!(s.line_of(2), 1);
        assert_eq!(s.line_of(3), 2);
        assert_eq!(s.line_of(6), 3);
        assert_eq!(s.line_of(7), 4);
        assert_eq!(s.line_text(1), "ab");
        assert_eq!(s.line_text(2), "cd");
        assert_eq!(s.line_text(3), "");
        assert_eq!(s.line_text(4), "ef");
        assert_eq!(s.line_range(2), (3, 5));
    }

    #[test]
    fn test_indent() {
        let s = source("fn main() {\n    let x = 1;\n\tlet y = 2;\n}");
        assert_eq!(s.line_indent(2), "    ");
        assert_eq!(s.line_indent(3), "\t");
        assert_eq!(s.line_indent(1), "");
    }

    #[test]
    fn test_bom_is_stripped_and_remembered() {
        let s = source("\u{feff}fn main() {}");
        assert!(s.has_bom());
        assert_eq!(s.body(), "fn main() {}");
        assert_eq!(s.bom(), "\u{feff}");

        let s = source("fn main() {}");
        assert!(!s.has_bom());
        assert_eq!(s.bom(), "");
    }

    #[test]
    fn test_size_bound() {
        let big = "x".repeat(MAX_SOURCE_BYTES + 1);
        assert!(SourceFile::new(big).is_err());
    }

    #[test]
    fn test_trailing_line_without_newline() {
        let s = source("a\nbc");
        assert_eq!(s.line_range(2), (2, 4));
        assert_eq!(s.line_text(2), "bc");
    }
}
