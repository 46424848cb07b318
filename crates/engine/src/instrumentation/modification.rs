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

//! The transactional edit model.
//!
//! The walker accumulates [`Edit`]s against the original byte offsets; they
//! are applied in one linear output pass at the end. Edits must never
//! overlap — candidates that would are rejected at insertion time, so a bad
//! plan degrades to a smaller plan instead of corrupt output. Insertions
//! sharing an offset are ordered by priority, which is what lets a brace
//! wrap and a step hook land at the same spot in the right order.

use std::cmp::Reverse;

use itertools::Itertools;

/// Opening brace of a statement-to-block wrap; applied first at its offset.
pub const LEFT_BRACE_PRIORITY: u8 = 255;
/// Breakpoint-marker replacements.
pub const BREAK_PRIORITY: u8 = 127;
/// Step hooks injected before a statement.
pub const STEP_HOOK_PRIORITY: u8 = 63;
/// Closing brace of a wrap; applied last at its offset.
pub const RIGHT_BRACE_PRIORITY: u8 = 0;

/// One textual modification of the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    /// Byte offset into the original source.
    pub offset: usize,
    /// Bytes removed starting at `offset`.
    pub delete_len: usize,
    /// Replacement text, possibly empty.
    pub insert: String,
    /// Orders insertions that share an offset; higher applies first.
    pub priority: u8,
}

impl Edit {
    fn end(&self) -> usize {
        self.offset + self.delete_len
    }

    /// Whether two edits touch the same bytes. Pure insertions at the same
    /// offset coexist (priority orders them); a deletion excludes any other
    /// edit inside its range.
    fn overlaps(&self, other: &Edit) -> bool {
        if self.delete_len == 0 && other.delete_len == 0 {
            return false;
        }
        self.offset < other.end() && other.offset < self.end()
    }
}

/// The collected modifications for one source file.
#[derive(Debug, Default)]
pub struct SourceModifications {
    edits: Vec<Edit>,
}

impl SourceModifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Adds an edit unless it would overlap an existing one. Returns
    /// whether it was accepted.
    pub fn add(&mut self, edit: Edit) -> bool {
        if self.edits.iter().any(|existing| existing.overlaps(&edit)) {
            tracing::warn!(?edit, "edit overlaps an existing modification, dropped");
            return false;
        }
        self.edits.push(edit);
        true
    }

    /// Zero-deletion insertion.
    pub fn insert(&mut self, offset: usize, text: impl Into<String>, priority: u8) -> bool {
        self.add(Edit { offset, delete_len: 0, insert: text.into(), priority })
    }

    /// Replacement of a byte range.
    pub fn replace(&mut self, offset: usize, delete_len: usize, text: impl Into<String>) -> bool {
        self.add(Edit { offset, delete_len, insert: text.into(), priority: BREAK_PRIORITY })
    }

    /// Deletion of a byte range.
    pub fn delete(&mut self, offset: usize, delete_len: usize) -> bool {
        self.replace(offset, delete_len, "")
    }

    /// Whether any planned edit touches `[start, end)`; used to suppress
    /// discard deletions that would collide with an injection.
    pub fn intersects_range(&self, start: usize, end: usize) -> bool {
        self.edits
            .iter()
            .any(|edit| edit.offset < end && start < edit.end().max(edit.offset + 1))
    }

    /// Applies the edits in one linear pass: `O(source + inserted)`.
    pub fn apply(&self, source: &str) -> String {
        let inserted: usize = self.edits.iter().map(|e| e.insert.len()).sum();
        let mut out = String::with_capacity(source.len() + inserted);
        let mut cursor = 0usize;
        // Insertions at an offset apply before a deletion starting there,
        // so injected text lands ahead of a replaced range.
        for edit in self
            .edits
            .iter()
            .sorted_by_key(|edit| (edit.offset, edit.delete_len > 0, Reverse(edit.priority)))
        {
            // Disjointness is enforced on insertion; a violation here would
            // mean the plan itself is corrupt.
            debug_assert!(edit.offset >= cursor, "edit application crossed a previous edit");
            out.push_str(&source[cursor..edit.offset]);
            out.push_str(&edit.insert);
            cursor = edit.end().max(cursor);
        }
        out.push_str(&source[cursor..]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_sorted_single_pass() {
        let mut mods = SourceModifications::new();
        // Added out of order on purpose.
        assert!(mods.insert(8, "C", STEP_HOOK_PRIORITY));
        assert!(mods.insert(0, "A", STEP_HOOK_PRIORITY));
        assert!(mods.replace(4, 2, "B"));
        assert_eq!(mods.apply("0123456789"), "A0123B67C89");
    }

    #[test]
    fn test_same_offset_priority_order() {
        let mut mods = SourceModifications::new();
        assert!(mods.insert(5, "hook; ", STEP_HOOK_PRIORITY));
        assert!(mods.insert(5, "{ ", LEFT_BRACE_PRIORITY));
        assert!(mods.insert(9, " }", RIGHT_BRACE_PRIORITY));
        assert_eq!(mods.apply("a => expr,"), "a => { hook; expr },");
    }

    #[test]
    fn test_overlapping_deletion_rejected() {
        let mut mods = SourceModifications::new();
        assert!(mods.replace(2, 4, "X"));
        assert!(!mods.replace(4, 2, "Y"));
        assert!(!mods.insert(3, "Z", STEP_HOOK_PRIORITY));
        assert_eq!(mods.len(), 1);
        assert_eq!(mods.apply("abcdefgh"), "abXgh");
    }

    #[test]
    fn test_insert_at_deletion_boundary_is_fine() {
        let mut mods = SourceModifications::new();
        assert!(mods.delete(2, 2));
        assert!(mods.insert(4, "!", STEP_HOOK_PRIORITY));
        assert!(mods.insert(2, "?", STEP_HOOK_PRIORITY));
        assert_eq!(mods.apply("abcdef"), "ab?!ef");
    }

    #[test]
    fn test_intersects_range() {
        let mut mods = SourceModifications::new();
        mods.insert(10, "x", STEP_HOOK_PRIORITY);
        assert!(mods.intersects_range(5, 11));
        assert!(mods.intersects_range(10, 12));
        assert!(!mods.intersects_range(0, 10));
        assert!(!mods.intersects_range(11, 20));
    }

    #[test]
    fn test_empty_plan_is_identity() {
        let mods = SourceModifications::new();
        assert_eq!(mods.apply("unchanged"), "unchanged");
    }
}
