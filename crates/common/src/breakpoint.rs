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

//! Breakpoints and the bounded breakpoint store.
//!
//! A breakpoint's identity is `(file, line)`. Entries come from the
//! breakpoint file (reparsed live while the debuggee runs) or from a
//! programmatic `set_breakpoints_for_file` call; the store is replaced
//! wholesale on reload, which resets hit counts. Between reloads hit counts
//! only grow.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::hash::{basename, FileHashes};

/// Upper bound on stored breakpoints; excess entries are dropped.
pub const MAX_BREAKPOINTS: usize = 256;

/// A single breakpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Breakpoint {
    /// Path as written in the breakpoint file; matched by basename with a
    /// full-path fallback.
    pub file: String,
    /// 1-based line number.
    pub line: u32,
    /// Disabled entries are kept but never hit.
    pub enabled: bool,
    /// Number of times this entry has matched a call site since it was
    /// loaded.
    pub hit_count: u64,
    /// Reserved: parsed and carried, never evaluated.
    pub condition: Option<String>,
    // Cached hashes of `file`; the store recomputes these on insertion so
    // deserialized entries stay consistent.
    #[serde(skip)]
    hashes: FileHashes,
}

impl Breakpoint {
    /// Creates an enabled breakpoint at `file:line`.
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        let file = file.into();
        let hashes = FileHashes::of(&file);
        Self { file, line, enabled: true, hit_count: 0, condition: None, hashes }
    }

    /// Sets the enabled flag, builder-style.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the reserved condition text, builder-style.
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Recomputes the cached file hashes from `self.file`.
    pub fn rehash(&mut self) {
        self.hashes = FileHashes::of(&self.file);
    }

    /// Whether this entry matches a call site.
    pub fn matches_site(&self, file_hash: u32, line: u32) -> bool {
        self.enabled && self.line == line && self.hashes.matches(file_hash)
    }
}

impl Display for Breakpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)?;
        if !self.enabled {
            write!(f, " (disabled)")?;
        }
        if self.hit_count > 0 {
            write!(f, " [{} hits]", self.hit_count)?;
        }
        Ok(())
    }
}

/// The active breakpoint set.
///
/// Insertion-ordered, linearly scanned, bounded at [`MAX_BREAKPOINTS`].
/// Duplicate `(file, line)` entries are tolerated but wasteful; the first
/// match wins a check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BreakpointStore {
    entries: Vec<Breakpoint>,
}

impl BreakpointStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read-only view of the entries in insertion order.
    pub fn entries(&self) -> &[Breakpoint] {
        &self.entries
    }

    /// Appends an entry. Returns `false` (dropping the entry) when the store
    /// is full; the caller decides how to report that.
    pub fn push(&mut self, mut bp: Breakpoint) -> bool {
        if self.entries.len() >= MAX_BREAKPOINTS {
            return false;
        }
        bp.rehash();
        self.entries.push(bp);
        true
    }

    /// Replaces the whole set, e.g. after reparsing the breakpoint file.
    /// Returns the number of entries dropped to the capacity bound.
    pub fn replace_all(&mut self, breakpoints: impl IntoIterator<Item = Breakpoint>) -> usize {
        self.entries.clear();
        let mut dropped = 0;
        for bp in breakpoints {
            if !self.push(bp) {
                dropped += 1;
            }
        }
        dropped
    }

    /// Replaces the entries for one file (matched by basename), keeping the
    /// rest. The programmatic mirror of editing the breakpoint file.
    pub fn set_for_file(&mut self, file: &str, lines: &[u32]) {
        let name = basename(file);
        self.entries.retain(|bp| basename(&bp.file) != name);
        for &line in lines {
            if !self.push(Breakpoint::new(file, line)) {
                tracing::warn!(file, line, "breakpoint store full, entry dropped");
            }
        }
    }

    /// Linear scan for a call-site match. Increments the matching entry's
    /// hit count exactly once and returns `true` on a hit.
    pub fn check(&mut self, file_hash: u32, line: u32) -> bool {
        for bp in &mut self.entries {
            if bp.matches_site(file_hash, line) {
                bp.hit_count += 1;
                return true;
            }
        }
        false
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_basename;

    #[test]
    fn test_check_matches_line_and_file() {
        let mut store = BreakpointStore::new();
        store.push(Breakpoint::new("src/main.rs", 42));

        assert!(store.check(hash_basename("main.rs"), 42));
        assert!(!store.check(hash_basename("main.rs"), 43));
        assert!(!store.check(hash_basename("util.rs"), 42));
    }

    #[test]
    fn test_check_skips_disabled() {
        let mut store = BreakpointStore::new();
        store.push(Breakpoint::new("src/main.rs", 7).with_enabled(false));

        assert!(!store.check(hash_basename("main.rs"), 7));
    }

    #[test]
    fn test_hit_count_increments_once_per_hit() {
        let mut store = BreakpointStore::new();
        store.push(Breakpoint::new("src/main.rs", 42));
        // A duplicate entry must not absorb the same hit.
        store.push(Breakpoint::new("src/main.rs", 42));

        assert!(store.check(hash_basename("main.rs"), 42));
        assert!(store.check(hash_basename("main.rs"), 42));

        assert_eq!(store.entries()[0].hit_count, 2);
        assert_eq!(store.entries()[1].hit_count, 0);
    }

    #[test]
    fn test_capacity_bound() {
        let mut store = BreakpointStore::new();
        let dropped = store
            .replace_all((0..300).map(|i| Breakpoint::new("src/main.rs", i as u32 + 1)));

        assert_eq!(store.len(), MAX_BREAKPOINTS);
        assert_eq!(dropped, 300 - MAX_BREAKPOINTS);
    }

    #[test]
    fn test_replace_all_resets_hit_counts() {
        let mut store = BreakpointStore::new();
        store.push(Breakpoint::new("src/main.rs", 42));
        assert!(store.check(hash_basename("main.rs"), 42));
        assert_eq!(store.entries()[0].hit_count, 1);

        store.replace_all(vec![Breakpoint::new("src/main.rs", 42)]);
        assert_eq!(store.entries()[0].hit_count, 0);
    }

    #[test]
    fn test_set_for_file_replaces_only_that_file() {
        let mut store = BreakpointStore::new();
        store.push(Breakpoint::new("src/main.rs", 1));
        store.push(Breakpoint::new("src/util.rs", 2));

        store.set_for_file("src/main.rs", &[10, 20]);

        let files: Vec<_> = store.entries().iter().map(|bp| (bp.file.as_str(), bp.line)).collect();
        assert_eq!(files, vec![("src/util.rs", 2), ("src/main.rs", 10), ("src/main.rs", 20)]);
    }

    #[test]
    fn test_full_path_fallback_match() {
        let mut store = BreakpointStore::new();
        store.push(Breakpoint::new("/work/proj/src/main.rs", 5));

        // Primary: the call site hashed its basename.
        assert!(store.check(hash_basename("src/main.rs"), 5));
        // Fallback: a call site that (unusually) hashed the identical full
        // path still matches.
        assert!(store.check(crate::hash::fnv1a_32(b"/work/proj/src/main.rs"), 5));
    }

    #[test]
    fn test_display() {
        let bp = Breakpoint::new("src/main.rs", 42);
        assert_eq!(bp.to_string(), "src/main.rs:42");
        let bp = Breakpoint::new("src/main.rs", 42).with_enabled(false);
        assert_eq!(bp.to_string(), "src/main.rs:42 (disabled)");
    }
}
