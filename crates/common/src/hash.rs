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

//! File identity hashing.
//!
//! Call sites are tagged at transform time with a 32-bit FNV-1a hash of the
//! source file's *basename*. Compile-time paths are absolute while
//! breakpoint-file paths are usually relative; hashing the basename lets the
//! runtime test a breakpoint entry against a hit site without normalizing
//! paths. A hash of the entry's full path is kept as a fallback so absolute
//! entries still match.

use serde::{Deserialize, Serialize};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a over a byte string.
///
/// `const` so the transformer can bake the result into injected call sites
/// as a literal.
pub const fn fnv1a_32(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

/// Returns the final path component, accepting both `/` and `\` separators.
pub fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Hash of a path's basename, the primary file identity at call sites.
pub fn hash_basename(path: &str) -> u32 {
    fnv1a_32(basename(path).as_bytes())
}

/// The two hashes a breakpoint entry is matched under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHashes {
    /// Hash of the basename (primary).
    pub basename: u32,
    /// Hash of the path as written (fallback, lets absolute entries match).
    pub full: u32,
}

impl FileHashes {
    /// Computes both hashes for a path as written in a breakpoint entry.
    pub fn of(path: &str) -> Self {
        Self { basename: hash_basename(path), full: fnv1a_32(path.as_bytes()) }
    }

    /// Whether a call site's compile-time hash matches this entry.
    pub fn matches(&self, file_hash: u32) -> bool {
        self.basename == file_hash || self.full == file_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a_32_known_vectors() {
        // Standard FNV-1a reference vectors.
        assert_eq!(fnv1a_32(b""), 0x811c_9dc5);
        assert_eq!(fnv1a_32(b"a"), 0xe40c_292c);
        assert_eq!(fnv1a_32(b"foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("src/main.rs"), "main.rs");
        assert_eq!(basename("/abs/path/to/util.rs"), "util.rs");
        assert_eq!(basename("plain.rs"), "plain.rs");
        assert_eq!(basename("win\\style\\mod.rs"), "mod.rs");
    }

    #[test]
    fn test_basename_hash_ignores_directories() {
        assert_eq!(hash_basename("src/main.rs"), hash_basename("/work/proj/src/main.rs"));
        assert_ne!(hash_basename("src/main.rs"), hash_basename("src/util.rs"));
    }

    #[test]
    fn test_matches_basename_primary_full_fallback() {
        let hashes = FileHashes::of("src/main.rs");

        // A call site hashed from any path with the same basename matches.
        assert!(hashes.matches(hash_basename("/ci/build/src/main.rs")));
        // An entry written as the exact compile-time path matches via the
        // full-path fallback.
        let abs = FileHashes::of("/ci/build/src/main.rs");
        assert!(abs.matches(fnv1a_32(b"/ci/build/src/main.rs")));
        // Unrelated files do not.
        assert!(!hashes.matches(hash_basename("other.rs")));
    }
}
