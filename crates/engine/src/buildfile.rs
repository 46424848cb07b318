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

//! Build-descriptor path rewrite.
//!
//! The instrumented tree is compiled from a nested `processed/` directory,
//! so relative paths the build script resolves via `host_path("...")` must
//! climb one extra level. This is a purely textual pass; build scripts are
//! not otherwise instrumented.

use idb_common::basename;

/// The host build descriptor this rewrite applies to.
pub const BUILD_FILE_NAME: &str = "build.rs";

const HOST_PATH_CALL: &str = "host_path(\"";

/// Whether a path names the host build descriptor.
pub fn is_build_file_name(name: &str) -> bool {
    basename(name) == BUILD_FILE_NAME
}

/// Prefixes every relative `host_path("X")` argument with `../`. Returns
/// the rewritten text and the number of rewrites.
pub fn rewrite_build_file(source: &str) -> (String, usize) {
    let mut out = String::with_capacity(source.len());
    let mut rewrites = 0;
    let mut rest = source;
    while let Some(idx) = rest.find(HOST_PATH_CALL) {
        let after_quote = idx + HOST_PATH_CALL.len();
        out.push_str(&rest[..after_quote]);
        rest = &rest[after_quote..];
        // Absolute paths are location-independent and stay as they are.
        if !rest.starts_with('/') {
            out.push_str("../");
            rewrites += 1;
        }
    }
    out.push_str(rest);
    (out, rewrites)
}
