// Copyright (C) 2025 idb contributors
// SPDX-License-Identifier: AGPL-3.0

//! Source analysis: global scan, scope tracking, and the statement walker.

pub mod globals;
pub mod scope;
pub mod walker;

pub use globals::{scan_globals, Global, GlobalKind};
pub use scope::{collect_pattern_names, ScopeStack};
pub use walker::{is_injectable, Walker, BREAK_MARKER, STEP_MARKER};
