// Copyright (C) 2025 idb contributors
// SPDX-License-Identifier: AGPL-3.0

//! Source code instrumentation: the edit model and injected-code text.

pub mod codegen;
pub mod modification;

pub use modification::{
    Edit, SourceModifications, BREAK_PRIORITY, LEFT_BRACE_PRIORITY, RIGHT_BRACE_PRIORITY,
    STEP_HOOK_PRIORITY,
};
