// Copyright (C) 2025 idb contributors
// SPDX-License-Identifier: AGPL-3.0

//! idb Runtime - the in-process half of the debugger.
//!
//! Instrumented programs link this crate (the transformer's header imports
//! it as `debug`) and hit it through two macros:
//!
//! - [`break_here!`] replaces an explicit `BREAK;` marker and pauses
//!   unconditionally;
//! - [`step_here!`] is injected before every candidate statement in step
//!   mode and pauses when [`should_break`] says so.
//!
//! While paused, the program serves the file-based rendezvous protocol:
//! state out, commands in, query responses out. The active breakpoint set
//! is reloaded live from the breakpoint file, so an editor can add or drop
//! breakpoints while the debuggee runs.
//!
//! Everything here is deliberately crash-proof: runtime failures degrade to
//! stderr diagnostics and the debuggee keeps running.

use std::sync::{Mutex, PoisonError};

use once_cell::sync::Lazy;

pub mod bpfile;
pub mod inspect;
mod runtime;

pub use inspect::{Inspect, Sink};
pub use runtime::{
    Halt, Runtime, RuntimeConfig, StepMode, BREAKPOINT_TEMPLATE, POLL_EVERY_N, SPIN_EVERY_N,
};

pub use idb_common::{
    hash_basename, protocol::DebugMode, Breakpoint, BreakpointStore, MAX_BREAKPOINTS,
};

/// Source-level breakpoint marker. The transformer replaces the statement
/// `BREAK;` with an injected call; keeping the constant importable lets the
/// untransformed tree compile too.
pub const BREAK: () = ();

/// Source-level step-mode marker, consumed by the transformer.
pub const STEP: () = ();

static RUNTIME: Lazy<Mutex<Runtime>> =
    Lazy::new(|| Mutex::new(Runtime::new(RuntimeConfig::from_env())));

fn with_runtime<R>(f: impl FnOnce(&mut Runtime) -> R) -> R {
    // A panic while halted must not take debugging down with it.
    let mut guard = RUNTIME.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard)
}

/// The per-statement hot path: true when the debuggee should pause here.
pub fn should_break(file_hash: u32, line: u32) -> bool {
    with_runtime(|rt| rt.should_break(file_hash, line))
}

/// Explicit-marker halt. Pauses unconditionally and serves the command
/// loop until resumed.
pub fn on_break(
    function: &str,
    file: &str,
    file_hash: u32,
    line: u32,
    names: &[&str],
    values: &[&dyn Inspect],
) {
    with_runtime(|rt| {
        rt.pause(&Halt { function, file, file_hash, line, statement: None, names, values })
    });
}

/// Step halt, injected before a candidate statement; carries the statement
/// text about to execute.
pub fn on_step(
    function: &str,
    file: &str,
    file_hash: u32,
    line_text: &str,
    line: u32,
    names: &[&str],
    values: &[&dyn Inspect],
) {
    with_runtime(|rt| {
        rt.pause(&Halt {
            function,
            file,
            file_hash,
            line,
            statement: Some(line_text),
            names,
            values,
        })
    });
}

/// Replaces the breakpoints of one file in the active set.
pub fn set_breakpoints_for_file(file: &str, lines: &[u32]) {
    with_runtime(|rt| rt.set_breakpoints_for_file(file, lines));
}

/// Snapshot of the active breakpoint set.
pub fn breakpoints() -> Vec<Breakpoint> {
    with_runtime(|rt| rt.breakpoints())
}

/// Writes a template breakpoint file if none exists.
pub fn ensure_breakpoint_file() -> eyre::Result<()> {
    with_runtime(|rt| rt.ensure_breakpoint_file())
}

/// Expansion of a `BREAK;` marker: capture the listed variables and halt.
///
/// ```ignore
/// debug::break_here!("main", 0x9a3c1f42u32, 42, [x, count]);
/// ```
#[macro_export]
macro_rules! break_here {
    ($function:expr, $file_hash:expr, $line:expr, [$($var:ident),* $(,)?]) => {{
        $crate::on_break(
            $function,
            ::core::file!(),
            $file_hash,
            $line,
            &[$(::core::stringify!($var)),*],
            &[$(&$var as &dyn $crate::inspect::Inspect),*],
        );
    }};
}

/// Step-mode injection before a candidate statement: consult the breakpoint
/// set, halt on a hit.
///
/// ```ignore
/// debug::step_here!("main", 0x9a3c1f42u32, 43, "x = x + 1;", [x]);
/// ```
#[macro_export]
macro_rules! step_here {
    ($function:expr, $file_hash:expr, $line:expr, $stmt:expr, [$($var:ident),* $(,)?]) => {{
        if $crate::should_break($file_hash, $line) {
            $crate::on_step(
                $function,
                ::core::file!(),
                $file_hash,
                $stmt,
                $line,
                &[$(::core::stringify!($var)),*],
                &[$(&$var as &dyn $crate::inspect::Inspect),*],
            );
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_markers_are_unit() {
        // The markers must stay zero-sized so `BREAK;` is a no-op statement
        // in untransformed builds.
        let _: () = crate::BREAK;
        let _: () = crate::STEP;
    }

    #[test]
    fn test_macros_expand_with_and_without_vars() {
        // The global runtime would block on an actual halt, so only verify
        // the macros type-check with empty and non-empty capture lists.
        if false {
            let x = 1i32;
            crate::break_here!("f", 0u32, 1u32, []);
            crate::break_here!("f", 0u32, 1u32, [x]);
            crate::step_here!("f", 0u32, 2u32, "x;", [x]);
        }
    }
}
