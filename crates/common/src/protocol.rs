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

//! The file-based rendezvous protocol.
//!
//! Four files in the debuggee's working directory connect the halted
//! program to an external UI:
//!
//! - the **breakpoint file** (editor writes, debuggee polls),
//! - the **state file** (debuggee writes on every halt/resume),
//! - the **command file** (UI writes, debuggee consumes-and-deletes),
//! - the **output file** (debuggee writes query responses).
//!
//! None of them is locked. Atomicity relies on truncate-and-write in a
//! single call and on the polling loops' idempotent retry on partial reads.

use std::{fmt::Write as _, fs, io, path::Path, str::FromStr};

use eyre::{bail, Error, Result};
use serde::{Deserialize, Serialize};

/// Default breakpoint file name (editor-writeable, polled by the debuggee).
pub const BREAKPOINT_FILE: &str = "breakpoints.list";
/// Default state file name (debuggee to UI).
pub const STATE_FILE: &str = "state.txt";
/// Default command file name (UI to debuggee).
pub const COMMAND_FILE: &str = "command.txt";
/// Default output file name (query responses, debuggee to UI).
pub const OUTPUT_FILE: &str = "output.txt";

/// `DEBUG_MODE` selects the runtime front-end behavior.
pub const ENV_MODE: &str = "DEBUG_MODE";
/// `DEBUG_BREAKPOINTS` overrides the breakpoint file path.
pub const ENV_BREAKPOINTS: &str = "DEBUG_BREAKPOINTS";
/// `DEBUG_PAUSE_ON_START=1` forces a break at entry.
pub const ENV_PAUSE_ON_START: &str = "DEBUG_PAUSE_ON_START";

/// Runtime front-end mode, from `DEBUG_MODE`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebugMode {
    /// File rendezvous for a terminal/editor UI (the default).
    #[default]
    Terminal,
    /// Reserved for a Debug Adapter Protocol front-end; behaves as
    /// `Terminal` for now.
    Dap,
    /// Debugging disabled: never break, never touch rendezvous files.
    Silent,
}

impl FromStr for DebugMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "terminal" => Ok(Self::Terminal),
            "dap" => Ok(Self::Dap),
            "silent" => Ok(Self::Silent),
            other => bail!("unknown {ENV_MODE} value: {other:?}"),
        }
    }
}

/// A command read from the command file while the debuggee is halted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// `continue` / `c`: resume execution.
    Continue,
    /// `quit` / `q`: terminate the debuggee with exit code 0.
    Quit,
    /// `step` / `s`: break on the very next instrumented statement.
    Step,
    /// `next` / `n`: break on the next statement in the current file.
    Next,
    /// `vars` / `v`: dump the full variable table to the output file.
    Vars,
    /// Anything else: a variable-path query such as `player.hp` or
    /// `items[0..3]`, optionally prefixed with `print`.
    Query(String),
}

impl Command {
    /// Parses one command line. Unknown text is a value query, so this never
    /// fails; blank input is the caller's no-command case.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line {
            "continue" | "c" => Self::Continue,
            "quit" | "q" => Self::Quit,
            "step" | "s" => Self::Step,
            "next" | "n" => Self::Next,
            "vars" | "v" => Self::Vars,
            _ => {
                let expr = line.strip_prefix("print ").unwrap_or(line);
                Self::Query(expr.trim().to_string())
            }
        }
    }
}

/// One variable line of a stopped-state report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableLine {
    pub name: String,
    pub type_name: String,
    /// One-line rendering at shallow depth.
    pub value: String,
}

/// Everything the state file reports while the debuggee is halted.
#[derive(Debug, Clone)]
pub struct StoppedState<'a> {
    pub file: &'a str,
    pub line: u32,
    pub function: &'a str,
    /// The about-to-execute statement text, present on step halts.
    pub statement: Option<&'a str>,
    pub variables: &'a [VariableLine],
}

/// Renders the `status=stopped` state-file body.
pub fn render_stopped(state: &StoppedState<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "status=stopped");
    let _ = writeln!(out, "file={}", state.file);
    let _ = writeln!(out, "line={}", state.line);
    let _ = writeln!(out, "function={}", state.function);
    if let Some(statement) = state.statement {
        let _ = writeln!(out, "statement={statement}");
    }
    let _ = writeln!(out, "---");
    for var in state.variables {
        let _ = writeln!(out, "  {}: {} = {}", var.name, var.type_name, var.value);
    }
    out
}

/// Truncate-and-write in a single call; the protocol's only atomicity
/// primitive.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents)?;
    Ok(())
}

/// Writes the halted report to the state file.
pub fn write_state_stopped(path: &Path, state: &StoppedState<'_>) -> Result<()> {
    write_atomic(path, &render_stopped(state))
}

/// Writes the resumed marker to the state file.
pub fn write_state_running(path: &Path) -> Result<()> {
    write_atomic(path, "status=running\n")
}

/// Reads one command from the command file. Read failures and blank content
/// are both "no command yet"; the polling loop just retries.
pub fn read_command(path: &Path) -> Option<Command> {
    let text = fs::read_to_string(path).ok()?;
    let line = text.trim();
    if line.is_empty() {
        return None;
    }
    Some(Command::parse(line))
}

/// Removes a rendezvous file, ignoring "already gone".
pub fn remove_quiet(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::debug!(path = %path.display(), error = %e, "failed to remove rendezvous file");
        }
    }
}
