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

//! The in-process runtime behind every injected call.
//!
//! `should_break` is the hot path, called once per instrumented statement;
//! it costs a counter bump and a linear scan of a small set, with a file
//! stat amortized over [`POLL_EVERY_N`] calls. `pause` is the cold path: it
//! writes the state file, then spin-polls the command file until the UI
//! resumes the program. All runtime failures degrade to diagnostics; the
//! debuggee is never crashed by its debugger.

use std::{
    env,
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use idb_common::{
    protocol::{self, Command, DebugMode, StoppedState, VariableLine},
    Breakpoint, BreakpointStore,
};

use crate::{
    bpfile,
    inspect::{format_one_line, format_value, path, short_type_name, Inspect},
};

/// The breakpoint file is stat-ed every this many `should_break` calls.
pub const POLL_EVERY_N: u64 = 50_000;
/// Spin-loop iterations between command-file reads while halted.
pub const SPIN_EVERY_N: u64 = 100_000;

/// Contents written by `ensure_breakpoint_file`.
pub const BREAKPOINT_TEMPLATE: &str = "\
Breakpoints {
    breakpoints: [
        // Breakpoint { file: \"src/main.rs\", line: 42 },
    ],
}
";

/// Transient stepping state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepMode {
    #[default]
    None,
    /// Break on the very next instrumented statement.
    StepIn,
    /// Break on the next statement whose call site carries the anchor hash.
    StepOver { anchor: u32 },
}

/// Runtime settings, resolved once from the environment (or supplied
/// directly by tests and embedders).
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub mode: DebugMode,
    /// Directory holding the rendezvous files.
    pub dir: PathBuf,
    /// Breakpoint file path, `DEBUG_BREAKPOINTS` override included.
    pub breakpoint_file: PathBuf,
    pub pause_on_start: bool,
}

impl RuntimeConfig {
    /// Reads `DEBUG_MODE`, `DEBUG_BREAKPOINTS`, and `DEBUG_PAUSE_ON_START`;
    /// rendezvous files live in the working directory.
    pub fn from_env() -> Self {
        let dir = PathBuf::from(".");
        let mode = env::var(protocol::ENV_MODE)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        let breakpoint_file = env::var(protocol::ENV_BREAKPOINTS)
            .map(PathBuf::from)
            .unwrap_or_else(|_| dir.join(protocol::BREAKPOINT_FILE));
        let pause_on_start =
            env::var(protocol::ENV_PAUSE_ON_START).is_ok_and(|v| v == "1");
        Self { mode, dir, breakpoint_file, pause_on_start }
    }

    /// A config rooted at an explicit directory.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            mode: DebugMode::Terminal,
            breakpoint_file: dir.join(protocol::BREAKPOINT_FILE),
            dir,
            pause_on_start: false,
        }
    }
}

/// Everything an injected call site knows about the halt.
pub struct Halt<'a> {
    pub function: &'a str,
    pub file: &'a str,
    pub file_hash: u32,
    pub line: u32,
    /// The about-to-execute statement text, on step halts.
    pub statement: Option<&'a str>,
    pub names: &'a [&'a str],
    pub values: &'a [&'a dyn Inspect],
}

/// The process-wide debug state. One instance lives behind the crate's
/// global mutex; tests construct their own.
#[derive(Debug)]
pub struct Runtime {
    config: RuntimeConfig,
    store: BreakpointStore,
    call_count: u64,
    last_mtime: Option<SystemTime>,
    step: StepMode,
    pause_pending: bool,
    initialized: bool,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            store: BreakpointStore::new(),
            call_count: 0,
            last_mtime: None,
            step: StepMode::None,
            pause_pending: false,
            initialized: false,
        }
    }

    fn state_path(&self) -> PathBuf {
        self.config.dir.join(protocol::STATE_FILE)
    }

    fn command_path(&self) -> PathBuf {
        self.config.dir.join(protocol::COMMAND_FILE)
    }

    fn output_path(&self) -> PathBuf {
        self.config.dir.join(protocol::OUTPUT_FILE)
    }

    fn ensure_init(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        self.pause_pending = self.config.pause_on_start;
        self.last_mtime = file_mtime(&self.config.breakpoint_file);
        self.reload_breakpoints();
    }

    /// The per-statement check. Never suspends.
    pub fn should_break(&mut self, file_hash: u32, line: u32) -> bool {
        if self.config.mode == DebugMode::Silent {
            return false;
        }
        self.ensure_init();

        self.call_count += 1;
        if self.call_count % POLL_EVERY_N == 0 {
            self.poll_breakpoint_file();
        }

        if self.pause_pending {
            self.pause_pending = false;
            return true;
        }

        match self.step {
            StepMode::StepIn => return true,
            StepMode::StepOver { anchor } => return anchor == file_hash,
            StepMode::None => {}
        }

        self.store.check(file_hash, line)
    }

    /// Stat the breakpoint file; a changed mtime triggers a reparse.
    fn poll_breakpoint_file(&mut self) {
        let mtime = file_mtime(&self.config.breakpoint_file);
        if mtime != self.last_mtime {
            self.last_mtime = mtime;
            self.reload_breakpoints();
        }
    }

    /// Re-reads the breakpoint file. A missing file is an empty set; a file
    /// that fails to parse leaves the previous set in place.
    fn reload_breakpoints(&mut self) {
        let path = &self.config.breakpoint_file;
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(_) => {
                self.store.clear();
                return;
            }
        };
        match bpfile::parse_breakpoint_file(&text) {
            Ok(entries) => {
                let dropped = self.store.replace_all(entries);
                if dropped > 0 {
                    eprintln!(
                        "idb: breakpoint file has more than {} entries, {dropped} dropped",
                        idb_common::MAX_BREAKPOINTS
                    );
                }
                tracing::debug!(
                    path = %path.display(),
                    count = self.store.len(),
                    "reloaded breakpoints"
                );
            }
            Err(e) => {
                eprintln!("idb: breakpoint file not reloaded: {e}");
            }
        }
    }

    /// Programmatic replacement of one file's breakpoints (what a DAP
    /// front-end calls after `setBreakpoints`).
    pub fn set_breakpoints_for_file(&mut self, file: &str, lines: &[u32]) {
        self.ensure_init();
        self.store.set_for_file(file, lines);
    }

    /// Snapshot of the active set.
    pub fn breakpoints(&self) -> Vec<Breakpoint> {
        self.store.entries().to_vec()
    }

    /// Creates a template breakpoint file if none exists yet.
    pub fn ensure_breakpoint_file(&self) -> eyre::Result<()> {
        let path = &self.config.breakpoint_file;
        if !path.exists() {
            fs::write(path, BREAKPOINT_TEMPLATE)?;
        }
        Ok(())
    }

    /// The rendezvous halt: state file out, command loop, resume.
    pub fn pause(&mut self, halt: &Halt<'_>) {
        if self.config.mode == DebugMode::Silent {
            return;
        }
        self.ensure_init();
        // The landing itself satisfies any pending step.
        self.step = StepMode::None;

        eprintln!("idb: stopped at {}:{} in {}", halt.file, halt.line, halt.function);

        let variables: Vec<VariableLine> = halt
            .names
            .iter()
            .zip(halt.values.iter())
            .map(|(name, value)| VariableLine {
                name: (*name).to_string(),
                type_name: short_type_name(value.type_name()).to_string(),
                value: format_one_line(*value, 1),
            })
            .collect();
        let state = StoppedState {
            file: halt.file,
            line: halt.line,
            function: halt.function,
            statement: halt.statement,
            variables: &variables,
        };
        if let Err(e) = protocol::write_state_stopped(&self.state_path(), &state) {
            eprintln!("idb: failed to write state file: {e}");
        }

        protocol::remove_quiet(&self.command_path());
        protocol::remove_quiet(&self.output_path());

        loop {
            for _ in 0..SPIN_EVERY_N {
                std::hint::spin_loop();
            }
            let Some(command) = protocol::read_command(&self.command_path()) else {
                continue;
            };
            protocol::remove_quiet(&self.command_path());

            match command {
                Command::Continue => {
                    self.step = StepMode::None;
                    break;
                }
                Command::Quit => {
                    let _ = protocol::write_state_running(&self.state_path());
                    eprintln!("idb: quit requested, exiting");
                    std::process::exit(0);
                }
                Command::Step => {
                    self.step = StepMode::StepIn;
                    break;
                }
                Command::Next => {
                    self.step = StepMode::StepOver { anchor: halt.file_hash };
                    break;
                }
                Command::Vars => {
                    self.write_output(&render_vars(halt));
                }
                Command::Query(expr) => {
                    let body = match path::run_query(halt.names, halt.values, &expr) {
                        Ok(text) => text,
                        Err(message) => format!("{message}\n"),
                    };
                    self.write_output(&body);
                }
            }
        }

        protocol::remove_quiet(&self.command_path());
        protocol::remove_quiet(&self.output_path());
        if let Err(e) = protocol::write_state_running(&self.state_path()) {
            eprintln!("idb: failed to write state file: {e}");
        }
    }

    fn write_output(&self, body: &str) {
        if let Err(e) = protocol::write_atomic(&self.output_path(), body) {
            eprintln!("idb: failed to write output file: {e}");
        }
    }
}

fn render_vars(halt: &Halt<'_>) -> String {
    let mut out = String::from("=== Variables ===\n");
    for (name, value) in halt.names.iter().zip(halt.values.iter()) {
        out.push_str(&format!(
            "{}: {} = {}\n",
            name,
            short_type_name(value.type_name()),
            format_value(*value, 3)
        ));
    }
    out
}

fn file_mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use idb_common::hash_basename;
    use tempfile::TempDir;

    fn runtime(dir: &TempDir) -> Runtime {
        Runtime::new(RuntimeConfig::in_dir(dir.path()))
    }

    fn write_breakpoints(dir: &TempDir, body: &str) {
        fs::write(dir.path().join(protocol::BREAKPOINT_FILE), body).unwrap();
    }

    #[test]
    fn test_missing_breakpoint_file_is_empty_set() {
        let dir = TempDir::new().unwrap();
        let mut rt = runtime(&dir);
        assert!(!rt.should_break(hash_basename("main.rs"), 1));
        assert!(rt.breakpoints().is_empty());
    }

    #[test]
    fn test_breakpoint_hit_after_initial_load() {
        let dir = TempDir::new().unwrap();
        write_breakpoints(&dir, "breakpoints: [ { file: \"src/main.rs\", line: 42 } ]");
        let mut rt = runtime(&dir);

        assert!(rt.should_break(hash_basename("main.rs"), 42));
        assert!(!rt.should_break(hash_basename("main.rs"), 41));
        assert_eq!(rt.breakpoints()[0].hit_count, 1);
    }

    #[test]
    fn test_hot_swap_within_poll_window() {
        let dir = TempDir::new().unwrap();
        let mut rt = runtime(&dir);

        // No file at startup: first calls all miss.
        assert!(!rt.should_break(hash_basename("main.rs"), 42));

        write_breakpoints(&dir, "breakpoints: [ { file: \"src/main.rs\", line: 42 } ]");

        // The new set must be observed within POLL_EVERY_N calls.
        let mut hit_after = None;
        for i in 0..=POLL_EVERY_N {
            if rt.should_break(hash_basename("main.rs"), 42) {
                hit_after = Some(i);
                break;
            }
        }
        let hit_after = hit_after.expect("hot-swapped breakpoint never observed");
        assert!(hit_after <= POLL_EVERY_N);
    }

    #[test]
    fn test_reload_failure_keeps_previous_set() {
        let dir = TempDir::new().unwrap();
        write_breakpoints(&dir, "breakpoints: [ { file: \"src/main.rs\", line: 42 } ]");
        let mut rt = runtime(&dir);
        assert!(rt.should_break(hash_basename("main.rs"), 42));

        // Unterminated string: tokenization fails, previous set survives.
        write_breakpoints(&dir, "breakpoints: [ { file: \"broken ]");
        rt.reload_breakpoints();
        assert!(rt.should_break(hash_basename("main.rs"), 42));
    }

    #[test]
    fn test_reload_replaces_set_and_resets_counts() {
        let dir = TempDir::new().unwrap();
        write_breakpoints(&dir, "breakpoints: [ { file: \"src/main.rs\", line: 42 } ]");
        let mut rt = runtime(&dir);
        assert!(rt.should_break(hash_basename("main.rs"), 42));

        write_breakpoints(&dir, "breakpoints: [ { file: \"src/util.rs\", line: 7 } ]");
        rt.reload_breakpoints();
        assert!(!rt.should_break(hash_basename("main.rs"), 42));
        assert!(rt.should_break(hash_basename("util.rs"), 7));
        assert_eq!(rt.breakpoints().len(), 1);
    }

    #[test]
    fn test_step_modes() {
        let dir = TempDir::new().unwrap();
        let mut rt = runtime(&dir);
        let here = hash_basename("main.rs");
        let elsewhere = hash_basename("util.rs");

        rt.step = StepMode::StepIn;
        assert!(rt.should_break(elsewhere, 999));

        rt.step = StepMode::StepOver { anchor: here };
        assert!(rt.should_break(here, 1));
        rt.step = StepMode::StepOver { anchor: here };
        assert!(!rt.should_break(elsewhere, 1));
    }

    #[test]
    fn test_pause_on_start_fires_once() {
        let dir = TempDir::new().unwrap();
        let mut config = RuntimeConfig::in_dir(dir.path());
        config.pause_on_start = true;
        let mut rt = Runtime::new(config);

        assert!(rt.should_break(hash_basename("main.rs"), 1));
        assert!(!rt.should_break(hash_basename("main.rs"), 1));
    }

    #[test]
    fn test_silent_mode_never_breaks_or_pauses() {
        let dir = TempDir::new().unwrap();
        write_breakpoints(&dir, "breakpoints: [ { file: \"src/main.rs\", line: 42 } ]");
        let mut config = RuntimeConfig::in_dir(dir.path());
        config.mode = DebugMode::Silent;
        let mut rt = Runtime::new(config);

        assert!(!rt.should_break(hash_basename("main.rs"), 42));

        let names: &[&str] = &[];
        let values: &[&dyn Inspect] = &[];
        rt.pause(&Halt {
            function: "main",
            file: "src/main.rs",
            file_hash: hash_basename("main.rs"),
            line: 42,
            statement: None,
            names,
            values,
        });
        // No rendezvous files may appear in silent mode.
        assert!(!dir.path().join(protocol::STATE_FILE).exists());
    }

    #[test]
    fn test_set_breakpoints_for_file() {
        let dir = TempDir::new().unwrap();
        let mut rt = runtime(&dir);
        rt.set_breakpoints_for_file("src/main.rs", &[3, 9]);

        assert!(rt.should_break(hash_basename("main.rs"), 3));
        assert!(rt.should_break(hash_basename("main.rs"), 9));
        assert!(!rt.should_break(hash_basename("main.rs"), 4));

        rt.set_breakpoints_for_file("src/main.rs", &[4]);
        assert!(!rt.should_break(hash_basename("main.rs"), 3));
        assert!(rt.should_break(hash_basename("main.rs"), 4));
    }

    #[test]
    fn test_ensure_breakpoint_file_creates_parseable_template() {
        let dir = TempDir::new().unwrap();
        let rt = runtime(&dir);
        rt.ensure_breakpoint_file().unwrap();

        let text = fs::read_to_string(dir.path().join(protocol::BREAKPOINT_FILE)).unwrap();
        let entries = bpfile::parse_breakpoint_file(&text).unwrap();
        assert!(entries.is_empty());

        // Idempotent: a second call must not truncate user edits.
        fs::write(
            dir.path().join(protocol::BREAKPOINT_FILE),
            "breakpoints: [ { file: \"a.rs\", line: 1 } ]",
        )
        .unwrap();
        rt.ensure_breakpoint_file().unwrap();
        let text = fs::read_to_string(dir.path().join(protocol::BREAKPOINT_FILE)).unwrap();
        assert!(text.contains("a.rs"));
    }
}
