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

//! End-to-end rendezvous tests: a halted runtime on one thread, the test
//! playing the external UI on the other, talking only through the files.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use idb_common::{hash_basename, protocol};
use idb_runtime::{Halt, Inspect, Runtime, RuntimeConfig};

struct Player {
    name: String,
    hp: i32,
}

idb_runtime::inspect_struct!(Player { name, hp });

fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if cond() {
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("timed out waiting for {what}");
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_default()
}

struct Rendezvous {
    state: PathBuf,
    command: PathBuf,
    output: PathBuf,
}

impl Rendezvous {
    fn in_dir(dir: &Path) -> Self {
        Self {
            state: dir.join(protocol::STATE_FILE),
            command: dir.join(protocol::COMMAND_FILE),
            output: dir.join(protocol::OUTPUT_FILE),
        }
    }

    fn send(&self, command: &str) {
        fs::write(&self.command, command).unwrap();
    }
}

/// Halts on a worker thread with a small scope captured.
fn halt_in_background(
    rt: Arc<Mutex<Runtime>>,
    statement: Option<&'static str>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let x = 41i32;
        let player = Player { name: "z".to_string(), hp: 10 };
        let names: &[&str] = &["x", "player"];
        let values: &[&dyn Inspect] = &[&x, &player];
        rt.lock().unwrap().pause(&Halt {
            function: "main",
            file: "src/main.rs",
            file_hash: hash_basename("main.rs"),
            line: 42,
            statement,
            names,
            values,
        });
    })
}

#[test]
fn test_halt_vars_query_and_resume() {
    let dir = tempfile::tempdir().unwrap();
    let files = Rendezvous::in_dir(dir.path());
    let rt = Arc::new(Mutex::new(Runtime::new(RuntimeConfig::in_dir(dir.path()))));

    let worker = halt_in_background(Arc::clone(&rt), None);

    wait_for("stopped state", || read(&files.state).starts_with("status=stopped"));
    let stopped = read(&files.state);
    assert!(stopped.contains("file=src/main.rs\n"));
    assert!(stopped.contains("line=42\n"));
    assert!(stopped.contains("function=main\n"));
    assert!(stopped.contains("  x: i32 = 41\n"));
    assert!(stopped.contains("  player: Player = Player{ name: \"z\" hp: 10 }\n"));

    // Full variable table.
    files.send("vars");
    wait_for("vars output", || read(&files.output).starts_with("=== Variables ==="));
    let vars = read(&files.output);
    assert!(vars.contains("x: i32 = 41\n"));
    assert!(vars.contains("player: Player = Player{"));

    // Field-path query.
    files.send("player.hp");
    wait_for("query output", || read(&files.output).starts_with("hp: i32"));
    assert_eq!(read(&files.output), "hp: i32\n10\n");

    // Unknown names come back as sentences, and the loop keeps serving.
    files.send("ghost");
    wait_for("error output", || read(&files.output).starts_with("Unknown variable"));
    assert_eq!(read(&files.output), "Unknown variable or command: ghost\n");

    files.send("continue");
    worker.join().unwrap();

    assert_eq!(read(&files.state), "status=running\n");
    assert!(!files.command.exists());
    assert!(!files.output.exists());
}

#[test]
fn test_step_halt_reports_statement() {
    let dir = tempfile::tempdir().unwrap();
    let files = Rendezvous::in_dir(dir.path());
    let rt = Arc::new(Mutex::new(Runtime::new(RuntimeConfig::in_dir(dir.path()))));

    let worker = halt_in_background(Arc::clone(&rt), Some("x = x + 1;"));

    wait_for("stopped state", || read(&files.state).starts_with("status=stopped"));
    assert!(read(&files.state).contains("statement=x = x + 1;\n"));

    files.send("c");
    worker.join().unwrap();
}

#[test]
fn test_next_anchors_stepping_to_current_file() {
    let dir = tempfile::tempdir().unwrap();
    let files = Rendezvous::in_dir(dir.path());
    let rt = Arc::new(Mutex::new(Runtime::new(RuntimeConfig::in_dir(dir.path()))));

    let worker = halt_in_background(Arc::clone(&rt), None);
    wait_for("stopped state", || read(&files.state).starts_with("status=stopped"));
    files.send("next");
    worker.join().unwrap();

    {
        let mut rt = rt.lock().unwrap();
        // Same file: the very next statement breaks; a foreign file does not.
        assert!(!rt.should_break(hash_basename("util.rs"), 7));
        assert!(rt.should_break(hash_basename("main.rs"), 43));
    }

    // The landing halt satisfies the step: after it, stepping is off.
    let worker = halt_in_background(Arc::clone(&rt), Some("x = x + 2;"));
    wait_for("stopped state", || read(&files.state).starts_with("status=stopped"));
    files.send("continue");
    worker.join().unwrap();

    let mut rt = rt.lock().unwrap();
    assert!(!rt.should_break(hash_basename("main.rs"), 44));
}

#[test]
fn test_step_breaks_anywhere() {
    let dir = tempfile::tempdir().unwrap();
    let files = Rendezvous::in_dir(dir.path());
    let rt = Arc::new(Mutex::new(Runtime::new(RuntimeConfig::in_dir(dir.path()))));

    let worker = halt_in_background(Arc::clone(&rt), None);
    wait_for("stopped state", || read(&files.state).starts_with("status=stopped"));
    files.send("s");
    worker.join().unwrap();

    let mut rt = rt.lock().unwrap();
    assert!(rt.should_break(hash_basename("somewhere-else.rs"), 1));
}

#[test]
fn test_range_query_over_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let files = Rendezvous::in_dir(dir.path());
    let rt = Arc::new(Mutex::new(Runtime::new(RuntimeConfig::in_dir(dir.path()))));

    let rt2 = Arc::clone(&rt);
    let worker = thread::spawn(move || {
        let items: Vec<u32> = vec![7, 8, 9, 10];
        let names: &[&str] = &["items"];
        let values: &[&dyn Inspect] = &[&items];
        rt2.lock().unwrap().pause(&Halt {
            function: "main",
            file: "src/main.rs",
            file_hash: hash_basename("main.rs"),
            line: 5,
            statement: None,
            names,
            values,
        });
    });

    wait_for("stopped state", || read(&files.state).starts_with("status=stopped"));
    files.send("items[1..3]");
    wait_for("range output", || read(&files.output).starts_with("items[1..3]"));
    assert_eq!(read(&files.output), "items[1..3]: Vec\n[1]: 8\n[2]: 9\n");

    files.send("continue");
    worker.join().unwrap();
}
