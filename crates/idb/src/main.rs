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

//! idb - a source-level debugger built by compile-time instrumentation.
//!
//! This binary is the transformer CLI a host build system invokes per
//! source file. Exit codes: 0 on success (pass-through included), 2 on
//! usage errors (clap's default), non-zero on unrecoverable I/O.

use std::path::PathBuf;

use clap::Parser;
use eyre::Result;
use idb_engine::{transform_file, TransformOptions};

/// Instruments a Rust source file with debug calls.
#[derive(Debug, Parser)]
#[command(name = "idb")]
#[command(about = "Source-level debugger for Rust - instrumenting transformer")]
#[command(version)]
struct Cli {
    /// Source file to transform
    input: PathBuf,

    /// Where to write the transformed file
    output: PathBuf,

    /// Instrument every candidate statement, not just explicit markers
    #[arg(long)]
    step: bool,

    /// Runtime crate imported by instrumented files (under the `debug`
    /// alias)
    #[arg(long = "runtime-crate", alias = "runtime-path", default_value = "idb_runtime")]
    runtime_crate: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    idb_utils::init_logging("idb")?;

    let options = TransformOptions { step_mode: cli.step, runtime_crate: cli.runtime_crate };
    let outcome = transform_file(&cli.input, &cli.output, &options)?;
    tracing::debug!(?outcome, "transform finished");

    Ok(())
}
