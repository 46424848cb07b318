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

//! idb Engine - the instrumenting source transformer.
//!
//! Given a Rust source file, emits a semantically equivalent file with
//! debug calls injected at explicit `BREAK;` markers and (in step mode)
//! before every candidate statement. The pipeline:
//!
//! 1. cheap marker scan — files without debugging needs pass through
//!    verbatim (build descriptors get only the path rewrite);
//! 2. parse with tree-sitter — a file with syntax errors also passes
//!    through, the transformer never corrupts a build input;
//! 3. scan file-level globals;
//! 4. walk every function, accumulating textual edits with live scope
//!    tracking;
//! 5. plan the header import, sort the edits, apply them in one pass.

use std::{fs, path::Path};

use eyre::{Result, WrapErr};

pub mod analysis;
pub mod buildfile;
pub mod instrumentation;
pub mod source;

use analysis::{scan_globals, Walker, BREAK_MARKER, STEP_MARKER};
use idb_common::hash_basename;
use instrumentation::{codegen, LEFT_BRACE_PRIORITY};
use source::SourceFile;

/// Transformer settings from the CLI.
#[derive(Debug, Clone)]
pub struct TransformOptions {
    /// Instrument every candidate statement, not just explicit markers.
    pub step_mode: bool,
    /// Crate imported under the `debug` alias by the header.
    pub runtime_crate: String,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self { step_mode: false, runtime_crate: codegen::DEFAULT_RUNTIME_CRATE.to_string() }
    }
}

/// What the transformer did with a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Instrumented { edits: usize, globals: usize },
    BuildFileRewrite { rewrites: usize },
    NoDebugNeeded,
    AlreadyInstrumented,
    ParseErrors,
}

impl Outcome {
    /// The parenthesized tail of the one-line stderr summary.
    pub fn summary(&self) -> String {
        match self {
            Self::Instrumented { edits, globals } => {
                format!("({edits} edits, {globals} globals)")
            }
            Self::BuildFileRewrite { rewrites } => {
                format!("(build file, {rewrites} paths rewritten)")
            }
            Self::NoDebugNeeded | Self::AlreadyInstrumented => "(no debug needed)".to_string(),
            Self::ParseErrors => "(parse errors, passed through)".to_string(),
        }
    }
}

/// A finished transformation.
#[derive(Debug)]
pub struct Transformed {
    pub text: String,
    pub outcome: Outcome,
}

/// Transforms one file on disk and writes the result, creating the output
/// directory if needed. Emits the one-line summary on stderr.
pub fn transform_file(input: &Path, output: &Path, options: &TransformOptions) -> Result<Outcome> {
    let raw = fs::read_to_string(input)
        .wrap_err_with(|| format!("reading {}", input.display()))?;
    let file_name = input.to_string_lossy();
    let transformed = transform_source(&file_name, raw, options)?;

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .wrap_err_with(|| format!("creating {}", parent.display()))?;
        }
    }
    fs::write(output, &transformed.text)
        .wrap_err_with(|| format!("writing {}", output.display()))?;

    eprintln!(
        "Preprocessed {} -> {} {}",
        input.display(),
        output.display(),
        transformed.outcome.summary()
    );
    Ok(transformed.outcome)
}

/// Transforms source text. `file_name` is the path as the build system
/// passes it; its basename feeds the compile-time file hash.
pub fn transform_source(
    file_name: &str,
    raw: String,
    options: &TransformOptions,
) -> Result<Transformed> {
    let source = SourceFile::new(raw)?;

    let wants_debug = has_markers(source.body()) || options.step_mode;
    if !wants_debug {
        if buildfile::is_build_file_name(file_name) {
            let (text, rewrites) = buildfile::rewrite_build_file(source.body());
            return Ok(Transformed {
                text: format!("{}{}", source.bom(), text),
                outcome: Outcome::BuildFileRewrite { rewrites },
            });
        }
        return Ok(pass_through(source, Outcome::NoDebugNeeded));
    }

    // Our own output never gets a second pass.
    if codegen::has_header_marker(source.body()) {
        return Ok(pass_through(source, Outcome::AlreadyInstrumented));
    }

    let tree = match parse_rust(source.body()) {
        Ok(tree) => tree,
        Err(e) => {
            tracing::warn!(file = file_name, error = %e, "parser unavailable, passing through");
            return Ok(pass_through(source, Outcome::ParseErrors));
        }
    };
    if tree.root_node().has_error() {
        tracing::warn!(file = file_name, "syntax errors, passing through");
        return Ok(pass_through(source, Outcome::ParseErrors));
    }

    let globals = scan_globals(tree.root_node(), source.body());
    let file_hash = hash_basename(file_name);
    let mut walker = Walker::new(&source, file_hash, &globals, options.step_mode);
    walker.walk(tree.root_node());
    tracing::debug!(
        file = file_name,
        breaks = walker.breaks_planned,
        steps = walker.steps_planned,
        discards = walker.discards_removed,
        globals = globals.len(),
        "walk complete"
    );
    let mut mods = walker.finish();

    if mods.is_empty() {
        return Ok(pass_through(source, Outcome::NoDebugNeeded));
    }

    if !codegen::has_runtime_import(source.body(), &options.runtime_crate) {
        let offset = header_insertion_offset(&tree);
        mods.insert(offset, codegen::header(&options.runtime_crate), LEFT_BRACE_PRIORITY);
    }

    let edits = mods.len();
    let text = format!("{}{}", source.bom(), mods.apply(source.body()));
    Ok(Transformed {
        text,
        outcome: Outcome::Instrumented { edits, globals: globals.len() },
    })
}

fn pass_through(source: SourceFile, outcome: Outcome) -> Transformed {
    Transformed { text: format!("{}{}", source.bom(), source.body()), outcome }
}

/// The cheap pre-parse scan for the marker sentinels. False positives just
/// mean a wasted parse; the walker decides for real.
fn has_markers(body: &str) -> bool {
    body.contains(BREAK_MARKER) || body.contains(STEP_MARKER)
}

fn parse_rust(body: &str) -> Result<tree_sitter::Tree> {
    let mut parser = tree_sitter::Parser::new();
    let language: tree_sitter::Language = tree_sitter_rust::LANGUAGE.into();
    parser
        .set_language(&language)
        .map_err(|e| eyre::eyre!("loading Rust grammar: {e}"))?;
    parser.parse(body, None).ok_or_else(|| eyre::eyre!("parser produced no tree"))
}

/// Header goes after the optional BOM (already stripped here), the leading
/// comment block, and any `#![...]` inner attributes, which Rust requires
/// to stay first.
fn header_insertion_offset(tree: &tree_sitter::Tree) -> usize {
    let root = tree.root_node();
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "line_comment" | "block_comment" | "inner_attribute_item" | "shebang" => continue,
            _ => return child.start_byte(),
        }
    }
    root.end_byte()
}
