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

//! The scope-and-edit walker.
//!
//! One pass over every function body, descending through all compound
//! forms, deciding per statement whether to replace a `BREAK;` marker,
//! consume a `STEP;` marker, stage a tracked-variable discard for deletion,
//! or (in step mode) inject a hook before the statement. The scope stack
//! and the planned edits travel together in the walker, so every injection
//! captures exactly the names visible at its point.
//!
//! `const fn` bodies are skipped entirely: constant evaluation cannot call
//! the runtime, which is this design's constant-context guard.

use tree_sitter::Node;

use crate::{
    analysis::{
        globals::Global,
        scope::{collect_pattern_names, ScopeStack},
    },
    instrumentation::{
        codegen, SourceModifications, LEFT_BRACE_PRIORITY, RIGHT_BRACE_PRIORITY,
        STEP_HOOK_PRIORITY,
    },
    source::SourceFile,
};

/// Marker statement replaced with an unconditional halt.
pub const BREAK_MARKER: &str = "BREAK";
/// Marker statement that turns step instrumentation on for the rest of the
/// walk.
pub const STEP_MARKER: &str = "STEP";

/// Statement kinds that receive a step hook. Anything executable qualifies;
/// nested item declarations, empty statements, and trivia do not.
pub fn is_injectable(kind: &str) -> bool {
    matches!(
        kind,
        "assignment_expression"
            | "compound_assignment_expr"
            | "call_expression"
            | "macro_invocation"
            | "return_expression"
            | "break_expression"
            | "continue_expression"
            | "if_expression"
            | "while_expression"
            | "loop_expression"
            | "for_expression"
            | "match_expression"
            | "field_expression"
            | "try_expression"
            | "await_expression"
            | "unary_expression"
            | "index_expression"
            | "parenthesized_expression"
            | "unsafe_block"
    )
}

/// Per-function walk state. Discard deletions are staged here and commit
/// only if the function actually received an injection, which keeps
/// untouched functions byte-identical.
struct FnState {
    name: String,
    injected: bool,
    pending_discards: Vec<u32>,
    /// Lines that already carry a line-start injection.
    injected_lines: Vec<u32>,
}

impl FnState {
    fn new(name: String) -> Self {
        Self { name, injected: false, pending_discards: Vec::new(), injected_lines: Vec::new() }
    }
}

/// Walks a parsed file and accumulates the instrumentation plan.
pub struct Walker<'a> {
    source: &'a SourceFile,
    file_hash: u32,
    globals: &'a [Global],
    mods: SourceModifications,
    scope: ScopeStack,
    step_mode: bool,
    pub breaks_planned: usize,
    pub steps_planned: usize,
    pub discards_removed: usize,
}

impl<'a> Walker<'a> {
    pub fn new(
        source: &'a SourceFile,
        file_hash: u32,
        globals: &'a [Global],
        step_mode: bool,
    ) -> Self {
        Self {
            source,
            file_hash,
            globals,
            mods: SourceModifications::new(),
            scope: ScopeStack::new(),
            step_mode,
            breaks_planned: 0,
            steps_planned: 0,
            discards_removed: 0,
        }
    }

    pub fn finish(self) -> SourceModifications {
        self.mods
    }

    fn text(&self, node: Node<'_>) -> &'a str {
        node.utf8_text(self.source.body().as_bytes()).unwrap_or("")
    }

    pub fn walk(&mut self, root: Node<'_>) {
        let mut cursor = root.walk();
        let items: Vec<Node<'_>> = root.named_children(&mut cursor).collect();
        for item in items {
            self.walk_item(item);
        }
    }

    fn walk_item(&mut self, node: Node<'_>) {
        match node.kind() {
            "function_item" => self.walk_function(node),
            "impl_item" | "trait_item" | "mod_item" => {
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    let members: Vec<Node<'_>> = body.named_children(&mut cursor).collect();
                    for member in members {
                        self.walk_item(member);
                    }
                }
            }
            _ => {}
        }
    }

    fn walk_function(&mut self, node: Node<'_>) {
        if self.is_const_fn(node) {
            return;
        }
        let Some(body) = node.child_by_field_name("body") else { return };
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string())
            .unwrap_or_else(|| "<anonymous>".to_string());

        let depth = self.scope.depth();
        if let Some(params) = node.child_by_field_name("parameters") {
            self.push_parameters(params);
        }

        let mut fn_state = FnState::new(name);
        self.walk_block(body, &mut fn_state);
        self.scope.truncate(depth);

        if fn_state.injected {
            for line in fn_state.pending_discards {
                self.plan_discard_deletion(line);
            }
        }
    }

    /// Nested functions do not close over enclosing locals; the scope is
    /// swapped out for the duration.
    fn walk_nested_function(&mut self, node: Node<'_>) {
        let saved = std::mem::take(&mut self.scope);
        self.walk_function(node);
        self.scope = saved;
    }

    fn is_const_fn(&self, node: Node<'_>) -> bool {
        (0..node.child_count())
            .filter_map(|i| node.child(i))
            .any(|c| c.kind() == "function_modifiers" && self.text(c).contains("const"))
    }

    fn push_parameters(&mut self, params: Node<'_>) {
        let mut cursor = params.walk();
        let children: Vec<Node<'_>> = params.named_children(&mut cursor).collect();
        let mut names = Vec::new();
        for param in children {
            match param.kind() {
                "parameter" => {
                    if let Some(pattern) = param.child_by_field_name("pattern") {
                        collect_pattern_names(pattern, self.source.body(), &mut names);
                    }
                }
                // `self` has no nameable Inspect capture; skipped.
                "self_parameter" => {}
                _ => collect_pattern_names(param, self.source.body(), &mut names),
            }
        }
        for name in names {
            self.scope.push(name);
        }
    }

    fn walk_block(&mut self, block: Node<'_>, fn_state: &mut FnState) {
        let depth = self.scope.depth();
        let mut cursor = block.walk();
        let children: Vec<Node<'_>> = block.named_children(&mut cursor).collect();
        for child in children {
            self.walk_statement(child, fn_state);
        }
        self.scope.truncate(depth);
    }

    fn walk_statement(&mut self, node: Node<'_>, fn_state: &mut FnState) {
        match node.kind() {
            "let_declaration" => self.handle_let(node, fn_state),
            "expression_statement" => self.handle_expression_statement(node, fn_state),
            "function_item" => self.walk_nested_function(node),
            "impl_item" | "trait_item" | "mod_item" => self.walk_item(node),
            "empty_statement" | "attribute_item" | "inner_attribute_item" | "line_comment"
            | "block_comment" => {}
            // Other item declarations inside bodies are not executable.
            "struct_item" | "enum_item" | "union_item" | "type_item" | "use_declaration"
            | "const_item" | "static_item" | "macro_definition" | "extern_crate_declaration" => {}
            // A block's tail expression stands as its own child.
            kind => {
                if self.step_mode && is_injectable(kind) && !preceded_by_attribute(node) {
                    self.plan_step_injection(node, fn_state);
                }
                self.walk_expression(node, fn_state);
            }
        }
    }

    fn handle_let(&mut self, node: Node<'_>, fn_state: &mut FnState) {
        // `let _ = name;` of a tracked name is a discard.
        if let (Some(pattern), Some(value)) =
            (node.child_by_field_name("pattern"), node.child_by_field_name("value"))
        {
            if self.text(pattern) == "_" && self.is_tracked_discard_target(value) {
                fn_state.pending_discards.push(start_line(node));
                return;
            }
        }

        if self.step_mode
            && node.child_by_field_name("value").is_some()
            && !preceded_by_attribute(node)
        {
            self.plan_step_injection(node, fn_state);
        }

        if let Some(value) = node.child_by_field_name("value") {
            self.walk_expression(value, fn_state);
        }
        // let-else diverging block.
        if let Some(alternative) = node.child_by_field_name("alternative") {
            if alternative.kind() == "block" {
                self.walk_block(alternative, fn_state);
            } else if let Some(block) = first_child_of_kind(alternative, "block") {
                self.walk_block(block, fn_state);
            }
        }

        if let Some(pattern) = node.child_by_field_name("pattern") {
            let mut names = Vec::new();
            collect_pattern_names(pattern, self.source.body(), &mut names);
            for name in names {
                self.scope.push(name);
            }
        }
    }

    fn handle_expression_statement(&mut self, node: Node<'_>, fn_state: &mut FnState) {
        let Some(expr) = node.named_child(0) else { return };

        if expr.kind() == "identifier" {
            match self.text(expr) {
                BREAK_MARKER => {
                    self.plan_break_replacement(node, fn_state);
                    return;
                }
                STEP_MARKER => {
                    self.step_mode = true;
                    self.plan_marker_deletion(node);
                    return;
                }
                _ => {}
            }
        }

        // `_ = name;`, the destructuring-assignment discard form.
        if expr.kind() == "assignment_expression" {
            if let (Some(left), Some(right)) =
                (expr.child_by_field_name("left"), expr.child_by_field_name("right"))
            {
                if self.text(left) == "_" && self.is_tracked_discard_target(right) {
                    fn_state.pending_discards.push(start_line(node));
                    return;
                }
            }
        }

        if self.step_mode && is_injectable(expr.kind()) && !preceded_by_attribute(node) {
            self.plan_step_injection(node, fn_state);
        }
        self.walk_expression(expr, fn_state);
    }

    fn is_tracked_discard_target(&self, value: Node<'_>) -> bool {
        if value.kind() != "identifier" {
            return false;
        }
        let name = self.text(value);
        self.scope.contains(name) || self.globals.iter().any(|g| g.name == name)
    }

    fn walk_expression(&mut self, node: Node<'_>, fn_state: &mut FnState) {
        match node.kind() {
            "if_expression" => {
                let depth = self.scope.depth();
                if let Some(condition) = node.child_by_field_name("condition") {
                    self.walk_expression(condition, fn_state);
                    self.push_let_condition_bindings(condition);
                }
                if let Some(consequence) = node.child_by_field_name("consequence") {
                    self.walk_block(consequence, fn_state);
                }
                self.scope.truncate(depth);
                if let Some(alternative) = node.child_by_field_name("alternative") {
                    // else_clause wraps either a block or a chained if.
                    let mut cursor = alternative.walk();
                    let children: Vec<Node<'_>> =
                        alternative.named_children(&mut cursor).collect();
                    for child in children {
                        match child.kind() {
                            "block" => self.walk_block(child, fn_state),
                            "if_expression" => self.walk_expression(child, fn_state),
                            _ => {}
                        }
                    }
                }
            }
            "while_expression" => {
                let depth = self.scope.depth();
                if let Some(condition) = node.child_by_field_name("condition") {
                    self.walk_expression(condition, fn_state);
                    self.push_let_condition_bindings(condition);
                }
                if let Some(body) = node.child_by_field_name("body") {
                    self.walk_block(body, fn_state);
                }
                self.scope.truncate(depth);
            }
            "loop_expression" => {
                if let Some(body) = node.child_by_field_name("body") {
                    self.walk_block(body, fn_state);
                }
            }
            "for_expression" => {
                let depth = self.scope.depth();
                if let Some(value) = node.child_by_field_name("value") {
                    self.walk_expression(value, fn_state);
                }
                if let Some(pattern) = node.child_by_field_name("pattern") {
                    let mut names = Vec::new();
                    collect_pattern_names(pattern, self.source.body(), &mut names);
                    for name in names {
                        self.scope.push(name);
                    }
                }
                if let Some(body) = node.child_by_field_name("body") {
                    self.walk_block(body, fn_state);
                }
                self.scope.truncate(depth);
            }
            "match_expression" => {
                if let Some(value) = node.child_by_field_name("value") {
                    self.walk_expression(value, fn_state);
                }
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    let arms: Vec<Node<'_>> = body.named_children(&mut cursor).collect();
                    for arm in arms {
                        if arm.kind() == "match_arm" {
                            self.walk_match_arm(arm, fn_state);
                        }
                    }
                }
            }
            "closure_expression" => self.walk_closure(node, fn_state),
            "block" => self.walk_block(node, fn_state),
            "unsafe_block" | "async_block" | "try_block" => {
                if let Some(block) = first_child_of_kind(node, "block") {
                    self.walk_block(block, fn_state);
                }
            }
            // Default: recurse into value positions; type positions cannot
            // contain injectable statements and are skipped.
            _ => {
                let mut cursor = node.walk();
                if cursor.goto_first_child() {
                    loop {
                        let child = cursor.node();
                        if child.is_named() && cursor.field_name() != Some("type") {
                            self.walk_expression(child, fn_state);
                        }
                        if !cursor.goto_next_sibling() {
                            break;
                        }
                    }
                }
            }
        }
    }

    fn walk_match_arm(&mut self, arm: Node<'_>, fn_state: &mut FnState) {
        let depth = self.scope.depth();
        if let Some(pattern) = arm.child_by_field_name("pattern") {
            let mut names = Vec::new();
            collect_pattern_names(pattern, self.source.body(), &mut names);
            for name in names {
                self.scope.push(name);
            }
            // The guard is carried inside the pattern node.
            if let Some(guard) = pattern.child_by_field_name("condition") {
                self.walk_expression(guard, fn_state);
            }
        }
        if let Some(value) = arm.child_by_field_name("value") {
            if value.kind() == "block" {
                self.walk_block(value, fn_state);
            } else {
                self.plan_wrapped_injection(value, fn_state);
                self.walk_expression(value, fn_state);
            }
        }
        self.scope.truncate(depth);
    }

    fn walk_closure(&mut self, node: Node<'_>, fn_state: &mut FnState) {
        let depth = self.scope.depth();
        if let Some(params) = node.child_by_field_name("parameters") {
            let mut cursor = params.walk();
            let children: Vec<Node<'_>> = params.named_children(&mut cursor).collect();
            let mut names = Vec::new();
            for param in children {
                match param.kind() {
                    "parameter" => {
                        if let Some(pattern) = param.child_by_field_name("pattern") {
                            collect_pattern_names(pattern, self.source.body(), &mut names);
                        }
                    }
                    _ => collect_pattern_names(param, self.source.body(), &mut names),
                }
            }
            for name in names {
                self.scope.push(name);
            }
        }
        if let Some(body) = node.child_by_field_name("body") {
            if body.kind() == "block" {
                self.walk_block(body, fn_state);
            } else {
                self.plan_wrapped_injection(body, fn_state);
                self.walk_expression(body, fn_state);
            }
        }
        self.scope.truncate(depth);
    }

    fn push_let_condition_bindings(&mut self, condition: Node<'_>) {
        if condition.kind() != "let_condition" {
            return;
        }
        if let Some(pattern) = condition.child_by_field_name("pattern") {
            let mut names = Vec::new();
            collect_pattern_names(pattern, self.source.body(), &mut names);
            for name in names {
                self.scope.push(name);
            }
        }
    }

    /// Names visible at an injection point: this file's capturable globals,
    /// then locals in declaration order; a local shadows a global of the
    /// same name.
    fn capture_list(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .globals
            .iter()
            .filter(|g| g.capturable())
            .map(|g| g.name.clone())
            .collect();
        for local in self.scope.names() {
            names.retain(|existing| existing != local);
            names.push(local.clone());
        }
        names
    }

    fn plan_break_replacement(&mut self, node: Node<'_>, fn_state: &mut FnState) {
        let line = start_line(node);
        let (start, end) = self.source.line_range(line);
        let indent = self.source.line_indent(line);
        let call = codegen::break_call(&fn_state.name, self.file_hash, line, &self.capture_list());
        if self.mods.replace(start, end - start, format!("{indent}{call}")) {
            fn_state.injected = true;
            fn_state.injected_lines.push(line);
            self.breaks_planned += 1;
        }
    }

    /// `STEP;` leaves no output; the line is blanked.
    fn plan_marker_deletion(&mut self, node: Node<'_>) {
        let line = start_line(node);
        let (start, end) = self.source.line_range(line);
        self.mods.delete(start, end - start);
    }

    fn plan_step_injection(&mut self, node: Node<'_>, fn_state: &mut FnState) {
        let line = start_line(node);
        if fn_state.injected_lines.contains(&line) {
            return;
        }
        let (line_start, _) = self.source.line_range(line);
        let indent = self.source.line_indent(line);
        let call = codegen::step_call(
            &fn_state.name,
            self.file_hash,
            line,
            self.source.line_text(line),
            &self.capture_list(),
        );
        if self.mods.insert(line_start, format!("{indent}{call}\n"), STEP_HOOK_PRIORITY) {
            fn_state.injected = true;
            fn_state.injected_lines.push(line);
            self.steps_planned += 1;
        }
    }

    /// Expression-bodied match arms and closures have no statement position;
    /// the body is wrapped in braces and the hook lands inside. Wrapping an
    /// expression in a block never changes its value, so any body kind
    /// qualifies.
    fn plan_wrapped_injection(&mut self, expr: Node<'_>, fn_state: &mut FnState) {
        if !self.step_mode {
            return;
        }
        let line = start_line(expr);
        let call = codegen::step_call(
            &fn_state.name,
            self.file_hash,
            line,
            self.source.line_text(line),
            &self.capture_list(),
        );
        let start = expr.start_byte();
        let end = expr.end_byte();
        if self.mods.insert(start, "{ ", LEFT_BRACE_PRIORITY)
            && self.mods.insert(start, format!("{call} "), STEP_HOOK_PRIORITY)
            && self.mods.insert(end, " }", RIGHT_BRACE_PRIORITY)
        {
            fn_state.injected = true;
            self.steps_planned += 1;
        }
    }

    /// Commits one staged discard deletion, unless another edit already
    /// touches that line.
    fn plan_discard_deletion(&mut self, line: u32) {
        let (start, end) = self.source.line_range(line);
        if self.mods.intersects_range(start, end) {
            return;
        }
        if self.mods.delete(start, end - start) {
            self.discards_removed += 1;
        }
    }
}

fn start_line(node: Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

fn preceded_by_attribute(node: Node<'_>) -> bool {
    node.prev_named_sibling().is_some_and(|prev| prev.kind() == "attribute_item")
}

fn first_child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    (0..node.named_child_count()).filter_map(|i| node.named_child(i)).find(|c| c.kind() == kind)
}
