use crate::model::{Call, Import, Inheritance, Symbol};
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use tree_sitter::{Node, Tree};

/// Best-effort parse output. `error_free` is false when the grammar reported
/// syntax errors; the tree is still traversable.
pub struct ParsedTree {
    pub tree: Tree,
    pub error_free: bool,
}

/// Immutable per-file context threaded through the resolvers. Built once per
/// file, after imports are extracted and before inheritance or call
/// resolution starts.
pub struct FileContext<'a> {
    pub namespace: &'a str,
    pub alias_map: &'a BTreeMap<String, String>,
    pub project_namespaces: &'a BTreeSet<String>,
    pub include_decorator_calls: bool,
    pub max_calls: usize,
}

/// One implementation per supported language. Adding a language means adding
/// one adapter; shared logic never branches on a language tag.
pub trait LanguageAdapter: Send {
    fn language(&self) -> &'static str;

    /// Namespace separator (`.` everywhere except PHP's `\`).
    fn separator(&self) -> &'static str {
        "."
    }

    /// Fixed suffix appended to a resolved constructor callee. One format
    /// per language, never varied per call site.
    fn constructor_suffix(&self) -> &'static str;

    /// Standard-library root types that resolve without alias or namespace,
    /// e.g. `Exception` -> `java.lang.Exception`.
    fn implicit_parent(&self, name: &str) -> Option<String>;

    /// Never fails on malformed input; syntax errors surface as
    /// `error_free == false`.
    fn parse(&mut self, source: &str) -> Result<ParsedTree>;

    fn namespace(&self, parsed: &ParsedTree, source: &str, rel_path: &str) -> String;

    fn module_documentation(&self, _parsed: &ParsedTree, _source: &str) -> Option<String> {
        None
    }

    fn extract_symbols(&self, parsed: &ParsedTree, source: &str) -> Vec<Symbol>;

    /// `rel_path` locates the file for languages whose import specifiers are
    /// relative to it.
    fn extract_imports(&self, parsed: &ParsedTree, source: &str, rel_path: &str) -> Vec<Import>;

    fn extract_inheritances(
        &self,
        parsed: &ParsedTree,
        source: &str,
        ctx: &FileContext<'_>,
    ) -> Vec<Inheritance>;

    fn extract_calls(&self, parsed: &ParsedTree, source: &str, ctx: &FileContext<'_>)
    -> Vec<Call>;
}

/// Pushes `node`'s named children onto an explicit work stack in reverse
/// order, so popping yields them in source order. All adapters traverse with
/// a stack instead of recursion; deeply nested input must not overflow the
/// call stack.
pub fn push_named_children<'t, S: Clone>(
    stack: &mut Vec<(Node<'t>, S)>,
    node: Node<'t>,
    scope: &S,
) {
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
    for child in children.into_iter().rev() {
        stack.push((child, scope.clone()));
    }
}

pub fn node_text(node: Node<'_>, source: &str) -> String {
    source
        .get(node.start_byte()..node.end_byte())
        .unwrap_or("")
        .trim()
        .to_string()
}

/// 1-based inclusive line span.
pub fn line_span(node: Node<'_>) -> (i64, i64) {
    (
        node.start_position().row as i64 + 1,
        node.end_position().row as i64 + 1,
    )
}

pub fn line_number(node: Node<'_>) -> i64 {
    node.start_position().row as i64 + 1
}

/// First line of the declaration, used as the rendered signature when the
/// grammar has no better field to offer.
pub fn first_line(node: Node<'_>, source: &str) -> String {
    let text = node_text(node, source);
    text.lines().next().unwrap_or("").trim().to_string()
}

/// Documentation block attached immediately before a declaration
/// (`/** ... */`). Strips the comment fence and leading `*` gutters.
pub fn doc_comment_before(node: Node<'_>, source: &str) -> Option<String> {
    let prev = node.prev_named_sibling()?;
    if !prev.kind().contains("comment") {
        return None;
    }
    let raw = node_text(prev, source);
    if !raw.starts_with("/**") {
        return None;
    }
    Some(clean_block_comment(&raw))
}

pub fn clean_block_comment(raw: &str) -> String {
    let inner = raw
        .trim_start_matches("/**")
        .trim_start_matches("/*")
        .trim_end_matches("*/");
    let mut lines = Vec::new();
    for line in inner.lines() {
        let line = line.trim().trim_start_matches('*').trim();
        if !line.is_empty() || !lines.is_empty() {
            lines.push(line.to_string());
        }
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// Counts call arguments syntactically. Returns `None` when the list holds a
/// spread whose length is not statically known.
pub fn count_arguments(
    args: Node<'_>,
    is_spread: fn(&str) -> bool,
) -> Option<i64> {
    let mut count = 0;
    let mut cursor = args.walk();
    for child in args.named_children(&mut cursor) {
        if child.kind().contains("comment") {
            continue;
        }
        if is_spread(child.kind()) {
            return None;
        }
        count += 1;
    }
    Some(count)
}
