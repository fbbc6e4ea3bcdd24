use crate::engine::adapter::{
    FileContext, LanguageAdapter, ParsedTree, count_arguments, first_line, line_number,
    line_span, node_text, push_named_children,
};
use crate::engine::resolve;
use crate::model::{Call, CallType, Import, Inheritance, Symbol, SymbolKind};
use anyhow::{Result, anyhow};
use std::path::Path;
use tree_sitter::{Node, Parser};

pub struct PythonAdapter {
    parser: Parser,
}

impl PythonAdapter {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_python::LANGUAGE;
        parser.set_language(&language.into())?;
        Ok(Self { parser })
    }
}

/// Scope carried through the explicit traversal stack.
#[derive(Clone, Default)]
struct Scope {
    class_stack: Vec<String>,
    fn_stack: Vec<String>,
}

impl Scope {
    fn caller(&self, namespace: &str) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if !namespace.is_empty() {
            parts.push(namespace);
        }
        parts.extend(self.class_stack.iter().map(String::as_str));
        parts.extend(self.fn_stack.iter().map(String::as_str));
        if parts.is_empty() {
            String::new()
        } else {
            parts.join(".")
        }
    }

    fn container(&self, namespace: &str) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if !namespace.is_empty() {
            parts.push(namespace);
        }
        parts.extend(self.class_stack.iter().map(String::as_str));
        parts.join(".")
    }
}

impl LanguageAdapter for PythonAdapter {
    fn language(&self) -> &'static str {
        "python"
    }

    fn constructor_suffix(&self) -> &'static str {
        "__init__"
    }

    fn implicit_parent(&self, name: &str) -> Option<String> {
        const BUILTINS: &[&str] = &[
            "object",
            "BaseException",
            "Exception",
            "ValueError",
            "TypeError",
            "KeyError",
            "RuntimeError",
            "NotImplementedError",
            "StopIteration",
            "Enum",
            "IntEnum",
            "ABC",
        ];
        BUILTINS.contains(&name).then(|| name.to_string())
    }

    fn parse(&mut self, source: &str) -> Result<ParsedTree> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| anyhow!("python parser produced no tree"))?;
        let error_free = !tree.root_node().has_error();
        Ok(ParsedTree { tree, error_free })
    }

    fn namespace(&self, _parsed: &ParsedTree, _source: &str, rel_path: &str) -> String {
        module_name_from_rel_path(rel_path)
    }

    fn module_documentation(&self, parsed: &ParsedTree, source: &str) -> Option<String> {
        docstring_of(parsed.tree.root_node(), source)
    }

    fn extract_symbols(&self, parsed: &ParsedTree, source: &str) -> Vec<Symbol> {
        let mut symbols = Vec::new();
        let mut stack: Vec<(Node<'_>, usize)> = vec![(parsed.tree.root_node(), 0)];
        while let Some((node, class_depth)) = stack.pop() {
            match node.kind() {
                "decorated_definition" => {
                    if let Some(definition) = node.child_by_field_name("definition") {
                        stack.push((definition, class_depth));
                    }
                }
                "class_definition" => {
                    if let Some(name_node) = node.child_by_field_name("name") {
                        let (line_start, line_end) = line_span(node);
                        symbols.push(Symbol {
                            name: node_text(name_node, source),
                            kind: SymbolKind::Class,
                            signature: signature_line(node, source),
                            line_start,
                            line_end,
                            documentation: node
                                .child_by_field_name("body")
                                .and_then(|body| docstring_of(body, source)),
                        });
                        if let Some(body) = node.child_by_field_name("body") {
                            push_named_children(&mut stack, body, &(class_depth + 1));
                        }
                    }
                }
                "function_definition" => {
                    if let Some(name_node) = node.child_by_field_name("name") {
                        let kind = if class_depth > 0 {
                            SymbolKind::Method
                        } else {
                            SymbolKind::Function
                        };
                        let (line_start, line_end) = line_span(node);
                        symbols.push(Symbol {
                            name: node_text(name_node, source),
                            kind,
                            signature: signature_line(node, source),
                            line_start,
                            line_end,
                            documentation: node
                                .child_by_field_name("body")
                                .and_then(|body| docstring_of(body, source)),
                        });
                        // Nested defs are not standalone symbols.
                    }
                }
                _ => push_named_children(&mut stack, node, &class_depth),
            }
        }
        symbols
    }

    fn extract_imports(&self, parsed: &ParsedTree, source: &str, _rel_path: &str) -> Vec<Import> {
        let mut imports = Vec::new();
        let mut stack: Vec<(Node<'_>, ())> = vec![(parsed.tree.root_node(), ())];
        while let Some((node, ())) = stack.pop() {
            match node.kind() {
                "import_statement" => {
                    let mut cursor = node.walk();
                    for child in node.named_children(&mut cursor) {
                        match child.kind() {
                            "dotted_name" => imports.push(Import {
                                module: node_text(child, source),
                                imported_names: Vec::new(),
                                alias: None,
                                is_scoped_import: false,
                            }),
                            "aliased_import" => {
                                let module = child
                                    .child_by_field_name("name")
                                    .map(|n| node_text(n, source))
                                    .unwrap_or_default();
                                let alias = child
                                    .child_by_field_name("alias")
                                    .map(|n| node_text(n, source));
                                imports.push(Import {
                                    module,
                                    imported_names: Vec::new(),
                                    alias,
                                    is_scoped_import: false,
                                });
                            }
                            _ => {}
                        }
                    }
                }
                "import_from_statement" => {
                    let module = node
                        .child_by_field_name("module_name")
                        .map(|n| node_text(n, source))
                        .unwrap_or_default();
                    let mut cursor = node.walk();
                    for child in node.named_children(&mut cursor) {
                        if Some(child) == node.child_by_field_name("module_name") {
                            continue;
                        }
                        match child.kind() {
                            "dotted_name" | "identifier" => imports.push(Import {
                                module: module.clone(),
                                imported_names: vec![node_text(child, source)],
                                alias: None,
                                is_scoped_import: true,
                            }),
                            "aliased_import" => {
                                let name = child
                                    .child_by_field_name("name")
                                    .map(|n| node_text(n, source))
                                    .unwrap_or_default();
                                let alias = child
                                    .child_by_field_name("alias")
                                    .map(|n| node_text(n, source));
                                imports.push(Import {
                                    module: module.clone(),
                                    imported_names: vec![name],
                                    alias,
                                    is_scoped_import: true,
                                });
                            }
                            "wildcard_import" => imports.push(Import {
                                module: module.clone(),
                                imported_names: vec!["*".to_string()],
                                alias: None,
                                is_scoped_import: true,
                            }),
                            _ => {}
                        }
                    }
                }
                // Imports below module level still bind names; descend.
                _ => push_named_children(&mut stack, node, &()),
            }
        }
        imports
    }

    fn extract_inheritances(
        &self,
        parsed: &ParsedTree,
        source: &str,
        ctx: &FileContext<'_>,
    ) -> Vec<Inheritance> {
        let mut edges = Vec::new();
        let mut stack: Vec<(Node<'_>, Vec<String>)> =
            vec![(parsed.tree.root_node(), Vec::new())];
        while let Some((node, class_stack)) = stack.pop() {
            match node.kind() {
                "decorated_definition" => {
                    if let Some(definition) = node.child_by_field_name("definition") {
                        stack.push((definition, class_stack));
                    }
                }
                "class_definition" => {
                    let Some(name_node) = node.child_by_field_name("name") else {
                        continue;
                    };
                    let name = node_text(name_node, source);
                    let mut chain = class_stack.clone();
                    chain.push(name);
                    let child_fqn = resolve::qualify(&chain.join("."), ctx.namespace, ".");
                    if let Some(superclasses) = node.child_by_field_name("superclasses") {
                        let mut cursor = superclasses.walk();
                        for parent_node in superclasses.named_children(&mut cursor) {
                            // metaclass= and other keyword arguments are not parents
                            if parent_node.kind() == "keyword_argument"
                                || parent_node.kind() == "comment"
                            {
                                continue;
                            }
                            let raw = node_text(parent_node, source);
                            if raw.is_empty() {
                                continue;
                            }
                            let stripped = resolve::strip_generics(&raw);
                            let parent = resolve::resolve_parent(
                                &stripped,
                                self.implicit_parent(&stripped),
                                ctx.alias_map,
                                ctx.namespace,
                                ".",
                            );
                            edges.push(Inheritance {
                                child: child_fqn.clone(),
                                parent,
                            });
                        }
                    }
                    if let Some(body) = node.child_by_field_name("body") {
                        push_named_children(&mut stack, body, &chain);
                    }
                }
                _ => push_named_children(&mut stack, node, &class_stack),
            }
        }
        edges
    }

    fn extract_calls(
        &self,
        parsed: &ParsedTree,
        source: &str,
        ctx: &FileContext<'_>,
    ) -> Vec<Call> {
        let mut calls = Vec::new();
        let mut stack: Vec<(Node<'_>, Scope)> =
            vec![(parsed.tree.root_node(), Scope::default())];
        while let Some((node, scope)) = stack.pop() {
            if calls.len() >= ctx.max_calls {
                tracing::warn!(max = ctx.max_calls, "call cap reached, truncating");
                break;
            }
            match node.kind() {
                "decorated_definition" => {
                    self.collect_decorator_calls(node, &scope, source, ctx, &mut calls);
                    if let Some(definition) = node.child_by_field_name("definition") {
                        stack.push((definition, scope));
                    }
                }
                "class_definition" => {
                    let name = node
                        .child_by_field_name("name")
                        .map(|n| node_text(n, source))
                        .unwrap_or_default();
                    let mut next = scope.clone();
                    next.class_stack.push(name);
                    if let Some(body) = node.child_by_field_name("body") {
                        push_named_children(&mut stack, body, &next);
                    }
                }
                "function_definition" => {
                    let name = node
                        .child_by_field_name("name")
                        .map(|n| node_text(n, source))
                        .unwrap_or_default();
                    let mut next = scope.clone();
                    next.fn_stack.push(name);
                    if let Some(body) = node.child_by_field_name("body") {
                        push_named_children(&mut stack, body, &next);
                    }
                }
                "call" => {
                    if let Some(call) = self.call_record(node, &scope, source, ctx) {
                        calls.push(call);
                    }
                    // Nested calls in arguments still count as call sites.
                    push_named_children(&mut stack, node, &scope);
                }
                _ => push_named_children(&mut stack, node, &scope),
            }
        }
        calls
    }
}

impl PythonAdapter {
    fn call_record(
        &self,
        node: Node<'_>,
        scope: &Scope,
        source: &str,
        ctx: &FileContext<'_>,
    ) -> Option<Call> {
        let function = node.child_by_field_name("function")?;
        let caller = scope.caller(ctx.namespace);
        let line = line_number(node);
        let args_count = node
            .child_by_field_name("arguments")
            .and_then(|args| count_arguments(args, is_spread));

        match function.kind() {
            "identifier" => {
                let name = node_text(function, source);
                if name == "getattr" || name == "eval" || name == "exec" {
                    return Some(Call {
                        caller,
                        callee: None,
                        line_number: line,
                        call_type: CallType::Dynamic,
                        arguments_count: args_count,
                    });
                }
                let resolved = resolve::resolve_alias(&name, ctx.alias_map, ".");
                let was_bare = resolved == name;
                let qualified = resolve::qualify(&resolved, ctx.namespace, ".");
                if !resolve::is_project_internal(&qualified, was_bare, ctx.project_namespaces, ".")
                {
                    return None;
                }
                if resolve::starts_uppercase(&name) {
                    Some(Call {
                        caller,
                        callee: Some(format!("{qualified}.{}", self.constructor_suffix())),
                        line_number: line,
                        call_type: CallType::Constructor,
                        arguments_count: args_count,
                    })
                } else {
                    Some(Call {
                        caller,
                        callee: Some(qualified),
                        line_number: line,
                        call_type: CallType::Function,
                        arguments_count: args_count,
                    })
                }
            }
            "attribute" => {
                let object = function.child_by_field_name("object")?;
                let attr = function
                    .child_by_field_name("attribute")
                    .map(|n| node_text(n, source))?;
                let object_text = node_text(object, source);
                if object_text == "self" || object_text == "cls" {
                    let container = scope.container(ctx.namespace);
                    let callee = if container.is_empty() {
                        attr
                    } else {
                        format!("{container}.{attr}")
                    };
                    return Some(Call {
                        caller,
                        callee: Some(callee),
                        line_number: line,
                        call_type: CallType::Method,
                        arguments_count: args_count,
                    });
                }
                // Indirection through subscripts or chained calls cannot be
                // named statically.
                if !is_simple_path(&object_text) {
                    return Some(Call {
                        caller,
                        callee: None,
                        line_number: line,
                        call_type: CallType::Dynamic,
                        arguments_count: args_count,
                    });
                }
                let raw = format!("{object_text}.{attr}");
                let resolved = resolve::resolve_alias(&raw, ctx.alias_map, ".");
                let call_type = if resolve::starts_uppercase(&object_text) {
                    CallType::StaticMethod
                } else {
                    CallType::Method
                };
                let callee = if resolved == raw && call_type == CallType::StaticMethod {
                    // Same-file class receiver: qualify the receiver, keep
                    // the attribute.
                    format!("{}.{attr}", resolve::qualify(&object_text, ctx.namespace, "."))
                } else {
                    resolved.clone()
                };
                let was_bare = resolved == raw && call_type == CallType::StaticMethod;
                if !resolve::is_project_internal(&callee, was_bare, ctx.project_namespaces, ".") {
                    return None;
                }
                Some(Call {
                    caller,
                    callee: Some(callee),
                    line_number: line,
                    call_type,
                    arguments_count: args_count,
                })
            }
            // getattr(...)(...), obj[key](...), lambdas and other indirection
            _ => Some(Call {
                caller,
                callee: None,
                line_number: line,
                call_type: CallType::Dynamic,
                arguments_count: args_count,
            }),
        }
    }

    /// A bare-name decorator is recorded as a Function call from the scope
    /// enclosing the decorated declaration, with the decorated entity as the
    /// one implicit argument. Decorators with explicit argument lists are
    /// skipped.
    fn collect_decorator_calls(
        &self,
        node: Node<'_>,
        scope: &Scope,
        source: &str,
        ctx: &FileContext<'_>,
        calls: &mut Vec<Call>,
    ) {
        if !ctx.include_decorator_calls {
            return;
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() != "decorator" {
                continue;
            }
            let Some(expr) = child.named_child(0) else {
                continue;
            };
            if expr.kind() != "identifier" {
                continue;
            }
            if calls.len() >= ctx.max_calls {
                return;
            }
            let name = node_text(expr, source);
            let resolved = resolve::resolve_alias(&name, ctx.alias_map, ".");
            let was_bare = resolved == name;
            let qualified = resolve::qualify(&resolved, ctx.namespace, ".");
            if !resolve::is_project_internal(&qualified, was_bare, ctx.project_namespaces, ".") {
                continue;
            }
            calls.push(Call {
                caller: scope.caller(ctx.namespace),
                callee: Some(qualified),
                line_number: line_number(child),
                call_type: CallType::Function,
                arguments_count: Some(1),
            });
        }
    }
}

pub fn module_name_from_rel_path(rel_path: &str) -> String {
    let path = Path::new(rel_path);
    let mut parts: Vec<String> = path
        .components()
        .filter_map(|comp| comp.as_os_str().to_str().map(|s| s.to_string()))
        .collect();
    if parts.is_empty() {
        return String::new();
    }
    let file = parts.pop().unwrap_or_default();
    let stem = Path::new(&file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(&file)
        .to_string();
    if stem != "__init__" {
        parts.push(stem);
    }
    parts.join(".")
}

fn is_spread(kind: &str) -> bool {
    kind == "list_splat" || kind == "dictionary_splat"
}

fn is_simple_path(raw: &str) -> bool {
    !raw.is_empty()
        && raw
            .chars()
            .all(|ch| ch.is_alphanumeric() || ch == '_' || ch == '.')
}

fn signature_line(node: Node<'_>, source: &str) -> String {
    first_line(node, source)
        .trim_end_matches(':')
        .trim()
        .to_string()
}

fn docstring_of(body: Node<'_>, source: &str) -> Option<String> {
    let mut cursor = body.walk();
    let first = body.named_children(&mut cursor).next()?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string_node = first.named_child(0)?;
    if string_node.kind() != "string" {
        return None;
    }
    let raw = node_text(string_node, source);
    unquote(&raw)
}

fn unquote(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    // skip string prefixes like r"" or f""
    let start = trimmed
        .char_indices()
        .find(|(_, ch)| *ch == '"' || *ch == '\'')
        .map(|(idx, _)| idx)?;
    let rest = &trimmed[start..];
    for quote in ["\"\"\"", "'''"] {
        if rest.starts_with(quote) && rest.ends_with(quote) && rest.len() >= 6 {
            return Some(rest[3..rest.len() - 3].trim().to_string());
        }
    }
    for quote in ["\"", "'"] {
        if rest.starts_with(quote) && rest.ends_with(quote) && rest.len() >= 2 {
            return Some(rest[1..rest.len() - 1].trim().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_name_from_path() {
        assert_eq!(module_name_from_rel_path("foo.py"), "foo");
        assert_eq!(module_name_from_rel_path("pkg/__init__.py"), "pkg");
        assert_eq!(module_name_from_rel_path("pkg/sub/mod.py"), "pkg.sub.mod");
    }

    #[test]
    fn unquote_docstrings() {
        assert_eq!(unquote("\"\"\"doc\"\"\"").as_deref(), Some("doc"));
        assert_eq!(unquote("'''doc'''").as_deref(), Some("doc"));
        assert_eq!(unquote("r\"doc\"").as_deref(), Some("doc"));
        assert_eq!(unquote("not a string"), None);
    }
}
