use crate::engine::adapter::{
    FileContext, LanguageAdapter, ParsedTree, clean_block_comment, count_arguments,
    doc_comment_before, first_line, line_number, line_span, node_text, push_named_children,
};
use crate::engine::resolve;
use crate::model::{Call, CallType, Import, Inheritance, Symbol, SymbolKind};
use anyhow::{Result, anyhow};
use std::path::Path;
use tree_sitter::{Node, Parser};

pub struct TypeScriptAdapter {
    parser: Parser,
}

impl TypeScriptAdapter {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_typescript::LANGUAGE_TYPESCRIPT;
        parser.set_language(&language.into())?;
        Ok(Self { parser })
    }
}

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
        parts.join(".")
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

impl LanguageAdapter for TypeScriptAdapter {
    fn language(&self) -> &'static str {
        "typescript"
    }

    fn constructor_suffix(&self) -> &'static str {
        "constructor"
    }

    fn implicit_parent(&self, name: &str) -> Option<String> {
        const BUILTINS: &[&str] = &[
            "Error", "TypeError", "RangeError", "Object", "Array", "Map", "Set", "Promise",
        ];
        BUILTINS.contains(&name).then(|| name.to_string())
    }

    fn parse(&mut self, source: &str) -> Result<ParsedTree> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| anyhow!("typescript parser produced no tree"))?;
        let error_free = !tree.root_node().has_error();
        Ok(ParsedTree { tree, error_free })
    }

    fn namespace(&self, _parsed: &ParsedTree, _source: &str, rel_path: &str) -> String {
        module_name_from_rel_path(rel_path)
    }

    fn module_documentation(&self, parsed: &ParsedTree, source: &str) -> Option<String> {
        let root = parsed.tree.root_node();
        let first = root.named_child(0)?;
        if first.kind() != "comment" {
            return None;
        }
        let raw = node_text(first, source);
        raw.starts_with("/**").then(|| clean_block_comment(&raw))
    }

    fn extract_symbols(&self, parsed: &ParsedTree, source: &str) -> Vec<Symbol> {
        let mut symbols = Vec::new();
        let mut stack: Vec<(Node<'_>, usize)> = vec![(parsed.tree.root_node(), 0)];
        while let Some((node, class_depth)) = stack.pop() {
            match node.kind() {
                "class_declaration" | "abstract_class_declaration" => {
                    if let Some(name_node) = node.child_by_field_name("name") {
                        let (line_start, line_end) = line_span(node);
                        symbols.push(Symbol {
                            name: node_text(name_node, source),
                            kind: SymbolKind::Class,
                            signature: heritage_signature(node, source),
                            line_start,
                            line_end,
                            documentation: ts_doc(node, source),
                        });
                    }
                    if let Some(body) = node.child_by_field_name("body") {
                        push_named_children(&mut stack, body, &(class_depth + 1));
                    }
                }
                "interface_declaration" => {
                    if let Some(name_node) = node.child_by_field_name("name") {
                        let (line_start, line_end) = line_span(node);
                        symbols.push(Symbol {
                            name: node_text(name_node, source),
                            kind: SymbolKind::Interface,
                            signature: heritage_signature(node, source),
                            line_start,
                            line_end,
                            documentation: ts_doc(node, source),
                        });
                    }
                }
                "enum_declaration" => {
                    if let Some(name_node) = node.child_by_field_name("name") {
                        let (line_start, line_end) = line_span(node);
                        symbols.push(Symbol {
                            name: node_text(name_node, source),
                            kind: SymbolKind::Enum,
                            signature: first_line(node, source),
                            line_start,
                            line_end,
                            documentation: ts_doc(node, source),
                        });
                    }
                }
                "function_declaration" | "generator_function_declaration" => {
                    if let Some(name_node) = node.child_by_field_name("name") {
                        let (line_start, line_end) = line_span(node);
                        symbols.push(Symbol {
                            name: node_text(name_node, source),
                            kind: SymbolKind::Function,
                            signature: heritage_signature(node, source),
                            line_start,
                            line_end,
                            documentation: ts_doc(node, source),
                        });
                    }
                }
                "method_definition" => {
                    if let Some(name_node) = node.child_by_field_name("name") {
                        let (line_start, line_end) = line_span(node);
                        symbols.push(Symbol {
                            name: node_text(name_node, source),
                            kind: SymbolKind::Method,
                            signature: heritage_signature(node, source),
                            line_start,
                            line_end,
                            documentation: ts_doc(node, source),
                        });
                    }
                }
                "public_field_definition" => {
                    if let Some(name_node) = node.child_by_field_name("name") {
                        let (line_start, line_end) = line_span(node);
                        symbols.push(Symbol {
                            name: node_text(name_node, source),
                            kind: SymbolKind::Field,
                            signature: first_line(node, source)
                                .trim_end_matches(';')
                                .trim()
                                .to_string(),
                            line_start,
                            line_end,
                            documentation: ts_doc(node, source),
                        });
                    }
                }
                "variable_declarator" => {
                    // const f = (x) => ... counts as a function declaration
                    let is_function = node
                        .child_by_field_name("value")
                        .is_some_and(|value| {
                            matches!(value.kind(), "arrow_function" | "function_expression")
                        });
                    if is_function {
                        if let Some(name_node) = node.child_by_field_name("name") {
                            if name_node.kind() == "identifier" {
                                let (line_start, line_end) = line_span(node);
                                symbols.push(Symbol {
                                    name: node_text(name_node, source),
                                    kind: if class_depth > 0 {
                                        SymbolKind::Method
                                    } else {
                                        SymbolKind::Function
                                    },
                                    signature: first_line(node, source),
                                    line_start,
                                    line_end,
                                    documentation: None,
                                });
                            }
                        }
                    }
                    push_named_children(&mut stack, node, &class_depth);
                }
                _ => push_named_children(&mut stack, node, &class_depth),
            }
        }
        symbols
    }

    fn extract_imports(&self, parsed: &ParsedTree, source: &str, rel_path: &str) -> Vec<Import> {
        let mut imports = Vec::new();
        let root = parsed.tree.root_node();
        let mut cursor = root.walk();
        for node in root.named_children(&mut cursor) {
            if node.kind() != "import_statement" {
                continue;
            }
            let Some(module) = node
                .child_by_field_name("source")
                .map(|n| resolve_module_specifier(&unquote(&node_text(n, source)), rel_path))
            else {
                continue;
            };
            let mut clause = None;
            let mut inner = node.walk();
            for child in node.named_children(&mut inner) {
                if child.kind() == "import_clause" {
                    clause = Some(child);
                }
            }
            let Some(clause) = clause else {
                // side-effect import: import "./polyfill";
                imports.push(Import {
                    module,
                    imported_names: Vec::new(),
                    alias: None,
                    is_scoped_import: false,
                });
                continue;
            };
            let mut parts = clause.walk();
            for part in clause.named_children(&mut parts) {
                match part.kind() {
                    // default import binds a local name for the module
                    "identifier" => imports.push(Import {
                        module: module.clone(),
                        imported_names: Vec::new(),
                        alias: Some(node_text(part, source)),
                        is_scoped_import: false,
                    }),
                    // import * as ns from "m"
                    "namespace_import" => {
                        let mut inner = part.walk();
                        for name in part.named_children(&mut inner) {
                            if name.kind() == "identifier" {
                                imports.push(Import {
                                    module: module.clone(),
                                    imported_names: Vec::new(),
                                    alias: Some(node_text(name, source)),
                                    is_scoped_import: false,
                                });
                            }
                        }
                    }
                    "named_imports" => {
                        let mut specs = part.walk();
                        for spec in part.named_children(&mut specs) {
                            if spec.kind() != "import_specifier" {
                                continue;
                            }
                            let Some(name) = spec
                                .child_by_field_name("name")
                                .map(|n| node_text(n, source))
                            else {
                                continue;
                            };
                            let alias = spec
                                .child_by_field_name("alias")
                                .map(|n| node_text(n, source));
                            imports.push(Import {
                                module: module.clone(),
                                imported_names: vec![name],
                                alias,
                                is_scoped_import: true,
                            });
                        }
                    }
                    _ => {}
                }
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
                "class_declaration" | "abstract_class_declaration" => {
                    let Some(name_node) = node.child_by_field_name("name") else {
                        continue;
                    };
                    let mut chain = class_stack.clone();
                    chain.push(node_text(name_node, source));
                    let child_fqn = resolve::qualify(&chain.join("."), ctx.namespace, ".");
                    let mut cursor = node.walk();
                    for heritage in node.named_children(&mut cursor) {
                        if heritage.kind() != "class_heritage" {
                            continue;
                        }
                        let mut clauses = heritage.walk();
                        for clause in heritage.named_children(&mut clauses) {
                            if clause.kind() == "extends_clause"
                                || clause.kind() == "implements_clause"
                            {
                                self.clause_edges(clause, &child_fqn, source, ctx, &mut edges);
                            }
                        }
                    }
                    if let Some(body) = node.child_by_field_name("body") {
                        push_named_children(&mut stack, body, &chain);
                    }
                }
                "interface_declaration" => {
                    let Some(name_node) = node.child_by_field_name("name") else {
                        continue;
                    };
                    let mut chain = class_stack.clone();
                    chain.push(node_text(name_node, source));
                    let child_fqn = resolve::qualify(&chain.join("."), ctx.namespace, ".");
                    let mut cursor = node.walk();
                    for clause in node.named_children(&mut cursor) {
                        if clause.kind() == "extends_type_clause" {
                            self.clause_edges(clause, &child_fqn, source, ctx, &mut edges);
                        }
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
                "class_declaration" | "abstract_class_declaration" => {
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
                "function_declaration" | "generator_function_declaration"
                | "method_definition" => {
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
                "call_expression" => {
                    if let Some(call) = self.call_record(node, &scope, source, ctx) {
                        calls.push(call);
                    }
                    push_named_children(&mut stack, node, &scope);
                }
                "new_expression" => {
                    if let Some(call) = self.new_record(node, &scope, source, ctx) {
                        calls.push(call);
                    }
                    push_named_children(&mut stack, node, &scope);
                }
                _ => push_named_children(&mut stack, node, &scope),
            }
        }
        calls
    }
}

impl TypeScriptAdapter {
    fn clause_edges(
        &self,
        clause: Node<'_>,
        child_fqn: &str,
        source: &str,
        ctx: &FileContext<'_>,
        edges: &mut Vec<Inheritance>,
    ) {
        let mut cursor = clause.walk();
        for parent_node in clause.named_children(&mut cursor) {
            if matches!(parent_node.kind(), "type_arguments" | "comment") {
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
                child: child_fqn.to_string(),
                parent,
            });
        }
    }

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
            "member_expression" => {
                let object = function.child_by_field_name("object")?;
                let property = function
                    .child_by_field_name("property")
                    .map(|n| node_text(n, source))?;
                let object_text = node_text(object, source);
                if object_text == "this" {
                    let container = scope.container(ctx.namespace);
                    let callee = if container.is_empty() {
                        property
                    } else {
                        format!("{container}.{property}")
                    };
                    return Some(Call {
                        caller,
                        callee: Some(callee),
                        line_number: line,
                        call_type: CallType::Method,
                        arguments_count: args_count,
                    });
                }
                if !is_simple_path(&object_text) {
                    return Some(Call {
                        caller,
                        callee: None,
                        line_number: line,
                        call_type: CallType::Dynamic,
                        arguments_count: args_count,
                    });
                }
                let raw = format!("{object_text}.{property}");
                let resolved = resolve::resolve_alias(&raw, ctx.alias_map, ".");
                let is_static = resolve::starts_uppercase(&object_text);
                let callee = if resolved == raw && is_static && !object_text.contains('.') {
                    // Same-file class receiver: qualify the receiver, keep
                    // the member.
                    format!("{}.{property}", resolve::qualify(&object_text, ctx.namespace, "."))
                } else {
                    resolved.clone()
                };
                let was_bare = resolved == raw && is_static && !object_text.contains('.');
                if !resolve::is_project_internal(&callee, was_bare, ctx.project_namespaces, ".") {
                    return None;
                }
                Some(Call {
                    caller,
                    callee: Some(callee),
                    line_number: line,
                    call_type: if is_static {
                        CallType::StaticMethod
                    } else {
                        CallType::Method
                    },
                    arguments_count: args_count,
                })
            }
            // obj["method"](), import(...), chained call results
            _ => Some(Call {
                caller,
                callee: None,
                line_number: line,
                call_type: CallType::Dynamic,
                arguments_count: args_count,
            }),
        }
    }

    fn new_record(
        &self,
        node: Node<'_>,
        scope: &Scope,
        source: &str,
        ctx: &FileContext<'_>,
    ) -> Option<Call> {
        let constructor = node.child_by_field_name("constructor")?;
        let caller = scope.caller(ctx.namespace);
        let line = line_number(node);
        let args_count = match node.child_by_field_name("arguments") {
            Some(args) => count_arguments(args, is_spread),
            None => Some(0),
        };
        let raw = node_text(constructor, source);
        if !is_simple_path(&raw) {
            return Some(Call {
                caller,
                callee: None,
                line_number: line,
                call_type: CallType::Dynamic,
                arguments_count: args_count,
            });
        }
        let stripped = resolve::strip_generics(&raw);
        let resolved = resolve::resolve_alias(&stripped, ctx.alias_map, ".");
        let was_bare = resolved == stripped && !stripped.contains('.');
        let qualified = resolve::qualify(&resolved, ctx.namespace, ".");
        if !resolve::is_project_internal(&qualified, was_bare, ctx.project_namespaces, ".") {
            return None;
        }
        Some(Call {
            caller,
            callee: Some(format!("{qualified}.{}", self.constructor_suffix())),
            line_number: line,
            call_type: CallType::Constructor,
            arguments_count: args_count,
        })
    }
}

/// Dotted module name derived from the file location: `src/app/util.ts`
/// becomes `src.app.util`, index files collapse to their directory.
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
        .trim_end_matches(".d")
        .to_string();
    if stem != "index" {
        parts.push(stem);
    }
    parts.join(".")
}

/// Resolves `./` and `../` import specifiers against the importing file's
/// directory into the same dotted module-name space the namespace derivation
/// uses. Package specifiers pass through unchanged.
pub fn resolve_module_specifier(specifier: &str, rel_path: &str) -> String {
    if !specifier.starts_with("./") && !specifier.starts_with("../") {
        return specifier.to_string();
    }
    let mut dir: Vec<&str> = rel_path.split('/').collect();
    dir.pop();
    for segment in specifier.split('/') {
        match segment {
            "." | "" => {}
            ".." => {
                dir.pop();
            }
            other => dir.push(other),
        }
    }
    module_name_from_rel_path(&dir.join("/"))
}

fn is_spread(kind: &str) -> bool {
    kind == "spread_element"
}

fn is_simple_path(raw: &str) -> bool {
    !raw.is_empty()
        && raw
            .chars()
            .all(|ch| ch.is_alphanumeric() || ch == '_' || ch == '$' || ch == '.')
}

fn unquote(raw: &str) -> String {
    raw.trim_matches(|ch| ch == '"' || ch == '\'' || ch == '`')
        .to_string()
}

/// JSDoc sits before the declaration, or before the wrapping export
/// statement.
fn ts_doc(node: Node<'_>, source: &str) -> Option<String> {
    doc_comment_before(node, source).or_else(|| {
        let parent = node.parent()?;
        if parent.kind() == "export_statement" {
            doc_comment_before(parent, source)
        } else {
            None
        }
    })
}

/// Declaration text up to the body, collapsed to one line.
fn heritage_signature(node: Node<'_>, source: &str) -> String {
    let end = node
        .child_by_field_name("body")
        .map(|body| body.start_byte())
        .unwrap_or(node.end_byte());
    let text = source.get(node.start_byte()..end).unwrap_or("");
    let collapsed: Vec<&str> = text.split_whitespace().collect();
    collapsed.join(" ").trim().to_string()
}
