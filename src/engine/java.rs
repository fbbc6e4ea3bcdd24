use crate::engine::adapter::{
    FileContext, LanguageAdapter, ParsedTree, clean_block_comment, count_arguments,
    doc_comment_before, first_line, line_number, line_span, node_text, push_named_children,
};
use crate::engine::resolve;
use crate::model::{Call, CallType, Import, Inheritance, Symbol, SymbolKind};
use anyhow::{Result, anyhow};
use tree_sitter::{Node, Parser};

pub struct JavaAdapter {
    parser: Parser,
}

impl JavaAdapter {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_java::LANGUAGE;
        parser.set_language(&language.into())?;
        Ok(Self { parser })
    }
}

#[derive(Clone, Default)]
struct Scope {
    type_stack: Vec<String>,
    method: Option<String>,
}

impl Scope {
    fn caller(&self, namespace: &str) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if !namespace.is_empty() {
            parts.push(namespace);
        }
        parts.extend(self.type_stack.iter().map(String::as_str));
        if let Some(method) = &self.method {
            parts.push(method);
        }
        parts.join(".")
    }
}

impl LanguageAdapter for JavaAdapter {
    fn language(&self) -> &'static str {
        "java"
    }

    fn constructor_suffix(&self) -> &'static str {
        "<init>"
    }

    fn implicit_parent(&self, name: &str) -> Option<String> {
        const LANG: &[&str] = &[
            "Object",
            "Exception",
            "RuntimeException",
            "IllegalArgumentException",
            "IllegalStateException",
            "UnsupportedOperationException",
            "Error",
            "Throwable",
            "Thread",
            "Record",
            "Enum",
        ];
        LANG.contains(&name).then(|| format!("java.lang.{name}"))
    }

    fn parse(&mut self, source: &str) -> Result<ParsedTree> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| anyhow!("java parser produced no tree"))?;
        let error_free = !tree.root_node().has_error();
        Ok(ParsedTree { tree, error_free })
    }

    fn namespace(&self, parsed: &ParsedTree, source: &str, _rel_path: &str) -> String {
        let root = parsed.tree.root_node();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            if child.kind() == "package_declaration" {
                let mut inner = child.walk();
                for part in child.named_children(&mut inner) {
                    if matches!(part.kind(), "scoped_identifier" | "identifier") {
                        return node_text(part, source);
                    }
                }
            }
        }
        String::new()
    }

    fn module_documentation(&self, parsed: &ParsedTree, source: &str) -> Option<String> {
        let root = parsed.tree.root_node();
        let first = root.named_child(0)?;
        if first.kind() != "block_comment" {
            return None;
        }
        let raw = node_text(first, source);
        raw.starts_with("/**").then(|| clean_block_comment(&raw))
    }

    fn extract_symbols(&self, parsed: &ParsedTree, source: &str) -> Vec<Symbol> {
        let mut symbols = Vec::new();
        let mut stack: Vec<(Node<'_>, ())> = vec![(parsed.tree.root_node(), ())];
        while let Some((node, ())) = stack.pop() {
            let kind = match node.kind() {
                "class_declaration" | "record_declaration" => Some(SymbolKind::Class),
                "interface_declaration" | "annotation_type_declaration" => {
                    Some(SymbolKind::Interface)
                }
                "enum_declaration" => Some(SymbolKind::Enum),
                "method_declaration" | "constructor_declaration" => Some(SymbolKind::Method),
                "field_declaration" => {
                    self.field_symbols(node, source, &mut symbols);
                    None
                }
                _ => None,
            };
            if let (Some(kind), Some(name_node)) = (kind, node.child_by_field_name("name")) {
                let (line_start, line_end) = line_span(node);
                symbols.push(Symbol {
                    name: node_text(name_node, source),
                    kind,
                    signature: declaration_signature(node, source),
                    line_start,
                    line_end,
                    documentation: doc_comment_before(node, source),
                });
            }
            push_named_children(&mut stack, node, &());
        }
        symbols
    }

    fn extract_imports(&self, parsed: &ParsedTree, source: &str, _rel_path: &str) -> Vec<Import> {
        let mut imports = Vec::new();
        let root = parsed.tree.root_node();
        let mut cursor = root.walk();
        for node in root.named_children(&mut cursor) {
            if node.kind() != "import_declaration" {
                continue;
            }
            let mut path = None;
            let mut wildcard = false;
            let mut is_static = false;
            let mut inner = node.walk();
            for child in node.children(&mut inner) {
                match child.kind() {
                    "scoped_identifier" | "identifier" => {
                        path = Some(node_text(child, source));
                    }
                    "asterisk" => wildcard = true,
                    "static" => is_static = true,
                    _ => {}
                }
            }
            let Some(path) = path else { continue };
            if wildcard {
                imports.push(Import {
                    module: path,
                    imported_names: vec!["*".to_string()],
                    alias: None,
                    is_scoped_import: false,
                });
            } else if is_static {
                // import static a.b.C.member binds the member name
                let (module, member) = match path.rsplit_once('.') {
                    Some((module, member)) => (module.to_string(), member.to_string()),
                    None => (path.clone(), path),
                };
                imports.push(Import {
                    module,
                    imported_names: vec![member],
                    alias: None,
                    is_scoped_import: true,
                });
            } else {
                // Java single-type import: the whole class is imported.
                imports.push(Import {
                    module: path,
                    imported_names: Vec::new(),
                    alias: None,
                    is_scoped_import: false,
                });
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
        while let Some((node, type_stack)) = stack.pop() {
            let is_type = matches!(
                node.kind(),
                "class_declaration"
                    | "interface_declaration"
                    | "enum_declaration"
                    | "record_declaration"
            );
            if !is_type {
                push_named_children(&mut stack, node, &type_stack);
                continue;
            }
            let Some(name_node) = node.child_by_field_name("name") else {
                continue;
            };
            let mut chain = type_stack.clone();
            chain.push(node_text(name_node, source));
            let child_fqn = resolve::qualify(&chain.join("."), ctx.namespace, ".");
            let mut inner = node.walk();
            for clause in node.named_children(&mut inner) {
                match clause.kind() {
                    // class Foo extends Bar
                    "superclass" => {
                        let mut types = clause.walk();
                        for parent in clause.named_children(&mut types) {
                            self.parent_edge(parent, &child_fqn, source, ctx, &mut edges);
                        }
                    }
                    // implements A, B / interface extends A, B
                    "super_interfaces" | "extends_interfaces" => {
                        let mut lists = clause.walk();
                        for list in clause.named_children(&mut lists) {
                            if list.kind() != "type_list" {
                                continue;
                            }
                            let mut types = list.walk();
                            for parent in list.named_children(&mut types) {
                                self.parent_edge(parent, &child_fqn, source, ctx, &mut edges);
                            }
                        }
                    }
                    _ => {}
                }
            }
            if let Some(body) = node.child_by_field_name("body") {
                push_named_children(&mut stack, body, &chain);
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
                "class_declaration" | "interface_declaration" | "enum_declaration"
                | "record_declaration" => {
                    let name = node
                        .child_by_field_name("name")
                        .map(|n| node_text(n, source))
                        .unwrap_or_default();
                    let mut next = scope.clone();
                    next.type_stack.push(name);
                    next.method = None;
                    if let Some(body) = node.child_by_field_name("body") {
                        push_named_children(&mut stack, body, &next);
                    }
                }
                "method_declaration" | "constructor_declaration" => {
                    let name = node
                        .child_by_field_name("name")
                        .map(|n| node_text(n, source))
                        .unwrap_or_default();
                    let mut next = scope.clone();
                    next.method = Some(name);
                    if let Some(body) = node.child_by_field_name("body") {
                        push_named_children(&mut stack, body, &next);
                    }
                }
                "method_invocation" => {
                    if let Some(call) = self.invocation_record(node, &scope, source, ctx) {
                        calls.push(call);
                    }
                    push_named_children(&mut stack, node, &scope);
                }
                "object_creation_expression" => {
                    if let Some(call) = self.constructor_record(node, &scope, source, ctx) {
                        calls.push(call);
                    }
                    push_named_children(&mut stack, node, &scope);
                }
                "method_reference" => {
                    if let Some(call) = self.reference_record(node, &scope, source, ctx) {
                        calls.push(call);
                    }
                }
                _ => push_named_children(&mut stack, node, &scope),
            }
        }
        calls
    }
}

impl JavaAdapter {
    fn field_symbols(&self, node: Node<'_>, source: &str, symbols: &mut Vec<Symbol>) {
        let documentation = doc_comment_before(node, source);
        let mut cursor = node.walk();
        for declarator in node.named_children(&mut cursor) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name_node) = declarator.child_by_field_name("name") else {
                continue;
            };
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
                documentation: documentation.clone(),
            });
        }
    }

    fn parent_edge(
        &self,
        parent_node: Node<'_>,
        child_fqn: &str,
        source: &str,
        ctx: &FileContext<'_>,
        edges: &mut Vec<Inheritance>,
    ) {
        if parent_node.kind().contains("comment") {
            return;
        }
        let raw = node_text(parent_node, source);
        if raw.is_empty() {
            return;
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

    fn invocation_record(
        &self,
        node: Node<'_>,
        scope: &Scope,
        source: &str,
        ctx: &FileContext<'_>,
    ) -> Option<Call> {
        let name = node
            .child_by_field_name("name")
            .map(|n| node_text(n, source))?;
        let caller = scope.caller(ctx.namespace);
        let line = line_number(node);
        let args_count = node
            .child_by_field_name("arguments")
            .and_then(|args| count_arguments(args, |_| false));

        let Some(object) = node.child_by_field_name("object") else {
            // Unqualified call inside a method body.
            let resolved = resolve::resolve_alias(&name, ctx.alias_map, ".");
            let was_bare = resolved == name;
            let qualified = resolve::qualify(&resolved, ctx.namespace, ".");
            if !resolve::is_project_internal(&qualified, was_bare, ctx.project_namespaces, ".") {
                return None;
            }
            return Some(Call {
                caller,
                callee: Some(qualified),
                line_number: line,
                call_type: CallType::Function,
                arguments_count: args_count,
            });
        };

        let object_text = node_text(object, source);
        if object_text == "this" || object_text == "super" {
            let mut parts: Vec<&str> = Vec::new();
            if !ctx.namespace.is_empty() {
                parts.push(ctx.namespace);
            }
            parts.extend(scope.type_stack.iter().map(String::as_str));
            parts.push(&name);
            return Some(Call {
                caller,
                callee: Some(parts.join(".")),
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
        let raw = format!("{object_text}.{name}");
        let resolved = resolve::resolve_alias(&raw, ctx.alias_map, ".");
        let is_static = resolve::starts_uppercase(&object_text);
        let callee = if resolved == raw && is_static && !object_text.contains('.') {
            // Same-file class receiver: qualify the receiver, keep the member.
            format!("{}.{name}", resolve::qualify(&object_text, ctx.namespace, "."))
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

    fn constructor_record(
        &self,
        node: Node<'_>,
        scope: &Scope,
        source: &str,
        ctx: &FileContext<'_>,
    ) -> Option<Call> {
        let type_node = node.child_by_field_name("type")?;
        let raw = node_text(type_node, source);
        let stripped = resolve::strip_generics(&raw);
        if stripped.is_empty() {
            return None;
        }
        let resolved = resolve::resolve_alias(&stripped, ctx.alias_map, ".");
        let was_bare = resolved == stripped && !stripped.contains('.');
        let qualified = resolve::qualify(&resolved, ctx.namespace, ".");
        if !resolve::is_project_internal(&qualified, was_bare, ctx.project_namespaces, ".") {
            return None;
        }
        let args_count = node
            .child_by_field_name("arguments")
            .and_then(|args| count_arguments(args, |_| false));
        Some(Call {
            caller: scope.caller(ctx.namespace),
            callee: Some(format!("{qualified}.{}", self.constructor_suffix())),
            line_number: line_number(node),
            call_type: CallType::Constructor,
            arguments_count: args_count,
        })
    }

    /// First-class function reference (`Type::method`, `value::method`).
    /// The argument list is not statically known.
    fn reference_record(
        &self,
        node: Node<'_>,
        scope: &Scope,
        source: &str,
        ctx: &FileContext<'_>,
    ) -> Option<Call> {
        let mut cursor = node.walk();
        let parts: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        let (base_node, name_node) = match parts.as_slice() {
            [base, name] => (*base, *name),
            _ => return None,
        };
        let base = resolve::strip_generics(&node_text(base_node, source));
        let name = node_text(name_node, source);
        if base.is_empty() || name.is_empty() || !is_simple_path(&base) {
            return None;
        }
        let is_static = resolve::starts_uppercase(&base);
        let raw = format!("{base}.{name}");
        let resolved = resolve::resolve_alias(&raw, ctx.alias_map, ".");
        let callee = if resolved == raw && is_static && !base.contains('.') {
            format!("{}.{name}", resolve::qualify(&base, ctx.namespace, "."))
        } else {
            resolved.clone()
        };
        let was_bare = resolved == raw && is_static && !base.contains('.');
        if !resolve::is_project_internal(&callee, was_bare, ctx.project_namespaces, ".") {
            return None;
        }
        Some(Call {
            caller: scope.caller(ctx.namespace),
            callee: Some(callee),
            line_number: line_number(node),
            call_type: if is_static {
                CallType::StaticMethod
            } else {
                CallType::Method
            },
            arguments_count: None,
        })
    }
}

fn is_simple_path(raw: &str) -> bool {
    !raw.is_empty()
        && raw
            .chars()
            .all(|ch| ch.is_alphanumeric() || ch == '_' || ch == '.')
}

/// Declaration text up to the body brace, collapsed to one line.
fn declaration_signature(node: Node<'_>, source: &str) -> String {
    let end = node
        .child_by_field_name("body")
        .map(|body| body.start_byte())
        .unwrap_or(node.end_byte());
    let text = source.get(node.start_byte()..end).unwrap_or("");
    let collapsed: Vec<&str> = text.split_whitespace().collect();
    collapsed.join(" ").trim_end_matches(';').trim().to_string()
}
