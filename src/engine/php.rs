use crate::engine::adapter::{
    FileContext, LanguageAdapter, ParsedTree, clean_block_comment, count_arguments,
    doc_comment_before, first_line, line_number, line_span, node_text, push_named_children,
};
use crate::engine::resolve;
use crate::model::{Call, CallType, Import, Inheritance, Symbol, SymbolKind};
use anyhow::{Result, anyhow};
use tree_sitter::{Node, Parser};

const SEP: &str = "\\";
/// PHP member access in resolved callees uses the scope operator, so a
/// constructor callee reads `App\Service\Mailer::__construct`.
const MEMBER: &str = "::";

pub struct PhpAdapter {
    parser: Parser,
}

impl PhpAdapter {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_php::LANGUAGE_PHP;
        parser.set_language(&language.into())?;
        Ok(Self { parser })
    }
}

#[derive(Clone, Default)]
struct Scope {
    class_stack: Vec<String>,
    function: Option<String>,
}

impl Scope {
    fn container(&self, namespace: &str) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if !namespace.is_empty() {
            parts.push(namespace);
        }
        parts.extend(self.class_stack.iter().map(String::as_str));
        parts.join(SEP)
    }

    fn caller(&self, namespace: &str) -> String {
        let container = self.container(namespace);
        match &self.function {
            Some(name) if !self.class_stack.is_empty() => format!("{container}{MEMBER}{name}"),
            Some(name) if container.is_empty() => name.clone(),
            Some(name) => format!("{container}{SEP}{name}"),
            None => container,
        }
    }
}

impl LanguageAdapter for PhpAdapter {
    fn language(&self) -> &'static str {
        "php"
    }

    fn separator(&self) -> &'static str {
        SEP
    }

    fn constructor_suffix(&self) -> &'static str {
        "__construct"
    }

    fn implicit_parent(&self, name: &str) -> Option<String> {
        const GLOBALS: &[&str] = &[
            "Exception",
            "Error",
            "Throwable",
            "RuntimeException",
            "InvalidArgumentException",
            "LogicException",
            "ArrayAccess",
            "Countable",
            "Iterator",
            "IteratorAggregate",
            "JsonSerializable",
            "Stringable",
        ];
        GLOBALS.contains(&name).then(|| name.to_string())
    }

    fn parse(&mut self, source: &str) -> Result<ParsedTree> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| anyhow!("php parser produced no tree"))?;
        let error_free = !tree.root_node().has_error();
        Ok(ParsedTree { tree, error_free })
    }

    fn namespace(&self, parsed: &ParsedTree, source: &str, _rel_path: &str) -> String {
        let root = parsed.tree.root_node();
        let mut stack: Vec<(Node<'_>, ())> = vec![(root, ())];
        while let Some((node, ())) = stack.pop() {
            if node.kind() == "namespace_definition" {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if child.kind() == "namespace_name" {
                        return node_text(child, source);
                    }
                }
            }
            push_named_children(&mut stack, node, &());
        }
        String::new()
    }

    fn module_documentation(&self, parsed: &ParsedTree, source: &str) -> Option<String> {
        let root = parsed.tree.root_node();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "php_tag" => continue,
                "comment" => {
                    let raw = node_text(child, source);
                    return raw.starts_with("/**").then(|| clean_block_comment(&raw));
                }
                _ => return None,
            }
        }
        None
    }

    fn extract_symbols(&self, parsed: &ParsedTree, source: &str) -> Vec<Symbol> {
        let mut symbols = Vec::new();
        let mut stack: Vec<(Node<'_>, ())> = vec![(parsed.tree.root_node(), ())];
        while let Some((node, ())) = stack.pop() {
            let kind = match node.kind() {
                "class_declaration" | "trait_declaration" => Some(SymbolKind::Class),
                "interface_declaration" => Some(SymbolKind::Interface),
                "enum_declaration" => Some(SymbolKind::Enum),
                "function_definition" => Some(SymbolKind::Function),
                "method_declaration" => Some(SymbolKind::Method),
                "property_declaration" => {
                    self.property_symbols(node, source, &mut symbols);
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
        let mut stack: Vec<(Node<'_>, ())> = vec![(parsed.tree.root_node(), ())];
        while let Some((node, ())) = stack.pop() {
            if node.kind() != "namespace_use_declaration" {
                push_named_children(&mut stack, node, &());
                continue;
            }
            // Grouped form: use Prefix\{A, B as C}; the prefix sits beside
            // the group node.
            let mut prefix = None;
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if child.kind() == "namespace_name" {
                    prefix = Some(node_text(child, source));
                }
            }
            let mut clauses: Vec<(Node<'_>, ())> = vec![(node, ())];
            while let Some((current, ())) = clauses.pop() {
                if current.kind() == "namespace_use_clause"
                    || current.kind() == "namespace_use_group_clause"
                {
                    if let Some(import) = self.use_clause(current, prefix.as_deref(), source) {
                        imports.push(import);
                    }
                    continue;
                }
                push_named_children(&mut clauses, current, &());
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
            let is_type = matches!(
                node.kind(),
                "class_declaration" | "interface_declaration" | "enum_declaration"
            );
            if !is_type {
                push_named_children(&mut stack, node, &class_stack);
                continue;
            }
            let Some(name_node) = node.child_by_field_name("name") else {
                continue;
            };
            let mut chain = class_stack.clone();
            chain.push(node_text(name_node, source));
            let child_fqn = resolve::qualify(&chain.join(SEP), ctx.namespace, SEP);
            let mut cursor = node.walk();
            for clause in node.named_children(&mut cursor) {
                // base_clause covers extends for classes and interfaces;
                // class_interface_clause covers implements.
                if clause.kind() != "base_clause" && clause.kind() != "class_interface_clause" {
                    continue;
                }
                let mut types = clause.walk();
                for parent_node in clause.named_children(&mut types) {
                    if parent_node.kind().contains("comment") {
                        continue;
                    }
                    let raw = node_text(parent_node, source);
                    if raw.is_empty() {
                        continue;
                    }
                    let parent = self.resolve_type(&raw, ctx);
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
                | "trait_declaration" => {
                    let name = node
                        .child_by_field_name("name")
                        .map(|n| node_text(n, source))
                        .unwrap_or_default();
                    let mut next = scope.clone();
                    next.class_stack.push(name);
                    next.function = None;
                    if let Some(body) = node.child_by_field_name("body") {
                        push_named_children(&mut stack, body, &next);
                    }
                }
                "function_definition" | "method_declaration" => {
                    let name = node
                        .child_by_field_name("name")
                        .map(|n| node_text(n, source))
                        .unwrap_or_default();
                    let mut next = scope.clone();
                    next.function = Some(name);
                    if let Some(body) = node.child_by_field_name("body") {
                        push_named_children(&mut stack, body, &next);
                    }
                }
                "function_call_expression" => {
                    if let Some(call) = self.function_call(node, &scope, source, ctx) {
                        calls.push(call);
                    }
                    push_named_children(&mut stack, node, &scope);
                }
                "member_call_expression" => {
                    if let Some(call) = self.member_call(node, &scope, source, ctx) {
                        calls.push(call);
                    }
                    push_named_children(&mut stack, node, &scope);
                }
                "scoped_call_expression" => {
                    if let Some(call) = self.scoped_call(node, &scope, source, ctx) {
                        calls.push(call);
                    }
                    push_named_children(&mut stack, node, &scope);
                }
                "object_creation_expression" => {
                    if let Some(call) = self.new_call(node, &scope, source, ctx) {
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

impl PhpAdapter {
    fn use_clause(
        &self,
        clause: Node<'_>,
        prefix: Option<&str>,
        source: &str,
    ) -> Option<Import> {
        let mut path = None;
        // The alias is a field on the clause; older grammar revisions wrap
        // it in a namespace_aliasing_clause instead.
        let mut alias = clause
            .child_by_field_name("alias")
            .map(|n| node_text(n, source));
        let mut cursor = clause.walk();
        for child in clause.named_children(&mut cursor) {
            match child.kind() {
                "qualified_name" | "name" | "namespace_name" => {
                    if path.is_none() {
                        path = Some(node_text(child, source));
                    }
                }
                "namespace_aliasing_clause" => {
                    let mut inner = child.walk();
                    for part in child.named_children(&mut inner) {
                        if part.kind() == "name" && alias.is_none() {
                            alias = Some(node_text(part, source));
                        }
                    }
                }
                _ => {}
            }
        }
        let path = path?;
        let module = match prefix {
            Some(prefix) => format!("{prefix}{SEP}{}", path.trim_start_matches('\\')),
            None => path.trim_start_matches('\\').to_string(),
        };
        Some(Import {
            module,
            imported_names: Vec::new(),
            alias,
            is_scoped_import: false,
        })
    }

    fn property_symbols(&self, node: Node<'_>, source: &str, symbols: &mut Vec<Symbol>) {
        let documentation = doc_comment_before(node, source);
        let mut stack: Vec<(Node<'_>, ())> = vec![(node, ())];
        while let Some((current, ())) = stack.pop() {
            if current.kind() == "variable_name" {
                let (line_start, line_end) = line_span(node);
                symbols.push(Symbol {
                    name: node_text(current, source).trim_start_matches('$').to_string(),
                    kind: SymbolKind::Field,
                    signature: first_line(node, source)
                        .trim_end_matches(';')
                        .trim()
                        .to_string(),
                    line_start,
                    line_end,
                    documentation: documentation.clone(),
                });
                continue;
            }
            push_named_children(&mut stack, current, &());
        }
    }

    /// Implicit globals resolve first, then the alias map, then the
    /// same-namespace fallback. A leading backslash means the name is
    /// already absolute.
    fn resolve_type(&self, raw: &str, ctx: &FileContext<'_>) -> String {
        if let Some(absolute) = raw.strip_prefix('\\') {
            return absolute.to_string();
        }
        let stripped = resolve::strip_generics(raw);
        resolve::resolve_parent(
            &stripped,
            self.implicit_parent(&stripped),
            ctx.alias_map,
            ctx.namespace,
            SEP,
        )
    }

    fn function_call(
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

        if function.kind() == "variable_name" {
            return Some(Call {
                caller,
                callee: None,
                line_number: line,
                call_type: CallType::Dynamic,
                arguments_count: args_count,
            });
        }
        if !matches!(function.kind(), "name" | "qualified_name") {
            return Some(Call {
                caller,
                callee: None,
                line_number: line,
                call_type: CallType::Dynamic,
                arguments_count: args_count,
            });
        }
        let raw = node_text(function, source);
        if raw == "call_user_func" || raw == "call_user_func_array" {
            return Some(Call {
                caller,
                callee: None,
                line_number: line,
                call_type: CallType::Dynamic,
                arguments_count: args_count,
            });
        }
        let absolute = raw.starts_with('\\');
        let name = raw.trim_start_matches('\\').to_string();
        let resolved = resolve::resolve_alias(&name, ctx.alias_map, SEP);
        let was_bare = !absolute && resolved == name && !name.contains('\\');
        let qualified = if absolute {
            resolved
        } else {
            resolve::qualify(&resolved, ctx.namespace, SEP)
        };
        if !resolve::is_project_internal(&qualified, was_bare, ctx.project_namespaces, SEP) {
            return None;
        }
        let short = name.rsplit('\\').next().unwrap_or(&name);
        if resolve::starts_uppercase(short) && !name.contains('\\') {
            return Some(Call {
                caller,
                callee: Some(format!("{qualified}{MEMBER}{}", self.constructor_suffix())),
                line_number: line,
                call_type: CallType::Constructor,
                arguments_count: args_count,
            });
        }
        Some(Call {
            caller,
            callee: Some(qualified),
            line_number: line,
            call_type: CallType::Function,
            arguments_count: args_count,
        })
    }

    fn member_call(
        &self,
        node: Node<'_>,
        scope: &Scope,
        source: &str,
        ctx: &FileContext<'_>,
    ) -> Option<Call> {
        let object = node.child_by_field_name("object")?;
        let name = node
            .child_by_field_name("name")
            .map(|n| node_text(n, source))?;
        let caller = scope.caller(ctx.namespace);
        let line = line_number(node);
        let args_count = node
            .child_by_field_name("arguments")
            .and_then(|args| count_arguments(args, is_spread));

        if node_text(object, source) == "$this" {
            let container = scope.container(ctx.namespace);
            let callee = if container.is_empty() {
                name
            } else {
                format!("{container}{MEMBER}{name}")
            };
            return Some(Call {
                caller,
                callee: Some(callee),
                line_number: line,
                call_type: CallType::Method,
                arguments_count: args_count,
            });
        }
        // Receiver type is not statically known.
        Some(Call {
            caller,
            callee: None,
            line_number: line,
            call_type: CallType::Dynamic,
            arguments_count: args_count,
        })
    }

    fn scoped_call(
        &self,
        node: Node<'_>,
        scope: &Scope,
        source: &str,
        ctx: &FileContext<'_>,
    ) -> Option<Call> {
        let scope_node = node.child_by_field_name("scope")?;
        let name = node
            .child_by_field_name("name")
            .map(|n| node_text(n, source))?;
        let caller = scope.caller(ctx.namespace);
        let line = line_number(node);
        let args_count = node
            .child_by_field_name("arguments")
            .and_then(|args| count_arguments(args, is_spread));

        let scope_text = node_text(scope_node, source);
        if scope_text == "self" || scope_text == "static" {
            let container = scope.container(ctx.namespace);
            let callee = if container.is_empty() {
                name
            } else {
                format!("{container}{MEMBER}{name}")
            };
            return Some(Call {
                caller,
                callee: Some(callee),
                line_number: line,
                call_type: CallType::StaticMethod,
                arguments_count: args_count,
            });
        }
        if scope_text == "parent" || scope_node.kind() == "variable_name" {
            return Some(Call {
                caller,
                callee: None,
                line_number: line,
                call_type: CallType::Dynamic,
                arguments_count: args_count,
            });
        }
        let absolute = scope_text.starts_with('\\');
        let trimmed = scope_text.trim_start_matches('\\');
        let was_bare = !absolute
            && !trimmed.contains('\\')
            && resolve::resolve_alias(trimmed, ctx.alias_map, SEP) == trimmed;
        let class = self.resolve_type(&scope_text, ctx);
        if !resolve::is_project_internal(&class, was_bare, ctx.project_namespaces, SEP) {
            return None;
        }
        let callee = format!("{class}{MEMBER}{name}");
        Some(Call {
            caller,
            callee: Some(callee),
            line_number: line,
            call_type: CallType::StaticMethod,
            arguments_count: args_count,
        })
    }

    fn new_call(
        &self,
        node: Node<'_>,
        scope: &Scope,
        source: &str,
        ctx: &FileContext<'_>,
    ) -> Option<Call> {
        let caller = scope.caller(ctx.namespace);
        let line = line_number(node);
        let mut class_node = None;
        let mut args_count = Some(0);
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "name" | "qualified_name" => class_node = Some(child),
                "variable_name" => {
                    // new $class(...) is reflection-like construction
                    return Some(Call {
                        caller,
                        callee: None,
                        line_number: line,
                        call_type: CallType::Dynamic,
                        arguments_count: None,
                    });
                }
                "arguments" => args_count = count_arguments(child, is_spread),
                _ => {}
            }
        }
        let raw = node_text(class_node?, source);
        let class = self.resolve_type(&raw, ctx);
        let was_bare = !raw.starts_with('\\')
            && !raw.contains('\\')
            && resolve::resolve_alias(&raw, ctx.alias_map, SEP) == raw;
        if !resolve::is_project_internal(&class, was_bare, ctx.project_namespaces, SEP) {
            return None;
        }
        Some(Call {
            caller,
            callee: Some(format!("{class}{MEMBER}{}", self.constructor_suffix())),
            line_number: line,
            call_type: CallType::Constructor,
            arguments_count: args_count,
        })
    }
}

fn is_spread(kind: &str) -> bool {
    kind == "variadic_unpacking"
}

fn declaration_signature(node: Node<'_>, source: &str) -> String {
    let end = node
        .child_by_field_name("body")
        .map(|body| body.start_byte())
        .unwrap_or(node.end_byte());
    let text = source.get(node.start_byte()..end).unwrap_or("");
    let collapsed: Vec<&str> = text.split_whitespace().collect();
    collapsed.join(" ").trim_end_matches(';').trim().to_string()
}
