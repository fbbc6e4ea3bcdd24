use serde::{Deserialize, Serialize};

/// A named, typed code element extracted from one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Rendered declaration, e.g. `def func(a, b) -> int`.
    pub signature: String,
    /// 1-based, inclusive.
    pub line_start: i64,
    /// 1-based, inclusive.
    pub line_end: i64,
    pub documentation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Class,
    Interface,
    Enum,
    Function,
    Method,
    Field,
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SymbolKind::Class => write!(f, "class"),
            SymbolKind::Interface => write!(f, "interface"),
            SymbolKind::Enum => write!(f, "enum"),
            SymbolKind::Function => write!(f, "function"),
            SymbolKind::Method => write!(f, "method"),
            SymbolKind::Field => write!(f, "field"),
        }
    }
}

/// A reference to an external or sibling module. A grouped import statement
/// expands into one record per imported entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Import {
    /// Fully-qualified module as written, before alias resolution.
    pub module: String,
    /// Empty when the whole module or class is imported.
    pub imported_names: Vec<String>,
    pub alias: Option<String>,
    pub is_scoped_import: bool,
}

/// A directed edge between a type and one declared parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inheritance {
    /// Fully-qualified declaring type, including any enclosing-type chain.
    pub child: String,
    /// Resolved parent. Falls back to the written short name when resolution
    /// fails; never dropped.
    pub parent: String,
}

/// One call site. Calls whose resolved callee falls outside the
/// project-internal namespace set never reach the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    /// Nearest enclosing symbol's fully-qualified name, or the file namespace
    /// for module-level calls.
    pub caller: String,
    /// `None` exactly when `call_type` is `Dynamic`.
    pub callee: Option<String>,
    pub line_number: i64,
    pub call_type: CallType,
    /// `None` when the argument list cannot be enumerated statically
    /// (spreads, method references).
    pub arguments_count: Option<i64>,
}

/// Semantic category of a call site. Classification is a structural
/// heuristic (uppercase-first receiver means static access, uppercase-first
/// bare name means construction), not type inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    Function,
    Method,
    StaticMethod,
    Constructor,
    Dynamic,
}

impl std::fmt::Display for CallType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallType::Function => write!(f, "function"),
            CallType::Method => write!(f, "method"),
            CallType::StaticMethod => write!(f, "static_method"),
            CallType::Constructor => write!(f, "constructor"),
            CallType::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// The per-file aggregate. Field names and nesting are a stable contract;
/// external tools parse this JSON directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    pub path: String,
    pub language: String,
    pub namespace: String,
    pub symbols: Vec<Symbol>,
    pub imports: Vec<Import>,
    pub inheritances: Vec<Inheritance>,
    pub calls: Vec<Call>,
    pub module_documentation: Option<String>,
    /// Set when the parse was partial or failed. Symbols and edges extracted
    /// from the recoverable portion of the tree are still present.
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_type_serializes_snake_case() {
        let value = serde_json::to_value(CallType::StaticMethod).unwrap();
        assert_eq!(value, serde_json::json!("static_method"));
        let value = serde_json::to_value(CallType::Dynamic).unwrap();
        assert_eq!(value, serde_json::json!("dynamic"));
    }

    #[test]
    fn parse_result_round_trips() {
        let result = ParseResult {
            path: "pkg/mod.py".to_string(),
            language: "python".to_string(),
            namespace: "pkg.mod".to_string(),
            symbols: vec![Symbol {
                name: "Foo".to_string(),
                kind: SymbolKind::Class,
                signature: "class Foo(Base)".to_string(),
                line_start: 3,
                line_end: 9,
                documentation: Some("Foo doc".to_string()),
            }],
            imports: vec![Import {
                module: "pkg.util".to_string(),
                imported_names: vec!["helper".to_string()],
                alias: None,
                is_scoped_import: true,
            }],
            inheritances: vec![Inheritance {
                child: "pkg.mod.Foo".to_string(),
                parent: "pkg.base.Base".to_string(),
            }],
            calls: vec![Call {
                caller: "pkg.mod.Foo.method".to_string(),
                callee: None,
                line_number: 7,
                call_type: CallType::Dynamic,
                arguments_count: None,
            }],
            module_documentation: None,
            error: None,
        };
        let json = serde_json::to_string(&result).unwrap();
        let back: ParseResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
