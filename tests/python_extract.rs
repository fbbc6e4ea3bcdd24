use srcmap::{CallType, Engine, EngineConfig, ProjectNamespaces, SourceFile, SymbolKind};

fn parse(path: &str, source: &str) -> srcmap::ParseResult {
    let config = EngineConfig {
        project_namespaces: ProjectNamespaces::List(vec!["my_pkg".to_string()]),
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(config).unwrap();
    engine
        .parse_file(&SourceFile {
            path: path.to_string(),
            language: "python".to_string(),
            content: source.to_string(),
        })
        .unwrap()
}

const BILLING: &str = r#""""Billing helpers."""
import os
import my_pkg.util as util
from my_pkg.models import Base, Customer as Client


class Ledger(Base):
    """Tracks billing entries."""

    def add(self, amount):
        self.validate(amount)
        util.log(amount)
        client = Client(amount)
        handlers[0](amount)
        os.path.join("a", "b")
        return render(amount)

    def validate(self, amount):
        pass


@cached
def render(amount):
    """Render an amount."""
    return amount
"#;

#[test]
fn namespace_and_module_doc() {
    let result = parse("my_pkg/billing.py", BILLING);
    assert_eq!(result.namespace, "my_pkg.billing");
    assert_eq!(result.module_documentation.as_deref(), Some("Billing helpers."));
    assert!(result.error.is_none());
}

#[test]
fn symbols_with_docstrings() {
    let result = parse("my_pkg/billing.py", BILLING);

    let ledger = result.symbols.iter().find(|s| s.name == "Ledger").unwrap();
    assert_eq!(ledger.kind, SymbolKind::Class);
    assert_eq!(ledger.signature, "class Ledger(Base)");
    assert_eq!(ledger.documentation.as_deref(), Some("Tracks billing entries."));
    assert_eq!(ledger.line_start, 7);

    let add = result.symbols.iter().find(|s| s.name == "add").unwrap();
    assert_eq!(add.kind, SymbolKind::Method);

    let render = result.symbols.iter().find(|s| s.name == "render").unwrap();
    assert_eq!(render.kind, SymbolKind::Function);
    assert_eq!(render.signature, "def render(amount)");
    assert_eq!(render.documentation.as_deref(), Some("Render an amount."));
}

#[test]
fn grouped_import_expands_per_name() {
    let result = parse("my_pkg/billing.py", BILLING);

    // from my_pkg.models import Base, Customer as Client -> two records
    let models: Vec<_> = result
        .imports
        .iter()
        .filter(|i| i.module == "my_pkg.models")
        .collect();
    assert_eq!(models.len(), 2);
    assert!(models
        .iter()
        .any(|i| i.imported_names == ["Base"] && i.alias.is_none() && i.is_scoped_import));
    assert!(models
        .iter()
        .any(|i| i.imported_names == ["Customer"] && i.alias.as_deref() == Some("Client")));

    let util = result.imports.iter().find(|i| i.module == "my_pkg.util").unwrap();
    assert_eq!(util.alias.as_deref(), Some("util"));
    assert!(!util.is_scoped_import);
}

#[test]
fn inheritance_resolves_through_alias_map() {
    let result = parse("my_pkg/billing.py", BILLING);
    assert_eq!(result.inheritances.len(), 1);
    assert_eq!(result.inheritances[0].child, "my_pkg.billing.Ledger");
    assert_eq!(result.inheritances[0].parent, "my_pkg.models.Base");
}

#[test]
fn call_resolution_and_classification() {
    let result = parse("my_pkg/billing.py", BILLING);

    let validate = result
        .calls
        .iter()
        .find(|c| c.callee.as_deref() == Some("my_pkg.billing.Ledger.validate"))
        .unwrap();
    assert_eq!(validate.call_type, CallType::Method);
    assert_eq!(validate.caller, "my_pkg.billing.Ledger.add");
    assert_eq!(validate.arguments_count, Some(1));

    // util.log resolves through the module alias
    let log = result
        .calls
        .iter()
        .find(|c| c.callee.as_deref() == Some("my_pkg.util.log"))
        .unwrap();
    assert_eq!(log.call_type, CallType::Method);

    // Client(amount) is a constructor on the aliased class
    let ctor = result
        .calls
        .iter()
        .find(|c| c.call_type == CallType::Constructor)
        .unwrap();
    assert_eq!(ctor.callee.as_deref(), Some("my_pkg.models.Customer.__init__"));

    let render = result
        .calls
        .iter()
        .find(|c| c.callee.as_deref() == Some("my_pkg.billing.render"))
        .unwrap();
    assert_eq!(render.call_type, CallType::Function);
}

#[test]
fn decorator_recorded_as_function_call() {
    let result = parse("my_pkg/billing.py", BILLING);
    let decorator = result
        .calls
        .iter()
        .find(|c| c.callee.as_deref() == Some("my_pkg.billing.cached"))
        .unwrap();
    assert_eq!(decorator.call_type, CallType::Function);
    assert_eq!(decorator.caller, "my_pkg.billing");
    assert_eq!(decorator.arguments_count, Some(1));
}

#[test]
fn decorator_calls_can_be_disabled() {
    let config = EngineConfig {
        project_namespaces: ProjectNamespaces::List(vec!["my_pkg".to_string()]),
        include_decorator_calls: false,
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(config).unwrap();
    let result = engine
        .parse_file(&SourceFile {
            path: "my_pkg/billing.py".to_string(),
            language: "python".to_string(),
            content: BILLING.to_string(),
        })
        .unwrap();
    assert!(!result
        .calls
        .iter()
        .any(|c| c.callee.as_deref() == Some("my_pkg.billing.cached")));
}

#[test]
fn external_calls_filtered_dynamic_kept() {
    let result = parse("my_pkg/billing.py", BILLING);

    // os.path.join is outside the project namespace set
    assert!(!result
        .calls
        .iter()
        .any(|c| c.callee.as_deref().is_some_and(|callee| callee.starts_with("os."))));

    // handlers[0](amount) survives as a dynamic call
    let dynamic = result
        .calls
        .iter()
        .find(|c| c.call_type == CallType::Dynamic)
        .unwrap();
    assert!(dynamic.callee.is_none());

    // callee is None exactly when the call is dynamic
    for call in &result.calls {
        assert_eq!(call.callee.is_none(), call.call_type == CallType::Dynamic);
    }
}

#[test]
fn same_file_static_receiver_gets_namespace_prefix() {
    let source = r#"class Factory:
    pass


def build_all():
    return Factory.build(3)
"#;
    let result = parse("my_pkg/factory.py", source);
    let call = result
        .calls
        .iter()
        .find(|c| c.call_type == CallType::StaticMethod)
        .unwrap();
    assert_eq!(call.callee.as_deref(), Some("my_pkg.factory.Factory.build"));
    assert_eq!(call.caller, "my_pkg.factory.build_all");
}

#[test]
fn getattr_is_dynamic() {
    let source = r#"def lookup(obj, name):
    fn = getattr(obj, name)
    return fn()
"#;
    let result = parse("my_pkg/dyn.py", source);
    let getattr = result.calls.iter().find(|c| c.call_type == CallType::Dynamic).unwrap();
    assert!(getattr.callee.is_none());
}

#[test]
fn init_file_namespace_drops_stem() {
    let result = parse("my_pkg/__init__.py", "\"\"\"Package root.\"\"\"\n");
    assert_eq!(result.namespace, "my_pkg");
    assert_eq!(result.module_documentation.as_deref(), Some("Package root."));
}
