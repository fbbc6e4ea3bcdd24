use srcmap::{CallType, Engine, EngineConfig, ProjectNamespaces, SourceFile, SymbolKind};

fn parse(path: &str, source: &str) -> srcmap::ParseResult {
    let config = EngineConfig {
        project_namespaces: ProjectNamespaces::List(vec!["App".to_string()]),
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(config).unwrap();
    engine
        .parse_file(&SourceFile {
            path: path.to_string(),
            language: "php".to_string(),
            content: source.to_string(),
        })
        .unwrap()
}

const INVOICE_SERVICE: &str = r#"<?php
/** Invoice services. */

namespace App\Billing;

use App\Core\Repository;
use App\Core\Mailer as Notifier;

/** Creates invoices. */
class InvoiceService extends Repository implements \Countable
{
    private $cache;

    public function create(int $amount)
    {
        $this->validate($amount);
        $invoice = new Invoice($amount);
        Notifier::send($invoice);
        self::audit($invoice);
        format_total($amount);
        \strlen("x");
        $handler($invoice);
        return $invoice;
    }

    private function validate(int $amount)
    {
    }
}
"#;

#[test]
fn namespace_and_module_doc() {
    let result = parse("src/InvoiceService.php", INVOICE_SERVICE);
    assert_eq!(result.namespace, "App\\Billing");
    assert_eq!(result.module_documentation.as_deref(), Some("Invoice services."));
    assert!(result.error.is_none());
}

#[test]
fn symbols_with_docblocks() {
    let result = parse("src/InvoiceService.php", INVOICE_SERVICE);

    let service = result.symbols.iter().find(|s| s.name == "InvoiceService").unwrap();
    assert_eq!(service.kind, SymbolKind::Class);
    assert_eq!(service.documentation.as_deref(), Some("Creates invoices."));

    let cache = result.symbols.iter().find(|s| s.name == "cache").unwrap();
    assert_eq!(cache.kind, SymbolKind::Field);

    assert!(result.symbols.iter().any(|s| s.name == "create" && s.kind == SymbolKind::Method));
}

#[test]
fn use_declarations() {
    let result = parse("src/InvoiceService.php", INVOICE_SERVICE);

    let repo = result
        .imports
        .iter()
        .find(|i| i.module == "App\\Core\\Repository")
        .unwrap();
    assert!(repo.alias.is_none());
    assert!(repo.imported_names.is_empty());

    let mailer = result.imports.iter().find(|i| i.module == "App\\Core\\Mailer").unwrap();
    assert_eq!(mailer.alias.as_deref(), Some("Notifier"));
}

#[test]
fn grouped_use_expands_per_clause() {
    let source = r#"<?php
namespace App\Billing;

use App\Core\{Repository, Mailer as Notifier};
"#;
    let result = parse("src/Grouped.php", source);
    assert_eq!(result.imports.len(), 2);
    assert!(result
        .imports
        .iter()
        .any(|i| i.module == "App\\Core\\Repository" && i.alias.is_none()));
    assert!(result
        .imports
        .iter()
        .any(|i| i.module == "App\\Core\\Mailer" && i.alias.as_deref() == Some("Notifier")));
}

#[test]
fn inheritance_absolute_and_aliased() {
    let result = parse("src/InvoiceService.php", INVOICE_SERVICE);
    let parents: Vec<&str> = result
        .inheritances
        .iter()
        .filter(|e| e.child == "App\\Billing\\InvoiceService")
        .map(|e| e.parent.as_str())
        .collect();
    assert!(parents.contains(&"App\\Core\\Repository"));
    // \Countable resolves to the global interface
    assert!(parents.contains(&"Countable"));
}

#[test]
fn call_classification() {
    let result = parse("src/InvoiceService.php", INVOICE_SERVICE);
    let caller = "App\\Billing\\InvoiceService::create";

    let validate = result
        .calls
        .iter()
        .find(|c| c.callee.as_deref() == Some("App\\Billing\\InvoiceService::validate"))
        .unwrap();
    assert_eq!(validate.call_type, CallType::Method);
    assert_eq!(validate.caller, caller);

    let ctor = result
        .calls
        .iter()
        .find(|c| c.call_type == CallType::Constructor)
        .unwrap();
    assert_eq!(ctor.callee.as_deref(), Some("App\\Billing\\Invoice::__construct"));
    assert_eq!(ctor.arguments_count, Some(1));

    let send = result
        .calls
        .iter()
        .find(|c| c.callee.as_deref() == Some("App\\Core\\Mailer::send"))
        .unwrap();
    assert_eq!(send.call_type, CallType::StaticMethod);

    let audit = result
        .calls
        .iter()
        .find(|c| c.callee.as_deref() == Some("App\\Billing\\InvoiceService::audit"))
        .unwrap();
    assert_eq!(audit.call_type, CallType::StaticMethod);

    let format = result
        .calls
        .iter()
        .find(|c| c.callee.as_deref() == Some("App\\Billing\\format_total"))
        .unwrap();
    assert_eq!(format.call_type, CallType::Function);

    // \strlen is absolute and outside the project namespaces
    assert!(!result
        .calls
        .iter()
        .any(|c| c.callee.as_deref() == Some("strlen")));

    // $handler($invoice) is a dynamic call
    assert!(result
        .calls
        .iter()
        .any(|c| c.call_type == CallType::Dynamic && c.callee.is_none()));
}

#[test]
fn variable_receivers_are_dynamic() {
    let source = r#"<?php
namespace App\Billing;

function dispatch($mailer, $class)
{
    $mailer->send();
    $class::handle();
    new $class();
}
"#;
    let result = parse("src/dispatch.php", source);
    assert_eq!(result.calls.len(), 3);
    for call in &result.calls {
        assert_eq!(call.call_type, CallType::Dynamic);
        assert!(call.callee.is_none());
        assert_eq!(call.caller, "App\\Billing\\dispatch");
    }
}
