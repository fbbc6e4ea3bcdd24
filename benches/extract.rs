use criterion::{Criterion, black_box, criterion_group, criterion_main};
use srcmap::{Engine, EngineConfig, ProjectNamespaces, SourceFile};

fn fixture(modules: usize) -> String {
    let mut source = String::from("\"\"\"Generated benchmark module.\"\"\"\nfrom my_pkg.models import Base\n\n");
    for i in 0..modules {
        source.push_str(&format!(
            r#"
class Service{i}(Base):
    """Service number {i}."""

    def handle(self, amount):
        self.check(amount)
        return transform(amount)

    def check(self, amount):
        pass


def transform(amount):
    return amount
"#
        ));
    }
    source
}

fn bench_parse_file(c: &mut Criterion) {
    let config = EngineConfig {
        project_namespaces: ProjectNamespaces::List(vec!["my_pkg".to_string()]),
        ..EngineConfig::default()
    };
    let content = fixture(50);
    let file = SourceFile {
        path: "my_pkg/generated.py".to_string(),
        language: "python".to_string(),
        content,
    };

    c.bench_function("parse_file_python_50_classes", |b| {
        let mut engine = Engine::new(config.clone()).unwrap();
        b.iter(|| {
            let result = engine.parse_file(black_box(&file)).unwrap();
            black_box(result)
        })
    });
}

criterion_group!(benches, bench_parse_file);
criterion_main!(benches);
