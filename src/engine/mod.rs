// Extraction engine. One `LanguageAdapter` per language, one `Engine` per
// thread; `parse_files` fans a batch out over a worker pool.

pub mod adapter;
pub mod java;
pub mod php;
pub mod python;
pub mod resolve;
pub mod typescript;

use crate::config::{EngineConfig, ProjectNamespaces};
use crate::model::ParseResult;
use adapter::{FileContext, LanguageAdapter};
use anyhow::{Result, anyhow};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// One file to parse. `path` is the project-relative path; it feeds the
/// namespace derivation for the path-based languages.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    pub language: String,
    pub content: String,
}

pub struct Engine {
    config: EngineConfig,
    adapters: HashMap<String, Box<dyn LanguageAdapter>>,
    project_namespaces: BTreeSet<String>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let mut adapters: HashMap<String, Box<dyn LanguageAdapter>> = HashMap::new();
        for language in &config.enabled_languages {
            let adapter: Box<dyn LanguageAdapter> = match language.as_str() {
                "python" => Box::new(python::PythonAdapter::new()?),
                "java" => Box::new(java::JavaAdapter::new()?),
                "php" => Box::new(php::PhpAdapter::new()?),
                "typescript" => Box::new(typescript::TypeScriptAdapter::new()?),
                other => return Err(anyhow!("unsupported language: {other}")),
            };
            adapters.insert(language.clone(), adapter);
        }
        let project_namespaces = match &config.project_namespaces {
            ProjectNamespaces::List(list) => list.iter().cloned().collect(),
            ProjectNamespaces::Auto(_) => BTreeSet::new(),
        };
        Ok(Self {
            config,
            adapters,
            project_namespaces,
        })
    }

    pub fn project_namespaces(&self) -> &BTreeSet<String> {
        &self.project_namespaces
    }

    /// First pass in auto mode: parse every file far enough to read its
    /// namespace, then keep the roots that recur. A no-op when an explicit
    /// list was configured.
    pub fn detect_project_namespaces(&mut self, files: &[SourceFile]) -> Result<()> {
        if !matches!(self.config.project_namespaces, ProjectNamespaces::Auto(_)) {
            return Ok(());
        }
        let mut roots = Vec::new();
        for file in files {
            let Some(adapter) = self.adapters.get_mut(&file.language) else {
                continue;
            };
            let separator = adapter.separator();
            let Ok(parsed) = adapter.parse(&file.content) else {
                continue;
            };
            let namespace = adapter.namespace(&parsed, &file.content, &file.path);
            if let Some(root) = resolve::namespace_root(&namespace, separator) {
                roots.push(root.to_string());
            }
        }
        self.project_namespaces =
            resolve::detect_project_namespaces(&roots, self.config.auto_detect_min_files);
        tracing::debug!(
            namespaces = ?self.project_namespaces,
            "auto-detected project namespaces"
        );
        Ok(())
    }

    /// Full extraction for one file. Parse failures are captured in the
    /// result's `error` field, not returned as `Err`; only an unknown
    /// language tag fails the call.
    pub fn parse_file(&mut self, file: &SourceFile) -> Result<ParseResult> {
        let adapter = self
            .adapters
            .get_mut(&file.language)
            .ok_or_else(|| anyhow!("no adapter for language: {}", file.language))?;

        let mut result = ParseResult {
            path: file.path.clone(),
            language: file.language.clone(),
            namespace: String::new(),
            symbols: Vec::new(),
            imports: Vec::new(),
            inheritances: Vec::new(),
            calls: Vec::new(),
            module_documentation: None,
            error: None,
        };

        let parsed = match adapter.parse(&file.content) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(path = %file.path, error = %err, "parse failed");
                result.error = Some(err.to_string());
                return Ok(result);
            }
        };
        if !parsed.error_free {
            result.error = Some("syntax errors in source, extraction is partial".to_string());
        }

        result.namespace = adapter.namespace(&parsed, &file.content, &file.path);
        result.module_documentation = adapter.module_documentation(&parsed, &file.content);
        result.imports = adapter.extract_imports(&parsed, &file.content, &file.path);

        let alias_map = resolve::build_alias_map(&result.imports, adapter.separator());
        let ctx = FileContext {
            namespace: &result.namespace,
            alias_map: &alias_map,
            project_namespaces: &self.project_namespaces,
            include_decorator_calls: self.config.include_decorator_calls,
            max_calls: self.config.max_calls_per_file,
        };

        result.symbols = adapter.extract_symbols(&parsed, &file.content);
        result.inheritances = adapter.extract_inheritances(&parsed, &file.content, &ctx);
        result.calls = adapter.extract_calls(&parsed, &file.content, &ctx);

        tracing::debug!(
            path = %file.path,
            symbols = result.symbols.len(),
            calls = result.calls.len(),
            "extracted"
        );
        Ok(result)
    }
}

/// Parses a batch across `config.workers` threads. Each worker owns its own
/// `Engine` (tree-sitter parsers are not `Sync`); the shared queue hands out
/// one file at a time. Output order follows completion, not input.
pub fn parse_files(config: &EngineConfig, files: Vec<SourceFile>) -> Result<Vec<ParseResult>> {
    let mut seed = Engine::new(config.clone())?;
    seed.detect_project_namespaces(&files)?;
    let detected = seed.project_namespaces.clone();

    let workers = config.workers.max(1).min(files.len().max(1));
    if workers == 1 {
        let mut results = Vec::with_capacity(files.len());
        for file in &files {
            results.push(seed.parse_file(file)?);
        }
        return Ok(results);
    }

    let queue: Arc<Mutex<VecDeque<SourceFile>>> = Arc::new(Mutex::new(files.into_iter().collect()));
    let results: Arc<Mutex<Vec<ParseResult>>> = Arc::new(Mutex::new(Vec::new()));
    let errors: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let queue = Arc::clone(&queue);
            let results = Arc::clone(&results);
            let errors = Arc::clone(&errors);
            let config = config.clone();
            let detected = detected.clone();
            scope.spawn(move || {
                let mut engine = match Engine::new(config) {
                    Ok(engine) => engine,
                    Err(err) => {
                        if let Ok(mut errors) = errors.lock() {
                            errors.push(err.to_string());
                        }
                        return;
                    }
                };
                engine.project_namespaces = detected;
                loop {
                    let file = match queue.lock() {
                        Ok(mut queue) => queue.pop_front(),
                        Err(_) => None,
                    };
                    let Some(file) = file else { break };
                    match engine.parse_file(&file) {
                        Ok(result) => {
                            if let Ok(mut results) = results.lock() {
                                results.push(result);
                            }
                        }
                        Err(err) => {
                            tracing::warn!(path = %file.path, error = %err, "worker skipped file");
                            if let Ok(mut errors) = errors.lock() {
                                errors.push(format!("{}: {err}", file.path));
                            }
                        }
                    }
                }
            });
        }
    });

    let errors = errors.lock().map_err(|_| anyhow!("worker panicked"))?;
    if let Some(first) = errors.first() {
        return Err(anyhow!("batch failed: {first}"));
    }
    drop(errors);
    let results = Arc::try_unwrap(results)
        .map_err(|_| anyhow!("worker still holds results"))?
        .into_inner()
        .map_err(|_| anyhow!("results mutex poisoned"))?;
    Ok(results)
}
