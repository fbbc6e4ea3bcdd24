// Engine configuration. Populated by the caller (CLI or config-file layer);
// the engine itself never reads files or environment variables.

use serde::Deserialize;

/// Which namespaces count as project-internal when filtering calls.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ProjectNamespaces {
    /// Detect from the scanned files: namespace roots that appear in at
    /// least `auto_detect_min_files` files are treated as internal.
    Auto(AutoMarker),
    /// Explicit list of namespace prefixes.
    List(Vec<String>),
}

/// Deserializes from the literal string `"auto"`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoMarker {
    Auto,
}

impl Default for ProjectNamespaces {
    fn default() -> Self {
        ProjectNamespaces::Auto(AutoMarker::Auto)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub project_namespaces: ProjectNamespaces,

    /// Record bare-name decorators as function calls (Python only).
    pub include_decorator_calls: bool,

    /// Stop collecting `Call` records for a file once this many exist.
    /// Bounds memory on pathological files.
    pub max_calls_per_file: usize,

    /// Language tags the engine builds adapters for.
    pub enabled_languages: Vec<String>,

    /// Worker threads for `parse_files`.
    pub workers: usize,

    /// Minimum number of files a namespace root must appear in before
    /// auto-detection treats it as project-internal.
    pub auto_detect_min_files: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            project_namespaces: ProjectNamespaces::default(),
            include_decorator_calls: true,
            max_calls_per_file: 2_000,
            enabled_languages: vec![
                "python".to_string(),
                "java".to_string(),
                "php".to_string(),
                "typescript".to_string(),
            ],
            workers: 4,
            auto_detect_min_files: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.project_namespaces, ProjectNamespaces::default());
        assert_eq!(config.max_calls_per_file, 2_000);
        assert!(config.include_decorator_calls);
        assert_eq!(config.enabled_languages.len(), 4);
    }

    #[test]
    fn deserializes_auto_and_list() {
        let auto: EngineConfig =
            serde_json::from_str(r#"{"project_namespaces": "auto"}"#).unwrap();
        assert_eq!(auto.project_namespaces, ProjectNamespaces::Auto(AutoMarker::Auto));

        let list: EngineConfig =
            serde_json::from_str(r#"{"project_namespaces": ["myapp", "shared"]}"#).unwrap();
        assert_eq!(
            list.project_namespaces,
            ProjectNamespaces::List(vec!["myapp".to_string(), "shared".to_string()])
        );
    }
}
