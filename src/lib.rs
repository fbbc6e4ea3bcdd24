//! Structural source-code extraction over tree-sitter: symbols, imports,
//! inheritance edges and project-internal call edges, per file, as JSON-ready
//! records.

pub mod config;
pub mod engine;
pub mod model;

pub use config::{EngineConfig, ProjectNamespaces};
pub use engine::{Engine, SourceFile, parse_files};
pub use model::{Call, CallType, Import, Inheritance, ParseResult, Symbol, SymbolKind};
