//! Plant disease diagnosis with conditional outbreak logging.

pub mod agent;
pub mod config;
pub mod error;
pub mod language;
pub mod llm;
pub mod outbreak;
pub mod registry;

pub use agent::{DiagnosisResult, PlantDoctor, EMPTY_FALLBACK};
pub use config::Config;
pub use error::{ConfigError, DiagnosisError, ModelError, StorageError, ToolArgumentError};
pub use language::Language;
pub use llm::{Brain, GenerateRequest, InputPart, ModelEndpoint, ResponsePart, ToolMode};
pub use outbreak::{OutbreakRecorder, OutbreakRegistry, OutbreakStat, RECENT_STATS_LIMIT};
pub use registry::{OutbreakReport, Severity, ToolDeclaration, LOG_OUTBREAK};
