use thiserror::Error;

/// Failures reported by a model endpoint.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Transport failure, quota exhaustion, or a provider-side rejection.
    #[error("model request failed: {0}")]
    Request(String),

    /// The provider answered, but with something we cannot interpret.
    #[error("malformed model response: {0}")]
    MalformedResponse(String),
}

/// A `log_outbreak` call whose arguments do not satisfy the tool schema.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolArgumentError {
    #[error("tool call arguments are not a JSON object: {0}")]
    Malformed(String),

    #[error("tool call is missing required field '{0}'")]
    Missing(&'static str),

    #[error("tool call field '{field}' is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// The outbreak store could not persist or read a record.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("outbreak database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("outbreak store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    Missing(&'static str),
}

/// Everything that can go wrong inside one diagnosis cycle.
#[derive(Debug, Error)]
pub enum DiagnosisError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    ToolArguments(#[from] ToolArgumentError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
