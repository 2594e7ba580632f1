use crate::types::DbId;

/// Error taxonomy shared across the engine.
///
/// `Generation` and `Parse` drive the variant retry state machine;
/// `Template` is a configuration fault and fails the whole run;
/// `Validation` is rejected before a run is ever created. A QC fail is
/// *not* an error -- it is a normal evaluated outcome.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// A backend transport failure or timeout, tagged with the backend
    /// name so the orchestrator can decide how to retry.
    #[error("Backend '{backend}' generation failed: {message}")]
    Generation { backend: String, message: String },

    /// A model response that could not be coerced into the required
    /// structured schema.
    #[error("Structured output parse failed: {0}")]
    Parse(String),

    /// A workflow template / placeholder mismatch. Retrying would recur
    /// identically, so this is never retried.
    #[error("Template error: {0}")]
    Template(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Build a [`EngineError::Generation`] tagged with a backend name.
    pub fn generation(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Generation {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Whether the variant orchestrator may retry after this error.
    ///
    /// Transport failures retry up to the attempt cap; a parse failure
    /// gets one corrective re-prompt before counting against the cap.
    /// Everything else surfaces immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Generation { .. } | Self::Parse(_))
    }
}
