/// Infrastructure error type shared across all `rp-*` crates.
///
/// Distinct from [`StageError`], which captures the per-turn fallibility
/// the graph executor absorbs per the documented stage fallback policy.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("invoker {role}: {message}")]
    Invoker { role: String, message: String },

    #[error("database: {0}")]
    Database(String),

    #[error("config: {0}")]
    Config(String),

    #[error("turn {turn_id} was superseded")]
    Superseded { turn_id: uuid::Uuid },

    #[error("fatal: {0}")]
    Fatal(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Per-stage fallibility, absorbed by the graph executor according to the
/// documented fallback policy. Never propagates to the HTTP caller; every
/// variant is recorded on [`crate::turn::TurnState::errors`] instead.
#[derive(thiserror::Error, Debug, Clone)]
pub enum StageError {
    #[error("invoker call for role {role} timed out after {elapsed_ms}ms")]
    InvokerTimeout { role: String, elapsed_ms: u64 },

    #[error("invoker response for role {role} did not match the expected schema: {detail}")]
    InvokerParseError { role: String, detail: String },

    #[error("stage {stage} produced no usable output, falling back to defaults")]
    StageFallback { stage: String },

    #[error("search could not parse a root reply plan, falling back to a degenerate plan")]
    SearchDegenerate,

    #[error("final validation produced no non-empty segments")]
    ValidationFail,
}

impl StageError {
    /// The taxonomy tag used when persisting this error into
    /// `messages.metadata` for the ai message.
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::InvokerTimeout { .. } => "InvokerTimeout",
            StageError::InvokerParseError { .. } => "InvokerParseError",
            StageError::StageFallback { .. } => "StageFallback",
            StageError::SearchDegenerate => "SearchDegenerate",
            StageError::ValidationFail => "ValidationFail",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_match_taxonomy() {
        assert_eq!(
            StageError::InvokerTimeout { role: "main".into(), elapsed_ms: 60_000 }.kind(),
            "InvokerTimeout"
        );
        assert_eq!(StageError::SearchDegenerate.kind(), "SearchDegenerate");
    }
}
