use thiserror::Error;

/// Failure to coerce a query parameter into its typed value.
#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    #[error("Parameter '{name}' must be a number, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error("Parameter '{name}' must be a date (YYYY-MM-DD), got '{value}'")]
    InvalidDate { name: &'static str, value: String },
}

/// Everything that can go wrong between building the prompt and holding a
/// validated prediction.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("No OpenRouter API key configured. Hint: set HAZEND_OPENROUTER_API_KEY or run `hazend configure`.")]
    MissingApiKey,

    #[error("Failed to reach the inference endpoint: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success status; `body` is kept verbatim.
    #[error("{body}")]
    Status { status: u16, body: String },

    #[error("Unexpected inference response: {0}")]
    UnexpectedResponse(String),

    #[error("Model output is not a valid prediction: {0}")]
    MalformedOutput(String),
}

impl PredictionError {
    /// Short machine-readable tag used in the `assessment` field.
    pub fn kind(&self) -> &'static str {
        match self {
            PredictionError::MissingApiKey => "missing_api_key",
            PredictionError::Transport(_) => "transport",
            PredictionError::Status { .. } => "upstream_status",
            PredictionError::UnexpectedResponse(_) => "unexpected_response",
            PredictionError::MalformedOutput(_) => "malformed_output",
        }
    }
}
