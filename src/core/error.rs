//! Error types shared by the generators and the run pipeline.

use crate::core::state::RunStatus;

/// Longest slice of a response body carried in an error message.
const BODY_EXCERPT_CHARS: usize = 500;

/// First few hundred characters of a response body, for error messages and logs.
pub fn body_excerpt(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(BODY_EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}… ({} bytes total)", &body[..cut], body.len()),
        None => body.to_string(),
    }
}

/// Failure talking to the generative-language service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No key configured inline and the environment variable is unset
    #[error("API key missing: set the {0} environment variable or llm.api_key")]
    MissingApiKey(String),

    /// Network, TLS or body read failure
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success status without a structured error body. `body` is an excerpt.
    #[error("service responded with {status}: {body}")]
    Status { status: u16, body: String },

    /// Error message reported by the service itself, verbatim
    #[error("{0}")]
    Service(String),

    /// Response body was not the expected envelope. `body` is an excerpt.
    #[error("failed to decode service response: {source}. Body: {body}")]
    Decode {
        #[source]
        source: serde_json::Error,
        body: String,
    },
}

/// Failure producing the story structure. Fatal to a run.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("story response did not match the expected layout: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("story response contained no pages")]
    NoPages,

    /// No text came back, usually because the prompt or answer was blocked
    #[error("story service returned no text (reason: {reason})")]
    Empty { reason: String },
}

/// Failure illustrating a single page. Recovered by the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum IllustrationError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("visual prompt is blank")]
    EmptyPrompt,

    #[error("no image in response (finish reason: {finish_reason})")]
    NoImage { finish_reason: String },
}

/// Reasons a run refuses to start.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RunError {
    #[error("Please enter story keywords!")]
    BlankKeywords,

    #[error("a run can only start from Idle (current status: {0:?})")]
    NotIdle(RunStatus),
}
