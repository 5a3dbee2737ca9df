use thiserror::Error;

/// Failures talking to the hosted model, or making sense of what it said.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("hosted model unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("hosted model returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("hosted model returned no text")]
    EmptyResponse,

    #[error("hosted model refused the prompt: {0}")]
    Blocked(String),

    #[error("hosted model returned malformed output: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("classification is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("classification field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("image payload is invalid: {0}")]
    InvalidImage(String),

    #[error("no API key configured for the hosted model (set GEMINI_API_KEY)")]
    MissingApiKey,
}

/// A user action the session refused. The balance is never touched on any of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UserActionError {
    #[error("insufficient points: need {cost}, have {balance}")]
    InsufficientPoints { cost: u32, balance: u32 },

    #[error("reward `{0}` is not available")]
    RewardUnavailable(String),

    #[error("a scan is already in progress")]
    ScanInProgress,

    #[error("no scan is in progress")]
    NotScanning,

    #[error("still waiting for the previous chat reply")]
    ChatPending,

    #[error("message is empty")]
    EmptyMessage,
}
