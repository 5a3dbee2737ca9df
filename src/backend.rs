//! Provider-neutral request shape and the seam the hosted model plugs into.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ServiceError;

/// Who authored a turn, as the hosted model sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    /// Base64 payload, without any `data:` prefix.
    InlineImage { mime_type: String, data: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelTurn {
    pub role: TurnRole,
    pub parts: Vec<Part>,
}

impl ModelTurn {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            parts: vec![Part::Text(text.into())],
        }
    }
}

/// One generation call. `response_schema` switches the model into JSON output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelRequest {
    pub system_instruction: Option<String>,
    pub turns: Vec<ModelTurn>,
    pub response_schema: Option<Value>,
    pub temperature: Option<f32>,
}

/// Anything that can turn a [`ModelRequest`] into reply text.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn generate(&self, request: &ModelRequest) -> Result<String, ServiceError>;
}
