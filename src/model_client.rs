use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::backend::{ModelBackend, ModelRequest, ModelTurn, Part, TurnRole};
use crate::classification::{parse_classification, response_schema, ClassificationResult, CLASSIFICATION_PROMPT};
use crate::constants;
use crate::conversation::{ConversationTurn, HistoryWindow, CHAT_FALLBACK, ECOBOT_PERSONA, EMPTY_REPLY_FALLBACK};
use crate::error::ServiceError;
use crate::image::ImagePayload;

/// Classification and chat over a pluggable hosted model.
///
/// The two calls fail differently on purpose: `classify` hands the error back so the
/// caller can show it, `converse` always produces something to show in the chat.
#[derive(Clone)]
pub struct ModelClient {
    backend: Arc<dyn ModelBackend>,
    history: HistoryWindow,
}

impl ModelClient {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            backend,
            history: HistoryWindow::from_turns(*constants::CHAT_HISTORY_TURNS),
        }
    }

    pub fn with_history_window(mut self, history: HistoryWindow) -> Self {
        self.history = history;
        self
    }

    pub fn history_window(&self) -> HistoryWindow {
        self.history
    }

    /// Identify and classify the waste item in `image`.
    #[instrument(skip(self, image), fields(bytes = image.len()))]
    pub async fn classify(&self, image: &[u8]) -> Result<ClassificationResult, ServiceError> {
        let payload = ImagePayload::from_bytes(image)?;
        debug!(mime_type = payload.mime_type, "Sending image for classification");

        let request = classification_request(payload);
        let text = self.backend.generate(&request).await?;
        let result = parse_classification(&text)?;

        info!(item = %result.item_name, category = %result.category, "Classified waste item");
        Ok(result)
    }

    /// Answer `user_text` in the context of `prior_turns`. Never fails.
    #[instrument(skip(self, user_text, prior_turns), fields(prior = prior_turns.len()))]
    pub async fn converse(&self, user_text: &str, prior_turns: &[ConversationTurn]) -> String {
        let request = self.chat_request(user_text, prior_turns);
        match self.backend.generate(&request).await {
            Ok(reply) if reply.trim().is_empty() => EMPTY_REPLY_FALLBACK.to_string(),
            Ok(reply) => reply,
            Err(ServiceError::EmptyResponse) => EMPTY_REPLY_FALLBACK.to_string(),
            Err(e) => {
                warn!(error = %e, "Chat request failed, answering with fallback");
                CHAT_FALLBACK.to_string()
            }
        }
    }

    fn chat_request(&self, user_text: &str, prior_turns: &[ConversationTurn]) -> ModelRequest {
        let window = self.history.apply(prior_turns);
        if window.len() < prior_turns.len() {
            debug!(
                sent = window.len(),
                dropped = prior_turns.len() - window.len(),
                "Trimming chat history to window"
            );
        }

        let mut turns: Vec<ModelTurn> = window.iter().map(ConversationTurn::to_model_turn).collect();
        turns.push(ModelTurn::user_text(user_text));

        ModelRequest {
            system_instruction: Some(ECOBOT_PERSONA.to_string()),
            turns,
            response_schema: None,
            temperature: None,
        }
    }
}

fn classification_request(payload: ImagePayload) -> ModelRequest {
    ModelRequest {
        system_instruction: None,
        turns: vec![ModelTurn {
            role: TurnRole::User,
            parts: vec![
                Part::InlineImage {
                    mime_type: payload.mime_type.to_string(),
                    data: payload.base64,
                },
                Part::Text(CLASSIFICATION_PROMPT.to_string()),
            ],
        }],
        response_schema: Some(response_schema()),
        temperature: Some(constants::CLASSIFICATION_TEMPERATURE),
    }
}
