//! Eco Untung: photograph trash, let a hosted multimodal model sort it, earn points,
//! and trade them at village vendors. EcoBot answers questions on the side.

pub mod app_state;
pub mod backend;
pub mod chat;
pub mod classification;
pub mod constants;
pub mod conversation;
pub mod error;
pub mod gemini;
pub mod image;
pub mod model_client;
pub mod rewards;
pub mod web_server;

pub use app_state::{PointBalance, ScanState, Session, SessionSnapshot};
pub use backend::{ModelBackend, ModelRequest, ModelTurn, Part, TurnRole};
pub use classification::{ClassificationResult, RecyclingPotential, WasteCategory};
pub use conversation::{Conversation, ConversationTurn, HistoryWindow, Role};
pub use error::{ServiceError, UserActionError};
pub use gemini::{GeminiBackend, GeminiConfig};
pub use model_client::ModelClient;
pub use rewards::RewardItem;
