// Runtime defaults, loaded from the environment with fallbacks.
// CLI flags in main.rs override these per invocation.

use std::env;
use std::time::Duration;

lazy_static::lazy_static! {
    pub static ref GEMINI_BASE_URL: String = env::var("GEMINI_BASE_URL").unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string());
    pub static ref GEMINI_MODEL: String = env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".to_string());
    pub static ref GEMINI_API_KEY: String = env::var("GEMINI_API_KEY").unwrap_or_default();
    pub static ref REQUEST_TIMEOUT: Duration = Duration::from_secs(
        env::var("ECO_REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(30)
    );
    // 0 disables the window and sends the whole conversation.
    pub static ref CHAT_HISTORY_TURNS: usize = env::var("ECO_CHAT_HISTORY_TURNS").ok().and_then(|v| v.parse().ok()).unwrap_or(40);
}

/// Points a fresh session starts with.
pub const STARTING_POINTS: u32 = 100;
/// Points credited for each claimed classification.
pub const CLAIM_REWARD: u32 = 10;
/// How long a toast notification stays up before the server clears it.
pub const NOTIFICATION_TTL: Duration = Duration::from_secs(3);

/// Upper bound on a scan upload. The photo arrives base64-encoded, a third larger than the file.
pub const MAX_SCAN_BODY_BYTES: usize = 20 * 1024 * 1024;

pub const CLASSIFICATION_TEMPERATURE: f32 = 0.4;
