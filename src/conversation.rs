use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::backend::ModelTurn;

pub const ECOBOT_PERSONA: &str = r#"Anda adalah EcoBot, asisten virtual ramah untuk aplikasi "Eco Untung" di Desa Wisata Pulau Untung Jawa, Kepulauan Seribu.

Tugas Anda:
1. Menjawab pertanyaan tentang pemilahan sampah (Organik vs Anorganik) dengan edukatif.
2. Memberikan informasi tentang sejarah dan spot wisata di Pulau Untung Jawa (Jembatan Pengantin, Pantai Sakura, Kampung Jepang, Hutan Mangrove).
3. Menjelaskan cara kerja aplikasi: Foto sampah -> Dapat Poin -> Tukar di UMKM lokal.
4. Selalu ingatkan pengguna untuk menjaga kebersihan pulau/laut.

Gaya bicara: Santai, ramah, membantu, dan menggunakan Bahasa Indonesia yang baik."#;

pub const WELCOME_MESSAGE: &str =
    "Halo! Saya EcoBot. Ada yang bisa saya bantu mengenai Pulau Untung Jawa atau cara memilah sampah?";

/// Returned by `converse` whenever the hosted model cannot be used.
pub const CHAT_FALLBACK: &str =
    "Maaf, EcoBot sedang istirahat sebentar (koneksi error). Silakan coba lagi nanti ya!";

/// Returned when the model answered with nothing.
pub const EMPTY_REPLY_FALLBACK: &str = "Maaf, saya tidak mengerti.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub id: String,
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    pub fn to_model_turn(&self) -> ModelTurn {
        match self.role {
            Role::User => ModelTurn::user_text(self.text.clone()),
            Role::Assistant => ModelTurn::model_text(self.text.clone()),
        }
    }
}

/// Append-only chat log for one session.
#[derive(Debug, Clone)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
}

impl Conversation {
    /// A conversation opened by EcoBot's greeting.
    pub fn new() -> Self {
        Self {
            turns: vec![ConversationTurn::new(Role::Assistant, WELCOME_MESSAGE)],
        }
    }

    pub fn empty() -> Self {
        Self { turns: Vec::new() }
    }

    pub fn push(&mut self, role: Role, text: impl Into<String>) -> &ConversationTurn {
        self.turns.push(ConversationTurn::new(role, text));
        &self.turns[self.turns.len() - 1]
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// How much prior conversation goes out with each chat request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryWindow {
    Unbounded,
    LastTurns(usize),
}

impl HistoryWindow {
    /// `0` means no limit.
    pub fn from_turns(turns: usize) -> Self {
        if turns == 0 {
            HistoryWindow::Unbounded
        } else {
            HistoryWindow::LastTurns(turns)
        }
    }

    pub fn apply<'a>(&self, turns: &'a [ConversationTurn]) -> &'a [ConversationTurn] {
        match *self {
            HistoryWindow::Unbounded => turns,
            HistoryWindow::LastTurns(limit) => &turns[turns.len().saturating_sub(limit)..],
        }
    }
}
