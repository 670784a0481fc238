pub mod config;
pub mod emotion;
pub mod preference;
pub mod state;

pub use config::WovenConfig;
pub use emotion::{Emotion, EmotionCategory};
pub use preference::{PreferenceError, PreferenceVector, Trait};
pub use state::{MoodArc, ProfileError, StoryLength, StoryPhase, StoryProfile, StoryState, TurnCommit};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Story metadata, written once when a session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryRecord {
    pub story_id: Uuid,
    pub name: String,
    pub genre: String,
    pub total_turns: usize,
    pub start_time: i64, // Unix timestamp
    pub research_email: Option<String>,
}

/// Flat per-turn record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub story_id: Uuid,
    pub turn_number: usize,
    pub character_mood: String,
    pub user_mood: String,
    pub story_summary: String,
    pub question: String,
    /// JSON object of trait key → score.
    pub preferences: String,
    pub story_phase: String,
    pub is_final: bool,
    pub timestamp: i64, // Unix timestamp
}

/// Sink for story progress. Writes are best effort: callers log failures
/// and carry on.
#[async_trait]
pub trait StoryRecorder: Send + Sync {
    async fn record_story(&self, story: &StoryRecord) -> anyhow::Result<()>;
    async fn record_turn(&self, turn: &TurnRecord) -> anyhow::Result<()>;
}
