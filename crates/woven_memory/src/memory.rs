use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;
use woven_core::{StoryRecord, StoryRecorder, TurnRecord};

/// Keeps records in memory; handy in tests.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    stories: Mutex<Vec<StoryRecord>>,
    turns: Mutex<Vec<TurnRecord>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn stories(&self) -> Vec<StoryRecord> {
        self.stories.lock().await.clone()
    }

    /// Turns in the order they were recorded.
    pub async fn turns(&self) -> Vec<TurnRecord> {
        self.turns.lock().await.clone()
    }
}

#[async_trait]
impl StoryRecorder for MemoryRecorder {
    async fn record_story(&self, story: &StoryRecord) -> Result<()> {
        self.stories.lock().await.push(story.clone());
        Ok(())
    }

    async fn record_turn(&self, turn: &TurnRecord) -> Result<()> {
        self.turns.lock().await.push(turn.clone());
        Ok(())
    }
}
