//! Mock generator: deterministic replies for testing without API keys.

use crate::llm::{GenerationError, GenerationParams, TextGenerator};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

const DEMO_MOODS: [&str; 5] = ["confusion", "surprise", "trust", "anticipation", "joy"];

/// Replays a scripted queue of replies, then falls back to canned
/// well-formed story sections so an offline session can run to the end.
#[derive(Debug, Default)]
pub struct MockGenerator {
    script: Mutex<VecDeque<Result<String, GenerationError>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(replies: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    /// Script a sequence of successful replies.
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_script(replies.into_iter().map(|r| Ok(r.into())).collect())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, oldest first.
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }

    fn canned_reply(n: usize) -> String {
        let mood = DEMO_MOODS[n.min(DEMO_MOODS.len() - 1)];
        format!(
            "The path bends and something new waits around the corner (scene {scene}).\n\
             ~~~~\n\
             Do you follow the light or rest a moment?\n\
             ~~~~\n\
             Scene {scene}: the traveller pressed on.\n\
             ~~~~\n\
             Current character mood: {mood}\n\
             ~~~~\n\
             Current user mood: {mood}\n\
             ~~~~\n\
             Updated personality scores:\n\
             Risk Taker: {risk}/5\n\
             Optimism: {hope}/5\n\
             Social: 0/5\n\
             Analytical: 0/5\n\
             Fantasy Interest: 1/5\n\
             Introspective: 0/5",
            scene = n + 1,
            mood = mood,
            risk = (n as i32).min(5),
            hope = (n as i32 / 2).min(5),
        )
    }
}

#[async_trait::async_trait]
impl TextGenerator for MockGenerator {
    fn name(&self) -> &str {
        "Mock"
    }

    async fn generate(
        &self,
        _system: &str,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<String, GenerationError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().await.push(prompt.to_string());
        match self.script.lock().await.pop_front() {
            Some(reply) => reply,
            None => Ok(Self::canned_reply(n)),
        }
    }
}
