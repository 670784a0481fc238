//! The per-session turn state machine.
//!
//! `NotStarted → InProgress → Completed`, with `reset` returning to
//! `NotStarted` from anywhere. One orchestrator owns one `StoryState`; every
//! turn is awaited to completion before the next can begin.

use crate::analyzer::ChoiceAnalyzer;
use crate::llm::{GenerationError, GenerationParams, TextGenerator};
use crate::parser::parse_reply_with_fallback;
use crate::prompts::{PromptBuilder, SYSTEM_INSTRUCTION};
use crate::validator::EmotionalValidator;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use woven_core::config::StoryConfig;
use woven_core::{
    ProfileError, StoryLength, StoryPhase, StoryProfile, StoryRecord, StoryRecorder, StoryState,
    Trait, TurnRecord,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Completed,
}

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("invalid story profile: {0}")]
    Input(#[from] ProfileError),
    #[error("response must not be empty")]
    EmptyResponse,
    #[error("no story has been started")]
    NotStarted,
    #[error("the story is already complete")]
    AlreadyCompleted,
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("the generator returned an empty reply")]
    EmptyReply,
    #[error("reply is missing required sections: {}", .missing.join(", "))]
    IncompleteReply { missing: Vec<&'static str> },
}

impl TurnError {
    /// Whether replaying the same turn might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            TurnError::EmptyReply | TurnError::IncompleteReply { .. } => true,
            TurnError::Generation(e) => !matches!(e, GenerationError::Fatal(_)),
            _ => false,
        }
    }
}

/// What one committed turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Index the turn was recorded under (0-based).
    pub turn: usize,
    pub paragraph: String,
    /// `None` on the final turn.
    pub question: Option<String>,
    pub is_final: bool,
    pub completed: bool,
    pub validation_error: Option<String>,
    pub warnings: Vec<String>,
}

/// Read-only snapshot handed to the presentation layer.
#[derive(Debug, Clone)]
pub struct StoryView {
    pub story_id: String,
    pub turn_count: usize,
    pub total_turns: usize,
    pub phase: StoryPhase,
    pub completed: bool,
    pub paragraphs: Vec<String>,
    pub latest_question: Option<String>,
    pub preferences: Vec<(Trait, i32)>,
    pub validation_errors: BTreeMap<usize, String>,
    pub validation_warnings: BTreeMap<usize, Vec<String>>,
}

impl From<&StoryState> for StoryView {
    fn from(state: &StoryState) -> Self {
        let latest_question = if state.is_completed() {
            None
        } else {
            state.latest_question().map(str::to_string)
        };
        Self {
            story_id: state.id().to_string(),
            turn_count: state.turn_count(),
            total_turns: state.total_turns(),
            phase: state.phase(),
            completed: state.is_completed(),
            paragraphs: state.paragraphs().to_vec(),
            latest_question,
            preferences: state.preferences().snapshot(),
            validation_errors: state.validation_errors().clone(),
            validation_warnings: state.validation_warnings().clone(),
        }
    }
}

/// Whether the next turn should close the story.
///
/// A turn is final when it brings the count to `total_turns`. Long stories
/// may also end early once the character has reached the target emotion and
/// at least half the turns are played.
pub fn is_final_turn(state: &StoryState, early_finish: bool) -> bool {
    if state.turn_count() + 1 >= state.total_turns() {
        return true;
    }
    let profile = state.profile();
    early_finish
        && profile.length == StoryLength::Long
        && state.turn_count() >= state.total_turns() / 2
        && state
            .character_mood_arc()
            .last()
            .is_some_and(|mood| mood.trim().eq_ignore_ascii_case(profile.target_emotion.trim()))
}

pub struct StoryOrchestrator {
    generator: Arc<dyn TextGenerator>,
    recorder: Option<Arc<dyn StoryRecorder>>,
    config: StoryConfig,
    params: GenerationParams,
    analyzer: ChoiceAnalyzer,
    validator: EmotionalValidator,
    state: Option<StoryState>,
    pending: Vec<JoinHandle<()>>,
}

impl StoryOrchestrator {
    pub fn new(generator: Arc<dyn TextGenerator>, config: StoryConfig, params: GenerationParams) -> Self {
        Self {
            generator,
            recorder: None,
            config,
            params,
            analyzer: ChoiceAnalyzer::new(),
            validator: EmotionalValidator::new(),
            state: None,
            pending: Vec::new(),
        }
    }

    /// Attach a best-effort sink for story and turn records.
    pub fn with_recorder(mut self, recorder: Arc<dyn StoryRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn status(&self) -> SessionStatus {
        match &self.state {
            None => SessionStatus::NotStarted,
            Some(s) if s.is_completed() => SessionStatus::Completed,
            Some(_) => SessionStatus::InProgress,
        }
    }

    pub fn state(&self) -> Option<&StoryState> {
        self.state.as_ref()
    }

    pub fn view(&self) -> Option<StoryView> {
        self.state.as_ref().map(StoryView::from)
    }

    /// Begin a new story, replacing any session in progress. A completed
    /// story must be `reset` first.
    pub fn start(&mut self, profile: StoryProfile) -> Result<&StoryState, TurnError> {
        if self.status() == SessionStatus::Completed {
            return Err(TurnError::AlreadyCompleted);
        }
        profile.validate()?;

        let total_turns = self.config.total_turns(profile.length);
        let state = StoryState::new(profile, total_turns)
            .with_choice_history_limit(self.config.choice_history_limit);

        tracing::info!(
            "Started {} story {} for {} ({} turns, {} → {})",
            state.profile().genre,
            state.id(),
            state.profile().name,
            total_turns,
            state.profile().current_emotion,
            state.profile().target_emotion
        );

        let record = StoryRecord {
            story_id: state.id(),
            name: state.profile().name.clone(),
            genre: state.profile().genre.clone(),
            total_turns,
            start_time: state.started_at(),
            research_email: state.profile().research_email.clone(),
        };
        self.spawn_record(move |recorder| async move {
            if let Err(e) = recorder.record_story(&record).await {
                tracing::warn!("Failed to record story {}: {:#}", record.story_id, e);
            }
        });

        Ok(self.state.insert(state))
    }

    /// Generate, parse, commit and validate the next turn.
    ///
    /// On any error the story state is left exactly as it was.
    pub async fn play_turn(&mut self) -> Result<TurnOutcome, TurnError> {
        let state = self.state.as_ref().ok_or(TurnError::NotStarted)?;
        if state.is_completed() {
            return Err(TurnError::AlreadyCompleted);
        }

        let is_final = is_final_turn(state, self.config.early_finish);
        let phase = state.phase();
        let prompt = PromptBuilder::build(state, is_final);
        tracing::debug!(
            "Turn {} prompt: {} chars (final: {})",
            state.turn_count(),
            prompt.len(),
            is_final
        );

        let raw = self
            .generator
            .generate(SYSTEM_INSTRUCTION, &prompt, &self.params)
            .await?;
        if raw.trim().is_empty() {
            tracing::warn!("{} returned an empty reply", self.generator.name());
            return Err(TurnError::EmptyReply);
        }
        tracing::debug!("Reply: {} chars", raw.len());

        let parsed = parse_reply_with_fallback(&raw, &self.config.fallback_question);
        let missing = parsed.missing_required();
        if !missing.is_empty() {
            tracing::warn!("Reply missing required sections: {}", missing.join(", "));
            return Err(TurnError::IncompleteReply { missing });
        }

        let Some(state) = self.state.as_mut() else {
            return Err(TurnError::NotStarted);
        };

        let paragraph = parsed.paragraph.clone();
        let question = parsed.question.clone();
        let summary = parsed.summary.clone();
        let character_mood = parsed.character_mood.clone();
        let user_mood = parsed.user_mood.clone();
        let turn = state.commit_turn(parsed.into_commit(is_final));

        let values = state.preferences().values();
        let (validation_error, warnings) = match self.validator.validate_turn(
            turn,
            state.character_mood_arc(),
            phase,
            &values,
            is_final,
        ) {
            Ok(warnings) => {
                state.record_validation_warnings(turn, warnings.clone());
                (None, warnings)
            }
            Err(e) => {
                tracing::warn!("Validation error on turn {}: {}", turn, e);
                state.record_validation_error(turn, e.to_string());
                (Some(e.to_string()), Vec::new())
            }
        };

        let completed = state.is_completed();
        if completed {
            let arc = state.character_mood_arc();
            if let Err(e) = self.validator.validate_emotional_progression(arc) {
                tracing::warn!("Emotional progression check failed: {}", e);
            }
            if let Err(e) = self.validator.validate_character_arc(arc) {
                tracing::warn!("Character arc check failed: {}", e);
            }
            tracing::info!(
                "Story {} completed after {} turns",
                state.id(),
                state.turn_count()
            );
        } else {
            tracing::info!(
                "Turn {} committed ({}/{}, character: {}, user: {})",
                turn,
                state.turn_count(),
                state.total_turns(),
                character_mood,
                user_mood
            );
        }

        let record = TurnRecord {
            story_id: state.id(),
            turn_number: turn,
            character_mood,
            user_mood,
            story_summary: summary,
            question: if is_final { String::new() } else { question.clone() },
            preferences: serde_json::to_string(state.preferences())
                .unwrap_or_else(|_| "{}".to_string()),
            story_phase: phase.as_str().to_string(),
            is_final,
            timestamp: chrono::Utc::now().timestamp(),
        };
        self.spawn_record(move |recorder| async move {
            if let Err(e) = recorder.record_turn(&record).await {
                tracing::warn!("Failed to record turn {}: {:#}", record.turn_number, e);
            }
        });

        Ok(TurnOutcome {
            turn,
            paragraph,
            question: (!is_final).then_some(question),
            is_final,
            completed,
            validation_error,
            warnings,
        })
    }

    /// Take the user's answer to the latest question, fold it into the
    /// preference vector, and play the next turn.
    pub async fn submit_response(&mut self, text: &str) -> Result<TurnOutcome, TurnError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TurnError::EmptyResponse);
        }
        let state = self.state.as_mut().ok_or(TurnError::NotStarted)?;
        if state.is_completed() {
            return Err(TurnError::AlreadyCompleted);
        }

        state.set_last_user_input(text);
        // Nothing to answer yet when the opening turn failed.
        if let Some(question) = state.latest_question().map(str::to_string) {
            self.analyzer.analyze(state, text, &question);
        }
        if self.config.summarize_responses {
            let line = format!("{} responded: {}", state.profile().name, text);
            state.push_summary(line);
        }

        self.play_turn().await
    }

    /// Replay the current turn after a failure. The last response has
    /// already been analysed and is not analysed again.
    pub async fn retry_turn(&mut self) -> Result<TurnOutcome, TurnError> {
        tracing::info!("Retrying turn");
        self.play_turn().await
    }

    /// Discard the session.
    pub fn reset(&mut self) {
        if let Some(state) = self.state.take() {
            tracing::info!("Reset story {} at turn {}", state.id(), state.turn_count());
        }
    }

    /// Wait for all background persistence writes issued so far.
    pub async fn flush_records(&mut self) {
        for handle in self.pending.drain(..) {
            if let Err(e) = handle.await {
                tracing::warn!("Persistence task failed: {}", e);
            }
        }
    }

    fn spawn_record<F, Fut>(&mut self, write: F)
    where
        F: FnOnce(Arc<dyn StoryRecorder>) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let Some(recorder) = self.recorder.clone() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime available; skipping persistence write");
            return;
        };
        self.pending.retain(|h| !h.is_finished());
        self.pending.push(handle.spawn(write(recorder)));
    }
}
