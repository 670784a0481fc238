//! Integration tests for the StoryOrchestrator.
//!
//! These drive whole sessions through the scripted MockGenerator, so every
//! path from prompt to committed state runs without a real provider.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use woven_core::config::StoryConfig;
use woven_core::{StoryLength, StoryProfile, StoryRecord, StoryRecorder, Trait, TurnRecord};
use woven_reasoning::llm::{GenerationError, GenerationParams, TextGenerator};
use woven_reasoning::providers::mock::MockGenerator;
use woven_reasoning::retry::{RetryPolicy, RetryingGenerator};
use woven_reasoning::{SessionStatus, StoryOrchestrator, TurnError};

// ============================================================================
// Helpers
// ============================================================================

fn profile(length: StoryLength) -> StoryProfile {
    StoryProfile {
        name: "Ada".into(),
        pronouns: "they/them".into(),
        age: 30,
        genre: "fantasy".into(),
        current_emotion: "sadness".into(),
        target_emotion: "joy".into(),
        length,
        research_email: Some("ada@example.org".into()),
    }
}

/// A reply with no score section, so preferences are left as they were.
fn reply(paragraph: &str, question: &str, character: &str, user: &str) -> String {
    format!(
        "{paragraph}\n~~~~\n{question}\n~~~~\nsummary of {paragraph}\n~~~~\n\
         Current character mood: {character}\n~~~~\nCurrent user mood: {user}\n~~~~\n"
    )
}

fn orchestrator(mock: &Arc<MockGenerator>, config: StoryConfig) -> StoryOrchestrator {
    let generator: Arc<dyn TextGenerator> = mock.clone();
    StoryOrchestrator::new(generator, config, GenerationParams::default())
}

/// Keeps every record it is handed.
#[derive(Default)]
struct RecordingRecorder {
    stories: Mutex<Vec<StoryRecord>>,
    turns: Mutex<Vec<TurnRecord>>,
}

#[async_trait]
impl StoryRecorder for RecordingRecorder {
    async fn record_story(&self, story: &StoryRecord) -> Result<()> {
        self.stories.lock().await.push(story.clone());
        Ok(())
    }

    async fn record_turn(&self, turn: &TurnRecord) -> Result<()> {
        self.turns.lock().await.push(turn.clone());
        Ok(())
    }
}

/// Always fails.
struct BrokenRecorder;

#[async_trait]
impl StoryRecorder for BrokenRecorder {
    async fn record_story(&self, _story: &StoryRecord) -> Result<()> {
        anyhow::bail!("disk full")
    }

    async fn record_turn(&self, _turn: &TurnRecord) -> Result<()> {
        anyhow::bail!("disk full")
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_first_turn_records_index_zero() {
    let mock = Arc::new(MockGenerator::new());
    let mut orch = orchestrator(&mock, StoryConfig::default());
    orch.start(profile(StoryLength::Short)).unwrap();
    assert_eq!(orch.status(), SessionStatus::InProgress);

    let outcome = orch.play_turn().await.unwrap();
    assert_eq!(outcome.turn, 0);
    assert!(!outcome.is_final);
    assert!(outcome.question.is_some());

    let state = orch.state().unwrap();
    assert_eq!(state.total_turns(), 10);
    assert_eq!(state.turn_count(), 1);
    assert!(!state.is_completed());
    assert_eq!(state.character_mood_arc().get(0), Some("confusion"));
    assert!(state.user_mood_arc().get(0).is_some());
}

#[tokio::test]
async fn test_story_completes_on_last_turn() {
    let mock = Arc::new(MockGenerator::new());
    let mut orch = orchestrator(&mock, StoryConfig::default());
    orch.start(profile(StoryLength::Short)).unwrap();

    for _ in 0..9 {
        orch.play_turn().await.unwrap();
    }
    assert_eq!(orch.state().unwrap().turn_count(), 9);
    assert_eq!(orch.status(), SessionStatus::InProgress);

    let last = orch.play_turn().await.unwrap();
    assert!(last.is_final);
    assert!(last.completed);
    assert_eq!(last.question, None);

    let state = orch.state().unwrap();
    assert_eq!(state.turn_count(), 10);
    assert!(state.is_completed());
    assert_eq!(state.paragraphs().len(), 10);
    assert_eq!(state.questions().len(), 9, "final question suppressed");
    assert_eq!(orch.status(), SessionStatus::Completed);

    let prompts = mock.prompts().await;
    assert!(prompts[9].contains("Write the FINAL part of the story"));
    assert!(!prompts[8].contains("Write the FINAL part of the story"));

    assert!(matches!(orch.play_turn().await, Err(TurnError::AlreadyCompleted)));
    assert!(orch.view().unwrap().latest_question.is_none());
}

#[tokio::test]
async fn test_long_story_finishes_early_on_target() {
    // canned moods reach "joy" on the fifth reply
    let mock = Arc::new(MockGenerator::new());
    let mut orch = orchestrator(&mock, StoryConfig::default());
    orch.start(profile(StoryLength::Long)).unwrap();

    let mut played = 0;
    while orch.status() == SessionStatus::InProgress {
        orch.play_turn().await.unwrap();
        played += 1;
    }
    assert_eq!(played, 9);
    assert_eq!(orch.state().unwrap().total_turns(), 17);
}

#[tokio::test]
async fn test_long_story_plays_out_without_early_finish() {
    let mock = Arc::new(MockGenerator::new());
    let config = StoryConfig {
        early_finish: false,
        ..StoryConfig::default()
    };
    let mut orch = orchestrator(&mock, config);
    orch.start(profile(StoryLength::Long)).unwrap();

    let mut played = 0;
    while orch.status() == SessionStatus::InProgress {
        orch.play_turn().await.unwrap();
        played += 1;
    }
    assert_eq!(played, 17);
}

#[tokio::test]
async fn test_single_turn_story_is_final_immediately() {
    let mock = Arc::new(MockGenerator::new());
    let config = StoryConfig {
        short_turns: 1,
        ..StoryConfig::default()
    };
    let mut orch = orchestrator(&mock, config);
    orch.start(profile(StoryLength::Short)).unwrap();

    let outcome = orch.play_turn().await.unwrap();
    assert!(outcome.is_final && outcome.completed);
    assert!(orch.state().unwrap().questions().is_empty());
    assert!(mock.prompts().await[0].contains("leave this section empty"));
}

// ============================================================================
// Failures leave state untouched
// ============================================================================

#[tokio::test]
async fn test_missing_character_mood_fails_without_commit() {
    let mock = Arc::new(MockGenerator::with_replies([
        "A paragraph.\n~~~~\nA question?\n~~~~\nsummary\n~~~~\n\
         Current character mood:\n~~~~\nCurrent user mood: joy\n~~~~\n\
         Updated personality scores:\nRisk Taker: 4/5",
    ]));
    let mut orch = orchestrator(&mock, StoryConfig::default());
    orch.start(profile(StoryLength::Short)).unwrap();

    let err = orch.play_turn().await.unwrap_err();
    match &err {
        TurnError::IncompleteReply { missing } => assert_eq!(missing, &vec!["character_mood"]),
        other => panic!("expected IncompleteReply, got {:?}", other),
    }
    assert!(err.is_retryable());

    let state = orch.state().unwrap();
    assert_eq!(state.turn_count(), 0);
    assert!(state.paragraphs().is_empty());
    assert!(state.summary().is_empty());
    assert!(state.character_mood_arc().is_empty());
    assert!(state.user_mood_arc().is_empty());
    assert_eq!(state.preferences().get(Trait::RiskTaker), 0);

    // the next attempt gets a canned, well-formed reply
    let outcome = orch.retry_turn().await.unwrap();
    assert_eq!(outcome.turn, 0);
}

#[tokio::test]
async fn test_generation_failures_do_not_mutate() {
    let mock = Arc::new(MockGenerator::with_script(vec![
        Err(GenerationError::Fatal("401 unauthorized".into())),
        Ok("   \n ".into()),
    ]));
    let mut orch = orchestrator(&mock, StoryConfig::default());
    orch.start(profile(StoryLength::Short)).unwrap();

    let err = orch.play_turn().await.unwrap_err();
    assert!(matches!(err, TurnError::Generation(GenerationError::Fatal(_))));
    assert!(!err.is_retryable());

    let err = orch.play_turn().await.unwrap_err();
    assert!(matches!(err, TurnError::EmptyReply));
    assert_eq!(orch.state().unwrap().turn_count(), 0);
}

#[tokio::test]
async fn test_transient_failures_are_retried_by_wrapper() {
    let mock = Arc::new(MockGenerator::with_script(vec![
        Err(GenerationError::Transient("503".into())),
        Err(GenerationError::RateLimited {
            message: "429".into(),
            retry_after: None,
        }),
    ]));
    let inner: Arc<dyn TextGenerator> = mock.clone();
    let generator = Arc::new(RetryingGenerator::new(inner, RetryPolicy::immediate(3)));
    let mut orch =
        StoryOrchestrator::new(generator, StoryConfig::default(), GenerationParams::default());
    orch.start(profile(StoryLength::Short)).unwrap();

    orch.play_turn().await.unwrap();
    assert_eq!(mock.calls(), 3);
    assert_eq!(orch.state().unwrap().turn_count(), 1);
}

#[tokio::test]
async fn test_unknown_mood_is_stored_as_validation_error() {
    let mock = Arc::new(MockGenerator::with_replies([reply("p", "q", "elated", "joy")]));
    let mut orch = orchestrator(&mock, StoryConfig::default());
    orch.start(profile(StoryLength::Short)).unwrap();

    let outcome = orch.play_turn().await.unwrap();
    assert!(outcome.validation_error.unwrap().contains("elated"));
    let state = orch.state().unwrap();
    assert_eq!(state.turn_count(), 1, "validation never blocks the turn");
    assert!(state.validation_errors().contains_key(&0));
}

#[tokio::test]
async fn test_category_jump_is_recorded_as_warning() {
    let mock = Arc::new(MockGenerator::with_replies([
        reply("p1", "q1", "joy", "joy"),
        reply("p2", "q2", "anger", "fear"),
    ]));
    let mut orch = orchestrator(&mock, StoryConfig::default());
    orch.start(profile(StoryLength::Short)).unwrap();

    orch.play_turn().await.unwrap();
    let outcome = orch.play_turn().await.unwrap();
    assert_eq!(outcome.warnings.len(), 1);

    let view = orch.view().unwrap();
    assert!(view.validation_errors.is_empty());
    assert_eq!(view.validation_warnings[&1].len(), 1);
}

// ============================================================================
// User responses
// ============================================================================

#[tokio::test]
async fn test_response_nudges_preferences_and_reaches_prompt() {
    let mock = Arc::new(MockGenerator::with_replies([
        reply("p1", "Which way now?", "fear", "sadness"),
        reply("p2", "q2", "anticipation", "trust"),
    ]));
    let mut orch = orchestrator(&mock, StoryConfig::default());
    orch.start(profile(StoryLength::Short)).unwrap();
    orch.play_turn().await.unwrap();

    orch.submit_response("I want to take the risky path into the unknown forest")
        .await
        .unwrap();

    let state = orch.state().unwrap();
    assert_eq!(state.preferences().get(Trait::RiskTaker), 1);
    for t in Trait::ALL.iter().filter(|t| **t != Trait::RiskTaker) {
        assert_eq!(state.preferences().get(*t), 0);
    }
    assert_eq!(
        state.last_user_input(),
        Some("I want to take the risky path into the unknown forest")
    );
    assert_eq!(state.choice_history().len(), 1);

    let prompts = mock.prompts().await;
    assert!(prompts[1].contains("Last user response: I want to take the risky path"));
    assert!(prompts[1].contains("currently feeling sadness"));
}

#[tokio::test]
async fn test_reply_scores_overwrite_but_keep_missing_traits() {
    let mock = Arc::new(MockGenerator::with_replies([
        reply("p1", "q1", "fear", "fear"),
        "p2\n~~~~\nq2\n~~~~\ns2\n~~~~\nCurrent character mood: trust\n~~~~\n\
         Current user mood: trust\n~~~~\nUpdated personality scores:\nOptimism: 3/5\nSocial: 12/5"
            .to_string(),
    ]));
    let mut orch = orchestrator(&mock, StoryConfig::default());
    orch.start(profile(StoryLength::Short)).unwrap();
    orch.play_turn().await.unwrap();
    orch.submit_response("I stay somewhere safe").await.unwrap();

    let prefs = orch.state().unwrap().preferences();
    assert_eq!(prefs.get(Trait::RiskTaker), -1, "absent trait keeps its value");
    assert_eq!(prefs.get(Trait::Optimism), 3);
    assert_eq!(prefs.get(Trait::Social), 5, "clamped");
}

#[tokio::test]
async fn test_response_before_any_question_is_not_analysed() {
    let mock = Arc::new(MockGenerator::with_script(vec![
        Err(GenerationError::Fatal("401 unauthorized".into())),
        Ok(reply("p1", "q1", "fear", "sadness")),
    ]));
    let mut orch = orchestrator(&mock, StoryConfig::default());
    orch.start(profile(StoryLength::Short)).unwrap();
    assert!(orch.play_turn().await.is_err());
    assert!(orch.state().unwrap().latest_question().is_none());

    orch.submit_response("a brave choice").await.unwrap();

    let state = orch.state().unwrap();
    assert!(state.choice_history().is_empty());
    for t in Trait::ALL {
        assert_eq!(state.preferences().get(t), 0);
    }
    assert_eq!(state.last_user_input(), Some("a brave choice"));
    assert_eq!(state.turn_count(), 1);
}

#[tokio::test]
async fn test_response_summaries_are_optional() {
    let mock = Arc::new(MockGenerator::new());
    let config = StoryConfig {
        summarize_responses: true,
        ..StoryConfig::default()
    };
    let mut orch = orchestrator(&mock, config);
    orch.start(profile(StoryLength::Short)).unwrap();
    orch.play_turn().await.unwrap();
    orch.submit_response("I follow the light").await.unwrap();

    let summary = orch.state().unwrap().summary();
    assert_eq!(summary.len(), 3);
    assert_eq!(summary[1], "Ada responded: I follow the light");
}

#[tokio::test]
async fn test_retry_does_not_reanalyse_response() {
    let mock = Arc::new(MockGenerator::with_script(vec![
        Ok(reply("p1", "q1", "fear", "fear")),
        Err(GenerationError::Transient("timeout".into())),
    ]));
    let mut orch = orchestrator(&mock, StoryConfig::default());
    orch.start(profile(StoryLength::Short)).unwrap();
    orch.play_turn().await.unwrap();

    let err = orch.submit_response("a brave choice").await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(orch.state().unwrap().preferences().get(Trait::RiskTaker), 1);

    // canned reply carries a Risk Taker score, so check the history instead
    orch.retry_turn().await.unwrap();
    assert_eq!(orch.state().unwrap().choice_history().len(), 1);
    assert_eq!(orch.state().unwrap().turn_count(), 2);
}

#[tokio::test]
async fn test_input_errors() {
    let mock = Arc::new(MockGenerator::new());
    let mut orch = orchestrator(&mock, StoryConfig::default());

    assert!(matches!(orch.play_turn().await, Err(TurnError::NotStarted)));
    assert!(matches!(
        orch.submit_response("hello").await,
        Err(TurnError::NotStarted)
    ));

    let mut bad = profile(StoryLength::Short);
    bad.genre = "  ".into();
    assert!(matches!(orch.start(bad), Err(TurnError::Input(_))));
    assert_eq!(orch.status(), SessionStatus::NotStarted);

    orch.start(profile(StoryLength::Short)).unwrap();
    assert!(matches!(
        orch.submit_response("   ").await,
        Err(TurnError::EmptyResponse)
    ));
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn test_start_after_completion_requires_reset() {
    let mock = Arc::new(MockGenerator::new());
    let config = StoryConfig {
        short_turns: 1,
        ..StoryConfig::default()
    };
    let mut orch = orchestrator(&mock, config);
    orch.start(profile(StoryLength::Short)).unwrap();
    orch.play_turn().await.unwrap();
    assert_eq!(orch.status(), SessionStatus::Completed);
    let finished = orch.state().unwrap().id();

    assert!(matches!(
        orch.start(profile(StoryLength::Short)),
        Err(TurnError::AlreadyCompleted)
    ));
    assert_eq!(orch.state().unwrap().id(), finished);

    orch.reset();
    orch.start(profile(StoryLength::Short)).unwrap();
    assert_eq!(orch.status(), SessionStatus::InProgress);
}

#[tokio::test]
async fn test_reset_returns_to_not_started() {
    let mock = Arc::new(MockGenerator::new());
    let mut orch = orchestrator(&mock, StoryConfig::default());
    orch.start(profile(StoryLength::Short)).unwrap();
    let first_id = orch.state().unwrap().id();
    orch.play_turn().await.unwrap();

    orch.reset();
    assert_eq!(orch.status(), SessionStatus::NotStarted);
    assert!(orch.view().is_none());

    orch.start(profile(StoryLength::Short)).unwrap();
    let state = orch.state().unwrap();
    assert_ne!(state.id(), first_id);
    assert_eq!(state.turn_count(), 0);
    assert!(state.paragraphs().is_empty());
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn test_records_are_emitted_per_story_and_turn() {
    let mock = Arc::new(MockGenerator::new());
    let recorder = Arc::new(RecordingRecorder::default());
    let sink: Arc<dyn StoryRecorder> = recorder.clone();
    let mut orch = orchestrator(&mock, StoryConfig::default()).with_recorder(sink);

    orch.start(profile(StoryLength::Short)).unwrap();
    orch.play_turn().await.unwrap();
    orch.play_turn().await.unwrap();
    orch.flush_records().await;

    let id = orch.state().unwrap().id();
    let stories = recorder.stories.lock().await;
    assert_eq!(stories.len(), 1);
    assert_eq!(stories[0].story_id, id);
    assert_eq!(stories[0].total_turns, 10);
    assert_eq!(stories[0].research_email.as_deref(), Some("ada@example.org"));

    let turns = recorder.turns.lock().await;
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].turn_number, 0);
    assert_eq!(turns[1].turn_number, 1);
    assert_eq!(turns[0].story_phase, "beginning");
    assert!(!turns[0].is_final);
    let prefs: serde_json::Value = serde_json::from_str(&turns[1].preferences).unwrap();
    assert_eq!(prefs["risk_taker"], 1);
}

#[tokio::test]
async fn test_persistence_failures_do_not_block_turns() {
    let mock = Arc::new(MockGenerator::new());
    let mut orch = orchestrator(&mock, StoryConfig::default()).with_recorder(Arc::new(BrokenRecorder));

    orch.start(profile(StoryLength::Short)).unwrap();
    orch.play_turn().await.unwrap();
    orch.flush_records().await;
    assert_eq!(orch.state().unwrap().turn_count(), 1);
}
