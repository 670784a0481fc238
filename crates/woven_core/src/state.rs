//! Story session state.
//!
//! `StoryState` is the single mutable aggregate of a narrative session. Its
//! fields are private: the turn orchestrator drives it through the named
//! methods below, and everyone else gets read-only accessors.

use crate::preference::{PreferenceVector, Trait};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Default cap on the rolling choice history.
pub const DEFAULT_CHOICE_HISTORY_LIMIT: usize = 50;

// ============================================================================
// Profile
// ============================================================================

/// Requested story length. Mapped to a fixed turn count by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryLength {
    #[default]
    Short,
    Long,
}

impl StoryLength {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoryLength::Short => "short",
            StoryLength::Long => "long",
        }
    }
}

impl std::str::FromStr for StoryLength {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(StoryLength::Short),
            "long" => Ok(StoryLength::Long),
            other => Err(ProfileError::InvalidLength(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("age must be a positive number")]
    InvalidAge,
    #[error("unknown story length '{0}' (expected 'short' or 'long')")]
    InvalidLength(String),
}

/// Everything the user supplies when starting a story.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoryProfile {
    pub name: String,
    pub pronouns: String,
    pub age: u32,
    pub genre: String,
    pub current_emotion: String,
    pub target_emotion: String,
    pub length: StoryLength,
    /// Optional contact address recorded with the story metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_email: Option<String>,
}

impl StoryProfile {
    /// Presence check for the required fields. Values are otherwise opaque.
    pub fn validate(&self) -> Result<(), ProfileError> {
        let required = [
            ("name", &self.name),
            ("pronouns", &self.pronouns),
            ("genre", &self.genre),
            ("current_emotion", &self.current_emotion),
            ("target_emotion", &self.target_emotion),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ProfileError::MissingField(field));
            }
        }
        if self.age == 0 {
            return Err(ProfileError::InvalidAge);
        }
        Ok(())
    }
}

// ============================================================================
// Phase
// ============================================================================

/// Coarse narrative-progress bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryPhase {
    Beginning,
    Middle,
    Climax,
    /// Past the planned length.
    Final,
}

impl StoryPhase {
    pub fn for_turn(turn: usize, total_turns: usize) -> Self {
        if turn < total_turns / 3 {
            StoryPhase::Beginning
        } else if turn < (total_turns * 2) / 3 {
            StoryPhase::Middle
        } else if turn <= total_turns {
            StoryPhase::Climax
        } else {
            StoryPhase::Final
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StoryPhase::Beginning => "beginning",
            StoryPhase::Middle => "middle",
            StoryPhase::Climax => "climax",
            StoryPhase::Final => "final",
        }
    }
}

impl fmt::Display for StoryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Mood arcs
// ============================================================================

/// Turn index → mood label as reported by the generator.
///
/// Append-only: entries are written once, in turn order, starting at 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoodArc {
    entries: BTreeMap<usize, String>,
}

impl MoodArc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the mood for `turn`. Refuses to overwrite an existing entry or
    /// to leave a gap; returns whether the entry was written.
    pub fn record(&mut self, turn: usize, mood: impl Into<String>) -> bool {
        if turn != self.entries.len() {
            return false;
        }
        self.entries.insert(turn, mood.into());
        true
    }

    pub fn get(&self, turn: usize) -> Option<&str> {
        self.entries.get(&turn).map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.entries.values().next_back().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

// ============================================================================
// StoryState
// ============================================================================

/// The fields of one committed turn, applied atomically by
/// [`StoryState::commit_turn`].
#[derive(Debug, Clone, Default)]
pub struct TurnCommit {
    pub paragraph: String,
    pub question: String,
    pub summary: String,
    pub character_mood: String,
    pub user_mood: String,
    pub scores: BTreeMap<Trait, i32>,
    pub is_final: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryState {
    id: Uuid,
    profile: StoryProfile,
    total_turns: usize,
    turn_count: usize,
    completed: bool,
    preferences: PreferenceVector,
    character_mood_arc: MoodArc,
    user_mood_arc: MoodArc,
    validation_errors: BTreeMap<usize, String>,
    validation_warnings: BTreeMap<usize, Vec<String>>,
    summary: Vec<String>,
    paragraphs: Vec<String>,
    questions: Vec<String>,
    choice_history: Vec<String>,
    choice_history_limit: usize,
    last_user_input: Option<String>,
    started_at: i64,
}

impl StoryState {
    pub fn new(profile: StoryProfile, total_turns: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            profile,
            total_turns,
            turn_count: 0,
            completed: false,
            preferences: PreferenceVector::new(),
            character_mood_arc: MoodArc::new(),
            user_mood_arc: MoodArc::new(),
            validation_errors: BTreeMap::new(),
            validation_warnings: BTreeMap::new(),
            summary: Vec::new(),
            paragraphs: Vec::new(),
            questions: Vec::new(),
            choice_history: Vec::new(),
            choice_history_limit: DEFAULT_CHOICE_HISTORY_LIMIT,
            last_user_input: None,
            started_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn with_choice_history_limit(mut self, limit: usize) -> Self {
        self.choice_history_limit = limit.max(1);
        self
    }

    // --- read access -------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn profile(&self) -> &StoryProfile {
        &self.profile
    }

    pub fn total_turns(&self) -> usize {
        self.total_turns
    }

    pub fn turn_count(&self) -> usize {
        self.turn_count
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn preferences(&self) -> &PreferenceVector {
        &self.preferences
    }

    pub fn character_mood_arc(&self) -> &MoodArc {
        &self.character_mood_arc
    }

    pub fn user_mood_arc(&self) -> &MoodArc {
        &self.user_mood_arc
    }

    pub fn validation_errors(&self) -> &BTreeMap<usize, String> {
        &self.validation_errors
    }

    pub fn validation_warnings(&self) -> &BTreeMap<usize, Vec<String>> {
        &self.validation_warnings
    }

    pub fn summary(&self) -> &[String] {
        &self.summary
    }

    pub fn paragraphs(&self) -> &[String] {
        &self.paragraphs
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn latest_question(&self) -> Option<&str> {
        self.questions.last().map(String::as_str)
    }

    pub fn choice_history(&self) -> &[String] {
        &self.choice_history
    }

    pub fn last_user_input(&self) -> Option<&str> {
        self.last_user_input.as_deref()
    }

    pub fn started_at(&self) -> i64 {
        self.started_at
    }

    pub fn phase(&self) -> StoryPhase {
        StoryPhase::for_turn(self.turn_count, self.total_turns)
    }

    /// The user's most recent reported mood, falling back to how they said
    /// they felt at the start.
    pub fn user_mood(&self) -> &str {
        self.user_mood_arc
            .last()
            .unwrap_or(self.profile.current_emotion.as_str())
    }

    // --- mutation ----------------------------------------------------------

    /// Apply per-trait deltas inferred from a user's choice (each clamped)
    /// and append the choice to the rolling history.
    pub fn apply_choice(&mut self, deltas: &[(Trait, i32)], choice: impl Into<String>) {
        for &(t, d) in deltas {
            if d != 0 {
                self.preferences.adjust(t, d);
            }
        }
        self.record_choice(choice);
    }

    pub fn set_last_user_input(&mut self, text: impl Into<String>) {
        self.last_user_input = Some(text.into());
    }

    /// Append to the rolling choice history, dropping the oldest entries
    /// beyond the limit.
    fn record_choice(&mut self, choice: impl Into<String>) {
        self.choice_history.push(choice.into());
        let overflow = self.choice_history.len().saturating_sub(self.choice_history_limit);
        if overflow > 0 {
            self.choice_history.drain(..overflow);
        }
    }

    pub fn push_summary(&mut self, fragment: impl Into<String>) {
        let fragment = fragment.into();
        if !fragment.trim().is_empty() {
            self.summary.push(fragment);
        }
    }

    /// Apply one parsed turn. Returns the turn index the moods were recorded
    /// under (the pre-increment counter).
    pub fn commit_turn(&mut self, commit: TurnCommit) -> usize {
        let turn = self.turn_count;

        self.paragraphs.push(commit.paragraph);
        if !commit.is_final {
            self.questions.push(commit.question);
        }

        let wrote_character = self.character_mood_arc.record(turn, commit.character_mood);
        let wrote_user = self.user_mood_arc.record(turn, commit.user_mood);
        if !(wrote_character && wrote_user) {
            tracing::warn!(turn, "mood arc already had an entry for this turn; kept the original");
        }

        self.preferences.overwrite_from(&commit.scores);
        self.push_summary(commit.summary);

        self.turn_count += 1;
        if commit.is_final || self.turn_count >= self.total_turns {
            self.completed = true;
        }
        turn
    }

    pub fn record_validation_error(&mut self, turn: usize, message: impl Into<String>) {
        self.validation_errors.insert(turn, message.into());
    }

    pub fn record_validation_warnings(&mut self, turn: usize, warnings: Vec<String>) {
        if !warnings.is_empty() {
            self.validation_warnings.entry(turn).or_default().extend(warnings);
        }
    }
}
