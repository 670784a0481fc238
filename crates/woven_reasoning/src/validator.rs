//! Emotional-arc validation.
//!
//! Only an unrecognised mood label is a hard error. Category jumps, phase
//! misalignment and out-of-range scores come back as advisory messages that
//! the caller records but never acts on.

use std::ops::RangeInclusive;
use woven_core::preference::{PREFERENCE_MAX, PREFERENCE_MIN};
use woven_core::{Emotion, EmotionCategory, MoodArc, StoryPhase, Trait};

/// Turns in which the character is expected to have reached a positive mood.
pub const TARGET_EMOTION_WINDOW: RangeInclusive<usize> = 11..=12;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no character mood recorded for turn {0}")]
    MissingMood(usize),
    #[error("invalid character mood '{mood}'; must be one of: {allowed}")]
    InvalidMood { mood: String, allowed: String },
}

#[derive(Debug, Clone, Default)]
pub struct EmotionalValidator;

impl EmotionalValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate the mood recorded at `turn` against the rest of the arc.
    ///
    /// Returns the advisory findings on success.
    pub fn validate_turn(
        &self,
        turn: usize,
        arc: &MoodArc,
        phase: StoryPhase,
        preference_values: &[i32],
        is_final: bool,
    ) -> Result<Vec<String>, ValidationError> {
        tracing::debug!(
            "Validating turn {} (phase: {}, final: {})",
            turn,
            phase,
            is_final
        );

        let raw = arc.get(turn).ok_or(ValidationError::MissingMood(turn))?;
        let current = Emotion::parse(raw).ok_or_else(|| ValidationError::InvalidMood {
            mood: raw.to_string(),
            allowed: Emotion::ALL.map(|e| e.as_str()).join(", "),
        })?;

        let mut warnings = Vec::new();

        if turn > 0 {
            if let Some(prev_raw) = arc.get(turn - 1) {
                // Unknown earlier labels were already reported on their own turn.
                let prev = Emotion::parse(prev_raw)
                    .map(|e| e.category())
                    .unwrap_or(EmotionCategory::Neutral);
                if !prev.may_precede(current.category()) {
                    warnings.push(format!(
                        "Unusual emotional transition from '{}' ({}) to '{}' ({})",
                        prev_raw,
                        prev,
                        raw,
                        current.category()
                    ));
                }
            }
        }

        if TARGET_EMOTION_WINDOW.contains(&turn) && current.category() != EmotionCategory::Positive {
            warnings.push(format!(
                "Mood '{}' ({}) doesn't align with the target emotion phase (ideally positive)",
                raw,
                current.category()
            ));
        }

        if preference_values.len() != Trait::ALL.len() {
            warnings.push(format!(
                "Expected {} personality scores, got {}",
                Trait::ALL.len(),
                preference_values.len()
            ));
        }
        for v in preference_values {
            if !(PREFERENCE_MIN..=PREFERENCE_MAX).contains(v) {
                warnings.push(format!(
                    "Personality score {} outside [{}, {}]",
                    v, PREFERENCE_MIN, PREFERENCE_MAX
                ));
            }
        }

        for w in &warnings {
            tracing::warn!("Validation (turn {}): {}", turn, w);
        }
        Ok(warnings)
    }

    /// Arc-level progression check. Accepts every arc for now.
    pub fn validate_emotional_progression(&self, arc: &MoodArc) -> Result<(), ValidationError> {
        tracing::debug!("Validating emotional progression over {} turns", arc.len());
        Ok(())
    }

    /// Arc-level coherence check. Accepts every arc for now.
    pub fn validate_character_arc(&self, arc: &MoodArc) -> Result<(), ValidationError> {
        tracing::debug!("Validating character arc coherence over {} turns", arc.len());
        Ok(())
    }
}
