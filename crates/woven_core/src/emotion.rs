//! The closed set of emotion labels the story engine understands.
//!
//! Moods reported by the generator are kept as raw text in the mood arcs;
//! this module is what decides whether such a label is one we recognise and
//! which broad category (positive / negative / neutral) it belongs to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the ten canonical emotion labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Joy,
    Sadness,
    Anger,
    Fear,
    Trust,
    Surprise,
    Anticipation,
    Disgust,
    Neutral,
    Confusion,
}

impl Emotion {
    pub const ALL: [Emotion; 10] = [
        Emotion::Joy,
        Emotion::Sadness,
        Emotion::Anger,
        Emotion::Fear,
        Emotion::Trust,
        Emotion::Surprise,
        Emotion::Anticipation,
        Emotion::Disgust,
        Emotion::Neutral,
        Emotion::Confusion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Joy => "joy",
            Emotion::Sadness => "sadness",
            Emotion::Anger => "anger",
            Emotion::Fear => "fear",
            Emotion::Trust => "trust",
            Emotion::Surprise => "surprise",
            Emotion::Anticipation => "anticipation",
            Emotion::Disgust => "disgust",
            Emotion::Neutral => "neutral",
            Emotion::Confusion => "confusion",
        }
    }

    /// Short gloss used when listing the allowed labels to the generator.
    pub fn gloss(&self) -> &'static str {
        match self {
            Emotion::Joy => "happiness, delight",
            Emotion::Sadness => "grief, sorrow",
            Emotion::Anger => "rage, frustration",
            Emotion::Fear => "anxiety, terror",
            Emotion::Trust => "confidence, faith",
            Emotion::Surprise => "amazement, wonder",
            Emotion::Anticipation => "expectation, hope",
            Emotion::Disgust => "aversion, repulsion",
            Emotion::Neutral => "balanced, calm",
            Emotion::Confusion => "uncertainty, doubt",
        }
    }

    pub fn category(&self) -> EmotionCategory {
        match self {
            Emotion::Joy | Emotion::Trust | Emotion::Anticipation => EmotionCategory::Positive,
            Emotion::Sadness | Emotion::Anger | Emotion::Fear | Emotion::Disgust => {
                EmotionCategory::Negative
            }
            Emotion::Surprise | Emotion::Neutral | Emotion::Confusion => EmotionCategory::Neutral,
        }
    }

    /// Case-insensitive lookup; surrounding whitespace is ignored.
    pub fn parse(label: &str) -> Option<Emotion> {
        let needle = label.trim();
        Emotion::ALL
            .iter()
            .copied()
            .find(|e| e.as_str().eq_ignore_ascii_case(needle))
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown emotion label '{0}'")]
pub struct UnknownEmotion(pub String);

impl FromStr for Emotion {
    type Err = UnknownEmotion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Emotion::parse(s).ok_or_else(|| UnknownEmotion(s.to_string()))
    }
}

/// Coarse valence bucket used for transition plausibility checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionCategory {
    Positive,
    Negative,
    Neutral,
}

impl EmotionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionCategory::Positive => "positive",
            EmotionCategory::Negative => "negative",
            EmotionCategory::Neutral => "neutral",
        }
    }

    /// Whether a mood in `next` may directly follow a mood in `self`.
    ///
    /// Valenced moods may hold or settle to neutral; neutral may go anywhere.
    pub fn may_precede(&self, next: EmotionCategory) -> bool {
        match self {
            EmotionCategory::Neutral => true,
            EmotionCategory::Positive => {
                matches!(next, EmotionCategory::Positive | EmotionCategory::Neutral)
            }
            EmotionCategory::Negative => {
                matches!(next, EmotionCategory::Negative | EmotionCategory::Neutral)
            }
        }
    }
}

impl fmt::Display for EmotionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
