//! Keyword-based inference of personality preferences from free-text choices.

use woven_core::{PreferenceVector, StoryState, Trait};

/// Increase / decrease trigger words for one trait.
#[derive(Debug, Clone, Copy)]
pub struct TraitPatterns {
    pub trait_: Trait,
    pub increase: &'static [&'static str],
    pub decrease: &'static [&'static str],
}

pub const DEFAULT_PATTERNS: [TraitPatterns; 6] = [
    TraitPatterns {
        trait_: Trait::RiskTaker,
        increase: &[
            "risk", "adventure", "try", "explore", "challenge", "brave", "new", "unknown", "dangerous",
        ],
        decrease: &[
            "safe", "cautious", "careful", "wait", "hesitate", "home", "familiar", "secure", "protect",
        ],
    },
    TraitPatterns {
        trait_: Trait::Optimism,
        increase: &[
            "hope", "bright", "better", "good", "positive", "happy", "joy", "light", "smile", "laugh",
        ],
        decrease: &[
            "dark", "sad", "worry", "concern", "fear", "doubt", "negative", "problem", "trouble",
        ],
    },
    TraitPatterns {
        trait_: Trait::Social,
        increase: &[
            "together", "friend", "people", "group", "help", "others", "talk", "share", "join", "team",
        ],
        decrease: &[
            "alone", "solitary", "myself", "quiet", "away", "distance", "independent", "solo",
        ],
    },
    TraitPatterns {
        trait_: Trait::Analytical,
        increase: &[
            "think", "plan", "analyze", "understand", "reason", "logic", "consider", "examine", "study",
        ],
        decrease: &[
            "feel", "sense", "heart", "emotion", "gut", "intuition", "instinct", "immediate",
        ],
    },
    TraitPatterns {
        trait_: Trait::FantasyInterest,
        increase: &[
            "magic", "wonder", "dream", "imagine", "fantasy", "dragon", "fairy", "enchanted", "mysterious",
        ],
        decrease: &[
            "real", "practical", "actual", "realistic", "concrete", "ordinary", "everyday", "normal",
        ],
    },
    TraitPatterns {
        trait_: Trait::Introspective,
        increase: &[
            "reflect", "ponder", "contemplate", "inner", "meaning", "thought", "deep", "soul", "mind",
        ],
        decrease: &[
            "act", "move", "go", "run", "jump", "do", "action", "immediate", "physical",
        ],
    },
];

/// Net unit deltas produced by one analysed choice, in trait order.
pub type ChoiceDeltas = [(Trait, i32); 6];

/// Maps user text to preference nudges.
///
/// Matching is plain substring search on the lower-cased text, so "go" also
/// fires inside "good". Each keyword set credits at most one unit per call.
#[derive(Debug, Clone)]
pub struct ChoiceAnalyzer {
    patterns: &'static [TraitPatterns],
}

impl Default for ChoiceAnalyzer {
    fn default() -> Self {
        Self {
            patterns: &DEFAULT_PATTERNS,
        }
    }
}

impl ChoiceAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deltas the text would apply, without touching any state.
    pub fn deltas(&self, choice: &str) -> ChoiceDeltas {
        let text = choice.to_lowercase();
        let mut out = Trait::ALL.map(|t| (t, 0));
        for p in self.patterns {
            let mut delta = 0;
            if p.increase.iter().any(|k| text.contains(k)) {
                delta += 1;
            }
            if p.decrease.iter().any(|k| text.contains(k)) {
                delta -= 1;
            }
            if let Some(slot) = out.iter_mut().find(|(t, _)| *t == p.trait_) {
                slot.1 += delta;
            }
        }
        out
    }

    /// Apply the deltas for `choice` to a preference vector (clamped).
    pub fn apply(&self, prefs: &mut PreferenceVector, choice: &str) -> ChoiceDeltas {
        let deltas = self.deltas(choice);
        for (t, d) in deltas {
            if d != 0 {
                prefs.adjust(t, d);
            }
        }
        deltas
    }

    /// Analyse a user's answer to `question`: nudge the story's preferences
    /// and record the choice in its history. The question is accepted for
    /// future context weighting and currently ignored.
    pub fn analyze(&self, state: &mut StoryState, choice: &str, _question: &str) -> PreferenceVector {
        let deltas = self.deltas(choice);
        state.apply_choice(&deltas, choice.to_lowercase());

        let moved: Vec<String> = deltas
            .iter()
            .filter(|(_, d)| *d != 0)
            .map(|(t, d)| format!("{}{:+}", t, d))
            .collect();
        if !moved.is_empty() {
            tracing::debug!("Choice nudged preferences: {}", moved.join(", "));
        }
        *state.preferences()
    }
}
