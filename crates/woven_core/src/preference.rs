//! Inferred personality preferences.
//!
//! Six fixed traits, each an integer on a -5..=5 scale. The vector is created
//! zeroed and every mutation clamps back into range, so no observer can ever
//! see an out-of-range value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const PREFERENCE_MIN: i32 = -5;
pub const PREFERENCE_MAX: i32 = 5;

/// A personality trait tracked across the story.
///
/// Declaration order is the canonical display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trait {
    /// cautious (-) to adventurous (+)
    RiskTaker,
    /// pessimistic (-) to optimistic (+)
    Optimism,
    /// solitary (-) to social (+)
    Social,
    /// intuitive (-) to analytical (+)
    Analytical,
    /// realistic (-) to fantastical (+)
    FantasyInterest,
    /// action-oriented (-) to introspective (+)
    Introspective,
}

impl Trait {
    pub const ALL: [Trait; 6] = [
        Trait::RiskTaker,
        Trait::Optimism,
        Trait::Social,
        Trait::Analytical,
        Trait::FantasyInterest,
        Trait::Introspective,
    ];

    /// Snake-case key, e.g. `risk_taker`.
    pub fn key(&self) -> &'static str {
        match self {
            Trait::RiskTaker => "risk_taker",
            Trait::Optimism => "optimism",
            Trait::Social => "social",
            Trait::Analytical => "analytical",
            Trait::FantasyInterest => "fantasy_interest",
            Trait::Introspective => "introspective",
        }
    }

    /// Human-facing name, e.g. `Risk Taker`.
    pub fn display_name(&self) -> &'static str {
        match self {
            Trait::RiskTaker => "Risk Taker",
            Trait::Optimism => "Optimism",
            Trait::Social => "Social",
            Trait::Analytical => "Analytical",
            Trait::FantasyInterest => "Fantasy Interest",
            Trait::Introspective => "Introspective",
        }
    }

    /// Look up a trait by its snake-case key. Exact match only.
    pub fn from_key(key: &str) -> Option<Trait> {
        Trait::ALL.iter().copied().find(|t| t.key() == key)
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Trait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Trait {
    type Err = PreferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Trait::from_key(s).ok_or_else(|| PreferenceError::UnknownTrait(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreferenceError {
    #[error("unknown personality trait '{0}'")]
    UnknownTrait(String),
}

/// Bounded integer vector over the six traits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Trait, i32>", into = "BTreeMap<Trait, i32>")]
pub struct PreferenceVector {
    values: [i32; 6],
}

impl PreferenceVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, t: Trait) -> i32 {
        self.values[t.index()]
    }

    /// Add `delta` to a trait and clamp. Returns the new value.
    pub fn adjust(&mut self, t: Trait, delta: i32) -> i32 {
        let slot = &mut self.values[t.index()];
        *slot = slot.saturating_add(delta).clamp(PREFERENCE_MIN, PREFERENCE_MAX);
        *slot
    }

    /// Overwrite a trait with an absolute value, clamped. Returns the stored value.
    pub fn set_trait(&mut self, t: Trait, value: i32) -> i32 {
        let slot = &mut self.values[t.index()];
        *slot = value.clamp(PREFERENCE_MIN, PREFERENCE_MAX);
        *slot
    }

    /// Name-based variant of [`adjust`](Self::adjust); unknown names are rejected.
    pub fn clamp_update(&mut self, name: &str, delta: i32) -> Result<i32, PreferenceError> {
        let t: Trait = name.parse()?;
        Ok(self.adjust(t, delta))
    }

    /// Name-based variant of [`set_trait`](Self::set_trait); unknown names are rejected.
    pub fn set(&mut self, name: &str, value: i32) -> Result<i32, PreferenceError> {
        let t: Trait = name.parse()?;
        Ok(self.set_trait(t, value))
    }

    /// Apply an absolute overwrite where traits absent from `scores` keep
    /// their previous value.
    pub fn overwrite_from(&mut self, scores: &BTreeMap<Trait, i32>) {
        for t in Trait::ALL {
            if let Some(&v) = scores.get(&t) {
                self.set_trait(t, v);
            }
        }
    }

    /// Values in canonical trait order.
    pub fn values(&self) -> [i32; 6] {
        self.values
    }

    /// Ordered `(trait, value)` pairs.
    pub fn snapshot(&self) -> Vec<(Trait, i32)> {
        Trait::ALL.iter().map(|&t| (t, self.get(t))).collect()
    }

    /// `Risk Taker: 0/5` lines, one per trait. This is also the format the
    /// generator is asked to echo back.
    pub fn format_scores(&self) -> String {
        Trait::ALL
            .iter()
            .map(|t| format!("{}: {}/{}", t.display_name(), self.get(*t), PREFERENCE_MAX))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<BTreeMap<Trait, i32>> for PreferenceVector {
    fn from(map: BTreeMap<Trait, i32>) -> Self {
        let mut v = PreferenceVector::default();
        v.overwrite_from(&map);
        v
    }
}

impl From<PreferenceVector> for BTreeMap<Trait, i32> {
    fn from(v: PreferenceVector) -> Self {
        v.snapshot().into_iter().collect()
    }
}
