//! Parse the generator's delimited reply into typed turn fields.
//!
//! The reply is six sections separated by `~~~~`, in fixed order:
//! paragraph, follow-up question, summary, character mood, user mood,
//! personality scores. Parsing never fails: missing or malformed sections
//! degrade to empty strings, the fallback question, or "trait unchanged".

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use woven_core::{Trait, TurnCommit};

pub const SECTION_DELIMITER: &str = "~~~~";
pub const SECTION_COUNT: usize = 6;
pub const DEFAULT_QUESTION: &str = "What are you feeling in this moment?";

pub const CHARACTER_MOOD_LABEL: &str = "Current character mood:";
pub const USER_MOOD_LABEL: &str = "Current user mood:";
pub const SCORES_LABEL: &str = "Updated personality scores:";

static RE_CHARACTER_MOOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[-*•\s]*current\s+character\s+mood\s*:").unwrap());
static RE_USER_MOOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[-*•\s]*current\s+user\s+mood\s*:").unwrap());
static RE_SCORES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[-*•\s]*updated\s+personality\s+scores\s*:").unwrap());

/// Fixed-arity record for one reply. Empty strings mean "absent".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedReply {
    pub paragraph: String,
    pub question: String,
    pub summary: String,
    pub character_mood: String,
    pub user_mood: String,
    /// Only the traits that parsed cleanly.
    pub scores: BTreeMap<Trait, i32>,
}

impl ParsedReply {
    /// Names of mandatory fields that came back empty.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.paragraph.is_empty() {
            missing.push("paragraph");
        }
        if self.character_mood.is_empty() {
            missing.push("character_mood");
        }
        if self.user_mood.is_empty() {
            missing.push("user_mood");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_required().is_empty()
    }

    pub fn into_commit(self, is_final: bool) -> TurnCommit {
        TurnCommit {
            paragraph: self.paragraph,
            question: self.question,
            summary: self.summary,
            character_mood: self.character_mood,
            user_mood: self.user_mood,
            scores: self.scores,
            is_final,
        }
    }
}

/// Parse with the default fallback question.
pub fn parse_reply(raw: &str) -> ParsedReply {
    parse_reply_with_fallback(raw, DEFAULT_QUESTION)
}

pub fn parse_reply_with_fallback(raw: &str, fallback_question: &str) -> ParsedReply {
    let mut sections: Vec<&str> = raw.split(SECTION_DELIMITER).map(str::trim).collect();
    if sections.len() < SECTION_COUNT {
        tracing::debug!(
            "Reply had {} of {} sections; padding with empty sections",
            sections.len(),
            SECTION_COUNT
        );
        sections.resize(SECTION_COUNT, "");
    }

    let question = if sections[1].is_empty() {
        match fallback_question.trim() {
            "" => DEFAULT_QUESTION.to_string(),
            fallback => fallback.to_string(),
        }
    } else {
        sections[1].to_string()
    };

    ParsedReply {
        paragraph: sections[0].to_string(),
        question,
        summary: sections[2].to_string(),
        character_mood: strip_label(&RE_CHARACTER_MOOD, sections[3]),
        user_mood: strip_label(&RE_USER_MOOD, sections[4]),
        scores: parse_scores(&strip_label(&RE_SCORES, sections[5])),
    }
}

fn strip_label(label: &Regex, section: &str) -> String {
    label.replace(section, "").trim().to_string()
}

/// Parse `Trait Name: value/5` lines. Lines without a colon, with a
/// non-integer value, or naming an unknown trait are skipped.
pub fn parse_scores(block: &str) -> BTreeMap<Trait, i32> {
    let mut scores = BTreeMap::new();
    for line in block.lines() {
        let line = line.trim().trim_start_matches(['-', '*', '•']).trim();
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let key = name.trim().to_lowercase().replace(' ', "_");
        let Some(t) = Trait::from_key(&key) else {
            tracing::debug!("Ignoring unknown personality trait '{}'", name.trim());
            continue;
        };
        let raw_value = value.trim().split('/').next().unwrap_or("").trim();
        match raw_value.parse::<i32>() {
            Ok(v) => {
                scores.insert(t, v);
            }
            Err(_) => tracing::debug!("Could not parse personality score for line: {}", line),
        }
    }
    scores
}
