use crate::parser::{CHARACTER_MOOD_LABEL, SCORES_LABEL, SECTION_DELIMITER, USER_MOOD_LABEL};
use woven_core::{Emotion, PreferenceVector, StoryState, Trait};

pub const SYSTEM_INSTRUCTION: &str = "You are a creative storytelling assistant that helps users write emotional stories. \
You MUST follow the exact output format specified in the prompt, including all sections separated by ~~~~.";

/// Trait values at or beyond this magnitude colour the character description.
const INSIGHT_THRESHOLD: i32 = 3;

/// (trait, high-score line, low-score line)
const INSIGHTS: [(Trait, &str, &str); 6] = [
    (
        Trait::RiskTaker,
        "The character is drawn to adventure and taking risks.",
        "The character prefers safety and careful consideration.",
    ),
    (
        Trait::Optimism,
        "The character tends to look for hope and positivity.",
        "The character often notices challenges and potential problems.",
    ),
    (
        Trait::Social,
        "The character values connection with others.",
        "The character appreciates solitude and independence.",
    ),
    (
        Trait::Analytical,
        "The character approaches situations with logic and analysis.",
        "The character trusts their intuition and feelings.",
    ),
    (
        Trait::FantasyInterest,
        "The character is open to magical or fantastical elements.",
        "The character prefers grounded, realistic experiences.",
    ),
    (
        Trait::Introspective,
        "The character values reflection and deeper meaning.",
        "The character prefers action and practical solutions.",
    ),
];

/// Assembles the per-turn generation request from the current story state.
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn build(state: &StoryState, is_final: bool) -> String {
        let profile = state.profile();
        let prefs = state.preferences();
        let pronouns = &profile.pronouns;
        let target = &profile.target_emotion;

        let last_input = state
            .last_user_input()
            .map(|text| format!("\nLast user response: {}", text))
            .unwrap_or_default();

        let journey = if is_final {
            format!("has been experiencing a journey toward {}", target)
        } else {
            format!("is on a journey that will gradually lead to feeling {}", target)
        };

        let instructions = if is_final {
            Self::final_instructions(target, pronouns)
        } else {
            Self::turn_instructions(prefs, pronouns)
        };

        format!(
            "This is a {genre} story.\n\
             Story so far: {summary}\n\
             You are {name} ({pronouns}), a {age}-year-old character.\n\
             World: {genre}.\n\
             Story phase: {phase}.\n\
             The character began feeling {start} and {journey}.\n\
             The user is currently feeling {user_mood}, try to guide them towards {target}.{last_input}\n\
             \n\
             Character insights based on their choices:\n\
             {insights}\n\
             \n\
             Current personality scores:\n\
             {scores}\n\
             \n\
             {emotions}\n\
             \n\
             {instructions}\n\
             \n\
             {structure}",
            genre = profile.genre,
            summary = state.summary().join(", "),
            name = profile.name,
            pronouns = pronouns,
            age = profile.age,
            phase = state.phase(),
            start = profile.current_emotion,
            journey = journey,
            user_mood = state.user_mood(),
            target = target,
            last_input = last_input,
            insights = Self::personalization(prefs),
            scores = prefs.format_scores(),
            emotions = Self::allowed_emotions(),
            instructions = instructions,
            structure = Self::structure(is_final),
        )
    }

    /// One sentence per trait whose score is strongly positive or negative.
    pub fn personalization(prefs: &PreferenceVector) -> String {
        INSIGHTS
            .iter()
            .filter_map(|(t, high, low)| match prefs.get(*t) {
                v if v >= INSIGHT_THRESHOLD => Some(*high),
                v if v <= -INSIGHT_THRESHOLD => Some(*low),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn allowed_emotions() -> String {
        let mut out = format!(
            "IMPORTANT - You must use ONLY these {} emotions for character and user moods:\n",
            Emotion::ALL.len()
        );
        for (i, e) in Emotion::ALL.iter().enumerate() {
            out.push_str(&format!("{}. {} ({})\n", i + 1, e, e.gloss()));
        }
        out.push_str("\nWhen describing moods, use ONLY these exact emotion words.");
        out
    }

    fn turn_instructions(prefs: &PreferenceVector, pronouns: &str) -> String {
        let texture = if prefs.get(Trait::FantasyInterest) > 0 {
            "Include subtle fantasy elements if they enhance the emotional journey"
        } else {
            "Keep the narrative grounded in human experience with a touch of wonder"
        };
        format!(
            "Write the next part of the story:\n\
             - Show subtle shifts in the character's emotional state through their perceptions and actions\n\
             - Don't explicitly mention the target emotion - create situations that move toward it indirectly\n\
             - Use simple language that draws the user into the story\n\
             - {texture}\n\
             - Include meaningful dialogue that reveals character and advances the emotional journey\n\
             - Always act on the user's response. Mirror the language they use with the personality of the main character\n\
             - Tailor the scene to align with the character's established preferences and tendencies\n\
             - Use the correct pronouns ({pronouns}) throughout the story\n\
             - Acknowledge and build upon the user's last response in the story"
        )
    }

    fn final_instructions(target: &str, pronouns: &str) -> String {
        format!(
            "Write the FINAL part of the story:\n\
             - Create a powerful emotional breakthrough moment that finally allows the character to fully experience {target}\n\
             - This should be a specific, concrete event (not just an internal realization)\n\
             - The event should feel like the culmination of the character's journey\n\
             - Show how this event transforms the character's perspective\n\
             - Tailor the breakthrough to the character's established preferences and tendencies\n\
             - Don't explicitly state the emotion - show it through the character's reactions, sensations, and thoughts\n\
             - Keep it short and powerful, and end with a resolution or new beginning that feels earned\n\
             - Use the correct pronouns ({pronouns})\n\
             - Acknowledge and build upon the user's last response in the story"
        )
    }

    /// Both variants list all six sections so the reply can be parsed by
    /// position; the final turn leaves the question section empty.
    fn structure(is_final: bool) -> String {
        let question = if is_final {
            "(leave this section empty: the story ends here)"
        } else {
            "either a situation or a question that feels natural in the conversation"
        };
        let d = SECTION_DELIMITER;
        format!(
            "Structure:\n\
             - short paragraph\n\
             - {d}\n\
             - {question}\n\
             - {d}\n\
             - 20-word story summary\n\
             - {d}\n\
             - {CHARACTER_MOOD_LABEL} [MUST be one of the allowed emotions]\n\
             - {d}\n\
             - {USER_MOOD_LABEL} [MUST be one of the allowed emotions]\n\
             - {d}\n\
             - {SCORES_LABEL} [list each score on a new line in the format \"Trait Name: X/5\"]"
        )
    }
}
