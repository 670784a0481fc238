//! Interactive terminal session: collect the profile, then alternate
//! between showing a story turn and reading the user's response.

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use woven_core::{Emotion, StoryLength, StoryProfile};
use woven_reasoning::{SessionStatus, StoryOrchestrator, TurnError, TurnOutcome};

const HELP: &str = "Commands: /retry  /scores  /reset  /quit  (anything else is your response)";

/// Profile values supplied on the command line. Missing ones are prompted for.
#[derive(Debug, Clone, Default)]
pub struct ProfilePresets {
    pub name: Option<String>,
    pub pronouns: Option<String>,
    pub age: Option<u32>,
    pub genre: Option<String>,
    pub current_emotion: Option<String>,
    pub target_emotion: Option<String>,
    pub length: Option<StoryLength>,
    pub research_email: Option<String>,
}

enum Command<'a> {
    Quit,
    Reset,
    Retry,
    Scores,
    Help,
    Respond(&'a str),
}

fn parse_command(line: &str) -> Option<Command<'_>> {
    let line = line.trim();
    match line {
        "" => None,
        "/quit" | "/exit" => Some(Command::Quit),
        "/reset" => Some(Command::Reset),
        "/retry" => Some(Command::Retry),
        "/scores" => Some(Command::Scores),
        "/help" => Some(Command::Help),
        text => Some(Command::Respond(text)),
    }
}

pub async fn run(orchestrator: &mut StoryOrchestrator, presets: ProfilePresets) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    let Some(profile) = collect_profile(&mut rl, &presets)? else {
        return Ok(());
    };
    orchestrator.start(profile)?;
    println!("\n{}\n", HELP);
    show(orchestrator.play_turn().await);

    loop {
        let line = match rl.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let Some(command) = parse_command(&line) else {
            continue;
        };
        let _ = rl.add_history_entry(line.as_str());

        match command {
            Command::Quit => break,
            Command::Help => println!("{}", HELP),
            Command::Scores => show_scores(orchestrator),
            Command::Reset => {
                orchestrator.reset();
                // Start over from scratch: command-line values only apply once.
                let Some(profile) = collect_profile(&mut rl, &ProfilePresets::default())? else {
                    break;
                };
                orchestrator.start(profile)?;
                show(orchestrator.play_turn().await);
            }
            Command::Retry => show(orchestrator.retry_turn().await),
            Command::Respond(text) => {
                if orchestrator.status() == SessionStatus::Completed {
                    println!("The story has ended. Type /reset to begin another or /quit to leave.");
                    continue;
                }
                show(orchestrator.submit_response(text).await);
            }
        }
    }
    Ok(())
}

fn show(result: Result<TurnOutcome, TurnError>) {
    match result {
        Ok(outcome) => {
            println!("\n{}\n", outcome.paragraph);
            match &outcome.question {
                Some(q) => println!("{}\n", q),
                None => println!("~ The End ~\n"),
            }
            if let Some(err) = &outcome.validation_error {
                println!("(note: {})", err);
            }
            for w in &outcome.warnings {
                println!("(note: {})", w);
            }
            if outcome.completed {
                println!("Type /scores to see what the story learned about you, /reset to begin again.");
            }
        }
        Err(e) => {
            println!("\n[error] {}", e);
            if e.is_retryable() {
                println!("Type /retry to try this turn again.");
            }
        }
    }
}

fn show_scores(orchestrator: &StoryOrchestrator) {
    let Some(view) = orchestrator.view() else {
        println!("No story in progress.");
        return;
    };
    println!(
        "Turn {}/{} ({})",
        view.turn_count, view.total_turns, view.phase
    );
    for (t, v) in &view.preferences {
        println!("  {:<18} {:>2}/5", t.display_name(), v);
    }
    if !view.validation_warnings.is_empty() || !view.validation_errors.is_empty() {
        println!(
            "  {} validation errors, {} turns with notes",
            view.validation_errors.len(),
            view.validation_warnings.len()
        );
    }
}

/// Ask for each missing profile field. Returns `None` if the user aborts.
fn collect_profile(rl: &mut DefaultEditor, presets: &ProfilePresets) -> Result<Option<StoryProfile>> {
    match ask_profile(rl, presets) {
        Ok(profile) => Ok(Some(profile)),
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn ask_profile(rl: &mut DefaultEditor, presets: &ProfilePresets) -> Result<StoryProfile, ReadlineError> {
    let emotions = Emotion::ALL.map(|e| e.as_str()).join(", ");

    let name = ask_text(rl, "Character name", &presets.name)?;
    let pronouns = ask_text(rl, "Pronouns (e.g. they/them)", &presets.pronouns)?;
    let age = match presets.age.filter(|a| *a > 0) {
        Some(age) => age,
        None => ask_parsed(rl, "Age", |s| s.parse::<u32>().ok().filter(|a| *a > 0))?,
    };
    let genre = ask_text(rl, "Genre", &presets.genre)?;
    let current_emotion = ask_text(
        rl,
        &format!("How are you feeling? ({})", emotions),
        &presets.current_emotion,
    )?;
    let target_emotion = ask_text(rl, "How would you like to feel?", &presets.target_emotion)?;
    let length = match presets.length {
        Some(length) => length,
        None => ask_parsed(rl, "Length (short/long) [short]", |s| {
            if s.is_empty() {
                Some(StoryLength::Short)
            } else {
                s.parse().ok()
            }
        })?,
    };

    Ok(StoryProfile {
        name,
        pronouns,
        age,
        genre,
        current_emotion,
        target_emotion,
        length,
        research_email: presets.research_email.clone(),
    })
}

fn ask_text(
    rl: &mut DefaultEditor,
    label: &str,
    preset: &Option<String>,
) -> Result<String, ReadlineError> {
    if let Some(v) = preset.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        return Ok(v.to_string());
    }
    loop {
        let line = rl.readline(&format!("{}: ", label))?;
        let line = line.trim();
        if !line.is_empty() {
            return Ok(line.to_string());
        }
    }
}

fn ask_parsed<T>(
    rl: &mut DefaultEditor,
    label: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, ReadlineError> {
    loop {
        let line = rl.readline(&format!("{}: ", label))?;
        match parse(line.trim()) {
            Some(v) => return Ok(v),
            None => println!("Sorry, I didn't understand '{}'.", line.trim()),
        }
    }
}
