use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use woven_core::{StoryLength, WovenConfig};
use woven_memory::SqliteRecorder;
use woven_reasoning::providers::build_generator;
use woven_reasoning::{GenerationParams, StoryOrchestrator};

mod logging;
mod session;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file
    #[arg(short, long, default_value = "woven.toml")]
    config: PathBuf,

    /// Generation provider (openai, anthropic, mock)
    #[arg(long)]
    provider: Option<String>,

    /// Model to use
    #[arg(short, long)]
    model: Option<String>,

    /// Record stories to this SQLite database
    #[arg(long)]
    db: Option<String>,

    /// Character name
    #[arg(long)]
    name: Option<String>,

    /// Character pronouns, e.g. "they/them"
    #[arg(long)]
    pronouns: Option<String>,

    /// Character age
    #[arg(long)]
    age: Option<u32>,

    /// Story genre
    #[arg(long)]
    genre: Option<String>,

    /// How you feel right now
    #[arg(long)]
    feeling: Option<String>,

    /// How you would like to feel
    #[arg(long)]
    target: Option<String>,

    /// Story length (short or long)
    #[arg(long)]
    length: Option<StoryLength>,

    /// Contact address stored with the story record
    #[arg(long, env = "WOVEN_RESEARCH_EMAIL")]
    email: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Also write daily-rotated JSON logs into this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let _log_guard = logging::init(args.json_logs, args.log_dir.as_deref());

    info!("Initializing Woven...");
    let mut config = WovenConfig::load_or_default(&args.config);
    if let Some(provider) = &args.provider {
        config.llm.provider = provider.clone();
    }
    if let Some(model) = &args.model {
        config.llm.model = model.clone();
    }
    if let Some(db) = &args.db {
        config.storage.enabled = true;
        config.storage.db_path = db.clone();
    }

    let generator = build_generator(&config)?;
    let mut orchestrator = StoryOrchestrator::new(
        generator,
        config.story.clone(),
        GenerationParams::from(&config.llm),
    );

    if config.storage.enabled {
        info!("Recording stories to {}", config.storage.db_path);
        let recorder = SqliteRecorder::new(&config.storage.db_path)
            .await
            .with_context(|| format!("Failed to open story database {}", config.storage.db_path))?;
        orchestrator = orchestrator.with_recorder(Arc::new(recorder));
    }

    let presets = session::ProfilePresets {
        name: args.name,
        pronouns: args.pronouns,
        age: args.age,
        genre: args.genre,
        current_emotion: args.feeling,
        target_emotion: args.target,
        length: args.length,
        research_email: args.email,
    };

    let result = session::run(&mut orchestrator, presets).await;
    orchestrator.flush_records().await;
    result
}
