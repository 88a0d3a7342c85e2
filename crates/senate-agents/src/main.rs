use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use curia::events::{EventFilter, EventHistory};
use curia::topics::TopicCache;
use curia::voting::TieBreak;
use curia::EventBus;
use senate_agents::agents::AgentSettings;
use senate_agents::llm::LlmSet;
use senate_agents::prompts;
use senate_agents::{EventBridge, ProviderKind, SenateConfig, SenateSession, SessionConfig, TopicSource};
use tracing::info;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Roman Senate debate simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one session of the Senate
    Play(PlayArgs),
}

#[derive(clap::Args, Debug)]
struct PlayArgs {
    /// Number of senators in the chamber
    #[arg(long, default_value_t = 10)]
    senators: usize,

    /// Rounds of speeches per topic
    #[arg(long, default_value_t = 3)]
    debate_rounds: u32,

    /// Topics on the agenda
    #[arg(long, default_value_t = 3)]
    topics: usize,

    /// Text generation backend: openai, local or mock (overrides SENATE_PROVIDER)
    #[arg(long)]
    provider: Option<String>,

    /// Seed for every random decision in the session
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Write a JSONL transcript of every event
    #[arg(long)]
    transcript: Option<PathBuf>,

    /// Forward only these event types; a trailing '.' selects a family (e.g. senator.)
    #[arg(long, value_delimiter = ',')]
    only: Vec<String>,

    /// How a tied vote is settled: consul, random or status-quo
    #[arg(long, default_value = "consul")]
    tie_break: TieBreak,

    /// Year of the session; negative years are BC
    #[arg(long, default_value_t = -63, allow_hyphen_values = true)]
    year: i32,

    /// Reshuffle the speaking order every round
    #[arg(long, default_value_t = false)]
    shuffle: bool,

    /// Path to the topic cache (overrides SENATE_TOPICS_CACHE)
    #[arg(long)]
    topics_cache: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Play(args) => play(args).await,
    }
}

async fn play(args: PlayArgs) -> Result<()> {
    let mut config = SenateConfig::default();
    if let Some(provider) = &args.provider {
        config.provider = provider.parse::<ProviderKind>()?;
    }
    if let Some(path) = &args.topics_cache {
        config.topics_cache = path.clone();
    }
    config.validate().context("invalid configuration")?;

    info!(
        provider = %config.provider,
        senators = args.senators,
        rounds = args.debate_rounds,
        topics = args.topics,
        seed = args.seed,
        year = %prompts::era(args.year),
        "Senate simulator starting"
    );

    let llm = LlmSet::from_config(&config.provider.to_string(), &config)
        .context("failed to create LLM providers")?;

    let history = EventHistory::new().shared();
    let bus = EventBus::with_history(history.clone()).shared();
    let filter = EventFilter::new().types(args.only.iter().map(|t| t.trim().to_string()));
    let bridge = EventBridge::start_filtered(&bus, args.transcript.as_deref(), filter)
        .await
        .context("failed to start event bridge")?;

    let mut source = TopicSource::new(
        llm.reasoning.clone(),
        TopicCache::load_or_empty(&config.topics_cache),
    );
    let topics = source.topics(args.year, args.topics).await;

    let session_config = SessionConfig {
        senators: args.senators,
        rounds: args.debate_rounds,
        topics: args.topics,
        seed: args.seed,
        tie_break: args.tie_break,
        year: args.year,
        shuffle: args.shuffle,
        agent: AgentSettings {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        },
    };
    let mut session = SenateSession::new(session_config, bus.clone(), llm)?;
    let report = session.run(topics).await.context("session failed")?;

    let frames = bridge.shutdown().await.context("event bridge failed")?;
    let stats = history.stats();
    info!(events = stats.total_recorded, frames, "Session complete");

    println!("{}", report.summary_line());
    if let Some(presiding) = &report.presiding {
        println!("Presiding: {}", presiding);
    }
    for topic in &report.topics {
        let counts = topic.result.counts;
        println!(
            "- {} [{}]: {} (for {}, against {}, abstain {}){}",
            topic.topic.title,
            topic.topic.category,
            topic.result.outcome(),
            counts.in_favor,
            counts.against,
            counts.abstain,
            match &topic.result.tie_resolution {
                Some(tie) if tie.passed => " - tie carried",
                Some(_) => " - tie failed",
                None => "",
            }
        );
        println!(
            "    {} speeches, {} reactions, {} interjections ({} disruptive), {} stance changes",
            topic.debate.speeches,
            topic.debate.reactions,
            topic.debate.interjections,
            topic.debate.permitted_interjections,
            topic.debate.stance_changes
        );
    }
    if let Some((from, to, score)) = report.relationships.bitterest() {
        println!("Bitterest exchange: {} toward {} ({:.2})", from, to, score);
    }
    if let Some(path) = &args.transcript {
        println!("Transcript: {}", path.display());
    }
    Ok(())
}
