use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use parlaspeech::{
    fetch_transcript_pages, ingest_session, read_transcript_files, ApiConfig, HumanTranscript,
    IngestConfig, IngestReport, MachineReport, MemoryStore, ParladataClient, RuleSet, Session,
};

#[derive(Parser)]
#[command(name = "parlaspeech")]
#[command(author, version, about = "Parliamentary transcript speech segmentation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment saved transcript pages without touching storage
    Segment {
        /// Transcript pages (HTML), in session order
        #[arg(short, long, num_args = 1.., required = true)]
        input: Vec<PathBuf>,

        /// Output file for the machine-readable report (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output file for human-readable speeches (text)
        #[arg(long)]
        human_readable: Option<PathBuf>,

        /// Rule table replacing the built-in one (TOML)
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Treat the session as already stored under review
        #[arg(long)]
        in_review: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Fetch transcript pages of a session and store its speeches
    Ingest {
        /// Session id in the storage API
        #[arg(long)]
        session_id: i64,

        /// Transcript page URLs, in session order
        #[arg(short, long, num_args = 1.., required = true)]
        url: Vec<String>,

        /// Maximum speeches per storage request
        #[arg(long, default_value = "100")]
        batch_size: usize,

        /// Rule table replacing the built-in one (TOML)
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Segment {
            input,
            output,
            human_readable,
            rules,
            in_review,
            verbose,
        } => {
            setup_logging(verbose);
            segment_offline(input, output, human_readable, rules, in_review).await
        }
        Commands::Ingest {
            session_id,
            url,
            batch_size,
            rules,
            verbose,
        } => {
            setup_logging(verbose);
            ingest(session_id, url, batch_size, rules).await
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn load_rules(path: Option<PathBuf>) -> Result<RuleSet> {
    let rules = match path {
        Some(path) => {
            info!("Loading rules from {:?}", path);
            RuleSet::load(&path)
        }
        None => RuleSet::builtin(),
    };
    rules.context("Failed to load segmentation rules")
}

async fn segment_offline(
    input: Vec<PathBuf>,
    output: Option<PathBuf>,
    human_readable: Option<PathBuf>,
    rules: Option<PathBuf>,
    in_review: bool,
) -> Result<()> {
    let rules = load_rules(rules)?;

    info!("Loading {} transcript page(s)", input.len());
    let pages = read_transcript_files(&input)?;

    let store = MemoryStore::new();
    let mut session = Session {
        id: 1,
        name: "offline".to_string(),
        start_time: None,
        in_review,
        is_new: !in_review,
    };
    store.insert_session(session.clone());

    let report = ingest_session(
        &store,
        &store,
        &mut session,
        &pages,
        &rules,
        &IngestConfig::default(),
    )
    .await?;
    log_summary(&report);

    let machine = MachineReport::from_report(&report, &store.people());

    if let Some(path) = output {
        info!("Writing report to {:?}", path);
        machine.write_json(&path)?;
    }

    if let Some(path) = human_readable {
        info!("Writing human-readable speeches to {:?}", path);
        HumanTranscript::new(&machine).write_file(&path)?;
    }

    Ok(())
}

async fn ingest(
    session_id: i64,
    urls: Vec<String>,
    batch_size: usize,
    rules: Option<PathBuf>,
) -> Result<()> {
    let rules = load_rules(rules)?;
    let client = ParladataClient::new(ApiConfig::from_env());

    let mut session = client.get_session(session_id).await?;
    info!("Loaded session {} ({})", session.id, session.name);

    let pages = fetch_transcript_pages(&client, &urls).await?;

    let config = IngestConfig {
        batch_size,
        ..Default::default()
    };
    let report = ingest_session(&client, &client, &mut session, &pages, &rules, &config).await?;
    log_summary(&report);

    Ok(())
}

fn log_summary(report: &IngestReport) {
    info!("=== Session {} ===", report.session_id);
    info!("Mode: {:?}", report.mode);
    info!("Pages processed: {}", report.pages_processed);
    info!("Duplicate pages: {}", report.duplicate_pages);
    info!("Speeches saved: {}", report.speeches.len());
    if let Some(start) = report.start_time_updated {
        info!("Start time set to {}", start);
    }
    if report.aborted {
        warn!("Session run stopped early");
    }
}
