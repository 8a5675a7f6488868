use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;

use media_veil::observability::init_tracing;
use media_veil::{
    load_config, DocumentSnapshot, EngineConfig, MediaIdentityResolver, NodeId, PageEvent,
    PageSession, RenderSignal, StaticClassifier,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Human,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the media reference each raw name or URL resolves to
    Resolve(ResolveArgs),
    /// Run a page view over a document snapshot until it settles
    Scan(ScanArgs),
}

#[derive(Args)]
struct ResolveArgs {
    /// File names, titles or URLs
    #[arg(required = true)]
    raw: Vec<String>,
}

#[derive(Args)]
struct ScanArgs {
    /// Document snapshot (JSON)
    #[arg(long, value_name = "FILE")]
    document: PathBuf,

    /// Render signal (JSON)
    #[arg(long, value_name = "FILE")]
    signal: PathBuf,

    /// Classification answers, a JSON object of name to sensitivity
    #[arg(long, value_name = "FILE")]
    classifications: Option<PathBuf>,

    /// Node id to press before the first frame
    #[arg(long, value_name = "NODE")]
    pointer_down: Option<usize>,
}

#[derive(Serialize)]
struct ResolvedName {
    raw: String,
    reference: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    let config = load_config(cli.config.as_deref()).context("loading configuration")?;
    match cli.command {
        Commands::Resolve(args) => cmd_resolve(&config, args, cli.output),
        Commands::Scan(args) => cmd_scan(&config, args).await,
    }
}

fn cmd_resolve(config: &EngineConfig, args: ResolveArgs, output: OutputFormat) -> Result<()> {
    let resolver = MediaIdentityResolver::new(&config.resolver)?;
    let resolved: Vec<ResolvedName> = args
        .raw
        .into_iter()
        .map(|raw| {
            let reference = resolver.resolve_url(&raw).map(|reference| reference.title());
            ResolvedName { raw, reference }
        })
        .collect();

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&resolved)?),
        OutputFormat::Human => {
            for entry in resolved {
                println!(
                    "{}\t{}",
                    entry.raw,
                    entry.reference.as_deref().unwrap_or("(unresolved)")
                );
            }
        }
    }
    Ok(())
}

async fn cmd_scan(config: &EngineConfig, args: ScanArgs) -> Result<()> {
    let document = DocumentSnapshot::from_json(&read(&args.document)?)?.into_document()?;
    let signal = RenderSignal::from_json(&read(&args.signal)?)?;

    let classifier = match &args.classifications {
        Some(path) => {
            let answers: HashMap<String, bool> = serde_json::from_str(&read(path)?)
                .with_context(|| format!("parsing {}", path.display()))?;
            StaticClassifier::from_map(answers)?
        }
        None => StaticClassifier::new(),
    };

    let mut session = PageSession::start(
        document,
        &signal,
        signal.preference(),
        Arc::new(classifier),
        config,
    )?;
    if let Some(node) = args.pointer_down {
        session.handle(PageEvent::PointerDown(NodeId(node)));
    }
    session.settle().await;

    let report = session.report();
    info!(
        target: "veil.session",
        marked = report.marked.len(),
        unblurred = report.unblurred,
        "scan.completed"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}
