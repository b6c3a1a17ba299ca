//! telemetry-ingest: serve the agent endpoint or render batches offline.

use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use telemetry_details::render_details;
use telemetry_ingest::{server, AlertingWriter, IngestConfig, LogRequest, TracingWriter};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "telemetry-ingest",
    version,
    about = "Browser telemetry ingestion with canonical Details rendering"
)]
struct Cli {
    /// Path to telemetry.toml (default: search current dir and parents)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP endpoint
    Serve {
        /// Override the bind address (e.g. 127.0.0.1:8080)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Print the Details text of every message in a posted batch
    Render {
        /// JSON batch file (default: stdin)
        file: Option<PathBuf>,
    },
    /// Print a telemetry.toml with every default
    InitConfig,
}

fn load_config(path: Option<&PathBuf>) -> Result<IngestConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => IngestConfig::load_from(path)?,
        None => IngestConfig::load()?,
    };
    config.apply_env();
    Ok(config)
}

fn init_tracing(config: &IngestConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_input(file: Option<&PathBuf>) -> std::io::Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Commands::InitConfig = cli.command {
        print!("{}", IngestConfig::default_template());
        return Ok(());
    }

    let mut config = load_config(cli.config.as_ref())?;
    init_tracing(&config);

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            let writer = Arc::new(AlertingWriter::new(TracingWriter, config.alerts.min_severity));
            let _alerts = writer.subscribe(|entry| {
                warn!(
                    target: "telemetry::alert",
                    severity = %entry.severity,
                    category = %entry.category,
                    session = entry.session_id.as_deref().unwrap_or("-"),
                    "{}", entry.caption
                );
            });
            server::serve(&config, writer).await?;
        }
        Commands::Render { file } => {
            let input = read_input(file.as_ref())?;
            let request = LogRequest::from_json(&input)?;
            for event in request.into_events(config.details.parse_embedded_json) {
                println!("{}", render_details(&event));
            }
        }
        Commands::InitConfig => {}
    }

    Ok(())
}
