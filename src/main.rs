//! Deckshot CLI
//!
//! Every command prints a JSON report on stdout. Partial failures (a deck
//! that was not created, a capture that fell through every strategy) are
//! part of the report, not a non-zero exit.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use deckshot::capture::CapturePipeline;
use deckshot::client::{ArtifactClient, HttpTransport};
use deckshot::{export, style, CaptureView, ComparisonOrchestrator, Config, ExportFormat};
use log::{error, info};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "deckshot")]
#[command(about = "Generate slide decks from prompts and capture before/after comparisons", long_about = None)]
struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Creation service endpoint
    #[arg(long, global = true, env = deckshot::ENDPOINT_ENV)]
    endpoint: Option<String>,

    /// Output directory for captures and exports
    #[arg(short, long, global = true)]
    out: Option<PathBuf>,

    /// Browser binary for the explicit-driver strategy
    #[arg(long, global = true, env = deckshot::BROWSER_ENV)]
    browser: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the font pair and palette found in a prompt
    Parse {
        prompt: String,

        /// Also ask the service's parser (testFontParsing)
        #[arg(long)]
        remote: bool,
    },

    /// Create one deck from a prompt
    Create { prompt: String },

    /// Create a baseline and a styled deck and report both
    Compare {
        /// Prompt; ignored with --server-side
        #[arg(default_value = "")]
        prompt: String,

        /// Capture each created deck
        #[arg(long)]
        capture: bool,

        /// Capture the editor view instead of the published view
        #[arg(long)]
        edit_view: bool,

        /// Use the service's createFontComparison instead of two prompts
        #[arg(long)]
        server_side: bool,

        /// Save each deck's thumbnail link (works for unshared decks)
        #[arg(long)]
        thumbnails: bool,
    },

    /// Capture a single URL through the strategy chain
    Capture { url: String },

    /// Download exports of an existing deck
    Export {
        artifact_id: String,

        /// Formats to download (defaults to the configured export formats)
        #[arg(short, long)]
        format: Vec<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint_url = endpoint.clone();
    }
    if let Some(out) = &cli.out {
        config.output_dir = out.clone();
    }
    if let Some(browser) = &cli.browser {
        config.browser_path = Some(browser.clone());
    }
    Ok(config)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Parse { prompt, remote } => {
            let local = style::extract(&prompt);
            if !remote {
                return print_json(&local);
            }
            config.validate()?;
            let client = ArtifactClient::from_config(&config)?;
            let remote = client.parse_remotely(&prompt);
            let agree = remote.success
                && remote.font_pair == local.font_pair
                && remote.color_palette.as_ref().map(|p| &p.hex_codes)
                    == local.color_palette.as_ref().map(|p| &p.hex_codes);
            print_json(&serde_json::json!({ "local": local, "remote": remote, "agree": agree }))
        }

        Commands::Create { prompt } => {
            config.validate()?;
            let client = ArtifactClient::from_config(&config)?;
            print_json(&client.create(&prompt))
        }

        Commands::Compare {
            prompt,
            capture,
            edit_view,
            server_side,
            thumbnails,
        } => {
            if edit_view {
                config.capture_view = CaptureView::Edit;
            }
            if !server_side && prompt.trim().is_empty() {
                bail!("a prompt is required unless --server-side is given");
            }
            config.validate()?;

            let client = ArtifactClient::from_config(&config)?;
            let mut orchestrator = ComparisonOrchestrator::new(client);
            if capture {
                orchestrator = orchestrator.with_capture(
                    build_pipeline(&config)?,
                    config.capture_view,
                    config.output_dir.clone(),
                );
            }

            if thumbnails {
                orchestrator = orchestrator.with_thumbnails(config.output_dir.clone());
            }

            let report = if server_side {
                orchestrator.run_server_side()
            } else {
                orchestrator.run(&prompt)
            };
            if report.captures_identical() {
                info!("before and after captures are identical");
            }
            print_json(&serde_json::json!({
                "comparison": report,
                "captureLog": orchestrator.capture_attempts(),
            }))
        }

        Commands::Capture { url } => {
            let mut pipeline = build_pipeline(&config)?;
            let attempt = pipeline.capture(&url, &config.output_dir);
            print_json(&serde_json::json!({ "result": attempt, "log": pipeline.attempts() }))
        }

        Commands::Export { artifact_id, format } => {
            let formats = if format.is_empty() {
                config.export_formats.clone()
            } else {
                format
                    .iter()
                    .map(|f| f.parse::<ExportFormat>())
                    .collect::<deckshot::Result<Vec<_>>>()?
            };
            let transport = HttpTransport::new(Duration::from_millis(config.request_timeout_ms))?;
            let results = export::download_all(&transport, &artifact_id, &formats, &config.output_dir);
            let report: Vec<ExportReport> = results
                .into_iter()
                .map(|(format, result)| match result {
                    Ok(file) => ExportReport {
                        format,
                        file: Some(file),
                        error: None,
                    },
                    Err(e) => ExportReport {
                        format,
                        file: None,
                        error: Some(e.to_string()),
                    },
                })
                .collect();
            print_json(&report)
        }
    }
}

#[derive(Serialize)]
struct ExportReport {
    format: ExportFormat,
    file: Option<export::ExportedFile>,
    error: Option<String>,
}

#[cfg(feature = "cdp")]
fn build_pipeline(config: &Config) -> anyhow::Result<CapturePipeline> {
    Ok(CapturePipeline::from_config(config))
}

#[cfg(not(feature = "cdp"))]
fn build_pipeline(_config: &Config) -> anyhow::Result<CapturePipeline> {
    bail!("capture needs the `cdp` feature")
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to serialize report")?;
    println!("{}", rendered);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn endpoint_and_browser_fall_back_to_environment() {
        let cmd = Cli::command();
        let env_of = |id: &str| {
            cmd.get_arguments()
                .find(|a| a.get_id() == id)
                .and_then(|a| a.get_env())
                .map(|e| e.to_string_lossy().into_owned())
        };
        assert_eq!(env_of("endpoint").as_deref(), Some(deckshot::ENDPOINT_ENV));
        assert_eq!(env_of("browser").as_deref(), Some(deckshot::BROWSER_ENV));
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deckshot.json");
        std::fs::write(&path, r#"{"endpoint_url": "https://file.example/exec", "pacing_ms": 0}"#).unwrap();

        let cli = Cli::try_parse_from([
            "deckshot",
            "--config",
            path.to_str().unwrap(),
            "--endpoint",
            "https://flag.example/exec",
            "create",
            "A deck",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.endpoint_url, "https://flag.example/exec");
        assert_eq!(config.pacing_ms, 0);
    }
}
