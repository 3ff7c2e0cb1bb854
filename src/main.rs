//! lhfw - Lighthouse firewall editor
//!
//! # Usage
//!
//! ```bash
//! # Fetch, merge, edit, confirm and apply
//! LIGHTHOUSE_SECRET=secretId:secretKey:lhins-xxxx lhfw firewall
//!
//! # Target another instance
//! lhfw firewall -i lhins-yyyy
//!
//! # Apply a previously edited file (printed by an aborted run)
//! lhfw firewall -f /tmp/firewall-abc123.json
//!
//! # Only show the public IP as seen by a panel of echo services
//! lhfw firewall -p
//! lhfw publicip
//! lhfw publicip --endpoint https://ident.me --endpoint ip.sb
//! ```
//!
//! Set `RUST_LOG=debug` for request-level logging.

use clap::{Parser, Subcommand};
use lhfw::config;
use lhfw::core::error::{Error, RemoteErrorPattern};
use lhfw::editor::{ExternalEditor, StdinPrompt, current_program};
use lhfw::gateway::lighthouse::LighthouseClient;
use lhfw::probe::{DEFAULT_TIMEOUT, Probe};
use lhfw::workflow::{ApplyReport, Outcome, Workflow, apply_file};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "lhfw")]
#[command(about = "Edit Lighthouse firewall rules in your editor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Edit the firewall rules of an instance
    Firewall {
        /// Instance id (defaults to the configured instance)
        #[arg(short, long, value_name = "ID", conflicts_with = "file")]
        instance_id: Option<String>,
        /// Apply an already edited rules file instead of fetching
        #[arg(short, long, value_name = "FILE", conflicts_with = "public_ip")]
        file: Option<PathBuf>,
        /// Only show the public IP of this machine
        #[arg(short, long)]
        public_ip: bool,
        /// Skip the public IP report while fetching
        #[arg(long, conflicts_with = "public_ip")]
        no_probe: bool,
    },
    /// Show the public IP of this machine
    Publicip {
        /// Ask these services instead of the default panel (repeatable)
        #[arg(long = "endpoint", value_name = "URL")]
        endpoints: Vec<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to create Tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(handle_cli(cli.command));
    // Abandoned probe requests may still sit in blocking DNS lookups
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn report_error(e: &Error) {
    let Error::Remote {
        code,
        message,
        request_id,
    } = e
    else {
        eprintln!("Error: {e}");
        return;
    };

    let translation = RemoteErrorPattern::match_error(code, message);
    eprintln!("Error: {}", translation.user_message);
    if !request_id.is_empty() {
        eprintln!("  Request id: {request_id}");
    }
    for suggestion in &translation.suggestions {
        eprintln!("  - {suggestion}");
    }
    if let Some(url) = &translation.help_url {
        eprintln!("  See: {url}");
    }
}

async fn show_public_ip(probe: &Probe) {
    if probe.run().await.is_empty() {
        warn!("No endpoint answered");
    }
}

async fn handle_cli(command: Commands) -> lhfw::Result<()> {
    match command {
        Commands::Publicip { endpoints } if !endpoints.is_empty() => {
            show_public_ip(&Probe::new(endpoints, DEFAULT_TIMEOUT)?).await;
        }
        Commands::Publicip { .. }
        | Commands::Firewall {
            public_ip: true, ..
        } => {
            show_public_ip(&Probe::with_default_endpoints()?).await;
        }
        Commands::Firewall {
            file: Some(path), ..
        } => {
            let config = config::load().await?;
            let client = LighthouseClient::new(&config)?;

            let report = apply_file(&client, &path).await?;
            print_applied(&report);
        }
        Commands::Firewall {
            instance_id,
            no_probe,
            ..
        } => {
            let config = config::load().await?;
            let instance_id = config::resolve_instance_id(instance_id.as_deref(), &config)?;
            let client = LighthouseClient::new(&config)?;
            let editor = ExternalEditor::from_env()?;
            let mut prompt = StdinPrompt;

            let mut workflow =
                Workflow::new(&client, &editor, &mut prompt).program(current_program());
            if !no_probe {
                workflow = workflow.probe(Probe::with_default_endpoints()?);
            }

            // Abort and a missing editor already printed how to resume
            if let Outcome::Applied(report) = workflow.run(&instance_id).await? {
                print_applied(&report);
            }
        }
    }
    Ok(())
}

fn print_applied(report: &ApplyReport) {
    println!(
        "✓ Applied {} rules to {} (request id: {})",
        report.rules, report.instance_id, report.request_id
    );
}
