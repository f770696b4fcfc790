use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod fixture;
mod util;

use commands::diagnose::{DiagnoseArgs, OutputFormat};
use util::{EXIT_USAGE_ERROR, report_error};

#[derive(Parser)]
#[command(
    name = "pulsecheck",
    version,
    about = "PulseCheck CLI: diagnose why activity tracking is not working"
)]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a diagnostic against checker results replayed from a fixture
    Diagnose {
        /// Fixture file path ('-' for stdin)
        #[arg(long)]
        fixture: String,
        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
        /// Compact JSON instead of pretty-printed
        #[arg(long)]
        raw: bool,
        /// Per-checker deadline in milliseconds (overrides PULSECHECK_CHECKER_TIMEOUT_MS)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Print the issue catalog and causal links as JSON
    Catalog {
        /// Compact JSON instead of pretty-printed
        #[arg(long)]
        raw: bool,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pulsecheck_core=info,pulsecheck=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            let message = err.to_string();
            let code = report_error(
                "usage_error",
                message.trim(),
                Some("Run 'pulsecheck --help' for usage."),
                EXIT_USAGE_ERROR,
            );
            std::process::exit(code);
        }
    };

    init_tracing(cli.log_json);

    let code = match cli.command {
        Commands::Diagnose {
            fixture,
            format,
            raw,
            timeout_ms,
        } => {
            commands::diagnose::run(DiagnoseArgs {
                fixture,
                format,
                raw,
                timeout_ms,
            })
            .await
        }
        Commands::Catalog { raw } => commands::catalog::run(raw),
    };

    std::process::exit(code);
}
