mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::commands::lifecycle::Action;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// PingOne Authorize entity reconciler.
#[derive(Parser)]
#[command(
    name = "p1authz",
    version,
    about = "Reconcile PingOne Authorize trust-framework and policy entities"
)]
struct Cli {
    /// Config file (default: ./p1authz.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log request and poll detail to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Authorize API base URL, e.g. https://api.pingone.eu/v1
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Access token for the Authorize and Management APIs
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the type registry as JSON
    Schema {
        /// Limit output to one entity kind and the shapes it reaches
        kind: Option<String>,
    },

    /// Apply defaults and constraints to a plan and print its wire document
    Validate {
        /// Entity kind, e.g. policy_management_rule
        kind: String,
        /// Path to the plan JSON file
        plan: PathBuf,
    },

    /// Create an entity, or update it when --state names an existing one
    Apply {
        kind: String,
        /// Path to the plan JSON file
        plan: PathBuf,
        /// Path to the current state JSON file
        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Refresh state from the server
    Read {
        kind: String,
        /// Path to the state JSON file
        state: PathBuf,
    },

    /// Delete the entity a state file describes
    Delete {
        kind: String,
        /// Path to the state JSON file
        state: PathBuf,
    },

    /// Read an existing entity by import identifier
    Import {
        kind: String,
        /// Slash-separated identifier, e.g. <environment_id>/<rule_id>
        id: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output = cli.output;
    let quiet = cli.quiet;
    let (kind, action) = match cli.command {
        Commands::Schema { kind } => {
            commands::schema::cmd_schema(kind.as_deref(), output, quiet);
            return;
        }
        Commands::Validate { kind, plan } => {
            commands::validate::cmd_validate(&kind, &plan, output, quiet);
            return;
        }
        Commands::Apply { kind, plan, state } => (kind, Action::Apply { plan, state }),
        Commands::Read { kind, state } => (kind, Action::Read { state }),
        Commands::Delete { kind, state } => (kind, Action::Delete { state }),
        Commands::Import { kind, id } => (kind, Action::Import { id }),
    };

    let settings = config::Settings {
        file: cli.config,
        api_url: cli.api_url,
        token: cli.token,
    };
    commands::lifecycle::cmd_lifecycle(&kind, action, &settings, output, quiet);
}

/// Install the stderr subscriber. `RUST_LOG` wins unless `--verbose` is
/// given; reconciler warnings are printed as diagnostics, not log lines.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn,p1authz_reconcile=error"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Report an error message to stderr in the requested format.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
