mod commands;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "kinspect",
    version,
    about = "Audit Kubernetes resource snapshots against environment-aware threshold rules"
)]
struct Cli {
    /// Log rule loading and evaluation details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect a cluster snapshot (JSON) and report findings
    Inspect {
        /// Path to the snapshot JSON file
        snapshot: PathBuf,

        /// Rules file (YAML); the bundled defaults are used when omitted
        #[arg(short, long, value_name = "FILE", env = "KINSPECT_RULES")]
        rules: Option<PathBuf>,

        /// Cluster name, used to pick the environment
        #[arg(short, long, env = "KINSPECT_CLUSTER")]
        cluster: Option<String>,

        /// Force an environment instead of looking it up by cluster
        #[arg(short, long, env = "KINSPECT_ENV")]
        env: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        output: OutputFormat,

        /// Only show resources that have failing checks
        #[arg(long)]
        only_issues: bool,
    },
    /// List, validate and query rule sets
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },
}

#[derive(Subcommand)]
enum RulesAction {
    /// List rules, optionally filtered
    List {
        #[arg(short, long, value_name = "FILE", env = "KINSPECT_RULES")]
        rules: Option<PathBuf>,

        /// Only rules in this category (repeatable)
        #[arg(long = "category", value_name = "NAME")]
        categories: Vec<String>,

        /// Only rules with this severity (repeatable)
        #[arg(long = "severity", value_name = "LEVEL")]
        severities: Vec<String>,

        /// Only disabled rules
        #[arg(long)]
        disabled: bool,
    },
    /// Validate a rules file
    Validate {
        /// Path to the YAML rules file
        file: PathBuf,
    },
    /// Show which environment a cluster maps to
    Env {
        cluster: String,

        #[arg(short, long, value_name = "FILE", env = "KINSPECT_RULES")]
        rules: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Inspect {
            snapshot,
            rules,
            cluster,
            env,
            output,
            only_issues,
        } => commands::inspect::run(snapshot, rules, cluster, env, output, only_issues),
        Commands::Rules { action } => match action {
            RulesAction::List {
                rules,
                categories,
                severities,
                disabled,
            } => commands::rules::list(rules, categories, &severities, disabled),
            RulesAction::Validate { file } => commands::rules::validate(&file),
            RulesAction::Env { cluster, rules } => commands::rules::env(&cluster, rules),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
