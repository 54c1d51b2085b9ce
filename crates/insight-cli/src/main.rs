mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    actions::ActionsSubcommand, config::ConfigSubcommand, findings::FindingsSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "insight",
    about = "Infrastructure findings and human-approved remediation",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .insight/)
    #[arg(long, global = true, env = "INSIGHT_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .insight/ with a default config and an empty store
    Init,

    /// Run the HTTP API (and, by default, the executor loop)
    Serve {
        /// Port to listen on (default: server.port from config)
        #[arg(long)]
        port: Option<u16>,

        /// Do not run the executor loop in this process
        #[arg(long)]
        no_worker: bool,
    },

    /// Review remediation actions
    Actions {
        #[command(subcommand)]
        subcommand: ActionsSubcommand,
    },

    /// Browse and import findings
    Findings {
        #[command(subcommand)]
        subcommand: FindingsSubcommand,
    },

    /// Weekly findings report
    Report,

    /// Execute approved actions against the local store
    Worker {
        /// Drain the approved queue once and exit
        #[arg(long)]
        once: bool,

        /// Execute a single approved action and exit
        #[arg(long, conflicts_with = "once")]
        action: Option<String>,
    },

    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } | Commands::Worker { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Serve { port, no_worker } => cmd::serve::run(&root, port, no_worker),
        Commands::Actions { subcommand } => cmd::actions::run(&root, subcommand, cli.json),
        Commands::Findings { subcommand } => cmd::findings::run(&root, subcommand, cli.json),
        Commands::Report => cmd::report::run(&root, cli.json),
        Commands::Worker { once, action } => cmd::worker::run(&root, once, action, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
