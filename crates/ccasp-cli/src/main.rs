mod cmd;
mod output;
mod prompt;
mod root;

use clap::{Parser, Subcommand};
use cmd::{feature::FeatureSubcommand, usage::UsageSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ccasp",
    about = "Deploy and re-sync .claude commands, hooks and skills without losing local edits",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .claude/ or .git/)
    #[arg(long, global = true, env = "CCASP_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy the assets of the selected features
    Sync {
        /// Comma-separated feature names (default: config, then built-in defaults)
        #[arg(long, value_delimiter = ',')]
        features: Option<Vec<String>>,

        /// interactive | force_overwrite | force_skip | auto_backup_on_conflict
        #[arg(long)]
        mode: Option<String>,

        /// Template directory (default: templates_dir from config)
        #[arg(long)]
        templates: Option<PathBuf>,

        /// Show the plan without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the customization state of every deployed asset
    Status,

    /// List known features
    Features,

    /// Manage feature selection state
    Feature {
        #[command(subcommand)]
        subcommand: FeatureSubcommand,
    },

    /// Record and inspect asset usage
    Usage {
        #[command(subcommand)]
        subcommand: UsageSubcommand,
    },

    /// Check the package registry for a newer release
    CheckUpdate {
        /// Stop reporting the latest version seen
        #[arg(long)]
        dismiss: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Sync {
            features,
            mode,
            templates,
            dry_run,
        } => cmd::sync::run(
            &root,
            cmd::sync::SyncArgs {
                features,
                mode,
                templates,
                dry_run,
            },
            cli.json,
        ),
        Commands::Status => cmd::status::run(&root, cli.json),
        Commands::Features => cmd::features::run(&root, cli.json),
        Commands::Feature { subcommand } => cmd::feature::run(&root, subcommand, cli.json),
        Commands::Usage { subcommand } => cmd::usage::run(&root, subcommand, cli.json),
        Commands::CheckUpdate { dismiss } => cmd::check_update::run(&root, dismiss, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
