mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{account::AccountSubcommand, catalog::CatalogSubcommand, feed::FeedArgs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "voyager",
    about = "Travel destination catalog, feed browser and account tools",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .voyager/)
    #[arg(long, global = true, env = "VOYAGER_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .voyager/config.yaml and the catalog database
    Init,

    /// Run the HTTP backend
    Serve {
        /// Port to listen on (default: server.port from config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Import destinations from a JSON file, skipping near-duplicates
    Seed { file: PathBuf },

    /// Inspect the stored catalog
    Catalog {
        #[command(subcommand)]
        subcommand: CatalogSubcommand,
    },

    /// Fetch and show the destination feed from a running backend
    Feed(FeedArgs),

    /// Manage accounts through the backend
    Account {
        /// Backend base URL (default: client.base_url from config)
        #[arg(long, global = true)]
        url: Option<String>,

        #[command(subcommand)]
        subcommand: AccountSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
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
        Commands::Serve { port } => cmd::serve::run(&root, port),
        Commands::Seed { file } => cmd::seed::run(&root, &file, cli.json),
        Commands::Catalog { subcommand } => cmd::catalog::run(&root, subcommand, cli.json),
        Commands::Feed(args) => cmd::feed::run(&root, args, cli.json),
        Commands::Account { url, subcommand } => cmd::account::run(&root, url, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
