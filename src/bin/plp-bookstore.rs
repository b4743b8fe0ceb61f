use clap::{Parser, Subcommand};
use plp_bookstore::cli::{self as prog_cli, Command};
use plp_bookstore::config::{self, AppConfig};
use plp_bookstore::query::Verbosity;
use plp_bookstore::runner::{Console, OutputMode};
use plp_bookstore::utils::logger::{LogOptions, configure_logging};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "plp-bookstore", version, about = "Run the PLP bookstore queries against MongoDB", long_about = None)]
struct Cli {
    #[arg(long, global = true, help = "Path to a config file (TOML)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "MongoDB connection string (default mongodb://localhost:27017)")]
    uri: Option<String>,
    #[arg(long, global = true, help = "Database name (default plp_bookstore)")]
    db: Option<String>,
    #[arg(long, global = true, help = "Collection name (default books)")]
    collection: Option<String>,
    #[arg(long, global = true, help = "error|warn|info|debug|trace")]
    log_level: Option<String>,
    #[arg(long, global = true, help = "Directory for log files")]
    log_dir: Option<PathBuf>,
    #[arg(long, global = true, value_parser = prog_cli::parse_output_mode, default_value = "human", help = "human|json")]
    format: OutputMode,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run the fixed query sequence (default)")]
    Run {
        #[arg(long, help = "Use the in-memory store preloaded with the sample books")]
        memory: bool,
        #[arg(long, conflicts_with = "memory", help = "Insert the sample books before running")]
        seed: bool,
    },
    #[command(about = "Insert the sample books, or documents from an NDJSON / JSON-array file")]
    Seed {
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long, help = "Drop the collection first")]
        drop: bool,
    },
    #[command(about = "Explain a find by title")]
    Explain {
        #[arg(long, default_value = "Book A")]
        title: String,
        #[arg(long, value_parser = prog_cli::parse_verbosity, default_value = "executionStats")]
        verbosity: Verbosity,
        #[arg(long)]
        memory: bool,
    },
    #[command(about = "List index names")]
    Indexes {
        #[arg(long)]
        memory: bool,
    },
}

impl From<Commands> for Command {
    fn from(c: Commands) -> Self {
        match c {
            Commands::Run { memory, seed } => Self::Run { memory, seed },
            Commands::Seed { file, drop } => Self::Seed { file, drop },
            Commands::Explain { title, verbosity, memory } => Self::Explain { title, verbosity, memory },
            Commands::Indexes { memory } => Self::Indexes { memory },
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let layer = AppConfig {
        uri: cli.uri.clone(),
        database: cli.db.clone(),
        collection: cli.collection.clone(),
        log_level: cli.log_level.clone(),
        log_dir: cli.log_dir.clone(),
        ..AppConfig::default()
    };
    let settings = match config::resolve(cli.config.as_deref(), layer) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let log_opts = LogOptions {
        dir: settings.log_dir.clone(),
        level: settings.log_level.clone(),
        dev6: settings.dev6,
        ..LogOptions::default()
    };
    if let Err(e) = configure_logging(&log_opts) {
        eprintln!("warning: file logging disabled: {e}");
    }
    log::info!("plp-bookstore {} against {}", env!("CARGO_PKG_VERSION"), settings.namespace());

    let mut console = Console::stdio(cli.format);
    let cmd = cli.command.map(Command::from).unwrap_or_default();
    match prog_cli::run_with_format(&settings, cmd, &mut console).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
