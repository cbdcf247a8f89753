//! kaspdb CLI
//!
//! Command-line tools for the kaspdb key store.
//!
//! # Commands
//!
//! - `setup` - Create storage for all entities and record the schema version
//! - `check` - Compare the stored schema version with this build
//! - `keys` - List HSM keys, optionally for one policy
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use kaspdb_core::{Config, ConfigurationList, Connection};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Storage backend selection.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendArg {
    /// SQLite database file
    Sqlite,
    /// CouchDB-style document store
    Couchdb,
}

/// kaspdb key store tools.
#[derive(Parser)]
#[command(name = "kaspdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Storage backend
    #[arg(global = true, short, long, value_enum, default_value = "sqlite")]
    backend: BackendArg,

    /// Database file (sqlite backend)
    #[arg(global = true, short, long)]
    file: Option<PathBuf>,

    /// Store url, memory://name or file:///path (couchdb backend)
    #[arg(global = true, short, long)]
    url: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create storage for all entities and record the schema version
    Setup,

    /// Compare the stored schema version with this build
    Check,

    /// List HSM keys
    Keys {
        /// Only keys of this policy
        #[arg(short, long)]
        policy: Option<String>,
    },

    /// Show version information
    Version,
}

impl Cli {
    fn configuration(&self) -> Result<ConfigurationList, Box<dyn std::error::Error>> {
        let mut list = ConfigurationList::new();
        match self.backend {
            BackendArg::Sqlite => {
                let file = self.file.as_ref().ok_or("--file required for the sqlite backend")?;
                list.add("backend", "sqlite")?;
                list.add("file", file.to_string_lossy())?;
            }
            BackendArg::Couchdb => {
                let url = self.url.as_ref().ok_or("--url required for the couchdb backend")?;
                list.add("backend", "couchdb")?;
                list.add("url", url.as_str())?;
            }
        }
        Ok(list)
    }

    fn connect(&self) -> Result<Connection, Box<dyn std::error::Error>> {
        let config = Config::from_list(&self.configuration()?)?;
        Ok(Connection::open(&config)?)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Setup => commands::setup::run(&cli.connect()?)?,
        Commands::Check => commands::check::run(&cli.connect()?)?,
        Commands::Keys { policy } => commands::keys::run(&cli.connect()?, policy.as_deref())?,
        Commands::Version => {
            println!("kaspdb CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("kaspdb Core v{}", kaspdb_core::VERSION);
            println!("Schema version {}", kaspdb_core::CURRENT_VERSION);
        }
    }

    Ok(())
}
