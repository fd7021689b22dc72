//! OptBus CLI
//!
//! Runs a registry behind a sync server, or talks to one remotely.
//!
//! # Commands
//!
//! - `serve` - Load ini files into a registry and serve it
//! - `get` - Read entries
//! - `set` - Apply `key=value` assignments in one session
//! - `batch` - Apply an ini file in one session
//! - `watch` - Print changes of entries as they happen
//! - `list` - List every entry path
//! - `dump` - Show the diagnostic table of all entries

mod commands;

use clap::{Parser, Subcommand};
use optbus_client::ClientConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// OptBus registry tools.
#[derive(Parser)]
#[command(name = "optbus")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Server host for remote commands
    #[arg(global = true, long, default_value = "127.0.0.1")]
    server: String,

    /// Server port for remote commands
    #[arg(global = true, long, default_value_t = optbus_server::DEFAULT_PORT)]
    port: u16,

    /// Client name sent in the handshake
    #[arg(global = true, long, default_value = "optbus")]
    client: String,

    /// User name sent in the handshake
    #[arg(global = true, long, default_value = "admin")]
    user: String,

    /// Password sent in the handshake
    #[arg(global = true, long, default_value = "")]
    password: String,

    /// Socket timeout in seconds
    #[arg(global = true, long, default_value_t = 5)]
    timeout: u64,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(global = true, short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load ini files into a registry and serve it
    Serve {
        /// Port to listen on
        #[arg(long = "or-port", default_value_t = optbus_server::DEFAULT_PORT)]
        or_port: u16,

        /// Address to bind to
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,

        /// Ini file to load; may be repeated
        #[arg(long = "opt-file")]
        opt_files: Vec<PathBuf>,

        /// User to provision as NAME:PASSWORD; may be repeated
        #[arg(long = "add-user")]
        add_users: Vec<String>,

        /// Client name to enable; may be repeated
        #[arg(long = "enable-client")]
        enable_clients: Vec<String>,
    },

    /// Read entries
    Get {
        /// Entry paths
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Apply key=value assignments in one session
    Set {
        /// Assignments such as i:/app/level=3
        #[arg(required = true)]
        assignments: Vec<String>,
    },

    /// Apply an ini file in one session
    Batch {
        /// File of key=value lines
        file: PathBuf,
    },

    /// Print changes of entries as they happen
    Watch {
        /// Entry paths
        #[arg(required = true)]
        paths: Vec<String>,

        /// Exit after this many changes
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// List every entry path
    List,

    /// Show the diagnostic table of all entries
    Dump,

    /// Show version information
    Version,
}

impl Cli {
    fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.server.clone(), self.port)
            .with_client_name(self.client.clone())
            .with_credentials(self.user.clone(), self.password.clone())
            .with_io_timeout(Duration::from_secs(self.timeout))
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

    let config = cli.client_config();
    match cli.command {
        Commands::Serve {
            or_port,
            bind,
            opt_files,
            add_users,
            enable_clients,
        } => {
            let options = commands::serve::ServeOptions {
                bind: format!("{bind}:{or_port}"),
                opt_files,
                users: add_users,
                clients: enable_clients,
            };
            commands::serve::run(&options)?;
        }
        Commands::Get { paths } => {
            commands::get::run(config, &paths, &cli.format)?;
        }
        Commands::Set { assignments } => {
            commands::set::run(config, &assignments)?;
        }
        Commands::Batch { file } => {
            commands::set::run_file(config, &file)?;
        }
        Commands::Watch { paths, count } => {
            commands::watch::run(config, &paths, count, &cli.format)?;
        }
        Commands::List => {
            commands::list::run(config, &cli.format)?;
        }
        Commands::Dump => {
            commands::list::run_dump(config)?;
        }
        Commands::Version => {
            println!("OptBus CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("OptBus Core v{}", optbus_core::VERSION);
        }
    }

    Ok(())
}
