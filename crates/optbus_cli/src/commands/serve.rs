//! Serve command implementation.

use optbus_core::Registry;
use optbus_server::{provision_client, provision_user, ServerConfig, SyncServer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Settings collected from the command line.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// `host:port` to bind.
    pub bind: String,
    /// Ini files loaded in order.
    pub opt_files: Vec<PathBuf>,
    /// `NAME:PASSWORD` pairs to provision.
    pub users: Vec<String>,
    /// Client names to enable.
    pub clients: Vec<String>,
}

/// Runs the serve command until the process is stopped.
pub fn run(options: &ServeOptions) -> Result<(), Box<dyn std::error::Error>> {
    let bind: SocketAddr = options
        .bind
        .parse()
        .map_err(|e| format!("Invalid bind address {:?}: {}", options.bind, e))?;
    let registry = Arc::new(prepare_registry(options)?);
    info!("Registry ready with {} entries", registry.len());

    SyncServer::new(registry, ServerConfig::new(bind)).run()?;
    Ok(())
}

/// Builds the registry: credentials first, then ini files in order.
pub fn prepare_registry(options: &ServeOptions) -> Result<Registry, Box<dyn std::error::Error>> {
    let registry = Registry::new();

    for spec in &options.users {
        let (user, password) = parse_user(spec)?;
        provision_user(&registry, user, password)?;
    }
    for client in &options.clients {
        provision_client(&registry, client)?;
    }
    for path in &options.opt_files {
        registry
            .load_file(path)
            .map_err(|e| format!("Failed to load {}: {}", path.display(), e))?;
    }

    if options.users.is_empty() && options.opt_files.is_empty() {
        warn!("No users provisioned; every handshake will be refused");
    }
    Ok(registry)
}

fn parse_user(spec: &str) -> Result<(&str, &str), String> {
    match spec.split_once(':') {
        Some((user, password)) if !user.is_empty() => Ok((user, password)),
        _ => Err(format!("Expected NAME:PASSWORD, got {spec:?}")),
    }
}
