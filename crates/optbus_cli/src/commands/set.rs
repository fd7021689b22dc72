//! Set and batch command implementations.

use optbus_client::{ClientConfig, SyncClient};
use std::path::Path;
use tracing::info;

/// Applies `key=value` assignments in one session.
pub fn run(config: ClientConfig, assignments: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let ini = join_assignments(assignments)?;
    apply(config, &ini)
}

/// Applies the lines of an ini file in one session.
pub fn run_file(config: ClientConfig, file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let ini = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;
    apply(config, &ini)
}

fn apply(config: ClientConfig, ini: &str) -> Result<(), Box<dyn std::error::Error>> {
    let client = SyncClient::connect(config, None)?;
    let result = client.set_batch(ini);
    client.disconnect()?;
    result?;
    info!("Applied {} line(s)", ini.lines().filter(|l| l.contains('=')).count());
    Ok(())
}

fn join_assignments(assignments: &[String]) -> Result<String, String> {
    for assignment in assignments {
        if !assignment.contains('=') {
            return Err(format!("Expected KEY=VALUE, got {assignment:?}"));
        }
        if assignment.contains(['\r', '\n']) {
            return Err(format!("Assignment spans lines: {assignment:?}"));
        }
    }
    Ok(assignments.join("\n"))
}
