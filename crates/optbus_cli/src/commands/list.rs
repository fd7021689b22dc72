//! List and dump command implementations.

use optbus_client::{ClientConfig, SyncClient};
use optbus_core::builtin::{DIAG_DUMP, DIAG_LIST};

/// Prints every path known to the server.
pub fn run(config: ClientConfig, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let client = SyncClient::connect(config, None)?;
    let text = client.get(DIAG_LIST)?;
    client.disconnect()?;

    let paths = split_paths(&text);
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&paths)?),
        _ => {
            for path in &paths {
                println!("{path}");
            }
            println!("\n{} entries", paths.len());
        }
    }
    Ok(())
}

/// Prints the server's diagnostic table.
pub fn run_dump(config: ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let client = SyncClient::connect(config, None)?;
    let text = client.get(DIAG_DUMP)?;
    client.disconnect()?;
    print!("{}", text.replace("\r\n", "\n"));
    Ok(())
}

fn split_paths(text: &str) -> Vec<&str> {
    text.split("\r\n").filter(|line| !line.is_empty()).collect()
}
