//! Get command implementation.

use optbus_client::{ClientConfig, SyncClient};
use serde::Serialize;

/// One line of get output.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct GetResult {
    /// Entry path.
    pub path: String,
    /// Value in text form, if the read succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Server status message, if the read failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs the get command.
pub fn run(
    config: ClientConfig,
    paths: &[String],
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = SyncClient::connect(config, None)?;
    let results: Vec<GetResult> = paths
        .iter()
        .map(|path| match client.get(path) {
            Ok(value) => GetResult {
                path: path.clone(),
                value: Some(value),
                error: None,
            },
            Err(err) => GetResult {
                path: path.clone(),
                value: None,
                error: Some(err.to_string()),
            },
        })
        .collect();
    client.disconnect()?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&results)?),
        _ => print!("{}", render_text(&results)),
    }

    if results.iter().any(|r| r.error.is_some()) {
        return Err("Some entries could not be read".into());
    }
    Ok(())
}

fn render_text(results: &[GetResult]) -> String {
    let mut out = String::new();
    for result in results {
        match (&result.value, &result.error) {
            (Some(value), _) => out.push_str(&format!("{}={}\n", result.path, value)),
            (None, Some(error)) => out.push_str(&format!("{}: {}\n", result.path, error)),
            (None, None) => {}
        }
    }
    out
}
