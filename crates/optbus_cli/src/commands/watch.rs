//! Watch command implementation.

use optbus_client::{ClientConfig, ClientWatchEvent, SyncClient};
use serde::Serialize;
use std::sync::mpsc;

#[derive(Debug, Serialize)]
struct Change<'a> {
    path: &'a str,
    value: &'a str,
}

/// Prints changes of `paths` until `count` arrived or the server closes.
pub fn run(
    config: ClientConfig,
    paths: &[String],
    count: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let (tx, rx) = mpsc::channel();
    let client = SyncClient::connect(
        config,
        Some(Box::new(move |event: ClientWatchEvent| {
            let _ = tx.send(event);
        })),
    )?;
    for path in paths {
        client.watch(path)?;
    }

    let mut seen = 0;
    let mut server_closed = false;
    while count.map_or(true, |limit| seen < limit) {
        match rx.recv() {
            Ok(ClientWatchEvent::Changed { path, value }) => {
                println!("{}", render(&path, &value, format)?);
                seen += 1;
            }
            Ok(ClientWatchEvent::Closed) | Err(_) => {
                server_closed = true;
                break;
            }
        }
    }

    // The server may already have dropped the command channel too.
    match client.disconnect() {
        Err(_) if server_closed => Ok(()),
        other => Ok(other?),
    }
}

fn render(path: &str, value: &str, format: &str) -> Result<String, serde_json::Error> {
    match format {
        "json" => serde_json::to_string(&Change { path, value }),
        _ => Ok(format!("{path}={value}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_lines() {
        assert_eq!(render("s:/x", "on", "text").unwrap(), "s:/x=on");
        assert_eq!(
            render("s:/x", "on", "json").unwrap(),
            r#"{"path":"s:/x","value":"on"}"#
        );
    }
}
