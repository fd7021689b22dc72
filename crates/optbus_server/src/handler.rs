//! Command channel request handling.
//!
//! The handler is synchronous: one frame in, one reply out. Remote watch
//! notifications it installs run inside whatever thread sets the entry.

use crate::connection::{Connection, ConnectionTable};
use optbus_core::{OptError, Registry, WatchCallback, WatchEvent, WatchPhase};
use optbus_protocol::{format_reply, Command, Status, WatchNotice, CRLF, HELP_TEXT};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Reply to one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerOutcome {
    /// Full reply text, prompt included.
    pub reply: String,
    /// Whether the connection should be closed after the reply.
    pub close: bool,
}

/// Executes command channel requests against the registry.
pub struct CommandHandler {
    registry: Arc<Registry>,
    table: Arc<ConnectionTable>,
}

impl CommandHandler {
    /// Creates a new command handler.
    pub fn new(registry: Arc<Registry>, table: Arc<ConnectionTable>) -> Self {
        Self { registry, table }
    }

    /// The registry commands run against.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Handles one frame received on `conn`'s command channel.
    pub fn handle(&self, conn: &Arc<Connection>, frame: &str) -> HandlerOutcome {
        let command = Command::parse(frame);
        debug!("{} <- {}", conn.hash(), command.name());

        let (status, payload, close) = match command {
            Command::WatchAdd(path) => (Status::from_result(&self.watch_add(conn, &path)), String::new(), false),
            Command::WatchDelete(path) => {
                (Status::from_result(&self.watch_delete(conn, &path)), String::new(), false)
            }
            Command::Set(ini) => (
                Status::from_result(&self.registry.set_batch(&ini, false)),
                String::new(),
                false,
            ),
            Command::Get(path) => match self.registry.get_ini(&path) {
                Ok(text) => (Status::ok(), text, false),
                Err(err) => (Status::from_error(&err), String::new(), false),
            },
            Command::Bye => (Status::ok(), String::new(), true),
            Command::Help => (Status::ok(), HELP_TEXT.to_string(), false),
            Command::Unknown(text) => {
                let err = OptError::nothing_done(text);
                (Status::from_error(&err), String::new(), false)
            }
        };

        if !status.is_ok() {
            debug!("{} -> {}", conn.hash(), status.to_line().trim_end_matches(CRLF));
        }
        HandlerOutcome {
            reply: format_reply(&status, &payload, conn.prompt()),
            close,
        }
    }

    fn watch_add(&self, conn: &Arc<Connection>, path: &str) -> Result<(), OptError> {
        if !conn.has_watch_channel() {
            return Err(OptError::generic(format!(
                "connection {} has no watch channel",
                conn.hash()
            )));
        }
        if conn.is_watching(path) {
            return Err(OptError::already_exists(path));
        }
        let callback = Arc::new(RemoteWatch {
            conn: Arc::downgrade(conn),
            table: Arc::clone(&self.table),
        });
        let handle = self.registry.watch_with(path, WatchPhase::After, callback)?;
        conn.add_remote_watch(handle);
        Ok(())
    }

    fn watch_delete(&self, conn: &Connection, path: &str) -> Result<(), OptError> {
        let handle = conn
            .take_remote_watch(path)
            .ok_or_else(|| OptError::not_found(path))?;
        self.registry.unwatch(&handle)
    }
}

/// Forwards sets of one path to a client's watch channel.
struct RemoteWatch {
    conn: Weak<Connection>,
    table: Arc<ConnectionTable>,
}

impl WatchCallback for RemoteWatch {
    fn notify(&self, event: &WatchEvent<'_>) {
        let Some(conn) = self.conn.upgrade() else {
            return;
        };
        let value = match event.registry().get_ini(event.path()) {
            Ok(value) => value,
            Err(err) => {
                debug!("Not forwarding {}: {}", event.path(), err);
                return;
            }
        };
        if let Err(err) = conn.push_notice(&WatchNotice::new(event.path(), value)) {
            warn!(
                "Watch delivery to {} failed, closing connection: {}",
                conn.hash(),
                err
            );
            self.table.teardown(event.registry(), conn.hash());
        }
    }
}
