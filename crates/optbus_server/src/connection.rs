//! Connection records.
//!
//! A record is keyed by the connection hash the client sends in both of its
//! handshakes, which is how the command and watch sockets are paired.

use crate::error::{ServerError, ServerResult};
use optbus_core::builtin::{
    RPC_COMMAND_CONNECT, RPC_COMMAND_DISCONNECT, RPC_WATCH_CONNECT, RPC_WATCH_DISCONNECT,
};
use optbus_core::{Registry, WatchHandle};
use optbus_protocol::{encode_frame, prompt_for, ChannelMode, FrameDecoder, WatchNotice, BYE};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// One connected client.
pub struct Connection {
    hash: String,
    client: String,
    prompt: String,
    command_attached: AtomicBool,
    watch: Mutex<Option<TcpStream>>,
    remote_watches: Mutex<HashMap<String, WatchHandle>>,
    closed: Notify,
}

impl Connection {
    /// Creates a record with no channel attached.
    pub fn new(hash: impl Into<String>, client: impl Into<String>) -> Self {
        let client = client.into();
        Self {
            hash: hash.into(),
            prompt: prompt_for(&client),
            client,
            command_attached: AtomicBool::new(false),
            watch: Mutex::new(None),
            remote_watches: Mutex::new(HashMap::new()),
            closed: Notify::new(),
        }
    }

    /// The connection hash.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// The client name from the handshake.
    pub fn client(&self) -> &str {
        &self.client
    }

    /// Prompt appended to every reply.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// True once a watch socket is attached.
    pub fn has_watch_channel(&self) -> bool {
        self.watch.lock().is_some()
    }

    /// True if `path` is forwarded to this connection.
    pub fn is_watching(&self, path: &str) -> bool {
        self.remote_watches.lock().contains_key(path)
    }

    /// Paths forwarded to this connection.
    pub fn watched_paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.remote_watches.lock().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub(crate) fn add_remote_watch(&self, handle: WatchHandle) {
        self.remote_watches
            .lock()
            .insert(handle.path().to_string(), handle);
    }

    pub(crate) fn take_remote_watch(&self, path: &str) -> Option<WatchHandle> {
        self.remote_watches.lock().remove(path)
    }

    pub(crate) fn attach_watch_socket(&self, stream: TcpStream) {
        *self.watch.lock() = Some(stream);
    }

    /// Resolves once the connection has been torn down.
    pub(crate) async fn closed(&self) {
        self.closed.notified().await;
    }

    /// Sends a notification and waits for its acknowledgement.
    ///
    /// The watch socket carries the read timeout set when it was attached,
    /// so a silent peer costs at most that long.
    pub(crate) fn push_notice(&self, notice: &WatchNotice) -> ServerResult<()> {
        let mut guard = self.watch.lock();
        let stream = guard.as_mut().ok_or(ServerError::ConnectionClosed)?;

        stream.write_all(&encode_frame(&notice.to_text()))?;
        debug!("Pushed {} to {}", notice.path, self.hash);

        let mut decoder = FrameDecoder::with_max_frame(64);
        let mut buf = [0u8; 64];
        loop {
            let n = match stream.read(&mut buf) {
                Ok(0) => return Err(ServerError::ConnectionClosed),
                Ok(n) => n,
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) =>
                {
                    return Err(ServerError::Timeout(format!(
                        "no acknowledgement for {}",
                        notice.path
                    )))
                }
                Err(e) => return Err(e.into()),
            };
            decoder.extend(&buf[..n]);
            // Terminal peers answer with a bare line.
            if decoder.next_frame()?.is_some() || decoder.pending_line() {
                return Ok(());
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("hash", &self.hash)
            .field("client", &self.client)
            .field("command", &self.command_attached.load(Ordering::Relaxed))
            .field("watch", &self.has_watch_channel())
            .finish()
    }
}

/// All live connection records.
pub struct ConnectionTable {
    connections: Mutex<HashMap<String, Arc<Connection>>>,
    max_connections: usize,
}

impl ConnectionTable {
    /// Creates an empty table.
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            max_connections,
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    /// Returns true if there are no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up a record by hash.
    pub fn get(&self, hash: &str) -> Option<Arc<Connection>> {
        self.connections.lock().get(hash).cloned()
    }

    /// Claims the `mode` slot of the record for `hash`, creating it if needed.
    ///
    /// `watch_socket` is required for [`ChannelMode::Watch`] and ignored
    /// otherwise. A record opened under another client name is refused. On
    /// success the matching `rpc/<mode>/connect` entry is set to the hash.
    pub fn attach(
        &self,
        registry: &Registry,
        hash: &str,
        client: &str,
        mode: ChannelMode,
        watch_socket: Option<TcpStream>,
    ) -> ServerResult<Arc<Connection>> {
        let conn = {
            let mut connections = self.connections.lock();
            if !connections.contains_key(hash) && connections.len() >= self.max_connections {
                return Err(ServerError::TooManyConnections {
                    max: self.max_connections,
                });
            }
            let conn = connections
                .entry(hash.to_string())
                .or_insert_with(|| Arc::new(Connection::new(hash, client)))
                .clone();
            if conn.client() != client {
                return Err(ServerError::AuthenticationFailed(format!(
                    "connection {} belongs to client {}, not {}",
                    hash,
                    conn.client(),
                    client
                )));
            }

            match (mode, watch_socket) {
                (ChannelMode::Command, _) => {
                    if conn.command_attached.swap(true, Ordering::AcqRel) {
                        return Err(busy(hash, mode));
                    }
                }
                (ChannelMode::Watch, Some(stream)) => {
                    let mut slot = conn.watch.lock();
                    if slot.is_some() {
                        return Err(busy(hash, mode));
                    }
                    *slot = Some(stream);
                }
                (ChannelMode::Watch, None) => {
                    return Err(ServerError::Internal("watch channel without socket".into()))
                }
            }
            conn
        };

        let path = match mode {
            ChannelMode::Command => RPC_COMMAND_CONNECT,
            ChannelMode::Watch => RPC_WATCH_CONNECT,
        };
        if let Err(err) = registry.set_str(path, hash) {
            warn!("Failed to publish {} for {}: {}", path, hash, err);
        }
        info!("Client {} attached {} channel ({})", client, mode, hash);
        Ok(conn)
    }

    /// Removes the record and releases everything it holds.
    ///
    /// Remote watches are dropped, the watch socket is closed and the
    /// `rpc/<mode>/disconnect` entries are set. Calling it again is a no-op.
    pub fn teardown(&self, registry: &Registry, hash: &str) {
        let Some(conn) = self.connections.lock().remove(hash) else {
            return;
        };

        let handles: Vec<_> = conn.remote_watches.lock().drain().map(|(_, h)| h).collect();
        for handle in handles {
            if let Err(err) = registry.unwatch(&handle) {
                debug!("Remote watch on {} already gone: {}", handle.path(), err);
            }
        }

        let watch = conn.watch.lock().take();
        if let Some(mut stream) = watch {
            let _ = stream.write_all(&encode_frame(BYE));
            let _ = stream.shutdown(Shutdown::Both);
            if let Err(err) = registry.set_str(RPC_WATCH_DISCONNECT, hash) {
                warn!("Failed to publish watch disconnect for {}: {}", hash, err);
            }
        }

        if conn.command_attached.load(Ordering::Acquire) {
            conn.closed.notify_one();
            if let Err(err) = registry.set_str(RPC_COMMAND_DISCONNECT, hash) {
                warn!("Failed to publish command disconnect for {}: {}", hash, err);
            }
        }

        info!("Client {} disconnected ({})", conn.client, hash);
    }

    /// Tears down every record.
    pub fn teardown_all(&self, registry: &Registry) {
        let hashes: Vec<_> = self.connections.lock().keys().cloned().collect();
        for hash in hashes {
            self.teardown(registry, &hash);
        }
    }
}

fn busy(hash: &str, mode: ChannelMode) -> ServerError {
    ServerError::ChannelBusy {
        hash: hash.to_string(),
        mode: mode.letter(),
    }
}

/// Applies the watch socket timeouts.
pub(crate) fn configure_watch_socket(
    stream: &TcpStream,
    io_timeout: Duration,
    ack_timeout: Duration,
) -> std::io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;
    stream.set_write_timeout(Some(io_timeout))?;
    stream.set_read_timeout(Some(ack_timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        (server, client)
    }

    #[test]
    fn attach_creates_and_pairs() {
        let registry = Registry::new();
        let table = ConnectionTable::new(4);

        let conn = table
            .attach(&registry, "h1", "tool", ChannelMode::Command, None)
            .unwrap();
        assert_eq!(conn.prompt(), "\r\n(tool)$ ");
        assert_eq!(registry.get_str(RPC_COMMAND_CONNECT).unwrap(), "h1");

        let (server, _client) = socket_pair();
        let same = table
            .attach(&registry, "h1", "tool", ChannelMode::Watch, Some(server))
            .unwrap();
        assert!(Arc::ptr_eq(&conn, &same));
        assert!(conn.has_watch_channel());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn taken_slot_is_refused() {
        let registry = Registry::new();
        let table = ConnectionTable::new(4);
        table
            .attach(&registry, "h1", "tool", ChannelMode::Command, None)
            .unwrap();
        let err = table
            .attach(&registry, "h1", "tool", ChannelMode::Command, None)
            .unwrap_err();
        assert!(matches!(err, ServerError::ChannelBusy { mode: 'o', .. }));
    }

    #[test]
    fn channels_of_one_hash_share_the_client() {
        let registry = Registry::new();
        let table = ConnectionTable::new(4);
        table
            .attach(&registry, "h1", "tool", ChannelMode::Command, None)
            .unwrap();

        let (server, _client) = socket_pair();
        let err = table
            .attach(&registry, "h1", "other", ChannelMode::Watch, Some(server))
            .unwrap_err();
        assert!(matches!(err, ServerError::AuthenticationFailed(_)));
        assert!(!table.get("h1").unwrap().has_watch_channel());
    }

    #[test]
    fn table_limit() {
        let registry = Registry::new();
        let table = ConnectionTable::new(1);
        table
            .attach(&registry, "h1", "tool", ChannelMode::Command, None)
            .unwrap();
        let err = table
            .attach(&registry, "h2", "tool", ChannelMode::Command, None)
            .unwrap_err();
        assert!(matches!(err, ServerError::TooManyConnections { max: 1 }));
    }

    #[test]
    fn teardown_releases_everything() {
        let registry = Registry::new();
        registry.register_default("s:/x").unwrap();
        let table = ConnectionTable::new(4);
        let conn = table
            .attach(&registry, "h1", "tool", ChannelMode::Command, None)
            .unwrap();
        let (server, mut client) = socket_pair();
        table
            .attach(&registry, "h1", "tool", ChannelMode::Watch, Some(server))
            .unwrap();
        let handle = registry
            .watch("s:/x", optbus_core::WatchPhase::After, |_: &optbus_core::WatchEvent<'_>| {})
            .unwrap();
        conn.add_remote_watch(handle);

        table.teardown(&registry, "h1");
        assert!(table.is_empty());
        assert_eq!(registry.entry_info("s:/x").unwrap().after_watchers, 0);
        assert_eq!(registry.get_str(RPC_COMMAND_DISCONNECT).unwrap(), "h1");
        assert_eq!(registry.get_str(RPC_WATCH_DISCONNECT).unwrap(), "h1");

        let mut received = Vec::new();
        client.read_to_end(&mut received).unwrap();
        assert_eq!(received, b"bye\0");

        table.teardown(&registry, "h1");
    }

    #[test]
    fn push_waits_for_ack() {
        let conn = Connection::new("h1", "tool");
        let (server, client) = socket_pair();
        configure_watch_socket(&server, Duration::from_secs(5), Duration::from_secs(5)).unwrap();
        conn.attach_watch_socket(server);

        let peer = thread::spawn(move || {
            let mut client = client;
            let mut decoder = FrameDecoder::new();
            let mut buf = [0u8; 128];
            let frame = loop {
                let n = client.read(&mut buf).unwrap();
                decoder.extend(&buf[..n]);
                if let Some(frame) = decoder.next_frame().unwrap() {
                    break frame;
                }
            };
            client.write_all(b"ACK\0").unwrap();
            frame
        });

        conn.push_notice(&WatchNotice::new("s:/x", "hello")).unwrap();
        assert_eq!(peer.join().unwrap(), "wchnotify s:/x\r\nhello");
    }

    #[test]
    fn push_times_out_without_ack() {
        let conn = Connection::new("h1", "tool");
        let (server, _client) = socket_pair();
        configure_watch_socket(&server, Duration::from_secs(1), Duration::from_millis(50))
            .unwrap();
        conn.attach_watch_socket(server);

        let err = conn.push_notice(&WatchNotice::new("s:/x", "1")).unwrap_err();
        assert!(matches!(err, ServerError::Timeout(_)));
    }
}
