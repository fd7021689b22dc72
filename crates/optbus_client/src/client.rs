//! The sync client.

use crate::channel::FramedStream;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::hash::connection_hash;
use crate::watch::{self, WatchHandler};
use optbus_core::ini::{decode_hex, parse_value};
use optbus_core::{OptError, Value, ValueType};
use optbus_protocol::{
    parse_handshake_ack, prompt_for, ChannelMode, Command, Handshake, Reply,
};
use parking_lot::Mutex;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// A connection to a sync server.
///
/// Every request sends one command and blocks for its reply. The client is
/// `Sync`; concurrent requests are serialized on the command channel.
///
/// # Example
///
/// ```no_run
/// use optbus_client::{ClientConfig, ClientWatchEvent, SyncClient};
///
/// let config = ClientConfig::new("127.0.0.1", 9000).with_credentials("admin", "secret");
/// let client = SyncClient::connect(
///     config,
///     Some(Box::new(|event: ClientWatchEvent| println!("{event:?}"))),
/// )?;
/// client.watch("s:/app/mode")?;
/// client.set("s:/app/mode", "active")?;
/// println!("{}", client.get("s:/app/mode")?);
/// client.disconnect()?;
/// # Ok::<(), optbus_client::ClientError>(())
/// ```
pub struct SyncClient {
    hash: String,
    prompt: String,
    command: Mutex<Option<FramedStream>>,
    watch: Mutex<Option<WatchThread>>,
    last_error: Mutex<String>,
}

struct WatchThread {
    socket: TcpStream,
    quit: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl SyncClient {
    /// Connects the command channel and, with a handler, the watch channel.
    pub fn connect(config: ClientConfig, on_watch: Option<WatchHandler>) -> ClientResult<Self> {
        let hash = connection_hash();
        let command = open_channel(&config, &hash, ChannelMode::Command)?;
        let watch = match on_watch {
            Some(handler) => Some(start_watch(&config, &hash, handler)?),
            None => None,
        };
        info!(
            "Connected to {}:{} as {} ({})",
            config.server, config.port, config.client_name, hash
        );

        Ok(Self {
            prompt: prompt_for(&config.client_name),
            hash,
            command: Mutex::new(Some(command)),
            watch: Mutex::new(watch),
            last_error: Mutex::new(String::new()),
        })
    }

    /// The hash identifying this connection on the server.
    pub fn connection_hash(&self) -> &str {
        &self.hash
    }

    /// True while the watch thread is running.
    pub fn has_watch_channel(&self) -> bool {
        self.watch
            .lock()
            .as_ref()
            .is_some_and(|watch| !watch.thread.is_finished())
    }

    /// Status message of the last reply, e.g. `OK` or `NOT FOUND: ...`.
    pub fn last_error(&self) -> String {
        self.last_error.lock().clone()
    }

    /// Reads an entry in its text form.
    pub fn get(&self, path: &str) -> ClientResult<String> {
        self.request(Command::Get(path.to_string()))
    }

    /// Reads an int, bool or event entry.
    pub fn get_int(&self, path: &str) -> ClientResult<i64> {
        match parse_value(ValueType::Int, &self.get(path)?)? {
            Value::Int(value) => Ok(value),
            other => Err(unexpected(path, &other)),
        }
    }

    /// Reads a string entry.
    pub fn get_str(&self, path: &str) -> ClientResult<String> {
        self.get(path)
    }

    /// Reads an array entry.
    pub fn get_array(&self, path: &str) -> ClientResult<Vec<String>> {
        match parse_value(ValueType::Array, &self.get(path)?)? {
            Value::Array(items) => Ok(items),
            other => Err(unexpected(path, &other)),
        }
    }

    /// Reads a blob entry.
    pub fn get_blob(&self, path: &str) -> ClientResult<Vec<u8>> {
        Ok(decode_hex(&self.get(path)?)?)
    }

    /// Sets one entry from its text form.
    pub fn set(&self, path: &str, value: &str) -> ClientResult<()> {
        self.set_batch(&format!("{path}={value}"))
    }

    /// Applies `key=value` lines in one server-side session.
    pub fn set_batch(&self, ini: &str) -> ClientResult<()> {
        self.request(Command::Set(ini.to_string())).map(|_| ())
    }

    /// Forwards sets of `path` to the watch handler.
    pub fn watch(&self, path: &str) -> ClientResult<()> {
        self.request(Command::WatchAdd(path.to_string())).map(|_| ())
    }

    /// Stops forwarding `path`.
    pub fn unwatch(&self, path: &str) -> ClientResult<()> {
        self.request(Command::WatchDelete(path.to_string()))
            .map(|_| ())
    }

    /// The server's command summary.
    pub fn help(&self) -> ClientResult<String> {
        self.request(Command::Help)
    }

    /// Says `bye`, closes both sockets and joins the watch thread.
    ///
    /// Calling it again is a no-op.
    pub fn disconnect(&self) -> ClientResult<()> {
        let watch = self.watch.lock().take();
        if let Some(watch) = &watch {
            watch.quit.store(true, Ordering::Release);
        }

        let command = self.command.lock().take();
        let mut result = Ok(());
        if let Some(mut command) = command {
            result = command.send(&Command::Bye.to_line());
            if result.is_ok() {
                // The reply only confirms the close.
                let _ = command.recv();
            }
            command.shutdown();
        }

        if let Some(watch) = watch {
            let _ = watch.socket.shutdown(std::net::Shutdown::Both);
            if watch.thread.join().is_err() {
                warn!("Watch handler panicked");
            }
        }
        debug!("Disconnected {}", self.hash);
        result
    }

    fn request(&self, command: Command) -> ClientResult<String> {
        let mut guard = self.command.lock();
        let channel = guard.as_mut().ok_or(ClientError::Closed)?;
        let exchanged = channel
            .send(&command.to_line())
            .and_then(|()| channel.expect_frame());
        let text = match exchanged {
            Ok(text) => text,
            Err(err) => {
                // A late reply would answer the next request, so the
                // channel is unusable from here on.
                if let Some(channel) = guard.take() {
                    channel.shutdown();
                }
                warn!("Command channel of {} dropped: {}", self.hash, err);
                return Err(err);
            }
        };
        drop(guard);

        let reply = Reply::parse(&text, &self.prompt)?;
        *self.last_error.lock() = reply.message.clone();
        if reply.is_ok() {
            Ok(reply.payload)
        } else {
            debug!("{} failed: {}", command.name(), reply.message);
            Err(ClientError::Remote {
                code: reply.code,
                message: reply.message,
            })
        }
    }
}

impl Drop for SyncClient {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}

impl std::fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("hash", &self.hash)
            .field("connected", &self.command.lock().is_some())
            .field("watch", &self.has_watch_channel())
            .finish()
    }
}

fn unexpected(path: &str, value: &Value) -> ClientError {
    ClientError::Value(OptError::bad_type(format!(
        "{path} returned {} value",
        value.kind()
    )))
}

fn open_channel(config: &ClientConfig, hash: &str, mode: ChannelMode) -> ClientResult<FramedStream> {
    let addrs = (config.server.as_str(), config.port)
        .to_socket_addrs()
        .map_err(|e| ClientError::ConnectFailed(format!("{}: {}", config.server, e)))?;

    let mut last_error = None;
    let mut stream = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, config.io_timeout) {
            Ok(s) => {
                stream = Some(s);
                break;
            }
            Err(e) => last_error = Some(e),
        }
    }
    let stream = stream.ok_or_else(|| {
        ClientError::ConnectFailed(match last_error {
            Some(e) => format!("{}:{}: {}", config.server, config.port, e),
            None => format!("{} did not resolve", config.server),
        })
    })?;
    stream.set_nodelay(true)?;
    stream.set_read_timeout(Some(config.io_timeout))?;
    stream.set_write_timeout(Some(config.io_timeout))?;

    let mut channel = FramedStream::new(stream);
    let handshake = Handshake {
        mode,
        client: config.client_name.clone(),
        connection_hash: hash.to_string(),
        user: config.user.clone(),
        password: config.password.clone(),
    };
    channel.send(&handshake.to_line())?;
    let ack = channel
        .expect_frame()
        .map_err(|e| ClientError::ConnectFailed(format!("handshake ({mode}) refused: {e}")))?;
    parse_handshake_ack(&ack).map_err(|e| ClientError::ConnectFailed(e.to_string()))?;
    Ok(channel)
}

fn start_watch(config: &ClientConfig, hash: &str, handler: WatchHandler) -> ClientResult<WatchThread> {
    let channel = open_channel(config, hash, ChannelMode::Watch)?;
    let socket = channel.try_clone_stream()?;
    let quit = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&quit);
    let thread = std::thread::Builder::new()
        .name("optbus-watch".into())
        .spawn(move || watch::run(channel, handler, flag))?;
    Ok(WatchThread {
        socket,
        quit,
        thread,
    })
}
