//! Main sync server.
//!
//! One dedicated thread runs a single-threaded tokio runtime. The accept
//! loop performs each handshake inline; command channels are then served by
//! tasks on the same runtime, one frame at a time. Watch channels are handed
//! back to blocking std sockets and only written to by remote watches.

use crate::auth::check_credentials;
use crate::config::ServerConfig;
use crate::connection::{configure_watch_socket, Connection, ConnectionTable};
use crate::error::{ServerError, ServerResult};
use crate::handler::CommandHandler;
use optbus_core::Registry;
use optbus_protocol::{
    encode_frame, format_bad_greeting, format_handshake_ack, prompt_for, ChannelMode,
    FrameDecoder, Greeting, Handshake, BARE_PROMPT, CRLF, HELP_TEXT,
};
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// How long a bare line may wait for a NUL before it counts as a frame.
const LINE_GRACE: Duration = Duration::from_millis(50);

/// The sync server.
///
/// # Example
///
/// ```no_run
/// use optbus_core::Registry;
/// use optbus_server::{ServerConfig, SyncServer};
/// use std::sync::Arc;
///
/// let registry = Arc::new(Registry::new());
/// let handle = SyncServer::new(registry, ServerConfig::default().with_port(0))
///     .start()
///     .unwrap();
/// println!("listening on {}", handle.local_addr());
/// handle.shutdown();
/// ```
pub struct SyncServer {
    registry: Arc<Registry>,
    config: ServerConfig,
    table: Arc<ConnectionTable>,
}

impl SyncServer {
    /// Creates a server for `registry`.
    pub fn new(registry: Arc<Registry>, config: ServerConfig) -> Self {
        let table = Arc::new(ConnectionTable::new(config.max_connections));
        Self {
            registry,
            config,
            table,
        }
    }

    /// The connection table.
    pub fn connections(&self) -> &Arc<ConnectionTable> {
        &self.table
    }

    /// Binds the listener and starts the reactor thread.
    pub fn start(self) -> ServerResult<ServerHandle> {
        let listener = std::net::TcpListener::bind(self.config.bind_addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let shutdown = Arc::new(Notify::new());
        let stop = Arc::clone(&shutdown);
        let table = Arc::clone(&self.table);

        let thread = std::thread::Builder::new()
            .name("optbus-reactor".into())
            .spawn(move || {
                let reactor = Reactor {
                    handler: Arc::new(CommandHandler::new(
                        Arc::clone(&self.registry),
                        Arc::clone(&self.table),
                    )),
                    registry: self.registry,
                    config: self.config,
                    table: self.table,
                };
                runtime.block_on(async move {
                    match TcpListener::from_std(listener) {
                        Ok(listener) => reactor.run(listener, stop).await,
                        Err(err) => error!("Failed to register listener: {}", err),
                    }
                });
            })?;

        info!("Sync server listening on {}", local_addr);
        Ok(ServerHandle {
            local_addr,
            shutdown,
            table,
            thread: Some(thread),
        })
    }

    /// Runs the server on a background thread and waits for it to stop.
    pub fn run(self) -> ServerResult<()> {
        self.start()?.wait()
    }
}

/// Handle to a running server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Arc<Notify>,
    table: Arc<ConnectionTable>,
    thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of connection records.
    pub fn connection_count(&self) -> usize {
        self.table.len()
    }

    /// Stops the reactor, closes every connection and joins the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    /// Blocks until the reactor thread exits.
    pub fn wait(mut self) -> ServerResult<()> {
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| ServerError::Internal("reactor thread panicked".into())),
            None => Ok(()),
        }
    }

    fn stop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.shutdown.notify_one();
            if thread.join().is_err() {
                error!("Reactor thread panicked");
            }
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Reactor {
    registry: Arc<Registry>,
    config: ServerConfig,
    table: Arc<ConnectionTable>,
    handler: Arc<CommandHandler>,
}

impl Reactor {
    async fn run(&self, listener: TcpListener, shutdown: Arc<Notify>) {
        loop {
            tokio::select! {
                _ = shutdown.notified() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!("Accepted {}", peer);
                        if let Err(err) = self.admit(stream).await {
                            if err.is_client_error() {
                                debug!("Rejected {}: {}", peer, err);
                            } else {
                                warn!("Rejected {}: {}", peer, err);
                            }
                        }
                    }
                    Err(err) => warn!("Accept failed: {}", err),
                },
            }
        }
        info!("Sync server stopping");
        self.table.teardown_all(&self.registry);
    }

    /// Runs the handshake and attaches the socket to its connection.
    ///
    /// Any error drops the socket without a reply.
    async fn admit(&self, mut stream: TcpStream) -> ServerResult<()> {
        stream.set_nodelay(true)?;
        let mut decoder = FrameDecoder::with_max_frame(self.config.max_frame);
        let handshake = self.handshake(&mut stream, &mut decoder).await?;
        check_credentials(&self.registry, &handshake)?;

        let ack = format_handshake_ack(&prompt_for(&handshake.client));
        match handshake.mode {
            ChannelMode::Command => {
                let conn = self.table.attach(
                    &self.registry,
                    &handshake.connection_hash,
                    &handshake.client,
                    ChannelMode::Command,
                    None,
                )?;
                if let Err(err) = self.write(&mut stream, &ack).await {
                    self.table.teardown(&self.registry, conn.hash());
                    return Err(err);
                }
                let handler = Arc::clone(&self.handler);
                let table = Arc::clone(&self.table);
                tokio::spawn(serve_commands(handler, table, conn, stream, decoder));
            }
            ChannelMode::Watch => {
                let socket = stream.into_std()?;
                configure_watch_socket(
                    &socket,
                    self.config.io_timeout,
                    self.config.watch_ack_timeout,
                )?;
                let mut writer = socket.try_clone()?;
                let conn = self.table.attach(
                    &self.registry,
                    &handshake.connection_hash,
                    &handshake.client,
                    ChannelMode::Watch,
                    Some(socket),
                )?;
                if let Err(err) = writer.write_all(&encode_frame(&ack)) {
                    self.table.teardown(&self.registry, conn.hash());
                    return Err(err.into());
                }
            }
        }
        Ok(())
    }

    async fn handshake(
        &self,
        stream: &mut TcpStream,
        decoder: &mut FrameDecoder,
    ) -> ServerResult<Handshake> {
        for _ in 0..self.config.handshake_attempts {
            let frame = timeout(self.config.io_timeout, read_frame(stream, decoder))
                .await
                .map_err(|_| ServerError::Timeout("handshake".into()))??;
            match Greeting::parse(&frame) {
                Greeting::Hey(handshake) => return Ok(handshake),
                Greeting::Empty => self.write(stream, BARE_PROMPT).await?,
                Greeting::Help => {
                    self.write(stream, &format!("{HELP_TEXT}{CRLF}{BARE_PROMPT}"))
                        .await?
                }
                Greeting::Unknown(command) => {
                    self.write(stream, &format_bad_greeting(&command)).await?
                }
            }
        }
        Err(ServerError::Handshake(format!(
            "no valid handshake after {} attempts",
            self.config.handshake_attempts
        )))
    }

    async fn write(&self, stream: &mut TcpStream, text: &str) -> ServerResult<()> {
        timeout(self.config.io_timeout, stream.write_all(&encode_frame(text)))
            .await
            .map_err(|_| ServerError::Timeout("write".into()))?
            .map_err(ServerError::from)
    }
}

async fn read_frame(stream: &mut TcpStream, decoder: &mut FrameDecoder) -> ServerResult<String> {
    let mut buf = [0u8; 4096];
    loop {
        if let Some(frame) = decoder.next_frame()? {
            return Ok(frame);
        }
        let n = if decoder.pending_line() {
            match timeout(LINE_GRACE, stream.read(&mut buf)).await {
                Ok(read) => read?,
                Err(_) => match decoder.take_line()? {
                    Some(frame) => return Ok(frame),
                    None => continue,
                },
            }
        } else {
            stream.read(&mut buf).await?
        };
        if n == 0 {
            return Err(ServerError::ConnectionClosed);
        }
        decoder.extend(&buf[..n]);
    }
}

async fn serve_commands(
    handler: Arc<CommandHandler>,
    table: Arc<ConnectionTable>,
    conn: Arc<Connection>,
    mut stream: TcpStream,
    mut decoder: FrameDecoder,
) {
    debug!("Serving command channel of {}", conn.hash());
    loop {
        let frame = tokio::select! {
            _ = conn.closed() => break,
            frame = read_frame(&mut stream, &mut decoder) => frame,
        };
        let frame = match frame {
            Ok(frame) => frame,
            Err(ServerError::ConnectionClosed) => break,
            Err(err) => {
                debug!("Command channel of {} failed: {}", conn.hash(), err);
                break;
            }
        };

        let outcome = handler.handle(&conn, &frame);
        if let Err(err) = stream.write_all(&encode_frame(&outcome.reply)).await {
            debug!("Reply to {} failed: {}", conn.hash(), err);
            break;
        }
        if outcome.close {
            break;
        }
    }
    table.teardown(handler.registry(), conn.hash());
}
