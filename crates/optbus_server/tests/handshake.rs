//! Raw-socket tests of the handshake and command channel.

use optbus_core::builtin::{DIAG_LIST, RPC_COMMAND_CONNECT, RPC_COMMAND_DISCONNECT};
use optbus_core::Registry;
use optbus_protocol::{encode_frame, FrameDecoder};
use optbus_server::{provision_client, provision_user, ServerConfig, ServerHandle, SyncServer};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn start() -> (Arc<Registry>, ServerHandle) {
    let registry = Arc::new(Registry::new());
    provision_client(&registry, "tool").unwrap();
    provision_user(&registry, "admin", "secret").unwrap();
    let config = ServerConfig::default()
        .with_port(0)
        .with_io_timeout(Duration::from_secs(2));
    let handle = SyncServer::new(Arc::clone(&registry), config)
        .start()
        .unwrap();
    (registry, handle)
}

struct Peer {
    stream: TcpStream,
    decoder: FrameDecoder,
}

impl Peer {
    fn connect(handle: &ServerHandle) -> Self {
        let stream = TcpStream::connect(handle.local_addr()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        Self {
            stream,
            decoder: FrameDecoder::new(),
        }
    }

    fn send(&mut self, text: &str) {
        self.stream.write_all(&encode_frame(text)).unwrap();
    }

    /// Writes `text` as typed at a terminal, with no terminator.
    fn send_line(&mut self, text: &str) {
        self.stream.write_all(text.as_bytes()).unwrap();
    }

    /// Next frame, or `None` once the server closed the socket.
    fn recv(&mut self) -> Option<String> {
        let mut buf = [0u8; 4096];
        loop {
            if let Some(frame) = self.decoder.next_frame().unwrap() {
                return Some(frame);
            }
            match self.stream.read(&mut buf) {
                Ok(0) | Err(_) => return None,
                Ok(n) => self.decoder.extend(&buf[..n]),
            }
        }
    }
}

fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn handshake_then_commands() {
    let (registry, handle) = start();
    let mut peer = Peer::connect(&handle);

    peer.send("hey o tool h-1 admin secret\r\n");
    assert_eq!(peer.recv().unwrap(), "0 OK\r\n10\r\n(tool)$ ");
    assert_eq!(registry.get_str(RPC_COMMAND_CONNECT).unwrap(), "h-1");

    peer.send(&format!("og {DIAG_LIST}\r\n"));
    let reply = peer.recv().unwrap();
    assert!(reply.starts_with("0 OK\r\n"));
    assert!(reply.contains(DIAG_LIST));
    assert!(reply.ends_with("\r\n(tool)$ "));

    peer.send("bye\r\n");
    assert_eq!(peer.recv().unwrap(), "0 OK\r\n\r\n(tool)$ ");
    assert_eq!(peer.recv(), None);

    wait_for(|| registry.get_str(RPC_COMMAND_DISCONNECT).unwrap() == "h-1");
    assert_eq!(handle.connection_count(), 0);
    handle.shutdown();
}

#[test]
fn bare_lines_from_a_terminal() {
    let (registry, handle) = start();
    registry.register_default("s:/term/name").unwrap();
    let mut peer = Peer::connect(&handle);

    peer.send_line("hey o tool h-t admin secret\r\n");
    assert_eq!(peer.recv().unwrap(), "0 OK\r\n10\r\n(tool)$ ");

    peer.send_line("os s:/term/name=typed\r\n");
    assert_eq!(peer.recv().unwrap(), "0 OK\r\n\r\n(tool)$ ");
    assert_eq!(registry.get_str("s:/term/name").unwrap(), "typed");

    peer.send_line("og s:/term/name\r\n");
    assert_eq!(peer.recv().unwrap(), "0 OK\r\ntyped\r\n(tool)$ ");
    handle.shutdown();
}

#[test]
fn greetings_before_handshake() {
    let (_registry, handle) = start();
    let mut peer = Peer::connect(&handle);

    peer.send("");
    assert_eq!(peer.recv().unwrap(), "$ ");
    peer.send("help");
    assert!(peer.recv().unwrap().starts_with("help(), hey("));
    peer.send("og s:/x");
    assert_eq!(peer.recv().unwrap(), "og: bad command\r\n$ ");

    // Three frames used up the attempts.
    assert_eq!(peer.recv(), None);
}

#[test]
fn wrong_password_closes_silently() {
    let (_registry, handle) = start();
    let mut peer = Peer::connect(&handle);

    peer.send("hey o tool h-2 admin wrong\r\n");
    assert_eq!(peer.recv(), None);
    assert_eq!(handle.connection_count(), 0);
}

#[test]
fn disabled_client_closes_silently() {
    let (_registry, handle) = start();
    let mut peer = Peer::connect(&handle);

    peer.send("hey o stranger h-3 admin secret\r\n");
    assert_eq!(peer.recv(), None);
}

#[test]
fn second_command_socket_is_refused() {
    let (_registry, handle) = start();
    let mut first = Peer::connect(&handle);
    first.send("hey o tool h-4 admin secret");
    assert!(first.recv().unwrap().starts_with("0 OK"));

    let mut second = Peer::connect(&handle);
    second.send("hey o tool h-4 admin secret");
    assert_eq!(second.recv(), None);

    first.send("og i:/k/opt/session/done");
    assert!(first.recv().unwrap().starts_with("0 OK\r\n"));
}

#[test]
fn shutdown_closes_clients() {
    let (_registry, handle) = start();
    let mut peer = Peer::connect(&handle);
    peer.send("hey o tool h-5 admin secret");
    assert!(peer.recv().is_some());

    handle.shutdown();
    assert_eq!(peer.recv(), None);
}
