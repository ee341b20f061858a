#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use kiln::config::ServerConfig;
use kiln::server::HttpServer;
use kiln::server::events::EventNotifier;
use kiln::transport::{RecvOutcome, SocketId, Transport};
use kiln::{HttpServerError, Result};

#[derive(Default)]
struct Peer {
    inbound: VecDeque<Vec<u8>>,
    outbound: Vec<u8>,
    closed_by_peer: bool,
    closed_by_server: bool,
}

/// In-process transport: tests play the client side.
#[derive(Default)]
pub struct MemoryTransport {
    notifier: Mutex<Option<EventNotifier>>,
    pending: Mutex<VecDeque<SocketId>>,
    peers: Mutex<HashMap<SocketId, Peer>>,
    next_id: AtomicU64,
    pub accept_calls: AtomicUsize,
    /// Number of upcoming sends that stall before being recorded.
    pub slow_sends: AtomicUsize,
}

impl MemoryTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn notifier(&self) -> EventNotifier {
        self.notifier
            .lock()
            .unwrap()
            .clone()
            .expect("transport not started")
    }

    /// A client connects; returns the id the server will see once accepted.
    pub fn connect(&self) -> SocketId {
        let id = SocketId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.peers.lock().unwrap().insert(id, Peer::default());
        self.pending.lock().unwrap().push_back(id);
        self.notifier().connection_pending();
        id
    }

    /// The client sends one frame.
    pub fn send(&self, socket: SocketId, frame: &[u8]) {
        self.peers
            .lock()
            .unwrap()
            .get_mut(&socket)
            .expect("unknown socket")
            .inbound
            .push_back(frame.to_vec());
        self.notifier().packet_received(socket);
    }

    /// The client hangs up.
    pub fn close(&self, socket: SocketId) {
        if let Some(peer) = self.peers.lock().unwrap().get_mut(&socket) {
            peer.closed_by_peer = true;
        }
        self.notifier().packet_received(socket);
    }

    /// Everything the server wrote to `socket` so far.
    pub fn output(&self, socket: SocketId) -> Vec<u8> {
        self.peers
            .lock()
            .unwrap()
            .get(&socket)
            .map(|peer| peer.outbound.clone())
            .unwrap_or_default()
    }

    pub fn output_text(&self, socket: SocketId) -> String {
        String::from_utf8_lossy(&self.output(socket)).into_owned()
    }

    pub fn closed_by_server(&self, socket: SocketId) -> bool {
        self.peers
            .lock()
            .unwrap()
            .get(&socket)
            .is_some_and(|peer| peer.closed_by_server)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

impl Transport for MemoryTransport {
    fn start(&self, notifier: EventNotifier) -> Result<()> {
        *self.notifier.lock().unwrap() = Some(notifier);
        Ok(())
    }

    fn accept(&self) -> Result<SocketId> {
        self.accept_calls.fetch_add(1, Ordering::SeqCst);
        self.pending
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(HttpServerError::NotFound)
    }

    fn watch(&self, _socket: SocketId) -> Result<()> {
        Ok(())
    }

    fn recv(&self, socket: SocketId, buf: &mut [u8]) -> RecvOutcome {
        let mut peers = self.peers.lock().unwrap();
        let Some(peer) = peers.get_mut(&socket) else {
            return RecvOutcome::Closed;
        };
        match peer.inbound.pop_front() {
            Some(mut frame) => {
                if frame.len() > buf.len() {
                    let rest = frame.split_off(buf.len());
                    peer.inbound.push_front(rest);
                }
                buf[..frame.len()].copy_from_slice(&frame);
                RecvOutcome::Data(frame.len())
            }
            None if peer.closed_by_peer => RecvOutcome::Closed,
            None => RecvOutcome::NoData,
        }
    }

    fn send(&self, socket: SocketId, data: &[u8]) -> Result<()> {
        let slow = self
            .slow_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if slow {
            std::thread::sleep(Duration::from_millis(100));
        }
        let mut peers = self.peers.lock().unwrap();
        let peer = peers.get_mut(&socket).ok_or(HttpServerError::NotFound)?;
        peer.outbound.extend_from_slice(data);
        Ok(())
    }

    fn disconnect(&self, socket: SocketId) {
        if let Some(peer) = self.peers.lock().unwrap().get_mut(&socket) {
            peer.closed_by_server = true;
        }
    }

    fn stop(&self) {
        self.notifier.lock().unwrap().take();
    }
}

/// Polls `cond` until it holds or five seconds pass.
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        max_connections: 2,
        ..ServerConfig::default()
    }
}

pub fn server_with(transport: &Arc<MemoryTransport>, config: ServerConfig) -> HttpServer {
    HttpServer::new(config, transport.clone())
}

/// Connects a client and waits until the server has admitted it.
pub fn connect_and_wait(transport: &MemoryTransport, server: &HttpServer) -> SocketId {
    let before = server.active_connections();
    let socket = transport.connect();
    assert!(
        wait_until(|| server.active_connections() > before),
        "connection was not admitted"
    );
    socket
}
