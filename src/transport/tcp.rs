//! TCP transport on a private tokio runtime.
//!
//! The runtime only does readiness work: a listener task parks incoming
//! connections until the acceptor claims them, and one watcher task per
//! connection posts a receive event whenever the socket turns readable.
//! Reads and writes are issued synchronously from the engine threads.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::{Handle, Runtime};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::error::{HttpServerError, Result};
use crate::server::events::EventNotifier;
use crate::transport::{RecvOutcome, SocketId, Transport};

/// Connections parked beyond this many are refused.
const MAX_PENDING: usize = 32;
/// Back-off before re-posting a receive event to a full queue.
const REPOST_DELAY: Duration = Duration::from_millis(10);

struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    /// Signalled after every `recv` so the watcher waits for fresh readiness.
    rearm: Notify,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

struct Running {
    runtime: Runtime,
    listener: JoinHandle<()>,
    notifier: EventNotifier,
}

pub struct TcpTransport {
    addr: String,
    local_addr: Mutex<Option<SocketAddr>>,
    running: Mutex<Option<Running>>,
    pending: Arc<Mutex<VecDeque<(TcpStream, SocketAddr)>>>,
    connections: Mutex<HashMap<SocketId, Arc<Connection>>>,
    next_id: AtomicU64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TcpTransport {
    /// A transport that will listen on `addr` (for example `"0.0.0.0:80"`).
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            local_addr: Mutex::new(None),
            running: Mutex::new(None),
            pending: Arc::new(Mutex::new(VecDeque::new())),
            connections: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Address actually bound, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *lock(&self.local_addr)
    }

    fn handle(&self) -> Option<Handle> {
        lock(&self.running)
            .as_ref()
            .map(|running| running.runtime.handle().clone())
    }

    fn connection(&self, socket: SocketId) -> Option<Arc<Connection>> {
        lock(&self.connections).get(&socket).cloned()
    }
}

impl Transport for TcpTransport {
    fn start(&self, notifier: EventNotifier) -> Result<()> {
        let mut running = lock(&self.running);
        if running.is_some() {
            return Err(HttpServerError::AlreadyStarted);
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("kiln-transport")
            .enable_all()
            .build()
            .map_err(HttpServerError::TransportStart)?;

        let std_listener =
            std::net::TcpListener::bind(&self.addr).map_err(HttpServerError::TransportStart)?;
        std_listener
            .set_nonblocking(true)
            .map_err(HttpServerError::TransportStart)?;
        let local = std_listener.local_addr().map_err(HttpServerError::TransportStart)?;

        let listener = {
            let _guard = runtime.enter();
            TcpListener::from_std(std_listener).map_err(HttpServerError::TransportStart)?
        };

        let pending = self.pending.clone();
        let tx = notifier.clone();
        let listener = runtime.spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        let mut queue = lock(&pending);
                        if queue.len() >= MAX_PENDING {
                            tracing::warn!(%peer, "pending backlog full, refusing connection");
                            continue;
                        }
                        queue.push_back((stream, peer));
                        drop(queue);
                        tx.connection_pending();
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "listener accept failed");
                        tokio::time::sleep(REPOST_DELAY).await;
                    }
                }
            }
        });

        tracing::info!(addr = %local, "transport listening");
        *lock(&self.local_addr) = Some(local);
        *running = Some(Running {
            runtime,
            listener,
            notifier,
        });
        Ok(())
    }

    fn accept(&self) -> Result<SocketId> {
        let (stream, peer) = lock(&self.pending)
            .pop_front()
            .ok_or(HttpServerError::NotFound)?;
        let _ = stream.set_nodelay(true);

        let id = SocketId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(socket = %id, %peer, "socket accepted");
        lock(&self.connections).insert(
            id,
            Arc::new(Connection {
                stream,
                peer,
                rearm: Notify::new(),
                watcher: Mutex::new(None),
            }),
        );
        Ok(id)
    }

    fn watch(&self, socket: SocketId) -> Result<()> {
        let conn = self.connection(socket).ok_or(HttpServerError::NotFound)?;
        let (handle, notifier) = {
            let running = lock(&self.running);
            let running = running.as_ref().ok_or(HttpServerError::NotStarted)?;
            (running.runtime.handle().clone(), running.notifier.clone())
        };

        let watched = conn.clone();
        let task = handle.spawn(async move {
            loop {
                if let Err(e) = watched.stream.readable().await {
                    tracing::debug!(socket = %socket, error = %e, "socket readiness failed");
                    notifier.disconnected(socket);
                    break;
                }
                while !notifier.packet_received(socket) {
                    tokio::time::sleep(REPOST_DELAY).await;
                }
                watched.rearm.notified().await;
            }
        });
        *lock(&conn.watcher) = Some(task);
        Ok(())
    }

    fn recv(&self, socket: SocketId, buf: &mut [u8]) -> RecvOutcome {
        let Some(conn) = self.connection(socket) else {
            return RecvOutcome::Closed;
        };

        let outcome = match conn.stream.try_read(buf) {
            Ok(0) => RecvOutcome::Closed,
            Ok(n) => RecvOutcome::Data(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => RecvOutcome::NoData,
            Err(e) => {
                tracing::debug!(socket = %socket, peer = %conn.peer, error = %e, "receive failed");
                RecvOutcome::Closed
            }
        };
        conn.rearm.notify_one();
        outcome
    }

    fn send(&self, socket: SocketId, data: &[u8]) -> Result<()> {
        let conn = self.connection(socket).ok_or(HttpServerError::NotFound)?;
        let handle = self.handle().ok_or(HttpServerError::NotStarted)?;

        let mut written = 0;
        while written < data.len() {
            match conn.stream.try_write(&data[written..]) {
                Ok(0) => {
                    return Err(HttpServerError::Transport(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "connection closed while writing",
                    )));
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    handle.block_on(conn.stream.writable())?;
                }
                Err(e) => return Err(HttpServerError::Transport(e)),
            }
        }
        Ok(())
    }

    fn disconnect(&self, socket: SocketId) {
        let Some(conn) = lock(&self.connections).remove(&socket) else {
            return;
        };
        if let Some(task) = lock(&conn.watcher).take() {
            task.abort();
        }
        tracing::debug!(socket = %socket, peer = %conn.peer, "socket closed");
    }

    fn stop(&self) {
        let Some(running) = lock(&self.running).take() else {
            return;
        };
        running.listener.abort();
        lock(&self.connections).clear();
        lock(&self.pending).clear();
        *lock(&self.local_addr) = None;
        running.runtime.shutdown_background();
        tracing::info!("transport stopped");
    }
}
