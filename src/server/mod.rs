//! Server lifecycle and the two engine threads.
//!
//! ```text
//!   transport ──Connect──▶ [connect queue] ──▶ acceptor ──allocate──▶ pool
//!       │                                          │
//!       └──Receive/Disconnect──▶ [event queue] ◀───┘ (first receive)
//!                                     │
//!                                     ▼
//!                              event dispatcher ──▶ parse ──▶ dispatch ──▶ response
//! ```
//!
//! The acceptor admits connections into the fixed-size stream pool; the
//! event dispatcher reads, parses and answers requests and tears
//! connections down. Both block on bounded queues and exit on `Stop`.

mod acceptor;
mod dispatcher;
pub mod events;
pub mod pool;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::JoinHandle;

use crate::config::ServerConfig;
use crate::error::{HttpServerError, Result};
use crate::http::connection::ConnectionHooks;
use crate::resource::registry::{ResourceContent, ResourceRegistry};
use crate::server::events::EventNotifier;
use crate::server::pool::StreamPool;
use crate::transport::Transport;

/// State shared by the engine threads while the server runs.
pub(crate) struct Engine {
    pub(crate) config: ServerConfig,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) registry: Arc<ResourceRegistry>,
    pub(crate) hooks: Option<Arc<dyn ConnectionHooks>>,
    pub(crate) pool: StreamPool,
    pub(crate) notifier: EventNotifier,
    pub(crate) quit: AtomicBool,
    pub(crate) deferred_accepts: AtomicUsize,
}

struct Running {
    engine: Arc<Engine>,
    acceptor: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

/// An embeddable HTTP/1.1 server.
///
/// Resources are registered while the server is stopped; the registry is
/// read-only while it runs.
///
/// ```no_run
/// use std::sync::Arc;
/// use kiln::config::ServerConfig;
/// use kiln::resource::registry::ResourceContent;
/// use kiln::server::HttpServer;
/// use kiln::transport::tcp::TcpTransport;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ServerConfig::default();
/// let transport = Arc::new(TcpTransport::new(config.listen_addr()));
/// let mut server = HttpServer::new(config, transport);
/// server.register("/index.html", "text/html", ResourceContent::static_bytes(&b"<h1>hi</h1>"[..]))?;
/// server.start()?;
/// # server.stop()?;
/// # Ok(())
/// # }
/// ```
pub struct HttpServer {
    config: ServerConfig,
    transport: Arc<dyn Transport>,
    registry: Arc<ResourceRegistry>,
    hooks: Option<Arc<dyn ConnectionHooks>>,
    running: Option<Running>,
}

impl HttpServer {
    pub fn new(config: ServerConfig, transport: Arc<dyn Transport>) -> Self {
        let registry = Arc::new(ResourceRegistry::with_capacity(config.max_resources));
        Self {
            config,
            transport,
            registry,
            hooks: None,
            running: None,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Adds a resource. Fails with `AlreadyStarted` while the server runs.
    pub fn register(&mut self, pattern: &str, mime: &str, content: ResourceContent) -> Result<()> {
        if self.running.is_some() {
            return Err(HttpServerError::AlreadyStarted);
        }
        Arc::get_mut(&mut self.registry)
            .ok_or(HttpServerError::AlreadyStarted)?
            .register(pattern, mime, content)
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Installs connection hooks. Takes effect on the next start.
    pub fn register_callbacks(&mut self, hooks: Arc<dyn ConnectionHooks>) -> Result<()> {
        if self.running.is_some() {
            return Err(HttpServerError::AlreadyStarted);
        }
        self.hooks = Some(hooks);
        Ok(())
    }

    /// Starts the transport and the engine threads.
    ///
    /// On failure everything created so far is torn down again.
    pub fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            return Err(HttpServerError::AlreadyStarted);
        }
        self.config.validate()?;

        if let Some(credentials) = &self.config.security {
            if !self.transport.supports_tls() {
                return Err(HttpServerError::Unsupported("secure server needs a TLS transport"));
            }
            self.transport.load_identity(credentials)?;
        }

        let (notifier, receivers) =
            events::channel(self.config.connect_queue_depth, self.config.event_queue_depth)?;

        let pool = StreamPool::new(
            self.config.max_connections,
            self.transport.clone(),
            notifier.clone(),
            self.config.max_cached_request,
        )?;

        let engine = Arc::new(Engine {
            config: self.config.clone(),
            transport: self.transport.clone(),
            registry: self.registry.clone(),
            hooks: self.hooks.clone(),
            pool,
            notifier: notifier.clone(),
            quit: AtomicBool::new(false),
            deferred_accepts: AtomicUsize::new(0),
        });

        self.transport.start(notifier.clone())?;

        let acceptor = {
            let engine = engine.clone();
            let connect = receivers.connect;
            std::thread::Builder::new()
                .name("kiln-acceptor".into())
                .spawn(move || acceptor::run(&engine, connect))
        };
        let acceptor = match acceptor {
            Ok(handle) => handle,
            Err(e) => {
                self.transport.stop();
                return Err(HttpServerError::ThreadInit(e));
            }
        };

        let dispatcher = {
            let engine = engine.clone();
            let events = receivers.events;
            std::thread::Builder::new()
                .name("kiln-events".into())
                .spawn(move || dispatcher::run(&engine, events))
        };
        let dispatcher = match dispatcher {
            Ok(handle) => handle,
            Err(e) => {
                notifier.stop();
                let _ = acceptor.join();
                self.transport.stop();
                return Err(HttpServerError::ThreadInit(e));
            }
        };

        tracing::info!(
            addr = %self.config.listen_addr(),
            max_connections = self.config.max_connections,
            resources = self.registry.len(),
            "server started"
        );

        self.running = Some(Running {
            engine,
            acceptor,
            dispatcher,
        });
        Ok(())
    }

    /// Stops both engine threads, closes every connection and the listener.
    ///
    /// Blocks the calling thread until the engine threads have exited. Safe
    /// to call, and to drop a running server, from inside a tokio runtime,
    /// though it stalls that runtime's worker meanwhile.
    pub fn stop(&mut self) -> Result<()> {
        let running = self.running.take().ok_or(HttpServerError::NotStarted)?;

        running.engine.quit.store(true, Ordering::Release);
        running.engine.notifier.stop();

        if running.acceptor.join().is_err() {
            tracing::error!("acceptor thread panicked");
        }
        if running.dispatcher.join().is_err() {
            tracing::error!("event dispatcher thread panicked");
        }

        self.transport.stop();
        tracing::info!("server stopped");
        Ok(())
    }

    /// Queues a disconnect for every active connection.
    pub fn disconnect_all(&self) -> Result<()> {
        let running = self.running.as_ref().ok_or(HttpServerError::NotStarted)?;
        for socket in running.engine.pool.active_sockets() {
            if let Some(stream) = running.engine.pool.find(socket) {
                stream.response().disconnect()?;
            }
        }
        Ok(())
    }

    pub fn active_connections(&self) -> usize {
        self.running
            .as_ref()
            .map_or(0, |running| running.engine.pool.active_count())
    }

    /// Accepts postponed because the pool was full.
    pub fn deferred_accepts(&self) -> usize {
        self.running
            .as_ref()
            .map_or(0, |running| running.engine.deferred_accepts.load(Ordering::Acquire))
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        if self.running.is_some() {
            let _ = self.stop();
        }
    }
}
