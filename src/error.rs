//! Error taxonomy shared by every layer of the engine.

use std::fmt;
use std::io;

/// Errors produced by the HTTP server engine.
#[derive(Debug)]
pub enum HttpServerError {
    /// A caller supplied an argument the operation cannot work with.
    BadArgument(&'static str),
    /// The resource registry already holds its maximum number of entries.
    RegistryFull { capacity: usize },
    /// A lookup (resource, query parameter, socket) found nothing.
    NotFound,
    /// An allocation the engine needed up front could not be satisfied.
    NoMemory,
    /// A worker thread could not be spawned.
    ThreadInit(io::Error),
    /// An event queue could not be created.
    QueueInit(&'static str),
    /// An event queue is full and the event was dropped.
    QueueFull,
    /// The transport failed to start listening.
    TransportStart(io::Error),
    /// A transport operation failed on an established connection.
    Transport(io::Error),
    /// The received bytes do not form a request the engine understands.
    MalformedRequest(&'static str),
    /// The receive hook consumed the frame without finishing a request.
    PartialResult,
    /// The requested feature is not available in this build or transport.
    Unsupported(&'static str),
    /// The server is already running.
    AlreadyStarted,
    /// The server is not running.
    NotStarted,
}

impl fmt::Display for HttpServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpServerError::BadArgument(what) => write!(f, "bad argument: {}", what),
            HttpServerError::RegistryFull { capacity } => {
                write!(f, "resource registry full ({} entries)", capacity)
            }
            HttpServerError::NotFound => write!(f, "not found"),
            HttpServerError::NoMemory => write!(f, "out of memory"),
            HttpServerError::ThreadInit(e) => write!(f, "failed to spawn worker thread: {}", e),
            HttpServerError::QueueInit(what) => write!(f, "failed to create event queue: {}", what),
            HttpServerError::QueueFull => write!(f, "event queue full"),
            HttpServerError::TransportStart(e) => write!(f, "transport failed to start: {}", e),
            HttpServerError::Transport(e) => write!(f, "transport error: {}", e),
            HttpServerError::MalformedRequest(what) => write!(f, "malformed request: {}", what),
            HttpServerError::PartialResult => write!(f, "partial result"),
            HttpServerError::Unsupported(what) => write!(f, "unsupported: {}", what),
            HttpServerError::AlreadyStarted => write!(f, "server already started"),
            HttpServerError::NotStarted => write!(f, "server not started"),
        }
    }
}

impl std::error::Error for HttpServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HttpServerError::ThreadInit(e)
            | HttpServerError::TransportStart(e)
            | HttpServerError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for HttpServerError {
    fn from(e: io::Error) -> Self {
        HttpServerError::Transport(e)
    }
}

pub type Result<T, E = HttpServerError> = std::result::Result<T, E>;
