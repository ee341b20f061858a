use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{HttpServerError, Result};
use crate::http::mime::MimeType;
use crate::http::writer::{self, LAST_CHUNK};
use crate::resource::registry::ResourceSource;
use crate::server::events::EventNotifier;
use crate::transport::{SocketId, Transport};

/// Response status codes the server can emit.
///
/// Each maps to a fixed status line. A few are deliberately bare (no reason
/// phrase), as listed in [`StatusCode::status_line`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 204 No Content
    NoContent,
    /// 207 Multi-Status
    MultiStatus,
    /// 301, used for redirects
    MovedPermanently,
    /// 400 Bad Request
    BadRequest,
    /// 403
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 406 Not Acceptable
    NotAcceptable,
    /// 412 Precondition Failed
    PreconditionFailed,
    /// 415 Unsupported Media Type
    UnsupportedMediaType,
    /// 429 Too Many Requests
    TooManyRequests,
    /// 444, closes the connection
    NoResponse,
    /// 470 Connection Authorization Required
    ConnectionAuthorizationRequired,
    /// 500 Internal Server Error
    InternalServerError,
    /// 504 Not Able to Connect
    NotAbleToConnect,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use kiln::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NoResponse.as_u16(), 444);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::NoContent => 204,
            StatusCode::MultiStatus => 207,
            StatusCode::MovedPermanently => 301,
            StatusCode::BadRequest => 400,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::NotAcceptable => 406,
            StatusCode::PreconditionFailed => 412,
            StatusCode::UnsupportedMediaType => 415,
            StatusCode::TooManyRequests => 429,
            StatusCode::NoResponse => 444,
            StatusCode::ConnectionAuthorizationRequired => 470,
            StatusCode::InternalServerError => 500,
            StatusCode::NotAbleToConnect => 504,
        }
    }

    /// Returns the full status line, without the trailing CRLF.
    ///
    /// # Example
    ///
    /// ```
    /// # use kiln::http::response::StatusCode;
    /// assert_eq!(StatusCode::NotFound.status_line(), "HTTP/1.1 404 Not Found");
    /// assert_eq!(StatusCode::Forbidden.status_line(), "HTTP/1.1 403");
    /// ```
    pub fn status_line(&self) -> &'static str {
        match self {
            StatusCode::Ok => "HTTP/1.1 200 OK",
            StatusCode::NoContent => "HTTP/1.1 204 No Content",
            StatusCode::MultiStatus => "HTTP/1.1 207 Multi-Status",
            StatusCode::MovedPermanently => "HTTP/1.1 301",
            StatusCode::BadRequest => "HTTP/1.1 400 Bad Request",
            StatusCode::Forbidden => "HTTP/1.1 403",
            StatusCode::NotFound => "HTTP/1.1 404 Not Found",
            StatusCode::MethodNotAllowed => "HTTP/1.1 405 Method Not Allowed",
            StatusCode::NotAcceptable => "HTTP/1.1 406 Not Acceptable",
            StatusCode::PreconditionFailed => "HTTP/1.1 412 Precondition Failed",
            StatusCode::UnsupportedMediaType => "HTTP/1.1 415 Unsupported Media Type",
            StatusCode::TooManyRequests => "HTTP/1.1 429 Too Many Requests",
            StatusCode::NoResponse => "HTTP/1.1 444",
            StatusCode::ConnectionAuthorizationRequired => {
                "HTTP/1.1 470 Connection Authorization Required"
            }
            StatusCode::InternalServerError => "HTTP/1.1 500 Internal Server Error",
            StatusCode::NotAbleToConnect => "HTTP/1.1 504 Not Able to Connect",
        }
    }
}

/// Whether a response may be cached by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    Disabled,
    Enabled,
}

/// Smallest read window [`ResponseStream::write_resource`] shrinks to.
const MIN_RESOURCE_WINDOW: usize = 64;
const RESOURCE_WINDOW: usize = 1024;

#[derive(Debug, Default)]
struct StreamState {
    socket: Option<SocketId>,
    chunked: bool,
}

/// Outbound half of a connection.
///
/// Content generators receive a `&ResponseStream` and write the response
/// through it. Every operation fails with `BadArgument` once the stream is
/// no longer bound to a socket.
pub struct ResponseStream {
    transport: Arc<dyn Transport>,
    notifier: EventNotifier,
    state: Mutex<StreamState>,
}

impl std::fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ResponseStream")
            .field("socket", &state.socket)
            .field("chunked", &state.chunked)
            .finish()
    }
}

impl ResponseStream {
    pub(crate) fn new(transport: Arc<dyn Transport>, notifier: EventNotifier) -> Self {
        Self {
            transport,
            notifier,
            state: Mutex::new(StreamState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StreamState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks the stream for one whole operation, transport send included.
    fn bound(&self) -> Result<(MutexGuard<'_, StreamState>, SocketId)> {
        let state = self.lock();
        let socket = state
            .socket
            .ok_or(HttpServerError::BadArgument("response stream is not connected"))?;
        Ok((state, socket))
    }

    fn send_framed(&self, socket: SocketId, chunked: bool, data: &[u8]) -> Result<()> {
        if chunked {
            self.transport.send(socket, &writer::encode_chunk(data))
        } else {
            self.transport.send(socket, data)
        }
    }

    /// Binds the stream to a freshly accepted socket.
    pub(crate) fn init(&self, socket: SocketId) {
        let mut state = self.lock();
        state.socket = Some(socket);
        state.chunked = false;
    }

    /// Unbinds the stream. Returns the socket it was bound to.
    pub(crate) fn deinit(&self) -> Option<SocketId> {
        let mut state = self.lock();
        state.chunked = false;
        state.socket.take()
    }

    pub fn socket(&self) -> Option<SocketId> {
        self.lock().socket
    }

    pub fn is_chunked(&self) -> bool {
        self.lock().chunked
    }

    /// Frames subsequent writes as chunks.
    pub fn enable_chunked_transfer(&self) -> Result<()> {
        let mut state = self.lock();
        if state.socket.is_none() {
            return Err(HttpServerError::BadArgument("response stream is not connected"));
        }
        state.chunked = true;
        Ok(())
    }

    /// Ends chunked framing by sending the terminating chunk.
    ///
    /// Does nothing when chunked transfer is not on.
    pub fn disable_chunked_transfer(&self) -> Result<()> {
        let (mut state, socket) = self.bound()?;
        if !state.chunked {
            return Ok(());
        }
        state.chunked = false;
        self.transport.send(socket, LAST_CHUNK)
    }

    /// Writes the response header.
    ///
    /// While chunked transfer is on, `Transfer-Encoding: chunked` replaces
    /// `Content-Length`.
    pub fn write_header(
        &self,
        status: StatusCode,
        content_length: usize,
        cache: CachePolicy,
        mime: MimeType,
    ) -> Result<()> {
        let (state, socket) = self.bound()?;
        let header = writer::encode_header(status, content_length, cache, mime, state.chunked);
        self.transport.send(socket, &header)
    }

    /// Writes body bytes, framed as one chunk while chunked transfer is on.
    pub fn write(&self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(HttpServerError::BadArgument("empty payload"));
        }
        let (state, socket) = self.bound()?;
        self.send_framed(socket, state.chunked, data)
    }

    /// Streams an opaque resource, framed the way [`write`](Self::write)
    /// frames it. The stream stays locked until the last piece is sent.
    ///
    /// When the source runs out of memory for a read, the window is halved
    /// and the read retried.
    pub fn write_resource(&self, source: &dyn ResourceSource) -> Result<()> {
        let (state, socket) = self.bound()?;

        let total = source.size();
        let mut offset = 0;
        let mut window = RESOURCE_WINDOW;

        while offset < total {
            let piece = match source.read_at(offset, window.min(total - offset)) {
                Ok(piece) => piece,
                Err(HttpServerError::NoMemory) if window > MIN_RESOURCE_WINDOW => {
                    window /= 2;
                    tracing::debug!(window, "resource read out of memory, shrinking window");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if piece.is_empty() {
                break;
            }
            self.send_framed(socket, state.chunked, &piece)?;
            offset += piece.len();
        }

        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        let (_state, socket) = self.bound()?;
        self.transport.flush(socket)
    }

    /// Queues a disconnect of this stream's connection.
    ///
    /// The teardown itself runs on the event dispatcher thread.
    pub fn disconnect(&self) -> Result<()> {
        let (_state, socket) = self.bound()?;
        self.notifier.request_disconnect(socket)
    }
}
