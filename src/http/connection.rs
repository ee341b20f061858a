use std::borrow::Cow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{HttpServerError, Result};
use crate::http::parser::{self, Reassembly};
use crate::http::request::{MessageBody, RequestState};
use crate::http::response::ResponseStream;
use crate::resource::dispatch;
use crate::resource::registry::ResourceRegistry;
use crate::server::events::EventNotifier;
use crate::transport::{SocketId, Transport};

/// Application hooks around every connection.
pub trait ConnectionHooks: Send + Sync {
    /// Sees each received frame before the parser does and may replace it.
    ///
    /// `Err(PartialResult)` swallows the frame; any other error drops the
    /// connection.
    fn on_receive<'a>(&self, _stream: &ResponseStream, frame: Cow<'a, [u8]>) -> Result<Cow<'a, [u8]>> {
        Ok(frame)
    }

    /// Runs before the connection's stream goes back to the pool.
    fn on_disconnect(&self, _stream: &ResponseStream) {}
}

/// Where a connection is in its request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not bound to a socket.
    Inactive,
    /// Waiting for (the rest of) a request header.
    AwaitingHeaders,
    /// Header handled, body fragments still expected.
    AwaitingBody,
}

/// One pool slot: the outbound stream plus the inbound parsing state.
#[derive(Debug)]
pub struct ConnectionStream {
    response: ResponseStream,
    request: Mutex<RequestState>,
}

impl ConnectionStream {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        notifier: EventNotifier,
        max_cached_request: usize,
    ) -> Self {
        Self {
            response: ResponseStream::new(transport, notifier),
            request: Mutex::new(RequestState::new(max_cached_request)),
        }
    }

    pub fn response(&self) -> &ResponseStream {
        &self.response
    }

    fn request(&self) -> MutexGuard<'_, RequestState> {
        self.request.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ConnectionState {
        if self.response.socket().is_none() {
            ConnectionState::Inactive
        } else if self.request().expects_body() {
            ConnectionState::AwaitingBody
        } else {
            ConnectionState::AwaitingHeaders
        }
    }

    /// Binds the slot to a new connection with clean request state.
    pub(crate) fn open(&self, socket: SocketId) {
        self.request().reset();
        self.response.init(socket);
    }

    /// Unbinds the slot. Returns the socket it was bound to.
    pub fn close(&self) -> Option<SocketId> {
        self.request().reset();
        self.response.deinit()
    }

    /// Runs one received frame through the request pipeline.
    ///
    /// Requests that cannot be parsed are dropped without a response; the
    /// error is returned for logging. The connection stays open unless the
    /// frame carried `Connection: close`.
    pub(crate) fn on_packet(
        &self,
        registry: &ResourceRegistry,
        hooks: Option<&dyn ConnectionHooks>,
        frame: &[u8],
    ) -> Result<()> {
        let frame = match hooks {
            Some(hooks) => match hooks.on_receive(&self.response, Cow::Borrowed(frame)) {
                Ok(frame) => frame,
                Err(HttpServerError::PartialResult) => return Ok(()),
                Err(e) => {
                    tracing::debug!(error = %e, "receive hook rejected frame");
                    return self.response.disconnect();
                }
            },
            None => Cow::Borrowed(frame),
        };

        let mut state = self.request();

        if state.expects_body() {
            if parser::requests_close(&frame) {
                state.close_requested = true;
            }
            let served = dispatch::continue_body(registry, &self.response, &mut state, &frame);
            if state.close_requested && (served.is_err() || !state.expects_body()) {
                self.response.disconnect()?;
            }
            return served;
        }

        let block = match state.cache.reassemble(&frame) {
            Reassembly::Complete(block) => block,
            Reassembly::Pending => {
                tracing::trace!(cached = state.cache.len(), "request header incomplete");
                return Ok(());
            }
            Reassembly::Overflow => {
                if parser::requests_close(&frame) {
                    self.response.disconnect()?;
                }
                return Err(HttpServerError::MalformedRequest("request header exceeds cache limit"));
            }
        };

        let close_requested = parser::requests_close(&block);
        let served = self.serve(registry, &mut state, &block);
        if close_requested && (served.is_err() || !state.expects_body()) {
            self.response.disconnect()?;
        }
        served
    }

    /// Parses a complete request block and dispatches it.
    fn serve(&self, registry: &ResourceRegistry, state: &mut RequestState, block: &[u8]) -> Result<()> {
        let request = parser::parse_request(block)?;
        let (raw_path, raw_query) = parser::split_url(request.url);
        let path = parser::percent_decode(raw_path)
            .ok_or(HttpServerError::MalformedRequest("invalid percent-encoding in path"))?;
        let query = match raw_query {
            Some(q) => Some(
                parser::percent_decode(q)
                    .ok_or(HttpServerError::MalformedRequest("invalid percent-encoding in query"))?,
            ),
            None => None,
        };

        state.mime_type = request.mime_type;
        state.request_type = request.method;
        state.data_remaining = request.data_remaining;
        state.awaiting_body = false;
        state.close_requested = request.connection_close;

        tracing::debug!(
            method = ?request.method,
            path = %String::from_utf8_lossy(&path),
            body = request.body.len(),
            remaining = request.data_remaining,
            "request received"
        );

        let body = MessageBody {
            data: request.body,
            data_remaining: request.data_remaining,
            is_chunked_transfer: request.is_chunked_transfer,
            mime_type: request.mime_type,
            request_type: request.method,
        };
        dispatch::dispatch(registry, &self.response, state, &path, query.as_deref(), &body)
    }
}
