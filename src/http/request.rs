use crate::http::mime::MimeType;
use crate::http::parser::RequestCache;

/// Request methods the engine recognises on the request line.
///
/// Anything else is reported as `UNDEFINED` and the request is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    #[default]
    UNDEFINED,
}

impl Method {
    /// Matches the method token at the very start of a request line,
    /// including its trailing space.
    ///
    /// Returns the method and the offset where the URL begins.
    ///
    /// # Example
    ///
    /// ```
    /// # use kiln::http::request::Method;
    /// assert_eq!(Method::from_request_line(b"POST /x HTTP/1.1"), Some((Method::POST, 5)));
    /// assert_eq!(Method::from_request_line(b"get / HTTP/1.1"), None);
    /// ```
    pub fn from_request_line(line: &[u8]) -> Option<(Self, usize)> {
        [Method::GET, Method::POST, Method::PUT]
            .into_iter()
            .find_map(|method| {
                let token = method.token();
                line.starts_with(token).then_some((method, token.len()))
            })
    }

    fn token(&self) -> &'static [u8] {
        match self {
            Method::GET => b"GET ",
            Method::POST => b"POST ",
            Method::PUT => b"PUT ",
            Method::UNDEFINED => b"",
        }
    }
}

/// The slice of a request body delivered to a content generator.
///
/// `data` only covers the bytes present in the current frame; the rest of a
/// `Content-Length` body arrives through later calls, with `data_remaining`
/// counting down to zero.
#[derive(Debug, Clone, Copy)]
pub struct MessageBody<'a> {
    pub data: &'a [u8],
    pub data_remaining: u32,
    pub is_chunked_transfer: bool,
    pub mime_type: MimeType,
    pub request_type: Method,
}

impl<'a> MessageBody<'a> {
    pub fn data_length(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Per-connection parsing state carried between frames.
#[derive(Debug)]
pub struct RequestState {
    /// Index of the registry entry serving the request in flight.
    pub page_found: Option<usize>,
    /// Decoded path of the request in flight.
    pub path: String,
    /// Body bytes still expected after the current frame.
    pub data_remaining: u32,
    /// Set when the generator asked for more body than the headers announced.
    pub awaiting_body: bool,
    /// Set when the request carried `Connection: close`.
    pub close_requested: bool,
    pub mime_type: MimeType,
    pub request_type: Method,
    pub cache: RequestCache,
}

impl RequestState {
    pub fn new(max_cached_request: usize) -> Self {
        Self {
            page_found: None,
            path: String::new(),
            data_remaining: 0,
            awaiting_body: false,
            close_requested: false,
            mime_type: MimeType::All,
            request_type: Method::UNDEFINED,
            cache: RequestCache::new(max_cached_request),
        }
    }

    /// Forgets everything about the previous connection.
    pub fn reset(&mut self) {
        self.page_found = None;
        self.path.clear();
        self.data_remaining = 0;
        self.awaiting_body = false;
        self.close_requested = false;
        self.mime_type = MimeType::All;
        self.request_type = Method::UNDEFINED;
        self.cache.clear();
    }

    /// True while later frames belong to the body of the request in flight.
    pub fn expects_body(&self) -> bool {
        self.data_remaining > 0 || self.awaiting_body
    }
}
