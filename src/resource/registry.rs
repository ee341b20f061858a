use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::config::DEFAULT_MAX_RESOURCES;
use crate::error::{HttpServerError, Result};
use crate::http::mime::MimeType;
use crate::http::request::MessageBody;
use crate::http::response::ResponseStream;
use crate::resource::wildcard;

/// What a generator wants after handling a request or body fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// The response is complete once no announced body remains.
    Done,
    /// Keep routing following frames to this generator.
    NeedMoreBody,
}

/// Produces a response at request time.
///
/// `path` is the decoded request path and `query` the decoded query string.
/// Both are converted lossily: decoded bytes that are not valid UTF-8 reach
/// the generator as U+FFFD. Resource matching still runs on the raw bytes.
/// Body fragments arriving in later frames are delivered through further
/// calls with `query` set to `None`.
pub trait ContentGenerator: Send + Sync {
    fn generate(
        &self,
        path: &str,
        query: Option<&str>,
        stream: &ResponseStream,
        body: &MessageBody<'_>,
    ) -> Result<Continuation>;
}

impl<F> ContentGenerator for F
where
    F: Fn(&str, Option<&str>, &ResponseStream, &MessageBody<'_>) -> Result<Continuation> + Send + Sync,
{
    fn generate(
        &self,
        path: &str,
        query: Option<&str>,
        stream: &ResponseStream,
        body: &MessageBody<'_>,
    ) -> Result<Continuation> {
        self(path, query, stream, body)
    }
}

/// An opaque, readable-by-offset resource such as a file image.
pub trait ResourceSource: Send + Sync {
    fn size(&self) -> usize;

    /// Reads at most `max_len` bytes starting at `offset`.
    ///
    /// May fail with `NoMemory` to ask for a smaller window, or with
    /// `Unsupported` when the resource cannot be read at all.
    fn read_at(&self, offset: usize, max_len: usize) -> Result<Bytes>;
}

impl ResourceSource for Bytes {
    fn size(&self) -> usize {
        self.len()
    }

    fn read_at(&self, offset: usize, max_len: usize) -> Result<Bytes> {
        let start = offset.min(self.len());
        let end = start.saturating_add(max_len).min(self.len());
        Ok(self.slice(start..end))
    }
}

/// Kind tag of a registered resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Dynamic,
    RawDynamic,
    Static,
    RawStatic,
    Resource,
    RawResource,
}

/// Content served for a registered pattern.
///
/// `Static` bodies get a generated header; `RawStatic` bodies must contain
/// their own status line and headers. `Dynamic` generators write into a
/// chunked response whose header the engine already sent; `RawDynamic`
/// generators write everything themselves.
#[derive(Clone)]
pub enum ResourceContent {
    Dynamic(Arc<dyn ContentGenerator>),
    RawDynamic(Arc<dyn ContentGenerator>),
    Static(Bytes),
    RawStatic(Bytes),
    Resource(Arc<dyn ResourceSource>),
    RawResource(Arc<dyn ResourceSource>),
}

impl ResourceContent {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceContent::Dynamic(_) => ResourceKind::Dynamic,
            ResourceContent::RawDynamic(_) => ResourceKind::RawDynamic,
            ResourceContent::Static(_) => ResourceKind::Static,
            ResourceContent::RawStatic(_) => ResourceKind::RawStatic,
            ResourceContent::Resource(_) => ResourceKind::Resource,
            ResourceContent::RawResource(_) => ResourceKind::RawResource,
        }
    }

    /// A dynamic page backed by a closure.
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&str, Option<&str>, &ResponseStream, &MessageBody<'_>) -> Result<Continuation>
            + Send
            + Sync
            + 'static,
    {
        ResourceContent::Dynamic(Arc::new(f))
    }

    /// A raw dynamic page backed by a closure.
    pub fn raw_dynamic<F>(f: F) -> Self
    where
        F: Fn(&str, Option<&str>, &ResponseStream, &MessageBody<'_>) -> Result<Continuation>
            + Send
            + Sync
            + 'static,
    {
        ResourceContent::RawDynamic(Arc::new(f))
    }

    pub fn static_bytes(body: impl Into<Bytes>) -> Self {
        ResourceContent::Static(body.into())
    }

    pub fn raw_static(response: impl Into<Bytes>) -> Self {
        ResourceContent::RawStatic(response.into())
    }

    /// A raw `301` response pointing at `location`.
    ///
    /// # Example
    ///
    /// ```
    /// # use kiln::resource::registry::ResourceContent;
    /// let ResourceContent::RawStatic(bytes) = ResourceContent::redirect("/index.html") else {
    ///     unreachable!()
    /// };
    /// assert!(bytes.starts_with(b"HTTP/1.1 301\r\nLocation: /index.html\r\n"));
    /// ```
    pub fn redirect(location: &str) -> Self {
        ResourceContent::RawStatic(Bytes::from(format!(
            "HTTP/1.1 301\r\nLocation: {}\r\nContent-Length: 0\r\n\r\n",
            location
        )))
    }

    pub fn resource(source: impl ResourceSource + 'static) -> Self {
        ResourceContent::Resource(Arc::new(source))
    }
}

impl fmt::Debug for ResourceContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceContent::Static(b) | ResourceContent::RawStatic(b) => f
                .debug_struct("ResourceContent")
                .field("kind", &self.kind())
                .field("len", &b.len())
                .finish(),
            _ => f
                .debug_struct("ResourceContent")
                .field("kind", &self.kind())
                .finish(),
        }
    }
}

/// A registered URL pattern and what it serves.
#[derive(Debug, Clone)]
pub struct ResourceEntry {
    pub pattern: String,
    pub mime_type: MimeType,
    pub content: ResourceContent,
}

/// Fixed-capacity table of resources, searched in registration order.
#[derive(Debug)]
pub struct ResourceRegistry {
    entries: Vec<ResourceEntry>,
    capacity: usize,
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_RESOURCES)
    }
}

impl ResourceRegistry {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends a resource. The MIME string is classified against the MIME
    /// table; unknown types are served as `*/*`.
    pub fn register(&mut self, pattern: &str, mime: &str, content: ResourceContent) -> Result<()> {
        if pattern.is_empty() {
            return Err(HttpServerError::BadArgument("empty URL pattern"));
        }
        if self.entries.len() >= self.capacity {
            return Err(HttpServerError::RegistryFull {
                capacity: self.capacity,
            });
        }

        let mime_type = MimeType::parse(mime);
        if mime_type == MimeType::All && mime != MimeType::All.as_str() {
            tracing::warn!(pattern, mime, "unknown MIME type, serving as */*");
        }

        tracing::debug!(pattern, mime = %mime_type, kind = ?content.kind(), "resource registered");
        self.entries.push(ResourceEntry {
            pattern: pattern.to_string(),
            mime_type,
            content,
        });
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&ResourceEntry> {
        self.entries.get(index)
    }

    /// First entry whose pattern matches `path` and whose MIME type is
    /// acceptable for a request announcing `request_mime`.
    pub fn find(&self, path: &[u8], request_mime: MimeType) -> Option<(usize, &ResourceEntry)> {
        self.entries.iter().enumerate().find(|(_, entry)| {
            wildcard::matches(entry.pattern.as_bytes(), path)
                && (request_mime == MimeType::All || entry.mime_type == request_mime)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceEntry> {
        self.entries.iter()
    }
}
