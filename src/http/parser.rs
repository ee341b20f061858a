use std::borrow::Cow;

use bytes::BytesMut;

use crate::error::{HttpServerError, Result};
use crate::http::mime::MimeType;
use crate::http::request::Method;

/// Shortest frame that can hold `GET / HTTP/1.1\r\n` plus a terminator.
pub const MINIMUM_REQUEST_LINE_LENGTH: usize = 18;

pub const CRLF: &[u8] = b"\r\n";
pub const CRLF_CRLF: &[u8] = b"\r\n\r\n";

const HTTP_VERSION_MARKER: &[u8] = b" HTTP/1.1";
const CONTENT_TYPE: &[u8] = b"Content-Type: ";
const CONTENT_LENGTH: &[u8] = b"Content-Length: ";
const CHUNKED_TRANSFER: &[u8] = b"Transfer-Encoding: chunked";
const CONNECTION_CLOSE: &[u8] = b"Connection: close";

/// Position of the first occurrence of `needle` in `haystack`.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Whether `frame` carries `Connection: close` anywhere, body included.
pub fn requests_close(frame: &[u8]) -> bool {
    find(frame, CONNECTION_CLOSE).is_some()
}

/// Outcome of feeding one frame into a [`RequestCache`].
#[derive(Debug, PartialEq, Eq)]
pub enum Reassembly<'a> {
    /// A full header block (plus any body bytes that came with it).
    Complete(Cow<'a, [u8]>),
    /// Header terminator not seen yet; the frame was buffered.
    Pending,
    /// Buffering the frame would exceed the cap; the cache was discarded.
    Overflow,
}

/// Buffers request fragments until the header terminator arrives.
#[derive(Debug)]
pub struct RequestCache {
    buf: BytesMut,
    limit: usize,
}

impl RequestCache {
    pub fn new(limit: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            limit,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Feeds one received frame.
    ///
    /// A frame that already contains the terminator while nothing is cached
    /// is passed through without copying.
    pub fn reassemble<'a>(&mut self, frame: &'a [u8]) -> Reassembly<'a> {
        if self.buf.is_empty() && find(frame, CRLF_CRLF).is_some() {
            return Reassembly::Complete(Cow::Borrowed(frame));
        }

        if self.buf.len() + frame.len() > self.limit {
            self.buf.clear();
            return Reassembly::Overflow;
        }

        self.buf.extend_from_slice(frame);

        if find(&self.buf, CRLF_CRLF).is_some() {
            Reassembly::Complete(Cow::Owned(self.buf.split().to_vec()))
        } else {
            Reassembly::Pending
        }
    }
}

/// Everything the engine extracts from a complete request block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest<'a> {
    pub method: Method,
    /// Raw URL between the method token and ` HTTP/1.1`, still encoded.
    pub url: &'a [u8],
    /// Body bytes that arrived with the header block.
    pub body: &'a [u8],
    pub mime_type: MimeType,
    pub is_chunked_transfer: bool,
    /// Body bytes announced by `Content-Length` but not yet received.
    pub data_remaining: u32,
    pub connection_close: bool,
}

/// Extracts method, URL, and body framing from a request block.
///
/// Header names are matched case-sensitively and in their canonical
/// spelling only. Body framing headers are searched in the header block
/// alone; `Connection: close` counts anywhere in the block.
pub fn parse_request(block: &[u8]) -> Result<ParsedRequest<'_>> {
    if block.len() < MINIMUM_REQUEST_LINE_LENGTH {
        return Err(HttpServerError::MalformedRequest("request shorter than a request line"));
    }

    let (method, url_start) = Method::from_request_line(block)
        .ok_or(HttpServerError::MalformedRequest("unsupported request method"))?;

    let url_len = find(&block[url_start..], HTTP_VERSION_MARKER)
        .ok_or(HttpServerError::MalformedRequest("missing HTTP/1.1 version"))?;
    let url = &block[url_start..url_start + url_len];
    if url.contains(&b'\r') || url.contains(&b'\n') {
        return Err(HttpServerError::MalformedRequest("request line spans several lines"));
    }

    let header_end = find(block, CRLF_CRLF)
        .ok_or(HttpServerError::MalformedRequest("header block not terminated"))?;
    let headers = &block[..header_end];
    let body = &block[header_end + CRLF_CRLF.len()..];

    let mime_type = match find(headers, CONTENT_TYPE) {
        Some(pos) => MimeType::from_prefix(&headers[pos + CONTENT_TYPE.len()..]),
        None => MimeType::All,
    };

    let connection_close = requests_close(block);

    if find(headers, CHUNKED_TRANSFER).is_some() {
        return Ok(ParsedRequest {
            method,
            url,
            body,
            mime_type,
            is_chunked_transfer: true,
            data_remaining: 0,
            connection_close,
        });
    }

    let (body, data_remaining) = match find(headers, CONTENT_LENGTH) {
        Some(pos) => {
            let announced = parse_content_length(&headers[pos + CONTENT_LENGTH.len()..])?;
            let present = body.len().min(announced as usize);
            (&body[..present], announced - present as u32)
        }
        None => (&body[..0], 0),
    };

    Ok(ParsedRequest {
        method,
        url,
        body,
        mime_type,
        is_chunked_transfer: false,
        data_remaining,
        connection_close,
    })
}

fn parse_content_length(value: &[u8]) -> Result<u32> {
    let digits = value.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return Err(HttpServerError::MalformedRequest("invalid Content-Length"));
    }
    std::str::from_utf8(&value[..digits])
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or(HttpServerError::MalformedRequest("Content-Length out of range"))
}

/// Splits a raw URL into path and query at the first `?`.
pub fn split_url(url: &[u8]) -> (&[u8], Option<&[u8]>) {
    match url.iter().position(|&b| b == b'?') {
        Some(pos) => (&url[..pos], Some(&url[pos + 1..])),
        None => (url, None),
    }
}

/// Percent-decodes `buf` in place and returns the decoded length.
///
/// `%XX` becomes the byte `0xXX` and `+` becomes a space. A `%` that is not
/// followed by two hex digits makes the whole input invalid.
pub fn percent_decode_in_place(buf: &mut [u8]) -> Option<usize> {
    let mut read = 0;
    let mut write = 0;

    while read < buf.len() {
        let byte = match buf[read] {
            b'%' => {
                let hi = buf.get(read + 1).copied().and_then(hex_value)?;
                let lo = buf.get(read + 2).copied().and_then(hex_value)?;
                read += 3;
                (hi << 4) | lo
            }
            b'+' => {
                read += 1;
                b' '
            }
            other => {
                read += 1;
                other
            }
        };
        buf[write] = byte;
        write += 1;
    }

    Some(write)
}

/// Decodes into a fresh buffer.
pub fn percent_decode(input: &[u8]) -> Option<Vec<u8>> {
    let mut buf = input.to_vec();
    let len = percent_decode_in_place(&mut buf)?;
    buf.truncate(len);
    Some(buf)
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
