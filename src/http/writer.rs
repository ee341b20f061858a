use std::fmt::Write as _;

use bytes::{BufMut, BytesMut};

use crate::http::mime::MimeType;
use crate::http::parser::CRLF;
use crate::http::response::{CachePolicy, StatusCode};

/// Terminates a chunked body.
pub const LAST_CHUNK: &[u8] = b"0\r\n\r\n";

const NO_CACHE: &[u8] =
    b"Cache-Control: no-store, no-cache, must-revalidate, post-check=0, pre-check=0\r\nPragma: no-cache";

/// Serializes a response header block in the fixed field order:
/// status line, `Content-Type`, cache directives, `Connection`, framing.
///
/// Event streams carry neither `Content-Length` nor chunked framing unless
/// chunked transfer is on.
pub fn encode_header(
    status: StatusCode,
    content_length: usize,
    cache: CachePolicy,
    mime: MimeType,
    chunked: bool,
) -> BytesMut {
    let mut buf = BytesMut::with_capacity(256);

    buf.put_slice(status.status_line().as_bytes());
    buf.put_slice(CRLF);

    buf.put_slice(b"Content-Type: ");
    buf.put_slice(mime.as_str().as_bytes());
    buf.put_slice(CRLF);

    if cache == CachePolicy::Disabled {
        buf.put_slice(NO_CACHE);
        buf.put_slice(CRLF);
    }

    if status == StatusCode::NoResponse {
        buf.put_slice(b"Connection: close");
    } else {
        buf.put_slice(b"Connection: Keep-Alive");
    }
    buf.put_slice(CRLF);

    if chunked {
        buf.put_slice(b"Transfer-Encoding: chunked");
        buf.put_slice(CRLF);
    } else if mime != MimeType::EventStream {
        // Writing into BytesMut cannot fail.
        let _ = write!(buf, "Content-Length: {}", content_length);
        buf.put_slice(CRLF);
    }

    buf.put_slice(CRLF);
    buf
}

/// Frames `data` as one chunk: hex length, CRLF, data, CRLF.
pub fn encode_chunk(data: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(data.len() + 12);
    let _ = write!(buf, "{:x}", data.len());
    buf.put_slice(CRLF);
    buf.put_slice(data);
    buf.put_slice(CRLF);
    buf
}
