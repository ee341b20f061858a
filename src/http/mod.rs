//! HTTP/1.1 protocol layer.
//!
//! # Architecture
//!
//! - **`connection`**: Per-connection pipeline from received frame to response
//! - **`parser`**: Header reassembly, request-line and header extraction, percent-decoding
//! - **`request`**: Request method, body view, and per-connection request state
//! - **`response`**: Status codes and the outbound [`ResponseStream`](response::ResponseStream)
//! - **`writer`**: Wire encoding of header blocks and chunks
//! - **`mime`**: The MIME type table
//! - **`query`**: Query-string helpers for content generators
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌──────────────────┐
//!        │     Inactive     │ ← Slot waiting in the pool
//!        └────────┬─────────┘
//!                 │ Accepted
//!                 ▼
//!        ┌──────────────────┐
//!        │ AwaitingHeaders  │ ← Fragments cached until CRLFCRLF
//!        └────────┬─────────┘
//!                 │ Header complete, dispatched
//!                 ├─ Body announced → AwaitingBody → (drained) → AwaitingHeaders
//!                 ├─ Keep-Alive → AwaitingHeaders
//!                 └─ Close / peer gone → Inactive
//! ```

pub mod connection;
pub mod mime;
pub mod parser;
pub mod query;
pub mod request;
pub mod response;
pub mod writer;
