//! Kiln - Embeddable HTTP/1.1 Server Engine
//!
//! A small server for device-class workloads: a fixed pool of connections,
//! a fixed-capacity table of URL resources (static bodies, generated
//! content, streamed resources) and two engine threads fed by bounded
//! event queues.

pub mod config;
pub mod error;
pub mod http;
pub mod resource;
pub mod server;
pub mod transport;

pub use error::{HttpServerError, Result};
