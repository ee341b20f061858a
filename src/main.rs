use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Context;
use kiln::config::ServerConfig;
use kiln::http::query;
use kiln::http::request::Method;
use kiln::resource::registry::{Continuation, ResourceContent};
use kiln::server::HttpServer;
use kiln::transport::tcp::TcpTransport;

const INDEX_PAGE: &[u8] = b"<!DOCTYPE html><html><body><h1>kiln</h1>\
<p><a href=\"/status?name=world\">status</a></p></body></html>";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = ServerConfig::load()?;
    let transport = Arc::new(TcpTransport::new(cfg.listen_addr()));
    let mut server = HttpServer::new(cfg, transport);

    server.register("/", "text/html", ResourceContent::redirect("/index.html"))?;
    server.register("/index.html", "text/html", ResourceContent::static_bytes(INDEX_PAGE))?;

    server.register(
        "/status*",
        "text/plain",
        ResourceContent::dynamic(|path, query_string, stream, _body| {
            let name = query_string
                .and_then(|q| query::parameter_value(q, "name").ok().flatten())
                .unwrap_or("anonymous");
            stream.write(format!("path: {}\nhello, {}\n", path, name).as_bytes())?;
            Ok(Continuation::Done)
        }),
    )?;

    let received = Arc::new(AtomicUsize::new(0));
    server.register(
        "/upload",
        "*/*",
        ResourceContent::dynamic(move |_path, _query, stream, body| {
            if body.request_type != Method::POST && body.request_type != Method::PUT {
                stream.write(b"send a POST or PUT body\n")?;
                return Ok(Continuation::Done);
            }
            let total = received.fetch_add(body.data_length(), Ordering::Relaxed) + body.data_length();
            if body.data_remaining == 0 {
                received.store(0, Ordering::Relaxed);
                stream.write(format!("received {} bytes\n", total).as_bytes())?;
            }
            Ok(Continuation::Done)
        }),
    )?;

    server.start().context("failed to start server")?;

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(tokio::signal::ctrl_c())?;
    tracing::info!("Shutdown signal received");

    server.stop()?;
    Ok(())
}
