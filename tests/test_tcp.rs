mod common;

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use kiln::HttpServerError;
use kiln::config::ServerConfig;
use kiln::resource::registry::{Continuation, ResourceContent};
use kiln::server::HttpServer;
use kiln::transport::tcp::TcpTransport;

use common::wait_until;

fn read_exactly(client: &mut TcpStream, len: usize) -> String {
    let mut buf = vec![0u8; len];
    client.read_exact(&mut buf).unwrap();
    String::from_utf8(buf).unwrap()
}

fn loopback_server() -> (HttpServer, Arc<TcpTransport>) {
    let config = ServerConfig {
        port: 0,
        max_connections: 2,
        ..ServerConfig::default()
    };
    let transport = Arc::new(TcpTransport::new(config.listen_addr()));
    let mut server = HttpServer::new(config, transport.clone());
    server
        .register("/a.html", "text/html", ResourceContent::static_bytes(&b"<h1>A</h1>"[..]))
        .unwrap();
    server
        .register(
            "/echo",
            "text/plain",
            ResourceContent::dynamic(|_, query, stream, _| {
                stream.write(query.unwrap_or("-").as_bytes())?;
                Ok(Continuation::Done)
            }),
        )
        .unwrap();
    server.start().unwrap();
    (server, transport)
}

#[test]
fn test_tcp_round_trip() {
    let (mut server, transport) = loopback_server();
    let addr = transport.local_addr().unwrap();

    let mut client = TcpStream::connect(addr).unwrap();
    client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

    client.write_all(b"GET /a.html HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();
    let expected = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: Keep-Alive\r\nContent-Length: 10\r\n\r\n<h1>A</h1>";
    assert_eq!(read_exactly(&mut client, expected.len()), expected);

    client.write_all(b"GET /echo?hi HTTP/1.1\r\n\r\n").unwrap();
    let header = "HTTP/1.1 200 OK\r\n\
        Content-Type: text/plain\r\n\
        Cache-Control: no-store, no-cache, must-revalidate, post-check=0, pre-check=0\r\n\
        Pragma: no-cache\r\n\
        Connection: Keep-Alive\r\n\
        Transfer-Encoding: chunked\r\n\
        \r\n";
    let expected = format!("{}2\r\nhi\r\n0\r\n\r\n", header);
    assert_eq!(read_exactly(&mut client, expected.len()), expected);

    drop(client);
    assert!(wait_until(|| server.active_connections() == 0));

    server.stop().unwrap();
    assert!(transport.local_addr().is_none());
}

#[test]
fn test_tcp_connection_close() {
    let (mut server, transport) = loopback_server();
    let mut client = TcpStream::connect(transport.local_addr().unwrap()).unwrap();
    client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

    client
        .write_all(b"GET /missing HTTP/1.1\r\nConnection: close\r\n\r\n")
        .unwrap();

    let mut response = String::new();
    client.read_to_string(&mut response).unwrap();
    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(response.ends_with("Content-Length: 0\r\n\r\n"));

    server.stop().unwrap();
}

#[test]
fn test_tcp_bind_failure_is_reported() {
    let (mut first, transport) = loopback_server();
    let taken = transport.local_addr().unwrap();

    let config = ServerConfig {
        port: taken.port(),
        ..ServerConfig::default()
    };
    let mut second = HttpServer::new(config.clone(), Arc::new(TcpTransport::new(config.listen_addr())));

    assert!(matches!(second.start(), Err(HttpServerError::TransportStart(_))));
    assert!(!second.is_running());
    first.stop().unwrap();
}
