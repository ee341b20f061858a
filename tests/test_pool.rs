mod common;

use kiln::HttpServerError;
use kiln::http::connection::ConnectionState;
use kiln::server::events;
use kiln::server::pool::StreamPool;
use kiln::transport::SocketId;

use common::MemoryTransport;

fn pool(capacity: usize) -> StreamPool {
    let (notifier, _receivers) = events::channel(10, 20).unwrap();
    StreamPool::new(capacity, MemoryTransport::new(), notifier, 8192).unwrap()
}

#[test]
fn test_pool_allocate_until_exhausted() {
    let pool = pool(2);
    assert_eq!(pool.capacity(), 2);

    let a = pool.allocate(SocketId(1)).unwrap();
    assert_eq!(a.response().socket(), Some(SocketId(1)));
    assert_eq!(a.state(), ConnectionState::AwaitingHeaders);
    assert!(pool.allocate(SocketId(2)).is_some());

    assert!(!pool.has_capacity());
    assert!(pool.allocate(SocketId(3)).is_none());
    assert_eq!(pool.active_count(), 2);
}

#[test]
fn test_pool_release_returns_slot() {
    let pool = pool(1);
    let stream = pool.allocate(SocketId(7)).unwrap();

    assert_eq!(pool.release(SocketId(7)), Some(SocketId(7)));
    assert_eq!(stream.state(), ConnectionState::Inactive);
    assert_eq!(pool.active_count(), 0);
    assert!(pool.find(SocketId(7)).is_none());

    let reused = pool.allocate(SocketId(8)).unwrap();
    assert_eq!(reused.response().socket(), Some(SocketId(8)));
}

#[test]
fn test_pool_reused_slot_keeps_new_socket() {
    let pool = pool(1);
    let first = pool.allocate(SocketId(1)).unwrap();
    pool.release(SocketId(1)).unwrap();

    let second = pool.allocate(SocketId(2)).unwrap();
    assert!(std::ptr::eq(first, second));
    assert_eq!(pool.find(SocketId(2)).unwrap().response().socket(), Some(SocketId(2)));

    assert!(pool.release_orphans().is_empty());
    assert_eq!(pool.active_sockets(), vec![SocketId(2)]);
}

#[test]
fn test_pool_release_unknown_socket() {
    let pool = pool(1);
    assert!(pool.release(SocketId(99)).is_none());
    assert!(pool.has_capacity());
}

#[test]
fn test_pool_find_by_socket() {
    let pool = pool(3);
    pool.allocate(SocketId(1)).unwrap();
    pool.allocate(SocketId(2)).unwrap();

    let found = pool.find(SocketId(2)).unwrap();
    assert_eq!(found.response().socket(), Some(SocketId(2)));
    assert!(pool.find(SocketId(3)).is_none());
}

#[test]
fn test_pool_release_orphans() {
    let pool = pool(2);
    pool.allocate(SocketId(1)).unwrap();
    let orphan = pool.allocate(SocketId(2)).unwrap();
    orphan.close();

    assert_eq!(pool.release_orphans(), vec![SocketId(2)]);
    assert_eq!(pool.active_sockets(), vec![SocketId(1)]);
    assert!(pool.has_capacity());
}

#[test]
fn test_pool_drain() {
    let pool = pool(3);
    for id in 1..=3 {
        pool.allocate(SocketId(id)).unwrap();
    }

    let first = pool.find(SocketId(1)).unwrap();

    let drained = pool.drain();
    assert_eq!(drained.len(), 3);
    assert_eq!(pool.active_count(), 0);
    assert_eq!(first.state(), ConnectionState::Inactive);
    for id in 1..=3 {
        assert!(pool.allocate(SocketId(10 + id)).is_some());
    }
}

#[test]
fn test_pool_rejects_zero_capacity() {
    let (notifier, _receivers) = events::channel(10, 20).unwrap();
    let result = StreamPool::new(0, MemoryTransport::new(), notifier, 8192);
    assert!(matches!(result, Err(HttpServerError::BadArgument(_))));
}

#[test]
fn test_event_channel_rejects_zero_depth() {
    assert!(matches!(events::channel(0, 20), Err(HttpServerError::QueueInit(_))));
}

#[test]
fn test_detached_stream_rejects_writes() {
    let pool = pool(1);
    let stream = pool.allocate(SocketId(1)).unwrap();
    stream.close();

    assert!(matches!(stream.response().write(b"x"), Err(HttpServerError::BadArgument(_))));
    assert!(matches!(stream.response().flush(), Err(HttpServerError::BadArgument(_))));
    assert!(matches!(stream.response().disconnect(), Err(HttpServerError::BadArgument(_))));
}
