//! Disconnect-reporting TCP server.
//!
//! Accepts connections, drains whatever the peer sends, and reports when the
//! peer goes away. It speaks no protocol. Callers use it to check that a
//! connect-and-close probe is noticed promptly.

mod connection;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::{broadcast, watch};
use tokio::task::{JoinHandle, JoinSet};

/// Channel capacity for connection events.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Pause after a failed accept, so persistent errors such as `EMFILE` do not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// How a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed its side (read returned end-of-file).
    Eof,
    /// Reading failed, typically a connection reset.
    Error(String),
}

/// A peer disconnected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerClosed {
    pub peer: SocketAddr,
    /// Payload bytes received before the close. Zero for a bare probe.
    pub bytes_received: u64,
    pub reason: CloseReason,
    /// Time between accept and close.
    pub open_for: Duration,
}

/// Connection lifecycle events, in the order the server observed them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened { peer: SocketAddr },
    Closed(PeerClosed),
}

/// State shared between the accept loop and connection tasks.
#[derive(Debug)]
pub(crate) struct Signals {
    events: broadcast::Sender<ConnectionEvent>,
    first_close: watch::Sender<Option<PeerClosed>>,
}

impl Signals {
    fn opened(&self, peer: SocketAddr) {
        let _ = self.events.send(ConnectionEvent::Opened { peer });
    }

    pub(crate) fn closed(&self, closed: PeerClosed) {
        self.first_close.send_if_modified(|slot| {
            if slot.is_none() {
                *slot = Some(closed.clone());
                true
            } else {
                false
            }
        });
        let _ = self.events.send(ConnectionEvent::Closed(closed));
    }
}

/// A listening server. Dropping it stops accepting and aborts open connections.
pub struct ProbeServer {
    local_addr: SocketAddr,
    signals: Arc<Signals>,
    first_close: watch::Receiver<Option<PeerClosed>>,
    accept_handle: JoinHandle<()>,
}

impl ProbeServer {
    /// Bind `host:port` (port 0 picks an ephemeral port) and start accepting.
    pub async fn bind(host: &str, port: u16) -> io::Result<Self> {
        Self::bind_addr((host, port)).await
    }

    pub async fn bind_addr(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Listening on {local_addr}");

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (first_close_tx, first_close) = watch::channel(None);
        let signals = Arc::new(Signals {
            events,
            first_close: first_close_tx,
        });

        let accept_handle = tokio::spawn(accept_loop(listener, signals.clone()));

        Ok(Self {
            local_addr,
            signals,
            first_close,
            accept_handle,
        })
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Resolves with the first peer disconnect.
    ///
    /// Resolves immediately if a peer already disconnected. Resolves with
    /// `None` if the server stops before any peer disconnects.
    pub fn disconnected(&self) -> impl Future<Output = Option<PeerClosed>> + Send + use<> {
        let mut rx = self.first_close.clone();
        async move {
            match rx.wait_for(Option::is_some).await {
                Ok(closed) => closed.clone(),
                Err(_) => None,
            }
        }
    }

    /// Subscribe to connection events observed from now on.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.signals.events.subscribe()
    }

    /// Stop accepting, close the listener and abort open connections.
    pub async fn shutdown(mut self) {
        self.accept_handle.abort();
        let _ = (&mut self.accept_handle).await;
        tracing::info!("Stopped listening on {}", self.local_addr);
    }
}

impl Drop for ProbeServer {
    fn drop(&mut self) {
        self.accept_handle.abort();
    }
}

async fn accept_loop(listener: TcpListener, signals: Arc<Signals>) {
    // Dropping the set on abort aborts every connection task with it.
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::info!("Connection from {peer}");
                    signals.opened(peer);
                    connections.spawn(connection::drain(stream, peer, signals.clone()));
                }
                Err(e) => accept_failed(&e).await,
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

async fn accept_failed(e: &io::Error) {
    tracing::warn!("Accept failed: {e}; retrying in {ACCEPT_BACKOFF:?}");
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn bare_probe_is_reported_with_zero_bytes() {
        let server = ProbeServer::bind("127.0.0.1", 0).await.expect("bind");
        let closed = server.disconnected();

        let stream = TcpStream::connect(server.local_addr()).await.expect("connect");
        let local = stream.local_addr().expect("local addr");
        drop(stream);

        let closed = timeout(WAIT, closed).await.expect("disconnect noticed").expect("closed");
        assert_eq!(closed.peer, local);
        assert_eq!(closed.bytes_received, 0);
        assert_eq!(closed.reason, CloseReason::Eof);
    }

    #[tokio::test]
    async fn payload_bytes_are_counted() {
        let server = ProbeServer::bind("127.0.0.1", 0).await.expect("bind");

        let mut stream = TcpStream::connect(server.local_addr()).await.expect("connect");
        stream.write_all(b"hello world").await.expect("write");
        stream.shutdown().await.expect("shutdown");
        drop(stream);

        let closed = timeout(WAIT, server.disconnected())
            .await
            .expect("disconnect noticed")
            .expect("closed");
        assert_eq!(closed.bytes_received, 11);
    }

    #[tokio::test]
    async fn events_report_open_then_close() {
        let server = ProbeServer::bind("127.0.0.1", 0).await.expect("bind");
        let mut events = server.events();

        let stream = TcpStream::connect(server.local_addr()).await.expect("connect");
        let local = stream.local_addr().expect("local addr");

        let opened = timeout(WAIT, events.recv()).await.expect("event").expect("recv");
        assert_eq!(opened, ConnectionEvent::Opened { peer: local });

        drop(stream);
        match timeout(WAIT, events.recv()).await.expect("event").expect("recv") {
            ConnectionEvent::Closed(closed) => assert_eq!(closed.peer, local),
            other @ ConnectionEvent::Opened { .. } => panic!("expected Closed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn disconnected_after_close_resolves_immediately() {
        let server = ProbeServer::bind("127.0.0.1", 0).await.expect("bind");
        let first = server.disconnected();

        drop(TcpStream::connect(server.local_addr()).await.expect("connect"));
        timeout(WAIT, first).await.expect("first close");

        let again = timeout(Duration::from_millis(100), server.disconnected())
            .await
            .expect("already closed");
        assert!(again.is_some());
    }

    #[tokio::test]
    async fn disconnected_is_none_when_server_stops_first() {
        let server = ProbeServer::bind("127.0.0.1", 0).await.expect("bind");
        let pending = server.disconnected();
        server.shutdown().await;

        assert_eq!(timeout(WAIT, pending).await.expect("resolves"), None);
    }

    #[tokio::test]
    async fn failed_accept_backs_off_before_retrying() {
        let started = std::time::Instant::now();
        accept_failed(&io::Error::from_raw_os_error(24)).await;
        assert!(started.elapsed() >= ACCEPT_BACKOFF);
    }

    #[tokio::test]
    async fn shutdown_closes_the_listener() {
        let server = ProbeServer::bind("127.0.0.1", 0).await.expect("bind");
        let addr = server.local_addr();
        server.shutdown().await;

        assert!(TcpStream::connect(addr).await.is_err());
    }
}
