//! Per-connection task: drain the peer until it goes away.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use crate::{CloseReason, PeerClosed, Signals};

const READ_BUFFER_SIZE: usize = 4096;

pub(crate) async fn drain(mut stream: TcpStream, peer: SocketAddr, signals: Arc<Signals>) {
    let opened_at = Instant::now();
    let mut buf = [0u8; READ_BUFFER_SIZE];
    let mut bytes_received = 0u64;

    let reason = loop {
        match stream.read(&mut buf).await {
            Ok(0) => break CloseReason::Eof,
            Ok(n) => bytes_received += n as u64,
            Err(e) => break CloseReason::Error(e.to_string()),
        }
    };

    let open_for = opened_at.elapsed();
    match &reason {
        CloseReason::Eof => {
            tracing::info!("Connection from {peer} closed after {open_for:?} ({bytes_received} bytes)");
        }
        CloseReason::Error(e) => {
            tracing::info!("Connection from {peer} lost after {open_for:?}: {e}");
        }
    }

    signals.closed(PeerClosed {
        peer,
        bytes_received,
        reason,
        open_for,
    });
}
