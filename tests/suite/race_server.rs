//! The race coordinator over a live server notification and other work.

use std::time::Duration;

use netprobe_race::{PendingOperation, await_all};
use netprobe_server::{CloseReason, ProbeServer};
use tokio::net::TcpStream;

#[tokio::test]
async fn disconnect_and_client_task_complete_together() {
    let server = ProbeServer::bind("127.0.0.1", 0).await.expect("bind");
    let addr = server.local_addr();

    let client = tokio::spawn(async move {
        let stream = TcpStream::connect(addr).await.expect("connect");
        drop(stream);
    });

    let result = await_all(
        [
            PendingOperation::new("client", client),
            PendingOperation::new("disconnect", server.disconnected()),
        ],
        Duration::from_secs(5),
    )
    .await;

    assert!(result.is_complete(), "stragglers: {:?}", result.straggler_labels());
    assert_eq!(result.completed().len(), 2);
}

#[tokio::test]
async fn idle_server_leaves_the_disconnect_as_a_straggler() {
    let server = ProbeServer::bind("127.0.0.1", 0).await.expect("bind");

    let result = await_all(
        [PendingOperation::new("disconnect", server.disconnected())],
        Duration::from_millis(100),
    )
    .await;
    assert_eq!(result.straggler_labels(), ["disconnect"]);

    // The straggler is still live: a late probe completes it.
    let mut stragglers = result.into_stragglers();
    drop(TcpStream::connect(server.local_addr()).await.expect("connect"));
    tokio::time::timeout(Duration::from_secs(5), stragglers.remove(0))
        .await
        .expect("late disconnect observed");

    let closed = server.disconnected().await.expect("closed");
    assert_eq!(closed.reason, CloseReason::Eof);
    assert_eq!(closed.bytes_received, 0);
}
