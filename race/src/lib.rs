//! Bounded race coordinator.
//!
//! [`await_all`] waits for a set of independent operations until every one
//! has completed or a deadline passes, then reports which ones are still
//! outstanding. It only observes the operations: nothing is cancelled, and
//! the operations that missed the deadline are handed back unchanged so the
//! caller can keep waiting on them or clean them up.
//!
//! Operations are polled on the calling task. Wakeups come from the
//! operations themselves and from a single `tokio` timer.

use std::fmt;
use std::future::{Future, poll_fn};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;

/// One labelled asynchronous unit of work, pending until its future completes.
///
/// The output of the wrapped future is discarded; only completion matters.
pub struct PendingOperation<'a> {
    label: String,
    future: BoxFuture<'a, ()>,
}

impl<'a> PendingOperation<'a> {
    pub fn new<F>(label: impl Into<String>, future: F) -> Self
    where
        F: Future + Send + 'a,
    {
        Self {
            label: label.into(),
            future: future.map(drop).boxed(),
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for PendingOperation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingOperation")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Awaiting a straggler continues the original operation.
impl Future for PendingOperation<'_> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.future.as_mut().poll(cx)
    }
}

/// An operation that finished before the deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub label: String,
    /// Time from the start of the race until the operation completed.
    pub after: Duration,
}

/// What [`await_all`] observed.
#[derive(Debug)]
pub struct RaceResult<'a> {
    stragglers: Vec<PendingOperation<'a>>,
    completed: Vec<Completion>,
    elapsed: Duration,
}

impl<'a> RaceResult<'a> {
    /// True when no operation was left pending.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.stragglers.is_empty()
    }

    /// Operations still pending at the deadline, in submission order.
    #[must_use]
    pub fn stragglers(&self) -> &[PendingOperation<'a>] {
        &self.stragglers
    }

    #[must_use]
    pub fn straggler_labels(&self) -> Vec<String> {
        self.stragglers.iter().map(|op| op.label.clone()).collect()
    }

    /// Completed operations, in completion order.
    #[must_use]
    pub fn completed(&self) -> &[Completion] {
        &self.completed
    }

    /// Time spent waiting.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    #[must_use]
    pub fn into_stragglers(self) -> Vec<PendingOperation<'a>> {
        self.stragglers
    }
}

/// Wait until every operation completes or `deadline` elapses, whichever is first.
///
/// Every operation is polled at least once, so a zero deadline still reports
/// already-finished operations as completed.
pub async fn await_all<'a, I>(operations: I, deadline: Duration) -> RaceResult<'a>
where
    I: IntoIterator<Item = PendingOperation<'a>>,
{
    let started = Instant::now();
    let mut slots: Vec<Option<PendingOperation<'a>>> = operations.into_iter().map(Some).collect();
    let mut completed = Vec::with_capacity(slots.len());

    let all_done = poll_fn(|cx| {
        let mut outstanding = 0usize;
        for slot in &mut slots {
            let Some(op) = slot else { continue };
            if op.future.as_mut().poll(cx).is_ready() {
                let after = started.elapsed();
                tracing::debug!("Operation '{}' completed after {after:?}", op.label);
                completed.push(Completion {
                    label: std::mem::take(&mut op.label),
                    after,
                });
                *slot = None;
            } else {
                outstanding += 1;
            }
        }
        if outstanding == 0 {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    });

    let timed_out = tokio::time::timeout(deadline, all_done).await.is_err();
    let elapsed = started.elapsed();

    let stragglers: Vec<PendingOperation<'a>> = slots.into_iter().flatten().collect();
    if timed_out {
        tracing::warn!(
            "Deadline {deadline:?} expired with {} operation(s) pending: [{}]",
            stragglers.len(),
            stragglers
                .iter()
                .map(PendingOperation::label)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    RaceResult {
        stragglers,
        completed,
        elapsed,
    }
}
