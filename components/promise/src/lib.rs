//! Blank futures: result handles issued before their backing computation
//! exists.
//!
//! A [`BlankFutureProvider`] hands out placeholders immediately and tracks
//! them until a triggering event occurs; at that point the owner takes a
//! [`FulfillmentBatch`] and either links every pending placeholder to a real
//! source of results or fails them all. The batch is fully detached from the
//! provider, so fulfilling it never contends with new registrations.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use log::trace;
use model::Status;
use tokio::sync::oneshot;

/// Issues blank futures on request and later fulfills them in batches.
///
/// The provider itself is not synchronized, mirroring its single-owner usage:
/// wrap it in whatever cell or lock the owner already holds.
pub struct BlankFutureProvider<T> {
    pending: Vec<oneshot::Sender<Result<T, Status>>>,
}

impl<T> Default for BlankFutureProvider<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BlankFutureProvider<T> {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Allocate a new unresolved handle and track it for the next batch.
    pub fn new_blank_future(&mut self) -> BlankFuture<T> {
        let (sender, receiver) = oneshot::channel();
        self.pending.push(sender);
        BlankFuture { receiver }
    }

    /// Number of placeholders waiting for the next batch.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Detach every currently tracked placeholder into a batch.
    ///
    /// The provider starts over with an empty list: a placeholder created
    /// after this call belongs to the next batch, never to the returned one,
    /// and the returned batch shares no further state with the provider.
    pub fn create_fulfillment_batch(&mut self) -> FulfillmentBatch<T> {
        let senders = std::mem::take(&mut self.pending);
        trace!("Detached {} placeholder(s) into a fulfillment batch", senders.len());
        FulfillmentBatch { senders }
    }
}

/// A result handle issued before its source exists.
///
/// Resolves once its batch is linked or failed. If the batch is dropped
/// without either, the handle resolves with a cancelled status.
pub struct BlankFuture<T> {
    receiver: oneshot::Receiver<Result<T, Status>>,
}

impl<T> Future for BlankFuture<T> {
    type Output = Result<T, Status>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.get_mut().receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Status::cancelled()
                .with_message("Fulfillment batch dropped before completion"))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// A detached set of placeholders about to be fulfilled.
///
/// Both operations consume the batch, so a drained batch exposes no further
/// mutation. Each placeholder belongs to exactly one batch, ever.
pub struct FulfillmentBatch<T> {
    senders: Vec<oneshot::Sender<Result<T, Status>>>,
}

impl<T> FulfillmentBatch<T> {
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Link every placeholder to a fresh future obtained from `source`,
    /// forwarding each source's success or failure verbatim.
    ///
    /// `source` is invoked once per placeholder. The returned future drives
    /// all links to completion; placeholders whose receiving end was dropped
    /// are skipped silently.
    pub async fn link<Src, Fut>(self, mut source: Src)
    where
        Src: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Status>>,
    {
        let links: Vec<_> = self
            .senders
            .into_iter()
            .map(|sender| {
                let fut = source();
                async move {
                    let _ = sender.send(fut.await);
                }
            })
            .collect();
        futures::future::join_all(links).await;
    }

    /// Fail every placeholder in the batch with `status`.
    pub fn fail(self, status: Status) {
        for sender in self.senders {
            let _ = sender.send(Err(status.clone()));
        }
    }
}
