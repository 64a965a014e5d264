//! Deferred query results.

use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Result of a terminal query operation.
///
/// Settled exactly once, while the terminal call runs; the value is
/// observed by awaiting. `None` means no stub answered the query.
#[derive(Debug)]
pub struct Deferred {
    rx: oneshot::Receiver<Option<Value>>,
}

impl Deferred {
    /// Create a deferred and the handle that settles it.
    pub(crate) fn channel() -> (Resolver, Self) {
        let (tx, rx) = oneshot::channel();
        (Resolver { tx }, Self { rx })
    }

    /// Deferred that is already settled with `value`.
    pub fn resolved(value: Option<Value>) -> Self {
        let (resolver, deferred) = Self::channel();
        resolver.resolve(value);
        deferred
    }
}

impl Future for Deferred {
    type Output = Option<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A dropped resolver settles as "no data".
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(None))
    }
}

/// Settles a [`Deferred`].
#[derive(Debug)]
pub(crate) struct Resolver {
    tx: oneshot::Sender<Option<Value>>,
}

impl Resolver {
    pub(crate) fn resolve(self, value: Option<Value>) {
        // The receiver may already be gone if the caller ignored the result.
        let _ = self.tx.send(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    #[test]
    fn test_resolved_is_ready_on_first_poll() {
        let mut deferred = task::spawn(Deferred::resolved(Some(json!({"_id": 1}))));
        assert_ready_eq!(deferred.poll(), Some(json!({"_id": 1})));
    }

    #[test]
    fn test_pending_until_resolved() {
        let (resolver, deferred) = Deferred::channel();
        let mut deferred = task::spawn(deferred);
        assert_pending!(deferred.poll());

        resolver.resolve(Some(json!([1, 2])));
        assert!(deferred.is_woken());
        assert_ready_eq!(deferred.poll(), Some(json!([1, 2])));
    }

    #[tokio::test]
    async fn test_dropped_resolver_yields_none() {
        let (resolver, deferred) = Deferred::channel();
        drop(resolver);
        assert_eq!(deferred.await, None);
    }

    #[tokio::test]
    async fn test_resolve_after_receiver_dropped() {
        let (resolver, deferred) = Deferred::channel();
        drop(deferred);
        resolver.resolve(Some(json!(1)));
    }
}
