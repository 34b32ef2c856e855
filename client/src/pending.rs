//! Drain counter for the async strategy
//!
//! Every accepted event owns exactly one pending unit until it reaches a
//! terminal outcome (delivered or dropped). `graceful_stop` waits on the
//! counter reaching zero, which is what makes shutdown lossless.

use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::Notify;

pub(crate) struct Pending {
    count: AtomicI64,
    zero: Notify,
}

impl Pending {
    pub(crate) fn new() -> Self {
        Self {
            count: AtomicI64::new(0),
            zero: Notify::new(),
        }
    }

    pub(crate) fn add(&self, n: i64) {
        self.count.fetch_add(n, Ordering::AcqRel);
    }

    pub(crate) fn done(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.zero.notify_waiters();
        }
    }

    /// Wait until the count reaches zero. Returns immediately if it
    /// already is.
    pub(crate) async fn wait(&self) {
        loop {
            // register interest before checking, so a concurrent done()
            // cannot slip between the check and the await
            let notified = self.zero.notified();
            if self.count.load(Ordering::Acquire) <= 0 {
                return;
            }
            notified.await;
        }
    }

    #[cfg(test)]
    pub(crate) fn count(&self) -> i64 {
        self.count.load(Ordering::Acquire)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_returns_immediately_at_zero() {
        let pending = Pending::new();
        pending.wait().await;
    }

    #[tokio::test]
    async fn wait_blocks_until_all_units_done() {
        let pending = Arc::new(Pending::new());
        pending.add(3);

        let waiter = {
            let pending = Arc::clone(&pending);
            tokio::spawn(async move { pending.wait().await })
        };

        pending.done();
        pending.done();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        pending.done();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pending.count(), 0);
    }

    #[tokio::test]
    async fn add_then_done_nets_zero() {
        let pending = Pending::new();
        pending.add(1);
        pending.done();
        assert_eq!(pending.count(), 0);
        pending.wait().await;
    }
}
