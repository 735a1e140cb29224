//! A join barrier over independent async outcomes.
//!
//! Futures are pushed with their position in the request and yielded back in
//! completion order. The barrier knows how many are still outstanding, so the
//! caller can tell which outcome is the last one without keeping a counter of
//! its own.

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::future::Future;

/// One settled outcome.
#[derive(Debug)]
pub struct Settled<T> {
    /// Position the future was pushed at.
    pub index: usize,
    pub value: T,
    /// Outcomes still outstanding after this one.
    pub remaining: usize,
}

impl<T> Settled<T> {
    /// True for the outcome that completes the barrier.
    pub fn is_last(&self) -> bool {
        self.remaining == 0
    }
}

pub struct SettleBarrier<T> {
    pending: FuturesUnordered<BoxFuture<'static, (usize, T)>>,
    pushed: usize,
}

impl<T: Send + 'static> SettleBarrier<T> {
    pub fn new() -> Self {
        Self {
            pending: FuturesUnordered::new(),
            pushed: 0,
        }
    }

    /// Add a future. Returns the index it will be reported under.
    pub fn push<F>(&mut self, fut: F) -> usize
    where
        F: Future<Output = T> + Send + 'static,
    {
        let index = self.pushed;
        self.pushed += 1;
        self.pending.push(fut.map(move |value| (index, value)).boxed());
        index
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Wait for the next outcome. `None` once every pushed future has settled.
    pub async fn next(&mut self) -> Option<Settled<T>> {
        let (index, value) = self.pending.next().await?;
        Some(Settled {
            index,
            value,
            remaining: self.pending.len(),
        })
    }
}

impl<T: Send + 'static> Default for SettleBarrier<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_empty_barrier_settles_immediately() {
        let mut barrier: SettleBarrier<u32> = SettleBarrier::new();
        assert!(barrier.next().await.is_none());
        assert_eq!(barrier.remaining(), 0);
    }

    #[tokio::test]
    async fn test_exactly_one_last_outcome() {
        let mut barrier = SettleBarrier::new();
        for i in 0..5u64 {
            barrier.push(async move {
                tokio::time::sleep(Duration::from_millis((5 - i) * 3)).await;
                if i % 2 == 0 {
                    Ok(i)
                } else {
                    Err(format!("overlay {} failed", i))
                }
            });
        }
        assert_eq!(barrier.remaining(), 5);

        let mut seen = Vec::new();
        let mut last_count = 0;
        while let Some(settled) = barrier.next().await {
            if settled.is_last() {
                last_count += 1;
            }
            seen.push(settled.index);
        }
        assert_eq!(last_count, 1);
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_yields_in_completion_order() {
        let (tx_a, rx_a) = oneshot::channel::<&str>();
        let (tx_b, rx_b) = oneshot::channel::<&str>();
        let mut barrier = SettleBarrier::new();
        barrier.push(async move { rx_a.await.unwrap_or("dropped") });
        barrier.push(async move { rx_b.await.unwrap_or("dropped") });

        tx_b.send("b").unwrap();
        let first = barrier.next().await.unwrap();
        assert_eq!((first.index, first.value, first.remaining), (1, "b", 1));

        tx_a.send("a").unwrap();
        let second = barrier.next().await.unwrap();
        assert_eq!((second.index, second.value), (0, "a"));
        assert!(second.is_last());
    }
}
