// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of AgentSpaces.
//
// AgentSpaces is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// AgentSpaces is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with AgentSpaces. If not, see <https://www.gnu.org/licenses/>.

//! Deferred writes
//!
//! ## Purpose
//! `evaluate` hands the agent a computation that will eventually produce a
//! tuple. Computations are queued and awaited one at a time, in submission
//! order, by a single consumer loop that writes each result through the
//! agent's normal write path.
//!
//! ## Failure Handling
//! A computation that fails, panics or produces a tuple the write path
//! rejects is logged as an evaluation fault and counted. The loop keeps
//! going.
//!
//! ## Capacity
//! `0` selects an unbounded queue. A bounded queue makes `submit` wait for a
//! free slot.

use agentspaces_tuplespace::{Tuple, TupleSpaceError};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Computation producing a tuple to write
pub type Computation<T> = BoxFuture<'static, Result<T, TupleSpaceError>>;

/// Destination of evaluated tuples
#[async_trait]
pub trait TupleWriter<T: Tuple>: Send + Sync {
    /// Write a tuple into the space
    async fn write_tuple(&self, tuple: T) -> Result<(), TupleSpaceError>;
}

enum QueueSender<T> {
    Bounded(mpsc::Sender<Computation<T>>),
    Unbounded(mpsc::UnboundedSender<Computation<T>>),
}

enum QueueReceiver<T> {
    Bounded(mpsc::Receiver<Computation<T>>),
    Unbounded(mpsc::UnboundedReceiver<Computation<T>>),
}

impl<T> QueueReceiver<T> {
    async fn recv(&mut self) -> Option<Computation<T>> {
        match self {
            QueueReceiver::Bounded(rx) => rx.recv().await,
            QueueReceiver::Unbounded(rx) => rx.recv().await,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    completed: AtomicU64,
    faulted: AtomicU64,
}

/// FIFO queue of computations with a single consumer
pub struct EvaluationQueue<T> {
    sender: QueueSender<T>,
    receiver: Mutex<Option<QueueReceiver<T>>>,
    counters: Arc<Counters>,
}

impl<T: Tuple> EvaluationQueue<T> {
    /// Create a queue; `capacity == 0` means unbounded
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = if capacity == 0 {
            let (tx, rx) = mpsc::unbounded_channel();
            (QueueSender::Unbounded(tx), QueueReceiver::Unbounded(rx))
        } else {
            let (tx, rx) = mpsc::channel(capacity);
            (QueueSender::Bounded(tx), QueueReceiver::Bounded(rx))
        };

        EvaluationQueue {
            sender,
            receiver: Mutex::new(Some(receiver)),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Enqueue a computation
    ///
    /// ## Errors
    /// - `NotInitialized` once the consumer loop has stopped
    pub async fn submit(&self, computation: Computation<T>) -> Result<(), TupleSpaceError> {
        let sent = match &self.sender {
            QueueSender::Bounded(tx) => tx.send(computation).await.is_ok(),
            QueueSender::Unbounded(tx) => tx.send(computation).is_ok(),
        };
        if sent {
            Ok(())
        } else {
            Err(TupleSpaceError::NotInitialized)
        }
    }

    /// Computations written successfully
    pub fn completed(&self) -> u64 {
        self.counters.completed.load(Ordering::Relaxed)
    }

    /// Computations that ended in a fault
    pub fn faulted(&self) -> u64 {
        self.counters.faulted.load(Ordering::Relaxed)
    }

    /// Start the consumer loop
    ///
    /// The loop holds only a weak reference to `writer` and stops when the
    /// writer is gone or `shutdown` is cancelled. Returns `None` if the loop
    /// was already started.
    pub fn start<W>(&self, writer: Weak<W>, shutdown: CancellationToken) -> Option<JoinHandle<()>>
    where
        W: TupleWriter<T> + 'static,
    {
        let mut receiver = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        let counters = self.counters.clone();

        Some(tokio::spawn(async move {
            loop {
                let computation = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    next = receiver.recv() => match next {
                        Some(computation) => computation,
                        None => break,
                    },
                };

                let outcome = match AssertUnwindSafe(computation).catch_unwind().await {
                    Ok(Ok(tuple)) => {
                        let Some(writer) = writer.upgrade() else {
                            break;
                        };
                        writer.write_tuple(tuple).await
                    }
                    Ok(Err(err)) => Err(err),
                    Err(_) => Err(TupleSpaceError::EvaluationFault(
                        "computation panicked".to_string(),
                    )),
                };

                match outcome {
                    Ok(()) => {
                        counters.completed.fetch_add(1, Ordering::Relaxed);
                        metrics::counter!("agentspaces_agent_evaluations_total").increment(1);
                    }
                    Err(err) => {
                        let fault = match err {
                            TupleSpaceError::EvaluationFault(reason) => reason,
                            other => other.to_string(),
                        };
                        tracing::error!(error = %TupleSpaceError::EvaluationFault(fault), "evaluation failed");
                        counters.faulted.fetch_add(1, Ordering::Relaxed);
                        metrics::counter!("agentspaces_agent_evaluation_faults_total").increment(1);
                    }
                }
            }
            tracing::debug!("evaluation loop stopped");
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentspaces_tuplespace::I32Tuple;
    use std::time::Duration;
    use tokio::sync::Mutex as AsyncMutex;

    #[derive(Default)]
    struct Collector {
        written: AsyncMutex<Vec<I32Tuple>>,
    }

    #[async_trait]
    impl TupleWriter<I32Tuple> for Collector {
        async fn write_tuple(&self, tuple: I32Tuple) -> Result<(), TupleSpaceError> {
            if tuple.is_empty() {
                return Err(TupleSpaceError::EmptyTuple);
            }
            self.written.lock().await.push(tuple);
            Ok(())
        }
    }

    async fn explode() -> Result<I32Tuple, TupleSpaceError> {
        panic!("computation exploded")
    }

    async fn wait_for(queue: &EvaluationQueue<I32Tuple>, total: u64) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while queue.completed() + queue.faulted() < total {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("evaluation did not finish");
    }

    #[tokio::test]
    async fn test_results_are_written_in_submission_order() {
        let collector = Arc::new(Collector::default());
        let queue = EvaluationQueue::new(0);
        queue.start(Arc::downgrade(&collector), CancellationToken::new());

        queue
            .submit(Box::pin(async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok(I32Tuple::from([1]))
            }))
            .await
            .unwrap();
        queue
            .submit(Box::pin(async { Ok(I32Tuple::from([2])) }))
            .await
            .unwrap();

        wait_for(&queue, 2).await;
        let written = collector.written.lock().await.clone();
        assert_eq!(written, vec![I32Tuple::from([1]), I32Tuple::from([2])]);
    }

    #[tokio::test]
    async fn test_faults_do_not_stop_the_loop() {
        let collector = Arc::new(Collector::default());
        let queue = EvaluationQueue::new(2);
        queue.start(Arc::downgrade(&collector), CancellationToken::new());

        queue
            .submit(Box::pin(async {
                Err(TupleSpaceError::EvaluationFault("bad input".to_string()))
            }))
            .await
            .unwrap();
        queue
            .submit(Box::pin(explode()))
            .await
            .unwrap();
        queue
            .submit(Box::pin(async { Ok(I32Tuple::empty()) }))
            .await
            .unwrap();
        queue
            .submit(Box::pin(async { Ok(I32Tuple::from([7])) }))
            .await
            .unwrap();

        wait_for(&queue, 4).await;
        assert_eq!(queue.faulted(), 3);
        assert_eq!(queue.completed(), 1);
        assert_eq!(*collector.written.lock().await, vec![I32Tuple::from([7])]);
    }

    #[tokio::test]
    async fn test_start_runs_once_and_stops_on_shutdown() {
        let collector = Arc::new(Collector::default());
        let queue = EvaluationQueue::new(0);
        let token = CancellationToken::new();

        let handle = queue.start(Arc::downgrade(&collector), token.clone());
        assert!(handle.is_some());
        assert!(queue.start(Arc::downgrade(&collector), token.clone()).is_none());

        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle.unwrap())
            .await
            .expect("loop did not stop")
            .unwrap();

        let err = queue
            .submit(Box::pin(async { Ok(I32Tuple::from([1])) }))
            .await
            .unwrap_err();
        assert_eq!(err, TupleSpaceError::NotInitialized);
    }
}
