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

//! Pending continuations waiting for a matching tuple
//!
//! ## Purpose
//! Turns "call me when a tuple matching this template shows up" into an
//! exactly-once continuation. Readers (non-removing entries) all fire on the
//! first matching insert. Takers (removing entries) compete: only the oldest
//! matching taker is offered each insert, and it fires only if the agent
//! manages to remove the tuple from the store.
//!
//! ## Guarantees
//! - An entry is detached from the registry under its lock before it fires,
//!   so overlapping resolves can never fire it twice
//! - A taker whose claim fails goes back to its original position unless it
//!   was cancelled while the claim was in flight
//! - A panicking continuation is logged and contained; the remaining
//!   continuations and the caller of `resolve` carry on

use agentspaces_tuplespace::{Template, Tuple, TupleSpaceError};
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Continuation invoked with the matched tuple
pub type Continuation<T> = Box<dyn FnOnce(T) + Send + 'static>;

/// Handle of a registered continuation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(u64);

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cb-{}", self.0)
    }
}

struct CallbackEntry<T: Tuple> {
    id: CallbackId,
    template: T::Template,
    continuation: Continuation<T>,
    removing: bool,
}

struct RegistryState<T: Tuple> {
    /// Sorted by id, i.e. registration order
    entries: Vec<CallbackEntry<T>>,
    in_flight: HashSet<CallbackId>,
    cancelled: HashSet<CallbackId>,
}

/// What a single resolve did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOutcome {
    /// Non-removing continuations fired
    pub readers: usize,
    /// Whether a removing continuation claimed the tuple
    pub taken: bool,
}

/// Registry of pending continuations
pub struct CallbackRegistry<T: Tuple> {
    next_id: AtomicU64,
    state: Mutex<RegistryState<T>>,
}

impl<T: Tuple> CallbackRegistry<T> {
    /// Create an empty registry
    pub fn new() -> Self {
        CallbackRegistry {
            next_id: AtomicU64::new(1),
            state: Mutex::new(RegistryState {
                entries: Vec::new(),
                in_flight: HashSet::new(),
                cancelled: HashSet::new(),
            }),
        }
    }

    /// Register a continuation for the next tuple matching `template`
    pub async fn register(
        &self,
        template: T::Template,
        continuation: Continuation<T>,
        removing: bool,
    ) -> CallbackId {
        let id = CallbackId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.state.lock().await.entries.push(CallbackEntry {
            id,
            template,
            continuation,
            removing,
        });
        id
    }

    /// Cancel a pending continuation
    ///
    /// ## Returns
    /// `true` if the continuation had not fired yet
    pub async fn deregister(&self, id: CallbackId) -> bool {
        let mut state = self.state.lock().await;
        if let Some(position) = state.entries.iter().position(|entry| entry.id == id) {
            state.entries.remove(position);
            return true;
        }
        if state.in_flight.contains(&id) {
            state.cancelled.insert(id);
            return true;
        }
        false
    }

    /// Drop every pending continuation without firing it
    pub async fn clear(&self) -> usize {
        let mut state = self.state.lock().await;
        let dropped = state.entries.len();
        state.entries.clear();
        dropped
    }

    /// Number of pending continuations
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    /// Whether nothing is pending
    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }

    /// Fire the continuations interested in a newly inserted tuple
    ///
    /// `claim` is called at most once, and only if a removing entry matched;
    /// it must remove the tuple from the store and report whether this agent
    /// got it.
    pub async fn resolve<F, Fut>(&self, tuple: &T, claim: F) -> ResolveOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<bool, TupleSpaceError>>,
    {
        let (readers, taker) = {
            let mut state = self.state.lock().await;
            let mut readers = Vec::new();
            let mut taker = None;

            for entry in std::mem::take(&mut state.entries) {
                if entry.template.matches(tuple) {
                    if !entry.removing {
                        readers.push(entry);
                        continue;
                    }
                    if taker.is_none() {
                        taker = Some(entry);
                        continue;
                    }
                }
                state.entries.push(entry);
            }

            if let Some(taker) = &taker {
                state.in_flight.insert(taker.id);
            }
            (readers, taker)
        };

        let mut outcome = ResolveOutcome {
            readers: readers.len(),
            taken: false,
        };
        for reader in readers {
            fire(reader.id, reader.continuation, tuple.clone());
        }

        let Some(taker) = taker else {
            return outcome;
        };

        let claimed = claim().await;

        let mut state = self.state.lock().await;
        state.in_flight.remove(&taker.id);
        let cancelled = state.cancelled.remove(&taker.id);

        match claimed {
            Ok(true) => {
                drop(state);
                outcome.taken = true;
                fire(taker.id, taker.continuation, tuple.clone());
            }
            Ok(false) if cancelled => {}
            Ok(false) => {
                let position = state.entries.partition_point(|entry| entry.id < taker.id);
                state.entries.insert(position, taker);
            }
            Err(err) => {
                tracing::warn!(callback_id = %taker.id, error = %err, "claim failed");
                if !cancelled {
                    let position = state.entries.partition_point(|entry| entry.id < taker.id);
                    state.entries.insert(position, taker);
                }
            }
        }

        outcome
    }
}

fn fire<T>(id: CallbackId, continuation: Continuation<T>, tuple: T) {
    if panic::catch_unwind(AssertUnwindSafe(move || continuation(tuple))).is_err() {
        tracing::warn!(callback_id = %id, "continuation panicked");
        metrics::counter!("agentspaces_agent_continuation_panics_total").increment(1);
    }
}

impl<T: Tuple> Default for CallbackRegistry<T> {
    fn default() -> Self {
        CallbackRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentspaces_tuplespace::{I32Template, I32Tuple};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn counting(counter: &Arc<AtomicUsize>) -> Continuation<I32Tuple> {
        let counter = counter.clone();
        Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn exploding() -> Continuation<I32Tuple> {
        Box::new(|_: I32Tuple| {
            panic!("continuation exploded");
        })
    }

    #[tokio::test]
    async fn test_readers_fire_exactly_once() {
        let registry = CallbackRegistry::<I32Tuple>::new();
        let fired = Arc::new(AtomicUsize::new(0));
        registry
            .register(I32Template::wildcards(1), counting(&fired), false)
            .await;
        registry
            .register(I32Template::wildcards(1), counting(&fired), false)
            .await;

        let outcome = registry
            .resolve(&I32Tuple::from([1]), || async { Ok::<_, TupleSpaceError>(true) })
            .await;
        assert_eq!(outcome.readers, 2);
        assert!(!outcome.taken);

        registry
            .resolve(&I32Tuple::from([2]), || async { Ok::<_, TupleSpaceError>(true) })
            .await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_non_matching_entries_stay() {
        let registry = CallbackRegistry::<I32Tuple>::new();
        let fired = Arc::new(AtomicUsize::new(0));
        registry
            .register(I32Template::from(vec![Some(9)]), counting(&fired), false)
            .await;

        registry
            .resolve(&I32Tuple::from([1]), || async { Ok::<_, TupleSpaceError>(true) })
            .await;
        registry
            .resolve(&I32Tuple::from([9, 9]), || async { Ok::<_, TupleSpaceError>(true) })
            .await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_only_oldest_taker_claims() {
        let registry = CallbackRegistry::<I32Tuple>::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        registry
            .register(I32Template::wildcards(1), counting(&first), true)
            .await;
        registry
            .register(I32Template::wildcards(1), counting(&second), true)
            .await;

        let claims = Arc::new(AtomicUsize::new(0));
        let c = claims.clone();
        let outcome = registry
            .resolve(&I32Tuple::from([1]), move || async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TupleSpaceError>(true)
            })
            .await;

        assert!(outcome.taken);
        assert_eq!(claims.load(Ordering::SeqCst), 1);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_failed_claim_restores_taker() {
        let registry = CallbackRegistry::<I32Tuple>::new();
        let fired = Arc::new(AtomicUsize::new(0));
        registry
            .register(I32Template::wildcards(1), counting(&fired), true)
            .await;

        let outcome = registry
            .resolve(&I32Tuple::from([1]), || async { Ok::<_, TupleSpaceError>(false) })
            .await;
        assert!(!outcome.taken);
        assert_eq!(registry.len().await, 1);

        let outcome = registry
            .resolve(&I32Tuple::from([2]), || async {
                Err::<bool, _>(TupleSpaceError::StoreUnavailable("down".to_string()))
            })
            .await;
        assert!(!outcome.taken);
        assert_eq!(registry.len().await, 1);

        registry
            .resolve(&I32Tuple::from([3]), || async { Ok::<_, TupleSpaceError>(true) })
            .await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_panicking_continuation_is_contained() {
        let registry = CallbackRegistry::<I32Tuple>::new();
        let fired = Arc::new(AtomicUsize::new(0));
        registry
            .register(I32Template::wildcards(1), exploding(), false)
            .await;
        registry
            .register(I32Template::wildcards(1), counting(&fired), false)
            .await;
        registry
            .register(I32Template::wildcards(1), exploding(), true)
            .await;

        let outcome = registry
            .resolve(&I32Tuple::from([1]), || async { Ok::<_, TupleSpaceError>(true) })
            .await;

        assert_eq!(outcome.readers, 2);
        assert!(outcome.taken);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_deregister() {
        let registry = CallbackRegistry::<I32Tuple>::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let id = registry
            .register(I32Template::wildcards(1), counting(&fired), false)
            .await;

        assert!(registry.deregister(id).await);
        assert!(!registry.deregister(id).await);

        registry
            .resolve(&I32Tuple::from([1]), || async { Ok::<_, TupleSpaceError>(true) })
            .await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
