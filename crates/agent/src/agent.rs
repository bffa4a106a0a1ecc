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

//! Coordination agent
//!
//! ## Purpose
//! A [`SpaceAgent`] is a participant's handle on one logical space. It keeps an
//! optimistic local mirror of the authoritative store, serves reads from that
//! mirror, sends mutations to the store, and keeps the mirror in sync by
//! consuming the store's action stream.
//!
//! ## Lifecycle
//! `Uninitialized -> Initializing -> Ready`, and `Stopped` after
//! [`SpaceAgent::shutdown`]. Initialization subscribes to the action stream,
//! pulls the store snapshot (when configured), then starts the stream handler
//! and the evaluation loop. With lazy initialization (the default) the first
//! operation drives it; otherwise operations fail with `NotInitialized` until
//! [`SpaceAgent::initialize`] is called.
//!
//! ## Consistency
//! - Own writes are applied to the mirror as soon as the store acknowledges
//!   them; their echo on the action stream is recognized by agent id and not
//!   applied again
//! - Foreign inserts already in the mirror (by store id) are skipped, so the
//!   snapshot and the stream may overlap
//! - Every mirror mutation runs under one mutation gate held across the store
//!   call. Reads only take the mirror lock.
//! - Continuations and observer handlers run outside the gate and may call
//!   back into the agent
//!
//! ## Examples
//! ```rust
//! use agentspaces_agent::{AgentConfig, MemorySpaceStore, SpaceAgent};
//! use agentspaces_tuplespace::{I32Template, I32Tuple};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), agentspaces_tuplespace::TupleSpaceError> {
//! let store = Arc::new(MemorySpaceStore::<I32Tuple>::new("default"));
//! let agent = SpaceAgent::new(store, AgentConfig::default())?;
//!
//! agent.write(I32Tuple::from([1, 2])).await?;
//! let taken = agent.pop(I32Template::wildcards(2)).await?;
//! assert_eq!(taken, I32Tuple::from([1, 2]));
//! # Ok(())
//! # }
//! ```

use agentspaces_tuplespace::{Template, Tuple, TupleSpaceError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock as StdRwLock, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex, RwLock};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use ulid::Ulid;

use crate::action::{ActionKind, AgentId, StoreTuple, TupleAction};
use crate::callback::{CallbackId, CallbackRegistry};
use crate::clock::{Clock, SystemClock};
use crate::config::AgentConfig;
use crate::evaluation::{EvaluationQueue, TupleWriter};
use crate::observer::{ObserverId, ObserverRegistry, SpaceEvent, SpaceObserver};
use crate::store::{ActionReceiver, SpaceStore};

/// Agent lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentState {
    /// Created, nothing started
    Uninitialized,
    /// Subscribing and loading the snapshot
    Initializing,
    /// Serving operations
    Ready,
    /// Shut down; every operation fails with `NotInitialized`
    Stopped,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentState::Uninitialized => "uninitialized",
            AgentState::Initializing => "initializing",
            AgentState::Ready => "ready",
            AgentState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// How a `*_with` call was served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// A match existed; the continuation already ran
    Immediate,
    /// No match yet; the continuation is registered under this id
    Pending(CallbackId),
}

impl CallbackOutcome {
    /// Registration id, if the continuation is pending
    pub fn pending_id(&self) -> Option<CallbackId> {
        match self {
            CallbackOutcome::Immediate => None,
            CallbackOutcome::Pending(id) => Some(*id),
        }
    }
}

/// Agent statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentStats {
    /// Tuples written by this agent
    pub writes: u64,
    /// Tuples removed by this agent (pops and removing callbacks)
    pub pops: u64,
    /// Removals lost to another agent
    pub pop_conflicts: u64,
    /// Inserts by other agents applied to the mirror
    pub foreign_inserts: u64,
    /// Removals by other agents applied to the mirror
    pub foreign_removes: u64,
    /// Echoes of own mutations skipped by the stream handler
    pub echoes_skipped: u64,
    /// Evaluations written successfully
    pub evaluations_completed: u64,
    /// Evaluations that faulted
    pub evaluation_faults: u64,
    /// Tuples currently mirrored
    pub cached_tuples: usize,
    /// Continuations waiting for a match
    pub pending_callbacks: usize,
    /// Subscribed observers
    pub observers: usize,
}

struct AgentInner<T: Tuple> {
    id: AgentId,
    config: AgentConfig,
    store: Arc<dyn SpaceStore<T>>,
    state: StdRwLock<AgentState>,
    init_lock: AsyncMutex<()>,
    gate: AsyncMutex<()>,
    cache: RwLock<Vec<StoreTuple<T>>>,
    /// Ids this agent removed whose Remove echo has not arrived yet
    retired: Mutex<HashSet<Ulid>>,
    /// Own clears whose echo has not arrived yet
    pending_clears: AtomicUsize,
    consumers: Mutex<Vec<mpsc::UnboundedSender<T>>>,
    callbacks: CallbackRegistry<T>,
    observers: ObserverRegistry<T>,
    evaluation: EvaluationQueue<T>,
    stats: RwLock<AgentStats>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Client-side handle on a shared tuple space
///
/// Cloning is cheap; clones share the same agent.
pub struct SpaceAgent<T: Tuple> {
    inner: Arc<AgentInner<T>>,
}

impl<T: Tuple> Clone for SpaceAgent<T> {
    fn clone(&self) -> Self {
        SpaceAgent {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Tuple> fmt::Debug for SpaceAgent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpaceAgent")
            .field("id", &self.inner.id)
            .field("space", &self.inner.config.space_name)
            .field("state", &self.inner.state())
            .finish()
    }
}

impl<T: Tuple> SpaceAgent<T> {
    /// Create an agent on `store`
    ///
    /// ## Errors
    /// - `InvalidConfiguration` if `config` fails validation
    pub fn new(store: Arc<dyn SpaceStore<T>>, config: AgentConfig) -> Result<Self, TupleSpaceError> {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Create an agent with an explicit clock for observer expiration
    pub fn with_clock(
        store: Arc<dyn SpaceStore<T>>,
        config: AgentConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TupleSpaceError> {
        config.validate()?;

        let shutdown = CancellationToken::new();
        let observers = ObserverRegistry::new(
            clock,
            config.observer_expiration(),
            config.notification_timeout(),
            shutdown.child_token(),
        );

        let inner = AgentInner {
            id: AgentId::new(),
            store,
            state: StdRwLock::new(AgentState::Uninitialized),
            init_lock: AsyncMutex::new(()),
            gate: AsyncMutex::new(()),
            cache: RwLock::new(Vec::new()),
            retired: Mutex::new(HashSet::new()),
            pending_clears: AtomicUsize::new(0),
            consumers: Mutex::new(Vec::new()),
            callbacks: CallbackRegistry::new(),
            observers,
            evaluation: EvaluationQueue::new(config.evaluation_queue_capacity),
            stats: RwLock::new(AgentStats::default()),
            shutdown,
            tasks: Mutex::new(Vec::new()),
            config,
        };

        Ok(SpaceAgent {
            inner: Arc::new(inner),
        })
    }

    /// This agent's id (stamped on every action it submits)
    pub fn id(&self) -> AgentId {
        self.inner.id
    }

    /// Configuration the agent was created with
    pub fn config(&self) -> &AgentConfig {
        &self.inner.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> AgentState {
        self.inner.state()
    }

    /// Initialize now instead of on first use
    ///
    /// Concurrent callers are serialized; only the first does the work.
    pub async fn initialize(&self) -> Result<(), TupleSpaceError> {
        self.inner.initialize().await
    }

    /// Subscribe an observer (idempotent per observer handle)
    pub async fn subscribe(&self, observer: Arc<dyn SpaceObserver<T>>) -> ObserverId {
        self.inner.observers.subscribe(observer).await
    }

    /// Unsubscribe an observer
    pub async fn unsubscribe(&self, id: ObserverId) -> bool {
        self.inner.observers.unsubscribe(id).await
    }

    /// Refresh an observer so it does not expire
    pub async fn touch(&self, id: ObserverId) -> bool {
        self.inner.observers.touch(id).await
    }

    /// Write a tuple; returns the store-assigned id
    ///
    /// ## Errors
    /// - `EmptyTuple` for the zero-length tuple
    /// - `StoreUnavailable` if the store rejects the insert (mirror untouched)
    pub async fn write(&self, tuple: T) -> Result<Ulid, TupleSpaceError> {
        self.inner.ensure_ready().await?;
        self.inner.write_ready(tuple).await
    }

    /// Queue a computation whose result will be written, in submission order
    pub async fn evaluate<F>(&self, computation: F) -> Result<(), TupleSpaceError>
    where
        F: Future<Output = Result<T, TupleSpaceError>> + Send + 'static,
    {
        self.inner.ensure_ready().await?;
        self.inner.evaluation.submit(Box::pin(computation)).await
    }

    /// First matching tuple, or the empty tuple
    pub async fn peek(&self, template: T::Template) -> Result<T, TupleSpaceError> {
        self.inner.ensure_ready().await?;
        let cache = self.inner.cache.read().await;
        Ok(cache
            .iter()
            .find(|stored| template.matches(&stored.tuple))
            .map(|stored| stored.tuple.clone())
            .unwrap_or_else(T::empty))
    }

    /// Run `continuation` with the first matching tuple, now or once one appears
    pub async fn peek_with<F>(
        &self,
        template: T::Template,
        continuation: F,
    ) -> Result<CallbackOutcome, TupleSpaceError>
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.inner.ensure_ready().await?;

        let found = {
            let cache = self.inner.cache.read().await;
            match cache.iter().find(|stored| template.matches(&stored.tuple)) {
                Some(stored) => stored.tuple.clone(),
                None => {
                    let id = self
                        .inner
                        .callbacks
                        .register(template, Box::new(continuation), false)
                        .await;
                    return Ok(CallbackOutcome::Pending(id));
                }
            }
        };

        continuation(found);
        Ok(CallbackOutcome::Immediate)
    }

    /// Remove and return the first matching tuple, or the empty tuple
    ///
    /// If another agent took the candidate first, the stale mirror entry is
    /// dropped and the next match is tried.
    pub async fn pop(&self, template: T::Template) -> Result<T, TupleSpaceError> {
        self.inner.ensure_ready().await?;
        let _gate = self.inner.gate.lock().await;
        Ok(self
            .inner
            .take_first(&template)
            .await?
            .unwrap_or_else(T::empty))
    }

    /// Remove the first matching tuple and run `continuation` with it, now or
    /// once one appears
    pub async fn pop_with<F>(
        &self,
        template: T::Template,
        continuation: F,
    ) -> Result<CallbackOutcome, TupleSpaceError>
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.inner.ensure_ready().await?;

        let taken = {
            let _gate = self.inner.gate.lock().await;
            match self.inner.take_first(&template).await? {
                Some(tuple) => tuple,
                None => {
                    let id = self
                        .inner
                        .callbacks
                        .register(template, Box::new(continuation), true)
                        .await;
                    return Ok(CallbackOutcome::Pending(id));
                }
            }
        };

        continuation(taken);
        Ok(CallbackOutcome::Immediate)
    }

    /// Like [`SpaceAgent::peek_with`], with an async continuation
    ///
    /// The continuation runs on its own task, so it may await operations on
    /// this agent.
    pub async fn peek_with_async<F, Fut>(
        &self,
        template: T::Template,
        continuation: F,
    ) -> Result<CallbackOutcome, TupleSpaceError>
    where
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.peek_with(template, spawned(continuation)).await
    }

    /// Like [`SpaceAgent::pop_with`], with an async continuation
    ///
    /// The tuple is removed from the store before the continuation's task
    /// starts.
    pub async fn pop_with_async<F, Fut>(
        &self,
        template: T::Template,
        continuation: F,
    ) -> Result<CallbackOutcome, TupleSpaceError>
    where
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.pop_with(template, spawned(continuation)).await
    }

    /// Wait for a matching tuple without removing it
    ///
    /// Returns the empty tuple if `timeout` elapses first.
    pub async fn peek_wait(
        &self,
        template: T::Template,
        timeout: Option<Duration>,
    ) -> Result<T, TupleSpaceError> {
        let (tx, rx) = oneshot::channel();
        let outcome = self
            .peek_with(template, move |tuple| {
                let _ = tx.send(tuple);
            })
            .await?;
        self.wait_for(outcome, rx, timeout).await
    }

    /// Wait for a matching tuple and remove it
    ///
    /// Returns the empty tuple if `timeout` elapses first.
    pub async fn pop_wait(
        &self,
        template: T::Template,
        timeout: Option<Duration>,
    ) -> Result<T, TupleSpaceError> {
        let (tx, rx) = oneshot::channel();
        let outcome = self
            .pop_with(template, move |tuple| {
                let _ = tx.send(tuple);
            })
            .await?;
        self.wait_for(outcome, rx, timeout).await
    }

    async fn wait_for(
        &self,
        outcome: CallbackOutcome,
        mut rx: oneshot::Receiver<T>,
        timeout: Option<Duration>,
    ) -> Result<T, TupleSpaceError> {
        let id = match outcome {
            CallbackOutcome::Immediate => {
                return rx.await.map_err(|_| TupleSpaceError::NotInitialized);
            }
            CallbackOutcome::Pending(id) => id,
        };

        let Some(limit) = timeout else {
            return rx.await.map_err(|_| TupleSpaceError::NotInitialized);
        };

        match tokio::time::timeout(limit, &mut rx).await {
            Ok(received) => received.map_err(|_| TupleSpaceError::NotInitialized),
            Err(_) => {
                self.cancel_callback(id).await;
                // A claim already in flight either delivers or drops the sender.
                Ok(rx.await.unwrap_or_else(|_| T::empty()))
            }
        }
    }

    /// Cancel a pending `*_with` continuation
    pub async fn cancel_callback(&self, id: CallbackId) -> bool {
        self.inner.callbacks.deregister(id).await
    }

    /// Every matching tuple, in mirror order
    pub async fn scan(&self, template: T::Template) -> Result<Vec<T>, TupleSpaceError> {
        self.inner.ensure_ready().await?;
        let cache = self.inner.cache.read().await;
        Ok(cache
            .iter()
            .filter(|stored| template.matches(&stored.tuple))
            .map(|stored| stored.tuple.clone())
            .collect())
    }

    /// Stream of the current tuples followed by every tuple added afterwards
    ///
    /// Each call returns an independent stream; dropping it unsubscribes.
    pub async fn consume(&self) -> Result<UnboundedReceiverStream<T>, TupleSpaceError> {
        self.inner.ensure_ready().await?;
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let cache = self.inner.cache.read().await;
            for stored in cache.iter() {
                let _ = tx.send(stored.tuple.clone());
            }
            self.inner.consumers().push(tx);
        }
        Ok(UnboundedReceiverStream::new(rx))
    }

    /// Number of mirrored tuples
    pub async fn count(&self) -> Result<usize, TupleSpaceError> {
        self.inner.ensure_ready().await?;
        Ok(self.inner.cache.read().await.len())
    }

    /// Number of mirrored tuples matching `template`
    pub async fn count_matching(&self, template: T::Template) -> Result<usize, TupleSpaceError> {
        self.inner.ensure_ready().await?;
        let cache = self.inner.cache.read().await;
        Ok(cache
            .iter()
            .filter(|stored| template.matches(&stored.tuple))
            .count())
    }

    /// Remove every tuple from the space
    pub async fn clear(&self) -> Result<(), TupleSpaceError> {
        self.inner.ensure_ready().await?;
        let _gate = self.inner.gate.lock().await;
        self.inner.store.remove_all(self.inner.id).await?;
        self.inner.pending_clears.fetch_add(1, Ordering::SeqCst);
        self.inner.cache.write().await.clear();
        tracing::debug!(agent_id = %self.inner.id, space = %self.inner.config.space_name, "space cleared");
        Ok(())
    }

    /// Replace the mirror with a fresh snapshot from the store
    pub async fn reload(&self) -> Result<(), TupleSpaceError> {
        self.inner.ensure_ready().await?;
        let _gate = self.inner.gate.lock().await;
        let snapshot = self.inner.store.get_all().await?;
        let count = snapshot.len();
        *self.inner.cache.write().await = snapshot;
        tracing::debug!(agent_id = %self.inner.id, space = %self.inner.config.space_name, count, "mirror reloaded");
        Ok(())
    }

    /// Snapshot of the agent's counters
    pub async fn stats(&self) -> AgentStats {
        let mut stats = self.inner.stats.read().await.clone();
        stats.evaluations_completed = self.inner.evaluation.completed();
        stats.evaluation_faults = self.inner.evaluation.faulted();
        stats.cached_tuples = self.inner.cache.read().await.len();
        stats.pending_callbacks = self.inner.callbacks.len().await;
        stats.observers = self.inner.observers.len().await;
        stats
    }

    /// Stop the stream handler and evaluation loop
    ///
    /// Ends `consume` streams, fails pending waits with `NotInitialized` and
    /// cancels in-flight observer notifications. Idempotent.
    pub async fn shutdown(&self) {
        let _init = self.inner.init_lock.lock().await;
        if self.inner.state() == AgentState::Stopped {
            return;
        }
        self.inner.set_state(AgentState::Stopped);
        self.inner.shutdown.cancel();
        self.inner.consumers().clear();
        self.inner.callbacks.clear().await;
        self.inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        tracing::debug!(agent_id = %self.inner.id, space = %self.inner.config.space_name, "agent stopped");
    }
}

impl<T: Tuple> AgentInner<T> {
    fn state(&self) -> AgentState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: AgentState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn consumers(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<T>>> {
        self.consumers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn retired(&self) -> std::sync::MutexGuard<'_, HashSet<Ulid>> {
        self.retired.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push a new tuple to live `consume` streams; call with the cache write lock held
    fn feed_consumers(&self, tuple: &T) {
        self.consumers()
            .retain(|tx| tx.send(tuple.clone()).is_ok());
    }

    async fn ensure_ready(self: &Arc<Self>) -> Result<(), TupleSpaceError> {
        match self.state() {
            AgentState::Ready => Ok(()),
            AgentState::Stopped => Err(TupleSpaceError::NotInitialized),
            _ if self.config.lazy_initialization => self.initialize().await,
            _ => Err(TupleSpaceError::NotInitialized),
        }
    }

    async fn initialize(self: &Arc<Self>) -> Result<(), TupleSpaceError> {
        let _init = self.init_lock.lock().await;
        match self.state() {
            AgentState::Ready => return Ok(()),
            AgentState::Stopped => return Err(TupleSpaceError::NotInitialized),
            _ => {}
        }

        self.set_state(AgentState::Initializing);
        match self.start().await {
            Ok(()) => {
                self.set_state(AgentState::Ready);
                tracing::debug!(agent_id = %self.id, space = %self.config.space_name, "agent ready");
                Ok(())
            }
            Err(err) => {
                self.set_state(AgentState::Uninitialized);
                tracing::warn!(agent_id = %self.id, space = %self.config.space_name, error = %err, "initialization failed");
                Err(err)
            }
        }
    }

    async fn start(self: &Arc<Self>) -> Result<(), TupleSpaceError> {
        // Subscribe first so nothing committed during the snapshot pull is missed.
        let receiver = self.store.subscribe().await?;

        if self.config.load_space_contents_upon_startup {
            let snapshot = self.store.get_all().await?;
            let _gate = self.gate.lock().await;
            *self.cache.write().await = snapshot;
        }

        let handler = tokio::spawn(run_handler(
            Arc::downgrade(self),
            receiver,
            self.shutdown.clone(),
        ));

        let mut tasks = vec![handler];
        if let Some(evaluator) = self
            .evaluation
            .start(Arc::downgrade(self), self.shutdown.clone())
        {
            tasks.push(evaluator);
        }
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(tasks);
        Ok(())
    }

    async fn write_ready(&self, tuple: T) -> Result<Ulid, TupleSpaceError> {
        if tuple.is_empty() {
            return Err(TupleSpaceError::EmptyTuple);
        }

        let _gate = self.gate.lock().await;
        let id = self
            .store
            .insert(TupleAction::insert(self.id, tuple.clone()))
            .await?;

        {
            let mut cache = self.cache.write().await;
            cache.push(StoreTuple::new(id, tuple.clone()));
            self.feed_consumers(&tuple);
        }

        self.stats.write().await.writes += 1;
        metrics::counter!("agentspaces_agent_writes_total").increment(1);
        tracing::debug!(agent_id = %self.id, space = %self.config.space_name, store_id = %id, "tuple written");
        Ok(id)
    }

    /// Remove the first match from the store; the caller holds the gate
    async fn take_first(&self, template: &T::Template) -> Result<Option<T>, TupleSpaceError> {
        loop {
            let candidate = {
                let cache = self.cache.read().await;
                cache
                    .iter()
                    .find(|stored| template.matches(&stored.tuple))
                    .cloned()
            };
            let Some(candidate) = candidate else {
                return Ok(None);
            };

            let removed = self.remove_from_store(&candidate).await?;
            if removed {
                return Ok(Some(candidate.tuple));
            }
        }
    }

    /// Store removal plus mirror cleanup; the caller holds the gate
    async fn remove_from_store(&self, candidate: &StoreTuple<T>) -> Result<bool, TupleSpaceError> {
        let removed = self
            .store
            .remove(TupleAction::remove(self.id, candidate.clone()))
            .await?;
        self.cache
            .write()
            .await
            .retain(|stored| stored.id != candidate.id);

        if removed {
            self.retired().insert(candidate.id);
        }

        let mut stats = self.stats.write().await;
        if removed {
            stats.pops += 1;
            metrics::counter!("agentspaces_agent_pops_total").increment(1);
            tracing::debug!(agent_id = %self.id, space = %self.config.space_name, store_id = %candidate.id, "tuple removed");
        } else {
            stats.pop_conflicts += 1;
            tracing::debug!(agent_id = %self.id, space = %self.config.space_name, store_id = %candidate.id, "tuple already taken");
        }
        Ok(removed)
    }

    async fn claim(&self, candidate: StoreTuple<T>) -> Result<bool, TupleSpaceError> {
        let _gate = self.gate.lock().await;
        self.remove_from_store(&candidate).await
    }

    async fn handle_action(&self, action: TupleAction<T>) {
        let own = action.is_from(self.id);
        match action.kind {
            ActionKind::Insert => self.on_insert(action.store_tuple, own).await,
            ActionKind::Remove => self.on_remove(action.store_tuple, own).await,
            ActionKind::Clear => self.on_clear(own).await,
        }
    }

    async fn on_insert(&self, stored: StoreTuple<T>, own: bool) {
        {
            let _gate = self.gate.lock().await;
            if own {
                self.stats.write().await.echoes_skipped += 1;
            } else {
                // Inserts committed before an own clear or remove are stale.
                let stale = self.pending_clears.load(Ordering::SeqCst) > 0
                    || self.retired().contains(&stored.id);
                if stale {
                    tracing::debug!(agent_id = %self.id, space = %self.config.space_name, store_id = %stored.id, "stale insert ignored");
                    return;
                }

                let applied = {
                    let mut cache = self.cache.write().await;
                    if cache.iter().any(|cached| cached.id == stored.id) {
                        false
                    } else {
                        cache.push(stored.clone());
                        self.feed_consumers(&stored.tuple);
                        true
                    }
                };
                if applied {
                    self.stats.write().await.foreign_inserts += 1;
                    tracing::debug!(agent_id = %self.id, space = %self.config.space_name, store_id = %stored.id, "foreign insert applied");
                }
            }
        }

        let tuple = stored.tuple.clone();
        self.callbacks
            .resolve(&tuple, || self.claim(stored))
            .await;

        self.observers.broadcast(&SpaceEvent::Expansion(tuple)).await;
    }

    async fn on_remove(&self, stored: StoreTuple<T>, own: bool) {
        let now_empty = {
            let _gate = self.gate.lock().await;
            self.retired().remove(&stored.id);

            // Applied whatever the origin: an insert replayed from the stream
            // may have put back a tuple this agent already removed.
            let dropped = {
                let mut cache = self.cache.write().await;
                let before = cache.len();
                cache.retain(|cached| cached.id != stored.id);
                cache.len() < before
            };

            let mut stats = self.stats.write().await;
            if own {
                stats.echoes_skipped += 1;
            } else if dropped {
                stats.foreign_removes += 1;
            }
            drop(stats);
            self.cache.read().await.is_empty()
        };

        self.observers
            .broadcast(&SpaceEvent::Contraction(stored.tuple.to_template()))
            .await;
        if now_empty {
            self.observers.broadcast(&SpaceEvent::Flattening).await;
        }
    }

    async fn on_clear(&self, own: bool) {
        let now_empty = {
            let _gate = self.gate.lock().await;
            self.retired().clear();
            if own {
                let _ = self
                    .pending_clears
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
                self.stats.write().await.echoes_skipped += 1;
            } else {
                self.cache.write().await.clear();
            }
            self.cache.read().await.is_empty()
        };

        if now_empty {
            self.observers.broadcast(&SpaceEvent::Flattening).await;
        }
    }
}

#[async_trait]
impl<T: Tuple> TupleWriter<T> for AgentInner<T> {
    async fn write_tuple(&self, tuple: T) -> Result<(), TupleSpaceError> {
        if self.state() != AgentState::Ready {
            return Err(TupleSpaceError::NotInitialized);
        }
        self.write_ready(tuple).await.map(|_| ())
    }
}

impl<T: Tuple> Drop for AgentInner<T> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn spawned<T, F, Fut>(continuation: F) -> impl FnOnce(T) + Send + 'static
where
    T: Send + 'static,
    F: FnOnce(T) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    move |tuple| {
        tokio::spawn(continuation(tuple));
    }
}

async fn run_handler<T: Tuple>(
    agent: Weak<AgentInner<T>>,
    mut receiver: ActionReceiver<T>,
    shutdown: CancellationToken,
) {
    loop {
        let action = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = receiver.recv() => match next {
                Some(action) => action,
                None => {
                    tracing::warn!("action stream closed");
                    break;
                }
            },
        };

        let Some(agent) = agent.upgrade() else {
            break;
        };
        agent.handle_action(action).await;
    }
    tracing::debug!("stream handler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemorySpaceStore;
    use agentspaces_tuplespace::{I32Template, I32Tuple};

    fn agent(config: AgentConfig) -> (Arc<MemorySpaceStore<I32Tuple>>, SpaceAgent<I32Tuple>) {
        let store = Arc::new(MemorySpaceStore::new(config.space_name.clone()));
        let agent = SpaceAgent::new(store.clone(), config).unwrap();
        (store, agent)
    }

    #[tokio::test]
    async fn test_lazy_initialization_on_first_use() {
        let (_store, agent) = agent(AgentConfig::default());
        assert_eq!(agent.state(), AgentState::Uninitialized);

        assert_eq!(agent.count().await.unwrap(), 0);
        assert_eq!(agent.state(), AgentState::Ready);
    }

    #[tokio::test]
    async fn test_eager_mode_requires_initialize() {
        let (_store, agent) = agent(AgentConfig {
            lazy_initialization: false,
            ..Default::default()
        });

        let err = agent.write(I32Tuple::from([1])).await.unwrap_err();
        assert_eq!(err, TupleSpaceError::NotInitialized);

        agent.initialize().await.unwrap();
        agent.write(I32Tuple::from([1])).await.unwrap();
        assert_eq!(agent.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_loaded_on_startup() {
        let store = Arc::new(MemorySpaceStore::<I32Tuple>::new("default"));
        store
            .insert(TupleAction::insert(AgentId::new(), I32Tuple::from([5])))
            .await
            .unwrap();

        let loading = SpaceAgent::new(store.clone(), AgentConfig::default()).unwrap();
        assert_eq!(loading.count().await.unwrap(), 1);

        let skipping = SpaceAgent::new(
            store.clone(),
            AgentConfig {
                load_space_contents_upon_startup: false,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(skipping.count().await.unwrap(), 0);

        skipping.reload().await.unwrap();
        assert_eq!(skipping.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_initialization_can_be_retried() {
        let (store, agent) = agent(AgentConfig::default());
        store.set_available(false);

        let err = agent.count().await.unwrap_err();
        assert!(matches!(err, TupleSpaceError::StoreUnavailable(_)));
        assert_eq!(agent.state(), AgentState::Uninitialized);

        store.set_available(true);
        assert_eq!(agent.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_tuple_rejected() {
        let (store, agent) = agent(AgentConfig::default());
        let err = agent.write(I32Tuple::empty()).await.unwrap_err();
        assert_eq!(err, TupleSpaceError::EmptyTuple);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_pop_returns_empty_when_nothing_matches() {
        let (_store, agent) = agent(AgentConfig::default());
        agent.write(I32Tuple::from([1, 2])).await.unwrap();

        let popped = agent.pop(I32Template::wildcards(1)).await.unwrap();
        assert!(popped.is_empty());
        assert_eq!(agent.peek(I32Template::wildcards(3)).await.unwrap(), I32Tuple::empty());
        assert_eq!(agent.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_operations() {
        let (_store, agent) = agent(AgentConfig::default());
        agent.write(I32Tuple::from([1])).await.unwrap();
        agent.shutdown().await;
        agent.shutdown().await;

        assert_eq!(agent.state(), AgentState::Stopped);
        assert_eq!(agent.count().await.unwrap_err(), TupleSpaceError::NotInitialized);
        assert_eq!(
            agent.write(I32Tuple::from([2])).await.unwrap_err(),
            TupleSpaceError::NotInitialized
        );
        assert_eq!(agent.initialize().await.unwrap_err(), TupleSpaceError::NotInitialized);
    }

    #[tokio::test]
    async fn test_stats_track_operations() {
        let (_store, agent) = agent(AgentConfig::default());
        agent.write(I32Tuple::from([1])).await.unwrap();
        agent.write(I32Tuple::from([2])).await.unwrap();
        agent.pop(I32Template::wildcards(1)).await.unwrap();

        let stats = agent.stats().await;
        assert_eq!(stats.writes, 2);
        assert_eq!(stats.pops, 1);
        assert_eq!(stats.cached_tuples, 1);
    }
}
