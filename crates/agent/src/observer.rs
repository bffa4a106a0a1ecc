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

//! Observer dispatch for space-level events
//!
//! ## Purpose
//! External listeners subscribe to an agent's space and are told when it
//! grows (expansion), shrinks (contraction) or becomes empty (flattening).
//!
//! ## Design
//! - **Interest**: a bit set read from the observer on every event, so an
//!   observer can change what it listens to at runtime ([`InterestCell`])
//! - **Isolation**: every notification runs in its own task; an observer that
//!   fails or panics is marked defunct without affecting the others
//! - **Expiry**: observers that have not been refreshed within the configured
//!   window are defunct as well; time comes from an injected [`Clock`]
//! - **Eviction**: defunct observers are removed after the whole pass
//! - **Cancellation**: each notification gets a child of the registry's
//!   shutdown token, cancelled on shutdown or when the notification overruns
//!   the configured timeout

use agentspaces_tuplespace::{Tuple, TupleSpaceError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use ulid::Ulid;

use crate::clock::Clock;

/// Set of event kinds an observer wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Interest(u8);

impl Interest {
    /// No events
    pub const NOTHING: Interest = Interest(0);
    /// Tuples added
    pub const EXPANSIONS: Interest = Interest(1);
    /// Tuples removed
    pub const CONTRACTIONS: Interest = Interest(2);
    /// Space became empty
    pub const FLATTENING: Interest = Interest(4);
    /// All of the above
    pub const EVERYTHING: Interest = Interest(7);

    /// Raw bits
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Interest from raw bits; unknown bits are dropped
    pub const fn from_bits(bits: u8) -> Self {
        Interest(bits & Self::EVERYTHING.0)
    }

    /// Whether every bit of `other` is set
    pub const fn contains(self, other: Interest) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Interest {
    type Output = Interest;

    fn bitor(self, rhs: Interest) -> Interest {
        Interest(self.0 | rhs.0)
    }
}

impl BitOrAssign for Interest {
    fn bitor_assign(&mut self, rhs: Interest) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Interest::NOTHING {
            return f.write_str("nothing");
        }
        let names = [
            (Interest::EXPANSIONS, "expansions"),
            (Interest::CONTRACTIONS, "contractions"),
            (Interest::FLATTENING, "flattening"),
        ];
        let mut first = true;
        for (bit, name) in names {
            if self.contains(bit) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Interest that can be changed while the observer is subscribed
#[derive(Debug, Default)]
pub struct InterestCell(AtomicU8);

impl InterestCell {
    /// Cell holding `interest`
    pub fn new(interest: Interest) -> Self {
        InterestCell(AtomicU8::new(interest.bits()))
    }

    /// Current interest
    pub fn get(&self) -> Interest {
        Interest::from_bits(self.0.load(Ordering::Acquire))
    }

    /// Replace the interest; takes effect on the next event
    pub fn set(&self, interest: Interest) {
        self.0.store(interest.bits(), Ordering::Release);
    }
}

/// Event broadcast to observers
#[derive(Debug, Clone)]
pub enum SpaceEvent<T: Tuple> {
    /// A tuple was added
    Expansion(T),
    /// A tuple was removed; carries its exact-match template
    Contraction(T::Template),
    /// The space became empty
    Flattening,
}

impl<T: Tuple> SpaceEvent<T> {
    /// Interest bit this event is delivered under
    pub fn interest(&self) -> Interest {
        match self {
            SpaceEvent::Expansion(_) => Interest::EXPANSIONS,
            SpaceEvent::Contraction(_) => Interest::CONTRACTIONS,
            SpaceEvent::Flattening => Interest::FLATTENING,
        }
    }

    /// Short event name for logs
    pub fn name(&self) -> &'static str {
        match self {
            SpaceEvent::Expansion(_) => "expansion",
            SpaceEvent::Contraction(_) => "contraction",
            SpaceEvent::Flattening => "flattening",
        }
    }
}

/// Listener for space-level events
///
/// Every handler has a no-op default. Returning an error (or panicking)
/// gets the observer evicted.
#[async_trait]
pub trait SpaceObserver<T: Tuple>: Send + Sync {
    /// Events this observer currently wants
    fn interest(&self) -> Interest {
        Interest::EVERYTHING
    }

    /// A tuple was added to the space
    async fn on_expansion(&self, _tuple: &T, _cancel: CancellationToken) -> Result<(), TupleSpaceError> {
        Ok(())
    }

    /// A tuple was removed from the space
    async fn on_contraction(
        &self,
        _template: &T::Template,
        _cancel: CancellationToken,
    ) -> Result<(), TupleSpaceError> {
        Ok(())
    }

    /// The space became empty
    async fn on_flattening(&self, _cancel: CancellationToken) -> Result<(), TupleSpaceError> {
        Ok(())
    }
}

/// Subscription handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(Ulid);

impl ObserverId {
    fn new() -> Self {
        ObserverId(Ulid::new())
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of one broadcast pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Notifications that completed successfully
    pub delivered: usize,
    /// Observers not interested in the event
    pub skipped: usize,
    /// Notifications cancelled for overrunning the timeout
    pub timed_out: usize,
    /// Observers removed after this pass
    pub evicted: Vec<ObserverId>,
}

enum Delivery {
    Done,
    TimedOut,
}

struct ObserverEntry<T: Tuple> {
    observer: Arc<dyn SpaceObserver<T>>,
    last_seen: DateTime<Utc>,
}

/// Subscribed observers of one agent
pub struct ObserverRegistry<T: Tuple> {
    observers: RwLock<BTreeMap<ObserverId, ObserverEntry<T>>>,
    clock: Arc<dyn Clock>,
    expiration: Option<chrono::Duration>,
    notification_timeout: Option<Duration>,
    shutdown: CancellationToken,
}

impl<T: Tuple> ObserverRegistry<T> {
    /// Create an empty registry
    ///
    /// ## Arguments
    /// * `expiration` - observers not refreshed within this window are evicted
    /// * `notification_timeout` - notifications running longer are cancelled
    /// * `shutdown` - parent of every notification's cancellation token
    pub fn new(
        clock: Arc<dyn Clock>,
        expiration: Option<chrono::Duration>,
        notification_timeout: Option<Duration>,
        shutdown: CancellationToken,
    ) -> Self {
        ObserverRegistry {
            observers: RwLock::new(BTreeMap::new()),
            clock,
            expiration,
            notification_timeout,
            shutdown,
        }
    }

    /// Subscribe an observer; subscribing the same handle again refreshes it
    pub async fn subscribe(&self, observer: Arc<dyn SpaceObserver<T>>) -> ObserverId {
        let now = self.clock.now();
        let mut observers = self.observers.write().await;

        let existing = observers
            .iter_mut()
            .find(|(_, entry)| same_observer(&entry.observer, &observer));
        if let Some((id, entry)) = existing {
            entry.last_seen = now;
            return *id;
        }

        let id = ObserverId::new();
        observers.insert(
            id,
            ObserverEntry {
                observer,
                last_seen: now,
            },
        );
        tracing::debug!(observer_id = %id, "observer subscribed");
        id
    }

    /// Remove an observer
    pub async fn unsubscribe(&self, id: ObserverId) -> bool {
        let removed = self.observers.write().await.remove(&id).is_some();
        if removed {
            tracing::debug!(observer_id = %id, "observer unsubscribed");
        }
        removed
    }

    /// Refresh an observer's last-seen timestamp
    pub async fn touch(&self, id: ObserverId) -> bool {
        let now = self.clock.now();
        match self.observers.write().await.get_mut(&id) {
            Some(entry) => {
                entry.last_seen = now;
                true
            }
            None => false,
        }
    }

    /// Whether `id` is subscribed
    pub async fn contains(&self, id: ObserverId) -> bool {
        self.observers.read().await.contains_key(&id)
    }

    /// Number of subscribed observers
    pub async fn len(&self) -> usize {
        self.observers.read().await.len()
    }

    /// Whether no observer is subscribed
    pub async fn is_empty(&self) -> bool {
        self.observers.read().await.is_empty()
    }

    /// Remove every observer past its expiration window
    pub async fn clear_expired(&self) -> Vec<ObserverId> {
        let now = self.clock.now();
        let mut observers = self.observers.write().await;
        let expired: Vec<ObserverId> = observers
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            observers.remove(id);
        }
        expired
    }

    /// Deliver an event to every interested observer
    pub async fn broadcast(&self, event: &SpaceEvent<T>) -> BroadcastReport {
        let now = self.clock.now();
        let wanted = event.interest();
        let targets: Vec<(ObserverId, Arc<dyn SpaceObserver<T>>, bool)> = self
            .observers
            .read()
            .await
            .iter()
            .map(|(id, entry)| (*id, entry.observer.clone(), self.is_expired(entry, now)))
            .collect();

        let mut report = BroadcastReport::default();
        let mut defunct = Vec::new();
        let mut ids = Vec::new();
        let mut handles = Vec::new();

        for (id, observer, expired) in targets {
            if expired {
                tracing::debug!(observer_id = %id, "observer expired");
                defunct.push(id);
                continue;
            }
            if !observer.interest().contains(wanted) {
                report.skipped += 1;
                continue;
            }

            let event = event.clone();
            let token = self.shutdown.child_token();
            let timeout = self.notification_timeout;
            ids.push(id);
            handles.push(tokio::spawn(notify(observer, event, token, timeout)));
        }

        let results = futures::future::join_all(handles).await;
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(Ok(Delivery::Done)) => report.delivered += 1,
                Ok(Ok(Delivery::TimedOut)) => {
                    tracing::warn!(observer_id = %id, event = event.name(), "notification timed out");
                    report.timed_out += 1;
                }
                Ok(Err(err)) => {
                    tracing::warn!(observer_id = %id, event = event.name(), error = %err, "observer failed");
                    defunct.push(id);
                }
                Err(join_err) if join_err.is_panic() => {
                    let fault = TupleSpaceError::ObserverFault(format!("observer {} panicked", id));
                    tracing::warn!(observer_id = %id, event = event.name(), error = %fault, "observer failed");
                    defunct.push(id);
                }
                Err(join_err) => {
                    tracing::debug!(observer_id = %id, error = %join_err, "notification aborted");
                }
            }
        }

        if !defunct.is_empty() {
            let mut observers = self.observers.write().await;
            for id in &defunct {
                if observers.remove(id).is_some() {
                    metrics::counter!("agentspaces_agent_observer_evictions_total").increment(1);
                }
            }
            report.evicted = defunct;
        }

        report
    }

    fn is_expired(&self, entry: &ObserverEntry<T>, now: DateTime<Utc>) -> bool {
        self.expiration
            .is_some_and(|window| now.signed_duration_since(entry.last_seen) > window)
    }
}

fn same_observer<T: Tuple>(a: &Arc<dyn SpaceObserver<T>>, b: &Arc<dyn SpaceObserver<T>>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

async fn notify<T: Tuple>(
    observer: Arc<dyn SpaceObserver<T>>,
    event: SpaceEvent<T>,
    token: CancellationToken,
    timeout: Option<Duration>,
) -> Result<Delivery, TupleSpaceError> {
    let call = async {
        match &event {
            SpaceEvent::Expansion(tuple) => observer.on_expansion(tuple, token.clone()).await,
            SpaceEvent::Contraction(template) => observer.on_contraction(template, token.clone()).await,
            SpaceEvent::Flattening => observer.on_flattening(token.clone()).await,
        }
    };

    match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result.map(|_| Delivery::Done),
            Err(_) => {
                token.cancel();
                Ok(Delivery::TimedOut)
            }
        },
        None => call.await.map(|_| Delivery::Done),
    }
}
