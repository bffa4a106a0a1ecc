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

//! In-process space store
//!
//! ## Purpose
//! Reference implementation of [`SpaceStore`] for development, tests and
//! single-process deployments. Several agents sharing one `MemorySpaceStore`
//! behave like agents on different hosts sharing one replicated space.
//!
//! ## Design
//! - **Storage**: `Vec<StoreTuple>` in insertion order behind a tokio `RwLock`
//! - **Fan-out**: one unbounded channel per subscriber; actions are published
//!   while the write lock is held so every subscriber sees commit order
//! - **Outages**: [`MemorySpaceStore::set_available`] simulates an unreachable
//!   store; every call then fails with `StoreUnavailable`

use agentspaces_tuplespace::{Tuple, TupleSpaceError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, RwLock};
use ulid::Ulid;

use super::{ActionReceiver, ActionSender, SpaceStore};
use crate::action::{AgentId, StoreTuple, TupleAction};

struct StoreState<T> {
    tuples: Vec<StoreTuple<T>>,
    subscribers: Vec<ActionSender<T>>,
}

impl<T: Tuple> StoreState<T> {
    /// Publish to live subscribers, dropping closed ones
    fn publish(&mut self, action: TupleAction<T>) {
        self.subscribers.retain(|tx| tx.send(action.clone()).is_ok());
    }
}

/// In-memory store of record
///
/// ## Thread Safety
/// - Reads (`get_all`) take the read lock
/// - Mutations and subscription take the write lock
pub struct MemorySpaceStore<T> {
    name: String,
    state: RwLock<StoreState<T>>,
    available: AtomicBool,
}

impl<T: Tuple> MemorySpaceStore<T> {
    /// Create an empty store for the named space
    pub fn new(name: impl Into<String>) -> Self {
        MemorySpaceStore {
            name: name.into(),
            state: RwLock::new(StoreState {
                tuples: Vec::new(),
                subscribers: Vec::new(),
            }),
            available: AtomicBool::new(true),
        }
    }

    /// Name of the space
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Simulate the store going down (`false`) or coming back (`true`)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of tuples currently stored
    pub async fn len(&self) -> usize {
        self.state.read().await.tuples.len()
    }

    /// Whether the store holds no tuples
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.tuples.is_empty()
    }

    /// Number of live action stream subscribers
    pub async fn subscriber_count(&self) -> usize {
        let mut state = self.state.write().await;
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }

    fn ensure_available(&self) -> Result<(), TupleSpaceError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TupleSpaceError::StoreUnavailable(format!(
                "space '{}' is unreachable",
                self.name
            )))
        }
    }
}

#[async_trait]
impl<T: Tuple> SpaceStore<T> for MemorySpaceStore<T> {
    async fn insert(&self, action: TupleAction<T>) -> Result<Ulid, TupleSpaceError> {
        self.ensure_available()?;

        let id = Ulid::new();
        let stored = StoreTuple::new(id, action.store_tuple.tuple);

        let mut state = self.state.write().await;
        state.tuples.push(stored.clone());
        state.publish(TupleAction {
            agent_id: action.agent_id,
            store_tuple: stored,
            kind: action.kind,
        });

        tracing::trace!(space = %self.name, store_id = %id, "tuple inserted");
        Ok(id)
    }

    async fn remove(&self, action: TupleAction<T>) -> Result<bool, TupleSpaceError> {
        self.ensure_available()?;

        let mut state = self.state.write().await;
        let Some(position) = state
            .tuples
            .iter()
            .position(|stored| stored.id == action.store_tuple.id)
        else {
            return Ok(false);
        };

        let removed = state.tuples.remove(position);
        state.publish(TupleAction::remove(action.agent_id, removed));

        tracing::trace!(space = %self.name, store_id = %action.store_tuple.id, "tuple removed");
        Ok(true)
    }

    async fn remove_all(&self, agent_id: AgentId) -> Result<(), TupleSpaceError> {
        self.ensure_available()?;

        let mut state = self.state.write().await;
        state.tuples.clear();
        state.publish(TupleAction::clear(agent_id));
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<StoreTuple<T>>, TupleSpaceError> {
        self.ensure_available()?;
        Ok(self.state.read().await.tuples.clone())
    }

    async fn subscribe(&self) -> Result<ActionReceiver<T>, TupleSpaceError> {
        self.ensure_available()?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.state.write().await.subscribers.push(tx);
        Ok(rx)
    }
}
