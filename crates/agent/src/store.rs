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

//! Authoritative store and action stream boundary
//!
//! ## Purpose
//! The store of record is an external collaborator. Agents only rely on the
//! contract below: inserts are acknowledged with an id, removal is atomic
//! remove-if-present, and every committed mutation is echoed, in commit order,
//! to every subscriber of the space.
//!
//! ## Backends
//! - [`memory::MemorySpaceStore`]: in-process store for development and tests
//!
//! Other backends (replicated stores, pub/sub transports) implement
//! [`SpaceStore`] outside this crate.

pub mod memory;

use agentspaces_tuplespace::{Tuple, TupleSpaceError};
use async_trait::async_trait;
use tokio::sync::mpsc;
use ulid::Ulid;

use crate::action::{AgentId, StoreTuple, TupleAction};

/// Receiving end of a space's action stream
pub type ActionReceiver<T> = mpsc::UnboundedReceiver<TupleAction<T>>;

/// Sending end of a space's action stream
pub type ActionSender<T> = mpsc::UnboundedSender<TupleAction<T>>;

/// Store of record for one space
///
/// ## Implementation Notes
/// - `remove` must be atomic: when several agents remove the same tuple
///   concurrently, exactly one call returns `true`
/// - Committed mutations must reach subscribers in commit order
/// - Errors crossing this boundary are reported as `StoreUnavailable`
#[async_trait]
pub trait SpaceStore<T: Tuple>: Send + Sync {
    /// Persist an insert and return the store-assigned id
    async fn insert(&self, action: TupleAction<T>) -> Result<Ulid, TupleSpaceError>;

    /// Remove the tuple in `action` if still present
    ///
    /// ## Returns
    /// `false` if another agent already removed it
    async fn remove(&self, action: TupleAction<T>) -> Result<bool, TupleSpaceError>;

    /// Remove every tuple on behalf of `agent_id`
    async fn remove_all(&self, agent_id: AgentId) -> Result<(), TupleSpaceError>;

    /// Snapshot of every stored tuple, in insertion order
    async fn get_all(&self) -> Result<Vec<StoreTuple<T>>, TupleSpaceError>;

    /// Open an ordered feed of every mutation committed from now on
    async fn subscribe(&self) -> Result<ActionReceiver<T>, TupleSpaceError>;
}
