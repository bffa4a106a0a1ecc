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

//! Coordination agents for a shared tuple space
//!
//! ## Purpose
//! Each participant talks to a space through a [`SpaceAgent`]: an optimistic
//! local mirror of an authoritative [`SpaceStore`] that serves Linda-style
//! `write` / `peek` / `pop` / `scan`, blocking continuations, deferred writes
//! and event notifications.
//!
//! ## Architecture
//! - [`action`]: mutation envelope stamped with the submitting agent
//! - [`store`]: store/stream boundary and the in-process [`MemorySpaceStore`]
//! - [`callback`]: continuations waiting for a matching tuple
//! - [`observer`]: expansion/contraction/flattening notifications
//! - [`evaluation`]: FIFO queue of computations whose results are written
//! - [`config`]: layered [`AgentConfig`] loading
//! - [`agent`]: the coordination agent itself

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod action;
pub mod agent;
pub mod callback;
pub mod clock;
pub mod config;
pub mod evaluation;
pub mod observer;
pub mod store;

pub use action::{ActionKind, AgentId, StoreTuple, TupleAction};
pub use agent::{AgentState, AgentStats, CallbackOutcome, SpaceAgent};
pub use callback::{CallbackId, CallbackRegistry, Continuation, ResolveOutcome};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AgentConfig;
pub use evaluation::{Computation, EvaluationQueue, TupleWriter};
pub use observer::{
    BroadcastReport, Interest, InterestCell, ObserverId, ObserverRegistry, SpaceEvent,
    SpaceObserver,
};
pub use store::memory::MemorySpaceStore;
pub use store::{ActionReceiver, ActionSender, SpaceStore};

pub use tokio_util::sync::CancellationToken;
