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

//! AgentSpaces: Linda-style tuple spaces with client-side coordination agents
//!
//! Core design:
//! - Tuples are immutable ordered records; templates select them by structure
//! - Each participant works through an agent that mirrors the shared space
//!   locally and keeps the mirror in sync through the store's action stream
//! - Waiting is expressed as continuations that fire exactly once
//!
//! Crates:
//! 1. [`tuplespace`]: tuple/template model and matching
//! 2. [`agent`]: coordination agent, store boundary, observers, evaluation

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub use agentspaces_agent as agent;
pub use agentspaces_tuplespace as tuplespace;

pub use agent::{
    AgentConfig, AgentId, AgentState, AgentStats, CallbackOutcome, Interest, InterestCell,
    MemorySpaceStore, ObserverId, SpaceAgent, SpaceEvent, SpaceObserver, SpaceStore,
};
pub use tuplespace::{
    space_template, space_tuple, FieldKind, FieldValue, SpaceTemplate, SpaceTuple, SpaceUnit,
    Template, TemplateField, Tuple, TupleSpaceError, TypedTemplate, TypedTuple,
};

/// Everything needed to write and run an agent
pub mod prelude {
    pub use crate::agent::{
        AgentConfig, CallbackOutcome, CancellationToken, Clock, Interest, InterestCell,
        ManualClock, MemorySpaceStore, SpaceAgent, SpaceEvent, SpaceObserver, SpaceStore,
        SystemClock,
    };
    pub use crate::tuplespace::typed::*;
    pub use crate::tuplespace::{
        space_template, space_tuple, EnumField, FieldKind, FieldValue, SpaceEnum, SpaceTemplate,
        SpaceTuple, SpaceUnit, Template, TemplateField, Tuple, TupleSpaceError,
    };
}
