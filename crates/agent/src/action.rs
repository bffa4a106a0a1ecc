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

//! Mutation envelope exchanged between agents and the store
//!
//! Every mutation an agent submits is wrapped in a [`TupleAction`] stamped
//! with the submitting [`AgentId`]. The store echoes committed actions to all
//! subscribers, and the agent id on the echo is how an agent recognizes its own
//! writes.

use agentspaces_tuplespace::Tuple;
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identity of a coordination agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(Ulid);

impl AgentId {
    /// Fresh, unique agent id
    pub fn new() -> Self {
        AgentId(Ulid::new())
    }

    /// Underlying ULID
    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl Default for AgentId {
    fn default() -> Self {
        AgentId::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tuple paired with the identity the store assigned to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Tuple")]
pub struct StoreTuple<T> {
    /// Store-assigned id; nil for tuples not yet stored
    pub id: Ulid,
    /// The tuple itself
    pub tuple: T,
}

impl<T: Tuple> StoreTuple<T> {
    /// Pair a tuple with its store id
    pub fn new(id: Ulid, tuple: T) -> Self {
        StoreTuple { id, tuple }
    }

    /// Tuple that has not been acknowledged by a store yet
    pub fn unstored(tuple: T) -> Self {
        StoreTuple::new(Ulid::nil(), tuple)
    }

    /// Placeholder carried by clear actions
    pub fn empty() -> Self {
        StoreTuple::new(Ulid::nil(), T::empty())
    }
}

/// Kind of mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// A tuple was added
    Insert,
    /// A tuple was removed
    Remove,
    /// Every tuple was removed
    Clear,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Insert => f.write_str("insert"),
            ActionKind::Remove => f.write_str("remove"),
            ActionKind::Clear => f.write_str("clear"),
        }
    }
}

/// A mutation of the space, as submitted and as echoed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Tuple")]
pub struct TupleAction<T> {
    /// Agent that submitted the mutation
    pub agent_id: AgentId,
    /// Tuple affected (empty for clears)
    pub store_tuple: StoreTuple<T>,
    /// Mutation kind
    pub kind: ActionKind,
}

impl<T: Tuple> TupleAction<T> {
    /// Insert of a tuple that has no store id yet
    pub fn insert(agent_id: AgentId, tuple: T) -> Self {
        TupleAction {
            agent_id,
            store_tuple: StoreTuple::unstored(tuple),
            kind: ActionKind::Insert,
        }
    }

    /// Removal of a stored tuple
    pub fn remove(agent_id: AgentId, store_tuple: StoreTuple<T>) -> Self {
        TupleAction {
            agent_id,
            store_tuple,
            kind: ActionKind::Remove,
        }
    }

    /// Removal of every tuple
    pub fn clear(agent_id: AgentId) -> Self {
        TupleAction {
            agent_id,
            store_tuple: StoreTuple::empty(),
            kind: ActionKind::Clear,
        }
    }

    /// Whether this action was submitted by `agent_id`
    pub fn is_from(&self, agent_id: AgentId) -> bool {
        self.agent_id == agent_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentspaces_tuplespace::I32Tuple;

    #[test]
    fn test_clear_carries_empty_tuple() {
        let agent = AgentId::new();
        let action = TupleAction::<I32Tuple>::clear(agent);
        assert_eq!(action.kind, ActionKind::Clear);
        assert!(action.store_tuple.tuple.is_empty());
        assert!(action.store_tuple.id.is_nil());
        assert!(action.is_from(agent));
        assert!(!action.is_from(AgentId::new()));
    }

    #[test]
    fn test_action_survives_json_transport() {
        let action = TupleAction::remove(
            AgentId::new(),
            StoreTuple::new(Ulid::new(), I32Tuple::from([4, 5])),
        );
        let json = serde_json::to_string(&action).unwrap();
        let decoded: TupleAction<I32Tuple> = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, action);
    }
}
