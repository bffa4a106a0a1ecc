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

//! Error type shared by the tuple model and the coordination agent

/// TupleSpace errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TupleSpaceError {
    /// A field could not be placed in a tuple or template
    #[error("Invalid field at position {index}: {reason}")]
    InvalidField {
        /// Position of the offending field
        index: usize,
        /// Why the field was rejected
        reason: String,
    },

    /// Empty tuples are only used as the "no match" sentinel
    #[error("Empty tuples are not allowed to be placed in the space")]
    EmptyTuple,

    /// Operation attempted before the agent reached `Ready` (or after shutdown)
    #[error("Agent is not initialized")]
    NotInitialized,

    /// Store or action stream is unreachable
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// An observer's handler failed
    #[error("Observer fault: {0}")]
    ObserverFault(String),

    /// A deferred computation failed
    #[error("Evaluation fault: {0}")]
    EvaluationFault(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// I/O error while loading configuration
    #[error("IO error: {0}")]
    IoError(String),
}

impl TupleSpaceError {
    /// Shorthand for [`TupleSpaceError::InvalidField`]
    pub fn invalid_field(index: usize, reason: impl Into<String>) -> Self {
        TupleSpaceError::InvalidField {
            index,
            reason: reason.into(),
        }
    }

    /// Whether retrying the same call later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TupleSpaceError::StoreUnavailable(_) | TupleSpaceError::NotInitialized
        )
    }
}

impl From<serde_json::Error> for TupleSpaceError {
    fn from(err: serde_json::Error) -> Self {
        TupleSpaceError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for TupleSpaceError {
    fn from(err: std::io::Error) -> Self {
        TupleSpaceError::IoError(err.to_string())
    }
}
