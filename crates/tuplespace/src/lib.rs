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

//! Tuple and template model for Linda-style coordination
//!
//! ## Purpose
//! Tuples are immutable ordered records; templates are patterns that select
//! tuples by structure instead of by key. This crate defines both, the closed
//! set of field kinds they may hold, and the equality machinery used to
//! compare them.
//!
//! ## Architecture
//! - [`SpaceTuple`] / [`SpaceTemplate`]: heterogeneous fields ([`FieldValue`])
//! - [`TypedTuple`] / [`TypedTemplate`]: one element type per tuple, compared
//!   with a strategy chosen at compile time ([`Vectorized`] or [`Sequential`])
//! - [`Tuple`] / [`Template`]: the abstraction the coordination agent is
//!   generic over
//!
//! ## Examples
//! ```rust
//! use agentspaces_tuplespace::*;
//!
//! let tuple = space_tuple!["temperature", 21.5f64];
//! let template = space_template!["temperature", FieldKind::F64];
//! assert!(template.matches(&tuple));
//! assert!(!space_template!["temperature"].matches(&tuple));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod equality;
pub mod error;
pub mod field;
pub mod traits;
pub mod tuple;
pub mod typed;

pub use equality::{is_hardware_accelerated, EqualityStrategy, Sequential, VectorLane, Vectorized};
pub use error::TupleSpaceError;
pub use field::{EnumField, FieldKind, FieldValue, SpaceEnum, SpaceUnit, TemplateField};
pub use traits::{render, Template, Tuple};
pub use tuple::{SpaceTemplate, SpaceTuple};
pub use typed::*;

/// Result alias used across the workspace
pub type Result<T> = std::result::Result<T, TupleSpaceError>;

/// Build a [`SpaceTuple`] from values
///
/// # Examples
/// ```rust
/// # use agentspaces_tuplespace::space_tuple;
/// let t = space_tuple!["job", 1i32, true];
/// assert_eq!(t.to_string(), "(job, 1, true)");
/// ```
#[macro_export]
macro_rules! space_tuple {
    ($($field:expr),* $(,)?) => {
        $crate::SpaceTuple::new(vec![$($crate::FieldValue::from($field)),*])
    };
}

/// Build a [`SpaceTemplate`] from values, kind markers and [`SpaceUnit`] wildcards
///
/// # Examples
/// ```rust
/// # use agentspaces_tuplespace::{space_template, FieldKind, SpaceUnit};
/// let p = space_template!["job", FieldKind::I32, SpaceUnit];
/// assert_eq!(p.to_string(), "(job, {i32}, {NULL})");
/// ```
#[macro_export]
macro_rules! space_template {
    ($($field:expr),* $(,)?) => {
        $crate::SpaceTemplate::new(vec![$($crate::TemplateField::from($field)),*])
    };
}
