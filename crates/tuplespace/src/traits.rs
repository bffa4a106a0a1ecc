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

//! Tuple and template abstractions shared by the open and typed models

use serde::{de::DeserializeOwned, Serialize};
use std::fmt;

/// Immutable ordered record stored in a space
///
/// ## Invariants
/// - Never contains the unit sentinel
/// - The zero-length tuple ([`Tuple::empty`]) is the "no match" result and is
///   never written to a space
pub trait Tuple:
    Clone + PartialEq + fmt::Debug + fmt::Display + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Template type that matches this tuple type
    type Template: Template<Self>;

    /// Number of fields
    fn len(&self) -> usize;

    /// Whether this is the zero-length tuple
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The canonical zero-length tuple
    fn empty() -> Self;

    /// Template with every field set to this tuple's value (exact match)
    fn to_template(&self) -> Self::Template;
}

/// Pattern over tuples of type `T`
pub trait Template<T>:
    Clone + fmt::Debug + fmt::Display + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Number of fields
    fn len(&self) -> usize;

    /// Whether the template has no fields
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Structural match: equal length and every field satisfied
    fn matches(&self, tuple: &T) -> bool;
}

/// Render a tuple as text, `(f1, f2, ...)` or `()`
pub fn render<T: Tuple>(tuple: &T) -> String {
    tuple.to_string()
}

pub(crate) fn write_fields<I>(f: &mut fmt::Formatter<'_>, fields: I) -> fmt::Result
where
    I: IntoIterator,
    I::Item: fmt::Display,
{
    f.write_str("(")?;
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", field)?;
    }
    f.write_str(")")
}
