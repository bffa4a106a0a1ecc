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

//! Open (heterogeneous) tuples and templates
//!
//! ## Purpose
//! [`SpaceTuple`] holds any mix of the supported field kinds; [`SpaceTemplate`]
//! matches them with exact values, kind markers or wildcards.
//!
//! ## Examples
//! ```rust
//! use agentspaces_tuplespace::{space_template, space_tuple, FieldKind, SpaceUnit, Template};
//!
//! let tuple = space_tuple!["order", 42i32, true];
//! let template = space_template!["order", FieldKind::I32, SpaceUnit];
//! assert!(template.matches(&tuple));
//! assert_eq!(tuple.to_string(), "(order, 42, true)");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::equality::{EqualityStrategy, Sequential};
use crate::field::{FieldValue, TemplateField};
use crate::traits::{write_fields, Template, Tuple};
use crate::TupleSpaceError;

/// Heterogeneous tuple
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpaceTuple {
    fields: Vec<FieldValue>,
}

impl SpaceTuple {
    /// Create a tuple from concrete values
    pub fn new(fields: Vec<FieldValue>) -> Self {
        SpaceTuple { fields }
    }

    /// Create a tuple from arbitrary field slots
    ///
    /// ## Errors
    /// - `InvalidField` if a slot is the unit sentinel or a kind marker
    pub fn try_new<I>(fields: I) -> Result<Self, TupleSpaceError>
    where
        I: IntoIterator,
        I::Item: Into<TemplateField>,
    {
        let fields = fields
            .into_iter()
            .enumerate()
            .map(|(index, field)| match field.into() {
                TemplateField::Value(value) => Ok(value),
                TemplateField::Unit => Err(TupleSpaceError::invalid_field(
                    index,
                    "unit is not allowed in a tuple",
                )),
                TemplateField::Kind(kind) => Err(TupleSpaceError::invalid_field(
                    index,
                    format!("kind marker {{{}}} is not allowed in a tuple", kind),
                )),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SpaceTuple { fields })
    }

    /// Create a tuple from a JSON array of scalars
    ///
    /// ## Errors
    /// - `InvalidField` at index 0 if the root is not an array
    /// - `InvalidField` for `null`, nested arrays and objects
    pub fn from_json(value: &serde_json::Value) -> Result<Self, TupleSpaceError> {
        let items = value
            .as_array()
            .ok_or_else(|| TupleSpaceError::invalid_field(0, "expected a JSON array"))?;

        let fields = items
            .iter()
            .enumerate()
            .map(|(index, item)| FieldValue::from_json(index, item))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SpaceTuple { fields })
    }

    /// Fields in order
    pub fn fields(&self) -> &[FieldValue] {
        &self.fields
    }

    /// Field at `index`
    pub fn get(&self, index: usize) -> Option<&FieldValue> {
        self.fields.get(index)
    }

    /// Iterate over the fields
    pub fn iter(&self) -> std::slice::Iter<'_, FieldValue> {
        self.fields.iter()
    }
}

impl PartialEq for SpaceTuple {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len() && Sequential::equals(&self.fields, &other.fields)
    }
}

impl fmt::Display for SpaceTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_fields(f, &self.fields)
    }
}

impl From<Vec<FieldValue>> for SpaceTuple {
    fn from(fields: Vec<FieldValue>) -> Self {
        SpaceTuple::new(fields)
    }
}

impl Tuple for SpaceTuple {
    type Template = SpaceTemplate;

    fn len(&self) -> usize {
        self.fields.len()
    }

    fn empty() -> Self {
        SpaceTuple { fields: Vec::new() }
    }

    fn to_template(&self) -> SpaceTemplate {
        SpaceTemplate::from(self)
    }
}

/// Heterogeneous template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceTemplate {
    fields: Vec<TemplateField>,
}

impl SpaceTemplate {
    /// Create a template; `vec![]` is the zero-length template
    pub fn new(fields: Vec<TemplateField>) -> Self {
        SpaceTemplate { fields }
    }

    /// Create a template from a JSON array; `null` becomes a wildcard
    pub fn from_json(value: &serde_json::Value) -> Result<Self, TupleSpaceError> {
        let items = value
            .as_array()
            .ok_or_else(|| TupleSpaceError::invalid_field(0, "expected a JSON array"))?;

        let fields = items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                serde_json::Value::Null => Ok(TemplateField::Unit),
                other => FieldValue::from_json(index, other).map(TemplateField::Value),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SpaceTemplate { fields })
    }

    /// Field slots in order
    pub fn fields(&self) -> &[TemplateField] {
        &self.fields
    }
}

/// A single wildcard field
impl Default for SpaceTemplate {
    fn default() -> Self {
        SpaceTemplate {
            fields: vec![TemplateField::Unit],
        }
    }
}

impl fmt::Display for SpaceTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_fields(f, &self.fields)
    }
}

impl From<&SpaceTuple> for SpaceTemplate {
    fn from(tuple: &SpaceTuple) -> Self {
        SpaceTemplate {
            fields: tuple.fields.iter().cloned().map(TemplateField::Value).collect(),
        }
    }
}

impl From<Vec<TemplateField>> for SpaceTemplate {
    fn from(fields: Vec<TemplateField>) -> Self {
        SpaceTemplate::new(fields)
    }
}

impl Template<SpaceTuple> for SpaceTemplate {
    fn len(&self) -> usize {
        self.fields.len()
    }

    fn matches(&self, tuple: &SpaceTuple) -> bool {
        if self.fields.len() != tuple.fields.len() {
            return false;
        }

        self.fields
            .iter()
            .zip(&tuple.fields)
            .all(|(slot, field)| slot.matches(field))
    }
}
