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

//! Homogeneous tuples and templates
//!
//! ## Purpose
//! A space whose tuples all share one element type does not need per-field kind
//! tags. [`TypedTuple`] stores plain values and picks its equality strategy
//! from the element type: numeric elements use [`Vectorized`], the rest use
//! [`Sequential`].
//!
//! ## Examples
//! ```rust
//! use agentspaces_tuplespace::{I32Template, I32Tuple, Template};
//!
//! let tuple = I32Tuple::from(vec![1, 2, 3]);
//! let template = I32Template::from(vec![Some(1), None, Some(3)]);
//! assert!(template.matches(&tuple));
//! assert_eq!(tuple.to_string(), "(1, 2, 3)");
//! ```

use chrono::{DateTime, FixedOffset, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use ulid::Ulid;

use crate::equality::{EqualityStrategy, Sequential, Vectorized};
use crate::field::{FieldKind, SpaceUnit};
use crate::traits::{write_fields, Template, Tuple};

/// Element type of a homogeneous tuple
pub trait Element:
    Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Equality strategy used for tuples of this element
    type Equality: EqualityStrategy<Self>;

    /// Kind tag of the element
    fn kind() -> FieldKind;

    /// Text rendering of a single field
    fn fmt_field(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

macro_rules! elements {
    ($strategy:ty; $($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                type Equality = $strategy;

                fn kind() -> FieldKind {
                    FieldKind::$kind
                }

                fn fmt_field(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    fmt::Display::fmt(self, f)
                }
            }
        )*
    };
}

elements!(Vectorized;
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    i128 => I128,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    u128 => U128,
    f32 => F32,
    f64 => F64,
);

elements!(Sequential;
    bool => Bool,
    char => Char,
    String => String,
    Ulid => Ulid,
);

impl Element for DateTime<Utc> {
    type Equality = Sequential;

    fn kind() -> FieldKind {
        FieldKind::DateTime
    }

    fn fmt_field(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl Element for DateTime<FixedOffset> {
    type Equality = Sequential;

    fn kind() -> FieldKind {
        FieldKind::DateTimeOffset
    }

    fn fmt_field(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl Element for Duration {
    type Equality = Sequential;

    fn kind() -> FieldKind {
        FieldKind::Duration
    }

    fn fmt_field(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

struct Rendered<'a, T: Element>(&'a T);

impl<T: Element> fmt::Display for Rendered<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt_field(f)
    }
}

struct RenderedSlot<'a, T: Element>(&'a Option<T>);

impl<T: Element> fmt::Display for RenderedSlot<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => value.fmt_field(f),
            None => write!(f, "{}", SpaceUnit),
        }
    }
}

/// Homogeneous tuple
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Element")]
pub struct TypedTuple<T> {
    fields: Vec<T>,
}

impl<T: Element> TypedTuple<T> {
    /// Create a tuple from its fields
    pub fn new(fields: Vec<T>) -> Self {
        TypedTuple { fields }
    }

    /// Fields in order
    pub fn fields(&self) -> &[T] {
        &self.fields
    }

    /// Field at `index`
    pub fn get(&self, index: usize) -> Option<&T> {
        self.fields.get(index)
    }
}

impl<T: Element> PartialEq for TypedTuple<T> {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && <T::Equality as EqualityStrategy<T>>::equals(&self.fields, &other.fields)
    }
}

impl<T: Element> fmt::Display for TypedTuple<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_fields(f, self.fields.iter().map(Rendered))
    }
}

impl<T: Element> From<Vec<T>> for TypedTuple<T> {
    fn from(fields: Vec<T>) -> Self {
        TypedTuple::new(fields)
    }
}

impl<T: Element, const N: usize> From<[T; N]> for TypedTuple<T> {
    fn from(fields: [T; N]) -> Self {
        TypedTuple::new(fields.into())
    }
}

impl<T: Element> Tuple for TypedTuple<T> {
    type Template = TypedTemplate<T>;

    fn len(&self) -> usize {
        self.fields.len()
    }

    fn empty() -> Self {
        TypedTuple { fields: Vec::new() }
    }

    fn to_template(&self) -> TypedTemplate<T> {
        TypedTemplate {
            fields: self.fields.iter().cloned().map(Some).collect(),
        }
    }
}

/// Homogeneous template; `None` slots are wildcards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Element")]
pub struct TypedTemplate<T> {
    fields: Vec<Option<T>>,
}

impl<T: Element> TypedTemplate<T> {
    /// Create a template; `vec![]` is the zero-length template
    pub fn new(fields: Vec<Option<T>>) -> Self {
        TypedTemplate { fields }
    }

    /// Template of `len` wildcards
    pub fn wildcards(len: usize) -> Self {
        TypedTemplate {
            fields: vec![None; len],
        }
    }

    /// Field slots in order
    pub fn fields(&self) -> &[Option<T>] {
        &self.fields
    }
}

/// A single wildcard field
impl<T: Element> Default for TypedTemplate<T> {
    fn default() -> Self {
        TypedTemplate::wildcards(1)
    }
}

impl<T: Element> fmt::Display for TypedTemplate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_fields(f, self.fields.iter().map(RenderedSlot))
    }
}

impl<T: Element> From<Vec<Option<T>>> for TypedTemplate<T> {
    fn from(fields: Vec<Option<T>>) -> Self {
        TypedTemplate::new(fields)
    }
}

impl<T: Element> Template<TypedTuple<T>> for TypedTemplate<T> {
    fn len(&self) -> usize {
        self.fields.len()
    }

    fn matches(&self, tuple: &TypedTuple<T>) -> bool {
        if self.fields.len() != tuple.fields.len() {
            return false;
        }

        self.fields
            .iter()
            .zip(&tuple.fields)
            .all(|(slot, field)| slot.as_ref().map_or(true, |value| value == field))
    }
}

macro_rules! typed_aliases {
    ($($ty:ty => $tuple:ident, $template:ident);* $(;)?) => {
        $(
            #[doc = concat!("Tuple of `", stringify!($ty), "` fields")]
            pub type $tuple = TypedTuple<$ty>;
            #[doc = concat!("Template over [`", stringify!($tuple), "`]")]
            pub type $template = TypedTemplate<$ty>;
        )*
    };
}

typed_aliases!(
    bool => BoolTuple, BoolTemplate;
    char => CharTuple, CharTemplate;
    i8 => I8Tuple, I8Template;
    i16 => I16Tuple, I16Template;
    i32 => I32Tuple, I32Template;
    i64 => I64Tuple, I64Template;
    i128 => I128Tuple, I128Template;
    u8 => U8Tuple, U8Template;
    u16 => U16Tuple, U16Template;
    u32 => U32Tuple, U32Template;
    u64 => U64Tuple, U64Template;
    u128 => U128Tuple, U128Template;
    f32 => F32Tuple, F32Template;
    f64 => F64Tuple, F64Template;
    String => StringTuple, StringTemplate;
    DateTime<Utc> => DateTimeTuple, DateTimeTemplate;
    DateTime<FixedOffset> => DateTimeOffsetTuple, DateTimeOffsetTemplate;
    Duration => DurationTuple, DurationTemplate;
    Ulid => UlidTuple, UlidTemplate;
);
