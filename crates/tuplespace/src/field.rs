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

//! Field kinds accepted by tuples and templates
//!
//! ## Purpose
//! The space only stores a closed set of field kinds: fixed-size scalars,
//! booleans, characters, strings, a few well-known structured values
//! (date/time, offset date/time, duration, unique id) and enumerations.
//! Keeping the set closed lets template matching compare kind tags instead of
//! inspecting values at runtime.
//!
//! ## Types
//! - [`FieldValue`]: a concrete field value
//! - [`FieldKind`]: the kind tag of a value (used by kind-marker templates)
//! - [`TemplateField`]: a template slot (wildcard, kind marker or value)
//! - [`SpaceUnit`]: the sentinel used as wildcard and "space emptied" marker

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use ulid::Ulid;

use crate::TupleSpaceError;

/// Sentinel placeholder: the template wildcard and the "space became empty" marker.
///
/// All instances are equal to each other. It is never a valid tuple field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpaceUnit;

impl SpaceUnit {
    /// Text rendering of the unit
    pub const TEXT: &'static str = "{NULL}";
}

impl fmt::Display for SpaceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::TEXT)
    }
}

/// Kind tag of a field value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    /// `bool`
    Bool,
    /// `char`
    Char,
    /// `i8`
    I8,
    /// `i16`
    I16,
    /// `i32`
    I32,
    /// `i64`
    I64,
    /// `i128`
    I128,
    /// `u8`
    U8,
    /// `u16`
    U16,
    /// `u32`
    U32,
    /// `u64`
    U64,
    /// `u128`
    U128,
    /// `f32`
    F32,
    /// `f64`
    F64,
    /// `String`
    String,
    /// UTC date-time
    DateTime,
    /// Date-time with a fixed offset
    DateTimeOffset,
    /// Time span
    Duration,
    /// Unique identifier
    Ulid,
    /// Enumeration, tagged with its type name
    Enum(String),
}

impl FieldKind {
    /// Kind tag for an enumeration type
    pub fn of_enum<E: SpaceEnum>() -> Self {
        FieldKind::Enum(E::TYPE_NAME.to_string())
    }

    fn name(&self) -> &str {
        match self {
            FieldKind::Bool => "bool",
            FieldKind::Char => "char",
            FieldKind::I8 => "i8",
            FieldKind::I16 => "i16",
            FieldKind::I32 => "i32",
            FieldKind::I64 => "i64",
            FieldKind::I128 => "i128",
            FieldKind::U8 => "u8",
            FieldKind::U16 => "u16",
            FieldKind::U32 => "u32",
            FieldKind::U64 => "u64",
            FieldKind::U128 => "u128",
            FieldKind::F32 => "f32",
            FieldKind::F64 => "f64",
            FieldKind::String => "string",
            FieldKind::DateTime => "datetime",
            FieldKind::DateTimeOffset => "datetime_offset",
            FieldKind::Duration => "duration",
            FieldKind::Ulid => "ulid",
            FieldKind::Enum(name) => name,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Enumerations that can be stored in a space
///
/// ## Examples
/// ```rust
/// use agentspaces_tuplespace::{EnumField, SpaceEnum};
///
/// enum Color { Red, Green }
///
/// impl SpaceEnum for Color {
///     const TYPE_NAME: &'static str = "Color";
///     fn discriminant(&self) -> i64 {
///         match self { Color::Red => 0, Color::Green => 1 }
///     }
/// }
///
/// let field = EnumField::of(&Color::Green);
/// assert_eq!(field.discriminant(), 1);
/// ```
pub trait SpaceEnum {
    /// Name used as the enumeration's kind tag
    const TYPE_NAME: &'static str;

    /// Numeric value of the variant
    fn discriminant(&self) -> i64;
}

/// Enumeration value: type name plus discriminant
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumField {
    type_name: String,
    discriminant: i64,
}

impl EnumField {
    /// Create an enumeration field from its parts
    pub fn new(type_name: impl Into<String>, discriminant: i64) -> Self {
        EnumField {
            type_name: type_name.into(),
            discriminant,
        }
    }

    /// Create an enumeration field from a [`SpaceEnum`] value
    pub fn of<E: SpaceEnum>(value: &E) -> Self {
        EnumField::new(E::TYPE_NAME, value.discriminant())
    }

    /// Type name of the enumeration
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Discriminant of the variant
    pub fn discriminant(&self) -> i64 {
        self.discriminant
    }
}

impl fmt::Display for EnumField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.type_name, self.discriminant)
    }
}

/// Concrete field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Boolean value
    Bool(bool),
    /// Character value
    Char(char),
    /// 8-bit signed integer
    I8(i8),
    /// 16-bit signed integer
    I16(i16),
    /// 32-bit signed integer
    I32(i32),
    /// 64-bit signed integer
    I64(i64),
    /// 128-bit signed integer
    I128(i128),
    /// 8-bit unsigned integer
    U8(u8),
    /// 16-bit unsigned integer
    U16(u16),
    /// 32-bit unsigned integer
    U32(u32),
    /// 64-bit unsigned integer
    U64(u64),
    /// 128-bit unsigned integer
    U128(u128),
    /// Single precision float
    F32(f32),
    /// Double precision float
    F64(f64),
    /// String value
    String(String),
    /// UTC date-time
    DateTime(DateTime<Utc>),
    /// Date-time with fixed offset
    DateTimeOffset(DateTime<FixedOffset>),
    /// Time span
    Duration(Duration),
    /// Unique identifier
    Ulid(Ulid),
    /// Enumeration value
    Enum(EnumField),
}

impl FieldValue {
    /// Runtime kind of this value
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Bool(_) => FieldKind::Bool,
            FieldValue::Char(_) => FieldKind::Char,
            FieldValue::I8(_) => FieldKind::I8,
            FieldValue::I16(_) => FieldKind::I16,
            FieldValue::I32(_) => FieldKind::I32,
            FieldValue::I64(_) => FieldKind::I64,
            FieldValue::I128(_) => FieldKind::I128,
            FieldValue::U8(_) => FieldKind::U8,
            FieldValue::U16(_) => FieldKind::U16,
            FieldValue::U32(_) => FieldKind::U32,
            FieldValue::U64(_) => FieldKind::U64,
            FieldValue::U128(_) => FieldKind::U128,
            FieldValue::F32(_) => FieldKind::F32,
            FieldValue::F64(_) => FieldKind::F64,
            FieldValue::String(_) => FieldKind::String,
            FieldValue::DateTime(_) => FieldKind::DateTime,
            FieldValue::DateTimeOffset(_) => FieldKind::DateTimeOffset,
            FieldValue::Duration(_) => FieldKind::Duration,
            FieldValue::Ulid(_) => FieldKind::Ulid,
            FieldValue::Enum(e) => FieldKind::Enum(e.type_name.clone()),
        }
    }

    /// Whether this value's runtime kind equals `kind`
    pub fn is_kind(&self, kind: &FieldKind) -> bool {
        match (self, kind) {
            (FieldValue::Enum(e), FieldKind::Enum(name)) => e.type_name == *name,
            (FieldValue::Enum(_), _) | (_, FieldKind::Enum(_)) => false,
            _ => self.kind() == *kind,
        }
    }

    /// Convert a dynamic JSON scalar into a field value
    ///
    /// ## Errors
    /// - `InvalidField` for `null`, arrays and objects
    pub fn from_json(index: usize, value: &serde_json::Value) -> Result<Self, TupleSpaceError> {
        use serde_json::Value;

        match value {
            Value::Bool(b) => Ok(FieldValue::Bool(*b)),
            Value::String(s) => Ok(FieldValue::String(s.clone())),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(FieldValue::I64(i))
                } else if let Some(u) = n.as_u64() {
                    Ok(FieldValue::U64(u))
                } else if let Some(f) = n.as_f64() {
                    Ok(FieldValue::F64(f))
                } else {
                    Err(TupleSpaceError::invalid_field(index, "unrepresentable number"))
                }
            }
            Value::Null => Err(TupleSpaceError::invalid_field(
                index,
                "null fields are not allowed",
            )),
            Value::Array(_) | Value::Object(_) => Err(TupleSpaceError::invalid_field(
                index,
                "unsupported field kind",
            )),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Char(v) => write!(f, "{}", v),
            FieldValue::I8(v) => write!(f, "{}", v),
            FieldValue::I16(v) => write!(f, "{}", v),
            FieldValue::I32(v) => write!(f, "{}", v),
            FieldValue::I64(v) => write!(f, "{}", v),
            FieldValue::I128(v) => write!(f, "{}", v),
            FieldValue::U8(v) => write!(f, "{}", v),
            FieldValue::U16(v) => write!(f, "{}", v),
            FieldValue::U32(v) => write!(f, "{}", v),
            FieldValue::U64(v) => write!(f, "{}", v),
            FieldValue::U128(v) => write!(f, "{}", v),
            FieldValue::F32(v) => write!(f, "{}", v),
            FieldValue::F64(v) => write!(f, "{}", v),
            FieldValue::String(v) => f.write_str(v),
            FieldValue::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            FieldValue::DateTimeOffset(v) => write!(f, "{}", v.to_rfc3339()),
            FieldValue::Duration(v) => write!(f, "{:?}", v),
            FieldValue::Ulid(v) => write!(f, "{}", v),
            FieldValue::Enum(v) => write!(f, "{}", v),
        }
    }
}

/// Template slot
///
/// Also used as the general "any field" input of [`crate::SpaceTuple::try_new`],
/// which rejects everything but [`TemplateField::Value`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TemplateField {
    /// Wildcard: matches any value
    Unit,
    /// Kind marker: matches any value of this kind
    Kind(FieldKind),
    /// Exact value
    Value(FieldValue),
}

impl TemplateField {
    /// Check if a tuple field satisfies this slot
    pub fn matches(&self, field: &FieldValue) -> bool {
        match self {
            TemplateField::Unit => true,
            TemplateField::Kind(kind) => field.is_kind(kind),
            TemplateField::Value(expected) => field == expected,
        }
    }

    /// Whether this slot is the wildcard
    pub fn is_unit(&self) -> bool {
        matches!(self, TemplateField::Unit)
    }
}

impl Default for TemplateField {
    fn default() -> Self {
        TemplateField::Unit
    }
}

impl fmt::Display for TemplateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateField::Unit => write!(f, "{}", SpaceUnit),
            TemplateField::Kind(kind) => write!(f, "{{{}}}", kind),
            TemplateField::Value(value) => write!(f, "{}", value),
        }
    }
}

impl From<SpaceUnit> for TemplateField {
    fn from(_: SpaceUnit) -> Self {
        TemplateField::Unit
    }
}

impl From<FieldKind> for TemplateField {
    fn from(kind: FieldKind) -> Self {
        TemplateField::Kind(kind)
    }
}

impl From<FieldValue> for TemplateField {
    fn from(value: FieldValue) -> Self {
        TemplateField::Value(value)
    }
}

macro_rules! field_conversions {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(val: $ty) -> Self {
                    FieldValue::$variant(val)
                }
            }

            impl From<$ty> for TemplateField {
                fn from(val: $ty) -> Self {
                    TemplateField::Value(FieldValue::$variant(val))
                }
            }
        )*
    };
}

field_conversions!(
    bool => Bool,
    char => Char,
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
    String => String,
    DateTime<Utc> => DateTime,
    DateTime<FixedOffset> => DateTimeOffset,
    Duration => Duration,
    Ulid => Ulid,
    EnumField => Enum,
);

impl From<&str> for FieldValue {
    fn from(val: &str) -> Self {
        FieldValue::String(val.to_string())
    }
}

impl From<&str> for TemplateField {
    fn from(val: &str) -> Self {
        TemplateField::Value(FieldValue::String(val.to_string()))
    }
}
