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

//! Integration tests for tuple/template matching
//!
//! ## Purpose
//! Exercises matching and equality through the public API only, covering both
//! the open (`SpaceTuple`) and typed (`TypedTuple`) models.

use agentspaces_tuplespace::{
    render, space_template, space_tuple, EnumField, FieldKind, FieldValue, I32Template, I32Tuple,
    SpaceEnum, SpaceTemplate, SpaceTuple, SpaceUnit, Template, TemplateField, Tuple,
    TupleSpaceError, U8Tuple, UlidTemplate, UlidTuple,
};
use chrono::{TimeZone, Utc};
use std::time::Duration;
use ulid::Ulid;

#[derive(Clone, Copy)]
enum Phase {
    Map,
    Reduce,
}

impl SpaceEnum for Phase {
    const TYPE_NAME: &'static str = "Phase";

    fn discriminant(&self) -> i64 {
        *self as i64
    }
}

/// Test 1: arity mismatch never matches, regardless of wildcards
#[test]
fn test_arity_mismatch() {
    let tuple = I32Tuple::from([1, 2, 3]);
    for len in [0, 1, 2, 4, 5] {
        assert!(!I32Template::wildcards(len).matches(&tuple), "len {}", len);
    }
    assert!(I32Template::wildcards(3).matches(&tuple));
}

/// Test 2: the zero-length template matches only the zero-length tuple
#[test]
fn test_zero_length_template() {
    let empty_template = SpaceTemplate::new(vec![]);
    assert!(empty_template.matches(&SpaceTuple::empty()));
    assert!(!empty_template.matches(&space_tuple![SpaceUnit::TEXT]));
    assert_eq!(SpaceTuple::empty(), SpaceTuple::empty());
    assert!(SpaceTuple::empty().is_empty());
}

/// Test 3: mixed template with value, kind marker and wildcard
#[test]
fn test_mixed_template() {
    let started = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
    let tuple = space_tuple![
        "task",
        EnumField::of(&Phase::Map),
        started,
        Duration::from_secs(3),
    ];

    let template = space_template![
        "task",
        FieldKind::of_enum::<Phase>(),
        FieldKind::DateTime,
        SpaceUnit,
    ];
    assert!(template.matches(&tuple));

    let wrong_phase = space_template![
        "task",
        EnumField::of(&Phase::Reduce),
        SpaceUnit,
        SpaceUnit,
    ];
    assert!(!wrong_phase.matches(&tuple));
}

/// Test 4: tuples built field by field reject placeholders
#[test]
fn test_create_validates_fields() {
    let result = SpaceTuple::try_new(vec![
        TemplateField::from("ok"),
        TemplateField::Kind(FieldKind::U16),
    ]);
    assert!(matches!(
        result,
        Err(TupleSpaceError::InvalidField { index: 1, .. })
    ));

    let tuple = SpaceTuple::try_new(vec![FieldValue::from(1u16), FieldValue::from('z')]).unwrap();
    assert_eq!(tuple.len(), 2);
}

/// Test 5: typed equality is identical around register width
#[test]
fn test_typed_equality_register_widths() {
    // u8 packs 16 lanes per register
    for len in [0usize, 1, 2, 15, 16, 17, 33] {
        let fields: Vec<u8> = (0..len).map(|i| i as u8).collect();
        let a = U8Tuple::new(fields.clone());
        assert_eq!(a, U8Tuple::new(fields.clone()));

        if len > 0 {
            let mut changed = fields.clone();
            changed[len / 2] = changed[len / 2].wrapping_add(1);
            assert_ne!(a, U8Tuple::new(changed));
        }
    }
}

/// Test 6: unique ids use sequential equality and exact templates
#[test]
fn test_ulid_tuples() {
    let id = Ulid::new();
    let tuple = UlidTuple::from([id]);
    assert!(UlidTemplate::from(vec![Some(id)]).matches(&tuple));
    assert!(!UlidTemplate::from(vec![Some(Ulid::new())]).matches(&tuple));
}

/// Test 7: rendering
#[test]
fn test_render() {
    assert_eq!(render(&I32Tuple::from([1, 2])), "(1, 2)");
    assert_eq!(render(&I32Tuple::empty()), "()");
    assert_eq!(SpaceUnit.to_string(), "{NULL}");
    assert_eq!(
        space_template![SpaceUnit, FieldKind::Bool].to_string(),
        "({NULL}, {bool})"
    );
}
