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

//! Element-wise equality strategies for homogeneous tuples
//!
//! Numeric tuples compare their fields in 128-bit register-sized chunks; every
//! other element type is compared one field at a time. The strategy is chosen
//! at compile time through [`crate::Element::Equality`], and the vectorized path
//! falls back to the scalar one when the CPU reports no SIMD support.

use std::sync::OnceLock;

/// Register width in bytes
pub const REGISTER_BYTES: usize = 16;

/// Compares two equal-length field slices
pub trait EqualityStrategy<T> {
    /// Element-wise equality; callers guarantee equal lengths
    fn equals(left: &[T], right: &[T]) -> bool;
}

/// One field at a time
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential;

/// Register-sized chunks, with a scalar fallback
#[derive(Debug, Clone, Copy, Default)]
pub struct Vectorized;

/// Numeric element that can be packed into a register
pub trait VectorLane: Copy + PartialEq {
    /// One register worth of lanes
    type Register: Copy + PartialEq + AsRef<[Self]> + AsMut<[Self]>;

    /// Value used to pad a partially filled register
    const NEUTRAL: Self;

    /// Register with every lane set to [`VectorLane::NEUTRAL`]
    const NEUTRAL_REGISTER: Self::Register;

    /// Lanes per register
    const LANES: usize;
}

macro_rules! vector_lanes {
    ($($ty:ty => $neutral:expr),* $(,)?) => {
        $(
            impl VectorLane for $ty {
                type Register = [$ty; REGISTER_BYTES / std::mem::size_of::<$ty>()];
                const NEUTRAL: Self = $neutral;
                const NEUTRAL_REGISTER: Self::Register =
                    [$neutral; REGISTER_BYTES / std::mem::size_of::<$ty>()];
                const LANES: usize = REGISTER_BYTES / std::mem::size_of::<$ty>();
            }
        )*
    };
}

vector_lanes!(
    i8 => 0,
    i16 => 0,
    i32 => 0,
    i64 => 0,
    i128 => 0,
    u8 => 0,
    u16 => 0,
    u32 => 0,
    u64 => 0,
    u128 => 0,
    f32 => 0.0,
    f64 => 0.0,
);

/// Whether the vectorized path is available on this CPU (detected once)
pub fn is_hardware_accelerated() -> bool {
    static ACCELERATED: OnceLock<bool> = OnceLock::new();
    *ACCELERATED.get_or_init(detect_simd)
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn detect_simd() -> bool {
    is_x86_feature_detected!("sse2")
}

#[cfg(target_arch = "aarch64")]
fn detect_simd() -> bool {
    std::arch::is_aarch64_feature_detected!("neon")
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
fn detect_simd() -> bool {
    false
}

impl<T: PartialEq> EqualityStrategy<T> for Sequential {
    fn equals(left: &[T], right: &[T]) -> bool {
        sequential_equals(left, right)
    }
}

impl<T: VectorLane> EqualityStrategy<T> for Vectorized {
    fn equals(left: &[T], right: &[T]) -> bool {
        if left.len() != right.len() {
            return false;
        }

        if !is_hardware_accelerated() || left.len() < 2 {
            return sequential_equals(left, right);
        }

        vectorized_equals(left, right)
    }
}

pub(crate) fn sequential_equals<T: PartialEq>(left: &[T], right: &[T]) -> bool {
    left.len() == right.len() && left.iter().zip(right).all(|(l, r)| l == r)
}

pub(crate) fn vectorized_equals<T: VectorLane>(left: &[T], right: &[T]) -> bool {
    if left.len() != right.len() {
        return false;
    }

    match left.len() {
        0 => return true,
        1 => return left[0] == right[0],
        _ => {}
    }

    let mut left_chunks = left.chunks_exact(T::LANES);
    let mut right_chunks = right.chunks_exact(T::LANES);

    for (l, r) in left_chunks.by_ref().zip(right_chunks.by_ref()) {
        if load(l) != load(r) {
            return false;
        }
    }

    let (l, r) = (left_chunks.remainder(), right_chunks.remainder());
    match l.len() {
        0 => true,
        1 => l[0] == r[0],
        _ => load(l) == load(r),
    }
}

fn load<T: VectorLane>(chunk: &[T]) -> T::Register {
    let mut register = T::NEUTRAL_REGISTER;
    register.as_mut()[..chunk.len()].copy_from_slice(chunk);
    register
}
