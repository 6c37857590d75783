// Drachen
// Copyright (c) The Project Drachen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `heuristic` module chooses the encoding method for one block.
//!
//! For a block of the current frame and the aligned window of the previous
//! frame, the selector computes unsigned and signed min/max statistics over
//! the raw bytes (the "zero axis") and over the wrapping byte-wise
//! differences against the previous frame (the "prev axis"), then picks from
//! four families by how tightly the values cluster:
//!
//! * range 1 on any axis: the block is constant, encode as a bodiless `Zero`
//!   element;
//! * every range above 64: an 8-bit body (`None`, `Rle88`, `Rle48`,
//!   `Rle28`), whichever estimates shortest;
//! * some range at most 64: a 6-bit body centered on `Rle26`, against
//!   `Rle48` and `Rle88`;
//! * some range at most 16: a 4-bit body centered on `Half`, against `Rle88`
//!   and `Rle44`.
//!
//! Ties break toward the candidate listed first. The selection is
//! deterministic and depends only on the block and its previous-frame
//! window.

use crate::compress::count_runs;
use crate::element::Method;

/// A fully-determined encoding decision for one block. Adjacent blocks whose
/// decisions compare equal are merged into a single element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingMethod {
    /// The body compression method.
    pub method: Method,
    /// Sign-extend 4- and 6-bit data on decode.
    pub sign_extend: bool,
    /// Subtract the previous-frame window from the body; the decoder adds it
    /// back.
    pub from_prev: bool,
    /// Subtract this offset from every body byte; the decoder adds it back.
    pub fixed_sub: Option<u8>,
}

/// Unsigned and signed extrema of a byte slice.
struct Stats {
    umin: u8,
    umax: u8,
    smin: i8,
    smax: i8,
}

impl Stats {
    fn of(data: &[u8]) -> Stats {
        let mut umin = data[0];
        let mut umax = data[0];
        let mut smin = data[0] as i8;
        let mut smax = data[0] as i8;

        for &byte in &data[1..] {
            umin = umin.min(byte);
            umax = umax.max(byte);
            smin = smin.min(byte as i8);
            smax = smax.max(byte as i8);
        }

        Stats { umin, umax, smin, smax }
    }

    /// The unsigned range, `max - min + 1`.
    fn urange(&self) -> u32 {
        u32::from(self.umax) - u32::from(self.umin) + 1
    }

    /// The signed range, `max - min + 1`.
    fn srange(&self) -> u32 {
        (i32::from(self.smax) - i32::from(self.smin) + 1) as u32
    }
}

/// Exact body cost of `Rle48`: one shared header byte per run pair plus one
/// datum per run.
fn rle48_cost(runs: u32) -> u32 {
    runs + (runs + 1) / 2
}

/// Exact body cost of `Rle28`: one shared header byte per group of four runs
/// plus one datum per run.
fn rle28_cost(runs: u32) -> u32 {
    runs + (runs + 3) / 4
}

/// The axis and normalization chosen for a 6- or 4-bit family.
struct Axis {
    from_prev: bool,
    sign_extend: bool,
    fixed_sub: Option<u8>,
}

/// Pick the first usable axis, in the order unsigned-zero, unsigned-prev,
/// signed-zero, signed-prev. An axis is skipped in favor of the prev axis
/// when the prev axis fits the same width and its minimum is already 0,
/// since a fixed-sub byte there would buy nothing.
///
/// A signed axis only carries the sign-extend flag when its values fit the
/// signed width directly; otherwise it is normalized by its minimum into the
/// unsigned width, which decodes without sign extension.
fn pick_axis(zero: &Stats, prev: &Stats, limit: u32) -> Axis {
    let nonzero = |min: u8| if min != 0 { Some(min) } else { None };

    if zero.urange() <= limit && (prev.umin != 0 || prev.urange() > limit) {
        Axis { from_prev: false, sign_extend: false, fixed_sub: nonzero(zero.umin) }
    }
    else if prev.urange() <= limit {
        Axis { from_prev: true, sign_extend: false, fixed_sub: nonzero(prev.umin) }
    }
    else if zero.srange() <= limit && (prev.smin != 0 || prev.srange() > limit) {
        signed_axis(zero, limit, false)
    }
    else {
        signed_axis(prev, limit, true)
    }
}

fn signed_axis(stats: &Stats, limit: u32, from_prev: bool) -> Axis {
    let half = (limit / 2) as i32;

    if i32::from(stats.smin) >= -half && i32::from(stats.smax) < half {
        Axis { from_prev, sign_extend: true, fixed_sub: None }
    }
    else {
        Axis { from_prev, sign_extend: false, fixed_sub: Some(stats.smin as u8) }
    }
}

/// A reusable block-method selector. Holds the difference scratch buffer so
/// that selecting a method allocates nothing in steady state.
pub struct MethodSelector {
    diff: Vec<u8>,
}

impl MethodSelector {
    pub fn new() -> MethodSelector {
        MethodSelector { diff: Vec::new() }
    }

    /// Choose the encoding method for the block `data` against the aligned
    /// previous-frame window `prev`.
    pub fn select(&mut self, data: &[u8], prev: &[u8]) -> EncodingMethod {
        assert_eq!(data.len(), prev.len());
        assert!(!data.is_empty());

        self.diff.clear();
        self.diff.extend(data.iter().zip(prev).map(|(&d, &p)| d.wrapping_sub(p)));
        let diff: &[u8] = &self.diff;

        let zero = Stats::of(data);
        let prev = Stats::of(diff);

        // A constant axis means a bodiless Zero element. Prefer whichever
        // axis costs nothing beyond the header; zero axis on ties. A block of
        // equal bytes is constant under the unsigned and signed views alike,
        // so the sign flag never matters here.
        if zero.urange() == 1 || prev.urange() == 1 {
            let (from_prev, fixed_sub) = if zero.urange() == 1 && zero.umin == 0 {
                (false, None)
            }
            else if prev.urange() == 1 && prev.umin == 0 {
                (true, None)
            }
            else if zero.urange() == 1 {
                (false, Some(zero.umin))
            }
            else {
                (true, Some(prev.umin))
            };

            return EncodingMethod { method: Method::Zero, sign_extend: false, from_prev, fixed_sub };
        }

        if zero.urange() > 64 && prev.urange() > 64 && zero.srange() > 64 && prev.srange() > 64 {
            return self.select_wide(data, &zero);
        }

        if zero.urange() > 16 && prev.urange() > 16 && zero.srange() > 16 && prev.srange() > 16 {
            return self.select_six_bit(data, &zero, &prev);
        }

        self.select_four_bit(data, &zero, &prev)
    }

    /// All four ranges need eight bits. A fixed offset can never shrink the
    /// body, so it is never paid for.
    fn select_wide(&self, data: &[u8], zero: &Stats) -> EncodingMethod {
        // Subtract the previous frame only if the raw data would not itself
        // fit; with every range wide that is never the case here.
        let from_prev = zero.urange() <= 64 && zero.srange() <= 64;
        let body = if from_prev { &self.diff[..] } else { data };

        let mut method = Method::None;
        let mut cost = body.len() as u32;

        let other = 2 * count_runs(body, 256);
        if other < cost {
            method = Method::Rle88;
            cost = other;
        }

        let other = rle48_cost(count_runs(body, 16));
        if other < cost {
            method = Method::Rle48;
            cost = other;
        }

        let other = rle28_cost(count_runs(body, 4));
        if other < cost {
            method = Method::Rle28;
        }

        EncodingMethod { method, sign_extend: false, from_prev, fixed_sub: None }
    }

    /// Some axis fits six bits: `Rle26` against the 8-bit run encodings.
    /// (`Rle26` is never worse than an uncompressed body, and `Rle28` is
    /// strictly worse than `Rle26` here.)
    fn select_six_bit(&self, data: &[u8], zero: &Stats, prev: &Stats) -> EncodingMethod {
        let axis = pick_axis(zero, prev, 64);
        let body = if axis.from_prev { &self.diff[..] } else { data };

        let mut method = Method::Rle26;
        let mut cost = count_runs(body, 4);

        let other = rle48_cost(count_runs(body, 16));
        if other < cost {
            method = Method::Rle48;
            cost = other;
        }

        let other = 2 * count_runs(body, 256);
        if other < cost {
            method = Method::Rle88;
        }

        // An 8-bit body carries its values whole; an offset would only waste
        // its byte.
        let fixed_sub = match method {
            Method::Rle48 | Method::Rle88 => None,
            _ => axis.fixed_sub,
        };

        EncodingMethod { method, sign_extend: axis.sign_extend, from_prev: axis.from_prev, fixed_sub }
    }

    /// Some axis fits four bits: `Half` against `Rle88` and `Rle44`.
    /// (`Rle48` is strictly worse than `Rle44` here.) The run candidates are
    /// estimated on the raw data.
    fn select_four_bit(&self, data: &[u8], zero: &Stats, prev: &Stats) -> EncodingMethod {
        let axis = pick_axis(zero, prev, 16);

        let mut method = Method::Half;
        let mut cost = (data.len() as u32 + 1) / 2;

        let other = 2 * count_runs(data, 256);
        if other < cost {
            method = Method::Rle88;
            cost = other;
        }

        let other = count_runs(data, 16);
        if other < cost {
            method = Method::Rle44;
        }

        let fixed_sub = match method {
            Method::Rle88 => None,
            _ => axis.fixed_sub,
        };

        EncodingMethod { method, sign_extend: axis.sign_extend, from_prev: axis.from_prev, fixed_sub }
    }
}

impl Default for MethodSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{EncodingMethod, MethodSelector};
    use crate::element::Method;

    fn select(data: &[u8], prev: &[u8]) -> EncodingMethod {
        MethodSelector::new().select(data, prev)
    }

    #[test]
    fn verify_constant_blocks_choose_zero() {
        let prev = [17u8; 8];

        // All-zero data against any previous window: a bare Zero element.
        let meth = select(&[0u8; 8], &prev);
        assert_eq!(
            meth,
            EncodingMethod {
                method: Method::Zero,
                sign_extend: false,
                from_prev: false,
                fixed_sub: None
            }
        );

        // Data identical to the previous window: Zero via the prev axis.
        let data = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let meth = select(&data, &data);
        assert_eq!(
            meth,
            EncodingMethod {
                method: Method::Zero,
                sign_extend: false,
                from_prev: true,
                fixed_sub: None
            }
        );

        // Constant nonzero data: Zero plus the offset byte.
        let meth = select(&[0x42u8; 8], &[0u8; 8]);
        assert_eq!(meth.method, Method::Zero);
        assert!(!meth.from_prev);
        assert_eq!(meth.fixed_sub, Some(0x42));

        // Constant difference: Zero via the prev axis plus the offset byte.
        let data: Vec<u8> = (0u8..8).map(|b| b.wrapping_add(3)).collect();
        let prev: Vec<u8> = (0u8..8).collect();
        let meth = select(&data, &prev);
        assert_eq!(meth.method, Method::Zero);
        assert!(meth.from_prev);
        assert_eq!(meth.fixed_sub, Some(3));
    }

    #[test]
    fn verify_all_zero_first_frame_is_bare_zero() {
        // Both axes are constant zero; the zero axis wins the tie so the
        // element carries neither flag.
        let meth = select(&[0u8; 8], &[0u8; 8]);
        assert!(!meth.from_prev);
        assert_eq!(meth.fixed_sub, None);
        assert_eq!(meth.method, Method::Zero);
    }

    #[test]
    fn verify_wide_blocks() {
        // Incompressible wide-range data: raw copy.
        let data: Vec<u8> = (0..64u32).map(|i| (i * 37 + (i % 3) * 101) as u8).collect();
        let prev = vec![0u8; 64];
        let meth = select(&data, &prev);
        assert_eq!(meth.method, Method::None);
        assert!(!meth.from_prev);
        assert_eq!(meth.fixed_sub, None);

        // Wide-range data in long runs: Rle88.
        let mut data = vec![0x00u8; 24];
        data.extend_from_slice(&[0x80; 24]);
        data.extend_from_slice(&[0x40; 16]);
        let prev = vec![0x77u8; 64];
        let meth = select(&data, &prev);
        assert_eq!(meth.method, Method::Rle88);
        assert_eq!(meth.fixed_sub, None);
    }

    #[test]
    fn verify_four_bit_family_never_raw() {
        // Differences all fit four bits: the method must never be None.
        let prev: Vec<u8> = (0u8..32).map(|i| i.wrapping_mul(59)).collect();
        let data: Vec<u8> = prev.iter().enumerate().map(|(i, &b)| b.wrapping_add((i as u8) % 11)).collect();

        let meth = select(&data, &prev);
        assert_ne!(meth.method, Method::None);
        assert!(meth.from_prev);
    }

    #[test]
    fn verify_six_bit_family() {
        // Raw values spread beyond 16 but within 64, no useful prev axis.
        let data: Vec<u8> = (0u8..32).map(|i| (i * 7) % 60).collect();
        let prev: Vec<u8> = (0u8..32).map(|i| i.wrapping_mul(83).wrapping_add(150)).collect();

        let meth = select(&data, &prev);
        assert!(!meth.from_prev);
        assert!(!meth.sign_extend);
        // Scattered values: runs are all length 1, so Rle26 keeps the body at
        // one byte per datum and wins the family.
        assert_eq!(meth.method, Method::Rle26);
        assert_eq!(meth.fixed_sub, None);
    }

    #[test]
    fn verify_signed_axis_handling() {
        // Small signed differences around zero fit four bits directly: the
        // sign-extend flag is used and no offset byte is paid.
        let prev: Vec<u8> = (0u8..32).map(|i| i.wrapping_mul(53).wrapping_add(7)).collect();
        let data: Vec<u8> =
            prev.iter().enumerate().map(|(i, &b)| b.wrapping_add(((i as i32 % 9) - 4) as u8)).collect();

        let meth = select(&data, &prev);
        assert!(meth.from_prev);
        assert!(meth.sign_extend);
        assert_eq!(meth.fixed_sub, None);

        // A signed span reaching past the direct window is normalized by its
        // minimum into the unsigned width instead, with the flag clear.
        let data: Vec<u8> = (0u8..32).map(|i| ((i as i32 * 2 % 61) - 40) as u8).collect();
        let prev = vec![0u8; 32];
        let meth = select(&data, &prev);
        assert!(!meth.from_prev);
        assert!(!meth.sign_extend);
        assert_eq!(meth.method, Method::Rle26);
        assert_eq!(meth.fixed_sub, Some((-40i8) as u8));
    }
}
