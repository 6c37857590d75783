// Drachen
// Copyright (c) The Project Drachen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `decompress` module deserializes element bodies.
//!
//! Each method reads exactly the bytes needed to produce its declared output
//! length, never more. A run that would write past the end of the block is an
//! overrun; input ending before the block is filled is a premature
//! end-of-stream.

use drachen_core::errors::{overrun_error, Result};
use drachen_core::io::ReadBytes;

use crate::element::Method;

/// Deserialize a block with the given method, filling `out` exactly.
///
/// `sign_extend` replicates the top bit of each 4- or 6-bit datum into the
/// unused high bits for the `Rle44`, `Rle26`, and `Half` methods; the other
/// methods carry full bytes and ignore it.
pub fn decompress<B: ReadBytes>(
    method: Method,
    reader: &mut B,
    out: &mut [u8],
    sign_extend: bool,
) -> Result<()> {
    debug_assert!(!out.is_empty());

    match method {
        Method::None => reader.read_buf_exact(out),
        Method::Rle88 => rle88(reader, out),
        Method::Rle48 => rle48(reader, out),
        Method::Rle28 => rle28(reader, out),
        Method::Rle44 => rle44(reader, out, sign_extend),
        Method::Rle26 => rle26(reader, out, sign_extend),
        Method::Half => half(reader, out, sign_extend),
        Method::Zero => {
            out.fill(0);
            Ok(())
        }
    }
}

/// Fill `len` bytes of the block with `byte`, or fail with an overrun if the
/// run does not fit.
#[inline(always)]
fn fill_run(out: &mut [u8], pos: &mut usize, len: usize, byte: u8) -> Result<()> {
    if len > out.len() - *pos {
        return overrun_error();
    }
    out[*pos..*pos + len].fill(byte);
    *pos += len;
    Ok(())
}

fn rle88<B: ReadBytes>(reader: &mut B, out: &mut [u8]) -> Result<()> {
    let mut pos = 0;

    while pos < out.len() {
        let len = match reader.read_byte()? {
            0 => 256,
            len => usize::from(len),
        };
        let byte = reader.read_byte()?;
        fill_run(out, &mut pos, len, byte)?;
    }

    Ok(())
}

fn rle48<B: ReadBytes>(reader: &mut B, out: &mut [u8]) -> Result<()> {
    let mut pos = 0;

    while pos < out.len() {
        let head = reader.read_byte()?;
        let len0 = match head & 0xf {
            0 => 16,
            len => usize::from(len),
        };
        let len1 = match head >> 4 {
            0 => 16,
            len => usize::from(len),
        };

        let byte0 = reader.read_byte()?;
        fill_run(out, &mut pos, len0, byte0)?;

        // The second half of the pair may be absent at the end of the block.
        if pos == out.len() {
            break;
        }

        let byte1 = reader.read_byte()?;
        fill_run(out, &mut pos, len1, byte1)?;
    }

    Ok(())
}

fn rle28<B: ReadBytes>(reader: &mut B, out: &mut [u8]) -> Result<()> {
    let mut pos = 0;

    while pos < out.len() {
        let head = reader.read_byte()?;

        for slot in 0..4 {
            let len = match (head >> (2 * slot)) & 0x3 {
                0 => 4,
                len => usize::from(len),
            };

            let byte = reader.read_byte()?;
            fill_run(out, &mut pos, len, byte)?;

            // Trailing runs of the group may be absent at the end of the
            // block.
            if pos == out.len() {
                break;
            }
        }
    }

    Ok(())
}

fn rle44<B: ReadBytes>(reader: &mut B, out: &mut [u8], sign_extend: bool) -> Result<()> {
    let mut pos = 0;

    while pos < out.len() {
        let value = reader.read_byte()?;

        let len = match value & 0xf {
            0 => 16,
            len => usize::from(len),
        };

        let mut datum = (value >> 4) & 0xf;
        if sign_extend && datum & 0x8 != 0 {
            datum |= 0xf0;
        }

        fill_run(out, &mut pos, len, datum)?;
    }

    Ok(())
}

fn rle26<B: ReadBytes>(reader: &mut B, out: &mut [u8], sign_extend: bool) -> Result<()> {
    let mut pos = 0;

    while pos < out.len() {
        let value = reader.read_byte()?;

        let len = match value & 0x3 {
            0 => 4,
            len => usize::from(len),
        };

        let mut datum = (value >> 2) & 0x3f;
        if sign_extend && datum & 0x20 != 0 {
            datum |= 0xc0;
        }

        fill_run(out, &mut pos, len, datum)?;
    }

    Ok(())
}

fn half<B: ReadBytes>(reader: &mut B, out: &mut [u8], sign_extend: bool) -> Result<()> {
    let mut pos = 0;

    while pos < out.len() {
        let value = reader.read_byte()?;

        let mut lo = value & 0xf;
        let mut hi = (value >> 4) & 0xf;

        if sign_extend {
            if lo & 0x8 != 0 {
                lo |= 0xf0;
            }
            if hi & 0x8 != 0 {
                hi |= 0xf0;
            }
        }

        out[pos] = lo;
        pos += 1;

        // The high nibble of the last byte of an odd-length block is unused.
        if pos < out.len() {
            out[pos] = hi;
            pos += 1;
        }
    }

    Ok(())
}
