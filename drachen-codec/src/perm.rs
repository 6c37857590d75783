// Drachen
// Copyright (c) The Project Drachen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `perm` module works with frame permutation tables.
//!
//! A permutation table is stored in the stream header and applied by the
//! decoder as a gather: `out[i] = frame[table[i]]`. The encoder applies its
//! inverse. The tables are usually identity; for image data a table built by
//! [`image_permutation`] groups each component plane into tiles so that
//! spatially-correlated bytes sit next to each other, which the block
//! heuristic rewards.

use drachen_core::errors::{bad_permutation_error, Error, Result};

/// Invert a permutation table.
///
/// Fails with [`Error::BadPermutation`] if any entry is out of range or
/// repeated, since such a table cannot reorder a frame losslessly.
pub fn invert_permutation(table: &[u32]) -> Result<Box<[u32]>> {
    let len = table.len();
    let mut inverse = vec![u32::MAX; len].into_boxed_slice();

    for (pos, &entry) in table.iter().enumerate() {
        if entry as usize >= len || inverse[entry as usize] != u32::MAX {
            return bad_permutation_error();
        }
        inverse[entry as usize] = pos as u32;
    }

    Ok(inverse)
}

/// Build a permutation table for frames carrying an image.
///
/// The frame is taken to hold `rows × cols` pixels of `components`
/// interleaved bytes each, starting `offset` bytes into the frame. The table
/// reorders the image into per-component planes, each walked in
/// `block_w × block_h` tiles, row-major within and across tiles. Bytes
/// before `offset` and after the image keep their positions.
pub fn image_permutation(
    frame_size: u32,
    offset: u32,
    rows: u32,
    cols: u32,
    components: u32,
    block_w: u32,
    block_h: u32,
) -> Result<Box<[u32]>> {
    if rows == 0 || cols == 0 || components == 0 || block_w == 0 || block_h == 0 {
        return Err(Error::Other("image geometry has a zero dimension"));
    }

    let image_len = u64::from(rows) * u64::from(cols) * u64::from(components);
    if u64::from(offset) + image_len > u64::from(frame_size) {
        return Err(Error::Other("image geometry exceeds the frame"));
    }

    // Identity everywhere the image does not reach.
    let mut table: Vec<u32> = (0..frame_size).collect();

    let mut grouped = offset;
    for component in 0..components {
        for tile_row in (0..rows).step_by(block_h as usize) {
            for tile_col in (0..cols).step_by(block_w as usize) {
                for row in tile_row..(tile_row + block_h).min(rows) {
                    for col in tile_col..(tile_col + block_w).min(cols) {
                        let source = offset + (row * cols + col) * components + component;
                        table[source as usize] = grouped;
                        grouped += 1;
                    }
                }
            }
        }
    }

    Ok(table.into_boxed_slice())
}
