// Drachen
// Copyright (c) The Project Drachen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Drachen frame-stream encoder and decoder.
//!
//! Drachen is a streaming lossless codec for sequences of fixed-size binary
//! frames whose content correlates strongly frame-to-frame: screen captures,
//! uncompressed video, and similar byte streams. Each frame is partitioned
//! into blocks; a deterministic heuristic picks one of seven bit-packed
//! compression methods per block from statistics of the block and of its
//! difference against the previous frame, then merges adjacent blocks that
//! settle on the same choice into single element records.
//!
//! The container is self-describing: a magic, byte-order marks that let a
//! consumer of either endianness decode the producer's integers, the frame
//! size, and an optional byte permutation applied around the codec (see
//! [`perm::image_permutation`]). Frames are named, and can only be decoded
//! in order: each one is reconstructed against the frame before it.
//!
//! Encoding:
//!
//! ```no_run
//! use std::fs::File;
//! use drachen_codec::{EncoderOptions, FrameEncoder};
//!
//! # fn main() -> drachen_core::errors::Result<()> {
//! let file = File::create("capture.drachen")?;
//! let mut encoder = FrameEncoder::try_new(file, 4, EncoderOptions::default())?;
//! encoder.encode(b"frame-0", &[1, 2, 3, 4])?;
//! encoder.encode(b"frame-1", &[1, 2, 3, 5])?;
//! encoder.finish()?;
//! # Ok(())
//! # }
//! ```
//!
//! Decoding:
//!
//! ```no_run
//! use std::fs::File;
//! use drachen_codec::{DecoderOptions, FrameDecoder};
//! use drachen_core::errors::Error;
//!
//! # fn main() -> drachen_core::errors::Result<()> {
//! let file = File::open("capture.drachen")?;
//! let mut decoder = FrameDecoder::try_new(file, DecoderOptions::default())?;
//!
//! loop {
//!     match decoder.next_frame() {
//!         Ok(frame) => println!("{}: {} bytes", frame.name_lossy(), frame.data().len()),
//!         Err(Error::EndOfStream) => break,
//!         Err(err) => return Err(err),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod compress;
pub mod decompress;
pub mod element;
pub mod header;
pub mod heuristic;
pub mod perm;

mod decoder;
mod encoder;

pub use decoder::{DecoderOptions, Frame, FrameDecoder};
pub use encoder::{BlockSchedule, BlockSpec, EncoderOptions, FrameEncoder};

pub use drachen_core as core;
