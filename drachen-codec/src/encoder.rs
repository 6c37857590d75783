// Drachen
// Copyright (c) The Project Drachen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `encoder` module implements the Drachen frame encoder.

use std::cmp;
use std::io;
use std::mem;

use log::debug;

use drachen_core::errors::{Error, Result};
use drachen_core::io::{SinkStream, WriteBytes};

use crate::element::{ElementHead, Method};
use crate::header::write_stream_header;
use crate::heuristic::{EncodingMethod, MethodSelector};
use crate::perm::invert_permutation;

/// The block size used when no schedule is supplied.
const DEFAULT_BLOCK_SIZE: u32 = 32;

/// One segment of a [`BlockSchedule`]: offsets below `segment_end` are
/// partitioned into blocks of `block_size` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpec {
    /// Exclusive end of the segment.
    pub segment_end: u32,
    /// Block size within the segment. At least 1.
    pub block_size: u32,
}

/// A `BlockSchedule` partitions frames into the blocks the method-selection
/// heuristic operates on.
///
/// This is an encoder-side tuning parameter only; it leaves no trace in the
/// wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSchedule(Box<[BlockSpec]>);

impl BlockSchedule {
    /// Build a schedule from segments. Segment ends must strictly increase
    /// and block sizes must be at least 1.
    pub fn new(specs: Vec<BlockSpec>) -> Result<BlockSchedule> {
        if specs.is_empty() {
            return Err(Error::Other("block schedule is empty"));
        }

        let mut last_end = 0;
        for spec in &specs {
            if spec.block_size < 1 || spec.segment_end <= last_end {
                return Err(Error::Other("block schedule is not strictly increasing"));
            }
            last_end = spec.segment_end;
        }

        Ok(BlockSchedule(specs.into_boxed_slice()))
    }

    /// A single-segment schedule of uniform blocks covering any frame.
    pub fn uniform(block_size: u32) -> Result<BlockSchedule> {
        BlockSchedule::new(vec![BlockSpec { segment_end: u32::MAX, block_size }])
    }

    /// Whether the schedule's final segment covers a whole frame.
    fn covers(&self, frame_size: u32) -> bool {
        self.0[self.0.len() - 1].segment_end >= frame_size
    }
}

impl Default for BlockSchedule {
    fn default() -> Self {
        BlockSchedule(Box::new([BlockSpec {
            segment_end: u32::MAX,
            block_size: DEFAULT_BLOCK_SIZE,
        }]))
    }
}

/// `EncoderOptions` is the set of options an encoder is instantiated with.
#[derive(Default)]
pub struct EncoderOptions {
    /// The permutation to store in the stream: the decode-side gather table,
    /// exactly one entry per frame byte. `None` means identity.
    pub permutation: Option<Box<[u32]>>,
    /// The block partition the heuristic works over.
    pub schedule: BlockSchedule,
}

/// A `FrameEncoder` writes a Drachen stream: the container header at
/// construction, then one named frame per [`FrameEncoder::encode`] call.
///
/// The first failure latches: every call after it returns the same error
/// without touching the underlying writer.
pub struct FrameEncoder<W: io::Write> {
    sink: SinkStream<W>,
    frame_size: u32,
    schedule: BlockSchedule,
    /// Inverse of the stored permutation, or `None` for identity.
    gather: Option<Box<[u32]>>,
    prev: Box<[u8]>,
    curr: Box<[u8]>,
    selector: MethodSelector,
    /// Scratch for transformed element bodies.
    body: Vec<u8>,
    error: Option<Error>,
}

impl<W: io::Write> FrameEncoder<W> {
    /// Instantiate a `FrameEncoder` over the given writer and write the
    /// stream header.
    pub fn try_new(inner: W, frame_size: u32, options: EncoderOptions) -> Result<FrameEncoder<W>> {
        if frame_size == 0 {
            return Err(Error::Other("frame size must be nonzero"));
        }
        if !options.schedule.covers(frame_size) {
            return Err(Error::Other("block schedule does not cover the frame"));
        }

        let gather = match &options.permutation {
            Some(table) => {
                if table.len() != frame_size as usize {
                    return Err(Error::BadPermutation);
                }
                Some(invert_permutation(table)?)
            }
            None => None,
        };

        let mut sink = SinkStream::new(inner);
        write_stream_header(&mut sink, frame_size, options.permutation.as_deref())?;

        Ok(FrameEncoder {
            sink,
            frame_size,
            schedule: options.schedule,
            gather,
            prev: vec![0u8; frame_size as usize].into_boxed_slice(),
            curr: vec![0u8; frame_size as usize].into_boxed_slice(),
            selector: MethodSelector::new(),
            body: Vec::new(),
            error: None,
        })
    }

    /// The fixed frame size of the stream.
    pub fn frame_size(&self) -> u32 {
        self.frame_size
    }

    /// The number of bytes written so far, including the stream header.
    pub fn bytes_written(&self) -> u64 {
        self.sink.pos()
    }

    /// Encode one frame under the given name. The name may not contain a NUL
    /// byte and the frame must be exactly one frame long.
    pub fn encode(&mut self, name: &[u8], frame: &[u8]) -> Result<()> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }

        match self.encode_inner(name, frame) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Flush all output, then flush and return the underlying writer.
    pub fn finish(self) -> Result<W> {
        if let Some(err) = self.error {
            return Err(err);
        }
        self.sink.finish()
    }

    fn encode_inner(&mut self, name: &[u8], frame: &[u8]) -> Result<()> {
        if frame.len() != self.frame_size as usize {
            return Err(Error::WrongFrameSize {
                expected: self.frame_size,
                actual: frame.len() as u32,
            });
        }
        if name.contains(&0) {
            return Err(Error::Other("frame name contains a NUL byte"));
        }

        self.sink.write_buf(name)?;
        self.sink.write_byte(0)?;

        // Gather the caller's bytes through the inverse permutation.
        match &self.gather {
            Some(gather) => {
                for (dest, &src) in self.curr.iter_mut().zip(gather.iter()) {
                    *dest = frame[src as usize];
                }
            }
            None => self.curr.copy_from_slice(frame),
        }

        let start_pos = self.sink.pos();

        // Walk the frame block by block, merging adjacent blocks that settle
        // on an identical method tuple, and flushing an element whenever the
        // tuple changes.
        let frame_size = self.frame_size;
        let mut segment = 0;
        let mut element_start = 0u32;
        let mut element_method: Option<EncodingMethod> = None;

        let mut offset = 0u32;
        while offset < frame_size {
            let spec = self.schedule.0[segment];

            let mut block_size = spec.block_size;
            if offset.saturating_add(block_size) >= spec.segment_end {
                block_size = spec.segment_end - offset;
                segment += 1;
            }
            block_size = cmp::min(block_size, frame_size - offset);

            let range = offset as usize..(offset + block_size) as usize;
            let method = self.selector.select(&self.curr[range.clone()], &self.prev[range]);

            match element_method {
                None => element_method = Some(method),
                Some(pending) if pending == method => (),
                Some(pending) => {
                    self.write_element(element_start, offset, pending)?;
                    element_start = offset;
                    element_method = Some(method);
                }
            }

            offset += block_size;
        }

        if let Some(pending) = element_method {
            self.write_element(element_start, frame_size, pending)?;
        }

        debug!(
            "encoded frame \"{}\": {} bytes in {} bytes out",
            String::from_utf8_lossy(name),
            frame_size,
            self.sink.pos() - start_pos,
        );

        mem::swap(&mut self.prev, &mut self.curr);

        Ok(())
    }

    fn write_element(&mut self, start: u32, end: u32, method: EncodingMethod) -> Result<()> {
        let head = ElementHead {
            len: end - start,
            method: method.method,
            sign_extend: method.sign_extend,
            fixed_sub: method.fixed_sub,
            from_prev: method.from_prev,
        };
        head.write(&mut self.sink)?;

        // Zero writes no body.
        if method.method == Method::Zero {
            return Ok(());
        }

        let range = start as usize..end as usize;
        let data = &self.curr[range.clone()];

        if method.fixed_sub.is_some() || method.from_prev {
            self.body.clear();
            self.body.extend_from_slice(data);

            if let Some(offset) = method.fixed_sub {
                for byte in self.body.iter_mut() {
                    *byte = byte.wrapping_sub(offset);
                }
            }

            if method.from_prev {
                for (byte, &prev) in self.body.iter_mut().zip(&self.prev[range]) {
                    *byte = byte.wrapping_sub(prev);
                }
            }

            crate::compress::compress(method.method, &mut self.sink, &self.body)
        }
        else {
            crate::compress::compress(method.method, &mut self.sink, data)
        }
    }
}

#[cfg(test)]
mod tests {
    use drachen_core::errors::Error;

    use super::{BlockSchedule, BlockSpec, EncoderOptions, FrameEncoder};

    #[test]
    fn verify_schedule_validation() {
        assert!(BlockSchedule::new(vec![]).is_err());
        assert!(BlockSchedule::uniform(0).is_err());

        // Segment ends must strictly increase.
        let specs = vec![
            BlockSpec { segment_end: 64, block_size: 8 },
            BlockSpec { segment_end: 64, block_size: 16 },
        ];
        assert!(BlockSchedule::new(specs).is_err());

        let specs = vec![
            BlockSpec { segment_end: 64, block_size: 8 },
            BlockSpec { segment_end: u32::MAX, block_size: 16 },
        ];
        assert!(BlockSchedule::new(specs).is_ok());
    }

    #[test]
    fn verify_schedule_must_cover_frame() {
        let schedule =
            BlockSchedule::new(vec![BlockSpec { segment_end: 16, block_size: 4 }]).unwrap();
        let options = EncoderOptions { permutation: None, schedule };

        assert!(matches!(
            FrameEncoder::try_new(Vec::new(), 32, options),
            Err(Error::Other(_))
        ));
    }

    #[test]
    fn verify_rejects_bad_inputs() {
        let mut encoder =
            FrameEncoder::try_new(Vec::new(), 4, EncoderOptions::default()).unwrap();

        assert!(matches!(
            encoder.encode(b"name", &[0u8; 3]),
            Err(Error::WrongFrameSize { expected: 4, actual: 3 })
        ));

        // The failure latches.
        assert!(matches!(
            encoder.encode(b"name", &[0u8; 4]),
            Err(Error::WrongFrameSize { .. })
        ));

        let mut encoder =
            FrameEncoder::try_new(Vec::new(), 4, EncoderOptions::default()).unwrap();
        assert!(matches!(encoder.encode(b"na\0me", &[0u8; 4]), Err(Error::Other(_))));
    }

    #[test]
    fn verify_rejects_bad_permutation() {
        // Duplicate entries are not a bijection.
        let options = EncoderOptions {
            permutation: Some(vec![0u32, 0, 1, 2].into_boxed_slice()),
            schedule: BlockSchedule::default(),
        };
        assert!(matches!(
            FrameEncoder::try_new(Vec::new(), 4, options),
            Err(Error::BadPermutation)
        ));

        // Wrong table length.
        let options = EncoderOptions {
            permutation: Some(vec![0u32, 1].into_boxed_slice()),
            schedule: BlockSchedule::default(),
        };
        assert!(matches!(
            FrameEncoder::try_new(Vec::new(), 4, options),
            Err(Error::BadPermutation)
        ));
    }

    #[test]
    fn verify_all_zero_frame_wire_cost() {
        // An all-zero first frame costs the name plus a two-byte element.
        let mut encoder =
            FrameEncoder::try_new(Vec::new(), 8, EncoderOptions::default()).unwrap();
        encoder.encode(b"z", &[0u8; 8]).unwrap();
        let bytes = encoder.finish().unwrap();

        let header_len = 18 + 4 * 8;
        assert_eq!(&bytes[header_len..], &[b'z', 0x00, 0x1d, 0x06]);
    }

    #[test]
    fn verify_repeated_frame_single_element() {
        // A frame identical to its predecessor is a single bodiless
        // from-prev Zero element.
        let frame = [1u8, 2, 3, 4, 5, 6, 7, 8];

        let mut encoder =
            FrameEncoder::try_new(Vec::new(), 8, EncoderOptions::default()).unwrap();
        encoder.encode(b"a", &frame).unwrap();
        let after_first = encoder.bytes_written() as usize;
        encoder.encode(b"b", &frame).unwrap();
        let bytes = encoder.finish().unwrap();

        assert_eq!(&bytes[after_first..], &[b'b', 0x00, 0x9d, 0x06]);
    }
}
