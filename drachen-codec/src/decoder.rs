// Drachen
// Copyright (c) The Project Drachen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `decoder` module implements the Drachen frame decoder.

use std::borrow::Cow;
use std::io;

use log::debug;

use drachen_core::errors::{end_of_stream, overrun_error, Error, Result};
use drachen_core::io::{ReadBytes, SourceStream};

use crate::decompress::decompress;
use crate::element::ElementHead;
use crate::header::{read_stream_header, ByteOrder};

/// `DecoderOptions` is the set of options a decoder is instantiated with.
#[derive(Default, Clone, Copy)]
pub struct DecoderOptions {
    /// The frame size the caller expects; a stream declaring any other size
    /// is rejected. `None` accepts whatever the stream declares.
    pub frame_size: Option<u32>,
}

/// A `Frame` is one decoded record of a Drachen stream: its name and its
/// reconstructed bytes.
pub struct Frame {
    name: Box<[u8]>,
    data: Box<[u8]>,
}

impl Frame {
    /// The frame's name: arbitrary bytes, excluding NUL.
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// The frame's name for display.
    pub fn name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    /// The frame's bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

enum State {
    /// Positioned at the start of a frame name.
    Ready,
    /// Clean end-of-stream was observed; no further I/O occurs.
    Ended,
    /// A failure latched; it is returned from every further call and no
    /// further I/O occurs.
    Failed(Error),
}

/// A `FrameDecoder` reads a Drachen stream: the container header at
/// construction, then one frame per [`FrameDecoder::next_frame`] call until
/// [`Error::EndOfStream`].
///
/// A frame can only be reconstructed by replaying every frame before it, so
/// frames are delivered strictly in stream order.
pub struct FrameDecoder<R: io::Read> {
    source: SourceStream<R>,
    frame_size: u32,
    byte_order: ByteOrder,
    /// The stored permutation: a gather table applied to the reconstructed
    /// frame on output.
    permutation: Box<[u32]>,
    prev: Box<[u8]>,
    curr: Box<[u8]>,
    state: State,
}

impl<R: io::Read> FrameDecoder<R> {
    /// Instantiate a `FrameDecoder` over the given reader and read the
    /// stream header.
    pub fn try_new(inner: R, options: DecoderOptions) -> Result<FrameDecoder<R>> {
        let mut source = SourceStream::new(inner);

        let header = read_stream_header(&mut source, options.frame_size)?;

        let frame_size = header.frame_size as usize;

        Ok(FrameDecoder {
            source,
            frame_size: header.frame_size,
            byte_order: header.byte_order,
            permutation: header.permutation,
            prev: vec![0u8; frame_size].into_boxed_slice(),
            curr: vec![0u8; frame_size].into_boxed_slice(),
            state: State::Ready,
        })
    }

    /// The fixed frame size declared by the stream.
    pub fn frame_size(&self) -> u32 {
        self.frame_size
    }

    /// Unwraps this `FrameDecoder`, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.source.into_inner()
    }

    /// Decode the next frame.
    ///
    /// Returns [`Error::EndOfStream`] when the stream ends cleanly before a
    /// frame name. Any other failure latches: every subsequent call returns
    /// the same error without reading further.
    pub fn next_frame(&mut self) -> Result<Frame> {
        match &self.state {
            State::Ready => (),
            State::Ended => return end_of_stream(),
            State::Failed(err) => return Err(err.clone()),
        }

        match self.next_frame_inner() {
            Ok(frame) => Ok(frame),
            Err(Error::EndOfStream) => {
                self.state = State::Ended;
                end_of_stream()
            }
            Err(err) => {
                self.state = State::Failed(err.clone());
                Err(err)
            }
        }
    }

    fn next_frame_inner(&mut self) -> Result<Frame> {
        // The name is NUL-terminated and unbounded. End-of-stream is only
        // legitimate before its first byte.
        let mut name = Vec::new();

        loop {
            match self.source.read_byte() {
                Ok(0) => break,
                Ok(byte) => name.push(byte),
                Err(Error::PrematureEof) if name.is_empty() => return end_of_stream(),
                Err(err) => return Err(err),
            }
        }

        let frame_size = self.frame_size as usize;
        let mut offset = 0;
        let mut elements = 0u32;

        while offset < frame_size {
            let head = ElementHead::read(&mut self.source, &self.byte_order)?;
            let len = head.len as usize;

            if len > frame_size - offset {
                return overrun_error();
            }
            if len == 0 {
                return Err(Error::Other("stream contains a zero-length element"));
            }

            let out = &mut self.curr[offset..offset + len];
            decompress(head.method, &mut self.source, out, head.sign_extend)?;

            if let Some(fixed) = head.fixed_sub {
                for byte in out.iter_mut() {
                    *byte = byte.wrapping_add(fixed);
                }
            }

            if head.from_prev {
                for (byte, &prev) in out.iter_mut().zip(&self.prev[offset..offset + len]) {
                    *byte = byte.wrapping_add(prev);
                }
            }

            offset += len;
            elements += 1;
        }

        debug!(
            "decoded frame \"{}\": {} elements",
            String::from_utf8_lossy(&name),
            elements,
        );

        // Reverse the permutation into the output, then update the previous
        // frame.
        let mut data = vec![0u8; frame_size].into_boxed_slice();
        for (byte, &src) in data.iter_mut().zip(self.permutation.iter()) {
            *byte = self.curr[src as usize];
        }

        self.prev.copy_from_slice(&self.curr);

        Ok(Frame { name: name.into_boxed_slice(), data })
    }
}
