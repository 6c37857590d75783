// Drachen
// Copyright (c) The Project Drachen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io;

use crate::errors::Result;

use super::WriteBytes;

/// The default write buffer length.
const BUF_LEN: usize = 8 * 1024;

/// A `SinkStream` is a buffered writer over any [`std::io::Write`].
///
/// Bytes are staged in an internal buffer and handed to the inner writer in
/// large runs. Call [`SinkStream::finish`] when done: it drains the buffer,
/// flushes the inner writer, and returns it, so that deferred I/O failures
/// surface at disposal rather than being lost.
pub struct SinkStream<W: io::Write> {
    /// The sink writer.
    inner: W,
    /// The staging buffer.
    buf: Vec<u8>,
    /// Absolute position of the stream, accounting for staged data.
    abs_pos: u64,
}

impl<W: io::Write> SinkStream<W> {
    /// Instantiate a new `SinkStream` over the given writer.
    pub fn new(inner: W) -> Self {
        SinkStream {
            inner,
            buf: Vec::with_capacity(BUF_LEN),
            abs_pos: 0,
        }
    }

    /// Drains staged bytes, flushes the inner writer, and returns it.
    pub fn finish(mut self) -> Result<W> {
        self.drain()?;
        self.inner.flush()?;
        Ok(self.inner)
    }

    fn drain(&mut self) -> Result<()> {
        if !self.buf.is_empty() {
            self.inner.write_all(&self.buf)?;
            self.buf.clear();
        }
        Ok(())
    }
}

impl<W: io::Write> WriteBytes for SinkStream<W> {
    #[inline(always)]
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        if self.buf.len() == BUF_LEN {
            self.drain()?;
        }
        self.buf.push(byte);
        self.abs_pos += 1;
        Ok(())
    }

    #[inline(always)]
    fn write_double_bytes(&mut self, bytes: [u8; 2]) -> Result<()> {
        self.write_buf(&bytes)
    }

    #[inline(always)]
    fn write_quad_bytes(&mut self, bytes: [u8; 4]) -> Result<()> {
        self.write_buf(&bytes)
    }

    fn write_buf(&mut self, buf: &[u8]) -> Result<()> {
        if self.buf.len() + buf.len() > BUF_LEN {
            self.drain()?;
        }

        // A run larger than the buffer goes straight through.
        if buf.len() > BUF_LEN {
            self.inner.write_all(buf)?;
        }
        else {
            self.buf.extend_from_slice(buf);
        }

        self.abs_pos += buf.len() as u64;
        Ok(())
    }

    #[inline(always)]
    fn pos(&self) -> u64 {
        self.abs_pos
    }
}

#[cfg(test)]
mod tests {
    use super::{SinkStream, WriteBytes, BUF_LEN};

    #[test]
    fn verify_sink_stream_write() {
        let mut stream = SinkStream::new(Vec::new());

        let mut expected = Vec::new();

        for i in 0..(BUF_LEN + 17) {
            stream.write_byte(i as u8).unwrap();
            expected.push(i as u8);
        }

        stream.write_double_bytes([0xaa, 0xbb]).unwrap();
        expected.extend_from_slice(&[0xaa, 0xbb]);

        let run = vec![0x5a; 3 * BUF_LEN];
        stream.write_buf(&run).unwrap();
        expected.extend_from_slice(&run);

        assert_eq!(stream.pos(), expected.len() as u64);

        let inner = stream.finish().unwrap();
        assert_eq!(inner, expected);
    }
}
