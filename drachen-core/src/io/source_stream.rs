// Drachen
// Copyright (c) The Project Drachen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp;
use std::io;

use crate::errors::{premature_eof_error, Result};

use super::ReadBytes;

/// The default read buffer length.
const BUF_LEN: usize = 8 * 1024;

/// A `SourceStream` is a buffered reader over any [`std::io::Read`].
///
/// Drachen streams are consumed strictly front-to-back, so `SourceStream`
/// keeps a single straight buffer and refills it as it drains. Reaching the
/// end of the underlying reader mid-operation surfaces as
/// [`Error::PrematureEof`](crate::errors::Error::PrematureEof); it is the
/// caller's responsibility to decide whether that is legitimate at the
/// current position.
pub struct SourceStream<R: io::Read> {
    /// The source reader.
    inner: R,
    /// The read buffer.
    buf: Box<[u8]>,
    /// The next unread position within `buf`.
    read_pos: usize,
    /// The end of valid data within `buf`.
    end_pos: usize,
    /// Absolute position of the stream, accounting for unread buffered data.
    abs_pos: u64,
}

impl<R: io::Read> SourceStream<R> {
    /// Instantiate a new `SourceStream` over the given reader.
    pub fn new(inner: R) -> Self {
        SourceStream {
            inner,
            buf: vec![0u8; BUF_LEN].into_boxed_slice(),
            read_pos: 0,
            end_pos: 0,
            abs_pos: 0,
        }
    }

    /// Unwraps this `SourceStream`, returning the underlying reader.
    ///
    /// Any buffered but unread bytes are discarded.
    pub fn into_inner(self) -> R {
        self.inner
    }

    #[inline(always)]
    fn buffered(&self) -> usize {
        self.end_pos - self.read_pos
    }

    /// Refill the buffer from the underlying reader. Returns the number of
    /// bytes now buffered, with 0 indicating end-of-stream.
    fn fetch(&mut self) -> Result<usize> {
        if self.read_pos == self.end_pos {
            self.read_pos = 0;
            self.end_pos = loop {
                match self.inner.read(&mut self.buf) {
                    Ok(len) => break len,
                    Err(ref err) if err.kind() == io::ErrorKind::Interrupted => (),
                    Err(err) => return Err(err.into()),
                }
            };
        }
        Ok(self.buffered())
    }
}

impl<R: io::Read> ReadBytes for SourceStream<R> {
    #[inline(always)]
    fn read_byte(&mut self) -> Result<u8> {
        if self.buffered() < 1 && self.fetch()? == 0 {
            return premature_eof_error();
        }

        let byte = self.buf[self.read_pos];
        self.read_pos += 1;
        self.abs_pos += 1;
        Ok(byte)
    }

    #[inline(always)]
    fn read_double_bytes(&mut self) -> Result<[u8; 2]> {
        let mut bytes = [0u8; 2];
        self.read_buf_exact(&mut bytes)?;
        Ok(bytes)
    }

    #[inline(always)]
    fn read_quad_bytes(&mut self) -> Result<[u8; 4]> {
        let mut bytes = [0u8; 4];
        self.read_buf_exact(&mut bytes)?;
        Ok(bytes)
    }

    fn read_buf_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;

        while filled < buf.len() {
            if self.buffered() == 0 && self.fetch()? == 0 {
                return premature_eof_error();
            }

            let len = cmp::min(self.buffered(), buf.len() - filled);
            buf[filled..filled + len]
                .copy_from_slice(&self.buf[self.read_pos..self.read_pos + len]);
            self.read_pos += len;
            self.abs_pos += len as u64;
            filled += len;
        }

        Ok(())
    }

    #[inline(always)]
    fn pos(&self) -> u64 {
        self.abs_pos
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::{ReadBytes, SourceStream};
    use crate::errors::Error;

    /// Generate a random vector of bytes of the specified length using a PRNG.
    fn generate_random_bytes(len: usize) -> Box<[u8]> {
        let mut lcg: u32 = 0xec57c4bf;

        let mut bytes = vec![0; len];

        for quad in bytes.chunks_mut(4) {
            lcg = lcg.wrapping_mul(1664525).wrapping_add(1013904223);
            for (dest, src) in quad.iter_mut().zip(&lcg.to_ne_bytes()) {
                *dest = *src;
            }
        }

        bytes.into_boxed_slice()
    }

    #[test]
    fn verify_source_stream_read() {
        let data = generate_random_bytes(40 * 1024);

        let mut stream = SourceStream::new(Cursor::new(data.clone()));

        // Mixed-width reads crossing several buffer refills.
        let mut expected = &data[..];

        for byte in &expected[..9 * 1024] {
            assert_eq!(*byte, stream.read_byte().unwrap());
        }
        expected = &expected[9 * 1024..];

        for bytes in expected[..8 * 1024].chunks_exact(2) {
            assert_eq!(bytes, &stream.read_double_bytes().unwrap());
        }
        expected = &expected[8 * 1024..];

        for bytes in expected[..8 * 1024].chunks_exact(4) {
            assert_eq!(bytes, &stream.read_quad_bytes().unwrap());
        }
        expected = &expected[8 * 1024..];

        let mut tail = vec![0u8; expected.len()];
        stream.read_buf_exact(&mut tail).unwrap();
        assert_eq!(&tail[..], expected);

        assert_eq!(stream.pos(), data.len() as u64);
    }

    #[test]
    fn verify_source_stream_premature_eof() {
        let mut stream = SourceStream::new(Cursor::new(vec![1u8, 2, 3]));

        let mut buf = [0u8; 4];
        assert!(matches!(stream.read_buf_exact(&mut buf), Err(Error::PrematureEof)));
    }
}
