// Drachen
// Copyright (c) The Project Drachen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `io` module implements composable byte-level input and output.
//!
//! The following nomenclature is used to denote where bytes are sourced from
//! or sent to:
//!  * A `Stream` wraps a [`std::io::Read`] or [`std::io::Write`] and buffers
//!    its operations.
//!  * A `Reader` consumes a `&[u8]`.
//!
//! All readers implement [`ReadBytes`] and all writers implement
//! [`WriteBytes`]. Drachen streams are strictly sequential: there is no
//! seeking in either direction.

use crate::errors::Result;

mod buf_reader;
mod sink_stream;
mod source_stream;

pub use buf_reader::BufReader;
pub use sink_stream::SinkStream;
pub use source_stream::SourceStream;

/// `ReadBytes` provides methods to read bytes from a stream in groups of the
/// widths the Drachen container uses.
///
/// Multi-byte groups are returned in read order; interpreting them as
/// integers is the caller's business because the container carries its own
/// byte-order schedule.
pub trait ReadBytes {
    /// Reads a single byte from the stream and returns it or an error.
    fn read_byte(&mut self) -> Result<u8>;

    /// Reads two bytes from the stream and returns them in read-order or an
    /// error.
    fn read_double_bytes(&mut self) -> Result<[u8; 2]>;

    /// Reads four bytes from the stream and returns them in read-order or an
    /// error.
    fn read_quad_bytes(&mut self) -> Result<[u8; 4]>;

    /// Reads exactly the number of bytes required to fill the provided
    /// buffer or returns an error.
    fn read_buf_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Gets the position of the stream.
    fn pos(&self) -> u64;
}

impl<'b, R: ReadBytes> ReadBytes for &'b mut R {
    #[inline(always)]
    fn read_byte(&mut self) -> Result<u8> {
        (*self).read_byte()
    }

    #[inline(always)]
    fn read_double_bytes(&mut self) -> Result<[u8; 2]> {
        (*self).read_double_bytes()
    }

    #[inline(always)]
    fn read_quad_bytes(&mut self) -> Result<[u8; 4]> {
        (*self).read_quad_bytes()
    }

    #[inline(always)]
    fn read_buf_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        (*self).read_buf_exact(buf)
    }

    #[inline(always)]
    fn pos(&self) -> u64 {
        (**self).pos()
    }
}

/// `WriteBytes` is the writing counterpart of [`ReadBytes`].
///
/// Multi-byte groups are written in the order given; producing them in the
/// desired byte order is the caller's business.
pub trait WriteBytes {
    /// Writes a single byte to the stream or returns an error.
    fn write_byte(&mut self, byte: u8) -> Result<()>;

    /// Writes two bytes to the stream in the order given or returns an error.
    fn write_double_bytes(&mut self, bytes: [u8; 2]) -> Result<()>;

    /// Writes four bytes to the stream in the order given or returns an error.
    fn write_quad_bytes(&mut self, bytes: [u8; 4]) -> Result<()>;

    /// Writes the whole buffer to the stream or returns an error.
    fn write_buf(&mut self, buf: &[u8]) -> Result<()>;

    /// Gets the position of the stream.
    fn pos(&self) -> u64;
}

impl<'b, W: WriteBytes> WriteBytes for &'b mut W {
    #[inline(always)]
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        (*self).write_byte(byte)
    }

    #[inline(always)]
    fn write_double_bytes(&mut self, bytes: [u8; 2]) -> Result<()> {
        (*self).write_double_bytes(bytes)
    }

    #[inline(always)]
    fn write_quad_bytes(&mut self, bytes: [u8; 4]) -> Result<()> {
        (*self).write_quad_bytes(bytes)
    }

    #[inline(always)]
    fn write_buf(&mut self, buf: &[u8]) -> Result<()> {
        (*self).write_buf(buf)
    }

    #[inline(always)]
    fn pos(&self) -> u64 {
        (**self).pos()
    }
}

// A `Vec<u8>` is an infallible sink. Useful for staging element bodies and in
// tests.
impl WriteBytes for Vec<u8> {
    #[inline(always)]
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.push(byte);
        Ok(())
    }

    #[inline(always)]
    fn write_double_bytes(&mut self, bytes: [u8; 2]) -> Result<()> {
        self.extend_from_slice(&bytes);
        Ok(())
    }

    #[inline(always)]
    fn write_quad_bytes(&mut self, bytes: [u8; 4]) -> Result<()> {
        self.extend_from_slice(&bytes);
        Ok(())
    }

    #[inline(always)]
    fn write_buf(&mut self, buf: &[u8]) -> Result<()> {
        self.extend_from_slice(buf);
        Ok(())
    }

    #[inline(always)]
    fn pos(&self) -> u64 {
        self.len() as u64
    }
}
