// Drachen
// Copyright (c) The Project Drachen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `header` module implements the container stream header.
//!
//! A Drachen stream opens with the magic `Drachen\0`, a 32-bit and a 16-bit
//! byte-order mark, the frame size, and the permutation table. The marks are
//! the constants `0x03020100` and `0x0100` written in the producer's native
//! byte order; the consumer reads their raw bytes as shift schedules and
//! reassembles every subsequent integer as `Σ b[i] << (s[i]·8)`, which makes
//! cross-endian streams decode transparently.

use log::error;

use drachen_core::errors::{Error, Result};
use drachen_core::io::{ReadBytes, WriteBytes};

/// The stream magic. The trailing NUL is part of the magic.
pub const STREAM_MAGIC: [u8; 8] = *b"Drachen\0";

/// The 32-bit byte-order mark, written in native byte order.
const MARK_32: u32 = 0x0302_0100;

/// The 16-bit byte-order mark, written in native byte order.
const MARK_16: u16 = 0x0100;

/// A `ByteOrder` holds the shift schedules recovered from a stream's
/// byte-order marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteOrder {
    shift32: [u8; 4],
    shift16: [u8; 2],
}

impl ByteOrder {
    /// The byte order of the running machine, as a reader of this machine's
    /// own streams would recover it.
    pub fn native() -> ByteOrder {
        ByteOrder { shift32: MARK_32.to_ne_bytes(), shift16: MARK_16.to_ne_bytes() }
    }

    /// Build a `ByteOrder` from the raw mark bytes of a stream header.
    ///
    /// Each mark byte is a shift count; a mark is only meaningful if its
    /// bytes form a permutation of the full shift set, so anything else is
    /// rejected as [`Error::BadByteOrder`].
    pub fn from_marks(mark32: [u8; 4], mark16: [u8; 2]) -> Result<ByteOrder> {
        let mut seen32 = [false; 4];
        for &shift in &mark32 {
            if shift > 3 || seen32[shift as usize] {
                return Err(Error::BadByteOrder);
            }
            seen32[shift as usize] = true;
        }

        let mut seen16 = [false; 2];
        for &shift in &mark16 {
            if shift > 1 || seen16[shift as usize] {
                return Err(Error::BadByteOrder);
            }
            seen16[shift as usize] = true;
        }

        Ok(ByteOrder { shift32: mark32, shift16: mark16 })
    }

    /// Reassemble four raw stream bytes into the 32-bit value the producer
    /// wrote.
    #[inline(always)]
    pub fn decode_u32(&self, bytes: [u8; 4]) -> u32 {
        (u32::from(bytes[0]) << (self.shift32[0] * 8))
            | (u32::from(bytes[1]) << (self.shift32[1] * 8))
            | (u32::from(bytes[2]) << (self.shift32[2] * 8))
            | (u32::from(bytes[3]) << (self.shift32[3] * 8))
    }

    /// Reassemble two raw stream bytes into the 16-bit value the producer
    /// wrote.
    #[inline(always)]
    pub fn decode_u16(&self, bytes: [u8; 2]) -> u16 {
        (u16::from(bytes[0]) << (self.shift16[0] * 8))
            | (u16::from(bytes[1]) << (self.shift16[1] * 8))
    }
}

/// The parsed stream header.
pub struct StreamHeader {
    /// The fixed frame size of the stream.
    pub frame_size: u32,
    /// The shift schedules for all further multi-byte reads.
    pub byte_order: ByteOrder,
    /// The stored permutation table: the decode-side gather table, one entry
    /// per frame byte, each bounds-checked against the frame size.
    pub permutation: Box<[u32]>,
}

/// Write a stream header in native byte order. The permutation table is the
/// decode-side gather table and is stored verbatim.
pub fn write_stream_header<W: WriteBytes>(
    writer: &mut W,
    frame_size: u32,
    permutation: Option<&[u32]>,
) -> Result<()> {
    writer.write_buf(&STREAM_MAGIC)?;
    writer.write_quad_bytes(MARK_32.to_ne_bytes())?;
    writer.write_double_bytes(MARK_16.to_ne_bytes())?;
    writer.write_quad_bytes(frame_size.to_ne_bytes())?;

    match permutation {
        Some(table) => {
            debug_assert_eq!(table.len(), frame_size as usize);
            for &entry in table {
                writer.write_quad_bytes(entry.to_ne_bytes())?;
            }
        }
        // No table means the identity permutation.
        None => {
            for entry in 0..frame_size {
                writer.write_quad_bytes(entry.to_ne_bytes())?;
            }
        }
    }

    Ok(())
}

/// Read and validate a stream header.
///
/// If `expected_frame_size` is provided, a stream declaring any other frame
/// size is rejected with [`Error::WrongFrameSize`].
pub fn read_stream_header<B: ReadBytes>(
    reader: &mut B,
    expected_frame_size: Option<u32>,
) -> Result<StreamHeader> {
    let mut magic = [0u8; 8];
    reader.read_buf_exact(&mut magic)?;

    if magic != STREAM_MAGIC {
        error!("stream does not start with the Drachen magic");
        return Err(Error::BadMagic);
    }

    let mark32 = reader.read_quad_bytes()?;
    let mark16 = reader.read_double_bytes()?;
    let byte_order = ByteOrder::from_marks(mark32, mark16)?;

    let frame_size = byte_order.decode_u32(reader.read_quad_bytes()?);

    if let Some(expected) = expected_frame_size {
        if frame_size != expected {
            return Err(Error::WrongFrameSize { expected, actual: frame_size });
        }
    }

    if frame_size == 0 {
        return Err(Error::Other("stream declares a zero frame size"));
    }

    let mut permutation = vec![0u32; frame_size as usize].into_boxed_slice();

    for entry in permutation.iter_mut() {
        *entry = byte_order.decode_u32(reader.read_quad_bytes()?);
        if *entry >= frame_size {
            error!("permutation entry {} is out of range for frame size {}", entry, frame_size);
            return Err(Error::BadPermutation);
        }
    }

    Ok(StreamHeader { frame_size, byte_order, permutation })
}

#[cfg(test)]
mod tests {
    use drachen_core::errors::Error;
    use drachen_core::io::BufReader;

    use super::{read_stream_header, write_stream_header, ByteOrder};

    #[test]
    fn verify_native_header_roundtrip() {
        let table = [3u32, 0, 2, 1];

        let mut buf = Vec::new();
        write_stream_header(&mut buf, 4, Some(&table)).unwrap();
        assert_eq!(buf.len(), 18 + 4 * 4);

        let mut reader = BufReader::new(&buf);
        let header = read_stream_header(&mut reader, None).unwrap();

        assert_eq!(header.frame_size, 4);
        assert_eq!(&header.permutation[..], &table);
        assert_eq!(header.byte_order, ByteOrder::native());
    }

    #[test]
    fn verify_big_endian_header() {
        // A stream produced by a big-endian machine: marks and integers are
        // all most-significant byte first.
        let mut buf = Vec::new();
        buf.extend_from_slice(b"Drachen\0");
        buf.extend_from_slice(&[0x03, 0x02, 0x01, 0x00]);
        buf.extend_from_slice(&[0x01, 0x00]);
        buf.extend_from_slice(&[0x00, 0x00, 0x00, 0x02]);
        buf.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
        buf.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

        let mut reader = BufReader::new(&buf);
        let header = read_stream_header(&mut reader, Some(2)).unwrap();

        assert_eq!(header.frame_size, 2);
        assert_eq!(&header.permutation[..], &[1, 0]);
        assert_eq!(header.byte_order.decode_u16([0xab, 0xcd]), 0xabcd);
        assert_eq!(header.byte_order.decode_u32([0xde, 0xad, 0xbe, 0xef]), 0xdead_beef);
    }

    #[test]
    fn verify_bad_magic() {
        let mut buf = Vec::new();
        write_stream_header(&mut buf, 1, None).unwrap();

        // Wrong name.
        let mut tampered = buf.clone();
        tampered[0] = b'd';
        assert!(matches!(
            read_stream_header(&mut BufReader::new(&tampered), None),
            Err(Error::BadMagic)
        ));

        // Missing NUL.
        let mut tampered = buf;
        tampered[7] = b'!';
        assert!(matches!(
            read_stream_header(&mut BufReader::new(&tampered), None),
            Err(Error::BadMagic)
        ));
    }

    #[test]
    fn verify_bad_byte_order_mark() {
        let mut buf = Vec::new();
        write_stream_header(&mut buf, 1, None).unwrap();

        // Duplicate shift counts are not a permutation.
        buf[8..12].copy_from_slice(&[0, 0, 2, 3]);
        assert!(matches!(
            read_stream_header(&mut BufReader::new(&buf), None),
            Err(Error::BadByteOrder)
        ));

        // Out-of-range shift count.
        buf[8..12].copy_from_slice(&[0, 1, 2, 4]);
        assert!(matches!(
            read_stream_header(&mut BufReader::new(&buf), None),
            Err(Error::BadByteOrder)
        ));
    }

    #[test]
    fn verify_wrong_frame_size() {
        let mut buf = Vec::new();
        write_stream_header(&mut buf, 8, None).unwrap();

        match read_stream_header(&mut BufReader::new(&buf), Some(16)) {
            Err(Error::WrongFrameSize { expected, actual }) => {
                assert_eq!(expected, 16);
                assert_eq!(actual, 8);
            }
            _ => panic!("expected a frame size mismatch"),
        }
    }

    #[test]
    fn verify_permutation_bounds_check() {
        let mut buf = Vec::new();
        write_stream_header(&mut buf, 2, Some(&[0, 1])).unwrap();

        // Entry equal to the frame size is out of range.
        let entry = buf.len() - 4;
        buf[entry..].copy_from_slice(&2u32.to_ne_bytes());
        assert!(matches!(
            read_stream_header(&mut BufReader::new(&buf), None),
            Err(Error::BadPermutation)
        ));
    }
}
