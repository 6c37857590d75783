// Drachen
// Copyright (c) The Project Drachen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `element` module implements the on-wire element record grammar.
//!
//! Every element starts with one header byte:
//!
//! ```text
//! bits 1:0  length class    00 L=1, 01 L=u8+2, 10 L=u16+259, 11 L=u32
//! bits 4:2  method          see `Method`
//! bit  5    sign-extend     4- and 6-bit data are sign-extended on decode
//! bit  6    fixed-sub       an offset byte follows the length operand
//! bit  7    from-prev       previous-frame bytes are added on decode
//! ```
//!
//! The length operand (0, 1, 2, or 4 bytes) follows the header, then the
//! fixed-sub byte if present, then the compressed body. Multi-byte length
//! operands travel in the container's declared byte order.

use drachen_core::errors::Result;
use drachen_core::io::{ReadBytes, WriteBytes};

use crate::header::ByteOrder;

const LEN_MASK: u8 = 0x03;
const LEN_ONE: u8 = 0x00;
const LEN_U8: u8 = 0x01;
const LEN_U16: u8 = 0x02;
const LEN_U32: u8 = 0x03;

const METHOD_MASK: u8 = 0x1c;
const METHOD_SHIFT: u8 = 2;

const FLAG_SIGN_EXTEND: u8 = 0x20;
const FLAG_FIXED_SUB: u8 = 0x40;
const FLAG_FROM_PREV: u8 = 0x80;

/// Bias of the one-byte length operand.
const LEN_U8_BIAS: u32 = 2;
/// Bias of the two-byte length operand.
const LEN_U16_BIAS: u32 = 259;
/// Largest length expressible with the one-byte operand.
const LEN_U8_MAX: u32 = 0xff + LEN_U8_BIAS;
/// Largest length expressible with the two-byte operand.
const LEN_U16_MAX: u32 = 0xffff + LEN_U16_BIAS;

/// The per-element compression method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Raw copy of the body.
    None,
    /// 8-bit run length followed by an 8-bit datum; a run length of 0 means
    /// 256.
    Rle88,
    /// Two 4-bit run lengths packed in one byte, each followed by an 8-bit
    /// datum; a run length of 0 means 16.
    Rle48,
    /// Four 2-bit run lengths packed in one byte, each followed by an 8-bit
    /// datum; a run length of 0 means 4.
    Rle28,
    /// 4-bit run length and 4-bit datum packed in one byte; a run length of
    /// 0 means 16.
    Rle44,
    /// 2-bit run length and 6-bit datum packed in one byte; a run length of
    /// 0 means 4.
    Rle26,
    /// Two 4-bit data per byte, low nibble first.
    Half,
    /// No body; the block decodes as zeroes.
    Zero,
}

impl Method {
    /// Decode a 3-bit method code.
    pub fn from_code(code: u8) -> Method {
        match code & 0x7 {
            0 => Method::None,
            1 => Method::Rle88,
            2 => Method::Rle48,
            3 => Method::Rle28,
            4 => Method::Rle44,
            5 => Method::Rle26,
            6 => Method::Half,
            _ => Method::Zero,
        }
    }

    /// The 3-bit method code.
    pub fn code(&self) -> u8 {
        match *self {
            Method::None => 0,
            Method::Rle88 => 1,
            Method::Rle48 => 2,
            Method::Rle28 => 3,
            Method::Rle44 => 4,
            Method::Rle26 => 5,
            Method::Half => 6,
            Method::Zero => 7,
        }
    }
}

/// An `ElementHead` describes one element record: everything on the wire
/// before the compressed body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHead {
    /// The number of frame bytes this element decodes to.
    pub len: u32,
    /// The compression method of the body.
    pub method: Method,
    /// Sign-extend 4- and 6-bit data on decode.
    pub sign_extend: bool,
    /// Offset added to every decoded byte, if present.
    pub fixed_sub: Option<u8>,
    /// Add the aligned previous-frame bytes on decode.
    pub from_prev: bool,
}

impl ElementHead {
    /// Read an element header, including its length operand and fixed-sub
    /// byte, from the stream.
    pub fn read<B: ReadBytes>(reader: &mut B, order: &ByteOrder) -> Result<ElementHead> {
        let head = reader.read_byte()?;

        let len = match head & LEN_MASK {
            LEN_ONE => 1,
            LEN_U8 => u32::from(reader.read_byte()?) + LEN_U8_BIAS,
            LEN_U16 => u32::from(order.decode_u16(reader.read_double_bytes()?)) + LEN_U16_BIAS,
            _ => order.decode_u32(reader.read_quad_bytes()?),
        };

        let method = Method::from_code((head & METHOD_MASK) >> METHOD_SHIFT);
        let sign_extend = head & FLAG_SIGN_EXTEND != 0;
        let from_prev = head & FLAG_FROM_PREV != 0;

        let fixed_sub =
            if head & FLAG_FIXED_SUB != 0 { Some(reader.read_byte()?) } else { None };

        Ok(ElementHead { len, method, sign_extend, fixed_sub, from_prev })
    }

    /// Write the element header, length operand, and fixed-sub byte to the
    /// stream in native byte order.
    pub fn write<W: WriteBytes>(&self, writer: &mut W) -> Result<()> {
        debug_assert!(self.len >= 1);

        let mut head = self.method.code() << METHOD_SHIFT;

        head |= match self.len {
            1 => LEN_ONE,
            l if l <= LEN_U8_MAX => LEN_U8,
            l if l <= LEN_U16_MAX => LEN_U16,
            _ => LEN_U32,
        };

        if self.sign_extend {
            head |= FLAG_SIGN_EXTEND;
        }
        if self.fixed_sub.is_some() {
            head |= FLAG_FIXED_SUB;
        }
        if self.from_prev {
            head |= FLAG_FROM_PREV;
        }

        writer.write_byte(head)?;

        match self.len {
            1 => (),
            l if l <= LEN_U8_MAX => writer.write_byte((l - LEN_U8_BIAS) as u8)?,
            l if l <= LEN_U16_MAX => {
                writer.write_double_bytes(((l - LEN_U16_BIAS) as u16).to_ne_bytes())?
            }
            l => writer.write_quad_bytes(l.to_ne_bytes())?,
        }

        if let Some(offset) = self.fixed_sub {
            writer.write_byte(offset)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use drachen_core::io::BufReader;

    use super::{ElementHead, Method};
    use crate::header::ByteOrder;

    fn roundtrip(head: ElementHead) -> (Vec<u8>, ElementHead) {
        let mut buf = Vec::new();
        head.write(&mut buf).unwrap();

        let mut reader = BufReader::new(&buf);
        let read = ElementHead::read(&mut reader, &ByteOrder::native()).unwrap();
        assert_eq!(reader.bytes_available(), 0);

        (buf, read)
    }

    fn head(len: u32) -> ElementHead {
        ElementHead {
            len,
            method: Method::Rle26,
            sign_extend: false,
            fixed_sub: None,
            from_prev: false,
        }
    }

    #[test]
    fn verify_length_class_boundaries() {
        // One byte of header only.
        let (buf, read) = roundtrip(head(1));
        assert_eq!(buf.len(), 1);
        assert_eq!(read.len, 1);

        // One-byte operand spans 2..=257.
        for len in [2, 257] {
            let (buf, read) = roundtrip(head(len));
            assert_eq!(buf.len(), 2);
            assert_eq!(read.len, len);
        }

        // Two-byte operand spans 258..=65794.
        for len in [258, 259, 65794] {
            let (buf, read) = roundtrip(head(len));
            assert_eq!(buf.len(), 3);
            assert_eq!(read.len, len);
        }

        // Everything above uses the full word.
        let (buf, read) = roundtrip(head(65795));
        assert_eq!(buf.len(), 5);
        assert_eq!(read.len, 65795);
    }

    #[test]
    fn verify_flags_and_fixed_sub() {
        let (buf, read) = roundtrip(ElementHead {
            len: 16,
            method: Method::Half,
            sign_extend: true,
            fixed_sub: Some(0x9c),
            from_prev: true,
        });

        // Header, length operand, fixed-sub byte.
        assert_eq!(buf.len(), 3);
        assert_eq!(buf[0], 0x01 | (6 << 2) | 0x20 | 0x40 | 0x80);
        assert_eq!(buf[2], 0x9c);
        assert_eq!(read.fixed_sub, Some(0x9c));
        assert!(read.sign_extend);
        assert!(read.from_prev);
    }

    #[test]
    fn verify_method_codes() {
        for code in 0..8 {
            assert_eq!(Method::from_code(code).code(), code);
        }
    }
}
