// Drachen
// Copyright (c) The Project Drachen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error;
use std::fmt;
use std::io;
use std::result;

/// `Error` provides an enumeration of all possible errors reported by Drachen.
#[derive(Debug)]
pub enum Error {
    /// An IO error occurred while reading or writing the underlying stream.
    IoError(io::Error),
    /// The stream does not begin with the Drachen magic.
    BadMagic,
    /// A byte-order mark in the stream header is not a valid shift schedule.
    BadByteOrder,
    /// The stream's frame size did not match the caller's expectation, or a
    /// caller-supplied buffer is not exactly one frame long.
    WrongFrameSize {
        /// The frame size the caller expected.
        expected: u32,
        /// The frame size actually observed.
        actual: u32,
    },
    /// The stream's permutation table is out of bounds or not a bijection.
    BadPermutation,
    /// An element or run-length run would write past its stated bounds.
    Overrun,
    /// The stream ended where more data was required.
    PrematureEof,
    /// The stream ended cleanly at a frame boundary. This is a signal, not a
    /// failure: it is only reported when end-of-stream is observed at the
    /// first byte of an expected frame name.
    EndOfStream,
    /// The operation could not be performed as requested.
    Other(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::IoError(ref err) => {
                write!(f, "io error: {}", err)
            }
            Error::BadMagic => {
                write!(f, "invalid magic at start of stream")
            }
            Error::BadByteOrder => {
                write!(f, "invalid byte-order mark in stream header")
            }
            Error::WrongFrameSize { expected, actual } => {
                write!(f, "stream frame size is {} but {} was expected", actual, expected)
            }
            Error::BadPermutation => {
                write!(f, "stream permutation table is invalid")
            }
            Error::Overrun => {
                write!(f, "input stream overran stated bounds")
            }
            Error::PrematureEof => {
                write!(f, "unexpected end of stream")
            }
            Error::EndOfStream => {
                write!(f, "end of stream")
            }
            Error::Other(msg) => {
                write!(f, "{}", msg)
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::IoError(ref err) => Some(err),
            _ => None,
        }
    }
}

// Encoders and decoders latch their first failure and report it from every
// subsequent call, so errors must be cloneable. An `io::Error` is not `Clone`;
// it is cloned as its kind and message.
impl Clone for Error {
    fn clone(&self) -> Error {
        match *self {
            Error::IoError(ref err) => {
                Error::IoError(io::Error::new(err.kind(), err.to_string()))
            }
            Error::BadMagic => Error::BadMagic,
            Error::BadByteOrder => Error::BadByteOrder,
            Error::WrongFrameSize { expected, actual } => {
                Error::WrongFrameSize { expected, actual }
            }
            Error::BadPermutation => Error::BadPermutation,
            Error::Overrun => Error::Overrun,
            Error::PrematureEof => Error::PrematureEof,
            Error::EndOfStream => Error::EndOfStream,
            Error::Other(msg) => Error::Other(msg),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Error::PrematureEof,
            _ => Error::IoError(err),
        }
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create an overrun error.
pub fn overrun_error<T>() -> Result<T> {
    Err(Error::Overrun)
}

/// Convenience function to create a premature end-of-stream error.
pub fn premature_eof_error<T>() -> Result<T> {
    Err(Error::PrematureEof)
}

/// Convenience function to create the end-of-stream signal.
pub fn end_of_stream<T>() -> Result<T> {
    Err(Error::EndOfStream)
}

/// Convenience function to create a bad-permutation error.
pub fn bad_permutation_error<T>() -> Result<T> {
    Err(Error::BadPermutation)
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::Error;

    #[test]
    fn verify_io_error_eof_mapping() {
        let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(Error::from(eof), Error::PrematureEof));

        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(Error::from(denied), Error::IoError(_)));
    }

    #[test]
    fn verify_clone_preserves_io_kind() {
        let err = Error::IoError(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
        match err.clone() {
            Error::IoError(inner) => assert_eq!(inner.kind(), io::ErrorKind::BrokenPipe),
            _ => panic!("clone changed variant"),
        }
    }
}
