// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error;
use std::fmt;
use std::io;
use std::result;

/// `Error` provides an enumeration of all possible errors reported by Cadenza.
#[derive(Debug)]
pub enum Error {
    /// An IO error occured while reading or seeking the stream.
    IoError(std::io::Error),
    /// The stream contained malformed data and could not be demuxed.
    DecodeError(&'static str),
    /// A codec id or parameter combination has no decoder configuration mapping, or the
    /// platform capability check rejected the derived configuration. Non-retryable.
    UnsupportedCodec {
        /// The codec id, optionally annotated with the offending parameter.
        codec: String,
        /// The decoding surface that rejected the codec.
        context: &'static str,
    },
    /// Malformed or truncated codec-private or keyframe bytes for a specific codec.
    ParseCodecRecord {
        /// The codec whose configuration record failed to parse.
        codec: &'static str,
        /// What was malformed.
        detail: &'static str,
    },
    /// One or more per-track codec failures collected during a single
    /// metadata-completion pass. Tracks that configured successfully remain usable.
    AggregateParse(Vec<Error>),
    /// Invariant violation indicating a caller-ordering bug, not a data problem. Fatal.
    UnreachableOrLogic(&'static str),
    /// A recognized but intentionally unhandled feature path.
    Unimplemented(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::IoError(ref err) => err.fmt(f),
            Error::DecodeError(msg) => {
                write!(f, "malformed stream: {}", msg)
            }
            Error::UnsupportedCodec { ref codec, context } => {
                write!(f, "unsupported codec {} for {}", codec, context)
            }
            Error::ParseCodecRecord { codec, detail } => {
                write!(f, "malformed {} configuration record: {}", codec, detail)
            }
            Error::AggregateParse(ref errors) => {
                write!(f, "{} track configuration failure(s)", errors.len())
            }
            Error::UnreachableOrLogic(msg) => {
                write!(f, "unreachable or logic error: {}", msg)
            }
            Error::Unimplemented(feature) => {
                write!(f, "unimplemented: {}", feature)
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

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create a decode error.
pub fn decode_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::DecodeError(desc))
}

/// Convenience function to create an unsupported codec error.
pub fn unsupported_codec_error<T>(codec: impl Into<String>, context: &'static str) -> Result<T> {
    Err(Error::UnsupportedCodec { codec: codec.into(), context })
}

/// Convenience function to create a codec record parse error.
pub fn parse_codec_error<T>(codec: &'static str, detail: &'static str) -> Result<T> {
    Err(Error::ParseCodecRecord { codec, detail })
}

/// Convenience function to create an unreachable-or-logic error.
pub fn unreachable_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::UnreachableOrLogic(desc))
}

/// Convenience function to create an unimplemented feature error.
pub fn unimplemented_error<T>(feature: &'static str) -> Result<T> {
    Err(Error::Unimplemented(feature))
}

/// Convenience function to create an end-of-stream error.
pub fn end_of_stream_error<T>() -> Result<T> {
    Err(Error::IoError(io::Error::new(io::ErrorKind::UnexpectedEof, "end of stream")))
}
