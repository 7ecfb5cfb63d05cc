// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire codecs for the two legs of a session: the fixed-header packet spoken
//! by the game backend over TCP, and the opcode envelope spoken by clients
//! over WebSocket.

pub mod envelope;
pub mod packet;

use std::fmt;

/// Protocol-level failure on either leg.
///
/// Every variant is fatal for the frame it was raised on. Header and body
/// errors on the TCP leg also end the backend read loop.
#[derive(Debug)]
pub enum CodecError {
    /// Short read or socket failure while reading a packet.
    Io(std::io::Error),
    ChecksumMismatch {
        expected: u32,
        actual: u32,
    },
    PayloadTooLarge {
        size: usize,
        max: usize,
    },
    Decompress(std::io::Error),
    Envelope(prost::DecodeError),
    /// Envelope opcode whose message code does not fit the 16-bit header field.
    OpcodeOutOfRange(i32),
}

impl CodecError {
    /// True when the peer closed the stream on a packet boundary.
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "packet read failed: {e}"),
            Self::ChecksumMismatch { expected, actual } => {
                write!(f, "checksum mismatch: header {expected:#010x}, computed {actual:#010x}")
            }
            Self::PayloadTooLarge { size, max } => {
                write!(f, "payload of {size} bytes exceeds limit of {max}")
            }
            Self::Decompress(e) => write!(f, "decompress failed: {e}"),
            Self::Envelope(e) => write!(f, "envelope decode failed: {e}"),
            Self::OpcodeOutOfRange(ops) => write!(f, "opcode {ops} has no 16-bit message code"),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) | Self::Decompress(e) => Some(e),
            Self::Envelope(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CodecError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<prost::DecodeError> for CodecError {
    fn from(e: prost::DecodeError) -> Self {
        Self::Envelope(e)
    }
}
