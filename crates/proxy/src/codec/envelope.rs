// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client-facing envelope carried in binary WebSocket frames.
//!
//! Opcodes up to [`MAX_CONTROL_OP`] are control codes handled by the proxy.
//! Larger opcodes carry a backend message code in bits 8..24.

use bytes::Bytes;
use prost::Message as _;

use super::CodecError;

pub const OP_PING: i32 = 1;
pub const OP_PONG: i32 = 2;
pub const MAX_CONTROL_OP: i32 = 255;

/// Payload of proxy-originated keepalive pings.
pub const KEEPALIVE_PAYLOAD: &[u8] = b"ka";

/// Wire schema shared with clients: `ops = 1`, `data = 2`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ProxyMessage {
    #[prost(int32, optional, tag = "1")]
    pub ops: Option<i32>,
    #[prost(bytes = "bytes", optional, tag = "2")]
    pub data: Option<Bytes>,
}

/// What an envelope opcode asks the proxy to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Ping,
    Pong,
    /// Reserved control code with no handler.
    Control(i32),
    /// Backend traffic for the given message code.
    Data(u16),
}

impl ProxyMessage {
    pub fn new(ops: i32, data: impl Into<Bytes>) -> Self {
        Self { ops: Some(ops), data: Some(data.into()) }
    }

    /// Data envelope for a backend message code.
    pub fn for_msg_code(msg_code: u16, data: impl Into<Bytes>) -> Self {
        Self::new(data_op(msg_code), data)
    }

    pub fn decode_frame(buf: &[u8]) -> Result<Self, CodecError> {
        Ok(Self::decode(buf)?)
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.encode_to_vec())
    }

    pub fn payload(&self) -> Bytes {
        self.data.clone().unwrap_or_default()
    }

    pub fn op(&self) -> Result<Op, CodecError> {
        classify(self.ops.unwrap_or_default())
    }
}

/// Opcode carrying `msg_code` to a client.
pub fn data_op(msg_code: u16) -> i32 {
    i32::from(msg_code) << 8
}

pub fn classify(ops: i32) -> Result<Op, CodecError> {
    match ops {
        OP_PING => Ok(Op::Ping),
        OP_PONG => Ok(Op::Pong),
        ops if ops <= MAX_CONTROL_OP => Ok(Op::Control(ops)),
        ops => u16::try_from(ops >> 8).map(Op::Data).map_err(|_| CodecError::OpcodeOutOfRange(ops)),
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
