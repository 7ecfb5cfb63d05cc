// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backend TCP framing.
//!
//! Every packet starts with a 12-byte little-endian header followed by
//! `payload_size` bytes of body:
//!
//! | offset | size | field        |
//! |--------|------|--------------|
//! | 0      | 2    | message code |
//! | 2      | 1    | flag         |
//! | 3      | 1    | reserved     |
//! | 4      | 4    | payload size |
//! | 8      | 4    | checksum     |
//!
//! The checksum covers the body exactly as it travels on the wire and must
//! match the backend's implementation bit for bit.

use std::io::Read;

use bytes::{BufMut, Bytes, BytesMut};
use flate2::read::{GzDecoder, ZlibDecoder};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::CodecError;

pub const HEADER_LEN: usize = 12;

/// Flag bit marking a compressed body.
pub const FLAG_COMPRESSED: u8 = 0x40;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Decoded packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub msg_code: u16,
    pub flag: u8,
    /// Carried on the wire but unused; compression is signalled by `flag`.
    pub reserved: u8,
    pub payload_size: u32,
    pub checksum: u32,
}

impl PacketHeader {
    /// Extract header fields. No validation beyond the fixed length.
    pub fn decode(buf: &[u8; HEADER_LEN]) -> Self {
        Self {
            msg_code: u16::from_le_bytes([buf[0], buf[1]]),
            flag: buf[2],
            reserved: buf[3],
            payload_size: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            checksum: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
        }
    }

    pub fn put(&self, out: &mut BytesMut) {
        out.put_u16_le(self.msg_code);
        out.put_u8(self.flag);
        out.put_u8(self.reserved);
        out.put_u32_le(self.payload_size);
        out.put_u32_le(self.checksum);
    }

    pub fn is_compressed(&self) -> bool {
        self.flag & FLAG_COMPRESSED != 0
    }
}

/// One packet as read off the backend stream, not yet verified.
#[derive(Debug, Clone)]
pub struct Packet {
    pub header: PacketHeader,
    pub body: Bytes,
}

impl Packet {
    /// Verify the checksum and inflate the body if the compressed flag is set.
    ///
    /// `max_len` bounds the inflated size.
    pub fn into_payload(self, max_len: usize) -> Result<Bytes, CodecError> {
        let actual = checksum(&self.body);
        if actual != self.header.checksum {
            return Err(CodecError::ChecksumMismatch { expected: self.header.checksum, actual });
        }
        if self.header.is_compressed() {
            return decompress(&self.body, max_len).map(Bytes::from);
        }
        Ok(self.body)
    }
}

/// Rolling hash shared with the backend.
pub fn checksum(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |hash, &b| {
        let hash = (hash << 4).wrapping_add(u32::from(b));
        let high = hash & 0xF000_0000;
        if high != 0 {
            hash ^ (high >> 24) ^ high
        } else {
            hash
        }
    })
}

/// Frame `payload` for the backend. Outbound packets are never compressed.
pub fn encode_packet(msg_code: u16, payload: &[u8]) -> Result<Bytes, CodecError> {
    let payload_size = u32::try_from(payload.len())
        .map_err(|_| CodecError::PayloadTooLarge { size: payload.len(), max: u32::MAX as usize })?;
    let header = PacketHeader {
        msg_code,
        flag: 0,
        reserved: 0,
        payload_size,
        checksum: checksum(payload),
    };

    let mut out = BytesMut::with_capacity(HEADER_LEN + payload.len());
    header.put(&mut out);
    out.put_slice(payload);
    Ok(out.freeze())
}

/// Read exactly one packet: the fixed header, then `payload_size` bytes.
///
/// Any short read is an error; there is no attempt to resynchronize.
pub async fn read_packet<R>(reader: &mut R, max_payload: usize) -> Result<Packet, CodecError>
where
    R: AsyncRead + Unpin,
{
    let mut head = [0u8; HEADER_LEN];
    reader.read_exact(&mut head).await?;
    let header = PacketHeader::decode(&head);

    let size = header.payload_size as usize;
    if size > max_payload {
        return Err(CodecError::PayloadTooLarge { size, max: max_payload });
    }

    let mut body = vec![0u8; size];
    reader.read_exact(&mut body).await?;
    Ok(Packet { header, body: Bytes::from(body) })
}

/// Inflate a compressed body.
///
/// Gzip streams are recognised by their magic bytes; anything else is read
/// as a zlib stream.
pub fn decompress(body: &[u8], max_len: usize) -> Result<Vec<u8>, CodecError> {
    let limit = max_len as u64 + 1;
    let mut out = Vec::with_capacity(body.len().saturating_mul(2).min(max_len));
    let read = if body.starts_with(&GZIP_MAGIC) {
        GzDecoder::new(body).take(limit).read_to_end(&mut out)
    } else {
        ZlibDecoder::new(body).take(limit).read_to_end(&mut out)
    };
    read.map_err(CodecError::Decompress)?;

    if out.len() > max_len {
        return Err(CodecError::PayloadTooLarge { size: out.len(), max: max_len });
    }
    Ok(out)
}

#[cfg(test)]
#[path = "packet_tests.rs"]
mod tests;
