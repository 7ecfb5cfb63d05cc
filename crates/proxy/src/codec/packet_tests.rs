// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;

use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use proptest::prelude::*;

use super::*;

fn gzip(data: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data)?;
    Ok(enc.finish()?)
}

fn zlib(data: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data)?;
    Ok(enc.finish()?)
}

/// Hand-build a wire packet with arbitrary header fields.
fn raw_packet(msg_code: u16, flag: u8, body: &[u8], checksum: u32) -> Vec<u8> {
    let mut out = BytesMut::new();
    PacketHeader { msg_code, flag, reserved: 0, payload_size: body.len() as u32, checksum }
        .put(&mut out);
    out.put_slice(body);
    out.to_vec()
}

// ── checksum ──────────────────────────────────────────────────────────

#[yare::parameterized(
    empty       = { b"", 0 },
    single      = { b"a", 0x61 },
    two         = { b"ab", 0x672 },
    hello       = { b"hello", 0x006e_c32f },
    world       = { b"world", 0x007e_6924 },
    hello_world = { b"hello world", 0x0114_ac14 },
    high_bytes  = { &[0xff; 16], 0x0010_ffef },
)]
fn checksum_vectors(data: &[u8], expected: u32) {
    assert_eq!(checksum(data), expected);
}

#[test]
fn checksum_of_every_byte_value() {
    let data: Vec<u8> = (0..=255u8).collect();
    assert_eq!(checksum(&data), 0x0c43_1b1f);
}

proptest! {
    #[test]
    fn checksum_never_keeps_high_nibble(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        prop_assert_eq!(checksum(&data) & 0xF000_0000, 0);
    }

    #[test]
    fn encoded_header_describes_payload(
        msg_code in any::<u16>(),
        data in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let frame = encode_packet(msg_code, &data).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let mut head = [0u8; HEADER_LEN];
        head.copy_from_slice(&frame[..HEADER_LEN]);
        let header = PacketHeader::decode(&head);
        prop_assert_eq!(header.msg_code, msg_code);
        prop_assert_eq!(header.payload_size as usize, data.len());
        prop_assert_eq!(header.checksum, checksum(&frame[HEADER_LEN..]));
        prop_assert_eq!(&frame[HEADER_LEN..], &data[..]);
    }
}

// ── header ────────────────────────────────────────────────────────────

#[test]
fn header_decodes_little_endian_fields() {
    let buf = [0x0a, 0x00, 0x40, 0x07, 0x05, 0x00, 0x00, 0x00, 0x2f, 0xc3, 0x6e, 0x00];
    let header = PacketHeader::decode(&buf);
    assert_eq!(header.msg_code, 10);
    assert_eq!(header.flag, 0x40);
    assert_eq!(header.reserved, 7);
    assert_eq!(header.payload_size, 5);
    assert_eq!(header.checksum, 0x006e_c32f);
    assert!(header.is_compressed());
}

#[test]
fn encode_writes_uncompressed_header_then_payload() -> anyhow::Result<()> {
    let frame = encode_packet(10, b"hello")?;
    assert_eq!(frame.len(), HEADER_LEN + 5);
    assert_eq!(
        &frame[..HEADER_LEN],
        &[0x0a_u8, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x2f, 0xc3, 0x6e, 0x00]
    );
    assert_eq!(&frame[HEADER_LEN..], b"hello");
    Ok(())
}

#[test]
fn encode_empty_payload_has_zero_checksum() -> anyhow::Result<()> {
    let frame = encode_packet(3, b"")?;
    let head: [u8; HEADER_LEN] = frame[..HEADER_LEN].try_into()?;
    let header = PacketHeader::decode(&head);
    assert_eq!(header.payload_size, 0);
    assert_eq!(header.checksum, 0);
    Ok(())
}

// ── read_packet ───────────────────────────────────────────────────────

#[tokio::test]
async fn read_then_open_round_trips() -> anyhow::Result<()> {
    let frame = encode_packet(0x1234, b"payload bytes")?;
    let mut reader: &[u8] = &frame;

    let packet = read_packet(&mut reader, 1024).await?;
    assert_eq!(packet.header.msg_code, 0x1234);
    assert_eq!(packet.into_payload(1024)?, Bytes::from_static(b"payload bytes"));
    assert!(reader.is_empty());
    Ok(())
}

#[tokio::test]
async fn reads_consecutive_packets_from_one_stream() -> anyhow::Result<()> {
    let mut wire = encode_packet(1, b"first")?.to_vec();
    wire.extend_from_slice(&encode_packet(2, b"second")?);
    let mut reader: &[u8] = &wire;

    let first = read_packet(&mut reader, 1024).await?;
    let second = read_packet(&mut reader, 1024).await?;
    assert_eq!((first.header.msg_code, &first.body[..]), (1, &b"first"[..]));
    assert_eq!((second.header.msg_code, &second.body[..]), (2, &b"second"[..]));

    let err = read_packet(&mut reader, 1024).await.err();
    assert!(err.as_ref().is_some_and(CodecError::is_eof), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn short_header_is_an_error() {
    let mut reader: &[u8] = &[0x01, 0x00, 0x00];
    let err = read_packet(&mut reader, 1024).await.err();
    assert!(matches!(err, Some(CodecError::Io(_))));
}

#[tokio::test]
async fn short_body_is_an_error() {
    let mut wire = raw_packet(1, 0, b"hello", checksum(b"hello"));
    wire.truncate(HEADER_LEN + 2);
    let mut reader: &[u8] = &wire;
    let err = read_packet(&mut reader, 1024).await.err();
    assert!(err.as_ref().is_some_and(CodecError::is_eof), "got {err:?}");
}

#[tokio::test]
async fn oversized_payload_is_rejected_before_reading_body() {
    let wire = raw_packet(1, 0, &[0u8; 64], 0);
    let mut reader: &[u8] = &wire;
    let err = read_packet(&mut reader, 16).await.err();
    assert!(matches!(err, Some(CodecError::PayloadTooLarge { size: 64, max: 16 })));
}

#[tokio::test]
async fn checksum_mismatch_is_a_protocol_error() -> anyhow::Result<()> {
    let wire = raw_packet(7, 0, b"world", checksum(b"world") ^ 1);
    let mut reader: &[u8] = &wire;
    let packet = read_packet(&mut reader, 1024).await?;

    let err = packet.into_payload(1024).err();
    assert!(matches!(
        err,
        Some(CodecError::ChecksumMismatch { actual: 0x007e_6924, .. })
    ));
    Ok(())
}

// ── compression ───────────────────────────────────────────────────────

#[test]
fn compressed_gzip_body_is_inflated() -> anyhow::Result<()> {
    let body = gzip(b"a fairly compressible payload payload payload")?;
    let packet = Packet {
        header: PacketHeader {
            msg_code: 9,
            flag: FLAG_COMPRESSED,
            reserved: 0,
            payload_size: body.len() as u32,
            checksum: checksum(&body),
        },
        body: Bytes::from(body),
    };
    assert_eq!(&packet.into_payload(1024)?[..], b"a fairly compressible payload payload payload");
    Ok(())
}

#[test]
fn compressed_zlib_body_is_inflated() -> anyhow::Result<()> {
    let body = zlib(b"zlib stream")?;
    assert_eq!(decompress(&body, 1024)?, b"zlib stream");
    Ok(())
}

#[test]
fn uncompressed_flag_leaves_body_untouched() -> anyhow::Result<()> {
    let body = gzip(b"still compressed")?;
    let packet = Packet {
        header: PacketHeader {
            msg_code: 9,
            flag: 0,
            reserved: 0,
            payload_size: body.len() as u32,
            checksum: checksum(&body),
        },
        body: Bytes::from(body.clone()),
    };
    assert_eq!(packet.into_payload(1024)?.to_vec(), body);
    Ok(())
}

#[test]
fn corrupt_compressed_body_fails() {
    let err = decompress(b"\x1f\x8bnot really gzip", 1024).err();
    assert!(matches!(err, Some(CodecError::Decompress(_))));
}

#[test]
fn inflated_size_is_bounded() -> anyhow::Result<()> {
    let body = gzip(&[b'x'; 4096])?;
    let err = decompress(&body, 1000).err();
    assert!(matches!(err, Some(CodecError::PayloadTooLarge { max: 1000, .. })));
    Ok(())
}
