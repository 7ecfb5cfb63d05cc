// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn envelope_round_trips() -> anyhow::Result<()> {
    let msg = ProxyMessage::new(2561, &b"hello"[..]);
    let decoded = ProxyMessage::decode_frame(&msg.to_bytes())?;
    assert_eq!(decoded.ops, Some(2561));
    assert_eq!(decoded.payload(), Bytes::from_static(b"hello"));
    Ok(())
}

#[test]
fn encodes_known_wire_bytes() {
    // field 1 varint 1, field 2 length-delimited "ka"
    let msg = ProxyMessage::new(OP_PING, KEEPALIVE_PAYLOAD);
    assert_eq!(&msg.to_bytes()[..], &[0x08_u8, 0x01, 0x12, 0x02, b'k', b'a']);
}

#[test]
fn decodes_message_without_data() -> anyhow::Result<()> {
    let decoded = ProxyMessage::decode_frame(&[0x08, 0x02])?;
    assert_eq!(decoded.op()?, Op::Pong);
    assert!(decoded.payload().is_empty());
    Ok(())
}

#[test]
fn garbage_is_a_decode_error() {
    let err = ProxyMessage::decode_frame(&[0x0a, 0xff, 0xff]).err();
    assert!(matches!(err, Some(CodecError::Envelope(_))));
}

#[yare::parameterized(
    ping          = { 1, Op::Ping },
    pong          = { 2, Op::Pong },
    unset         = { 0, Op::Control(0) },
    negative      = { -5, Op::Control(-5) },
    last_control  = { 255, Op::Control(255) },
    first_data    = { 256, Op::Data(1) },
    low_bits_drop = { (5 << 8) + 3, Op::Data(5) },
    login         = { (10 << 8) + 1, Op::Data(10) },
    widest        = { 0x00ff_ffff, Op::Data(0xffff) },
)]
fn classifies_opcodes(ops: i32, expected: Op) {
    assert_eq!(classify(ops).ok(), Some(expected));
}

#[test]
fn opcode_beyond_sixteen_bit_code_is_rejected() {
    let err = classify(0x0100_0000).err();
    assert!(matches!(err, Some(CodecError::OpcodeOutOfRange(0x0100_0000))));
}

#[test]
fn backend_code_shifts_into_data_opcode() {
    assert_eq!(data_op(7), 7 << 8);
    assert_eq!(data_op(10), 2560);
    assert_eq!(ProxyMessage::for_msg_code(10, &b"world"[..]).ops, Some(2560));
}

#[test]
fn data_opcode_survives_the_trip_back() {
    for code in [1u16, 10, 0x1234, u16::MAX] {
        assert_eq!(classify(data_op(code)).ok(), Some(Op::Data(code)));
    }
}
