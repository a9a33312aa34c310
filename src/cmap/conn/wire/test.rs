use std::sync::Arc;

use pretty_assertions::assert_eq;

use super::{FrameBuilder, Header, OpCode, Reply, ReplyMessage, ResponseFlags};
use crate::{
    bson::doc,
    buffer::{BufferPool, BufferProvider, PooledBuffer},
    error::ErrorKind,
};

fn reply_message(bytes: &[u8]) -> ReplyMessage {
    let provider: Arc<dyn BufferProvider> = Arc::new(BufferPool::default());
    let header = Header::parse(bytes).unwrap();
    let mut body = PooledBuffer::new(&provider, bytes.len());
    body.extend_from_slice(&bytes[Header::LENGTH..]);
    ReplyMessage { header, body }
}

#[test]
fn header_round_trips_through_bytes() {
    let header = Header {
        length: 42,
        request_id: 7,
        response_to: 3,
        op_code: OpCode::Query,
    };
    let mut bytes = Vec::new();
    header.write_to(&mut bytes);
    assert_eq!(bytes.len(), Header::LENGTH);
    assert_eq!(&bytes[12..], &2004i32.to_le_bytes());
    assert_eq!(Header::parse(&bytes).unwrap(), header);
}

#[test]
fn unknown_op_code_is_invalid() {
    let mut bytes = Vec::new();
    for field in [16i32, 1, 0, 2013] {
        bytes.extend_from_slice(&field.to_le_bytes());
    }
    let error = Header::parse(&bytes).unwrap_err();
    assert!(matches!(*error.kind, ErrorKind::InvalidResponse { .. }));
    assert!(Header::parse(&bytes[..10]).is_err());
}

#[test]
fn frame_length_is_patched_on_finish() {
    let mut buf = vec![0xAA; 3];
    let mut frame = FrameBuilder::begin(&mut buf, OpCode::Insert, 99);
    frame.write_i32(0);
    frame.write_cstring("db.coll").unwrap();
    frame.write_document(&doc! { "x": 1 }, 1024).unwrap();
    let message = frame.finish(false).unwrap();

    assert_eq!(message.range.start, 3);
    assert_eq!(message.range.end, buf.len());
    assert_eq!(message.request_id, 99);
    assert!(!message.expects_reply);

    let header = Header::parse(&buf[message.range.clone()]).unwrap();
    assert_eq!(header.length as usize, message.range.len());
    assert_eq!(header.request_id, 99);
    assert_eq!(header.response_to, 0);
    assert_eq!(header.op_code, OpCode::Insert);
}

#[test]
fn oversized_document_is_removed_from_frame() {
    let mut buf = Vec::new();
    let mut frame = FrameBuilder::begin(&mut buf, OpCode::Insert, 1);
    let before = frame.frame_len();
    let error = frame
        .write_document(&doc! { "big": "x".repeat(100) }, 64)
        .unwrap_err();
    assert!(error.is_encoding_error());
    assert_eq!(frame.frame_len(), before);
}

#[test]
fn rewind_never_drops_the_header() {
    let mut buf = Vec::new();
    let mut frame = FrameBuilder::begin(&mut buf, OpCode::Delete, 1);
    frame.write_i32(5);
    frame.rewind(0);
    assert_eq!(frame.frame_len(), Header::LENGTH);
}

#[test]
fn cstring_rejects_interior_nul() {
    let mut buf = Vec::new();
    let mut frame = FrameBuilder::begin(&mut buf, OpCode::Query, 1);
    let error = frame.write_cstring("db\0.coll").unwrap_err();
    assert!(error.is_encoding_error());
}

#[test]
fn reply_documents_are_parsed() {
    let bytes = crate::test::util::reply_frame(
        5,
        ResponseFlags::AWAIT_CAPABLE,
        &[doc! { "ok": 1 }, doc! { "n": 2 }],
    );
    let message = reply_message(&bytes);
    assert_eq!(message.response_to(), 5);
    let reply = Reply::parse(&message).unwrap();
    assert_eq!(reply.flags, ResponseFlags::AWAIT_CAPABLE);
    assert_eq!(reply.documents, vec![doc! { "ok": 1 }, doc! { "n": 2 }]);
    assert_eq!(reply.into_single_document().unwrap(), doc! { "ok": 1 });
}

#[test]
fn malformed_replies_are_rejected() {
    let bytes = crate::test::util::reply_frame(5, ResponseFlags::empty(), &[doc! { "ok": 1 }]);

    // Truncated document.
    let mut truncated = bytes[..bytes.len() - 2].to_vec();
    let truncated_len = truncated.len() as i32;
    truncated[..4].copy_from_slice(&truncated_len.to_le_bytes());
    let error = Reply::parse(&reply_message(&truncated)).unwrap_err();
    assert!(matches!(*error.kind, ErrorKind::InvalidResponse { .. }));

    // Declared document count disagrees with the content.
    let mut miscounted = bytes.clone();
    miscounted[Header::LENGTH + 16..Header::LENGTH + 20].copy_from_slice(&3i32.to_le_bytes());
    assert!(Reply::parse(&reply_message(&miscounted)).is_err());

    // No documents at all.
    let empty = crate::test::util::reply_frame(5, ResponseFlags::empty(), &[]);
    let reply = Reply::parse(&reply_message(&empty)).unwrap();
    let error = reply.into_single_document().unwrap_err();
    assert!(matches!(*error.kind, ErrorKind::InvalidResponse { .. }));
}
