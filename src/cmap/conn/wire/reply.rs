use bitflags::bitflags;

use super::header::{Header, OpCode};
use crate::{
    bson::Document,
    bson_util::read_i32_le,
    buffer::PooledBuffer,
    error::{Error, Result},
};

bitflags! {
    /// Represents the bitwise flags for an OP_REPLY.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub(crate) struct ResponseFlags: i32 {
        const CURSOR_NOT_FOUND = 0b_0000_0001;
        const QUERY_FAILURE    = 0b_0000_0010;
        const AWAIT_CAPABLE    = 0b_0000_1000;
    }
}

/// The fixed-size fields that follow the header of an OP_REPLY.
const REPLY_PREFIX_LENGTH: usize = 4 + 8 + 4 + 4;

/// A reply frame as read off the connection, before any parsing of its body. The body's buffer
/// goes back to its provider when this is dropped.
#[derive(Debug)]
pub(crate) struct ReplyMessage {
    pub(crate) header: Header,
    pub(crate) body: PooledBuffer,
}

impl ReplyMessage {
    pub(crate) fn response_to(&self) -> i32 {
        self.header.response_to
    }
}

/// The flags and documents of an OP_REPLY. Cursor fields are validated but not kept, since
/// acknowledgment replies never open a cursor.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Reply {
    pub(crate) flags: ResponseFlags,
    pub(crate) documents: Vec<Document>,
}

impl Reply {
    /// Parses the body of `message` into its documents.
    pub(crate) fn parse(message: &ReplyMessage) -> Result<Self> {
        if message.header.op_code != OpCode::Reply {
            return Err(Error::invalid_response(format!(
                "expected an OP_REPLY, got {:?}",
                message.header.op_code
            )));
        }

        let body = message.body.as_slice();
        let declared_len = usize::try_from(message.header.length).unwrap_or(0);
        if declared_len != Header::LENGTH + body.len() || body.len() < REPLY_PREFIX_LENGTH {
            return Err(Error::invalid_response(format!(
                "The server indicated that the reply would be {} bytes long, but it instead was {}",
                message.header.length,
                Header::LENGTH + body.len(),
            )));
        }

        let flags = ResponseFlags::from_bits_truncate(read_i32_le(body).unwrap_or_default());
        let number_returned = read_i32_le(&body[16..]).unwrap_or_default();

        let mut remaining = &body[REPLY_PREFIX_LENGTH..];
        let mut documents = Vec::new();
        while !remaining.is_empty() {
            let len = read_i32_le(remaining)
                .and_then(|len| usize::try_from(len).ok())
                .filter(|len| *len >= 5 && *len <= remaining.len())
                .ok_or_else(|| Error::invalid_response("reply contains a truncated document"))?;
            let (doc_bytes, rest) = remaining.split_at(len);
            documents.push(Document::from_reader(doc_bytes)?);
            remaining = rest;
        }

        if usize::try_from(number_returned).ok() != Some(documents.len()) {
            return Err(Error::invalid_response(format!(
                "reply declared {} documents but contained {}",
                number_returned,
                documents.len()
            )));
        }

        Ok(Self { flags, documents })
    }

    /// The single document an acknowledgment reply carries.
    pub(crate) fn into_single_document(self) -> Result<Document> {
        self.documents
            .into_iter()
            .next()
            .ok_or_else(|| Error::invalid_response("reply did not contain any documents"))
    }
}
