use std::ops::Range;

use bitflags::bitflags;

use super::{
    header::{Header, OpCode},
    util::write_cstring,
};
use crate::{
    bson::Document,
    error::{Error, Result},
};

bitflags! {
    /// The flags of an OP_INSERT.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub(crate) struct InsertFlags: i32 {
        const CONTINUE_ON_ERROR = 0b_0000_0001;
    }
}

bitflags! {
    /// The flags of an OP_UPDATE.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub(crate) struct UpdateFlags: i32 {
        const UPSERT       = 0b_0000_0001;
        const MULTI_UPDATE = 0b_0000_0010;
    }
}

bitflags! {
    /// The flags of an OP_DELETE.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub(crate) struct DeleteFlags: i32 {
        const SINGLE_REMOVE = 0b_0000_0001;
    }
}

/// An encoded request frame inside an outbound buffer.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RequestMessage {
    pub(crate) request_id: i32,

    /// Where the frame's bytes live in the buffer it was encoded into.
    pub(crate) range: Range<usize>,

    /// Whether the server will reply to this frame. Only acknowledgment commands get replies.
    pub(crate) expects_reply: bool,
}

/// Appends a single wire frame to a buffer. The header is written up front with a placeholder
/// length that [`finish`](FrameBuilder::finish) patches once the body is complete.
pub(crate) struct FrameBuilder<'a> {
    buf: &'a mut Vec<u8>,
    start: usize,
    request_id: i32,
}

impl<'a> FrameBuilder<'a> {
    pub(crate) fn begin(buf: &'a mut Vec<u8>, op_code: OpCode, request_id: i32) -> Self {
        let start = buf.len();
        Header {
            length: 0,
            request_id,
            response_to: 0,
            op_code,
        }
        .write_to(buf);
        Self {
            buf,
            start,
            request_id,
        }
    }

    pub(crate) fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn write_cstring(&mut self, string: &str) -> Result<()> {
        write_cstring(self.buf, string)
    }

    /// Appends `doc` and returns its encoded size. A document larger than `max_size` is removed
    /// again and reported as an encoding error.
    pub(crate) fn write_document(&mut self, doc: &Document, max_size: usize) -> Result<usize> {
        let mark = self.buf.len();
        doc.to_writer(&mut *self.buf)?;
        let size = self.buf.len() - mark;
        if size > max_size {
            self.buf.truncate(mark);
            return Err(Error::encoding(format!(
                "document of {} bytes exceeds the maximum document size of {} bytes",
                size, max_size
            )));
        }
        Ok(size)
    }

    /// The absolute buffer position the next byte will be written at.
    pub(crate) fn mark(&self) -> usize {
        self.buf.len()
    }

    /// Drops everything written after `mark`.
    pub(crate) fn rewind(&mut self, mark: usize) {
        self.buf.truncate(mark.max(self.start + Header::LENGTH));
    }

    /// The length of the frame so far, header included.
    pub(crate) fn frame_len(&self) -> usize {
        self.buf.len() - self.start
    }

    pub(crate) fn finish(self, expects_reply: bool) -> Result<RequestMessage> {
        let length = i32::try_from(self.frame_len())
            .map_err(|_| Error::encoding("message length exceeds i32::MAX"))?;
        self.buf[self.start..self.start + 4].copy_from_slice(&length.to_le_bytes());
        Ok(RequestMessage {
            request_id: self.request_id,
            range: self.start..self.buf.len(),
            expects_reply,
        })
    }
}
