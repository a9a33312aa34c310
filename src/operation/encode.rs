
use super::{DeleteLimit, GetLastError, WriteRequest};
use crate::{
    cmap::{
        conn::wire::{
            next_request_id,
            DeleteFlags,
            FrameBuilder,
            InsertFlags,
            OpCode,
            RequestMessage,
            UpdateFlags,
        },
        StreamDescription,
    },
    coll::Namespace,
    error::{Error, Result},
};

#[derive(Clone, Copy, Debug, PartialEq)]
enum Stage {
    Writes,
    Acknowledgment,
    Done,
}

/// Yields the frames of one write, in the order they must be sent, appending each frame's bytes
/// to a shared buffer as it goes.
///
/// Inserts fill each frame with as many documents as fit within the message size and batch size
/// limits, continuing in a new frame with the rest. Updates and deletes send one statement per
/// frame. The acknowledgment frame, if any, always comes last and is the only frame that expects a
/// reply. After an error the chain yields nothing more.
pub(crate) struct MessageChain<'a> {
    full_name: String,
    write: &'a WriteRequest,
    acknowledgment: Option<&'a GetLastError>,
    description: &'a StreamDescription,
    buf: &'a mut Vec<u8>,

    /// Index of the next document or statement to encode.
    position: usize,
    stage: Stage,
}

impl<'a> MessageChain<'a> {
    pub(crate) fn new(
        ns: &Namespace,
        write: &'a WriteRequest,
        acknowledgment: Option<&'a GetLastError>,
        description: &'a StreamDescription,
        buf: &'a mut Vec<u8>,
    ) -> Self {
        Self {
            full_name: ns.to_string(),
            write,
            acknowledgment,
            description,
            buf,
            position: 0,
            stage: if write.is_empty() {
                Stage::Acknowledgment
            } else {
                Stage::Writes
            },
        }
    }

    fn next_write_frame(&mut self) -> Result<RequestMessage> {
        let max_document_size = self.description.max_document_size();
        let max_message_size = self.description.max_message_size();
        let write = self.write;

        match write {
            WriteRequest::Insert {
                documents,
                continue_on_error,
            } => {
                let flags = if *continue_on_error {
                    InsertFlags::CONTINUE_ON_ERROR
                } else {
                    InsertFlags::empty()
                };
                let max_batch_len = self.description.max_batch_len();

                let mut frame =
                    FrameBuilder::begin(&mut *self.buf, OpCode::Insert, next_request_id());
                frame.write_i32(flags.bits());
                frame.write_cstring(&self.full_name)?;

                let mut batch_len = 0;
                while self.position < documents.len() && batch_len < max_batch_len {
                    let mark = frame.mark();
                    frame.write_document(&documents[self.position], max_document_size)?;
                    // The first document always goes in so that every frame makes progress.
                    if batch_len > 0 && frame.frame_len() > max_message_size {
                        frame.rewind(mark);
                        break;
                    }
                    self.position += 1;
                    batch_len += 1;
                }
                frame.finish(false)
            }
            WriteRequest::Update { statements } => {
                let statement = &statements[self.position];
                let mut flags = UpdateFlags::empty();
                flags.set(UpdateFlags::UPSERT, statement.upsert);
                flags.set(UpdateFlags::MULTI_UPDATE, statement.multi);

                let mut frame =
                    FrameBuilder::begin(&mut *self.buf, OpCode::Update, next_request_id());
                frame.write_i32(0);
                frame.write_cstring(&self.full_name)?;
                frame.write_i32(flags.bits());
                frame.write_document(&statement.filter, usize::MAX)?;
                frame.write_document(&statement.update, max_document_size)?;
                check_message_size(frame.frame_len(), max_message_size)?;
                self.position += 1;
                frame.finish(false)
            }
            WriteRequest::Delete { statements } => {
                let statement = &statements[self.position];
                let flags = match statement.limit {
                    DeleteLimit::One => DeleteFlags::SINGLE_REMOVE,
                    DeleteLimit::All => DeleteFlags::empty(),
                };

                let mut frame =
                    FrameBuilder::begin(&mut *self.buf, OpCode::Delete, next_request_id());
                frame.write_i32(0);
                frame.write_cstring(&self.full_name)?;
                frame.write_i32(flags.bits());
                frame.write_document(&statement.filter, usize::MAX)?;
                check_message_size(frame.frame_len(), max_message_size)?;
                self.position += 1;
                frame.finish(false)
            }
        }
    }
}

/// Update and delete statements cannot be split, so one that does not fit in a message fails.
fn check_message_size(frame_len: usize, max_message_size: usize) -> Result<()> {
    if frame_len > max_message_size {
        return Err(Error::encoding(format!(
            "statement needs a {} byte message but the maximum message size is {} bytes",
            frame_len, max_message_size
        )));
    }
    Ok(())
}

impl Iterator for MessageChain<'_> {
    type Item = Result<RequestMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = match self.stage {
            Stage::Writes => {
                let result = self.next_write_frame();
                if self.position >= self.write.len() {
                    self.stage = Stage::Acknowledgment;
                }
                result
            }
            Stage::Acknowledgment => {
                self.stage = Stage::Done;
                let gle = self.acknowledgment?;
                gle.encode(&mut *self.buf, self.description.max_document_size())
            }
            Stage::Done => return None,
        };
        if result.is_err() {
            self.stage = Stage::Done;
        }
        Some(result)
    }
}
