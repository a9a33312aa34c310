mod header;
mod message;
mod reply;
#[cfg(test)]
mod test;
mod util;

pub(crate) use self::{
    header::{Header, OpCode},
    message::{DeleteFlags, FrameBuilder, InsertFlags, RequestMessage, UpdateFlags},
    reply::{Reply, ReplyMessage, ResponseFlags},
    util::next_request_id,
};
