use crate::{
    bson_util::read_i32_le,
    error::{Error, ErrorKind, Result},
};

/// The wire protocol op codes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OpCode {
    Reply = 1,
    Update = 2001,
    Insert = 2002,
    Query = 2004,
    Delete = 2006,
}

impl OpCode {
    /// Attempt to infer the op code based on the numeric value.
    pub(crate) fn from_i32(i: i32) -> Result<Self> {
        match i {
            1 => Ok(OpCode::Reply),
            2001 => Ok(OpCode::Update),
            2002 => Ok(OpCode::Insert),
            2004 => Ok(OpCode::Query),
            2006 => Ok(OpCode::Delete),
            other => Err(ErrorKind::InvalidResponse {
                message: format!("Invalid wire protocol opcode: {}", other),
            }
            .into()),
        }
    }
}

/// The header for any wire protocol message.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Header {
    pub(crate) length: i32,
    pub(crate) request_id: i32,
    pub(crate) response_to: i32,
    pub(crate) op_code: OpCode,
}

impl Header {
    pub(crate) const LENGTH: usize = 4 * std::mem::size_of::<i32>();

    /// Serializes the Header and appends the bytes to `buf`.
    pub(crate) fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.length.to_le_bytes());
        buf.extend_from_slice(&self.request_id.to_le_bytes());
        buf.extend_from_slice(&self.response_to.to_le_bytes());
        buf.extend_from_slice(&(self.op_code as i32).to_le_bytes());
    }

    /// Deserializes a header from the first `Header::LENGTH` bytes of `bytes`.
    pub(crate) fn parse(bytes: &[u8]) -> Result<Self> {
        let field = |index: usize| {
            read_i32_le(&bytes[(index * 4).min(bytes.len())..])
                .ok_or_else(|| Error::invalid_response("message header is truncated"))
        };
        Ok(Self {
            length: field(0)?,
            request_id: field(1)?,
            response_to: field(2)?,
            op_code: OpCode::from_i32(field(3)?)?,
        })
    }
}
