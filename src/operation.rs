mod encode;
mod get_last_error;
mod write;

pub(crate) use self::{
    encode::MessageChain,
    get_last_error::GetLastError,
    write::WriteOperation,
};
pub use self::write::{DeleteLimit, DeleteStatement, UpdateStatement, WriteRequest};
