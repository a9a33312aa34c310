pub(crate) mod conn;

pub use self::conn::{Connection, StreamDescription};
