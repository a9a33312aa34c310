//! Contains the result type returned by acknowledged writes.

use crate::{
    bson::{Bson, Document},
    bson_util,
    options::ServerAddress,
};

/// The server's answer to the acknowledgment command that followed a write.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct CommandResult {
    /// The address of the server that acknowledged the write.
    pub server_address: ServerAddress,

    /// Whether the server reported the command as successful.
    pub ok: bool,

    /// The full reply document, including any fields not exposed through the accessors below.
    pub response: Document,
}

impl CommandResult {
    pub(crate) fn new(server_address: ServerAddress, response: Document) -> Self {
        let ok = bson_util::is_ok(response.get("ok"));
        Self {
            server_address,
            ok,
            response,
        }
    }

    /// The error string the server attached to the reply, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.response.get_str("err").ok()
    }

    /// The number of documents the write affected.
    pub fn n(&self) -> Option<i64> {
        self.response.get("n").and_then(bson_util::get_int)
    }

    /// For updates, whether an existing document was modified.
    pub fn updated_existing(&self) -> Option<bool> {
        self.response.get_bool("updatedExisting").ok()
    }

    /// For upserts that inserted a document, the `_id` of that document.
    pub fn upserted_id(&self) -> Option<&Bson> {
        self.response.get("upserted")
    }

    /// Gets an arbitrary field of the reply.
    pub fn get(&self, key: &str) -> Option<&Bson> {
        self.response.get(key)
    }
}
