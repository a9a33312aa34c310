use typed_builder::TypedBuilder;

use crate::{options::ServerAddress, sdam::ServerType};

pub(crate) const DEFAULT_MAX_BSON_OBJECT_SIZE: i64 = 16 * 1024 * 1024;
pub(crate) const DEFAULT_MAX_WRITE_BATCH_SIZE: i64 = 1000;
pub(crate) const DEFAULT_MAX_MESSAGE_SIZE_BYTES: i32 = 48_000_000;

/// Contains information about a given server in a format digestible by a connection. The size
/// limits here decide how a write is split into wire frames.
#[derive(Debug, Clone, PartialEq, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
#[non_exhaustive]
pub struct StreamDescription {
    /// The address of the server.
    #[builder(default)]
    pub server_address: ServerAddress,

    /// The type of the server when the connection was established.
    #[builder(default)]
    pub initial_server_type: ServerType,

    /// The maximum wire version that the server understands.
    #[builder(default)]
    pub max_wire_version: Option<i32>,

    /// The maximum size of a single document the server accepts.
    #[builder(default = DEFAULT_MAX_BSON_OBJECT_SIZE)]
    pub max_bson_object_size: i64,

    /// The maximum number of documents that can be included in a single insert frame.
    #[builder(default = DEFAULT_MAX_WRITE_BATCH_SIZE)]
    pub max_write_batch_size: i64,

    /// The maximum permitted size of a wire protocol message.
    #[builder(default = DEFAULT_MAX_MESSAGE_SIZE_BYTES)]
    pub max_message_size_bytes: i32,
}

impl Default for StreamDescription {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl StreamDescription {
    /// Gets a description of a standalone server, for use in tests.
    #[cfg(test)]
    pub(crate) fn new_testing() -> Self {
        Self::builder()
            .initial_server_type(ServerType::Standalone)
            .max_wire_version(6)
            .build()
    }

    pub(crate) fn max_document_size(&self) -> usize {
        usize::try_from(self.max_bson_object_size).unwrap_or(0)
    }

    pub(crate) fn max_message_size(&self) -> usize {
        usize::try_from(self.max_message_size_bytes).unwrap_or(0)
    }

    pub(crate) fn max_batch_len(&self) -> usize {
        usize::try_from(self.max_write_batch_size).unwrap_or(0).max(1)
    }
}
