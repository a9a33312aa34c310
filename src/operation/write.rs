
use typed_builder::TypedBuilder;

use super::{GetLastError, MessageChain};
use crate::{
    bson::Document,
    cmap::{conn::wire::RequestMessage, StreamDescription},
    coll::Namespace,
    concern::WriteConcern,
    error::{Error, Result},
};

/// A single write to one collection. Each variant maps onto one kind of wire message.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum WriteRequest {
    /// Inserts the given documents, in order.
    Insert {
        /// The documents to insert. These are sent as given; no `_id` is generated for them.
        documents: Vec<Document>,

        /// Whether the server should keep inserting the remaining documents after one fails.
        continue_on_error: bool,
    },

    /// Applies each update statement in order.
    Update {
        /// The update statements.
        statements: Vec<UpdateStatement>,
    },

    /// Applies each delete statement in order.
    Delete {
        /// The delete statements.
        statements: Vec<DeleteStatement>,
    },
}

impl WriteRequest {
    /// An insert of `documents` that stops at the first failing document.
    pub fn insert(documents: impl IntoIterator<Item = Document>) -> Self {
        WriteRequest::Insert {
            documents: documents.into_iter().collect(),
            continue_on_error: false,
        }
    }

    /// An update made of `statements`.
    pub fn update(statements: impl IntoIterator<Item = UpdateStatement>) -> Self {
        WriteRequest::Update {
            statements: statements.into_iter().collect(),
        }
    }

    /// A delete made of `statements`.
    pub fn delete(statements: impl IntoIterator<Item = DeleteStatement>) -> Self {
        WriteRequest::Delete {
            statements: statements.into_iter().collect(),
        }
    }

    /// The number of documents or statements in this write.
    pub fn len(&self) -> usize {
        match self {
            WriteRequest::Insert { documents, .. } => documents.len(),
            WriteRequest::Update { statements } => statements.len(),
            WriteRequest::Delete { statements } => statements.len(),
        }
    }

    /// Whether this write has nothing to send.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            WriteRequest::Insert { .. } => "insert",
            WriteRequest::Update { .. } => "update",
            WriteRequest::Delete { .. } => "delete",
        }
    }
}

/// A single update: which documents to match and how to modify them.
#[derive(Clone, Debug, PartialEq, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
#[non_exhaustive]
pub struct UpdateStatement {
    /// The selector for the documents to update.
    pub filter: Document,

    /// The modifications to apply, or a replacement document.
    pub update: Document,

    /// Insert a document built from the filter and update if none match.
    #[builder(default)]
    pub upsert: bool,

    /// Update every matching document rather than only the first.
    #[builder(default)]
    pub multi: bool,
}

/// A single delete: which documents to remove.
#[derive(Clone, Debug, PartialEq, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
#[non_exhaustive]
pub struct DeleteStatement {
    /// The selector for the documents to delete.
    pub filter: Document,

    /// How many of the matching documents to delete.
    #[builder(default)]
    pub limit: DeleteLimit,
}

/// How many matching documents a [`DeleteStatement`] removes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeleteLimit {
    /// Only the first matching document.
    One,

    /// Every matching document.
    #[default]
    All,
}

/// A validated write together with the acknowledgment command, if any, that follows it.
#[derive(Debug)]
pub(crate) struct WriteOperation<'a> {
    ns: &'a Namespace,
    write: &'a WriteRequest,
    acknowledgment: Option<GetLastError>,
}

impl<'a> WriteOperation<'a> {
    pub(crate) fn new(
        ns: &'a Namespace,
        write: &'a WriteRequest,
        write_concern: &WriteConcern,
    ) -> Result<Self> {
        ns.validate()?;
        write_concern.validate()?;
        if write.is_empty() {
            return Err(Error::invalid_argument(format!(
                "{} to {} must contain at least one document or statement",
                write.name(),
                ns
            )));
        }
        Ok(Self {
            ns,
            write,
            acknowledgment: write_concern.acknowledgment_command(ns),
        })
    }

    pub(crate) fn namespace(&self) -> &Namespace {
        self.ns
    }

    pub(crate) fn acknowledgment(&self) -> Option<&GetLastError> {
        self.acknowledgment.as_ref()
    }

    /// Encodes the whole message chain into `buf`, write frames first and the acknowledgment
    /// frame, if any, last.
    pub(crate) fn encode(
        &self,
        description: &StreamDescription,
        buf: &mut Vec<u8>,
    ) -> Result<Vec<RequestMessage>> {
        MessageChain::new(
            self.ns,
            self.write,
            self.acknowledgment.as_ref(),
            description,
            buf,
        )
        .collect()
    }
}
