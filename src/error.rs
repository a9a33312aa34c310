//! Contains the `Error` and `Result` types that `mongodb-write` uses.

#[cfg(test)]
mod test;

use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::{bson::Document, options::ServerAddress};

const DUPLICATE_KEY_CODES: [i32; 3] = [11000, 11001, 12582];

/// The result type for all methods that can return an error in the `mongodb-write` crate.
pub type Result<T> = std::result::Result<T, Error>;

/// An error that can occur in the `mongodb-write` crate. The inner
/// [`ErrorKind`](enum.ErrorKind.html) is wrapped in a `Box` to keep `Result`s small.
#[derive(Clone, Debug, Error)]
#[error("Kind: {kind}, labels: {labels:?}")]
#[non_exhaustive]
pub struct Error {
    /// The type of error that occurred.
    pub kind: Box<ErrorKind>,
    labels: Vec<String>,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, labels: Option<impl IntoIterator<Item = String>>) -> Self {
        Self {
            kind: Box::new(kind),
            labels: labels
                .map(|labels| labels.into_iter().collect())
                .unwrap_or_default(),
        }
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Error {
        ErrorKind::InvalidArgument {
            message: message.into(),
        }
        .into()
    }

    pub(crate) fn invalid_response(message: impl Into<String>) -> Error {
        ErrorKind::InvalidResponse {
            message: message.into(),
        }
        .into()
    }

    pub(crate) fn encoding(message: impl Into<String>) -> Error {
        ErrorKind::Encoding {
            message: message.into(),
        }
        .into()
    }

    pub(crate) fn server_selection(message: impl Into<String>) -> Error {
        ErrorKind::ServerSelection {
            message: message.into(),
        }
        .into()
    }

    pub(crate) fn connection_closed(address: &ServerAddress) -> Error {
        ErrorKind::ConnectionClosed {
            message: format!("connection to {} is no longer usable", address),
        }
        .into()
    }

    /// Whether this error occurred while encoding a write before anything was sent.
    pub fn is_encoding_error(&self) -> bool {
        matches!(
            self.kind.as_ref(),
            ErrorKind::Encoding { .. } | ErrorKind::BsonSerialization(_)
        )
    }

    /// Whether this error is a connection-level failure: an I/O error (including timeouts), a
    /// connection that was already broken, or a failure to select a server.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self.kind.as_ref(),
            ErrorKind::Io(..)
                | ErrorKind::ConnectionClosed { .. }
                | ErrorKind::ServerSelection { .. }
        )
    }

    /// Whether this error is the result of an I/O timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind.as_ref(), ErrorKind::Io(e) if e.kind() == std::io::ErrorKind::TimedOut)
    }

    /// Whether the acknowledgment command itself was reported as failed by the server.
    pub fn is_command_error(&self) -> bool {
        matches!(self.kind.as_ref(), ErrorKind::Command(_))
    }

    /// Whether the server accepted the acknowledgment command but rejected the write.
    pub fn is_write_error(&self) -> bool {
        matches!(self.kind.as_ref(), ErrorKind::Write(_))
    }

    /// Whether this error is a duplicate key violation reported for the write.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(
            self.kind.as_ref(),
            ErrorKind::Write(WriteFailure::WriteError(e)) if DUPLICATE_KEY_CODES.contains(&e.code)
        )
    }

    /// Gets the server-reported error code, if any.
    pub fn code(&self) -> Option<i32> {
        match self.kind.as_ref() {
            ErrorKind::Command(err) => Some(err.code),
            ErrorKind::Write(WriteFailure::WriteError(err)) => Some(err.code),
            ErrorKind::Write(WriteFailure::WriteConcernError(err)) => Some(err.code),
            _ => None,
        }
    }

    /// Returns the labels for this error.
    pub fn labels(&self) -> &[String] {
        match self.kind.as_ref() {
            ErrorKind::Command(err) => &err.labels,
            _ => &self.labels,
        }
    }

    /// Whether this error contains the specified label.
    pub fn contains_label<T: AsRef<str>>(&self, label: T) -> bool {
        self.labels()
            .iter()
            .any(|actual_label| actual_label.as_str() == label.as_ref())
    }
}

impl<E> From<E> for Error
where
    ErrorKind: From<E>,
{
    fn from(err: E) -> Self {
        Error::new(err.into(), None::<Option<String>>)
    }
}

impl From<std::io::Error> for ErrorKind {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<std::io::ErrorKind> for ErrorKind {
    fn from(err: std::io::ErrorKind) -> Self {
        Self::Io(Arc::new(err.into()))
    }
}

impl std::ops::Deref for Error {
    type Target = ErrorKind;

    fn deref(&self) -> &Self::Target {
        &self.kind
    }
}

/// The types of errors that can occur.
#[allow(missing_docs)]
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An invalid argument was provided.
    #[error("An invalid argument was provided: {message}")]
    #[non_exhaustive]
    InvalidArgument { message: String },

    /// A write could not be encoded into wire messages, e.g. because a document exceeds the
    /// server's maximum document size. Nothing was sent.
    #[error("Unable to encode write: {message}")]
    #[non_exhaustive]
    Encoding { message: String },

    /// Wrapper around `bson::ser::Error`.
    #[error("{0}")]
    BsonSerialization(crate::bson::ser::Error),

    /// Wrapper around `bson::de::Error`.
    #[error("{0}")]
    BsonDeserialization(crate::bson::de::Error),

    /// Wrapper around `bson::raw::Error`.
    #[error("{0}")]
    BsonRaw(crate::bson::raw::Error),

    /// Wrapper around [`std::io::Error`](https://doc.rust-lang.org/std/io/struct.Error.html).
    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    /// A previous I/O failure left the connection unusable.
    #[error("{message}")]
    #[non_exhaustive]
    ConnectionClosed { message: String },

    /// No server able to accept writes could be selected.
    #[error("Server selection error: {message}")]
    #[non_exhaustive]
    ServerSelection { message: String },

    /// The server returned an invalid reply.
    #[error("The server returned an invalid reply: {message}")]
    #[non_exhaustive]
    InvalidResponse { message: String },

    /// The acknowledgment command failed.
    #[error("Command failed: {0}")]
    Command(CommandError),

    /// The server rejected the write.
    #[error("An error occurred when trying to execute a write operation: {0:?}")]
    Write(WriteFailure),
}

impl From<crate::bson::ser::Error> for ErrorKind {
    fn from(err: crate::bson::ser::Error) -> Self {
        Self::BsonSerialization(err)
    }
}

impl From<crate::bson::de::Error> for ErrorKind {
    fn from(err: crate::bson::de::Error) -> Self {
        Self::BsonDeserialization(err)
    }
}

impl From<crate::bson::raw::Error> for ErrorKind {
    fn from(err: crate::bson::raw::Error) -> Self {
        Self::BsonRaw(err)
    }
}

/// An error that occurred due to a database command failing.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct CommandError {
    /// Identifies the type of error.
    pub code: i32,

    /// The name associated with the error code.
    pub code_name: String,

    /// A description of the error that occurred.
    pub message: String,

    /// The error labels that the server returned.
    pub labels: Vec<String>,
}

impl fmt::Display for CommandError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "Error code {} ({}): {}", self.code, self.code_name, self.message)
    }
}

/// An error that occurred due to not being able to satisfy a write concern.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct WriteConcernError {
    /// Identifies the type of write concern error.
    pub code: i32,

    /// A description of the error that occurred.
    pub message: String,

    /// Whether the write concern's `wtimeout` elapsed before the acknowledgment was satisfied.
    pub timed_out: bool,

    /// A document identifying the write concern setting related to the error.
    pub details: Option<Document>,
}

/// An error that occurred during a write operation that wasn't due to being unable to satisfy a
/// write concern.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct WriteError {
    /// Identifies the type of write error.
    pub code: i32,

    /// A description of the error that occurred.
    pub message: String,

    /// A document providing more information about the write error (e.g. details
    /// pertaining to document validation).
    pub details: Option<Document>,
}

/// An error that occurred when trying to execute a write operation.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum WriteFailure {
    /// An error that occurred due to not being able to satisfy a write concern.
    WriteConcernError(WriteConcernError),

    /// An error that occurred during a write operation that wasn't due to being unable to satisfy
    /// a write concern.
    WriteError(WriteError),
}
