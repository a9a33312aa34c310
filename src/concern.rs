//! Contains the types for write concerns and for resolving them into acknowledgment commands.


use std::time::Duration;

use serde::{ser::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use serde_with::skip_serializing_none;
use typed_builder::TypedBuilder;

use crate::{
    bson::serde_helpers,
    coll::Namespace,
    error::{Error, Result},
    operation::GetLastError,
    serde_util,
};

/// Specifies the level of acknowledgement requested from the server for write operations.
///
/// Exactly one mode is active at a time. An [`Acknowledged`](WriteConcern::Acknowledged) concern
/// always waits for the server's reply, even when its options request no durability guarantee;
/// only [`Unacknowledged`](WriteConcern::Unacknowledged) writes are fire-and-forget.
///
/// See the documentation [here](https://www.mongodb.com/docs/manual/reference/write-concern/) for more
/// information about write concerns.
///
/// Serialization uses the `{ w, wtimeout, j, fsync }` document form. An acknowledged concern whose
/// only durability request is `w: 0` has no distinct document form, since `{ w: 0 }` reads back as
/// [`Unacknowledged`](WriteConcern::Unacknowledged), so serializing one is an error.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(try_from = "WriteConcernDocument")]
#[non_exhaustive]
pub enum WriteConcern {
    /// Send the write and return immediately without asking the server for its outcome.
    Unacknowledged,

    /// Follow the write with an acknowledgment command carrying the given options.
    Acknowledged(AcknowledgmentOptions),
}

/// The parameters sent with the acknowledgment command of an acknowledged write.
#[skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, TypedBuilder, Serialize, Deserialize)]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct AcknowledgmentOptions {
    /// Requests acknowledgement that the operation has propagated to a specific number or variety
    /// of servers.
    pub w: Option<Acknowledgment>,

    /// Specifies a time limit for the write concern. If an operation has not propagated to the
    /// requested level within the time limit, a write concern error is returned.
    ///
    /// Note that an error being returned due to a write concern error does not imply that the
    /// write would not have finished propagating if allowed more time to finish, and the
    /// server will not roll back the writes that occurred before the timeout was reached.
    #[serde(rename = "wtimeout")]
    #[serde(serialize_with = "serde_util::serialize_duration_option_as_int_millis")]
    #[serde(deserialize_with = "serde_util::deserialize_duration_option_from_u64_millis")]
    #[serde(default)]
    pub w_timeout: Option<Duration>,

    /// Requests acknowledgement that the operation has propagated to the on-disk journal.
    #[serde(rename = "j")]
    pub journal: Option<bool>,

    /// Requests acknowledgement that the server has flushed the write to its data files.
    pub fsync: Option<bool>,
}

impl AcknowledgmentOptions {
    /// Whether no option was specified, i.e. the server's default acknowledgment applies.
    pub fn is_empty(&self) -> bool {
        self.w.is_none()
            && self.w_timeout.is_none()
            && self.journal.is_none()
            && self.fsync.is_none()
    }
}

/// The type of the `w` field in [`AcknowledgmentOptions`].
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Acknowledgment {
    /// Requires acknowledgement that the write has reached the specified number of nodes.
    Nodes(u32),

    /// Requires acknowledgement that the write has reached the majority of nodes.
    Majority,

    /// Requires acknowledgement according to the given custom write concern. See [here](https://www.mongodb.com/docs/manual/tutorial/configure-replica-set-tag-sets/#tag-sets-and-custom-write-concern-behavior)
    /// for more information.
    Custom(String),
}

impl Serialize for Acknowledgment {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Acknowledgment::Majority => serializer.serialize_str("majority"),
            Acknowledgment::Nodes(n) => serde_helpers::serialize_u32_as_i32(n, serializer),
            Acknowledgment::Custom(name) => serializer.serialize_str(name),
        }
    }
}

impl<'de> Deserialize<'de> for Acknowledgment {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum IntOrString {
            Int(u32),
            String(String),
        }
        match IntOrString::deserialize(deserializer)? {
            IntOrString::String(s) => Ok(s.into()),
            IntOrString::Int(i) => Ok(i.into()),
        }
    }
}

impl From<u32> for Acknowledgment {
    fn from(i: u32) -> Self {
        Acknowledgment::Nodes(i)
    }
}

impl From<&str> for Acknowledgment {
    fn from(s: &str) -> Self {
        if s == "majority" {
            Acknowledgment::Majority
        } else {
            Acknowledgment::Custom(s.to_string())
        }
    }
}

impl From<String> for Acknowledgment {
    fn from(s: String) -> Self {
        if s == "majority" {
            Acknowledgment::Majority
        } else {
            Acknowledgment::Custom(s)
        }
    }
}

impl Default for WriteConcern {
    fn default() -> Self {
        WriteConcern::Acknowledged(AcknowledgmentOptions::default())
    }
}

impl From<AcknowledgmentOptions> for WriteConcern {
    fn from(options: AcknowledgmentOptions) -> Self {
        WriteConcern::Acknowledged(options)
    }
}

impl From<Acknowledgment> for WriteConcern {
    fn from(w: Acknowledgment) -> Self {
        AcknowledgmentOptions::builder().w(w).build().into()
    }
}

impl WriteConcern {
    /// A `WriteConcern` that does not wait for the server.
    pub fn unacknowledged() -> Self {
        WriteConcern::Unacknowledged
    }

    /// A `WriteConcern` that waits for the server's default acknowledgment.
    pub fn acknowledged() -> Self {
        WriteConcern::default()
    }

    /// A `WriteConcern` requesting [`Acknowledgment::Nodes`].
    pub fn nodes(v: u32) -> Self {
        Acknowledgment::Nodes(v).into()
    }

    /// A `WriteConcern` requesting [`Acknowledgment::Majority`].
    pub fn majority() -> Self {
        Acknowledgment::Majority.into()
    }

    /// A `WriteConcern` with a custom acknowledgment.
    pub fn custom(s: impl AsRef<str>) -> Self {
        Acknowledgment::from(s.as_ref()).into()
    }

    /// A `WriteConcern` that waits for the write to reach the primary's journal.
    pub fn journaled() -> Self {
        AcknowledgmentOptions::builder().journal(true).build().into()
    }

    /// A `WriteConcern` that waits for the primary to flush the write to disk.
    pub fn fsynced() -> Self {
        AcknowledgmentOptions::builder().fsync(true).build().into()
    }

    /// Whether the caller wants the outcome of the write reported back.
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, WriteConcern::Acknowledged(_))
    }

    /// Validates the write concern's options.
    pub(crate) fn validate(&self) -> Result<()> {
        if let WriteConcern::Acknowledged(AcknowledgmentOptions {
            w_timeout: Some(w_timeout),
            ..
        }) = self
        {
            if w_timeout.as_millis() > i32::MAX as u128 {
                return Err(Error::invalid_argument(
                    "write concern `w_timeout` field cannot exceed i32::MAX milliseconds",
                ));
            }
        }
        Ok(())
    }

    /// Resolves this write concern into the acknowledgment command that must follow a write to
    /// `ns`, or `None` if the write is unacknowledged.
    ///
    /// The command targets `ns`'s database, not its collection.
    pub(crate) fn acknowledgment_command(&self, ns: &Namespace) -> Option<GetLastError> {
        match self {
            WriteConcern::Unacknowledged => None,
            WriteConcern::Acknowledged(options) => {
                Some(GetLastError::new(ns, options.clone()))
            }
        }
    }
}

/// The document form of a write concern, i.e. `{ w, wtimeout, j, fsync }`.
#[skip_serializing_none]
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct WriteConcernDocument {
    w: Option<Acknowledgment>,

    #[serde(rename = "wtimeout", alias = "wtimeoutMS")]
    #[serde(serialize_with = "serde_util::serialize_duration_option_as_int_millis")]
    #[serde(deserialize_with = "serde_util::deserialize_duration_option_from_u64_millis")]
    #[serde(default)]
    w_timeout: Option<Duration>,

    #[serde(rename = "j", alias = "journal")]
    journal: Option<bool>,

    fsync: Option<bool>,
}

impl WriteConcernDocument {
    /// Whether this document asks for nothing back from the server.
    fn is_unacknowledged(&self) -> bool {
        let durable = self.journal == Some(true) || self.fsync == Some(true);
        self.w == Some(Acknowledgment::Nodes(0)) && !durable
    }
}

impl Serialize for WriteConcern {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let doc = WriteConcernDocument::from(self.clone());
        if self.is_acknowledged() && doc.is_unacknowledged() {
            return Err(S::Error::custom(
                "an acknowledged write concern with w: 0 and no j or fsync cannot be serialized",
            ));
        }
        doc.serialize(serializer)
    }
}

impl TryFrom<WriteConcernDocument> for WriteConcern {
    type Error = Error;

    fn try_from(doc: WriteConcernDocument) -> Result<Self> {
        let concern = if doc.is_unacknowledged() {
            if doc.w_timeout.is_some() {
                return Err(Error::invalid_argument(
                    "an unacknowledged write concern cannot specify wtimeout",
                ));
            }
            WriteConcern::Unacknowledged
        } else {
            WriteConcern::Acknowledged(AcknowledgmentOptions {
                w: doc.w,
                w_timeout: doc.w_timeout,
                journal: doc.journal,
                fsync: doc.fsync,
            })
        };
        concern.validate()?;
        Ok(concern)
    }
}

impl From<WriteConcern> for WriteConcernDocument {
    fn from(concern: WriteConcern) -> Self {
        match concern {
            WriteConcern::Unacknowledged => WriteConcernDocument {
                w: Some(Acknowledgment::Nodes(0)),
                ..Default::default()
            },
            WriteConcern::Acknowledged(options) => WriteConcernDocument {
                w: options.w,
                w_timeout: options.w_timeout,
                journal: options.journal,
                fsync: options.fsync,
            },
        }
    }
}
