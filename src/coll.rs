use std::{fmt, str::FromStr};

use serde::{de::Error as SerdeError, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// The pseudo-collection that database-level commands are addressed to.
pub(crate) const COMMAND_COLLECTION_NAME: &str = "$cmd";

const ILLEGAL_DATABASE_CHARACTERS: [char; 7] = ['/', '\\', ' ', '"', '$', '.', '\0'];

/// A struct modeling the canonical name for a collection in MongoDB.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    /// The name of the database associated with this namespace.
    pub db: String,

    /// The name of the collection this namespace corresponds to.
    pub coll: String,
}

impl Namespace {
    /// Creates a new `Namespace` from the given database and collection names.
    pub fn new(db: impl Into<String>, coll: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            coll: coll.into(),
        }
    }

    /// The namespace that commands against this namespace's database are sent to, i.e.
    /// `<db>.$cmd`.
    pub(crate) fn command_namespace(&self) -> Namespace {
        Namespace::new(self.db.clone(), COMMAND_COLLECTION_NAME)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.db.is_empty() || self.db.contains(&ILLEGAL_DATABASE_CHARACTERS[..]) {
            return Err(Error::invalid_argument(format!(
                "invalid database name: {:?}",
                self.db
            )));
        }
        if self.coll.is_empty() || self.coll.contains('\0') {
            return Err(Error::invalid_argument(format!(
                "invalid collection name: {:?}",
                self.coll
            )));
        }
        Ok(())
    }
}

impl FromStr for Namespace {
    type Err = Error;

    /// Parses `db.coll`; everything after the first `.` is the collection name.
    fn from_str(s: &str) -> Result<Self> {
        let ns = match s.split_once('.') {
            Some((db, coll)) => Namespace::new(db, coll),
            None => {
                return Err(Error::invalid_argument(format!(
                    "namespace {:?} is missing a collection name",
                    s
                )))
            }
        };
        ns.validate()?;
        Ok(ns)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}.{}", self.db, self.coll)
    }
}

impl<'de> Deserialize<'de> for Namespace {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        Self::from_str(&s).map_err(|e| D::Error::custom(format!("{}", e)))
    }
}

impl Serialize for Namespace {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
