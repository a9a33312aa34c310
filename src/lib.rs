//! This crate contains the acknowledged write path of a MongoDB client: it turns an insert,
//! update or delete into legacy wire protocol messages, optionally follows them with a
//! `getlasterror` acknowledgment command, sends the chain over a connection to the primary, and
//! translates the acknowledgment reply into a result or a typed error. It uses the [`bson`] crate
//! for BSON support and [`tokio`] for I/O.
//!
//! # Example
//! ```no_run
//! # use std::sync::Arc;
//! use mongodb_write::{
//!     bson::doc,
//!     options::{ConnectionOptions, Namespace, ServerAddress, WriteConcern, WriteRequest},
//!     Connection, PrimarySelector, ServerType, StreamDescription, WriteExecutor,
//! };
//!
//! # async fn run() -> mongodb_write::error::Result<()> {
//! let description = StreamDescription::builder()
//!     .server_address(ServerAddress::parse("localhost:27017")?)
//!     .initial_server_type(ServerType::Standalone)
//!     .build();
//! let conn = Connection::connect(description, ConnectionOptions::default()).await?;
//! let selector = PrimarySelector::new([(ServerType::Standalone, Arc::new(conn))]);
//! let executor = WriteExecutor::new(selector);
//!
//! let ns: Namespace = "db.coll".parse()?;
//! let write = WriteRequest::insert([doc! { "_id": 1, "x": 1 }]);
//! let result = executor.execute(&write, &ns, &WriteConcern::acknowledged()).await?;
//! assert_eq!(result.and_then(|r| r.n()), Some(0));
//! # Ok(())
//! # }
//! ```
//!
//! # Feature flags
//!
//! | Feature            | Description                                                              |
//! |:-------------------|:-------------------------------------------------------------------------|
//! | `tracing-unstable` | Emit [`tracing`](https://docs.rs/tracing) events for connection and write activity. The event format is not yet stable. |

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod options;

pub use ::bson;

mod bson_util;
mod buffer;
mod cmap;
mod coll;
mod concern;
pub mod error;
mod executor;
mod operation;
pub mod results;
mod runtime;
mod sdam;
mod serde_util;
#[cfg(test)]
mod test;
mod trace;

pub use crate::{
    buffer::{BufferPool, BufferProvider, PooledBuffer},
    cmap::{Connection, StreamDescription},
    executor::WriteExecutor,
    sdam::{PrimarySelector, ServerSelector, ServerType},
};
