//! Selection of the server that writes are sent to.

#[cfg(test)]
mod test;

use std::{future::Future, sync::Arc};

use derive_where::derive_where;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    sync::RwLock,
};

use crate::{
    cmap::Connection,
    error::{Error, Result},
};

/// Enum representing the possible types of servers that the driver can connect to.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
#[non_exhaustive]
pub enum ServerType {
    /// A single, non-replica set mongod.
    Standalone,

    /// A router used in sharded deployments.
    Mongos,

    /// The primary node in a replica set.
    RsPrimary,

    /// A secondary node in a replica set.
    RsSecondary,

    /// A non-data bearing node in a replica set which can participate in elections.
    RsArbiter,

    /// Hidden, starting up, or recovering nodes in a replica set.
    RsOther,

    /// A member of an uninitialized replica set or a member that has been removed from the replica
    /// set config.
    RsGhost,

    /// A server that the driver hasn't yet communicated with or can't connect to.
    #[default]
    Unknown,
}

impl ServerType {
    /// Whether a server of this type accepts writes.
    pub fn is_writable(self) -> bool {
        matches!(
            self,
            ServerType::Standalone | ServerType::RsPrimary | ServerType::Mongos
        )
    }
}

/// Provides connections to the server that writes should currently be sent to.
pub trait ServerSelector: Send + Sync {
    /// The stream type of the connections this selector hands out.
    type Stream: AsyncRead + AsyncWrite + Send + 'static;

    /// Returns a connection to a server able to accept writes, or a
    /// [`ServerSelection`](crate::error::ErrorKind::ServerSelection) error if there is none.
    fn select_primary(
        &self,
    ) -> impl Future<Output = Result<Arc<Connection<Self::Stream>>>> + Send;
}

/// A [`ServerSelector`] over a fixed set of candidate connections, each tagged with the type of
/// server it is connected to. The first writable candidate whose connection is still usable is
/// selected.
#[derive_where(Debug)]
pub struct PrimarySelector<T = TcpStream> {
    candidates: RwLock<Vec<(ServerType, Arc<Connection<T>>)>>,
}

impl<T> PrimarySelector<T> {
    /// Creates a selector over `candidates`.
    pub fn new(candidates: impl IntoIterator<Item = (ServerType, Arc<Connection<T>>)>) -> Self {
        Self {
            candidates: RwLock::new(candidates.into_iter().collect()),
        }
    }

    /// Replaces the candidate set, e.g. after the primary changed.
    pub async fn set_candidates(
        &self,
        candidates: impl IntoIterator<Item = (ServerType, Arc<Connection<T>>)>,
    ) {
        *self.candidates.write().await = candidates.into_iter().collect();
    }
}

impl<T> ServerSelector for PrimarySelector<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    type Stream = T;

    async fn select_primary(&self) -> Result<Arc<Connection<T>>> {
        let candidates = self.candidates.read().await;
        candidates
            .iter()
            .find(|(server_type, conn)| server_type.is_writable() && !conn.is_broken())
            .map(|(_, conn)| conn.clone())
            .ok_or_else(|| {
                Error::server_selection(format!(
                    "no writable server available among {} candidate(s)",
                    candidates.len()
                ))
            })
    }
}
