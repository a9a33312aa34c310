#[cfg(test)]
mod test;

use std::sync::Arc;
#[cfg(feature = "tracing-unstable")]
use std::time::Instant;

use derive_where::derive_where;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    buffer::{BufferPool, BufferProvider, PooledBuffer},
    cmap::Connection,
    coll::Namespace,
    concern::WriteConcern,
    error::Result,
    operation::{WriteOperation, WriteRequest},
    results::CommandResult,
    sdam::ServerSelector,
    trace::{trace_debug, COMMAND_TRACING_EVENT_TARGET},
};

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Executes writes against the server a [`ServerSelector`] picks as primary.
///
/// Each call to [`execute`](WriteExecutor::execute) encodes the write and its acknowledgment
/// command into one outbound buffer, sends the whole chain at once, and, if the write concern asks
/// for acknowledgment, waits for the reply to the acknowledgment command. Buffers come from the
/// executor's [`BufferProvider`] and are returned to it before the call completes, whatever the
/// outcome.
#[derive_where(Debug; S: std::fmt::Debug)]
pub struct WriteExecutor<S> {
    selector: S,

    #[derive_where(skip)]
    buffers: Arc<dyn BufferProvider>,
}

impl<S: ServerSelector> WriteExecutor<S> {
    /// Creates an executor that allocates its buffers from a default [`BufferPool`].
    pub fn new(selector: S) -> Self {
        Self::with_buffer_provider(selector, Arc::new(BufferPool::default()))
    }

    /// Creates an executor that allocates its buffers from `buffers`.
    pub fn with_buffer_provider(selector: S, buffers: Arc<dyn BufferProvider>) -> Self {
        Self { selector, buffers }
    }

    /// The selector used to pick the connection for each write.
    pub fn selector(&self) -> &S {
        &self.selector
    }

    /// Executes `write` against `ns` with the given write concern.
    ///
    /// Returns `Ok(None)` once the write has been sent if `write_concern` is unacknowledged, and
    /// otherwise the server's acknowledgment of it. No retries are attempted.
    pub async fn execute(
        &self,
        write: &WriteRequest,
        ns: &Namespace,
        write_concern: &WriteConcern,
    ) -> Result<Option<CommandResult>> {
        let op = WriteOperation::new(ns, write, write_concern)?;
        let conn = self.selector.select_primary().await?;
        self.execute_on_connection(&op, &conn).await
    }

    #[cfg_attr(not(feature = "tracing-unstable"), allow(unused_variables))]
    pub(crate) async fn execute_on_connection<T>(
        &self,
        op: &WriteOperation<'_>,
        conn: &Connection<T>,
    ) -> Result<Option<CommandResult>>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        #[cfg(feature = "tracing-unstable")]
        let start = Instant::now();

        let result = self.send_and_receive(op, conn).await;
        if let Err(ref error) = result {
            trace_debug!(
                target: COMMAND_TRACING_EVENT_TARGET,
                namespace = %op.namespace(),
                connection_id = conn.id(),
                duration_ms = start.elapsed().as_millis() as u64,
                failure = error.tracing_representation(),
                "Write failed",
            );
        }
        result
    }

    #[cfg_attr(not(feature = "tracing-unstable"), allow(unused_variables))]
    async fn send_and_receive<T>(
        &self,
        op: &WriteOperation<'_>,
        conn: &Connection<T>,
    ) -> Result<Option<CommandResult>>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let mut buffer = PooledBuffer::new(&self.buffers, INITIAL_BUFFER_CAPACITY);
        let messages = op.encode(conn.stream_description(), &mut buffer)?;
        let awaited_request_id = messages
            .last()
            .filter(|message| message.expects_reply)
            .map(|message| message.request_id);
        trace_debug!(
            target: COMMAND_TRACING_EVENT_TARGET,
            namespace = %op.namespace(),
            frames = messages.len(),
            bytes = buffer.len(),
            acknowledged = awaited_request_id.is_some(),
            "Write encoded",
        );

        let pending = awaited_request_id.map(|request_id| conn.expect_reply(request_id));
        let sent = conn.send_message(&buffer).await;
        drop(buffer);
        sent?;
        trace_debug!(
            target: COMMAND_TRACING_EVENT_TARGET,
            namespace = %op.namespace(),
            connection_id = conn.id(),
            request_id = messages.first().map(|message| message.request_id),
            "Write sent",
        );

        let (Some(pending), Some(acknowledgment)) = (pending, op.acknowledgment()) else {
            return Ok(None);
        };

        let request_id = pending.request_id();
        let reply = pending.receive(&self.buffers).await?;
        trace_debug!(
            target: COMMAND_TRACING_EVENT_TARGET,
            namespace = %acknowledgment.namespace(),
            connection_id = conn.id(),
            request_id,
            reply_bytes = reply.body.len(),
            "Acknowledgment received",
        );
        acknowledgment
            .handle_response(&reply, conn.address())
            .map(Some)
    }
}
