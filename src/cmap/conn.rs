mod stream_description;
pub(crate) mod wire;

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
        Mutex as StdMutex,
        MutexGuard,
        PoisonError,
    },
};

use derive_where::derive_where;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf},
    net::TcpStream,
    sync::Mutex,
};

use self::wire::{Header, ReplyMessage};
pub use self::stream_description::StreamDescription;
use crate::{
    buffer::{BufferProvider, PooledBuffer},
    error::{Error, Result},
    options::{ConnectionOptions, ServerAddress},
    runtime,
    trace::{trace_debug, CONNECTION_TRACING_EVENT_TARGET},
};

static CONNECTION_ID: AtomicU32 = AtomicU32::new(1);

fn next_connection_id() -> u32 {
    CONNECTION_ID.fetch_add(1, Ordering::SeqCst)
}

/// An established connection to a server that writes can be sent over.
///
/// Sends are serialized: the bytes passed to one [`send_message`](Connection::send_message) call
/// are written contiguously, so the frames of one operation never interleave with another's.
/// Replies are matched to their requests by the `responseTo` field of their header rather than by
/// arrival order, so several operations may wait on the same connection at once. A reply is only
/// kept for a request registered through [`expect_reply`](Connection::expect_reply); replies
/// nobody is waiting for are discarded as soon as they are read.
#[derive_where(Debug)]
pub struct Connection<T = TcpStream> {
    id: u32,
    stream_description: StreamDescription,
    options: ConnectionOptions,

    /// Set once an I/O error or timeout has left the stream in an unknown state.
    broken: AtomicBool,

    #[derive_where(skip)]
    writer: Mutex<WriteHalf<T>>,

    #[derive_where(skip)]
    reader: Mutex<ReadHalf<T>>,

    #[derive_where(skip)]
    replies: StdMutex<PendingReplies>,
}

#[derive(Default)]
struct PendingReplies {
    /// Requests whose reply someone will collect.
    awaiting: HashSet<i32>,

    /// Replies read on behalf of other waiters, keyed by the request they answer.
    stashed: HashMap<i32, ReplyMessage>,
}

impl Connection<TcpStream> {
    /// Opens a TCP connection to the server described by `description`.
    pub async fn connect(
        description: StreamDescription,
        options: ConnectionOptions,
    ) -> Result<Self> {
        let address = &description.server_address;
        let mut last_error = None;
        for socket_addr in address.to_socket_addrs().await? {
            let attempt = runtime::timeout(options.connect_timeout, TcpStream::connect(socket_addr))
                .await
                .and_then(|connected| connected.map_err(Error::from));
            match attempt {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    return Ok(Self::new(stream, description, options));
                }
                Err(error) => last_error = Some(error),
            }
        }
        Err(last_error.unwrap_or_else(|| Error::connection_closed(address)))
    }
}

impl<T> Connection<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wraps an already-established stream.
    pub fn new(
        stream: T,
        stream_description: StreamDescription,
        options: ConnectionOptions,
    ) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        let conn = Self {
            id: next_connection_id(),
            stream_description,
            options,
            broken: AtomicBool::new(false),
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            replies: Default::default(),
        };
        trace_debug!(
            target: CONNECTION_TRACING_EVENT_TARGET,
            connection_id = conn.id,
            server_host = conn.address().host.as_str(),
            server_port = conn.address().port(),
            "Connection ready",
        );
        conn
    }

    /// Writes `bytes`, which hold one or more complete frames, as a single transmission.
    pub(crate) async fn send_message(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_usable()?;
        let mut writer = self.writer.lock().await;
        let writing = BreakOnDrop::new(&self.broken);
        let result = runtime::timeout(self.options.socket_timeout, async {
            writer.write_all(bytes).await?;
            writer.flush().await?;
            Ok::<_, Error>(())
        })
        .await
        .and_then(std::convert::identity);
        writing.disarm();
        self.check_io(result)
    }

    /// Registers interest in the reply to `request_id`. Call this before sending the request, so
    /// that the reply is kept even if another waiter reads it first.
    pub(crate) fn expect_reply(&self, request_id: i32) -> PendingReply<'_, T> {
        self.replies().awaiting.insert(request_id);
        PendingReply {
            conn: self,
            request_id,
        }
    }

    async fn receive_reply(
        &self,
        request_id: i32,
        buffers: &Arc<dyn BufferProvider>,
    ) -> Result<ReplyMessage> {
        let result = runtime::timeout(
            self.options.socket_timeout,
            self.read_until(request_id, buffers),
        )
        .await
        .and_then(std::convert::identity);
        self.check_io(result)
    }

    async fn read_until(
        &self,
        request_id: i32,
        buffers: &Arc<dyn BufferProvider>,
    ) -> Result<ReplyMessage> {
        let mut reader = self.reader.lock().await;
        if let Some(reply) = self.replies().stashed.remove(&request_id) {
            return Ok(reply);
        }
        self.ensure_usable()?;

        loop {
            // Nothing has been consumed until the first byte of a frame arrives, so giving up
            // while waiting for it leaves the stream intact.
            let first_byte = reader.read_u8().await?;
            let reading = BreakOnDrop::new(&self.broken);
            let reply = read_reply(
                &mut *reader,
                first_byte,
                buffers,
                self.stream_description.max_message_size(),
            )
            .await;
            reading.disarm();
            let reply = reply?;

            let response_to = reply.response_to();
            if response_to == request_id {
                return Ok(reply);
            }
            let mut replies = self.replies();
            if replies.awaiting.contains(&response_to) {
                trace_debug!(
                    target: CONNECTION_TRACING_EVENT_TARGET,
                    connection_id = self.id,
                    response_to,
                    awaiting = request_id,
                    "Stashed reply for another request",
                );
                replies.stashed.insert(response_to, reply);
            } else {
                trace_debug!(
                    target: CONNECTION_TRACING_EVENT_TARGET,
                    connection_id = self.id,
                    response_to,
                    "Discarded reply nobody is waiting for",
                );
            }
        }
    }

    /// Any failure mid-frame leaves the stream position unknown, so the connection is not used
    /// again after one.
    #[cfg_attr(not(feature = "tracing-unstable"), allow(unused_variables))]
    fn check_io<R>(&self, result: Result<R>) -> Result<R> {
        if let Err(ref error) = result {
            self.broken.store(true, Ordering::SeqCst);
            trace_debug!(
                target: CONNECTION_TRACING_EVENT_TARGET,
                connection_id = self.id,
                error = error.tracing_representation(),
                "Connection marked broken",
            );
        }
        result
    }
}

impl<T> Connection<T> {
    /// A process-unique identifier for this connection.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The address of the server this connection is connected to.
    pub fn address(&self) -> &ServerAddress {
        &self.stream_description.server_address
    }

    /// The limits and capabilities of the server this connection is connected to.
    pub fn stream_description(&self) -> &StreamDescription {
        &self.stream_description
    }

    /// Whether a previous I/O failure has made this connection unusable.
    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::SeqCst)
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.is_broken() {
            return Err(Error::connection_closed(self.address()));
        }
        Ok(())
    }

    fn replies(&self) -> MutexGuard<'_, PendingReplies> {
        self.replies.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Interest in the reply to one request, obtained from [`Connection::expect_reply`]. Dropping it
/// before the reply is received gives up on the reply: if it was already read on this request's
/// behalf it is released, and if it arrives later it is discarded.
pub(crate) struct PendingReply<'a, T> {
    conn: &'a Connection<T>,
    request_id: i32,
}

impl<T> PendingReply<'_, T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    pub(crate) fn request_id(&self) -> i32 {
        self.request_id
    }

    /// Waits for the reply. Reply bodies are read into buffers from `buffers`.
    pub(crate) async fn receive(self, buffers: &Arc<dyn BufferProvider>) -> Result<ReplyMessage> {
        self.conn.receive_reply(self.request_id, buffers).await
    }
}

impl<T> Drop for PendingReply<'_, T> {
    fn drop(&mut self) {
        let mut replies = self.conn.replies();
        replies.awaiting.remove(&self.request_id);
        replies.stashed.remove(&self.request_id);
    }
}

/// Marks a connection broken if dropped before [`disarm`](BreakOnDrop::disarm), i.e. if the
/// future doing I/O is cancelled partway through a frame.
struct BreakOnDrop<'a> {
    broken: &'a AtomicBool,
    armed: bool,
}

impl<'a> BreakOnDrop<'a> {
    fn new(broken: &'a AtomicBool) -> Self {
        Self {
            broken,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for BreakOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.broken.store(true, Ordering::SeqCst);
        }
    }
}

/// Reads the rest of a frame whose first byte is `first_byte`, bounding its size by
/// `max_message_size`.
async fn read_reply<R: AsyncRead + Unpin>(
    reader: &mut R,
    first_byte: u8,
    buffers: &Arc<dyn BufferProvider>,
    max_message_size: usize,
) -> Result<ReplyMessage> {
    let mut header_bytes = [0u8; Header::LENGTH];
    header_bytes[0] = first_byte;
    reader.read_exact(&mut header_bytes[1..]).await?;
    let header = Header::parse(&header_bytes)?;
    let length = usize::try_from(header.length)
        .ok()
        .filter(|length| *length >= Header::LENGTH && *length <= max_message_size)
        .ok_or_else(|| {
            Error::invalid_response(format!(
                "invalid reply length {} (maximum is {})",
                header.length, max_message_size
            ))
        })?;

    let mut body = PooledBuffer::new(buffers, length - Header::LENGTH);
    body.resize(length - Header::LENGTH, 0);
    reader.read_exact(&mut body[..]).await?;
    Ok(ReplyMessage { header, body })
}
