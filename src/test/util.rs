//! An in-process stand-in for a server: it reads the frames a [`Connection`] sends over an
//! in-memory duplex stream, records them, and answers acknowledgment commands from a script.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, DuplexStream},
    task::JoinHandle,
};

use crate::{
    bson::{doc, Document},
    buffer::BufferPool,
    cmap::{
        conn::wire::{Header, OpCode, ResponseFlags},
        Connection,
        StreamDescription,
    },
    options::ConnectionOptions,
    BufferProvider,
};

const DUPLEX_CAPACITY: usize = 64 * 1024;

/// What the mock server does when it receives an acknowledgment command.
#[derive(Clone, Debug)]
pub(crate) enum ScriptedReply {
    /// Answer with an OP_REPLY holding this document.
    Reply(Document),

    /// Answer with an OP_REPLY flagged as a query failure.
    QueryFailure(Document),

    /// Never answer.
    Silent,

    /// Close the stream.
    Close,
}

impl ScriptedReply {
    pub(crate) fn ok() -> Self {
        ScriptedReply::Reply(doc! { "ok": 1.0, "err": null, "n": 0 })
    }
}

/// A frame as received by the mock server.
#[derive(Clone, Debug)]
pub(crate) struct RecordedFrame {
    pub(crate) header: Header,
    pub(crate) body: Vec<u8>,
}

impl RecordedFrame {
    pub(crate) fn op_code(&self) -> OpCode {
        self.header.op_code
    }

    pub(crate) fn request_id(&self) -> i32 {
        self.header.request_id
    }

    /// The full frame, header included, as it appeared on the wire.
    pub(crate) fn bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.header.write_to(&mut bytes);
        bytes.extend_from_slice(&self.body);
        bytes
    }

    /// The full collection name, which every request op code carries after a leading i32.
    pub(crate) fn collection_name(&self) -> String {
        let name = &self.body[4..];
        let end = name.iter().position(|b| *b == 0).unwrap();
        String::from_utf8(name[..end].to_vec()).unwrap()
    }

    fn after_name(&self) -> usize {
        4 + self.collection_name().len() + 1
    }

    /// The op code specific flags.
    pub(crate) fn flags(&self) -> i32 {
        let at = match self.op_code() {
            OpCode::Update | OpCode::Delete => self.after_name(),
            _ => 0,
        };
        i32::from_le_bytes(self.body[at..at + 4].try_into().unwrap())
    }

    /// Every document in the frame, in order.
    pub(crate) fn documents(&self) -> Vec<Document> {
        let skip = match self.op_code() {
            OpCode::Insert | OpCode::Reply => 0,
            OpCode::Update | OpCode::Delete => 4,
            OpCode::Query => 8,
        };
        let mut remaining = &self.body[self.after_name() + skip..];
        let mut documents = Vec::new();
        while !remaining.is_empty() {
            let len = i32::from_le_bytes(remaining[..4].try_into().unwrap()) as usize;
            documents.push(Document::from_reader(&remaining[..len]).unwrap());
            remaining = &remaining[len..];
        }
        documents
    }
}

/// Encodes an OP_REPLY answering `response_to`.
pub(crate) fn reply_frame(
    response_to: i32,
    flags: ResponseFlags,
    documents: &[Document],
) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&flags.bits().to_le_bytes());
    body.extend_from_slice(&0i64.to_le_bytes());
    body.extend_from_slice(&0i32.to_le_bytes());
    body.extend_from_slice(&(documents.len() as i32).to_le_bytes());
    for document in documents {
        document.to_writer(&mut body).unwrap();
    }

    let mut frame = Vec::new();
    Header {
        length: (Header::LENGTH + body.len()) as i32,
        request_id: 0,
        response_to,
        op_code: OpCode::Reply,
    }
    .write_to(&mut frame);
    frame.extend_from_slice(&body);
    frame
}

/// Reads one frame written by a [`Connection`].
pub(crate) async fn read_frame(stream: &mut DuplexStream) -> Option<RecordedFrame> {
    let mut header = [0u8; Header::LENGTH];
    stream.read_exact(&mut header).await.ok()?;
    let header = Header::parse(&header).ok()?;
    let mut body = vec![0u8; header.length as usize - Header::LENGTH];
    stream.read_exact(&mut body).await.ok()?;
    Some(RecordedFrame { header, body })
}

/// The server half of a mock connection.
pub(crate) struct MockServer {
    frames: Arc<Mutex<Vec<RecordedFrame>>>,
    task: JoinHandle<()>,
}

impl MockServer {
    /// Starts a server answering acknowledgment commands with `replies`, in order, and returns
    /// a connection to it.
    pub(crate) fn start(
        replies: impl IntoIterator<Item = ScriptedReply>,
        description: StreamDescription,
        options: ConnectionOptions,
    ) -> (Connection<DuplexStream>, MockServer) {
        let (client, mut server) = tokio::io::duplex(DUPLEX_CAPACITY);
        let frames = Arc::new(Mutex::new(Vec::new()));
        let mut replies: VecDeque<_> = replies.into_iter().collect();

        let recorded = frames.clone();
        let task = tokio::spawn(async move {
            while let Some(frame) = read_frame(&mut server).await {
                let request_id = frame.request_id();
                let is_query = frame.op_code() == OpCode::Query;
                recorded.lock().unwrap().push(frame);
                if !is_query {
                    continue;
                }
                let reply = match replies.pop_front() {
                    Some(ScriptedReply::Reply(doc)) => {
                        reply_frame(request_id, ResponseFlags::empty(), &[doc])
                    }
                    Some(ScriptedReply::QueryFailure(doc)) => {
                        reply_frame(request_id, ResponseFlags::QUERY_FAILURE, &[doc])
                    }
                    Some(ScriptedReply::Silent) | None => continue,
                    Some(ScriptedReply::Close) => return,
                };
                if server.write_all(&reply).await.is_err() {
                    return;
                }
            }
        });

        let conn = Connection::new(client, description, options);
        (conn, MockServer { frames, task })
    }

    /// Starts a server with default connection settings.
    pub(crate) fn start_default(
        replies: impl IntoIterator<Item = ScriptedReply>,
    ) -> (Connection<DuplexStream>, MockServer) {
        Self::start(
            replies,
            StreamDescription::new_testing(),
            ConnectionOptions::default(),
        )
    }

    /// The frames received so far.
    pub(crate) fn frames(&self) -> Vec<RecordedFrame> {
        self.frames.lock().unwrap().clone()
    }

    /// Waits until at least `count` frames have arrived.
    pub(crate) async fn wait_for_frames(&self, count: usize) -> Vec<RecordedFrame> {
        loop {
            let frames = self.frames();
            if frames.len() >= count {
                return frames;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A buffer pool shared between a test and the executor under test.
pub(crate) fn tracking_pool() -> (Arc<BufferPool>, Arc<dyn BufferProvider>) {
    let pool = Arc::new(BufferPool::default());
    let provider: Arc<dyn BufferProvider> = pool.clone();
    (pool, provider)
}
