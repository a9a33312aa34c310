//! Pooled byte buffers for outbound and inbound wire messages.


use std::{
    ops::{Deref, DerefMut},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
        Mutex,
    },
};

use derive_where::derive_where;

const DEFAULT_MAX_POOLED_BUFFERS: usize = 16;

/// Released buffers larger than this are freed instead of pooled.
const MAX_RETAINED_CAPACITY: usize = 4 * 1024 * 1024;

/// Hands out byte buffers for encoding requests and reading replies, and takes them back once
/// they are no longer needed.
pub trait BufferProvider: Send + Sync + 'static {
    /// Returns an empty buffer with room for at least `capacity` bytes.
    fn acquire(&self, capacity: usize) -> Vec<u8>;

    /// Takes back a buffer previously returned by [`acquire`](BufferProvider::acquire).
    fn release(&self, buffer: Vec<u8>);
}

/// A buffer on loan from a [`BufferProvider`]. The bytes are returned to the provider when the
/// buffer is dropped, whichever path drops it.
#[derive_where(Debug)]
pub struct PooledBuffer {
    bytes: Vec<u8>,

    #[derive_where(skip)]
    provider: Arc<dyn BufferProvider>,
}

impl PooledBuffer {
    /// Borrows a buffer with room for at least `capacity` bytes from `provider`.
    pub fn new(provider: &Arc<dyn BufferProvider>, capacity: usize) -> Self {
        let mut bytes = provider.acquire(capacity);
        bytes.clear();
        Self {
            bytes,
            provider: provider.clone(),
        }
    }
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.bytes
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.bytes
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.provider.release(std::mem::take(&mut self.bytes));
    }
}

/// The default [`BufferProvider`]: keeps a bounded free list of released buffers for reuse and
/// tracks how many buffers are currently on loan.
#[derive(Debug)]
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
    max_pooled: usize,
    outstanding: AtomicUsize,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POOLED_BUFFERS)
    }
}

impl BufferPool {
    /// Creates a pool that retains at most `max_pooled` released buffers.
    pub fn new(max_pooled: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            max_pooled,
            outstanding: AtomicUsize::new(0),
        }
    }

    /// The number of buffers acquired from this pool that have not been released yet.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// The number of released buffers currently held for reuse.
    pub fn pooled(&self) -> usize {
        self.free.lock().map(|free| free.len()).unwrap_or(0)
    }
}

impl BufferProvider for BufferPool {
    fn acquire(&self, capacity: usize) -> Vec<u8> {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        let reused = self.free.lock().ok().and_then(|mut free| free.pop());
        match reused {
            Some(mut buffer) => {
                buffer.reserve(capacity);
                buffer
            }
            None => Vec::with_capacity(capacity),
        }
    }

    fn release(&self, mut buffer: Vec<u8>) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        buffer.clear();
        if let Ok(mut free) = self.free.lock() {
            if free.len() < self.max_pooled && buffer.capacity() <= MAX_RETAINED_CAPACITY {
                free.push(buffer);
            }
        }
    }
}
