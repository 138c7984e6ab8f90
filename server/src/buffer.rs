//! Pooled I/O buffers.
//!
//! Fixed 64 KiB slabs on a freelist. The pool is process-wide and
//! unbounded; it grows with the peak number of in-flight pipelines and
//! contents are never zeroed between uses.

use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;

/// Size of every pooled I/O buffer.
pub const RWBUF_SIZE: usize = 64 * 1024;

/// One checked-out I/O buffer.
pub struct RwBuf {
    data: Box<[u8]>,
}

impl RwBuf {
    fn new() -> RwBuf {
        RwBuf {
            data: vec![0u8; RWBUF_SIZE].into_boxed_slice(),
        }
    }
}

impl Deref for RwBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for RwBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Freelist of [`RwBuf`]s. `get` pops from the head or allocates;
/// `put` pushes back onto the head.
pub struct BufferPool {
    free: Mutex<Vec<RwBuf>>,
}

impl BufferPool {
    pub fn new() -> BufferPool {
        BufferPool {
            free: Mutex::new(Vec::new()),
        }
    }

    /// A pool pre-filled with `reserve` buffers.
    pub fn with_reserve(reserve: usize) -> BufferPool {
        let pool = BufferPool::new();
        {
            let mut free = pool.free.lock();
            free.extend((0..reserve).map(|_| RwBuf::new()));
        }
        pool
    }

    pub fn get(&self) -> RwBuf {
        self.free.lock().pop().unwrap_or_else(RwBuf::new)
    }

    pub fn put(&self, buf: RwBuf) {
        self.free.lock().push(buf);
    }

    pub fn free_count(&self) -> usize {
        self.free.lock().len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}
