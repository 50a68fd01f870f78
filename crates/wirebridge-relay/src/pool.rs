use std::sync::Mutex;

/// How many buffers a pool retains; extras are dropped on return.
const POOL_CAPACITY: usize = 16;

/// Thread-safe free list of payload buffers, reset on return.
///
/// Receiving sizes the buffer to the wire length, so `get` hands out a
/// zero-filled buffer of exactly `len` bytes ready for `read_exact`.
pub(crate) struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    pub(crate) const fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn get(&self, len: usize) -> Vec<u8> {
        let mut buf = lock(&self.free).pop().unwrap_or_default();
        buf.resize(len, 0);
        buf
    }

    pub(crate) fn put(&self, mut buf: Vec<u8>) {
        buf.clear();
        let mut free = lock(&self.free);
        if free.len() < POOL_CAPACITY {
            free.push(buf);
        }
    }
}

/// Poison-tolerant lock: a panicked holder cannot have left a buffer list
/// in a state worth refusing.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
