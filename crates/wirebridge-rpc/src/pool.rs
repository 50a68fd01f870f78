use std::sync::{Mutex, MutexGuard};

use wirebridge_frame::Frame;

/// How many items a pool retains; extras are dropped on return.
const POOL_CAPACITY: usize = 16;

/// Free list of frames, reset on return.
pub(crate) struct FramePool {
    free: Mutex<Vec<Frame>>,
}

impl FramePool {
    pub(crate) const fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn get(&self) -> Frame {
        lock(&self.free).pop().unwrap_or_default()
    }

    pub(crate) fn put(&self, mut frame: Frame) {
        frame.reset();
        let mut free = lock(&self.free);
        if free.len() < POOL_CAPACITY {
            free.push(frame);
        }
    }
}

/// Free list of marshalling scratch buffers, reset on return.
pub(crate) struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    pub(crate) const fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn get(&self) -> Vec<u8> {
        lock(&self.free).pop().unwrap_or_default()
    }

    pub(crate) fn put(&self, mut buf: Vec<u8>) {
        buf.clear();
        let mut free = lock(&self.free);
        if free.len() < POOL_CAPACITY {
            free.push(buf);
        }
    }
}

/// Poison-tolerant lock: pooled state is reset on return, so nothing a
/// panicked holder left behind can leak into the next user.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
