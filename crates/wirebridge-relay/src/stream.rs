use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use bytes::BytesMut;
use tracing::trace;
use wirebridge_frame::Frame;
use wirebridge_transport::Stream;

use crate::error::{RelayError, Result};
use crate::pool::{lock, BufferPool};
use crate::relay::Relay;
use crate::wire::{receive_into, send_buffer, DRAIN_DEADLINE};

/// Relay over a single duplex socket.
///
/// The stream is cloned into a receive half and a send half so a blocked
/// receive never holds up response writers. Each half sits behind its own
/// mutex; the stream itself must tolerate one concurrent reader and one
/// concurrent writer, which sockets and pipes do.
pub struct StreamRelay<S: Stream> {
    recv: Mutex<S>,
    send: Mutex<SendHalf<S>>,
    closed: AtomicBool,
    pool: BufferPool,
}

struct SendHalf<S> {
    stream: S,
    scratch: BytesMut,
}

impl<S: Stream> StreamRelay<S> {
    /// Wrap a connected stream. Clones a second handle for the send side.
    pub fn new(stream: S) -> std::io::Result<Self> {
        let writer = stream.try_clone()?;
        Ok(Self {
            recv: Mutex::new(stream),
            send: Mutex::new(SendHalf {
                stream: writer,
                scratch: BytesMut::new(),
            }),
            closed: AtomicBool::new(false),
            pool: BufferPool::new(),
        })
    }
}

impl<S: Stream> Relay for StreamRelay<S> {
    fn send(&self, frame: &Frame) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RelayError::Closed);
        }
        let mut half = lock(&self.send);
        let SendHalf { stream, scratch } = &mut *half;
        scratch.clear();
        scratch.extend_from_slice(frame.header());
        scratch.extend_from_slice(frame.payload());
        trace!(bytes = scratch.len(), "sending frame");
        send_buffer(stream, scratch)
    }

    fn receive(&self, frame: &mut Frame) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RelayError::Closed);
        }
        let mut stream = lock(&self.recv);
        receive_into(&mut *stream, frame, &self.pool, |s| {
            s.set_read_deadline(Some(DRAIN_DEADLINE))
        })
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut half = lock(&self.send);
        match half.stream.shutdown() {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(RelayError::Io(err)),
        }
    }
}
