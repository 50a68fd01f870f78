use wirebridge_frame::Frame;

use crate::error::Result;

/// Moves whole frames across a byte stream in both directions.
///
/// Implementations serialize each direction internally: one receive and
/// one send may run concurrently from different threads, but two sends
/// (or two receives) are mutually exclusive. The server codec holds
/// exactly one relay per connection.
pub trait Relay: Send + Sync {
    /// Write one frame: header, options, payload. Partial writes are
    /// retried until every byte is flushed or the stream fails.
    fn send(&self, frame: &Frame) -> Result<()>;

    /// Populate `frame` in place from the next frame on the stream.
    ///
    /// A clean end of stream surfaces as [`RelayError::Eof`]
    /// (dispatchers use it to terminate their loop).
    ///
    /// [`RelayError::Eof`]: crate::RelayError::Eof
    fn receive(&self, frame: &mut Frame) -> Result<()>;

    /// Close the underlying stream. Idempotent.
    fn close(&self) -> Result<()>;
}
