/// Errors from sending or receiving frames.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The peer closed the stream. Dispatcher loops terminate on this.
    #[error("end of stream")]
    Eof,

    /// A foreign writer emitted an interpreter diagnostic to the stream
    /// instead of a frame. Carries the captured text.
    #[error("peer wrote a diagnostic instead of a frame: {0}")]
    FileNotFound(String),

    /// Header CRC mismatch. Carries the raw header plus whatever tainted
    /// bytes could be drained, since the usual cause is plain text written
    /// to the descriptor the frames share.
    #[error("header checksum validation failed, stream contains: {0}")]
    ValidationFailed(String),

    /// The header-length nibble is below the 3-word minimum.
    #[error("header length {0} below the 3-word minimum")]
    HeaderLength(u8),

    /// The stream closed before a frame was fully written.
    #[error("connection closed mid-write")]
    ConnectionClosed,

    /// The relay was closed locally.
    #[error("relay closed")]
    Closed,

    /// Any other stream failure.
    #[error("relay I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
