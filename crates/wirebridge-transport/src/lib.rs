//! Byte-stream transports for the wirebridge relay.
//!
//! The relay moves frames over any bidirectional byte stream. This crate
//! supplies the streams: Unix domain sockets and TCP sockets behind the
//! [`WireStream`] wrapper, plus the [`Stream`] capability trait the relay
//! needs (read deadlines for its corruption-recovery path, shutdown,
//! handle cloning). Pipe pairs skip this crate entirely; the relay accepts
//! any `Read`/`Write` halves for those.

pub mod error;
pub mod stream;
pub mod tcp;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use stream::{Stream, WireStream};
pub use tcp::TcpTransport;

#[cfg(unix)]
pub use uds::UdsListener;
