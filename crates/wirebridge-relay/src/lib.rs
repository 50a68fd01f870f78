//! Frame shipping over blocking byte streams.
//!
//! A relay moves whole [`Frame`](wirebridge_frame::Frame)s across a byte
//! stream in both directions and validates each incoming header before the
//! payload is trusted. Two implementations cover the transports in use:
//!
//! - [`StreamRelay`]: one duplex socket (Unix-domain or TCP), cloned into
//!   a receive half and a send half so one reader and one writer can run
//!   concurrently.
//! - [`PipeRelay`]: separate read and write halves, for peers attached
//!   via pipe pairs (child-process stdio).
//!
//! Both serialize each direction internally; two sends never interleave.
//!
//! The receive path carries a defensive check for streams shared with
//! unstructured output: a peer that prints an interpreter diagnostic to
//! the descriptor instead of a frame is detected by its first bytes and
//! surfaced as [`RelayError::FileNotFound`] with the captured text.

pub mod error;
pub mod pipe;
pub mod relay;
pub mod stream;

mod pool;
mod wire;

pub use error::{RelayError, Result};
pub use pipe::PipeRelay;
pub use relay::Relay;
pub use stream::StreamRelay;
