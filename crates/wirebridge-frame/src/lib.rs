//! Self-describing binary frame container for the wirebridge transport.
//!
//! Every unit on the wire is a frame: a fixed 12-byte header (version,
//! header length, flags, payload length, header CRC32), zero or more
//! trailing 32-bit option words owned by the layer above, and an opaque
//! payload. All multi-byte integers are little-endian.
//!
//! The frame is codec-agnostic: the flags byte *names* the payload codec,
//! but encoding and decoding of payload bodies happens upstream.

pub mod flags;
pub mod frame;

pub use frame::{Frame, HEADER_SIZE, MAX_OPTIONS, VERSION_1, WORD};
