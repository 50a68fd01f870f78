//! Frame struct with typed header accessors.
//!
//! Header layout (all integers little-endian):
//!
//! ```text
//! byte 0: [ HL(4) | VERSION(4) ]       HL >= 3, in 32-bit words
//! byte 1: flags                        codec selector + control bits
//! bytes 2..4:  reserved, written zero
//! bytes 4..8:  payload length (u32)
//! bytes 8..12: header CRC32 (u32)      over bytes 0..8 only
//! bytes 12..:  (HL - 3) option words (u32 each)
//! ```
//!
//! The CRC covers only the fixed first 8 bytes, but the header-length
//! nibble lives inside them: any option append or field write after
//! [`Frame::write_crc`] invalidates the frame. Writing the CRC is always
//! the last header mutation before a frame goes on the wire.

use bytes::{BufMut, BytesMut};

/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 12;

/// Size of one option word in bytes.
pub const WORD: usize = 4;

/// Current protocol version.
pub const VERSION_1: u8 = 1;

/// Maximum number of option words (header-length nibble caps at 15).
pub const MAX_OPTIONS: usize = 15 - 3;

/// A single transport unit: fixed header, option words, payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Fixed header plus any appended option words.
    header: BytesMut,
    /// Opaque payload bytes.
    payload: BytesMut,
}

impl Frame {
    /// Create an empty frame: `HL = 3`, version 1, no flags, no payload.
    pub fn new() -> Self {
        let mut header = BytesMut::zeroed(HEADER_SIZE);
        header[0] = (3 << 4) | VERSION_1;
        Self {
            header,
            payload: BytesMut::new(),
        }
    }

    /// Protocol version from the low nibble of byte 0.
    #[inline]
    pub fn version(&self) -> u8 {
        self.header[0] & 0x0F
    }

    /// Write the protocol version into the low nibble of byte 0.
    #[inline]
    pub fn set_version(&mut self, version: u8) {
        self.header[0] = (self.header[0] & 0xF0) | (version & 0x0F);
    }

    /// Header length in 32-bit words, from the high nibble of byte 0.
    #[inline]
    pub fn read_hl(&self) -> u8 {
        self.header[0] >> 4
    }

    #[inline]
    fn set_hl(&mut self, hl: u8) {
        self.header[0] = (hl << 4) | (self.header[0] & 0x0F);
    }

    /// Flags byte.
    #[inline]
    pub fn read_flags(&self) -> u8 {
        self.header[1]
    }

    /// Overwrite the flags byte.
    #[inline]
    pub fn set_flags(&mut self, flags: u8) {
        self.header[1] = flags;
    }

    /// Union flag bits into the flags byte, preserving existing bits.
    #[inline]
    pub fn or_flags(&mut self, flags: u8) {
        self.header[1] |= flags;
    }

    /// Payload length field (bytes 4..8).
    #[inline]
    pub fn read_payload_length(&self) -> u32 {
        u32::from_le_bytes([
            self.header[4],
            self.header[5],
            self.header[6],
            self.header[7],
        ])
    }

    /// Write the payload length field.
    #[inline]
    pub fn set_payload_length(&mut self, len: u32) {
        self.header[4..8].copy_from_slice(&len.to_le_bytes());
    }

    /// Append option words, bumping the header-length nibble.
    ///
    /// Appending is cumulative across calls. The total option count must
    /// stay within [`MAX_OPTIONS`]; the nibble cannot represent more.
    pub fn append_options(&mut self, options: &[u32]) {
        let hl = self.read_hl() as usize + options.len();
        debug_assert!(hl <= MAX_OPTIONS + 3, "header length nibble overflow");
        for &opt in options {
            self.header.put_u32_le(opt);
        }
        self.set_hl(hl as u8);
    }

    /// Append already-encoded option words read from the wire.
    ///
    /// The header-length nibble must already account for them; this is the
    /// receive-side counterpart of [`Frame::append_options`].
    pub fn push_option_bytes(&mut self, raw: &[u8]) {
        debug_assert_eq!(raw.len() % WORD, 0);
        self.header.extend_from_slice(raw);
    }

    /// Decode the trailing option words into host integers.
    pub fn read_options(&self) -> Vec<u32> {
        self.header[HEADER_SIZE..]
            .chunks_exact(WORD)
            .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
            .collect()
    }

    /// Replace the payload with a copy of `bytes`.
    ///
    /// Does not touch the payload length field; callers set it explicitly
    /// so a received frame can reuse its wire value.
    pub fn write_payload(&mut self, bytes: &[u8]) {
        self.payload.clear();
        self.payload.extend_from_slice(bytes);
    }

    /// The payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Compute the header CRC32 over bytes 0..8 and store it in bytes 8..12.
    pub fn write_crc(&mut self) {
        let crc = crc32fast::hash(&self.header[..8]);
        self.header[8..HEADER_SIZE].copy_from_slice(&crc.to_le_bytes());
    }

    /// Recompute the header CRC32 and compare it to the stored value.
    pub fn verify_crc(&self) -> bool {
        let stored = u32::from_le_bytes([
            self.header[8],
            self.header[9],
            self.header[10],
            self.header[11],
        ]);
        crc32fast::hash(&self.header[..8]) == stored
    }

    /// The full header: fixed bytes plus option words.
    #[inline]
    pub fn header(&self) -> &[u8] {
        &self.header
    }

    /// Mutable view of the header, for filling it from the wire.
    #[inline]
    pub fn header_mut(&mut self) -> &mut [u8] {
        &mut self.header
    }

    /// Restore the empty-frame state for pool reuse.
    pub fn reset(&mut self) {
        self.header.clear();
        self.header.resize(HEADER_SIZE, 0);
        self.header[0] = (3 << 4) | VERSION_1;
        self.payload.clear();
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}
