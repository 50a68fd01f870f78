//! Frame flag bits.
//!
//! The flags byte combines a one-hot codec selector with control bits.
//! Exactly one codec bit is set on any non-error frame; a frame with no
//! codec bit falls back to [`CODEC_NATIVE`] on the receive side.

/// Payload body is opaque bytes.
pub const CODEC_RAW: u8 = 0x01;

/// Payload body is JSON.
pub const CODEC_JSON: u8 = 0x02;

/// Payload body is MessagePack.
pub const CODEC_MSGPACK: u8 = 0x04;

/// Payload body is the language-native binary stream encoding.
pub const CODEC_NATIVE: u8 = 0x08;

/// Payload body is Protocol Buffers.
pub const CODEC_PROTO: u8 = 0x10;

/// Payload body is an error string (control bit).
pub const ERROR: u8 = 0x20;

/// Mask covering the codec selector group.
pub const CODEC_MASK: u8 = CODEC_RAW | CODEC_JSON | CODEC_MSGPACK | CODEC_NATIVE | CODEC_PROTO;

/// Check if a specific flag bit is set.
#[inline]
pub fn has_flag(flags: u8, flag: u8) -> bool {
    flags & flag != 0
}

/// Check if the frame carries an error payload.
#[inline]
pub fn is_error(flags: u8) -> bool {
    has_flag(flags, ERROR)
}

/// Human-readable name of the codec selected by `flags`, for diagnostics.
pub fn codec_name(flags: u8) -> &'static str {
    if has_flag(flags, CODEC_PROTO) {
        "proto"
    } else if has_flag(flags, CODEC_JSON) {
        "json"
    } else if has_flag(flags, CODEC_RAW) {
        "raw"
    } else if has_flag(flags, CODEC_MSGPACK) {
        "msgpack"
    } else {
        "native"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_bits_are_one_hot() {
        let bits = [CODEC_RAW, CODEC_JSON, CODEC_MSGPACK, CODEC_NATIVE, CODEC_PROTO];
        for (i, a) in bits.iter().enumerate() {
            assert_eq!(a.count_ones(), 1);
            for b in &bits[i + 1..] {
                assert_eq!(a & b, 0);
            }
        }
        assert_eq!(ERROR & CODEC_MASK, 0);
    }

    #[test]
    fn error_flag_detection() {
        assert!(is_error(ERROR));
        assert!(is_error(ERROR | CODEC_JSON));
        assert!(!is_error(CODEC_JSON));
    }

    #[test]
    fn codec_names() {
        assert_eq!(codec_name(CODEC_PROTO), "proto");
        assert_eq!(codec_name(CODEC_JSON), "json");
        assert_eq!(codec_name(CODEC_RAW), "raw");
        assert_eq!(codec_name(CODEC_MSGPACK), "msgpack");
        assert_eq!(codec_name(CODEC_NATIVE), "native");
        assert_eq!(codec_name(0), "native");
    }
}
