//! Body marshalling across the five interchangeable payload codecs.
//!
//! The dispatcher's body types are opaque to this crate; they opt into
//! wire representation by implementing [`Body`], usually as one-line
//! delegations to [`merge_serde`]/[`marshal_serde`] (anything serde can
//! handle: JSON, MessagePack, the native binary stream) or
//! [`merge_proto`]/[`marshal_proto`] (prost messages). Byte buffers get
//! the raw passthrough via the built-in `Vec<u8>` impl.

use serde::de::DeserializeOwned;
use serde::Serialize;
use wirebridge_frame::flags;

use crate::error::CodecError;

/// The payload codec negotiated for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireCodec {
    /// Opaque byte passthrough.
    Raw,
    /// JSON.
    Json,
    /// MessagePack, structs encoded as maps.
    Msgpack,
    /// The language-native binary stream encoding.
    Native,
    /// Protocol Buffers.
    Proto,
}

impl WireCodec {
    /// The frame flag bit announcing this codec.
    pub fn flag(self) -> u8 {
        match self {
            WireCodec::Raw => flags::CODEC_RAW,
            WireCodec::Json => flags::CODEC_JSON,
            WireCodec::Msgpack => flags::CODEC_MSGPACK,
            WireCodec::Native => flags::CODEC_NATIVE,
            WireCodec::Proto => flags::CODEC_PROTO,
        }
    }

    /// Decode the codec from a frame's flags byte, first match wins.
    /// A frame with no codec bit falls back to the native codec.
    pub fn detect(flag_byte: u8) -> Self {
        if flags::has_flag(flag_byte, flags::CODEC_PROTO) {
            WireCodec::Proto
        } else if flags::has_flag(flag_byte, flags::CODEC_JSON) {
            WireCodec::Json
        } else if flags::has_flag(flag_byte, flags::CODEC_RAW) {
            WireCodec::Raw
        } else if flags::has_flag(flag_byte, flags::CODEC_MSGPACK) {
            WireCodec::Msgpack
        } else {
            WireCodec::Native
        }
    }
}

/// A request or response body that can travel under any negotiated codec.
pub trait Body {
    /// Decode `body` (the payload with its method prefix stripped) into
    /// `self` according to `codec`.
    fn merge_from(&mut self, codec: WireCodec, body: &[u8]) -> Result<(), CodecError>;

    /// Append this body's encoding under `codec` to `buf`.
    fn marshal_to(&self, codec: WireCodec, buf: &mut Vec<u8>) -> Result<(), CodecError>;
}

/// Decode helper for serde-compatible bodies.
///
/// Raw bodies only land in byte buffers; for any other type the raw
/// codec decodes to a silent no-op.
pub fn merge_serde<T: DeserializeOwned>(
    out: &mut T,
    codec: WireCodec,
    body: &[u8],
) -> Result<(), CodecError> {
    match codec {
        WireCodec::Json => *out = serde_json::from_slice(body)?,
        WireCodec::Msgpack => *out = rmp_serde::from_slice(body)?,
        WireCodec::Native => *out = bincode::deserialize(body)?,
        WireCodec::Proto => {
            return Err(CodecError::TypeMismatch("body type is not a protobuf message"))
        }
        WireCodec::Raw => {}
    }
    Ok(())
}

/// Encode helper for serde-compatible bodies.
///
/// MessagePack structs are encoded as maps with field names; positional
/// encoding breaks peers that address fields by name.
pub fn marshal_serde<T: Serialize>(
    value: &T,
    codec: WireCodec,
    buf: &mut Vec<u8>,
) -> Result<(), CodecError> {
    match codec {
        WireCodec::Json => serde_json::to_writer(&mut *buf, value)?,
        WireCodec::Msgpack => buf.extend_from_slice(&rmp_serde::to_vec_named(value)?),
        WireCodec::Native => bincode::serialize_into(&mut *buf, value)?,
        WireCodec::Proto => {
            return Err(CodecError::TypeMismatch("body type is not a protobuf message"))
        }
        WireCodec::Raw => return Err(CodecError::RawEncode),
    }
    Ok(())
}

/// Decode helper for protobuf bodies.
pub fn merge_proto<M: prost::Message + Default>(
    out: &mut M,
    codec: WireCodec,
    body: &[u8],
) -> Result<(), CodecError> {
    match codec {
        WireCodec::Proto => {
            *out = M::decode(body)?;
            Ok(())
        }
        _ => Err(CodecError::TypeMismatch(
            "protobuf message under a non-protobuf codec",
        )),
    }
}

/// Encode helper for protobuf bodies.
pub fn marshal_proto<M: prost::Message>(
    value: &M,
    codec: WireCodec,
    buf: &mut Vec<u8>,
) -> Result<(), CodecError> {
    match codec {
        WireCodec::Proto => {
            value.encode(buf)?;
            Ok(())
        }
        WireCodec::Raw => Err(CodecError::RawEncode),
        _ => Err(CodecError::TypeMismatch(
            "protobuf message under a non-protobuf codec",
        )),
    }
}

/// Byte buffers take the raw passthrough: received bytes are appended,
/// sent bytes go on the wire untouched. Under the other codecs a byte
/// buffer is an ordinary serde value.
impl Body for Vec<u8> {
    fn merge_from(&mut self, codec: WireCodec, body: &[u8]) -> Result<(), CodecError> {
        match codec {
            WireCodec::Raw => {
                self.extend_from_slice(body);
                Ok(())
            }
            _ => merge_serde(self, codec, body),
        }
    }

    fn marshal_to(&self, codec: WireCodec, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        match codec {
            WireCodec::Raw => {
                buf.extend_from_slice(self);
                Ok(())
            }
            _ => marshal_serde(self, codec, buf),
        }
    }
}

impl Body for String {
    fn merge_from(&mut self, codec: WireCodec, body: &[u8]) -> Result<(), CodecError> {
        merge_serde(self, codec, body)
    }

    fn marshal_to(&self, codec: WireCodec, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        marshal_serde(self, codec, buf)
    }
}

impl Body for serde_json::Value {
    fn merge_from(&mut self, codec: WireCodec, body: &[u8]) -> Result<(), CodecError> {
        merge_serde(self, codec, body)
    }

    fn marshal_to(&self, codec: WireCodec, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        marshal_serde(self, codec, buf)
    }
}
