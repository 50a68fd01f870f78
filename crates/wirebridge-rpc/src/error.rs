use wirebridge_relay::RelayError;

/// Errors from payload marshalling and unmarshalling.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("msgpack encode: {0}")]
    MsgpackEncode(#[from] rmp_serde::encode::Error),

    #[error("msgpack decode: {0}")]
    MsgpackDecode(#[from] rmp_serde::decode::Error),

    #[error("native codec: {0}")]
    Native(#[from] bincode::Error),

    #[error("protobuf decode: {0}")]
    ProtoDecode(#[from] prost::DecodeError),

    #[error("protobuf encode: {0}")]
    ProtoEncode(#[from] prost::EncodeError),

    /// The caller-provided body type cannot represent the negotiated codec.
    #[error("codec type mismatch: {0}")]
    TypeMismatch(&'static str),

    /// The raw codec can only encode byte-buffer bodies.
    #[error("raw codec needs a byte-buffer body")]
    RawEncode,
}

/// Errors returned to the RPC dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// A relay failure, including end of stream.
    #[error(transparent)]
    Relay(#[from] RelayError),

    /// A structurally invalid request frame.
    #[error("invalid frame: {0}")]
    InvalidFrame(&'static str),

    /// A payload codec failure. On the write path the peer has already
    /// been sent an error frame carrying the same text.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The service-supplied error string, echoed to the peer.
    #[error("{0}")]
    Service(String),
}

impl RpcError {
    /// True when the peer closed the stream; dispatcher loops terminate
    /// on this rather than reporting a failure.
    pub fn is_eof(&self) -> bool {
        matches!(self, RpcError::Relay(RelayError::Eof))
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
