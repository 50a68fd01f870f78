//! Server-side RPC codec over the wirebridge relay.
//!
//! Bridges an external RPC dispatcher (sequence-numbered method
//! invocations with arbitrary body types) to a byte stream. The peer
//! picks a payload codec per request (raw bytes, JSON, MessagePack, the
//! native binary stream, or Protocol Buffers); the codec remembers that
//! choice by sequence number and answers in kind, so concurrent in-flight
//! requests each get responses in their own negotiated format.
//!
//! The dispatcher drives four operations: [`ServerCodec::read_request_header`],
//! [`ServerCodec::read_request_body`] (always paired with the header read),
//! [`ServerCodec::write_response`] (any thread, any order), and
//! [`ServerCodec::close`].

pub mod body;
pub mod codec;
pub mod error;

mod pool;

pub use body::{
    marshal_proto, marshal_serde, merge_proto, merge_serde, Body, WireCodec,
};
pub use codec::{Request, Response, ServerCodec};
pub use error::{CodecError, Result, RpcError};
