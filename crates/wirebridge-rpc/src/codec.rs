//! The server codec: paired request reads, codec-remembering response
//! writes, error frames.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::{debug, trace};
use wirebridge_frame::{flags, Frame, VERSION_1};
use wirebridge_relay::Relay;

use crate::body::{Body, WireCodec};
use crate::error::{Result, RpcError};
use crate::pool::{lock, BufferPool, FramePool};

/// An incoming request's routing envelope, filled by
/// [`ServerCodec::read_request_header`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Request {
    /// Dispatcher-assigned sequence number correlating the response.
    pub seq: u64,
    /// Service method name, e.g. `"Svc.Ping"`.
    pub method: String,
}

/// An outgoing response's envelope, supplied by the dispatcher.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Response {
    /// Sequence number of the request being answered.
    pub seq: u64,
    /// Method name echoed into the payload prefix.
    pub method: String,
    /// Service error; when set, an error frame is sent instead of a body.
    pub error: Option<String>,
}

/// Bridges an RPC dispatcher to a relay.
///
/// One codec per connection. The dispatcher may overlap a
/// `read_request_header`/`read_request_body` pair with `write_response`
/// calls for other sequence numbers from other threads; the two read
/// calls themselves must stay strictly paired.
pub struct ServerCodec<R: Relay> {
    relay: R,
    /// Negotiated codec per in-flight request, inserted at header read,
    /// removed at response write.
    pending: Mutex<HashMap<u64, WireCodec>>,
    /// The frame bridging a header read to its paired body read.
    inflight: Mutex<Option<Frame>>,
    frames: FramePool,
    buffers: BufferPool,
    closed: AtomicBool,
}

impl<R: Relay> ServerCodec<R> {
    /// Wrap a relay. The codec takes ownership; [`close`](Self::close)
    /// tears the relay down.
    pub fn new(relay: R) -> Self {
        Self {
            relay,
            pending: Mutex::new(HashMap::new()),
            inflight: Mutex::new(None),
            frames: FramePool::new(),
            buffers: BufferPool::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Receive the next request and fill in its envelope.
    ///
    /// Expects exactly two option words: `[sequence, method length]`.
    /// The received frame is retained for the paired
    /// [`read_request_body`](Self::read_request_body) call, and the
    /// request's codec flag is remembered until the matching
    /// [`write_response`](Self::write_response).
    pub fn read_request_header(&self, req: &mut Request) -> Result<()> {
        let mut frame = self.frames.get();
        if let Err(err) = self.relay.receive(&mut frame) {
            self.frames.put(frame);
            return Err(err.into());
        }

        let opts = frame.read_options();
        if opts.len() != 2 {
            self.frames.put(frame);
            return Err(RpcError::InvalidFrame(
                "expected two options: sequence and method length",
            ));
        }
        let method_len = opts[1] as usize;
        if method_len > frame.payload().len() {
            self.frames.put(frame);
            return Err(RpcError::InvalidFrame("method length exceeds payload"));
        }
        let method = match std::str::from_utf8(&frame.payload()[..method_len]) {
            Ok(method) => method.to_owned(),
            Err(_) => {
                self.frames.put(frame);
                return Err(RpcError::InvalidFrame("method name is not valid utf-8"));
            }
        };

        req.seq = u64::from(opts[0]);
        req.method = method;

        let codec = WireCodec::detect(frame.read_flags());
        lock(&self.pending).insert(req.seq, codec);
        trace!(seq = req.seq, method = %req.method, codec = ?codec, "request header");

        *lock(&self.inflight) = Some(frame);
        Ok(())
    }

    /// Decode the retained request's body into `out` per the request's
    /// codec flag. Always returns the retained frame to the pool.
    ///
    /// `None` skips decoding; an empty body succeeds for every codec.
    pub fn read_request_body<B: Body>(&self, out: Option<&mut B>) -> Result<()> {
        let Some(frame) = lock(&self.inflight).take() else {
            return Err(RpcError::InvalidFrame("no request pending a body read"));
        };
        let decoded = Self::decode_body(&frame, out);
        self.frames.put(frame);
        decoded
    }

    fn decode_body<B: Body>(frame: &Frame, out: Option<&mut B>) -> Result<()> {
        let Some(out) = out else {
            return Ok(());
        };
        // Option count was validated by the paired header read.
        let opts = frame.read_options();
        let body = &frame.payload()[opts[1] as usize..];
        if body.is_empty() {
            return Ok(());
        }
        let codec = WireCodec::detect(frame.read_flags());
        out.merge_from(codec, body)?;
        Ok(())
    }

    /// Serialize `body` under the codec remembered for `resp.seq` and
    /// send it; the payload is the method name followed by the body.
    ///
    /// A set `resp.error` (and any marshalling failure) is sent to the
    /// peer as an error frame and returned to the caller as well. If the
    /// request was never fully read, the codec falls back to the native
    /// encoding.
    pub fn write_response<B: Body>(&self, resp: &Response, body: Option<&B>) -> Result<()> {
        let mut frame = self.frames.get();
        frame.append_options(&[resp.seq as u32, resp.method.len() as u32]);
        frame.set_version(VERSION_1);

        // Load-and-delete: the entry is not needed once the response
        // carries the codec bit.
        let codec = lock(&self.pending)
            .remove(&resp.seq)
            .unwrap_or(WireCodec::Native);
        frame.or_flags(codec.flag());

        if let Some(message) = resp.error.as_deref().filter(|e| !e.is_empty()) {
            self.send_error_frame(&mut frame, &resp.method, message);
            self.frames.put(frame);
            return Err(RpcError::Service(message.to_owned()));
        }

        let mut buf = self.buffers.get();
        buf.extend_from_slice(resp.method.as_bytes());
        let marshalled = match body {
            Some(body) => body.marshal_to(codec, &mut buf),
            None => Ok(()),
        };
        if let Err(err) = marshalled {
            self.send_error_frame(&mut frame, &resp.method, &err.to_string());
            self.buffers.put(buf);
            self.frames.put(frame);
            return Err(err.into());
        }

        frame.set_payload_length(buf.len() as u32);
        frame.write_payload(&buf);
        frame.write_crc();
        let sent = self.relay.send(&frame);

        self.buffers.put(buf);
        self.frames.put(frame);
        sent.map_err(Into::into)
    }

    /// Send an error frame: ERROR flag replaces the codec bits, payload
    /// is the method name followed by the message text. Send failures
    /// are swallowed; the peer will notice on its next receive.
    fn send_error_frame(&self, frame: &mut Frame, method: &str, message: &str) {
        let mut buf = self.buffers.get();
        buf.extend_from_slice(method.as_bytes());
        buf.extend_from_slice(message.as_bytes());

        frame.set_flags(flags::ERROR);
        frame.set_payload_length(buf.len() as u32);
        frame.write_payload(&buf);
        frame.write_crc();

        if let Err(err) = self.relay.send(frame) {
            debug!(%err, "error frame could not be delivered");
        }
        self.buffers.put(buf);
    }

    /// Close the underlying relay. Idempotent.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.relay.close().map_err(Into::into)
    }
}
