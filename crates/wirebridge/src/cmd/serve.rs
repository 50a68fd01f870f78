use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};
use wirebridge_relay::StreamRelay;
use wirebridge_rpc::{marshal_serde, Body, CodecError, Request, Response, ServerCodec, WireCodec};
use wirebridge_transport::{TcpTransport, UdsListener, WireStream};

use crate::cmd::ServeArgs;
use crate::exit::{transport_error, CliError, CliResult, SUCCESS};

enum Listener {
    Uds(UdsListener),
    Tcp(TcpTransport),
}

impl Listener {
    fn accept(&self) -> wirebridge_transport::Result<WireStream> {
        match self {
            Listener::Uds(listener) => listener.accept(),
            Listener::Tcp(transport) => transport.accept(),
        }
    }
}

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let listener = match &args.tcp {
        Some(addr) => Listener::Tcp(
            TcpTransport::bind(addr.as_str()).map_err(|err| transport_error("bind failed", err))?,
        ),
        None => Listener::Uds(
            UdsListener::bind(&args.path).map_err(|err| transport_error("bind failed", err))?,
        ),
    };

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    while running.load(Ordering::SeqCst) {
        let stream = match listener.accept() {
            Ok(stream) => stream,
            Err(err) => return Err(transport_error("accept failed", err)),
        };
        if let Some((uid, gid, pid)) = stream.peer_credentials() {
            debug!(uid, gid, pid, "peer connected");
        }
        std::thread::spawn(move || serve_connection(stream));
    }

    Ok(SUCCESS)
}

fn serve_connection(stream: WireStream) {
    let relay = match StreamRelay::new(stream) {
        Ok(relay) => relay,
        Err(err) => {
            warn!(%err, "relay setup failed");
            return;
        }
    };
    let codec = ServerCodec::new(relay);

    loop {
        let mut req = Request::default();
        match codec.read_request_header(&mut req) {
            Ok(()) => {}
            Err(err) if err.is_eof() => {
                info!("peer disconnected");
                break;
            }
            Err(err) => {
                warn!(%err, "request read failed");
                break;
            }
        }

        let mut body = EchoBody::default();
        let resp = match codec.read_request_body(Some(&mut body)) {
            Ok(()) => {
                debug!(seq = req.seq, method = %req.method, bytes = body.0.len(), "echoing");
                Response {
                    seq: req.seq,
                    method: req.method.clone(),
                    error: None,
                }
            }
            Err(err) => Response {
                seq: req.seq,
                method: req.method.clone(),
                error: Some(err.to_string()),
            },
        };

        // A service error returns through write_response after the error
        // frame is on the wire; the connection itself stays usable.
        let sent = if resp.error.is_none() && req.method == "ping" {
            codec.write_response(&resp, Some(&PongBody))
        } else {
            codec.write_response(&resp, Some(&body))
        };
        match sent {
            Ok(()) => {}
            Err(err) if resp.error.is_some() => {
                debug!(%err, seq = req.seq, "reported request failure to peer");
            }
            Err(err) => {
                warn!(%err, "response write failed");
                break;
            }
        }
    }

    let _ = codec.close();
}

/// Demo body for the echo service: captures the request bytes as they
/// arrived and replays them, whatever the negotiated codec.
#[derive(Default)]
struct EchoBody(Vec<u8>);

impl Body for EchoBody {
    fn merge_from(&mut self, _codec: WireCodec, body: &[u8]) -> Result<(), CodecError> {
        self.0.extend_from_slice(body);
        Ok(())
    }

    fn marshal_to(&self, _codec: WireCodec, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.extend_from_slice(&self.0);
        Ok(())
    }
}

/// Answer to a `ping` request: the string `"pong"`, encoded under the
/// request's codec (literal bytes for the raw passthrough).
struct PongBody;

impl Body for PongBody {
    fn merge_from(&mut self, _codec: WireCodec, _body: &[u8]) -> Result<(), CodecError> {
        Ok(())
    }

    fn marshal_to(&self, codec: WireCodec, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        match codec {
            WireCodec::Raw => {
                buf.extend_from_slice(b"pong");
                Ok(())
            }
            _ => marshal_serde(&"pong", codec, buf),
        }
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
