//! End-to-end codec scenarios over a real socket pair: a hand-rolled
//! client on one end, the server codec on the other.

use std::io::Write;
use std::os::unix::net::UnixStream;

use serde::{Deserialize, Serialize};
use wirebridge_frame::{flags, Frame};
use wirebridge_relay::{Relay, RelayError, StreamRelay};
use wirebridge_rpc::{
    marshal_serde, merge_serde, Body, CodecError, Request, Response, RpcError, ServerCodec,
    WireCodec,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
struct Greeting {
    text: String,
}

impl Body for Greeting {
    fn merge_from(&mut self, codec: WireCodec, body: &[u8]) -> Result<(), CodecError> {
        merge_serde(self, codec, body)
    }

    fn marshal_to(&self, codec: WireCodec, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        marshal_serde(self, codec, buf)
    }
}

#[derive(Clone, PartialEq, prost::Message)]
struct ProtoGreeting {
    #[prost(string, tag = "1")]
    text: String,
}

impl Body for ProtoGreeting {
    fn merge_from(&mut self, codec: WireCodec, body: &[u8]) -> Result<(), CodecError> {
        wirebridge_rpc::merge_proto(self, codec, body)
    }

    fn marshal_to(&self, codec: WireCodec, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        wirebridge_rpc::marshal_proto(self, codec, buf)
    }
}

fn request_frame(seq: u32, method: &str, body: &[u8], flag: u8) -> Frame {
    let mut frame = Frame::new();
    frame.append_options(&[seq, method.len() as u32]);
    frame.or_flags(flag);
    let mut payload = method.as_bytes().to_vec();
    payload.extend_from_slice(body);
    frame.set_payload_length(payload.len() as u32);
    frame.write_payload(&payload);
    frame.write_crc();
    frame
}

fn pair() -> (StreamRelay<UnixStream>, ServerCodec<StreamRelay<UnixStream>>) {
    let (client, server) = UnixStream::pair().unwrap();
    let client = StreamRelay::new(client).unwrap();
    let server = ServerCodec::new(StreamRelay::new(server).unwrap());
    (client, server)
}

#[test]
fn json_ping() {
    let (client, server) = pair();

    // HL = 5 (two options), payload "Svc.Ping" + "\"hi\"" = 12 bytes.
    let frame = request_frame(42, "Svc.Ping", b"\"hi\"", flags::CODEC_JSON);
    assert_eq!(frame.read_hl(), 5);
    assert_eq!(frame.read_payload_length(), 12);
    client.send(&frame).unwrap();

    let mut req = Request::default();
    server.read_request_header(&mut req).unwrap();
    assert_eq!(req.seq, 42);
    assert_eq!(req.method, "Svc.Ping");

    let mut body = String::new();
    server.read_request_body(Some(&mut body)).unwrap();
    assert_eq!(body, "hi");

    let resp = Response {
        seq: 42,
        method: req.method,
        error: None,
    };
    server
        .write_response(&resp, Some(&"hi yourself".to_string()))
        .unwrap();

    let mut answer = Frame::new();
    client.receive(&mut answer).unwrap();
    assert_eq!(answer.read_options(), vec![42, 8]);
    assert_eq!(answer.read_flags(), flags::CODEC_JSON);
    assert_eq!(&answer.payload()[8..], b"\"hi yourself\"");
}

#[test]
fn crc_poisoning_fails_validation() {
    let (client_stream, server_stream) = UnixStream::pair().unwrap();
    let server = ServerCodec::new(StreamRelay::new(server_stream).unwrap());

    let mut frame = request_frame(1, "Svc.Ping", b"\"hi\"", flags::CODEC_JSON);
    // Flip one bit inside the payload-length word, after the CRC was set.
    frame.header_mut()[6] ^= 0x04;
    let mut wire = frame.header().to_vec();
    wire.extend_from_slice(frame.payload());
    let mut client_stream = client_stream;
    client_stream.write_all(&wire).unwrap();
    drop(client_stream);

    let mut req = Request::default();
    let err = server.read_request_header(&mut req).unwrap_err();
    assert!(matches!(
        err,
        RpcError::Relay(RelayError::ValidationFailed(_))
    ));
}

#[test]
fn foreign_pollution_reports_the_diagnostic() {
    let (mut client_stream, server_stream) = UnixStream::pair().unwrap();
    let server = ServerCodec::new(StreamRelay::new(server_stream).unwrap());

    let diagnostic = b"Could not open input file: /x";
    client_stream.write_all(diagnostic).unwrap();
    drop(client_stream);

    let mut req = Request::default();
    let err = server.read_request_header(&mut req).unwrap_err();
    match err {
        RpcError::Relay(RelayError::FileNotFound(text)) => {
            assert_eq!(text.as_bytes(), diagnostic);
        }
        other => panic!("expected FileNotFound, got {other:?}"),
    }
}

#[test]
fn error_response_carries_method_and_text() {
    let (client, server) = pair();

    client
        .send(&request_frame(7, "Svc.Fail", b"null", flags::CODEC_JSON))
        .unwrap();

    let mut req = Request::default();
    server.read_request_header(&mut req).unwrap();
    server.read_request_body::<Greeting>(None).unwrap();

    let resp = Response {
        seq: 7,
        method: req.method,
        error: Some("boom".into()),
    };
    let err = server.write_response::<Greeting>(&resp, None).unwrap_err();
    assert!(matches!(err, RpcError::Service(_)));

    let mut answer = Frame::new();
    client.receive(&mut answer).unwrap();
    assert!(flags::is_error(answer.read_flags()));
    assert_eq!(answer.payload(), b"Svc.Failboom");
}

#[test]
fn codec_memory_overrides_the_bodys_own_leaning() {
    let (client, server) = pair();

    // The request arrives as MessagePack; the response body is a plain
    // serde struct that would happily encode as anything.
    let mut body_bytes = Vec::new();
    Greeting {
        text: "remember me".into(),
    }
    .marshal_to(WireCodec::Msgpack, &mut body_bytes)
    .unwrap();
    client
        .send(&request_frame(3, "Mem.Check", &body_bytes, flags::CODEC_MSGPACK))
        .unwrap();

    let mut req = Request::default();
    server.read_request_header(&mut req).unwrap();
    let mut body = Greeting::default();
    server.read_request_body(Some(&mut body)).unwrap();

    server
        .write_response(
            &Response {
                seq: 3,
                method: req.method,
                error: None,
            },
            Some(&body),
        )
        .unwrap();

    let mut answer = Frame::new();
    client.receive(&mut answer).unwrap();
    assert_eq!(answer.read_flags(), flags::CODEC_MSGPACK);
    let mut round = Greeting::default();
    round
        .merge_from(WireCodec::Msgpack, &answer.payload()[9..])
        .unwrap();
    assert_eq!(round.text, "remember me");
}

#[test]
fn interleaved_responses_resolve_by_sequence() {
    let (client, server) = pair();

    client
        .send(&request_frame(1, "A.One", b"\"one\"", flags::CODEC_JSON))
        .unwrap();
    let proto_body = {
        let mut buf = Vec::new();
        ProtoGreeting { text: "two".into() }
            .marshal_to(WireCodec::Proto, &mut buf)
            .unwrap();
        buf
    };
    client
        .send(&request_frame(2, "B.Two", &proto_body, flags::CODEC_PROTO))
        .unwrap();

    let mut first = Request::default();
    server.read_request_header(&mut first).unwrap();
    let mut one = String::new();
    server.read_request_body(Some(&mut one)).unwrap();

    let mut second = Request::default();
    server.read_request_header(&mut second).unwrap();
    let mut two = ProtoGreeting::default();
    server.read_request_body(Some(&mut two)).unwrap();

    // Respond in reverse order; each answer keeps its own codec.
    server
        .write_response(
            &Response {
                seq: 2,
                method: second.method,
                error: None,
            },
            Some(&two),
        )
        .unwrap();
    server
        .write_response(
            &Response {
                seq: 1,
                method: first.method,
                error: None,
            },
            Some(&one),
        )
        .unwrap();

    let mut answer = Frame::new();
    client.receive(&mut answer).unwrap();
    assert_eq!(answer.read_options()[0], 2);
    assert_eq!(answer.read_flags(), flags::CODEC_PROTO);
    let mut round = ProtoGreeting::default();
    round
        .merge_from(WireCodec::Proto, &answer.payload()[5..])
        .unwrap();
    assert_eq!(round.text, "two");

    client.receive(&mut answer).unwrap();
    assert_eq!(answer.read_options()[0], 1);
    assert_eq!(answer.read_flags(), flags::CODEC_JSON);
    assert_eq!(&answer.payload()[5..], b"\"one\"");
}

#[test]
fn zero_length_body_roundtrip() {
    let (client, server) = pair();

    client
        .send(&request_frame(9, "Svc.Touch", b"", flags::CODEC_JSON))
        .unwrap();

    let mut req = Request::default();
    server.read_request_header(&mut req).unwrap();
    let mut body = Greeting {
        text: "untouched".into(),
    };
    server.read_request_body(Some(&mut body)).unwrap();
    assert_eq!(body.text, "untouched");
}

#[test]
fn responses_from_worker_threads_interleave_with_reads() {
    let (client, server) = pair();
    let server = std::sync::Arc::new(server);

    let mut workers = Vec::new();
    for seq in 0..8u32 {
        client
            .send(&request_frame(seq, "Par.Do", b"\"w\"", flags::CODEC_JSON))
            .unwrap();
    }

    for _ in 0..8 {
        let mut req = Request::default();
        server.read_request_header(&mut req).unwrap();
        let mut body = String::new();
        server.read_request_body(Some(&mut body)).unwrap();

        let server = server.clone();
        workers.push(std::thread::spawn(move || {
            let resp = Response {
                seq: req.seq,
                method: req.method,
                error: None,
            };
            server.write_response(&resp, Some(&body)).unwrap();
        }));
    }
    for worker in workers {
        worker.join().unwrap();
    }

    let mut seen = std::collections::HashSet::new();
    let mut answer = Frame::new();
    for _ in 0..8 {
        client.receive(&mut answer).unwrap();
        assert_eq!(answer.read_flags(), flags::CODEC_JSON);
        seen.insert(answer.read_options()[0]);
    }
    assert_eq!(seen.len(), 8);
}
