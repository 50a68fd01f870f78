use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use bytes::BytesMut;
use wirebridge_frame::Frame;

use crate::error::{RelayError, Result};
use crate::pool::{lock, BufferPool};
use crate::relay::Relay;
use crate::wire::{receive_into, send_buffer};

/// Relay over separate read and write halves, typically a pipe pair to a
/// child process (its stdout is our read half, its stdin our write half).
///
/// Pipes carry no read deadlines, so the checksum-mismatch recovery path
/// reports the raw header only instead of draining the stream. `close`
/// flushes the write half and marks the relay closed; the descriptors are
/// released when the relay is dropped.
pub struct PipeRelay<R, W> {
    recv: Mutex<R>,
    send: Mutex<SendHalf<W>>,
    closed: AtomicBool,
    pool: BufferPool,
}

struct SendHalf<W> {
    writer: W,
    scratch: BytesMut,
}

impl<R: Read + Send, W: Write + Send> PipeRelay<R, W> {
    /// Wrap a read half and a write half.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            recv: Mutex::new(reader),
            send: Mutex::new(SendHalf {
                writer,
                scratch: BytesMut::new(),
            }),
            closed: AtomicBool::new(false),
            pool: BufferPool::new(),
        }
    }

    /// Recover the underlying halves, e.g. to inspect written bytes.
    pub fn into_parts(self) -> (R, W) {
        (
            self.recv.into_inner().unwrap_or_else(|p| p.into_inner()),
            self.send
                .into_inner()
                .unwrap_or_else(|p| p.into_inner())
                .writer,
        )
    }
}

impl<R: Read + Send, W: Write + Send> Relay for PipeRelay<R, W> {
    fn send(&self, frame: &Frame) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RelayError::Closed);
        }
        let mut half = lock(&self.send);
        let SendHalf { writer, scratch } = &mut *half;
        scratch.clear();
        scratch.extend_from_slice(frame.header());
        scratch.extend_from_slice(frame.payload());
        send_buffer(writer, scratch)
    }

    fn receive(&self, frame: &mut Frame) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RelayError::Closed);
        }
        let mut reader = lock(&self.recv);
        receive_into(&mut *reader, frame, &self.pool, |_| false)
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut half = lock(&self.send);
        half.writer.flush().map_err(RelayError::Io)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use wirebridge_frame::{flags, Frame};

    use super::*;

    fn encode(frame: &Frame) -> Vec<u8> {
        let mut wire = frame.header().to_vec();
        wire.extend_from_slice(frame.payload());
        wire
    }

    fn request_frame(seq: u32, method: &str, body: &[u8], codec: u8) -> Frame {
        let mut frame = Frame::new();
        frame.append_options(&[seq, method.len() as u32]);
        frame.or_flags(codec);
        let mut payload = method.as_bytes().to_vec();
        payload.extend_from_slice(body);
        frame.set_payload_length(payload.len() as u32);
        frame.write_payload(&payload);
        frame.write_crc();
        frame
    }

    #[test]
    fn sent_bytes_decode_back() {
        let relay = PipeRelay::new(Cursor::new(Vec::new()), Vec::new());
        let frame = request_frame(3, "Stats.Get", b"\x92\x01\x02", flags::CODEC_MSGPACK);
        relay.send(&frame).unwrap();

        let (_, written) = relay.into_parts();
        let echo = PipeRelay::new(Cursor::new(written), Vec::new());
        let mut received = Frame::new();
        echo.receive(&mut received).unwrap();

        assert_eq!(received.read_options(), vec![3, 9]);
        assert_eq!(received.read_flags(), flags::CODEC_MSGPACK);
        assert_eq!(received.payload(), frame.payload());
    }

    #[test]
    fn maximum_option_count_roundtrips() {
        let options: Vec<u32> = (100..112).collect();
        let mut frame = Frame::new();
        frame.append_options(&options);
        frame.write_crc();
        assert_eq!(frame.read_hl(), 15);

        let relay = PipeRelay::new(Cursor::new(Vec::new()), Vec::new());
        relay.send(&frame).unwrap();
        let (_, written) = relay.into_parts();

        let echo = PipeRelay::new(Cursor::new(written), Vec::new());
        let mut received = Frame::new();
        echo.receive(&mut received).unwrap();
        assert_eq!(received.read_options(), options);
    }

    #[test]
    fn receive_from_empty_pipe_is_eof() {
        let relay = PipeRelay::new(Cursor::new(Vec::new()), Vec::new());
        let mut frame = Frame::new();
        assert!(matches!(relay.receive(&mut frame), Err(RelayError::Eof)));
    }

    #[test]
    fn checksum_mismatch_reports_header_only() {
        let mut frame = request_frame(1, "A.B", b"x", flags::CODEC_RAW);
        frame.header_mut()[4] ^= 0x10;
        let mut wire = encode(&frame);
        wire.extend_from_slice(b"trailing text the pipe cannot drain under a deadline");

        let relay = PipeRelay::new(Cursor::new(wire), Vec::new());
        let mut received = Frame::new();
        let err = relay.receive(&mut received).unwrap_err();
        match err {
            RelayError::ValidationFailed(text) => {
                assert!(
                    !text.contains("trailing text"),
                    "pipe relay must not drain: {text}"
                );
            }
            other => panic!("expected ValidationFailed, got {other:?}"),
        }
    }

    #[test]
    fn foreign_diagnostic_detected_on_pipe() {
        let wire = b"Could not open input file: worker.php".to_vec();
        let relay = PipeRelay::new(Cursor::new(wire.clone()), Vec::new());

        let mut frame = Frame::new();
        let err = relay.receive(&mut frame).unwrap_err();
        match err {
            RelayError::FileNotFound(text) => assert_eq!(text.as_bytes(), &wire[..]),
            other => panic!("expected FileNotFound, got {other:?}"),
        }
    }

    #[test]
    fn partial_writers_are_retried_to_completion() {
        struct TrickleWriter(Vec<u8>);
        impl Write for TrickleWriter {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                if buf.is_empty() {
                    return Ok(0);
                }
                self.0.push(buf[0]);
                Ok(1)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let relay = PipeRelay::new(Cursor::new(Vec::new()), TrickleWriter(Vec::new()));
        let frame = request_frame(9, "Echo.Echo", b"payload", flags::CODEC_RAW);
        relay.send(&frame).unwrap();

        let (_, writer) = relay.into_parts();
        assert_eq!(writer.0, encode(&frame));
    }

    #[test]
    fn close_flushes_and_is_idempotent() {
        let relay = PipeRelay::new(Cursor::new(Vec::new()), Vec::new());
        relay.close().unwrap();
        relay.close().unwrap();
        let frame = Frame::new();
        assert!(matches!(relay.send(&frame), Err(RelayError::Closed)));
    }
}
