//! The shared wire protocol: one receive path and one send path, used by
//! both relay implementations.

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use wirebridge_frame::{Frame, WORD};

use crate::error::RelayError;
use crate::pool::BufferPool;

/// First 12 bytes of the diagnostic a misconfigured peer prints to the
/// shared descriptor instead of a frame
/// (`"Could not open input file: ..."`).
pub(crate) const FOREIGN_OUTPUT_SENTINEL: &[u8; 12] = b"Could not op";

/// Deadline for draining a stream after a header checksum mismatch.
pub(crate) const DRAIN_DEADLINE: Duration = Duration::from_secs(2);

/// Receive one frame from `reader` into `frame`.
///
/// `arm_drain_deadline` installs a short read deadline before the
/// checksum-mismatch drain; it returns `false` on streams that cannot
/// support deadlines, in which case only the raw header is reported.
pub(crate) fn receive_into<R: Read>(
    reader: &mut R,
    frame: &mut Frame,
    pool: &BufferPool,
    arm_drain_deadline: impl FnOnce(&mut R) -> bool,
) -> Result<(), RelayError> {
    frame.reset();
    reader.read_exact(frame.header_mut()).map_err(eof_or_io)?;

    // A foreign writer on the descriptor announces itself in the first
    // bytes where a header belongs. This check is header-position
    // exclusive; payload bytes are never inspected.
    if frame.header() == FOREIGN_OUTPUT_SENTINEL.as_slice() {
        let mut rest = Vec::new();
        let _ = reader.read_to_end(&mut rest);
        let text = if rest.is_empty() {
            "file not found".to_owned()
        } else {
            let mut text = String::from_utf8_lossy(frame.header()).into_owned();
            text.push_str(&String::from_utf8_lossy(&rest));
            text
        };
        return Err(RelayError::FileNotFound(text));
    }

    let hl = frame.read_hl();
    if hl < 3 {
        return Err(RelayError::HeaderLength(hl));
    }
    if hl > 3 {
        let options_len = (hl as usize - 3) * WORD;
        let mut buf = pool.get(options_len);
        let read = reader.read_exact(&mut buf);
        if let Err(err) = read {
            pool.put(buf);
            return Err(eof_or_io(err));
        }
        frame.push_option_bytes(&buf);
        pool.put(buf);
    }

    if !frame.verify_crc() {
        // A bad header checksum almost always means the peer wrote plain
        // text (warnings, panics) to the descriptor the frames share.
        // Surface that text where the deadline machinery allows it.
        let mut tainted = frame.header().to_vec();
        if arm_drain_deadline(reader) {
            let mut rest = Vec::new();
            let _ = reader.read_to_end(&mut rest);
            tainted.extend_from_slice(&rest);
        }
        return Err(RelayError::ValidationFailed(
            String::from_utf8_lossy(&tainted).into_owned(),
        ));
    }

    let payload_len = frame.read_payload_length() as usize;
    if payload_len == 0 {
        return Ok(());
    }

    let mut buf = pool.get(payload_len);
    let read = reader.read_exact(&mut buf);
    if let Err(err) = read {
        pool.put(buf);
        return Err(eof_or_io(err));
    }
    frame.write_payload(&buf);
    pool.put(buf);
    Ok(())
}

/// Write `buf` fully, retrying partial writes, then flush.
pub(crate) fn send_buffer<W: Write>(writer: &mut W, buf: &[u8]) -> Result<(), RelayError> {
    let mut offset = 0usize;
    while offset < buf.len() {
        match writer.write(&buf[offset..]) {
            Ok(0) => return Err(RelayError::ConnectionClosed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(err) => return Err(RelayError::Io(err)),
        }
    }
    loop {
        match writer.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(err) => return Err(RelayError::Io(err)),
        }
    }
}

fn eof_or_io(err: std::io::Error) -> RelayError {
    if err.kind() == ErrorKind::UnexpectedEof {
        RelayError::Eof
    } else {
        RelayError::Io(err)
    }
}
