use std::fs;
use std::time::Duration;

use wirebridge_frame::{flags, Frame};
use wirebridge_relay::{Relay, StreamRelay};
use wirebridge_transport::{Stream, TcpTransport, UdsListener, WireStream};

use crate::cmd::CallArgs;
use crate::exit::{
    io_error, relay_error, transport_error, CliError, CliResult, REMOTE_ERROR, SUCCESS, USAGE,
};
use crate::output::{print_response, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let (body, codec_flag) = resolve_payload(&args)?;

    let mut stream = connect(&args)?;
    stream
        .set_write_timeout(Some(timeout))
        .map_err(|err| io_error("set write timeout", err))?;
    stream.set_read_deadline(Some(timeout));
    let relay =
        StreamRelay::new(stream).map_err(|err| io_error("relay setup failed", err))?;

    relay
        .send(&request_frame(1, &args.method, &body, codec_flag))
        .map_err(|err| relay_error("send failed", err))?;

    let mut answer = Frame::new();
    relay
        .receive(&mut answer)
        .map_err(|err| relay_error("receive failed", err))?;
    print_response(&answer, format);

    if flags::is_error(answer.read_flags()) {
        return Ok(REMOTE_ERROR);
    }
    Ok(SUCCESS)
}

fn connect(args: &CallArgs) -> CliResult<WireStream> {
    match &args.tcp {
        Some(addr) => {
            TcpTransport::connect(addr.as_str()).map_err(|err| transport_error("connect failed", err))
        }
        None => UdsListener::connect(&args.path).map_err(|err| transport_error("connect failed", err)),
    }
}

fn request_frame(seq: u32, method: &str, body: &[u8], codec_flag: u8) -> Frame {
    let mut frame = Frame::new();
    frame.append_options(&[seq, method.len() as u32]);
    frame.or_flags(codec_flag);
    let mut payload = method.as_bytes().to_vec();
    payload.extend_from_slice(body);
    frame.set_payload_length(payload.len() as u32);
    frame.write_payload(&payload);
    frame.write_crc();
    frame
}

fn resolve_payload(args: &CallArgs) -> CliResult<(Vec<u8>, u8)> {
    if let Some(json) = &args.json {
        serde_json::from_str::<serde_json::Value>(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        return Ok((json.as_bytes().to_vec(), flags::CODEC_JSON));
    }
    if let Some(data) = &args.data {
        return Ok((data.as_bytes().to_vec(), flags::CODEC_RAW));
    }
    if let Some(path) = &args.file {
        let bytes = fs::read(path).map_err(|err| {
            io_error(&format!("failed reading {}", path.display()), err)
        })?;
        return Ok((bytes, flags::CODEC_RAW));
    }
    Ok((Vec::new(), flags::CODEC_RAW))
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn base_args() -> CallArgs {
        CallArgs {
            path: PathBuf::from("/tmp/x.sock"),
            tcp: None,
            method: "Svc.Ping".into(),
            json: None,
            data: None,
            file: None,
            timeout: "5s".into(),
        }
    }

    #[test]
    fn json_payload_selects_the_json_codec() {
        let args = CallArgs {
            json: Some("{\"n\":1}".into()),
            ..base_args()
        };
        let (body, flag) = resolve_payload(&args).unwrap();
        assert_eq!(body, b"{\"n\":1}");
        assert_eq!(flag, flags::CODEC_JSON);
    }

    #[test]
    fn invalid_json_payload_is_a_usage_error() {
        let args = CallArgs {
            json: Some("not json".into()),
            ..base_args()
        };
        let err = resolve_payload(&args).unwrap_err();
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn data_payload_selects_the_raw_codec() {
        let args = CallArgs {
            data: Some("bytes".into()),
            ..base_args()
        };
        let (body, flag) = resolve_payload(&args).unwrap();
        assert_eq!(body, b"bytes");
        assert_eq!(flag, flags::CODEC_RAW);
    }

    #[test]
    fn request_frame_layout() {
        let frame = request_frame(1, "Svc.Ping", b"\"hi\"", flags::CODEC_JSON);
        assert_eq!(frame.read_options(), vec![1, 8]);
        assert_eq!(frame.read_payload_length(), 12);
        assert!(frame.verify_crc());
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
    }
}
