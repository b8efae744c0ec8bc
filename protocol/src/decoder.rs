//! Wire frame decoder

use bytes::BytesMut;
use memchr::memchr;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::{ServerMessage, WireCodec, WireError};

impl Decoder for WireCodec {
    type Item = Vec<ServerMessage>;
    type Error = WireError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(newline) = memchr(b'\n', buf) else {
                return Ok(None);
            };
            let frame = buf.split_to(newline + 1);
            let line = trim_line(&frame);
            if line.is_empty() {
                continue;
            }
            return Ok(Some(parse_batch(line)?));
        }
    }
}

/// Strip the trailing newline and an optional carriage return
fn trim_line(frame: &[u8]) -> &[u8] {
    let line = &frame[..frame.len() - 1];
    match line.last() {
        Some(b'\r') => &line[..line.len() - 1],
        _ => line,
    }
}

/// Parse one frame into its recognized messages. Unknown or malformed
/// messages within a well-formed batch are skipped, not errors.
fn parse_batch(line: &[u8]) -> Result<Vec<ServerMessage>, WireError> {
    let values: Vec<serde_json::Value> = serde_json::from_slice(line)?;
    let mut batch = Vec::with_capacity(values.len());
    for value in values {
        let cmd = value
            .get("cmd")
            .and_then(|cmd| cmd.as_str())
            .unwrap_or("<untagged>")
            .to_owned();
        match serde_json::from_value::<ServerMessage>(value) {
            Ok(message) => batch.push(message),
            Err(err) => trace!("skipping {cmd:?} message: {err}"),
        }
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(input: &[u8]) -> Vec<Vec<ServerMessage>> {
        let mut codec = WireCodec;
        let mut buf = BytesMut::from(input);
        let mut batches = Vec::new();
        while let Some(batch) = codec.decode(&mut buf).unwrap() {
            batches.push(batch);
        }
        batches
    }

    #[test]
    fn decodes_a_tagged_batch() {
        let batches = decode_all(b"[{\"cmd\":\"Connected\",\"slot\":3},{\"cmd\":\"Print\",\"text\":\"hi\"}]\n");
        assert_eq!(
            batches,
            vec![vec![
                ServerMessage::Connected { slot: 3 },
                ServerMessage::Print { text: "hi".into() },
            ]]
        );
    }

    #[test]
    fn waits_for_a_complete_line() {
        let mut codec = WireCodec;
        let mut buf = BytesMut::from(&b"[{\"cmd\":\"Connected\""[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b",\"slot\":1}]\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(vec![ServerMessage::Connected { slot: 1 }])
        );
    }

    #[test]
    fn skips_unknown_commands() {
        let batches = decode_all(
            b"[{\"cmd\":\"Bounced\",\"data\":{}},{\"cmd\":\"Print\",\"text\":\"kept\"}]\n",
        );
        assert_eq!(
            batches,
            vec![vec![ServerMessage::Print {
                text: "kept".into()
            }]]
        );
    }

    #[test]
    fn handles_crlf_and_blank_lines() {
        let batches = decode_all(b"\r\n[{\"cmd\":\"Print\",\"text\":\"a\"}]\r\n[{\"cmd\":\"Print\",\"text\":\"b\"}]\n");
        assert_eq!(batches.len(), 2);
    }

    #[test]
    fn rejects_a_frame_that_is_not_an_array() {
        let mut codec = WireCodec;
        let mut buf = BytesMut::from(&b"{\"cmd\":\"Print\",\"text\":\"x\"}\n"[..]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn snapshot_fields_default_when_absent() {
        let batches = decode_all(b"[{\"cmd\":\"StateSnapshot\"}]\n");
        assert_eq!(
            batches,
            vec![vec![ServerMessage::StateSnapshot {
                checked_locations: Vec::new(),
                options: crate::SlotOptions::default(),
            }]]
        );
    }
}
