//! Base64-wrapped JSON Lines, the format rosters travel in.
//!
//! One JSON document per line, the whole file base64-encoded (standard
//! alphabet, padded) so it fits in a JSON string field.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Invalid base64 data: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Data is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("Malformed record on line {line}: {source}")]
    Line { line: usize, source: serde_json::Error },
}

pub fn encode_jsonl<T: Serialize>(records: &[T]) -> Result<String, serde_json::Error> {
    let mut out = Vec::new();
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.push(b'\n');
    }
    Ok(BASE64_STANDARD.encode(out))
}

/// Blank lines are skipped; line numbers in errors count from 1.
pub fn decode_jsonl<T: DeserializeOwned>(encoded: &str) -> Result<Vec<T>, CodecError> {
    let text = String::from_utf8(BASE64_STANDARD.decode(encoded.trim())?)?;
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| CodecError::Line { line: i + 1, source })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    #[test]
    fn lines_are_newline_terminated() {
        let encoded = encode_jsonl(&[json!({"id": "A"}), json!({"id": "B"})]).unwrap();
        let raw = BASE64_STANDARD.decode(encoded).unwrap();
        assert_eq!(raw, b"{\"id\":\"A\"}\n{\"id\":\"B\"}\n");
    }

    #[test]
    fn decode_skips_blank_lines_and_crlf() {
        let encoded = BASE64_STANDARD.encode("{\"n\":1}\r\n\n  \n{\"n\":2}");
        let values: Vec<Value> = decode_jsonl(&encoded).unwrap();
        assert_eq!(values, [json!({"n": 1}), json!({"n": 2})]);
        assert!(decode_jsonl::<Value>("").unwrap().is_empty());
    }

    #[test]
    fn decode_errors_name_the_line() {
        let encoded = BASE64_STANDARD.encode("{\"n\":1}\n{oops}\n");
        let err = decode_jsonl::<Value>(&encoded).unwrap_err();
        assert!(matches!(err, CodecError::Line { line: 2, .. }));
        assert!(err.to_string().starts_with("Malformed record on line 2"));
    }

    #[test]
    fn decode_rejects_bad_base64_and_utf8() {
        assert!(matches!(decode_jsonl::<Value>("not base64!"), Err(CodecError::Base64(_))));
        let bad_utf8 = BASE64_STANDARD.encode([0xff, 0xfe]);
        assert!(matches!(decode_jsonl::<Value>(&bad_utf8), Err(CodecError::Utf8(_))));
    }
}
