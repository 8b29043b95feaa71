//! Characteristic payloads
//!
//! Parses user-typed hex into bytes for writes and renders received values
//! back as hex with a text preview.

use thiserror::Error;

/// Payload length written when the input is empty (one full ATT MTU of 247)
pub const DEFAULT_WRITE_LEN: usize = 247;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("invalid hex digit '{digit}' at position {position}")]
    InvalidDigit { digit: char, position: usize },
    #[error("odd number of hex digits in \"{token}\"")]
    OddLength { token: String },
    #[error("no hex digits after prefix in \"{token}\"")]
    MissingDigits { token: String },
}

/// Parse a hex string such as `01 02 ff`, `0x0102FF` or `01:02:ff`.
///
/// Input without any token (blank or separators only) yields `default_len`
/// zero bytes. A non-empty result is guaranteed otherwise.
pub fn parse_hex(input: &str, default_len: usize) -> Result<Vec<u8>, PayloadError> {
    let tokens = tokens(input);
    if tokens.is_empty() {
        return Ok(vec![0u8; default_len]);
    }

    let mut bytes = Vec::new();
    for (start, token) in tokens {
        let (digits, prefix_len) = match token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
        {
            Some(rest) => (rest, 2),
            None => (token, 0),
        };

        if digits.is_empty() {
            return Err(PayloadError::MissingDigits {
                token: token.to_string(),
            });
        }

        if let Some((index, digit)) = digits.char_indices().find(|(_, c)| !c.is_ascii_hexdigit()) {
            return Err(PayloadError::InvalidDigit {
                digit,
                position: start + prefix_len + index,
            });
        }

        if digits.len() % 2 != 0 {
            return Err(PayloadError::OddLength {
                token: token.to_string(),
            });
        }

        for i in (0..digits.len()).step_by(2) {
            let byte = u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| {
                PayloadError::OddLength {
                    token: token.to_string(),
                }
            })?;
            bytes.push(byte);
        }
    }

    Ok(bytes)
}

/// Split on separators, keeping each token's byte offset
fn tokens(input: &str) -> Vec<(usize, &str)> {
    let is_separator = |c: char| c.is_whitespace() || matches!(c, ':' | '-' | ',');
    let mut tokens = Vec::new();
    let mut start = None;

    for (i, c) in input.char_indices() {
        if is_separator(c) {
            if let Some(s) = start.take() {
                tokens.push((s, &input[s..i]));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        tokens.push((s, &input[s..]));
    }

    tokens
}

/// Spaced upper-case hex, e.g. `01 A0 FF`
pub fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text preview for values that are printable UTF-8, trailing NULs trimmed
pub fn text_preview(bytes: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(bytes).ok()?;
    let text = text.trim_end_matches('\0');
    if text.is_empty() {
        return None;
    }
    if text.chars().all(|c| !c.is_control() || c == '\n' || c == '\t') {
        Some(text.to_string())
    } else {
        None
    }
}

/// One-line rendering used in lists; long values are truncated
pub fn summarize(bytes: &[u8], max_bytes: usize) -> String {
    if bytes.is_empty() {
        return "(empty)".to_string();
    }
    if let Some(text) = text_preview(bytes) {
        return format!("\"{}\"", text);
    }
    if bytes.len() > max_bytes {
        format!("[{} bytes] {} ...", bytes.len(), to_hex(&bytes[..max_bytes]))
    } else {
        to_hex(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spaced() {
        assert_eq!(parse_hex("01 02 ff", 0).unwrap(), vec![0x01, 0x02, 0xFF]);
    }

    #[test]
    fn test_parse_separators_and_prefix() {
        assert_eq!(parse_hex("0x0102FF", 0).unwrap(), vec![0x01, 0x02, 0xFF]);
        assert_eq!(parse_hex("01:02-03,04", 0).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(parse_hex("0xA0 0x1f", 0).unwrap(), vec![0xA0, 0x1F]);
    }

    #[test]
    fn test_parse_empty_uses_default() {
        let payload = parse_hex("   ", DEFAULT_WRITE_LEN).unwrap();
        assert_eq!(payload.len(), 247);
        assert!(payload.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_parse_separators_only_uses_default() {
        let payload = parse_hex(" , : ", DEFAULT_WRITE_LEN).unwrap();
        assert_eq!(payload, vec![0u8; DEFAULT_WRITE_LEN]);
        assert_eq!(parse_hex("--", 4).unwrap(), vec![0u8; 4]);
    }

    #[test]
    fn test_parse_bare_prefix_is_rejected() {
        let err = parse_hex("0x", DEFAULT_WRITE_LEN).unwrap_err();
        assert_eq!(
            err,
            PayloadError::MissingDigits {
                token: "0x".to_string()
            }
        );
        assert!(parse_hex("01 0X", 0).is_err());
    }

    #[test]
    fn test_parse_invalid_digit_position() {
        let err = parse_hex("01 0g", 0).unwrap_err();
        assert_eq!(
            err,
            PayloadError::InvalidDigit {
                digit: 'g',
                position: 4
            }
        );
    }

    #[test]
    fn test_parse_odd_length() {
        let err = parse_hex("abc", 0).unwrap_err();
        assert_eq!(
            err,
            PayloadError::OddLength {
                token: "abc".to_string()
            }
        );
        assert_eq!(err.to_string(), "odd number of hex digits in \"abc\"");
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(&[0x01, 0xA0, 0xFF]), "01 A0 FF");
        assert_eq!(to_hex(&[]), "");
    }

    #[test]
    fn test_text_preview() {
        assert_eq!(text_preview(b"Nordic\0\0"), Some("Nordic".to_string()));
        assert_eq!(text_preview(&[0x01, 0x02]), None);
        assert_eq!(text_preview(&[0x00]), None);
        assert_eq!(text_preview(&[0xFF, 0xFE]), None);
    }

    #[test]
    fn test_summarize() {
        assert_eq!(summarize(&[], 4), "(empty)");
        assert_eq!(summarize(b"abc", 4), "\"abc\"");
        assert_eq!(summarize(&[0x64], 4), "\"d\"");
        assert_eq!(summarize(&[1, 2, 3, 4, 5, 6], 4), "[6 bytes] 01 02 03 04 ...");
    }
}
