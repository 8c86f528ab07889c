use crate::error::{Result, RouterError};
use bytes::{Buf, BytesMut};

/// Upper bound on the token count one multibulk request may declare.
/// The count arrives before any element bytes, so it must be bounded
/// before anything is allocated for it.
const MAX_MULTIBULK_LEN: i64 = 1024;

/// Inbound request parser.
///
/// A request is either one inline command line (`get foo\r\n`) or a
/// multibulk array of bulk strings, the framing redis clients emit
/// (`*2\r\n$3\r\nget\r\n$3\r\nfoo\r\n`). Either way the parser yields the
/// command as an ordered list of string tokens: verb first, then arguments.
pub struct CommandParser {
    buffer: BytesMut,
}

impl CommandParser {
    /// Create a new parser with a given buffer capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Add data to the parser buffer
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Get a mutable reference to the buffer
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Discard any buffered bytes, leaving the parser ready for a fresh request
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Try to parse one complete request from the buffer.
    ///
    /// Returns `Ok(None)` when the frame is incomplete (more data needed),
    /// `Err(Protocol)` when the input is malformed. The malformed case
    /// never consumes the buffer; callers are expected to `reset`.
    pub fn parse(&mut self) -> Result<Option<Vec<String>>> {
        loop {
            if self.buffer.is_empty() {
                return Ok(None);
            }

            let tokens = if self.buffer[0] == b'*' {
                self.parse_multibulk()?
            } else {
                self.parse_inline()?
            };

            match tokens {
                // Blank inline line: skip it and look at what follows
                Some(t) if t.is_empty() => continue,
                other => return Ok(other),
            }
        }
    }

    fn parse_inline(&mut self) -> Result<Option<Vec<String>>> {
        let Some(nl) = self.buffer.iter().position(|&b| b == b'\n') else {
            return Ok(None);
        };

        let line = &self.buffer[..nl];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let tokens: Vec<String> = String::from_utf8_lossy(line)
            .split_whitespace()
            .map(str::to_string)
            .collect();

        self.buffer.advance(nl + 1);
        Ok(Some(tokens))
    }

    fn parse_multibulk(&mut self) -> Result<Option<Vec<String>>> {
        let buf = &self.buffer[..];
        let mut pos = 1; // skip '*'

        let Some(count_line) = read_line(buf, &mut pos) else {
            return Ok(None);
        };
        let count = parse_int(count_line, "array length")?;
        if count < 0 || count > MAX_MULTIBULK_LEN {
            return Err(RouterError::Protocol(format!(
                "invalid array length: {}",
                count
            )));
        }

        let mut tokens = Vec::with_capacity(count as usize);
        for _ in 0..count {
            if pos >= buf.len() {
                return Ok(None);
            }
            if buf[pos] != b'$' {
                return Err(RouterError::Protocol(format!(
                    "expected bulk string, got marker '{}'",
                    buf[pos] as char
                )));
            }
            pos += 1;

            let Some(len_line) = read_line(buf, &mut pos) else {
                return Ok(None);
            };
            let len = parse_int(len_line, "bulk string length")?;
            if len < 0 {
                return Err(RouterError::Protocol(format!(
                    "invalid bulk string length: {}",
                    len
                )));
            }
            let len = len as usize;

            if pos + len + 2 > buf.len() {
                return Ok(None);
            }
            if &buf[pos + len..pos + len + 2] != b"\r\n" {
                return Err(RouterError::Protocol(
                    "bulk string missing terminator".to_string(),
                ));
            }
            tokens.push(String::from_utf8_lossy(&buf[pos..pos + len]).to_string());
            pos += len + 2;
        }

        self.buffer.advance(pos);
        Ok(Some(tokens))
    }
}

/// Read one CRLF-terminated line starting at `pos`, advancing `pos` past the
/// terminator. Returns `None` when no full line is buffered yet.
fn read_line<'a>(buf: &'a [u8], pos: &mut usize) -> Option<&'a [u8]> {
    let start = *pos;
    let mut i = start;
    while i + 1 < buf.len() {
        if buf[i] == b'\r' && buf[i + 1] == b'\n' {
            *pos = i + 2;
            return Some(&buf[start..i]);
        }
        i += 1;
    }
    None
}

fn parse_int(line: &[u8], what: &str) -> Result<i64> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| {
            RouterError::Protocol(format!(
                "invalid {}: {}",
                what,
                String::from_utf8_lossy(line)
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inline() {
        let mut parser = CommandParser::new(128);
        parser.feed(b"set mykey myval\r\n");

        let result = parser.parse().unwrap();
        assert_eq!(
            result,
            Some(vec![
                "set".to_string(),
                "mykey".to_string(),
                "myval".to_string()
            ])
        );
        assert_eq!(parser.parse().unwrap(), None);
    }

    #[test]
    fn test_parse_inline_lf_only() {
        let mut parser = CommandParser::new(128);
        parser.feed(b"info\n");

        let result = parser.parse().unwrap();
        assert_eq!(result, Some(vec!["info".to_string()]));
    }

    #[test]
    fn test_parse_inline_incomplete() {
        let mut parser = CommandParser::new(128);
        parser.feed(b"get my");

        assert_eq!(parser.parse().unwrap(), None);

        parser.feed(b"key\r\n");
        let result = parser.parse().unwrap();
        assert_eq!(result, Some(vec!["get".to_string(), "mykey".to_string()]));
    }

    #[test]
    fn test_parse_inline_extra_whitespace() {
        let mut parser = CommandParser::new(128);
        parser.feed(b"  get   foo  \r\n");

        let result = parser.parse().unwrap();
        assert_eq!(result, Some(vec!["get".to_string(), "foo".to_string()]));
    }

    #[test]
    fn test_parse_blank_lines_skipped() {
        let mut parser = CommandParser::new(128);
        parser.feed(b"\r\n\r\nping\r\n");

        let result = parser.parse().unwrap();
        assert_eq!(result, Some(vec!["ping".to_string()]));
    }

    #[test]
    fn test_parse_multibulk() {
        let mut parser = CommandParser::new(128);
        parser.feed(b"*3\r\n$3\r\nset\r\n$3\r\nfoo\r\n$3\r\nbar\r\n");

        let result = parser.parse().unwrap();
        assert_eq!(
            result,
            Some(vec![
                "set".to_string(),
                "foo".to_string(),
                "bar".to_string()
            ])
        );
        assert_eq!(parser.parse().unwrap(), None);
    }

    #[test]
    fn test_parse_multibulk_incomplete() {
        let mut parser = CommandParser::new(128);
        parser.feed(b"*2\r\n$3\r\nget\r\n$3\r\nfo");

        assert_eq!(parser.parse().unwrap(), None);

        parser.feed(b"o\r\n");
        let result = parser.parse().unwrap();
        assert_eq!(result, Some(vec!["get".to_string(), "foo".to_string()]));
    }

    #[test]
    fn test_parse_multibulk_malformed_marker() {
        let mut parser = CommandParser::new(128);
        parser.feed(b"*1\r\n:3\r\n");

        assert!(parser.parse().is_err());
    }

    #[test]
    fn test_parse_multibulk_negative_length() {
        let mut parser = CommandParser::new(128);
        parser.feed(b"*-1\r\n");

        assert!(parser.parse().is_err());
    }

    #[test]
    fn test_parse_multibulk_huge_count_rejected() {
        // The declared count is bounded before anything is allocated;
        // a hostile count line must yield an error, not a crash
        let mut parser = CommandParser::new(128);
        parser.feed(b"*9223372036854775807\r\n");
        assert!(parser.parse().is_err());

        parser.reset();
        parser.feed(b"*1000000000\r\n");
        assert!(parser.parse().is_err());

        parser.reset();
        parser.feed(b"ping\r\n");
        assert_eq!(parser.parse().unwrap(), Some(vec!["ping".to_string()]));
    }

    #[test]
    fn test_reset_after_malformed() {
        let mut parser = CommandParser::new(128);
        parser.feed(b"*1\r\n:3\r\n");
        assert!(parser.parse().is_err());

        parser.reset();
        parser.feed(b"ping\r\n");
        assert_eq!(parser.parse().unwrap(), Some(vec!["ping".to_string()]));
    }

    #[test]
    fn test_two_pipelined_commands() {
        let mut parser = CommandParser::new(128);
        parser.feed(b"get a\r\nget b\r\n");

        assert_eq!(
            parser.parse().unwrap(),
            Some(vec!["get".to_string(), "a".to_string()])
        );
        assert_eq!(
            parser.parse().unwrap(),
            Some(vec!["get".to_string(), "b".to_string()])
        );
        assert_eq!(parser.parse().unwrap(), None);
    }
}
