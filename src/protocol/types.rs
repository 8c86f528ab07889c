use bytes::Bytes;

/// Outbound reply types for the line-oriented client protocol
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Simple string: +OK\r\n
    Simple(String),

    /// Error: -ERR message\r\n
    Error(String),

    /// Integer: :1\r\n
    Integer(i64),

    /// Bulk string: $6\r\nfoobar\r\n or $-1\r\n for nil
    Bulk(Option<Bytes>),
}

impl Reply {
    /// Create a simple string reply
    pub fn simple(s: impl Into<String>) -> Self {
        Reply::Simple(s.into())
    }

    /// Create an error reply
    pub fn error(s: impl Into<String>) -> Self {
        Reply::Error(s.into())
    }

    /// Create an integer reply
    pub fn integer(i: i64) -> Self {
        Reply::Integer(i)
    }

    /// Create a bulk string reply
    pub fn bulk(s: impl Into<Bytes>) -> Self {
        Reply::Bulk(Some(s.into()))
    }

    /// Create a nil bulk reply
    pub fn nil() -> Self {
        Reply::Bulk(None)
    }

    /// Create an OK reply
    pub fn ok() -> Self {
        Reply::Simple("OK".to_string())
    }

    /// The canonical reply for a failed remote operation
    pub fn server_error() -> Self {
        Reply::Error("ERR Server error".to_string())
    }

    /// Serialize to wire bytes
    pub fn serialize(&self) -> Bytes {
        match self {
            Reply::Simple(s) => Bytes::from(format!("+{}\r\n", s)),
            Reply::Error(e) => Bytes::from(format!("-{}\r\n", e)),
            Reply::Integer(i) => Bytes::from(format!(":{}\r\n", i)),
            Reply::Bulk(None) => Bytes::from("$-1\r\n"),
            Reply::Bulk(Some(s)) => {
                let mut result = format!("${}\r\n", s.len());
                result.push_str(&String::from_utf8_lossy(s));
                result.push_str("\r\n");
                Bytes::from(result)
            }
        }
    }
}
