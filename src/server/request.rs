//! Raw HTTP request reading and parsing

use percent_encoding::percent_decode_str;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};

use crate::error::ServerError;

/// Longest single head line accepted
pub const MAX_LINE_LENGTH: usize = 8 * 1024;
/// Largest request head accepted, line breaks included
pub const MAX_HEAD_LENGTH: usize = 64 * 1024;

/// Read the request head, one segment per `\r` or `\n` separated run of bytes.
///
/// Reading stops after two consecutive empty segments (the blank line closing
/// the headers) or at end of stream. Request bodies are never read. Heads
/// exceeding [`MAX_LINE_LENGTH`] or [`MAX_HEAD_LENGTH`] fail with a 431.
pub async fn read_head<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Vec<String>, ServerError> {
    let mut reader = BufReader::new(stream);
    let mut lines = Vec::new();
    let mut current = Vec::new();
    let mut empty_count = 0;
    let mut total = 0usize;

    loop {
        let byte = match reader.read_u8().await {
            Ok(byte) => byte,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        total += 1;
        if total > MAX_HEAD_LENGTH {
            return Err(ServerError::request(431, "Request head too large"));
        }
        if byte != b'\r' && byte != b'\n' {
            if current.len() >= MAX_LINE_LENGTH {
                return Err(ServerError::request(431, "Request line too long"));
            }
            current.push(byte);
            continue;
        }

        let segment = String::from_utf8_lossy(&current).trim().to_string();
        current.clear();
        if segment.is_empty() {
            empty_count += 1;
            if empty_count >= 2 {
                break;
            }
        } else {
            empty_count = 0;
            lines.push(segment);
        }
    }

    let trailing = String::from_utf8_lossy(&current).trim().to_string();
    if !trailing.is_empty() {
        lines.push(trailing);
    }
    Ok(lines)
}

/// A parsed request head
#[derive(Debug, Clone)]
pub struct Request {
    method: String,
    uri: String,
    path: String,
    version: String,
    headers: Vec<(String, String)>,
}

impl Request {
    /// Parse the request line and headers. Malformed heads are a 400.
    pub fn parse(lines: &[String]) -> Result<Self, ServerError> {
        let (request_line, header_lines) = lines
            .split_first()
            .ok_or_else(|| ServerError::request(400, "Empty request"))?;

        let mut parts = request_line.split_whitespace();
        let (method, uri) = match (parts.next(), parts.next()) {
            (Some(method), Some(uri)) => (method.to_uppercase(), uri.to_string()),
            _ => {
                return Err(ServerError::request(
                    400,
                    format!("Malformed request line: {}", request_line),
                ))
            }
        };
        let version = parts.next().unwrap_or("HTTP/1.0").to_string();

        if !uri.starts_with('/') {
            return Err(ServerError::request(400, format!("Invalid URI: {}", uri)));
        }
        let raw_path = uri.split(['?', '#']).next().unwrap_or("/");
        let path = percent_decode_str(raw_path)
            .decode_utf8()
            .map_err(|_| ServerError::request(400, format!("Invalid URI encoding: {}", uri)))?
            .into_owned();

        let mut headers = Vec::with_capacity(header_lines.len());
        for line in header_lines {
            match line.split_once(':') {
                Some((name, value)) => headers.push((name.trim().to_string(), value.trim().to_string())),
                None => tracing::debug!("Ignoring malformed header line: {}", line),
            }
        }

        Ok(Self {
            method,
            uri,
            path,
            version,
            headers,
        })
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// The request target as sent by the client
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The decoded path of the URI, without query string
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.split_once('?').map(|(_, query)| query)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Header value, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_read_head_stops_at_blank_line() {
        let raw = b"GET /index.html HTTP/1.1\r\nHost: localhost\r\nAccept: */*\r\n\r\nbody bytes";
        let mut stream = &raw[..];
        let head = read_head(&mut stream).await.unwrap();
        assert_eq!(
            head,
            vec!["GET /index.html HTTP/1.1", "Host: localhost", "Accept: */*"]
        );
    }

    #[tokio::test]
    async fn test_read_head_until_eof() {
        let mut stream = &b"GET / HTTP/1.0\nHost: a"[..];
        let head = read_head(&mut stream).await.unwrap();
        assert_eq!(head, vec!["GET / HTTP/1.0", "Host: a"]);
    }

    #[tokio::test]
    async fn test_read_head_rejects_oversized_heads() {
        let endless_line = vec![b'a'; MAX_LINE_LENGTH + 1];
        let err = read_head(&mut &endless_line[..]).await.unwrap_err();
        assert_eq!(err.status(), 431);

        let header = format!("X-Filler: {}\r\n", "b".repeat(1000));
        let many_headers = format!("GET / HTTP/1.1\r\n{}", header.repeat(MAX_HEAD_LENGTH / 1000));
        let err = read_head(&mut many_headers.as_bytes()).await.unwrap_err();
        assert_eq!(err.status(), 431);

        let longest = format!("GET /{} HTTP/1.1\r\n\r\n", "c".repeat(MAX_LINE_LENGTH - 14));
        let head = read_head(&mut longest.as_bytes()).await.unwrap();
        assert_eq!(head[0].len(), MAX_LINE_LENGTH);
    }

    #[test]
    fn test_parse_request() {
        let request = Request::parse(&lines(&[
            "get /blog/hello%20world?page=2 HTTP/1.1",
            "Host: localhost:8080",
            "If-None-Match: abc",
            "garbage",
        ]))
        .unwrap();

        assert_eq!(request.method(), "GET");
        assert_eq!(request.uri(), "/blog/hello%20world?page=2");
        assert_eq!(request.path(), "/blog/hello world");
        assert_eq!(request.query(), Some("page=2"));
        assert_eq!(request.version(), "HTTP/1.1");
        assert_eq!(request.header("if-none-match"), Some("abc"));
        assert_eq!(request.header("HOST"), Some("localhost:8080"));
        assert_eq!(request.headers().len(), 2);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for raw in [vec![], vec!["GET"], vec!["GET index.html HTTP/1.1"]] {
            let err = Request::parse(&lines(&raw)).unwrap_err();
            assert_eq!(err.status(), 400);
        }
    }
}
