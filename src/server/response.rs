//! Response serialization and the handler-facing response object

use std::io::{self, Write};
use std::time::SystemTime;

use crate::error::ServerError;
use crate::helpers::http_date;

const SERVER_NAME: &str = concat!("Bakehouse/", env!("CARGO_PKG_VERSION"));

/// Reason phrase for the status line
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        206 => "Partial Content",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        408 => "Request Timeout",
        410 => "Gone",
        413 => "Request Entity Too Large",
        414 => "Request URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Requested Range Not Satisfiable",
        417 => "Expectation Failed",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        506 => "Variant Also Negotiates",
        _ => "Unknown",
    }
}

/// A complete response, ready to be written to the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    /// Extra header lines, written verbatim after the fixed ones
    pub headers: Vec<String>,
    pub body: Option<Vec<u8>>,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl AsRef<str>) -> Self {
        self.headers.push(format!("{}: {}", name, value.as_ref()));
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Header value by name, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim())
        })
    }

    /// Status line, fixed headers, caller headers, blank line, body
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!(
            "HTTP/1.1 {} {}\r\nServer: {}\r\nConnection: close\r\nDate: {}\r\n",
            self.status,
            reason_phrase(self.status),
            SERVER_NAME,
            http_date(SystemTime::now())
        );
        for header in &self.headers {
            head.push_str(header);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");

        let mut bytes = head.into_bytes();
        if let Some(body) = &self.body {
            bytes.extend_from_slice(body);
        }
        bytes
    }
}

/// Response object handed to route handlers.
///
/// Everything written to it becomes the body.
#[derive(Debug)]
pub struct WebResponse {
    status: u16,
    headers: Vec<String>,
    body: Vec<u8>,
}

impl WebResponse {
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    pub fn add_header(&mut self, name: &str, value: impl AsRef<str>) {
        self.headers.push(format!("{}: {}", name, value.as_ref()));
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_response(self) -> Response {
        let body = (!self.body.is_empty()).then_some(self.body);
        Response {
            status: self.status,
            headers: self.headers,
            body,
        }
    }
}

impl Default for WebResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for WebResponse {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Outcome of a route handler
#[derive(Debug)]
pub enum HandlerResult {
    /// The handler wrote the response
    Handled,
    /// The route matched but the handler declined; the next candidate is tried
    NotHandled,
    /// The handler failed; the connection is answered with the error's status
    Fault(ServerError),
}

impl<E: Into<ServerError>> From<Result<bool, E>> for HandlerResult {
    fn from(result: Result<bool, E>) -> Self {
        match result {
            Ok(true) => Self::Handled,
            Ok(false) => Self::NotHandled,
            Err(e) => Self::Fault(e.into()),
        }
    }
}
