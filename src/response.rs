use std::{
    fmt,
    io::{self, Write},
};

/// A response produced by a [`Handler`](crate::Handler).
///
/// The default response is `200 OK` with an empty body.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Response {
    pub(crate) status_code: u16,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Vec<u8>,
}

impl Response {
    /// Create an empty response with the given status code.
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            ..Self::default()
        }
    }

    pub(crate) fn not_found() -> Self {
        Self::new(404)
    }

    pub(crate) fn method_not_allowed() -> Self {
        Self::new(405)
    }

    pub fn with_header(mut self, name: impl fmt::Display, value: impl fmt::Display) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status_code: 200,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }
}

impl Response {
    /// Write this response to a client connection, telling the client to close
    /// the connection once it has read it.
    ///
    /// Connections are never reused, so stopping a server cannot strand a
    /// request on a kept-alive connection that nobody is serving anymore.
    pub(crate) fn write_to(
        &self,
        mut writer: impl Write,
        version: &tiny_http::HTTPVersion,
        include_body: bool,
    ) -> io::Result<()> {
        let status = tiny_http::StatusCode(self.status_code);

        write!(writer, "HTTP/{} {} {}\r\n", version, self.status_code, status.default_reason_phrase())?;

        for (name, value) in &self.headers {
            if is_framing_header(name) {
                continue;
            }

            write!(writer, "{}: {}\r\n", name, value)?;
        }

        write!(writer, "content-length: {}\r\nconnection: close\r\n\r\n", self.body.len())?;

        // 1xx, 204 and 304 responses never carry a body.
        if include_body && !matches!(self.status_code, 100..=199 | 204 | 304) {
            writer.write_all(&self.body)?;
        }

        writer.flush()
    }
}

/// Headers that describe message framing, which are always written by the
/// server itself.
fn is_framing_header(name: &str) -> bool {
    ["content-length", "connection", "transfer-encoding"]
        .iter()
        .any(|framing| name.eq_ignore_ascii_case(framing))
}
