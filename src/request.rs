use regex::Regex;

/// A record of a request received by a mock server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Request {
    /// The request method exactly as sent, such as `GET`.
    pub method: String,
    /// The raw request target, including any query string.
    pub url: String,
    /// Request headers in the order they were received.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Request {
    /// Build a record by draining the given `tiny_http` request's body.
    ///
    /// A body that fails to read part-way is recorded with the bytes read so
    /// far; the request is still recorded.
    pub(crate) fn read_from(request: &mut tiny_http::Request) -> Self {
        let mut body = Vec::new();

        if let Some(len) = request.body_length() {
            body.reserve(len);
        }

        if let Err(e) = request.as_reader().read_to_end(&mut body) {
            tracing::warn!(url = request.url(), "failed to read request body: {}", e);
        }

        Self {
            method: request.method().to_string(),
            url: request.url().to_owned(),
            headers: request
                .headers()
                .iter()
                .map(|header| (header.field.to_string(), header.value.to_string()))
                .collect(),
            body,
        }
    }

    /// The path component of the request target, used for routing.
    pub fn path(&self) -> &str {
        match self.url.find(|c: char| c == '?' || c == '#') {
            Some(end) => &self.url[..end],
            None => &self.url,
        }
    }

    /// The query string of the request target, without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        let start = self.url.find('?')? + 1;
        let query = &self.url[start..];

        Some(match query.find('#') {
            Some(end) => &query[..end],
            None => query,
        })
    }

    /// Get all values of the header with the given name, ignoring case.
    pub fn get_header(&self, name: impl AsRef<str>) -> impl Iterator<Item = &str> + '_ {
        let name_lower = name.as_ref().to_lowercase();

        self.headers
            .iter()
            .filter(move |(name, _)| name.to_lowercase() == name_lower)
            .map(|(_, value)| value.as_str())
    }

    /// Get the body as a string, if it is valid UTF-8.
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    pub fn expect_header(&self, name: impl AsRef<str>, value: impl AsRef<str>) {
        self.expect_header_matches(name, |v| v == value.as_ref())
    }

    pub fn expect_header_regex(&self, name: impl AsRef<str>, regex: &str) {
        let regex = Regex::new(regex).unwrap_or_else(|e| panic!("invalid header regex: {}", e));
        self.expect_header_matches(name, |v| regex.is_match(v))
    }

    pub fn expect_header_matches(&self, name: impl AsRef<str>, predicate: impl Fn(&str) -> bool) {
        let name = name.as_ref();

        self.get_header(name)
            .find(|v| predicate(v))
            .unwrap_or_else(|| panic!("no header named `{}` with value expected found", name));
    }

    pub fn expect_body(&self, expected: impl AsRef<[u8]>) {
        assert_eq!(expected.as_ref(), self.body.as_slice());
    }
}
