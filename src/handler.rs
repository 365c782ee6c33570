use crate::{request::Request, response::Response};
use std::fmt;

/// Produces a response for a request received by a mock server.
///
/// Closures of the form `Fn(&Request) -> Response` implement this trait, so
/// most custom handlers can be written inline:
///
/// ```
/// use fakehttp::{Request, Response, Server};
///
/// let server = Server::new();
///
/// server.register_handler("POST", "/echo", |request: &Request| {
///     Response::new(200).with_body(request.body.clone())
/// });
/// ```
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, request: &Request) -> Response;
}

impl<F> Handler for F
where
    F: Fn(&Request) -> Response + Send + Sync + 'static,
{
    fn handle(&self, request: &Request) -> Response {
        (self)(request)
    }
}

/// A handler that always answers with a fixed status code and body.
#[derive(Clone, Eq, PartialEq)]
pub struct Payload {
    status_code: u16,
    body: Vec<u8>,
}

impl Payload {
    pub fn new(status_code: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status_code,
            body: body.into(),
        }
    }
}

impl Handler for Payload {
    fn handle(&self, _: &Request) -> Response {
        Response::new(self.status_code).with_body(self.body.clone())
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("status_code", &self.status_code)
            .field("body_len", &self.body.len())
            .finish()
    }
}
