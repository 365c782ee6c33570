#![allow(dead_code)]

use fakehttp::Server;
use isahc::{prelude::*, Body, Request, Response};
use std::sync::Once;

pub fn logging() {
    static ONCE: Once = Once::new();

    ONCE.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .try_init();
    });
}

/// Start a server with logging enabled.
pub fn start(server: Server) -> Server {
    logging();
    server.start().unwrap();
    server
}

pub fn send(server: &Server, method: &str, path: &str) -> Response<Body> {
    send_with_body(server, method, path, Vec::new())
}

pub fn send_with_body(server: &Server, method: &str, path: &str, body: impl Into<Vec<u8>>) -> Response<Body> {
    Request::builder()
        .method(method)
        .uri(format!("{}{}", server.url(), path))
        .body(body.into())
        .unwrap()
        .send()
        .unwrap()
}

pub fn read_body(response: &mut Response<Body>) -> Vec<u8> {
    let mut buf = Vec::new();
    response.copy_to(&mut buf).unwrap();
    buf
}
