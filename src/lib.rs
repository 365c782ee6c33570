//! An in-process mock HTTP server for testing code that talks HTTP.
//!
//! A [`Server`] listens on an ephemeral port on the loopback interface. Tests
//! register canned responses or custom handlers per method and path, point the
//! code under test at [`Server::url`], and afterwards inspect every request the
//! server received.
//!
//! Requests are answered as follows:
//!
//! - If an override handler is set with [`Server::set_override`], it answers
//!   every request regardless of registered routes.
//! - Otherwise, if no route is registered for the request path, the server
//!   answers `404 Not Found`.
//! - Otherwise, if no route is registered for the request method on that path,
//!   the server answers `405 Method Not Allowed`.
//! - Otherwise the registered handler answers.
//!
//! Every request is recorded in arrival order whether or not it matched a
//! route. [`Server::reset`] clears routes, override and recorded requests in
//! one step without stopping the server.
//!
//! ```no_run
//! use fakehttp::{Request, Response, Server};
//! use std::{io::{Read, Write}, net::TcpStream};
//!
//! let server = Server::new();
//! server.register_payload("GET", "/hello", 200, "hello get");
//! server.register_handler("POST", "/echo", |request: &Request| {
//!     Response::new(201).with_body(request.body.clone())
//! });
//!
//! let addr = server.start()?;
//!
//! let mut stream = TcpStream::connect(addr)?;
//! stream.write_all(b"GET /hello HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n")?;
//! let mut response = String::new();
//! stream.read_to_string(&mut response)?;
//!
//! assert!(response.ends_with("hello get"));
//! assert_eq!(server.request_count(), 1);
//! assert_eq!(server.request_num(0).method, "GET");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Only HTTP/1.x over plain TCP is supported.

mod dispatcher;
mod handler;
mod pool;
mod request;
mod response;
mod server;

pub mod error;

pub use crate::{
    error::Error,
    handler::{Handler, Payload},
    request::Request,
    response::Response,
    server::{Builder, Server},
};
