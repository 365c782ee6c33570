use crate::{
    dispatcher::Dispatcher,
    error::Error,
    handler::Handler,
    pool::pool,
    request::Request,
};
use std::{
    fmt,
    mem,
    net::{Ipv4Addr, SocketAddr},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread,
};

/// A mock HTTP server.
///
/// A server is created stopped. Routes and handlers may be registered at any
/// time, before or after calling [`start`](Server::start), and every request
/// the server receives is recorded for later inspection.
///
/// ```no_run
/// use fakehttp::Server;
///
/// let server = Server::new();
/// server.register_payload("GET", "/hello", 200, "hello");
/// server.start()?;
///
/// // Point the client under test at `server.url()`, then:
/// assert_eq!(server.request_count(), 0);
///
/// server.stop()?;
/// # Ok::<(), fakehttp::Error>(())
/// ```
pub struct Server {
    dispatcher: Arc<Dispatcher>,
    bind_addr: SocketAddr,
    thread_name: String,
    lifecycle: Mutex<Lifecycle>,
}

enum Lifecycle {
    Created,
    Running(Listener),
    Stopped(SocketAddr),
}

/// A bound listener and the thread pulling requests off of it.
struct Listener {
    server: Arc<tiny_http::Server>,
    addr: SocketAddr,
    acceptor: thread::JoinHandle<()>,
}

impl Server {
    /// Create a new server that will listen on an ephemeral port on the
    /// loopback interface.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder for creating a customized server.
    pub fn builder() -> Builder {
        Builder {
            dispatcher: Dispatcher::new(),
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            thread_name: String::from("fakehttp-acceptor"),
        }
    }

    /// Bind the listener and begin accepting connections in the background.
    ///
    /// Returns the address the server is listening on. A server that has been
    /// stopped may be started again, in which case it listens on a freshly
    /// bound port but keeps its routes and recorded requests.
    pub fn start(&self) -> Result<SocketAddr, Error> {
        let mut lifecycle = self.lifecycle();

        if let Lifecycle::Running(_) = *lifecycle {
            return Err(Error::AlreadyRunning);
        }

        let server = tiny_http::Server::http(self.bind_addr).map_err(Error::bind)?;
        let addr = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| Error::bind("listener is not bound to an IP address".into()))?;
        let server = Arc::new(server);

        let acceptor = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn({
                let server = server.clone();
                let dispatcher = self.dispatcher.clone();

                move || accept(&server, &dispatcher)
            })
            .map_err(Error::Spawn)?;

        tracing::debug!(%addr, "mock server started");

        *lifecycle = Lifecycle::Running(Listener {
            server,
            addr,
            acceptor,
        });

        Ok(addr)
    }

    /// Stop accepting new connections and release the listening socket.
    ///
    /// Requests already handed to a handler are left to finish on their own.
    /// Every response asks the client to close its connection, so no client is
    /// left holding a kept-alive connection to a stopped server.
    /// Returns [`Error::NotRunning`] if the server was never started or has
    /// already been stopped.
    pub fn stop(&self) -> Result<(), Error> {
        let listener = {
            let mut lifecycle = self.lifecycle();

            match mem::replace(&mut *lifecycle, Lifecycle::Created) {
                Lifecycle::Running(listener) => {
                    *lifecycle = Lifecycle::Stopped(listener.addr);
                    listener
                }
                other => {
                    *lifecycle = other;
                    return Err(Error::NotRunning);
                }
            }
        };

        listener.close();

        Ok(())
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.lifecycle(), Lifecycle::Running(_))
    }

    /// Get the socket address of the most recently bound listener, or `None`
    /// if the server has never been started.
    pub fn addr(&self) -> Option<SocketAddr> {
        match &*self.lifecycle() {
            Lifecycle::Created => None,
            Lifecycle::Running(listener) => Some(listener.addr),
            Lifecycle::Stopped(addr) => Some(*addr),
        }
    }

    /// Get the base HTTP URL of this server, such as `http://127.0.0.1:4321`.
    ///
    /// # Panics
    ///
    /// Panics if the server has never been started.
    pub fn url(&self) -> String {
        let addr = self.addr().expect("server has not been started");

        format!("http://{}", addr)
    }

    /// Respond to requests for `path` with the given method with a fixed status
    /// code and body, replacing any handler already registered for them.
    pub fn register_payload(
        &self,
        method: impl AsRef<str>,
        path: impl AsRef<str>,
        status_code: u16,
        body: impl Into<Vec<u8>>,
    ) {
        self.dispatcher
            .register_payload(method.as_ref(), path.as_ref(), status_code, body.into());
    }

    /// Respond to requests for `path` with the given method using a custom
    /// handler, replacing any handler already registered for them.
    ///
    /// Methods are matched case-insensitively and paths exactly, ignoring any
    /// query string.
    pub fn register_handler(&self, method: impl AsRef<str>, path: impl AsRef<str>, handler: impl Handler) {
        self.dispatcher
            .register_handler(method.as_ref(), path.as_ref(), handler);
    }

    /// Answer every request with the given handler, bypassing registered routes
    /// until [`clear_override`](Server::clear_override) or
    /// [`reset`](Server::reset) is called.
    pub fn set_override(&self, handler: impl Handler) {
        self.dispatcher.set_override(handler);
    }

    pub fn clear_override(&self) {
        self.dispatcher.clear_override();
    }

    /// Remove all routes, the override handler and all recorded requests at
    /// once. The server keeps listening if it is running.
    pub fn reset(&self) {
        self.dispatcher.reset();
    }

    /// Get the number of requests received since the server was created or
    /// last reset.
    pub fn request_count(&self) -> usize {
        self.dispatcher.request_count()
    }

    /// Get the request received at the given position, starting from 0.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not less than [`request_count`](Server::request_count).
    pub fn request_num(&self, index: usize) -> Request {
        self.dispatcher.request_num(index)
    }

    /// Get all requests received so far, in the order they arrived.
    pub fn requests(&self) -> Vec<Request> {
        self.dispatcher.requests()
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let lifecycle = self.lifecycle
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);

        if let Lifecycle::Running(listener) = mem::replace(lifecycle, Lifecycle::Created) {
            listener.close();
        }
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("addr", &self.addr())
            .field("running", &self.is_running())
            .finish()
    }
}

impl Listener {
    fn close(self) {
        let Listener {
            server,
            addr,
            acceptor,
        } = self;

        server.unblock();

        if acceptor.join().is_err() {
            tracing::error!(%addr, "acceptor thread panicked");
        }

        // Dropping the last reference to the server closes the socket.
        drop(server);

        tracing::debug!(%addr, "mock server stopped");
    }
}

/// A builder for creating customized servers.
pub struct Builder {
    dispatcher: Dispatcher,
    bind_addr: SocketAddr,
    thread_name: String,
}

impl Builder {
    /// Set the address to listen on. Defaults to port 0 on `127.0.0.1`, which
    /// lets the operating system pick a free port.
    pub fn bind_addr(mut self, addr: impl Into<SocketAddr>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    /// Set the name of the thread that accepts connections.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Register a fixed response, as in [`Server::register_payload`].
    pub fn payload(
        self,
        method: impl AsRef<str>,
        path: impl AsRef<str>,
        status_code: u16,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        self.dispatcher
            .register_payload(method.as_ref(), path.as_ref(), status_code, body.into());
        self
    }

    /// Register a custom handler, as in [`Server::register_handler`].
    pub fn handler(self, method: impl AsRef<str>, path: impl AsRef<str>, handler: impl Handler) -> Self {
        self.dispatcher
            .register_handler(method.as_ref(), path.as_ref(), handler);
        self
    }

    /// Set an override handler, as in [`Server::set_override`].
    pub fn override_handler(self, handler: impl Handler) -> Self {
        self.dispatcher.set_override(handler);
        self
    }

    /// Create the server. It does not listen until started.
    pub fn build(self) -> Server {
        Server {
            dispatcher: Arc::new(self.dispatcher),
            bind_addr: self.bind_addr,
            thread_name: self.thread_name,
            lifecycle: Mutex::new(Lifecycle::Created),
        }
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("bind_addr", &self.bind_addr)
            .field("thread_name", &self.thread_name)
            .finish()
    }
}

/// Pull requests off of the listener until it is unblocked, handing each to
/// the handler pool.
fn accept(server: &tiny_http::Server, dispatcher: &Arc<Dispatcher>) {
    for request in server.incoming_requests() {
        spawn_handler(dispatcher, request);
    }

    // Requests parsed while the server was being unblocked are still answered.
    while let Ok(Some(request)) = server.try_recv() {
        spawn_handler(dispatcher, request);
    }

    tracing::trace!("acceptor exiting");
}

fn spawn_handler(dispatcher: &Arc<Dispatcher>, request: tiny_http::Request) {
    let dispatcher = dispatcher.clone();

    pool().execute(move || handle(&dispatcher, request));
}

fn handle(dispatcher: &Dispatcher, mut request: tiny_http::Request) {
    let record = Request::read_from(&mut request);
    let version = request.http_version().clone();
    let include_body = *request.method() != tiny_http::Method::Head;
    let response = dispatcher.dispatch(record);

    if let Err(e) = response.write_to(request.into_writer(), &version, include_body) {
        tracing::debug!("failed to write response: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        io::{self, Read, Write},
        net::TcpStream,
        time::Duration,
    };

    static_assertions::assert_impl_all!(Server: Send, Sync);
    static_assertions::assert_impl_all!(Builder: Send);

    /// Send a bare HTTP/1.1 request and return the raw response.
    fn raw_request(addr: SocketAddr, method: &str, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();

        write!(
            stream,
            "{} {} HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\ncontent-length: 0\r\n\r\n",
            method, path
        )
        .unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    }

    #[test]
    fn new_server_is_not_running() {
        let server = Server::new();

        assert!(!server.is_running());
        assert_eq!(server.addr(), None);
    }

    #[test]
    #[should_panic(expected = "server has not been started")]
    fn url_before_start_panics() {
        Server::new().url();
    }

    #[test]
    fn start_binds_loopback_ephemeral_port() {
        let server = Server::new();
        let addr = server.start().unwrap();

        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
        assert_eq!(server.addr(), Some(addr));
        assert_eq!(server.url(), format!("http://{}", addr));
        assert!(server.is_running());
    }

    #[test]
    fn start_twice_is_an_error() {
        let server = Server::new();
        server.start().unwrap();

        assert!(matches!(server.start(), Err(Error::AlreadyRunning)));
        assert!(server.is_running());
    }

    #[test]
    fn stop_without_start_is_an_error() {
        let server = Server::new();

        assert!(matches!(server.stop(), Err(Error::NotRunning)));
    }

    #[test]
    fn stop_twice_is_an_error() {
        let server = Server::new();
        let addr = server.start().unwrap();

        server.stop().unwrap();

        assert!(!server.is_running());
        assert_eq!(server.addr(), Some(addr));
        assert!(matches!(server.stop(), Err(Error::NotRunning)));
    }

    #[test]
    fn binding_a_taken_port_fails() {
        let first = Server::new();
        let addr = first.start().unwrap();

        let second = Server::builder().bind_addr(addr).build();

        match second.start() {
            Err(Error::Bind(e)) => assert_eq!(e.kind(), io::ErrorKind::AddrInUse),
            other => panic!("expected bind error, got {:?}", other),
        }
        assert!(!second.is_running());
    }

    #[test]
    fn restart_keeps_state() {
        let server = Server::builder()
            .payload("GET", "/hello", 200, "hello")
            .build();

        let addr = server.start().unwrap();
        assert!(raw_request(addr, "GET", "/hello").ends_with("hello"));
        server.stop().unwrap();

        let addr = server.start().unwrap();
        assert!(raw_request(addr, "GET", "/hello").ends_with("hello"));
        assert_eq!(server.request_count(), 2);
    }

    #[test]
    fn raw_requests_are_dispatched() {
        let server = Server::builder()
            .payload("POST", "/hello", 201, "made")
            .build();
        let addr = server.start().unwrap();

        assert!(raw_request(addr, "POST", "/hello").starts_with("HTTP/1.1 201"));
        assert!(raw_request(addr, "GET", "/hello").starts_with("HTTP/1.1 405"));
        assert!(raw_request(addr, "GET", "/other").starts_with("HTTP/1.1 404"));

        assert_eq!(server.request_count(), 3);
        assert_eq!(server.request_num(2).url, "/other");
    }

    #[test]
    fn builder_override_handler_answers_everything() {
        let server = Server::builder()
            .payload("GET", "/hello", 200, "hello")
            .override_handler(|_: &Request| crate::Response::new(503))
            .build();
        let addr = server.start().unwrap();

        assert!(raw_request(addr, "GET", "/hello").starts_with("HTTP/1.1 503"));
    }

    #[test]
    fn keep_alive_requests_are_answered_with_connection_close() {
        let server = Server::builder()
            .payload("GET", "/hello", 200, "hello")
            .build();
        let addr = server.start().unwrap();

        let mut stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        stream
            .write_all(b"GET /hello HTTP/1.1\r\nhost: localhost\r\n\r\n")
            .unwrap();

        let mut response = Vec::new();
        let mut chunk = [0; 1024];

        while !response.ends_with(b"hello") {
            let len = stream.read(&mut chunk).unwrap();
            assert_ne!(len, 0, "connection closed before the response was complete");
            response.extend_from_slice(&chunk[..len]);
        }

        let response = String::from_utf8(response).unwrap();

        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("connection: close\r\n"));
        assert!(response.ends_with("\r\n\r\nhello"));
    }

    #[test]
    fn head_requests_get_headers_only() {
        let server = Server::builder()
            .payload("HEAD", "/hello", 200, "hello")
            .build();
        let addr = server.start().unwrap();

        let response = raw_request(addr, "HEAD", "/hello");

        assert!(response.contains("content-length: 5\r\n"));
        assert!(response.ends_with("\r\n\r\n"));
    }

    #[test]
    fn stop_refuses_new_connections() {
        let server = Server::new();
        let addr = server.start().unwrap();

        server.stop().unwrap();

        // The listening socket is released by a background thread shortly
        // after stopping.
        for _ in 0..9 {
            match TcpStream::connect(addr) {
                Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => return,
                _ => thread::sleep(Duration::from_millis(50)),
            }
        }

        panic!("server still accepted connections after being stopped");
    }

    #[test]
    fn builder_debug_shows_configuration() {
        let builder = Server::builder().thread_name("custom-acceptor");

        assert!(format!("{:?}", builder).contains("custom-acceptor"));
    }

    #[test]
    fn dropping_a_running_server_does_not_hang() {
        let server = Server::new();
        server.start().unwrap();

        drop(server);
    }
}
