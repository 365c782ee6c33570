//! Types for error handling.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// All possible errors that can be returned from controlling a mock server's
/// lifecycle.
///
/// Routing misses are not errors: an unknown path is answered with a 404 and a
/// known path with an unregistered method with a 405.
#[derive(Debug)]
pub enum Error {
    /// The listening socket could not be bound.
    Bind(io::Error),
    /// The thread accepting connections could not be spawned.
    Spawn(io::Error),
    /// The server was started while it was already running.
    AlreadyRunning,
    /// The server was stopped while it was not running, either because it was
    /// never started or because it was already stopped.
    NotRunning,
}

impl Error {
    /// Wrap an error from creating a listener, keeping the underlying I/O
    /// error kind when there is one.
    pub(crate) fn bind(error: Box<dyn StdError + Send + Sync>) -> Self {
        match error.downcast::<io::Error>() {
            Ok(e) => Error::Bind(*e),
            Err(e) => Error::Bind(io::Error::new(io::ErrorKind::Other, e)),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Bind(e) => write!(f, "failed to bind listener: {}", e),
            Error::Spawn(e) => write!(f, "failed to spawn acceptor thread: {}", e),
            Error::AlreadyRunning => f.write_str("server is already running"),
            Error::NotRunning => f.write_str("server is not running"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Bind(e) | Error::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

#[doc(hidden)]
impl From<Error> for io::Error {
    fn from(error: Error) -> io::Error {
        match error {
            Error::Bind(e) | Error::Spawn(e) => e,
            Error::AlreadyRunning => io::ErrorKind::AlreadyExists.into(),
            Error::NotRunning => io::ErrorKind::NotConnected.into(),
        }
    }
}
