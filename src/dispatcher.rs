//! Routing table, override handler and request log shared between a server's
//! handler threads and the test driving it.

use crate::{
    handler::{Handler, Payload},
    request::Request,
    response::Response,
};
use crossbeam_utils::sync::{ShardedLock, ShardedLockReadGuard, ShardedLockWriteGuard};
use std::{collections::HashMap, sync::{Arc, PoisonError}};

/// Handlers keyed by path, then by lowercased method.
type Routes = HashMap<String, HashMap<String, Arc<dyn Handler>>>;

#[derive(Default)]
struct State {
    routes: Routes,

    /// When set, answers every request instead of the routing table.
    override_handler: Option<Arc<dyn Handler>>,

    /// Every request received since creation or the last reset, in arrival
    /// order. Shared with the handler answering it, so recording never copies
    /// a body while the lock is held.
    requests: Vec<Arc<Request>>,
}

/// Decides which handler answers each incoming request.
///
/// All state lives behind a single lock. Dispatch takes the write lock only
/// long enough to record the request and pick a handler; handlers themselves
/// run after it is released.
#[derive(Default)]
pub(crate) struct Dispatcher {
    state: ShardedLock<State>,
}

impl Dispatcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register_payload(&self, method: &str, path: &str, status_code: u16, body: Vec<u8>) {
        self.register_handler(method, path, Payload::new(status_code, body));
    }

    pub(crate) fn register_handler(&self, method: &str, path: &str, handler: impl Handler) {
        self.write()
            .routes
            .entry(path.to_owned())
            .or_default()
            .insert(method.to_lowercase(), Arc::new(handler));
    }

    pub(crate) fn set_override(&self, handler: impl Handler) {
        self.write().override_handler = Some(Arc::new(handler));
    }

    pub(crate) fn clear_override(&self) {
        self.write().override_handler = None;
    }

    pub(crate) fn reset(&self) {
        let mut state = self.write();

        state.routes.clear();
        state.override_handler = None;
        state.requests.clear();
    }

    pub(crate) fn request_count(&self) -> usize {
        self.read().requests.len()
    }

    pub(crate) fn request_num(&self, index: usize) -> Request {
        let request = {
            let state = self.read();

            match state.requests.get(index) {
                Some(request) => request.clone(),
                None => panic!(
                    "request index {} out of range: {} requests received",
                    index,
                    state.requests.len()
                ),
            }
        };

        Request::clone(&request)
    }

    pub(crate) fn requests(&self) -> Vec<Request> {
        let requests = self.read().requests.clone();

        requests.iter().map(|request| Request::clone(request)).collect()
    }

    /// Record a request and produce the response to send back for it.
    pub(crate) fn dispatch(&self, request: Request) -> Response {
        let request = Arc::new(request);

        let handler = {
            let mut state = self.write();
            let handler = state.select(&request);

            state.requests.push(request.clone());

            handler
        };

        match handler {
            Ok(handler) => handler.handle(&request),
            Err(response) => response,
        }
    }

    fn read(&self) -> ShardedLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> ShardedLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl State {
    /// Pick the handler for a request, or the response to send when no route
    /// matches.
    fn select(&self, request: &Request) -> Result<Arc<dyn Handler>, Response> {
        if let Some(handler) = self.override_handler.as_ref() {
            tracing::trace!(method = %request.method, url = %request.url, "dispatching to override handler");
            return Ok(handler.clone());
        }

        let methods = match self.routes.get(request.path()) {
            Some(methods) => methods,
            None => {
                tracing::trace!(method = %request.method, url = %request.url, "no route for path");
                return Err(Response::not_found());
            }
        };

        match methods.get(&request.method.to_lowercase()) {
            Some(handler) => {
                tracing::trace!(method = %request.method, url = %request.url, "dispatching to route handler");
                Ok(handler.clone())
            }
            None => {
                tracing::trace!(method = %request.method, url = %request.url, "method not allowed for path");
                Err(Response::method_not_allowed())
            }
        }
    }
}
