//! Shared thread pool for running request handlers.
//!
//! Every running server gets its own listener and acceptor thread, but the
//! threads that invoke handlers are shared across all servers in the process
//! so that a test suite starting many servers does not spawn a thread per
//! request.

use once_cell::sync::Lazy;
use threadfin::ThreadPool;

/// Get access to the shared handler pool.
pub(crate) fn pool() -> &'static ThreadPool {
    // Grows to as many threads as are needed to keep slow handlers from
    // blocking each other, while still allowing reuse.
    static POOL: Lazy<ThreadPool> = Lazy::new(|| {
        ThreadPool::builder().size(..100).build()
    });

    &POOL
}
