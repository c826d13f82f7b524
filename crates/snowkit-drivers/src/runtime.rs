//! Shared Tokio runtime for the blocking API
//!
//! Synchronous callers (scripts, the blocking facade) have no runtime of
//! their own, so a small shared one is created lazily and reused.

use std::sync::OnceLock;
use tokio::runtime::Runtime;

static TOKIO_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Get or create the shared Tokio runtime.
///
/// # Panics
///
/// Panics if the runtime cannot be created.
pub fn get_tokio_runtime() -> &'static Runtime {
    TOKIO_RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .thread_name("snowkit-runtime")
            .build()
            .expect("Failed to create Tokio runtime for snowkit")
    })
}

/// Block the current thread on `future` using the shared runtime.
///
/// Must not be called from inside an async context; Tokio panics when a
/// runtime is entered twice on one thread.
pub fn block_on_tokio<F, T>(future: F) -> T
where
    F: std::future::Future<Output = T>,
{
    get_tokio_runtime().block_on(future)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_on_returns_value() {
        assert_eq!(block_on_tokio(async { 40 + 2 }), 42);
    }

    #[test]
    fn test_runtime_is_shared() {
        let a = get_tokio_runtime() as *const Runtime;
        let b = get_tokio_runtime() as *const Runtime;
        assert_eq!(a, b);
    }
}
