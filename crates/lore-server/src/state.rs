//! Application state shared across handlers.

use lore_mcp::Dispatcher;
use lore_store::SharedBackend;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Protocol dispatcher wrapping the tool router.
    pub dispatcher: Dispatcher,

    /// The storage backend, kept for health reporting.
    pub backend: SharedBackend,
}

impl AppState {
    /// Create application state around a shared backend.
    pub fn new(backend: SharedBackend) -> Self {
        Self {
            dispatcher: Dispatcher::new(backend.clone()),
            backend,
        }
    }

    /// Name of the active backend.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("backend", &self.backend.name())
            .finish_non_exhaustive()
    }
}
