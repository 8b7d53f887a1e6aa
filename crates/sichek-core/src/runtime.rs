//! The `Runtime` bundle: the process-wide singletons re-modeled as ordinary
//! `Arc`-held values threaded through constructors, instead of global
//! statics. Each independent agent process, and each test, owns its own
//! `Runtime`, so state is never shared by accident.

use std::sync::Arc;

use crate::registry::RegexRegistry;
use crate::scheduler::LoadScheduler;

/// Everything an `EventFilter`/`CommandFilter` needs that would otherwise be
/// a global: the interned regex table and the file-loading scheduler (which
/// doubles as the `FileLoader` interning registry, see `scheduler`'s module
/// doc). Cheap to clone; every field is already `Arc`-wrapped.
#[derive(Clone)]
pub struct Runtime {
    pub regex_registry: Arc<RegexRegistry>,
    pub load_scheduler: Arc<LoadScheduler>,
}

impl Runtime {
    pub fn new() -> Self {
        Runtime {
            regex_registry: Arc::new(RegexRegistry::new()),
            load_scheduler: LoadScheduler::new(),
        }
    }

    /// Starts the single background load-scheduler worker. Idempotent.
    pub fn start(&self) {
        self.load_scheduler.start();
    }

    /// Stops the background worker, leaving loaders and their cached lines
    /// intact so a later `start()` resumes ticking over the same state.
    pub async fn stop(&self) {
        self.load_scheduler.stop().await;
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
