//! Load Scheduler: a single periodic worker that invokes every registered
//! `FileLoader` on a fixed interval, and doubles as the `FileLoader`
//! interning registry (interned by path, process-wide). This is the one
//! place loaders are created, reference counted by interest, and dropped,
//! so there is never a cycle between an `EventFilter` and the loaders it
//! reads.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::{Result, SichekError};
use crate::file_loader::FileLoader;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

struct Entry {
    loader: Arc<FileLoader>,
    interest: u32,
}

struct Worker {
    cancel: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

pub struct LoadScheduler {
    loaders: Mutex<HashMap<PathBuf, Entry>>,
    interval_ms: AtomicU64,
    worker: Mutex<Option<Worker>>,
}

impl LoadScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(LoadScheduler {
            loaders: Mutex::new(HashMap::new()),
            interval_ms: AtomicU64::new(DEFAULT_INTERVAL.as_millis() as u64),
            worker: Mutex::new(None),
        })
    }

    /// Returns the interned loader for `path`, creating it on first use and
    /// incrementing its interest count on every call (including the first).
    /// `cache_size`/`skip_percent` only take effect on first creation.
    pub fn get_or_create_loader(
        &self,
        path: &Path,
        cache_size: usize,
        skip_percent: i32,
    ) -> Result<Arc<FileLoader>> {
        let mut loaders = self.loaders.lock().unwrap();
        if let Some(entry) = loaders.get_mut(path) {
            entry.interest += 1;
            return Ok(entry.loader.clone());
        }
        let loader = Arc::new(FileLoader::open(path, cache_size, skip_percent)?);
        loaders.insert(
            path.to_path_buf(),
            Entry {
                loader: loader.clone(),
                interest: 1,
            },
        );
        Ok(loader)
    }

    /// Releases one unit of interest in the loader for `path`. When interest
    /// drops to zero the loader is unregistered (dropped out of the
    /// scheduler's map); the `EventFilter`s that already cloned the `Arc`
    /// keep their own handle until they drop it too.
    pub fn release_interest(&self, path: &Path) {
        let mut loaders = self.loaders.lock().unwrap();
        if let Some(entry) = loaders.get_mut(path) {
            entry.interest = entry.interest.saturating_sub(1);
            if entry.interest == 0 {
                loaders.remove(path);
                tracing::debug!(path = %path.display(), "loader unregistered, no remaining interest");
            }
        }
    }

    pub fn registered_count(&self) -> usize {
        self.loaders.lock().unwrap().len()
    }

    /// Atomically swaps the tick interval; non-positive values are rejected.
    pub fn set_interval(&self, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(SichekError::Config(
                "load scheduler interval must be positive".into(),
            ));
        }
        self.interval_ms
            .store(interval.as_millis() as u64, Ordering::SeqCst);
        Ok(())
    }

    fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.load(Ordering::SeqCst))
    }

    /// Idempotently launches the single background worker. A second call
    /// while already running is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut worker = self.worker.lock().unwrap();
        if worker.is_some() {
            return;
        }
        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        let this = self.clone();
        let task = tokio::spawn(async move {
            loop {
                let interval = this.interval();
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = &mut cancel_rx => break,
                }
                let loaders: Vec<Arc<FileLoader>> = {
                    let map = this.loaders.lock().unwrap();
                    map.values().map(|e| e.loader.clone()).collect()
                };
                for loader in loaders {
                    if let Err(err) = loader.load() {
                        tracing::warn!(
                            path = %loader.path().display(),
                            error = %err,
                            "load cycle failed for loader"
                        );
                    }
                }
            }
        });
        *worker = Some(Worker {
            cancel: cancel_tx,
            task,
        });
    }

    /// Signals the worker to exit and waits for it to finish, resetting the
    /// start-once guard so a later `start()` launches a fresh worker.
    pub async fn stop(&self) {
        let worker = self.worker.lock().unwrap().take();
        if let Some(worker) = worker {
            let _ = worker.cancel.send(());
            let _ = worker.task.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().unwrap().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn get_or_create_interns_by_path_and_counts_interest() {
        let sched = LoadScheduler::new();
        let tmp = NamedTempFile::new().unwrap();
        let a = sched.get_or_create_loader(tmp.path(), 10, 0).unwrap();
        let b = sched.get_or_create_loader(tmp.path(), 10, 0).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(sched.registered_count(), 1);

        sched.release_interest(tmp.path());
        assert_eq!(sched.registered_count(), 1); // one interest remains
        sched.release_interest(tmp.path());
        assert_eq!(sched.registered_count(), 0);
    }

    #[test]
    fn set_interval_rejects_non_positive() {
        let sched = LoadScheduler::new();
        assert!(sched.set_interval(Duration::from_secs(0)).is_err());
        assert!(sched.set_interval(Duration::from_millis(10)).is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn start_ticks_and_stop_resets_guard() {
        let sched = LoadScheduler::new();
        sched.set_interval(Duration::from_millis(20)).unwrap();
        let tmp = NamedTempFile::new().unwrap();
        let loader = sched.get_or_create_loader(tmp.path(), 10, 0).unwrap();

        sched.start();
        assert!(sched.is_running());

        {
            let mut f = std::fs::OpenOptions::new()
                .append(true)
                .open(tmp.path())
                .unwrap();
            writeln!(f, "hello").unwrap();
        }

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(loader.total_lines_read() >= 1);

        sched.stop().await;
        assert!(!sched.is_running());

        // Restart works after stop.
        sched.start();
        assert!(sched.is_running());
        sched.stop().await;
    }
}
