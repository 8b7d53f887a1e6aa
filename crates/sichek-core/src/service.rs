//! CommonService: the uniform lifecycle wrapper around a `Component`. Runs
//! the component's health check on a fixed interval under a per-invocation
//! timeout, and publishes each cycle's result on a bounded, non-blocking
//! output channel.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::component::Component;
use crate::error::{Result, SichekError};
use crate::level::Level;
use crate::result::{CheckResult, CheckerResult, Status};

struct Worker {
    cancel: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Drives one `Component` on a timer. Started and stopped independently of
/// the component it wraps, so a component can be constructed, health-checked
/// directly (e.g. in a one-shot CLI run), and only later handed to a service
/// for continuous operation.
pub struct CommonService<I> {
    name: String,
    component: std::sync::Arc<Component<I>>,
    timeout: Duration,
    interval_ms: AtomicU64,
    tx: mpsc::Sender<CheckResult>,
    rx: Mutex<Option<mpsc::Receiver<CheckResult>>>,
    worker: Mutex<Option<Worker>>,
    /// Set once a cycle times out; cleared (with a resolution checker
    /// appended) the next time a cycle completes successfully.
    had_timeout: AtomicBool,
}

impl<I: Clone + Send + Sync + 'static> CommonService<I> {
    pub fn new(
        name: impl Into<String>,
        component: std::sync::Arc<Component<I>>,
        interval: Duration,
        timeout: Duration,
        channel_capacity: usize,
    ) -> Result<std::sync::Arc<Self>> {
        if interval.is_zero() {
            return Err(SichekError::Config("service interval must be positive".into()));
        }
        if timeout.is_zero() {
            return Err(SichekError::Config("service timeout must be positive".into()));
        }
        let (tx, rx) = mpsc::channel(channel_capacity.max(1));
        Ok(std::sync::Arc::new(CommonService {
            name: name.into(),
            component,
            timeout,
            interval_ms: AtomicU64::new(interval.as_millis() as u64),
            tx,
            rx: Mutex::new(Some(rx)),
            worker: Mutex::new(None),
            had_timeout: AtomicBool::new(false),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Takes ownership of the output receiver. Returns `None` on a second
    /// call; there is exactly one consumer per service.
    pub fn take_receiver(&self) -> Option<mpsc::Receiver<CheckResult>> {
        self.rx.lock().unwrap().take()
    }

    pub fn set_interval(&self, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(SichekError::Config("service interval must be positive".into()));
        }
        self.interval_ms.store(interval.as_millis() as u64, Ordering::SeqCst);
        Ok(())
    }

    fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.load(Ordering::SeqCst))
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().unwrap().is_some()
    }

    /// Idempotently launches the driver task. A second call while already
    /// running is a no-op.
    pub fn start(self: &std::sync::Arc<Self>) {
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

                let outcome = tokio::time::timeout(this.timeout, this.component.health_check()).await;
                let result = match outcome {
                    Ok(Ok(mut result)) => {
                        if this.had_timeout.swap(false, Ordering::SeqCst) {
                            result.checkers.push(CheckerResult::normal(
                                format!("{}HealthCheckTimeout", this.name),
                                format!("component {} resumed responding within the timeout", this.name),
                            ));
                            result = CheckResult::aggregate(
                                result.item.clone(),
                                result.node.clone(),
                                result.checkers,
                                result.time,
                            );
                        }
                        result
                    }
                    Ok(Err(err)) => {
                        tracing::warn!(service = %this.name, error = %err, "health check cycle failed, skipping");
                        continue;
                    }
                    Err(_elapsed) => {
                        this.had_timeout.store(true, Ordering::SeqCst);
                        tracing::warn!(service = %this.name, timeout = ?this.timeout, "health check timed out");
                        timeout_result(&this.name, this.timeout, Utc::now())
                    }
                };

                match this.tx.try_send(result) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!(service = %this.name, "output channel full, dropping result");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }
        });
        *worker = Some(Worker { cancel: cancel_tx, task });
    }

    /// Signals the driver task to exit and waits for it, resetting the
    /// start-once guard so a later `start()` launches a fresh task.
    pub async fn stop(&self) {
        let worker = self.worker.lock().unwrap().take();
        if let Some(worker) = worker {
            let _ = worker.cancel.send(());
            let _ = worker.task.await;
        }
    }
}

/// Builds the synthesized `<Component>HealthCheckTimeout` result.
fn timeout_result(name: &str, timeout: Duration, now: chrono::DateTime<Utc>) -> CheckResult {
    let checker_name = format!("{name}HealthCheckTimeout");
    let checker = CheckerResult {
        name: checker_name.clone(),
        description: format!("component {name} did not return within {timeout:?}"),
        spec: String::new(),
        curr: String::new(),
        device: String::new(),
        status: Status::Abnormal,
        level: Level::Critical,
        error_name: checker_name,
        detail: String::new(),
        suggestion: "check component".into(),
    };
    CheckResult::aggregate(name, None, vec![checker], now)
}
