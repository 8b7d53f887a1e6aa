//! Component: ties one collector and its checkers together, runs a health
//! check on demand, and keeps a fixed-size ring of past results and
//! snapshots for inspection between checks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use chrono::Utc;

use crate::checker::Checker;
use crate::collector::Collector;
use crate::config::ComponentConfig;
use crate::error::{Result, SichekError};
use crate::result::CheckResult;

/// One health-checked subsystem (cpu, nvidia, syslog, ...). `I` is the
/// collector's snapshot type; every checker in `checkers` must accept the
/// same `I`.
///
/// Changing `cache_size` via `update` does not resize the ring in place
/// (doing so live would require draining readers mid-resize); it takes
/// effect only for a component rebuilt with the new config.
pub struct Component<I> {
    name: String,
    cfg: RwLock<Arc<ComponentConfig>>,
    collector: Arc<dyn Collector<I>>,
    checkers: Vec<Arc<dyn Checker<I>>>,
    cache_size: usize,
    result_ring: RwLock<Vec<Option<CheckResult>>>,
    info_ring: RwLock<Vec<Option<I>>>,
    total_checks: AtomicU64,
}

impl<I: Clone + Send + Sync + 'static> Component<I> {
    /// Builds the component, validating `cfg` and catching any panic raised
    /// while building (e.g. an invariant assertion on `name`) and turning it
    /// into `SichekError::Construction` rather than unwinding into the
    /// caller.
    pub fn new(
        name: impl Into<String>,
        cfg: ComponentConfig,
        collector: Arc<dyn Collector<I>>,
        checkers: Vec<Arc<dyn Checker<I>>>,
    ) -> Result<Self> {
        cfg.validate()?;
        let name = name.into();
        let cache_size = cfg.cache_size;
        let build = std::panic::AssertUnwindSafe(move || {
            assert!(!name.trim().is_empty(), "component name must not be empty");
            Component {
                name,
                cfg: RwLock::new(Arc::new(cfg)),
                collector,
                checkers,
                cache_size,
                result_ring: RwLock::new(vec![None; cache_size]),
                info_ring: RwLock::new(vec![None; cache_size]),
                total_checks: AtomicU64::new(0),
            }
        });
        std::panic::catch_unwind(build)
            .map_err(|_| SichekError::Construction("component panicked during construction".into()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Collects a fresh snapshot, runs every non-ignored checker against it,
    /// aggregates the results, writes both into the ring, and returns the
    /// aggregated `CheckResult`. A single checker's failure is logged and
    /// excluded from aggregation rather than aborting the whole check.
    pub async fn health_check(&self) -> Result<CheckResult> {
        let cfg = self.cfg.read().unwrap().clone();
        let info = self.collector.collect().await?;

        let mut checker_results = Vec::with_capacity(self.checkers.len());
        for checker in &self.checkers {
            if cfg.is_ignored(checker.name()) {
                continue;
            }
            match checker.check(&info).await {
                Ok(result) => checker_results.push(result),
                Err(err) => {
                    tracing::warn!(
                        component = %self.name,
                        checker = checker.name(),
                        error = %err,
                        "checker failed, excluding from this cycle"
                    );
                }
            }
        }

        let result = CheckResult::aggregate(self.name.clone(), None, checker_results, Utc::now());

        let slot_index = self.total_checks.fetch_add(1, Ordering::SeqCst);
        let slot = (slot_index % self.cache_size as u64) as usize;
        self.result_ring.write().unwrap()[slot] = Some(result.clone());
        self.info_ring.write().unwrap()[slot] = Some(info);

        if result.status.is_abnormal() {
            tracing::warn!(component = %self.name, level = %result.level, "health check abnormal");
        } else {
            tracing::debug!(component = %self.name, "health check normal");
        }

        Ok(result)
    }

    /// The most recently recorded `CheckResult`, if any check has run.
    pub fn last_result(&self) -> Option<CheckResult> {
        let total = self.total_checks.load(Ordering::SeqCst);
        if total == 0 {
            return None;
        }
        let slot = ((total - 1) % self.cache_size as u64) as usize;
        self.result_ring.read().unwrap()[slot].clone()
    }

    /// The most recently recorded collector snapshot, if any check has run.
    pub fn last_info(&self) -> Option<I> {
        let total = self.total_checks.load(Ordering::SeqCst);
        if total == 0 {
            return None;
        }
        let slot = ((total - 1) % self.cache_size as u64) as usize;
        self.info_ring.read().unwrap()[slot].clone()
    }

    /// Every cached `CheckResult` still in the ring, oldest first.
    pub fn cache_results(&self) -> Vec<CheckResult> {
        let total = self.total_checks.load(Ordering::SeqCst);
        let n = self.cache_size as u64;
        let start = total.saturating_sub(n);
        let ring = self.result_ring.read().unwrap();
        (start..total)
            .filter_map(|i| ring[(i % n) as usize].clone())
            .collect()
    }

    /// Every cached collector snapshot still in the ring, oldest first.
    pub fn cache_infos(&self) -> Vec<I> {
        let total = self.total_checks.load(Ordering::SeqCst);
        let n = self.cache_size as u64;
        let start = total.saturating_sub(n);
        let ring = self.info_ring.read().unwrap();
        (start..total)
            .filter_map(|i| ring[(i % n) as usize].clone())
            .collect()
    }

    /// Atomically swaps the live configuration after validating it.
    pub fn update(&self, cfg: ComponentConfig) -> Result<()> {
        cfg.validate()?;
        *self.cfg.write().unwrap() = Arc::new(cfg);
        Ok(())
    }

    pub fn config(&self) -> Arc<ComponentConfig> {
        self.cfg.read().unwrap().clone()
    }
}

/// One-shot construction guard for a domain's `Component`: the first call
/// builds it, every repeated call observes that same instance (or the same
/// construction error) rather than building again. Rust has no implicit
/// per-type global state, so this is an ordinary value the caller holds
/// once per domain (one `ComponentGuard<CpuInfo>`, one
/// `ComponentGuard<NvidiaInfo>`, ...) rather than a hidden static, the same
/// way `Runtime` makes the other process-wide registries explicit instead
/// of global.
pub struct ComponentGuard<I> {
    once: OnceLock<std::result::Result<Arc<Component<I>>, Arc<SichekError>>>,
}

impl<I: Clone + Send + Sync + 'static> ComponentGuard<I> {
    pub fn new() -> Self {
        ComponentGuard { once: OnceLock::new() }
    }

    /// Builds the component on the first call; every later call, regardless
    /// of the arguments passed, returns the same `Arc` (or the same
    /// construction error) instead of building again.
    pub fn get_or_init(
        &self,
        name: impl Into<String>,
        cfg: ComponentConfig,
        collector: Arc<dyn Collector<I>>,
        checkers: Vec<Arc<dyn Checker<I>>>,
    ) -> std::result::Result<Arc<Component<I>>, Arc<SichekError>> {
        self.once
            .get_or_init(|| {
                Component::new(name, cfg, collector, checkers)
                    .map(Arc::new)
                    .map_err(Arc::new)
            })
            .clone()
    }
}

impl<I> Default for ComponentGuard<I> {
    fn default() -> Self {
        ComponentGuard { once: OnceLock::new() }
    }
}
