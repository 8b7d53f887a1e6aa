//! Checker shapes: the per-component units a `Component` runs against its
//! collected snapshot. Every checker produces a `CheckerResult`; a
//! `Component` runs its whole list and hands the results to
//! `CheckResult::aggregate`.
//!
//! `CheckTemplate` is immutable description data that every invocation
//! clones into a fresh `CheckerResult` via `normal()`/`abnormal()`. No
//! checker holds a `CheckerResult` across invocations, so concurrent or
//! repeated runs never see a half-updated result.

use async_trait::async_trait;

use crate::error::Result;
use crate::level::Level;
use crate::result::{CheckerResult, Status};

/// `Check(ctx, data) -> CheckerResult | error`, where `I` is the component's
/// typed snapshot ("Info"). Implementors are expected to do nothing beyond
/// short, local system calls; anything that blocks on I/O for a meaningful
/// time belongs in the `Collector` instead.
#[async_trait]
pub trait Checker<I>: Send + Sync {
    fn name(&self) -> &str;
    async fn check(&self, info: &I) -> Result<CheckerResult>;
}

/// Immutable description shared by every invocation of one checker. Cloned
/// into a concrete `CheckerResult` on each run rather than mutated in place,
/// so concurrent or repeated invocations never see a half-updated result.
#[derive(Debug, Clone)]
pub struct CheckTemplate {
    pub name: String,
    pub description: String,
    pub error_name: String,
    pub suggestion: String,
}

impl CheckTemplate {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        error_name: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        CheckTemplate {
            name: name.into(),
            description: description.into(),
            error_name: error_name.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn normal(&self) -> CheckerResult {
        CheckerResult {
            name: self.name.clone(),
            description: self.description.clone(),
            spec: String::new(),
            curr: String::new(),
            device: String::new(),
            status: Status::Normal,
            level: Level::Info,
            error_name: String::new(),
            detail: String::new(),
            suggestion: String::new(),
        }
    }

    pub fn abnormal(
        &self,
        level: Level,
        spec: impl Into<String>,
        curr: impl Into<String>,
        device: impl Into<String>,
        detail: impl Into<String>,
    ) -> CheckerResult {
        CheckerResult {
            name: self.name.clone(),
            description: self.description.clone(),
            spec: spec.into(),
            curr: curr.into(),
            device: device.into(),
            status: Status::Abnormal,
            level,
            error_name: self.error_name.clone(),
            detail: detail.into(),
            suggestion: self.suggestion.clone(),
        }
    }
}

/// Direction a threshold checker compares in: most thresholds are "abnormal
/// when the observed value exceeds the spec" (error counts, temperatures),
/// but bandwidth-like metrics such as NVLink/PCIe throughput are "abnormal
/// when the observed value falls *below* the spec". Kept explicit per
/// instance rather than inferred from the metric name, so a bandwidth
/// checker can never be silently built with the error-count sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdDirection {
    /// Abnormal when `observed > spec` (error counts, temperatures).
    AbnormalAboveSpec,
    /// Abnormal when `observed < spec` (bandwidth, link width/speed).
    AbnormalBelowSpec,
}

/// Compares one observed numeric value against a spec-provided bound.
pub struct ThresholdChecker {
    template: CheckTemplate,
    level: Level,
    direction: ThresholdDirection,
}

impl ThresholdChecker {
    pub fn new(template: CheckTemplate, level: Level, direction: ThresholdDirection) -> Self {
        ThresholdChecker {
            template,
            level,
            direction,
        }
    }

    pub fn name(&self) -> &str {
        &self.template.name
    }

    /// Evaluates `observed` against `spec_value` for one `device`.
    pub fn evaluate(&self, observed: f64, spec_value: f64, device: impl Into<String>) -> CheckerResult {
        let abnormal = match self.direction {
            ThresholdDirection::AbnormalAboveSpec => observed > spec_value,
            ThresholdDirection::AbnormalBelowSpec => observed < spec_value,
        };
        if !abnormal {
            return self.template.normal();
        }
        self.template.abnormal(
            self.level,
            format!("{spec_value}"),
            format!("{observed}"),
            device,
            format!("observed {observed}, spec {spec_value}"),
        )
    }
}

/// Re-reads a piece of live state, out of band from the component's
/// collected snapshot, for the state checker's re-verification step.
#[async_trait]
pub trait StateReader: Send + Sync {
    async fn read(&self) -> Result<String>;
}

/// Attempts to bring live state back to the expected value: attempt
/// remediation, re-read state, report the final state, and mark normal only
/// on a successful reassert.
#[async_trait]
pub trait Remediator: Send + Sync {
    async fn remediate(&self) -> Result<()>;
}

/// Compares a directly re-read piece of state (e.g. a CPU governor, a kernel
/// module's loaded/unloaded state) against an expected value, optionally
/// attempting an online remediation before reporting.
pub struct StateChecker {
    template: CheckTemplate,
    level: Level,
    expected: String,
    reader: Box<dyn StateReader>,
    remediator: Option<Box<dyn Remediator>>,
}

impl StateChecker {
    pub fn new(
        template: CheckTemplate,
        level: Level,
        expected: impl Into<String>,
        reader: Box<dyn StateReader>,
    ) -> Self {
        StateChecker {
            template,
            level,
            expected: expected.into(),
            reader,
            remediator: None,
        }
    }

    pub fn with_remediator(mut self, remediator: Box<dyn Remediator>) -> Self {
        self.remediator = Some(remediator);
        self
    }

    pub fn name(&self) -> &str {
        &self.template.name
    }

    /// Reads state for `device`; if it doesn't match `expected` and a
    /// remediator is configured, attempts remediation once and re-reads
    /// before deciding the final verdict. Marks normal only if the final
    /// read matches `expected`, whether or not remediation ran.
    pub async fn evaluate(&self, device: impl Into<String>) -> Result<CheckerResult> {
        let device = device.into();
        let mut observed = self.reader.read().await?;

        if observed != self.expected {
            if let Some(remediator) = &self.remediator {
                if let Err(err) = remediator.remediate().await {
                    return Ok(self.template.abnormal(
                        self.level,
                        self.expected.clone(),
                        observed,
                        device,
                        format!("remediation attempt failed: {err}"),
                    ));
                }
                observed = self.reader.read().await?;
            }
        }

        if observed == self.expected {
            Ok(self.template.normal())
        } else {
            Ok(self.template.abnormal(
                self.level,
                self.expected.clone(),
                observed,
                device,
                "state did not match expectation after remediation",
            ))
        }
    }
}

/// Wraps an `EventFilter`'s per-rule output. An `EventFilter` already does
/// its own aggregation; this checker simply reports whatever `CheckerResult`
/// it was handed, unchanged, as its own verdict: abnormal whenever the
/// wrapped result is.
pub struct EventChecker {
    name: String,
}

impl EventChecker {
    pub fn new(name: impl Into<String>) -> Self {
        EventChecker { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn evaluate(&self, wrapped: CheckerResult) -> CheckerResult {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> CheckTemplate {
        CheckTemplate::new("Test", "a test checker", "TestErr", "investigate")
    }

    #[test]
    fn threshold_above_spec_is_abnormal_when_exceeded() {
        let checker = ThresholdChecker::new(template(), Level::Critical, ThresholdDirection::AbnormalAboveSpec);
        let normal = checker.evaluate(10.0, 20.0, "gpu0");
        assert_eq!(normal.status, Status::Normal);
        let abnormal = checker.evaluate(30.0, 20.0, "gpu0");
        assert_eq!(abnormal.status, Status::Abnormal);
        assert_eq!(abnormal.level, Level::Critical);
    }

    #[test]
    fn threshold_below_spec_is_abnormal_when_under() {
        // NVLink/PCIe bandwidth: observed below the spec'd minimum is abnormal.
        let checker = ThresholdChecker::new(template(), Level::Warning, ThresholdDirection::AbnormalBelowSpec);
        let normal = checker.evaluate(400.0, 300.0, "nvlink0");
        assert_eq!(normal.status, Status::Normal);
        let abnormal = checker.evaluate(150.0, 300.0, "nvlink0");
        assert_eq!(abnormal.status, Status::Abnormal);
    }

    struct FixedReader(std::sync::Mutex<Vec<String>>);

    #[async_trait]
    impl StateReader for FixedReader {
        async fn read(&self) -> Result<String> {
            let mut values = self.0.lock().unwrap();
            if values.len() > 1 {
                Ok(values.remove(0))
            } else {
                Ok(values[0].clone())
            }
        }
    }

    struct NoopRemediator;

    #[async_trait]
    impl Remediator for NoopRemediator {
        async fn remediate(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn state_checker_is_normal_when_state_already_matches() {
        let reader = FixedReader(std::sync::Mutex::new(vec!["performance".into()]));
        let checker = StateChecker::new(template(), Level::Warning, "performance", Box::new(reader));
        let result = checker.evaluate("cpu0").await.unwrap();
        assert_eq!(result.status, Status::Normal);
    }

    #[tokio::test]
    async fn state_checker_remediates_and_reports_success() {
        let reader = FixedReader(std::sync::Mutex::new(vec![
            "powersave".into(),
            "performance".into(),
        ]));
        let checker = StateChecker::new(template(), Level::Warning, "performance", Box::new(reader))
            .with_remediator(Box::new(NoopRemediator));
        let result = checker.evaluate("cpu0").await.unwrap();
        assert_eq!(result.status, Status::Normal);
    }

    #[tokio::test]
    async fn state_checker_reports_abnormal_when_remediation_does_not_stick() {
        let reader = FixedReader(std::sync::Mutex::new(vec!["powersave".into()]));
        let checker = StateChecker::new(template(), Level::Warning, "performance", Box::new(reader))
            .with_remediator(Box::new(NoopRemediator));
        let result = checker.evaluate("cpu0").await.unwrap();
        assert_eq!(result.status, Status::Abnormal);
        assert_eq!(result.curr, "powersave");
    }

    #[tokio::test]
    async fn state_checker_reports_abnormal_without_remediator() {
        let reader = FixedReader(std::sync::Mutex::new(vec!["powersave".into()]));
        let checker = StateChecker::new(template(), Level::Warning, "performance", Box::new(reader));
        let result = checker.evaluate("cpu0").await.unwrap();
        assert_eq!(result.status, Status::Abnormal);
    }

    #[test]
    fn event_checker_passes_through_wrapped_result() {
        let checker = EventChecker::new("Syslog");
        let wrapped = template().abnormal(Level::Critical, "", "3", "/var/log/syslog", "boom");
        let result = checker.evaluate(wrapped.clone());
        assert_eq!(result.status, wrapped.status);
        assert_eq!(result.curr, "3");
    }
}
