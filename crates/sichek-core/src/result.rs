//! Wire types emitted by the observation core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::level::Level;

/// Normal/abnormal status of a single checker or an aggregated `CheckResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Normal,
    Abnormal,
}

impl Status {
    pub fn is_abnormal(self) -> bool {
        matches!(self, Status::Abnormal)
    }

    pub fn from_abnormal(abnormal: bool) -> Self {
        if abnormal {
            Status::Abnormal
        } else {
            Status::Normal
        }
    }
}

/// One checker's verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerResult {
    pub name: String,
    pub description: String,
    /// The spec threshold/expectation being compared against, rendered as text.
    pub spec: String,
    /// The observed value, rendered as text (a decimal count for event checkers).
    pub curr: String,
    /// Comma-joined, insertion-ordered set of distinct contributing devices/files.
    pub device: String,
    pub status: Status,
    pub level: Level,
    pub error_name: String,
    pub detail: String,
    pub suggestion: String,
}

impl CheckerResult {
    /// A normal (non-abnormal) result carrying no detail, used by checkers that
    /// pass and by the resolution record appended after a previously-timed-out
    /// cycle completes successfully.
    pub fn normal(name: impl Into<String>, description: impl Into<String>) -> Self {
        CheckerResult {
            name: name.into(),
            description: description.into(),
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
}

/// A composite health-check record for one component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    /// Component name, e.g. "cpu", "nvidia", "syslog".
    pub item: String,
    pub node: Option<String>,
    pub time: DateTime<Utc>,
    pub status: Status,
    pub level: Level,
    pub checkers: Vec<CheckerResult>,
}

impl CheckResult {
    /// Builds the composite record from a component name and a set of checker
    /// results: abnormal iff any checker is abnormal, level is the most
    /// severe abnormal level (else `Info`).
    pub fn aggregate(item: impl Into<String>, node: Option<String>, checkers: Vec<CheckerResult>, now: DateTime<Utc>) -> Self {
        let abnormal_levels = checkers
            .iter()
            .filter(|c| c.status.is_abnormal())
            .map(|c| c.level);
        let level = Level::highest(abnormal_levels);
        let status = Status::from_abnormal(checkers.iter().any(|c| c.status.is_abnormal()));
        CheckResult {
            item: item.into(),
            node,
            time: now,
            status,
            level,
            checkers,
        }
    }

    /// Regroups this record into the shape the fault-tolerance controller
    /// expects under `node.annotations["scitix.ai/sichek"]`: component name
    /// to level to list of `{error_name, device}` for every abnormal checker.
    pub fn to_controller_annotation(&self) -> ControllerAnnotation {
        let mut by_level: BTreeMap<Level, Vec<AnnotationEntry>> = BTreeMap::new();
        for c in &self.checkers {
            if !c.status.is_abnormal() {
                continue;
            }
            by_level.entry(c.level).or_default().push(AnnotationEntry {
                error_name: c.error_name.clone(),
                device: c.device.clone(),
            });
        }
        let mut component = BTreeMap::new();
        component.insert(self.item.clone(), by_level);
        ControllerAnnotation(component)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationEntry {
    pub error_name: String,
    pub device: String,
}

/// `{component name: {level: [{error_name, device}, ...]}}`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ControllerAnnotation(pub BTreeMap<String, BTreeMap<Level, Vec<AnnotationEntry>>>);

impl ControllerAnnotation {
    /// Merges several components' annotations into one payload, the shape the
    /// out-of-scope controller-facing emitter ultimately serializes.
    pub fn merge(results: &[CheckResult]) -> ControllerAnnotation {
        let mut merged: BTreeMap<String, BTreeMap<Level, Vec<AnnotationEntry>>> = BTreeMap::new();
        for r in results {
            let ann = r.to_controller_annotation();
            for (component, by_level) in ann.0 {
                merged.entry(component).or_default().extend(by_level);
            }
        }
        ControllerAnnotation(merged)
    }
}
