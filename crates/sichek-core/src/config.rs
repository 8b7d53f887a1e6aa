//! Component configuration: the knobs an operator may change at runtime
//! without rebuilding a `Component`, namely interval, cache size, metrics
//! toggle, initial skip policy, and a checker ignore-list.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SichekError};

/// Per-component runtime configuration. Immutable once built; changes go
/// through `Component::update`, which swaps the whole value atomically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentConfig {
    #[serde(with = "humantime_secs", rename = "query_interval_secs")]
    pub query_interval: Duration,
    pub cache_size: usize,
    #[serde(default)]
    pub enable_metrics: bool,
    #[serde(default)]
    pub skip_percent: i32,
    /// Checker names to skip, e.g. when a known-bad sensor has to be ignored
    /// in the field until it is replaced.
    #[serde(default)]
    pub ignored_checkers: Vec<String>,
}

impl ComponentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.query_interval.is_zero() {
            return Err(SichekError::Config(
                "query_interval must be positive".into(),
            ));
        }
        if self.cache_size == 0 {
            return Err(SichekError::Config("cache_size must be positive".into()));
        }
        if !(0..=100).contains(&self.skip_percent) {
            return Err(SichekError::Config(
                "skip_percent must be in [0, 100]".into(),
            ));
        }
        Ok(())
    }

    pub fn is_ignored(&self, checker_name: &str) -> bool {
        self.ignored_checkers.iter().any(|c| c == checker_name)
    }

    /// Loads config from an explicit YAML path.
    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let cfg: ComponentConfig = serde_yaml::from_str(&text)
            .map_err(|e| SichekError::Config(format!("{}: {e}", path.display())))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

impl Default for ComponentConfig {
    fn default() -> Self {
        ComponentConfig {
            query_interval: Duration::from_secs(30),
            cache_size: 10,
            enable_metrics: false,
            skip_percent: 0,
            ignored_checkers: Vec::new(),
        }
    }
}

mod humantime_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ComponentConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut cfg = ComponentConfig::default();
        cfg.query_interval = Duration::from_secs(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn out_of_range_skip_percent_is_rejected() {
        let mut cfg = ComponentConfig::default();
        cfg.skip_percent = 101;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn ignored_checkers_lookup() {
        let mut cfg = ComponentConfig::default();
        cfg.ignored_checkers.push("FlakySensor".into());
        assert!(cfg.is_ignored("FlakySensor"));
        assert!(!cfg.is_ignored("OtherChecker"));
    }

    #[test]
    fn loads_from_yaml_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cpu.yaml");
        std::fs::write(
            &path,
            "query_interval_secs: 15\ncache_size: 20\nenable_metrics: true\n",
        )
        .unwrap();
        let cfg = ComponentConfig::from_path(&path).unwrap();
        assert_eq!(cfg.query_interval, Duration::from_secs(15));
        assert_eq!(cfg.cache_size, 20);
        assert!(cfg.enable_metrics);
    }
}
