//! Hardware-keyed spec tables and the `SpecSource` resolution chain:
//! explicit file, then production default path, then dev-tree default, then
//! remote URL. This crate ships the first two sources plus the trait an
//! out-of-scope front-end can implement for the remote case.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SichekError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PcieSpec {
    pub pci_gen: u32,
    pub pci_width: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SoftwareSpec {
    pub driver_version: String,
    pub cuda_version: String,
    pub vbios_version: String,
    pub nvidiafabric_manager: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependenceSpec {
    #[serde(rename = "pcie-acs")]
    pub pcie_acs: bool,
    pub iommu: bool,
    pub nv_peermem: bool,
    pub nv_fabricmanager: bool,
    pub cpu_performance: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryErrorsThreshold {
    pub remapped_uncorrectable_errors: u64,
    pub sram_volatile_uncorrectable_errors: u64,
    pub sram_volatile_correctable_errors: u64,
    pub sram_aggregate_uncorrectable_errors: u64,
    pub sram_aggregate_correctable_errors: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemperatureThreshold {
    pub gpu: f64,
    pub memory: f64,
}

/// One hardware variant's spec row, keyed by PCI device id hex in
/// `NvidiaSpecTable`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NvidiaSpec {
    pub name: String,
    pub gpu_nums: u32,
    pub gpu_memory: u64,
    pub pcie: PcieSpec,
    pub software: SoftwareSpec,
    pub dependence: DependenceSpec,
    #[serde(default)]
    pub nvlink: HashMap<String, String>,
    #[serde(default)]
    pub state: HashMap<String, String>,
    pub memory_errors_threshold: MemoryErrorsThreshold,
    pub temperature_threshold: TemperatureThreshold,
    #[serde(default)]
    pub critical_xid_events: HashMap<u32, String>,
}

/// The `nvidia: {<pci-device-id-hex>: {...}}` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NvidiaSpecTable {
    pub nvidia: HashMap<String, NvidiaSpec>,
}

impl NvidiaSpecTable {
    pub fn insert(&mut self, pci_device_id: impl Into<String>, spec: NvidiaSpec) {
        self.nvidia.insert(pci_device_id.into(), spec);
    }

    pub fn get(&self, pci_device_id: &str) -> Option<&NvidiaSpec> {
        self.nvidia.get(pci_device_id)
    }

    fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| SichekError::Config(format!("spec table: {e}")))
    }
}

/// One candidate location a spec table may be resolved from, tried in the
/// order they are registered: explicit file, then production default, then
/// dev-tree default, then remote URL.
pub trait SpecSource: Send + Sync {
    /// Returns `Ok(None)` when this source has nothing to offer (e.g. the
    /// file does not exist), so resolution falls through to the next source.
    /// Returns `Err` only for a source that applies but is malformed.
    fn resolve(&self, hw_key: &str) -> Result<Option<NvidiaSpecTable>>;

    fn describe(&self) -> String;
}

/// Reads a table from an explicit, user-supplied path. Fails loudly (does
/// not fall through) if the path is set but unreadable or malformed, since an
/// explicit path is an unambiguous operator intent.
pub struct ExplicitFileSource {
    pub path: std::path::PathBuf,
}

impl SpecSource for ExplicitFileSource {
    fn resolve(&self, _hw_key: &str) -> Result<Option<NvidiaSpecTable>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&self.path)?;
        Ok(Some(NvidiaSpecTable::from_yaml(&text)?))
    }

    fn describe(&self) -> String {
        format!("explicit file {}", self.path.display())
    }
}

/// Reads `default_spec.yaml` from a fixed production install directory.
pub struct ProductionDefaultSource {
    pub dir: std::path::PathBuf,
}

impl ProductionDefaultSource {
    pub fn new(dir: impl Into<std::path::PathBuf>) -> Self {
        ProductionDefaultSource { dir: dir.into() }
    }
}

impl SpecSource for ProductionDefaultSource {
    fn resolve(&self, _hw_key: &str) -> Result<Option<NvidiaSpecTable>> {
        let path = self.dir.join("default_spec.yaml");
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)?;
        Ok(Some(NvidiaSpecTable::from_yaml(&text)?))
    }

    fn describe(&self) -> String {
        format!("production default {}", self.dir.join("default_spec.yaml").display())
    }
}

/// Tries each registered source in order and returns the first table that
/// resolves. A source whose file is simply absent is skipped; a source whose
/// file exists but fails to parse aborts resolution.
pub struct SpecResolver {
    sources: Vec<Box<dyn SpecSource>>,
}

impl SpecResolver {
    pub fn new() -> Self {
        SpecResolver { sources: Vec::new() }
    }

    pub fn with_source(mut self, source: Box<dyn SpecSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn resolve(&self, hw_key: &str) -> Result<NvidiaSpecTable> {
        for source in &self.sources {
            if let Some(table) = source.resolve(hw_key)? {
                tracing::info!(source = %source.describe(), "resolved spec table");
                return Ok(table);
            }
        }
        Err(SichekError::Config(format!(
            "no spec source resolved a table for hardware key `{hw_key}`"
        )))
    }
}

impl Default for SpecResolver {
    fn default() -> Self {
        Self::new()
    }
}
