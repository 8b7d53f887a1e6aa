//! The Collector contract and the minimal snapshot shapes it must produce.
//! Real collectors (NVML bindings, `/proc`, `/sys`, `lscpu`, `systemctl`,
//! `lspci`/`setpci`) are out of scope; this module only fixes the data shape
//! and ships a `StaticCollector` test/demo double.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// `Collect(ctx) -> snapshot | error`, implemented out of scope for real
/// hardware; `I` is the component's domain-typed snapshot ("Info").
#[async_trait]
pub trait Collector<I>: Send + Sync {
    async fn collect(&self) -> Result<I>;
}

/// A collector double that always returns a fixed, pre-built snapshot.
/// Stands in for the real NVML/`/proc`/`/sys` bindings in tests and in the
/// demo binary.
pub struct StaticCollector<I: Clone + Send + Sync>(pub I);

#[async_trait]
impl<I: Clone + Send + Sync> Collector<I> for StaticCollector<I> {
    async fn collect(&self) -> Result<I> {
        Ok(self.0.clone())
    }
}

/// CPU snapshot: architecture, hostname, aggregate usage, uptime, NUMA node
/// count, and the `scaling_governor` read from every core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuInfo {
    pub arch: String,
    pub host: String,
    pub usage_percent: f64,
    pub uptime_secs: u64,
    pub numa_nodes: u32,
    /// One governor string per logical core, in core-index order.
    pub governors: Vec<String>,
}

/// One NVIDIA device's point-in-time state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NvidiaDevice {
    pub index: u32,
    pub pci_device_id: String,
    pub sram_aggregate_uncorrectable_errors: u64,
    pub remapped_uncorrectable_errors: u64,
    pub gpu_temperature_c: f64,
    pub memory_temperature_c: f64,
    pub xids: Vec<u32>,
    pub driver_version: String,
    pub cuda_version: String,
    pub vbios_version: String,
    pub pcie_gen: u32,
    pub pcie_width: u32,
    pub nvlink_bandwidth_gbps: f64,
    pub pod: Option<String>,
}

/// NVIDIA subsystem snapshot: per-device state plus node-level dependency
/// toggles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NvidiaInfo {
    pub devices: Vec<NvidiaDevice>,
    pub fabric_manager_active: bool,
    pub nv_peermem_loaded: bool,
    pub iommu_enabled: bool,
    pub pcie_acs_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_collector_returns_fixed_snapshot() {
        let snapshot = CpuInfo {
            arch: "x86_64".into(),
            host: "node-1".into(),
            usage_percent: 12.5,
            uptime_secs: 3600,
            numa_nodes: 2,
            governors: vec!["performance".into(); 4],
        };
        let collector = StaticCollector(snapshot.clone());
        let got = collector.collect().await.unwrap();
        assert_eq!(got.host, "node-1");
        assert_eq!(got.governors.len(), 4);
    }
}
