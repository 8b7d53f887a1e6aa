//! Minimal demo binary: wires one CPU component backed by a fixed snapshot
//! into a running `CommonService` and prints each emitted `Result` as JSON.
//! A full YAML-config-driven front end (flag-parsed component set,
//! environment layering, remote spec fetch) is out of scope; this binary
//! exists to exercise the observation core end to end.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use sichek_core::{
    CheckTemplate, Checker, CheckerResult, CommonService, ComponentConfig, ComponentGuard,
    CpuInfo, Level, Result, StaticCollector, ThresholdChecker, ThresholdDirection,
};

#[derive(Parser, Debug)]
#[command(name = "sichek-agent", about = "Demo node health-check agent")]
struct Args {
    /// Number of check cycles to print before exiting.
    #[arg(long, default_value_t = 3)]
    cycles: u32,

    /// Interval between check cycles, in milliseconds.
    #[arg(long, default_value_t = 500)]
    interval_ms: u64,
}

struct CpuUsageChecker(ThresholdChecker);

#[async_trait]
impl Checker<CpuInfo> for CpuUsageChecker {
    fn name(&self) -> &str {
        self.0.name()
    }

    async fn check(&self, info: &CpuInfo) -> Result<CheckerResult> {
        Ok(self.0.evaluate(info.usage_percent, 90.0, &info.host))
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let info = CpuInfo {
        arch: "x86_64".into(),
        host: std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".into()),
        usage_percent: 42.0,
        uptime_secs: 3600,
        numa_nodes: 1,
        governors: vec!["performance".into(); 8],
    };

    let checker = CpuUsageChecker(ThresholdChecker::new(
        CheckTemplate::new("CpuUsage", "aggregate cpu usage", "CpuUsageHigh", "investigate load"),
        Level::Warning,
        ThresholdDirection::AbnormalAboveSpec,
    ));

    let mut cfg = ComponentConfig::default();
    cfg.query_interval = Duration::from_millis(args.interval_ms);

    // A per-domain `ComponentGuard` stands in for the singleton-per-domain
    // construction rule: the first call builds the component, any later
    // call (none in this demo) would observe that same instance.
    let cpu_guard: ComponentGuard<CpuInfo> = ComponentGuard::new();
    let component = cpu_guard
        .get_or_init("cpu", cfg, Arc::new(StaticCollector(info)), vec![Arc::new(checker)])
        .map_err(|err| anyhow::anyhow!("{err}"))?;

    let service = CommonService::new(
        "cpu",
        component,
        Duration::from_millis(args.interval_ms),
        Duration::from_secs(5),
        8,
    )?;
    let mut results = service.take_receiver().expect("receiver not yet taken");
    service.start();

    for _ in 0..args.cycles {
        if let Some(result) = results.recv().await {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    service.stop().await;
    Ok(())
}
