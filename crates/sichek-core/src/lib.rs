//! Observation core for the sichek node health-check agent: log tailing with
//! rotation-aware ring buffers, regex-based event classification, and the
//! component framework (collectors, checkers, timeouts, caching) that turns
//! both into periodic `Result`s for a node.

pub mod checker;
pub mod collector;
pub mod command_filter;
pub mod component;
pub mod config;
pub mod error;
pub mod event_filter;
pub mod file_loader;
pub mod level;
pub mod registry;
pub mod result;
pub mod rule;
pub mod runtime;
pub mod scheduler;
pub mod service;
pub mod spec_table;

pub use checker::{Checker, CheckTemplate, EventChecker, Remediator, StateChecker, StateReader, ThresholdChecker, ThresholdDirection};
pub use collector::{Collector, CpuInfo, NvidiaDevice, NvidiaInfo, StaticCollector};
pub use command_filter::CommandFilter;
pub use component::{Component, ComponentGuard};
pub use config::ComponentConfig;
pub use error::{Result, SichekError};
pub use event_filter::EventFilter;
pub use file_loader::FileLoader;
pub use level::Level;
pub use registry::{RegexFilter, RegexRegistry};
pub use result::{AnnotationEntry, CheckResult, CheckerResult, ControllerAnnotation, Status};
pub use rule::EventRule;
pub use runtime::Runtime;
pub use scheduler::LoadScheduler;
pub use service::CommonService;
pub use spec_table::{ExplicitFileSource, NvidiaSpec, NvidiaSpecTable, ProductionDefaultSource, SpecResolver, SpecSource};
