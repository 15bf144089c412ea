//! Commonly used types, importable in one line.

pub use crate::config::{SimConfig, SimConfigBuilder};
pub use crate::engine::{run, CancelToken, Engine, LiveHandle, LiveStatus};
pub use crate::error::{Error, Result};
pub use crate::events::{EventLog, SimEvent};
pub use crate::metrics::{MetricsSnapshot, TaskMetrics};
pub use crate::policy::{AdaptiveRule, PolicyKind, RuleCondition, WindowStats};
pub use crate::power::{CoreStatus, PowerConfig};
pub use crate::report::{ExecutionInterval, IntervalKind, SimReport, StopReason};
pub use crate::resource::{ResourceGraph, ResourceId};
pub use crate::task::{ResourceRequest, TaskId, TaskRegistry, TaskSpec};
pub use crate::workload::{generate, WorkloadConfig};
