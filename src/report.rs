//! The run artifacts a simulation produces: the interval timeline and the
//! final report. Plain structured records, free of engine internals.

use crate::error::Result;
use crate::events::SimEvent;
use crate::metrics::MetricsSnapshot;
use crate::policy::PolicyKind;
use crate::task::TaskId;
use serde::{Deserialize, Serialize};

/// Why an execution interval ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntervalKind {
    /// Ran to completion or to the end of the recorded timeline.
    Run,
    /// Displaced by a more urgent task.
    Preempted,
    /// Round-robin quantum expired.
    SliceExpired,
    /// Blocked on a resource.
    Blocked,
    /// No task was runnable on this core.
    Idle,
}

/// One contiguous stretch of a core's time. `task == None` is recorded
/// idle time, which utilization accounting depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionInterval {
    pub task: Option<TaskId>,
    pub start: u64,
    pub end: u64,
    pub core: usize,
    pub kind: IntervalKind,
}

impl ExecutionInterval {
    pub fn duration(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_idle(&self) -> bool {
        self.task.is_none()
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Every task completed.
    Finished,
    /// Cancelled between ticks; the partial timeline is valid as-is.
    Cancelled,
    /// Hit the tick ceiling; attached to the `Divergence` error.
    Diverged,
}

/// Complete artifact of one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimReport {
    pub timeline: Vec<ExecutionInterval>,
    pub events: Vec<SimEvent>,
    pub metrics: MetricsSnapshot,
    pub stop: StopReason,
    pub ticks: u64,
    /// The policy in force when the run ended; differs from the configured
    /// policy only in hybrid mode.
    pub final_policy: PolicyKind,
}

impl SimReport {
    /// Intervals attributed to `task`, in execution order.
    pub fn intervals_for(&self, task: TaskId) -> impl Iterator<Item = &ExecutionInterval> {
        self.timeline.iter().filter(move |i| i.task == Some(task))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
