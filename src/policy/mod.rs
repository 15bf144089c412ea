//! Scheduling policy subsystem.
//!
//! A policy decides which ready task a core runs next. The nine policies
//! form a closed set behind one selection interface; `Hybrid` carries no
//! ordering logic of its own and defers to the adaptive controller's
//! currently active base policy.

pub mod adaptive;
pub mod strategies;

pub use adaptive::{AdaptiveController, AdaptiveRule, RuleCondition, WindowStats};
pub use strategies::{select, urgency};

use crate::task::{TaskId, TaskRegistry};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// The closed set of scheduling policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyKind {
    /// First-come, first-served.
    Fcfs,
    /// Shortest job first, by original burst.
    Sjf,
    /// Shortest remaining time first.
    Srtf,
    /// Earliest deadline first; no deadline sorts last.
    Edf,
    /// Rotating queue with a fixed quantum.
    RoundRobin,
    /// Smallest priority number first.
    Priority { preemptive: bool },
    /// Rate monotonic: shortest period first; aperiodic tasks last.
    Rms,
    /// Least laxity first.
    Llf,
    /// Delegates to the adaptive controller.
    Hybrid,
}

impl PolicyKind {
    /// Whether the running task is reconsidered every tick.
    ///
    /// Round robin yields through quantum expiry rather than preemption, so
    /// it counts as non-preemptive here. `Hybrid` resolves through the
    /// controller's active policy before this is ever consulted.
    pub fn is_preemptive(&self) -> bool {
        match self {
            PolicyKind::Fcfs | PolicyKind::Sjf | PolicyKind::RoundRobin => false,
            PolicyKind::Srtf | PolicyKind::Edf | PolicyKind::Rms | PolicyKind::Llf => true,
            PolicyKind::Priority { preemptive } => *preemptive,
            PolicyKind::Hybrid => true,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PolicyKind::Fcfs => "FCFS",
            PolicyKind::Sjf => "SJF",
            PolicyKind::Srtf => "SRTF",
            PolicyKind::Edf => "EDF",
            PolicyKind::RoundRobin => "RR",
            PolicyKind::Priority { .. } => "PRIORITY",
            PolicyKind::Rms => "RMS",
            PolicyKind::Llf => "LLF",
            PolicyKind::Hybrid => "HYBRID",
        }
    }
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Read-only view a policy selects from. Policies never mutate state; the
/// engine applies their decision.
#[derive(Debug)]
pub struct ReadyView<'a> {
    pub now: u64,
    pub ready: &'a [TaskId],
    pub registry: &'a TaskRegistry,
    /// Round-robin rotation order, maintained by the engine.
    pub rotation: &'a VecDeque<TaskId>,
}
