//! Tick-stamped events surfaced for observability.

use crate::error::Result;
use crate::policy::PolicyKind;
use crate::resource::ResourceId;
use crate::task::TaskId;
use serde::{Deserialize, Serialize};

/// Everything a run reports beyond the timeline itself. Plain data; safe to
/// hand to any consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    TaskArrived {
        task: TaskId,
        tick: u64,
    },
    TaskCompleted {
        task: TaskId,
        core: usize,
        tick: u64,
    },
    DeadlineMissed {
        task: TaskId,
        deadline: u64,
        tick: u64,
    },
    /// A wait-for cycle was found and broken by preempting `victim`, which
    /// released the resources it held. Informational: no task is dropped.
    DeadlockResolved {
        cycle: Vec<TaskId>,
        victim: TaskId,
        released: Vec<ResourceId>,
        tick: u64,
    },
    /// Hybrid mode only; emitted at decision-window boundaries.
    PolicySwitched {
        from: PolicyKind,
        to: PolicyKind,
        tick: u64,
    },
}

impl SimEvent {
    pub fn tick(&self) -> u64 {
        match self {
            SimEvent::TaskArrived { tick, .. }
            | SimEvent::TaskCompleted { tick, .. }
            | SimEvent::DeadlineMissed { tick, .. }
            | SimEvent::DeadlockResolved { tick, .. }
            | SimEvent::PolicySwitched { tick, .. } => *tick,
        }
    }
}

/// Append-only event log for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<SimEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<SimEvent> {
        self.events
    }

    pub fn iter(&self) -> impl Iterator<Item = &SimEvent> {
        self.events.iter()
    }

    /// Save the log to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a log from a JSON file.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_keep_order() {
        let mut log = EventLog::new();
        log.record(SimEvent::TaskArrived {
            task: TaskId(0),
            tick: 0,
        });
        log.record(SimEvent::TaskCompleted {
            task: TaskId(0),
            core: 0,
            tick: 4,
        });

        let ticks: Vec<u64> = log.iter().map(SimEvent::tick).collect();
        assert_eq!(ticks, vec![0, 4]);
    }

    #[test]
    fn test_json_round_trip() {
        let mut log = EventLog::new();
        log.record(SimEvent::PolicySwitched {
            from: PolicyKind::Priority { preemptive: true },
            to: PolicyKind::Edf,
            tick: 20,
        });

        let json = serde_json::to_string(&log).unwrap();
        let back: EventLog = serde_json::from_str(&json).unwrap();
        assert_eq!(back.events(), log.events());
    }
}
