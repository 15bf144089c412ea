//! Task descriptors and the registry that owns their runtime state.

use crate::error::{Error, Result};
use crate::resource::ResourceId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u32);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// A resource claim, fired once the task has executed `at` units.
///
/// A claim with `at == 0` must be satisfied before the task runs at all;
/// later claims fire mid-execution, which is what makes hold-and-wait
/// (and therefore deadlock) expressible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub resource: ResourceId,
    pub at: u64,
}

impl ResourceRequest {
    pub fn at_start(resource: ResourceId) -> Self {
        Self { resource, at: 0 }
    }

    pub fn after(resource: ResourceId, executed: u64) -> Self {
        Self {
            resource,
            at: executed,
        }
    }
}

/// Immutable task descriptor.
///
/// `priority` follows the usual real-time convention: lower numbers are more
/// urgent. `deadline` is an absolute simulated time. Periodic tasks carry a
/// `period`; the registry expands them into individual jobs up front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub id: TaskId,
    pub name: String,
    pub arrival: u64,
    pub burst: u64,
    pub deadline: Option<u64>,
    pub priority: u32,
    pub period: Option<u64>,
    pub requests: Vec<ResourceRequest>,
}

impl TaskSpec {
    pub fn new(id: u32, arrival: u64, burst: u64) -> Self {
        Self {
            id: TaskId(id),
            name: format!("T{id}"),
            arrival,
            burst,
            deadline: None,
            priority: 0,
            period: None,
            requests: Vec::new(),
        }
    }

    pub fn named<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_deadline(mut self, deadline: u64) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_period(mut self, period: u64) -> Self {
        self.period = Some(period);
        self
    }

    pub fn with_request(mut self, request: ResourceRequest) -> Self {
        self.requests.push(request);
        self
    }
}

/// Mutable runtime state for one task.
#[derive(Debug, Clone)]
pub struct TaskState {
    pub remaining: u64,
    pub first_run: Option<u64>,
    pub completion: Option<u64>,
    pub deadline_missed: bool,
    pub preemptions: u32,
    /// Resources currently held, in acquisition order.
    pub held: Vec<ResourceId>,
    /// Number of entries in `TaskSpec::requests` already satisfied.
    pub satisfied: usize,
}

impl TaskState {
    fn new(spec: &TaskSpec) -> Self {
        Self {
            remaining: spec.burst,
            first_run: None,
            completion: None,
            deadline_missed: false,
            preemptions: 0,
            held: Vec::new(),
            satisfied: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }
}

#[derive(Debug, Clone)]
struct TaskEntry {
    spec: TaskSpec,
    state: TaskState,
}

/// Owner of every task's descriptor and runtime state.
///
/// Populated once per run. Periodic descriptors are expanded into one job
/// per release up to the configured horizon, so the pending set is fixed at
/// construction and the simulation has a well-defined end.
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    entries: Vec<TaskEntry>,
    index: HashMap<TaskId, usize>,
}

impl TaskRegistry {
    /// Build a registry from descriptors, validating them and expanding
    /// periodic tasks up to `periodic_horizon`.
    pub fn new(
        specs: Vec<TaskSpec>,
        resource_count: usize,
        periodic_horizon: u64,
    ) -> Result<Self> {
        let mut registry = Self {
            entries: Vec::with_capacity(specs.len()),
            index: HashMap::new(),
        };

        let mut next_generated = specs.iter().map(|s| s.id.0).max().map_or(0, |m| m + 1);

        for spec in specs {
            validate_spec(&spec, resource_count)?;

            if let Some(period) = spec.period {
                let relative_deadline = spec.deadline.map(|d| d.saturating_sub(spec.arrival));
                let mut release = spec.arrival;
                let mut job = 0u32;
                while release <= periodic_horizon {
                    let mut job_spec = spec.clone();
                    if job > 0 {
                        job_spec.id = TaskId(next_generated);
                        next_generated += 1;
                    }
                    job_spec.name = format!("{}#{job}", spec.name);
                    job_spec.arrival = release;
                    job_spec.deadline = relative_deadline.map(|d| release + d);
                    registry.insert(job_spec)?;
                    release += period;
                    job += 1;
                }
            } else {
                registry.insert(spec)?;
            }
        }

        if registry.entries.is_empty() {
            return Err(Error::task_set("task set is empty"));
        }
        Ok(registry)
    }

    fn insert(&mut self, spec: TaskSpec) -> Result<()> {
        if self.index.contains_key(&spec.id) {
            return Err(Error::task_set(format!("duplicate task id {}", spec.id)));
        }
        self.index.insert(spec.id, self.entries.len());
        let state = TaskState::new(&spec);
        self.entries.push(TaskEntry { spec, state });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All task ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.entries.iter().map(|e| e.spec.id)
    }

    pub fn spec(&self, id: TaskId) -> &TaskSpec {
        &self.entries[self.index[&id]].spec
    }

    pub fn state(&self, id: TaskId) -> &TaskState {
        &self.entries[self.index[&id]].state
    }

    pub fn state_mut(&mut self, id: TaskId) -> &mut TaskState {
        let idx = self.index[&id];
        &mut self.entries[idx].state
    }

    /// Units of CPU the task has already received.
    pub fn executed(&self, id: TaskId) -> u64 {
        let entry = &self.entries[self.index[&id]];
        entry.spec.burst - entry.state.remaining
    }

    /// Fixes completion at `tick`; turnaround and waiting derive from it and
    /// are immutable afterwards.
    pub fn complete(&mut self, id: TaskId, tick: u64) {
        let state = self.state_mut(id);
        debug_assert_eq!(state.remaining, 0);
        state.completion = Some(tick);
    }
}

fn validate_spec(spec: &TaskSpec, resource_count: usize) -> Result<()> {
    if spec.burst == 0 {
        return Err(Error::task_set(format!(
            "task {} has zero burst time",
            spec.id
        )));
    }
    if spec.period == Some(0) {
        return Err(Error::task_set(format!("task {} has zero period", spec.id)));
    }
    if let Some(deadline) = spec.deadline {
        if deadline < spec.arrival {
            return Err(Error::task_set(format!(
                "task {} deadline {deadline} precedes arrival {}",
                spec.id, spec.arrival
            )));
        }
    }
    for request in &spec.requests {
        if request.resource.0 as usize >= resource_count {
            return Err(Error::task_set(format!(
                "task {} requests unknown resource {}",
                spec.id, request.resource
            )));
        }
        if request.at >= spec.burst {
            return Err(Error::task_set(format!(
                "task {} requests {} after its burst would end",
                spec.id, request.resource
            )));
        }
    }
    Ok(())
}
