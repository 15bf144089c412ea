//! Metrics derivation.
//!
//! Everything here is a pure function of the final task registry, the
//! immutable interval log, and the power model's constants. No running
//! totals are kept anywhere else, so a snapshot can be recomputed at any
//! point (including from a partial timeline) and always agrees with the log.

use crate::power::{CoreStatus, CoreStatusModel, PowerConfig};
use crate::report::ExecutionInterval;
use crate::task::{TaskId, TaskRegistry};
use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};

/// Per-task figures. Timing fields are `None` until the task completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMetrics {
    pub id: TaskId,
    pub arrival: u64,
    pub burst: u64,
    pub completed: bool,
    pub turnaround: Option<u64>,
    pub waiting: Option<u64>,
    /// Time from arrival to first unit of execution.
    pub response: Option<u64>,
    /// `None` when the task has no deadline or the outcome is still open.
    pub deadline_met: Option<bool>,
    pub preemptions: u32,
}

/// Aggregate and per-task figures for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub per_task: Vec<TaskMetrics>,
    pub total_ticks: u64,
    pub busy_ticks: u64,
    /// Busy fraction across all cores, in `[0, 1]`.
    pub cpu_utilization: f64,
    pub per_core_utilization: Vec<f64>,
    /// Completed tasks per tick.
    pub throughput: f64,
    pub completed: usize,
    pub total_releases: usize,
    pub avg_waiting: f64,
    pub avg_turnaround: f64,
    pub p50_waiting: u64,
    pub p95_waiting: u64,
    pub p99_waiting: u64,
    pub missed_deadlines: usize,
    pub miss_ratio: f64,
    pub preemptions: u64,
    pub energy_joules: f64,
    pub avg_temperature_celsius: f64,
    pub core_status: Vec<CoreStatus>,
}

impl MetricsSnapshot {
    /// Derive a snapshot. `timeline` must carry explicit idle intervals, as
    /// the engine records them; total time is the latest interval end.
    pub fn compute(
        registry: &TaskRegistry,
        timeline: &[ExecutionInterval],
        power: &PowerConfig,
        num_cores: usize,
    ) -> Self {
        let total_ticks = timeline.iter().map(|i| i.end).max().unwrap_or(0);

        let mut per_core_busy = vec![0u64; num_cores];
        for interval in timeline {
            if !interval.is_idle() {
                per_core_busy[interval.core] += interval.duration();
            }
        }
        let busy_ticks: u64 = per_core_busy.iter().sum();
        let capacity = total_ticks * num_cores as u64;
        let cpu_utilization = if capacity == 0 {
            0.0
        } else {
            busy_ticks as f64 / capacity as f64
        };
        let per_core_utilization = per_core_busy
            .iter()
            .map(|&busy| {
                if total_ticks == 0 {
                    0.0
                } else {
                    busy as f64 / total_ticks as f64
                }
            })
            .collect();

        let (energy_joules, model) = replay_energy(timeline, power, num_cores, total_ticks);

        let mut per_task = Vec::with_capacity(registry.len());
        let mut waiting_hist = Histogram::<u64>::new_with_max(total_ticks.max(1) + 1, 3)
            .expect("histogram bounds are valid");
        let mut total_waiting = 0u64;
        let mut total_turnaround = 0u64;
        let mut completed = 0usize;
        let mut missed_deadlines = 0usize;
        let mut preemptions = 0u64;

        for id in registry.ids() {
            let task = task_metrics(registry, id);
            preemptions += u64::from(task.preemptions);
            if let (Some(turnaround), Some(waiting)) = (task.turnaround, task.waiting) {
                completed += 1;
                total_turnaround += turnaround;
                total_waiting += waiting;
                // Shifted by one: the histogram cannot hold zero.
                let _ = waiting_hist.record(waiting + 1);
            }
            if task.deadline_met == Some(false) {
                missed_deadlines += 1;
            }
            per_task.push(task);
        }

        let throughput = if total_ticks == 0 {
            0.0
        } else {
            completed as f64 / total_ticks as f64
        };
        let avg_waiting = if completed == 0 {
            0.0
        } else {
            total_waiting as f64 / completed as f64
        };
        let avg_turnaround = if completed == 0 {
            0.0
        } else {
            total_turnaround as f64 / completed as f64
        };
        let total_releases = registry.len();
        let miss_ratio = if total_releases == 0 {
            0.0
        } else {
            missed_deadlines as f64 / total_releases as f64
        };

        Self {
            per_task,
            total_ticks,
            busy_ticks,
            cpu_utilization,
            per_core_utilization,
            throughput,
            completed,
            total_releases,
            avg_waiting,
            avg_turnaround,
            p50_waiting: waiting_hist.value_at_quantile(0.50).saturating_sub(1),
            p95_waiting: waiting_hist.value_at_quantile(0.95).saturating_sub(1),
            p99_waiting: waiting_hist.value_at_quantile(0.99).saturating_sub(1),
            missed_deadlines,
            miss_ratio,
            preemptions,
            energy_joules,
            avg_temperature_celsius: model.average_temperature(),
            core_status: model.statuses(),
        }
    }

    pub fn task(&self, id: TaskId) -> Option<&TaskMetrics> {
        self.per_task.iter().find(|t| t.id == id)
    }
}

fn task_metrics(registry: &TaskRegistry, id: TaskId) -> TaskMetrics {
    let spec = registry.spec(id);
    let state = registry.state(id);

    let turnaround = state.completion.map(|c| c - spec.arrival);
    let waiting = turnaround.map(|t| t - spec.burst);
    let response = state.first_run.map(|f| f - spec.arrival);
    let deadline_met = spec.deadline.and_then(|deadline| match state.completion {
        Some(completion) => Some(completion <= deadline && !state.deadline_missed),
        None if state.deadline_missed => Some(false),
        None => None,
    });

    TaskMetrics {
        id,
        arrival: spec.arrival,
        burst: spec.burst,
        completed: state.completion.is_some(),
        turnaround,
        waiting,
        response,
        deadline_met,
        preemptions: state.preemptions,
    }
}

/// Re-derive the energy estimate by replaying the timeline's busy/idle
/// pattern through a fresh core status model, tick by tick in core order —
/// the same sequence the engine observed live.
fn replay_energy(
    timeline: &[ExecutionInterval],
    power: &PowerConfig,
    num_cores: usize,
    total_ticks: u64,
) -> (f64, CoreStatusModel) {
    let mut busy = vec![vec![false; total_ticks as usize]; num_cores];
    for interval in timeline {
        if interval.is_idle() {
            continue;
        }
        for tick in interval.start..interval.end {
            busy[interval.core][tick as usize] = true;
        }
    }

    let mut model = CoreStatusModel::new(power.clone(), num_cores);
    let mut joules = 0.0;
    for tick in 0..total_ticks as usize {
        for (core, lanes) in busy.iter().enumerate() {
            joules += model.observe(core, lanes[tick]);
        }
    }
    (joules, model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::IntervalKind;
    use crate::task::TaskSpec;

    fn run_interval(task: u32, start: u64, end: u64) -> ExecutionInterval {
        ExecutionInterval {
            task: Some(TaskId(task)),
            start,
            end,
            core: 0,
            kind: IntervalKind::Run,
        }
    }

    fn idle_interval(start: u64, end: u64) -> ExecutionInterval {
        ExecutionInterval {
            task: None,
            start,
            end,
            core: 0,
            kind: IntervalKind::Idle,
        }
    }

    fn finished_registry() -> TaskRegistry {
        let mut registry = TaskRegistry::new(
            vec![TaskSpec::new(0, 0, 4), TaskSpec::new(1, 1, 2)],
            0,
            0,
        )
        .unwrap();
        for (id, first, done) in [(TaskId(0), 0, 4), (TaskId(1), 4, 6)] {
            registry.state_mut(id).remaining = 0;
            registry.state_mut(id).first_run = Some(first);
            registry.complete(id, done);
        }
        registry
    }

    #[test]
    fn test_fcfs_waiting_times() {
        let registry = finished_registry();
        let timeline = vec![run_interval(0, 0, 4), run_interval(1, 4, 6)];
        let snapshot = MetricsSnapshot::compute(&registry, &timeline, &PowerConfig::default(), 1);

        assert_eq!(snapshot.task(TaskId(0)).unwrap().waiting, Some(0));
        assert_eq!(snapshot.task(TaskId(1)).unwrap().waiting, Some(3));
        assert_eq!(snapshot.cpu_utilization, 1.0);
        assert_eq!(snapshot.completed, 2);
    }

    #[test]
    fn test_idle_time_lowers_utilization() {
        let registry = finished_registry();
        let timeline = vec![
            run_interval(0, 0, 4),
            run_interval(1, 4, 6),
            idle_interval(6, 8),
        ];
        let snapshot = MetricsSnapshot::compute(&registry, &timeline, &PowerConfig::default(), 1);

        assert_eq!(snapshot.total_ticks, 8);
        assert_eq!(snapshot.busy_ticks, 6);
        assert_eq!(snapshot.cpu_utilization, 0.75);
    }

    #[test]
    fn test_recompute_is_stable() {
        let registry = finished_registry();
        let timeline = vec![run_interval(0, 0, 4), run_interval(1, 4, 6)];

        let first = MetricsSnapshot::compute(&registry, &timeline, &PowerConfig::default(), 1);
        let second = MetricsSnapshot::compute(&registry, &timeline, &PowerConfig::default(), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn test_energy_scales_with_busy_time() {
        let registry = finished_registry();
        let busy_line = vec![run_interval(0, 0, 4), run_interval(1, 4, 6)];
        let idle_line = vec![idle_interval(0, 6)];

        let busy = MetricsSnapshot::compute(&registry, &busy_line, &PowerConfig::default(), 1);
        let idle = MetricsSnapshot::compute(&registry, &idle_line, &PowerConfig::default(), 1);
        assert!(busy.energy_joules > idle.energy_joules);
    }

    #[test]
    fn test_empty_timeline() {
        let registry = TaskRegistry::new(vec![TaskSpec::new(0, 0, 4)], 0, 0).unwrap();
        let snapshot = MetricsSnapshot::compute(&registry, &[], &PowerConfig::default(), 1);

        assert_eq!(snapshot.total_ticks, 0);
        assert_eq!(snapshot.cpu_utilization, 0.0);
        assert_eq!(snapshot.completed, 0);
    }
}
