//! The concrete ordering strategies.
//!
//! Every strategy reduces to one urgency metric per task; selection is the
//! minimum over the ready set with ties broken by arrival time, then task
//! id. Preemption under a preemptive policy requires the challenger's
//! metric to be strictly smaller than the incumbent's, so equal-urgency
//! tasks never thrash.

use super::{PolicyKind, ReadyView};
use crate::task::{TaskId, TaskRegistry};

/// Laxity = deadline − now − remaining. Negative means the deadline can no
/// longer be met even if the task runs uninterrupted from here.
pub fn laxity(registry: &TaskRegistry, id: TaskId, now: u64) -> i64 {
    let deadline = registry.spec(id).deadline.unwrap_or(u64::MAX);
    saturate(deadline) - saturate(now) - saturate(registry.state(id).remaining)
}

/// The urgency metric for `kind`: smaller is more urgent.
///
/// `RoundRobin` and `Hybrid` have no metric — rotation order and the
/// controller's active policy respectively decide for them — and must not
/// reach this function.
pub fn urgency(kind: PolicyKind, registry: &TaskRegistry, id: TaskId, now: u64) -> i64 {
    let spec = registry.spec(id);
    match kind {
        PolicyKind::Fcfs => saturate(spec.arrival),
        PolicyKind::Sjf => saturate(spec.burst),
        PolicyKind::Srtf => saturate(registry.state(id).remaining),
        PolicyKind::Edf => saturate(spec.deadline.unwrap_or(u64::MAX)),
        PolicyKind::Priority { .. } => i64::from(spec.priority),
        PolicyKind::Rms => saturate(spec.period.unwrap_or(u64::MAX)),
        PolicyKind::Llf => laxity(registry, id, now),
        PolicyKind::RoundRobin | PolicyKind::Hybrid => {
            unreachable!("{kind} has no urgency metric")
        }
    }
}

/// Select the next task to run from the ready set, or `None` when it is
/// empty. Pure: the caller applies the decision.
pub fn select(kind: PolicyKind, view: &ReadyView<'_>) -> Option<TaskId> {
    if view.ready.is_empty() {
        return None;
    }
    match kind {
        PolicyKind::RoundRobin => view
            .rotation
            .iter()
            .copied()
            .find(|id| view.ready.contains(id)),
        PolicyKind::Hybrid => unreachable!("hybrid must be resolved before selection"),
        _ => view.ready.iter().copied().min_by_key(|&id| {
            let spec = view.registry.spec(id);
            (urgency(kind, view.registry, id, view.now), spec.arrival, id)
        }),
    }
}

fn saturate(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskSpec;
    use std::collections::VecDeque;

    fn registry(specs: Vec<TaskSpec>) -> TaskRegistry {
        TaskRegistry::new(specs, 0, 0).unwrap()
    }

    fn view<'a>(
        registry: &'a TaskRegistry,
        ready: &'a [TaskId],
        rotation: &'a VecDeque<TaskId>,
        now: u64,
    ) -> ReadyView<'a> {
        ReadyView {
            now,
            ready,
            registry,
            rotation,
        }
    }

    #[test]
    fn test_fcfs_picks_earliest_arrival() {
        let reg = registry(vec![TaskSpec::new(0, 4, 2), TaskSpec::new(1, 1, 5)]);
        let ready = [TaskId(0), TaskId(1)];
        let rotation = VecDeque::new();
        assert_eq!(
            select(PolicyKind::Fcfs, &view(&reg, &ready, &rotation, 5)),
            Some(TaskId(1))
        );
    }

    #[test]
    fn test_sjf_ties_break_by_arrival() {
        let reg = registry(vec![TaskSpec::new(0, 3, 4), TaskSpec::new(1, 1, 4)]);
        let ready = [TaskId(0), TaskId(1)];
        let rotation = VecDeque::new();
        assert_eq!(
            select(PolicyKind::Sjf, &view(&reg, &ready, &rotation, 5)),
            Some(TaskId(1))
        );
    }

    #[test]
    fn test_edf_treats_missing_deadline_as_infinite() {
        let reg = registry(vec![
            TaskSpec::new(0, 0, 3),
            TaskSpec::new(1, 0, 3).with_deadline(9),
        ]);
        let ready = [TaskId(0), TaskId(1)];
        let rotation = VecDeque::new();
        assert_eq!(
            select(PolicyKind::Edf, &view(&reg, &ready, &rotation, 0)),
            Some(TaskId(1))
        );
    }

    #[test]
    fn test_rms_prefers_shorter_period() {
        let reg = registry(vec![
            TaskSpec::new(0, 0, 1).with_period(50),
            TaskSpec::new(1, 0, 1).with_period(20),
        ]);
        let ready: Vec<TaskId> = reg.ids().collect();
        let rotation = VecDeque::new();
        let chosen = select(PolicyKind::Rms, &view(&reg, &ready, &rotation, 0)).unwrap();
        assert_eq!(reg.spec(chosen).period, Some(20));
    }

    #[test]
    fn test_llf_laxity_goes_negative() {
        let reg = registry(vec![TaskSpec::new(0, 0, 5).with_deadline(4)]);
        assert_eq!(laxity(&reg, TaskId(0), 2), 4 - 2 - 5);
    }

    #[test]
    fn test_round_robin_follows_rotation() {
        let reg = registry(vec![TaskSpec::new(0, 0, 2), TaskSpec::new(1, 0, 2)]);
        let ready = [TaskId(0), TaskId(1)];
        let rotation: VecDeque<TaskId> = [TaskId(1), TaskId(0)].into_iter().collect();
        assert_eq!(
            select(PolicyKind::RoundRobin, &view(&reg, &ready, &rotation, 0)),
            Some(TaskId(1))
        );
    }
}
