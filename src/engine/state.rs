//! Scheduler state: the single mutable value the tick loop threads through.

use crate::report::{ExecutionInterval, IntervalKind};
use crate::resource::ResourceId;
use crate::task::TaskId;
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone, Copy)]
struct OpenSegment {
    task: Option<TaskId>,
    start: u64,
}

/// One simulated core.
#[derive(Debug, Clone)]
pub(crate) struct CoreSlot {
    pub running: Option<TaskId>,
    /// Consecutive ticks the occupant has held the core (round robin).
    pub slice_used: u64,
    segment: Option<OpenSegment>,
}

impl CoreSlot {
    fn new() -> Self {
        Self {
            running: None,
            slice_used: 0,
            segment: None,
        }
    }
}

/// Exclusively owned by the engine; policies only ever see read views.
///
/// `rotation` mirrors the ready set in round-robin order: tasks join at the
/// back when they become ready and leave when dispatched.
#[derive(Debug, Clone)]
pub(crate) struct SchedulerState {
    pub now: u64,
    /// Not yet arrived, sorted by (arrival, id).
    pub pending: VecDeque<TaskId>,
    pub ready: Vec<TaskId>,
    /// Blocked task -> resource it waits on. Ordered map so the wait-for
    /// graph is traversed deterministically.
    pub blocked: BTreeMap<TaskId, ResourceId>,
    pub completed: Vec<TaskId>,
    pub cores: Vec<CoreSlot>,
    pub rotation: VecDeque<TaskId>,
    pub timeline: Vec<ExecutionInterval>,
}

impl SchedulerState {
    pub fn new(pending: VecDeque<TaskId>, num_cores: usize) -> Self {
        Self {
            now: 0,
            pending,
            ready: Vec::new(),
            blocked: BTreeMap::new(),
            completed: Vec::new(),
            cores: vec![CoreSlot::new(); num_cores],
            rotation: VecDeque::new(),
            timeline: Vec::new(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.pending.is_empty()
            && self.ready.is_empty()
            && self.blocked.is_empty()
            && self.cores.iter().all(|c| c.running.is_none())
    }

    /// Admit a task to the ready set (and the rotation tail).
    pub fn make_ready(&mut self, task: TaskId) {
        debug_assert!(!self.ready.contains(&task));
        self.ready.push(task);
        self.rotation.push_back(task);
    }

    /// Remove a task from the ready set ahead of dispatch or blocking.
    pub fn take_ready(&mut self, task: TaskId) {
        if let Some(pos) = self.ready.iter().position(|&t| t == task) {
            self.ready.remove(pos);
        }
        self.rotation.retain(|&t| t != task);
    }

    /// Open a segment for `occupant` on `core` unless one is already
    /// running for it. An open idle segment is closed first.
    pub fn begin_occupancy(&mut self, core: usize, occupant: TaskId, now: u64) {
        match self.cores[core].segment {
            Some(seg) if seg.task == Some(occupant) => {}
            Some(seg) => {
                debug_assert!(seg.task.is_none(), "task segment left open across occupants");
                self.close_segment(core, now, IntervalKind::Idle);
                self.open_segment(core, Some(occupant), now);
            }
            None => self.open_segment(core, Some(occupant), now),
        }
    }

    /// Open an idle segment if the core has none.
    pub fn begin_idle(&mut self, core: usize, now: u64) {
        if self.cores[core].segment.is_none() {
            self.open_segment(core, None, now);
        }
    }

    fn open_segment(&mut self, core: usize, task: Option<TaskId>, start: u64) {
        self.cores[core].segment = Some(OpenSegment { task, start });
    }

    /// Close the core's open segment at `end`, appending it to the
    /// timeline. Zero-length segments are discarded. Idle segments always
    /// close as `Idle`, whatever `kind` the caller passes.
    pub fn close_segment(
        &mut self,
        core: usize,
        end: u64,
        kind: IntervalKind,
    ) -> Option<ExecutionInterval> {
        let seg = self.cores[core].segment.take()?;
        if seg.start >= end {
            return None;
        }
        let interval = ExecutionInterval {
            task: seg.task,
            start: seg.start,
            end,
            core,
            kind: if seg.task.is_none() {
                IntervalKind::Idle
            } else {
                kind
            },
        };
        self.timeline.push(interval);
        Some(interval)
    }

    /// Close whatever is still open on every core, at end of run.
    pub fn close_all_segments(&mut self) -> Vec<ExecutionInterval> {
        let now = self.now;
        (0..self.cores.len())
            .filter_map(|core| self.close_segment(core, now, IntervalKind::Run))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_coalesce_consecutive_ticks() {
        let mut state = SchedulerState::new(VecDeque::new(), 1);
        state.begin_occupancy(0, TaskId(3), 0);
        // Re-dispatching the same occupant keeps the segment open.
        state.begin_occupancy(0, TaskId(3), 1);
        state.begin_occupancy(0, TaskId(3), 2);
        let interval = state.close_segment(0, 3, IntervalKind::Run).unwrap();

        assert_eq!(interval.start, 0);
        assert_eq!(interval.end, 3);
        assert_eq!(interval.task, Some(TaskId(3)));
    }

    #[test]
    fn test_zero_length_segment_discarded() {
        let mut state = SchedulerState::new(VecDeque::new(), 1);
        state.begin_occupancy(0, TaskId(1), 5);
        assert!(state.close_segment(0, 5, IntervalKind::Run).is_none());
        assert!(state.timeline.is_empty());
    }

    #[test]
    fn test_idle_segment_closes_as_idle() {
        let mut state = SchedulerState::new(VecDeque::new(), 1);
        state.begin_idle(0, 0);
        state.begin_occupancy(0, TaskId(1), 2);
        assert_eq!(state.timeline.len(), 1);
        assert_eq!(state.timeline[0].kind, IntervalKind::Idle);
        assert_eq!(state.timeline[0].task, None);
    }

    #[test]
    fn test_rotation_tracks_ready() {
        let mut state = SchedulerState::new(VecDeque::new(), 1);
        state.make_ready(TaskId(1));
        state.make_ready(TaskId(2));
        state.take_ready(TaskId(1));

        assert_eq!(state.ready, vec![TaskId(2)]);
        assert_eq!(state.rotation.front(), Some(&TaskId(2)));
    }
}
