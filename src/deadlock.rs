//! Deadlock detection over the wait-for graph.
//!
//! An edge runs from each blocked task to the holder of the resource it
//! waits on. A cycle means no task in it can ever proceed; the engine breaks
//! the cycle by preempting the least urgent member.

use crate::resource::{ResourceGraph, ResourceId};
use crate::task::{TaskId, TaskRegistry};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Search the wait-for graph for a cycle.
///
/// `blocked` maps each blocked task to the resource it waits on; iteration
/// order is sorted by task id, so the returned cycle is deterministic.
/// Depth-first search with recursion-stack marking: a back edge into the
/// stack closes a cycle, and the stack suffix from that node is the cycle.
pub fn find_cycle(
    blocked: &BTreeMap<TaskId, ResourceId>,
    graph: &ResourceGraph,
) -> Option<Vec<TaskId>> {
    let edges: HashMap<TaskId, TaskId> = blocked
        .iter()
        .filter_map(|(&task, &resource)| graph.get(resource).holder().map(|h| (task, h)))
        .collect();

    let mut visited: HashSet<TaskId> = HashSet::new();

    for &start in blocked.keys() {
        if visited.contains(&start) {
            continue;
        }
        let mut stack: Vec<TaskId> = Vec::new();
        let mut on_stack: HashSet<TaskId> = HashSet::new();
        let mut current = start;

        // Each node has at most one outgoing edge, so the walk is a chain.
        loop {
            if on_stack.contains(&current) {
                let pos = stack
                    .iter()
                    .position(|&t| t == current)
                    .expect("on-stack node is on the stack");
                return Some(stack[pos..].to_vec());
            }
            if visited.contains(&current) {
                break;
            }
            visited.insert(current);
            on_stack.insert(current);
            stack.push(current);

            match edges.get(&current) {
                Some(&next) => current = next,
                None => break,
            }
        }
    }
    None
}

/// The cycle member to preempt: the lowest-priority task (highest priority
/// number), ties broken by latest arrival, then highest id.
pub fn choose_victim(cycle: &[TaskId], registry: &TaskRegistry) -> TaskId {
    cycle
        .iter()
        .copied()
        .max_by_key(|&id| {
            let spec = registry.spec(id);
            (spec.priority, spec.arrival, id)
        })
        .expect("cycle is never empty")
}
