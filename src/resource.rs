//! Shared resources and the arena-style graph that owns them.

use crate::task::TaskId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Index into the resource arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub u32);

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// A mutual-exclusion resource: at most one holder, FIFO wait queue.
#[derive(Debug, Clone)]
pub struct Resource {
    pub name: String,
    holder: Option<TaskId>,
    waiters: VecDeque<TaskId>,
}

impl Resource {
    fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            holder: None,
            waiters: VecDeque::new(),
        }
    }

    pub fn holder(&self) -> Option<TaskId> {
        self.holder
    }
}

/// Arena of resources, addressed by `ResourceId`.
///
/// Index-based ids keep the wait-for relation acyclic in memory even when
/// the tasks' wait-for relation is not.
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    resources: Vec<Resource>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a resource, returning its id.
    pub fn add<S: Into<String>>(&mut self, name: S) -> ResourceId {
        let id = ResourceId(self.resources.len() as u32);
        self.resources.push(Resource::new(name));
        id
    }

    /// Convenience: build a graph of `count` anonymous resources.
    pub fn with_capacity(count: usize) -> Self {
        let mut graph = Self::new();
        for i in 0..count {
            graph.add(format!("R{i}"));
        }
        graph
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get(&self, id: ResourceId) -> &Resource {
        &self.resources[id.0 as usize]
    }

    /// Acquire `id` for `task` if it is free. Returns whether the task now
    /// holds the resource.
    pub fn try_acquire(&mut self, id: ResourceId, task: TaskId) -> bool {
        let resource = &mut self.resources[id.0 as usize];
        match resource.holder {
            None => {
                resource.holder = Some(task);
                true
            }
            Some(holder) => holder == task,
        }
    }

    /// Queue `task` behind the current holder of `id`.
    pub fn enqueue_waiter(&mut self, id: ResourceId, task: TaskId) {
        let resource = &mut self.resources[id.0 as usize];
        debug_assert!(resource.holder.is_some() && resource.holder != Some(task));
        if !resource.waiters.contains(&task) {
            resource.waiters.push_back(task);
        }
    }

    /// Remove `task` from every wait queue.
    pub fn cancel_waits(&mut self, task: TaskId) {
        for resource in &mut self.resources {
            resource.waiters.retain(|&t| t != task);
        }
    }

    /// Release every resource `task` holds. Each freed resource is handed to
    /// the head of its wait queue; the returned list is (resource, new
    /// holder) in resource-id order.
    pub fn release_all(&mut self, task: TaskId) -> Vec<(ResourceId, TaskId)> {
        let mut grants = Vec::new();
        for (idx, resource) in self.resources.iter_mut().enumerate() {
            if resource.holder == Some(task) {
                resource.holder = resource.waiters.pop_front();
                if let Some(next) = resource.holder {
                    grants.push((ResourceId(idx as u32), next));
                }
            }
        }
        grants
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_holder() {
        let mut graph = ResourceGraph::with_capacity(1);
        let r = ResourceId(0);

        assert!(graph.try_acquire(r, TaskId(1)));
        assert!(!graph.try_acquire(r, TaskId(2)));
        // Reacquisition by the holder is a no-op success.
        assert!(graph.try_acquire(r, TaskId(1)));
    }

    #[test]
    fn test_release_grants_fifo() {
        let mut graph = ResourceGraph::with_capacity(1);
        let r = ResourceId(0);

        graph.try_acquire(r, TaskId(1));
        graph.enqueue_waiter(r, TaskId(2));
        graph.enqueue_waiter(r, TaskId(3));

        let grants = graph.release_all(TaskId(1));
        assert_eq!(grants, vec![(r, TaskId(2))]);
        assert_eq!(graph.get(r).holder(), Some(TaskId(2)));

        let grants = graph.release_all(TaskId(2));
        assert_eq!(grants, vec![(r, TaskId(3))]);
    }

    #[test]
    fn test_cancel_waits() {
        let mut graph = ResourceGraph::with_capacity(2);
        graph.try_acquire(ResourceId(0), TaskId(1));
        graph.try_acquire(ResourceId(1), TaskId(1));
        graph.enqueue_waiter(ResourceId(0), TaskId(2));
        graph.enqueue_waiter(ResourceId(1), TaskId(2));

        graph.cancel_waits(TaskId(2));
        assert!(graph.release_all(TaskId(1)).is_empty());
    }
}
