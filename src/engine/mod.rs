//! The simulation engine: a discrete clock, one mutable scheduler state,
//! and the tick loop that drives policies, resources, and bookkeeping.
//!
//! Determinism is the load-bearing property. The loop is single-threaded,
//! cores are served in ascending index order, ties resolve by arrival then
//! task id, and every consumer-facing side effect (feed, live status) is
//! fire-and-forget so a slow reader can never perturb the clock.

mod state;

use crate::config::SimConfig;
use crate::deadlock;
use crate::error::{Error, Result};
use crate::events::{EventLog, SimEvent};
use crate::feed::{timeline_feed, FeedReceiver, FeedSender};
use crate::metrics::MetricsSnapshot;
use crate::policy::{self, AdaptiveController, PolicyKind, ReadyView};
use crate::power::{CoreStatus, CoreStatusModel};
use crate::report::{IntervalKind, SimReport, StopReason};
use crate::resource::{ResourceGraph, ResourceId};
use crate::task::{TaskId, TaskRegistry, TaskSpec};
use parking_lot::RwLock;
use state::SchedulerState;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Requests the engine stop at the next tick boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Read-only view of the running simulation, refreshed once per tick.
#[derive(Debug, Clone)]
pub struct LiveStatus {
    pub tick: u64,
    pub active_policy: PolicyKind,
    pub ready: usize,
    pub blocked: usize,
    pub completed: usize,
    pub cores: Vec<CoreStatus>,
}

/// Shared handle to the live status; cheap to clone and poll.
#[derive(Debug, Clone)]
pub struct LiveHandle(Arc<RwLock<LiveStatus>>);

impl LiveHandle {
    pub fn snapshot(&self) -> LiveStatus {
        self.0.read().clone()
    }
}

enum Claim {
    Runnable,
    Blocked(ResourceId),
}

/// The simulation engine. Built once per run; `run` consumes it and yields
/// the report.
#[derive(Debug)]
pub struct Engine {
    config: SimConfig,
    registry: TaskRegistry,
    resources: ResourceGraph,
    state: SchedulerState,
    events: EventLog,
    controller: Option<AdaptiveController>,
    model: CoreStatusModel,
    feed: Option<FeedSender>,
    live: Arc<RwLock<LiveStatus>>,
    cancel: CancelToken,
}

impl Engine {
    /// Validate the configuration and task set, and stage every arrival.
    /// No simulation state exists until this succeeds.
    pub fn new(
        config: SimConfig,
        tasks: Vec<TaskSpec>,
        resources: ResourceGraph,
    ) -> Result<Self> {
        config.validate()?;
        let registry = TaskRegistry::new(tasks, resources.len(), config.periodic_horizon)?;

        let mut arrivals: Vec<TaskId> = registry.ids().collect();
        arrivals.sort_by_key(|&id| (registry.spec(id).arrival, id));
        let pending: VecDeque<TaskId> = arrivals.into();

        let controller = if config.policy == PolicyKind::Hybrid {
            Some(AdaptiveController::new(
                config.rules.clone(),
                config.fallback,
            )?)
        } else {
            None
        };

        let model = CoreStatusModel::new(config.power.clone(), config.num_cores);
        let live = Arc::new(RwLock::new(LiveStatus {
            tick: 0,
            active_policy: controller
                .as_ref()
                .map_or(config.policy, AdaptiveController::active),
            ready: 0,
            blocked: 0,
            completed: 0,
            cores: model.statuses(),
        }));

        Ok(Self {
            state: SchedulerState::new(pending, config.num_cores),
            config,
            registry,
            resources,
            events: EventLog::new(),
            controller,
            model,
            feed: None,
            live,
            cancel: CancelToken::default(),
        })
    }

    /// Attach a live timeline feed; intervals are published as their
    /// segments close. Capacity comes from the config.
    pub fn timeline_feed(&mut self) -> FeedReceiver {
        let (tx, rx) = timeline_feed(self.config.feed_capacity);
        self.feed = Some(tx);
        rx
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn live_handle(&self) -> LiveHandle {
        LiveHandle(Arc::clone(&self.live))
    }

    /// Drive the simulation to termination, cancellation, or the tick
    /// ceiling. Divergence reports carry the partial run for diagnosis.
    pub fn run(mut self) -> Result<SimReport> {
        loop {
            if self.state.is_done() {
                return Ok(self.finish(StopReason::Finished));
            }
            if self.cancel.is_cancelled() {
                return Ok(self.finish(StopReason::Cancelled));
            }
            if self.state.now >= self.config.max_ticks {
                let max_ticks = self.config.max_ticks;
                let partial = self.finish(StopReason::Diverged);
                return Err(Error::Divergence {
                    max_ticks,
                    partial: Box::new(partial),
                });
            }
            self.tick()?;
        }
    }

    fn tick(&mut self) -> Result<()> {
        let now = self.state.now;
        self.admit_arrivals(now);
        self.reevaluate_policy(now);

        let active = self.active_policy();
        for core in 0..self.config.num_cores {
            self.dispatch(core, active, now)?;
        }
        self.execute(active);
        self.state.now = now + 1;
        self.post_execute(active)?;
        self.publish_live(active);
        Ok(())
    }

    fn active_policy(&self) -> PolicyKind {
        self.controller
            .as_ref()
            .map_or(self.config.policy, AdaptiveController::active)
    }

    fn admit_arrivals(&mut self, now: u64) {
        while let Some(&next) = self.state.pending.front() {
            if self.registry.spec(next).arrival > now {
                break;
            }
            self.state.pending.pop_front();
            self.state.make_ready(next);
            self.events.record(SimEvent::TaskArrived {
                task: next,
                tick: now,
            });
        }
    }

    /// Hybrid mode: fold the finished window into stats and apply the rule
    /// table. Runs strictly at window boundaries, before any dispatch, so a
    /// switch never reattributes an in-flight interval.
    fn reevaluate_policy(&mut self, now: u64) {
        let window = self.config.decision_window;
        if now == 0 || now % window != 0 {
            return;
        }
        let Some(controller) = &mut self.controller else {
            return;
        };

        let remaining: Vec<f64> = self
            .state
            .ready
            .iter()
            .map(|&id| self.registry.state(id).remaining as f64)
            .collect();
        let burst_cv = policy::adaptive::coefficient_of_variation(&remaining);
        let stats = controller.window_stats(window, self.state.ready.len(), burst_cv);

        if let Some((from, to)) = controller.reevaluate(&stats) {
            self.events
                .record(SimEvent::PolicySwitched { from, to, tick: now });
        }
    }

    fn dispatch(&mut self, core: usize, active: PolicyKind, now: u64) -> Result<()> {
        // A running task may hit a mid-execution resource request.
        if let Some(occupant) = self.state.cores[core].running {
            if let Claim::Blocked(resource) = self.claim(occupant) {
                self.close_segment(core, now, IntervalKind::Blocked);
                self.state.cores[core].running = None;
                self.state.cores[core].slice_used = 0;
                self.state.blocked.insert(occupant, resource);
                self.resolve_deadlocks(now)?;
            }
        }

        if active.is_preemptive() {
            self.consider_preemption(core, active, now);
        }

        while self.state.cores[core].running.is_none() {
            let candidate = {
                let view = ReadyView {
                    now,
                    ready: &self.state.ready,
                    registry: &self.registry,
                    rotation: &self.state.rotation,
                };
                policy::select(active, &view)
            };
            let Some(candidate) = candidate else { break };

            self.state.take_ready(candidate);
            match self.claim(candidate) {
                Claim::Runnable => {
                    let task_state = self.registry.state_mut(candidate);
                    if task_state.first_run.is_none() {
                        task_state.first_run = Some(now);
                    }
                    self.state.begin_occupancy(core, candidate, now);
                    self.state.cores[core].running = Some(candidate);
                    self.state.cores[core].slice_used = 0;
                }
                Claim::Blocked(resource) => {
                    self.state.blocked.insert(candidate, resource);
                    self.resolve_deadlocks(now)?;
                }
            }
        }

        if self.state.cores[core].running.is_none() {
            self.state.begin_idle(core, now);
        }
        Ok(())
    }

    fn consider_preemption(&mut self, core: usize, active: PolicyKind, now: u64) {
        let Some(occupant) = self.state.cores[core].running else {
            return;
        };
        let challenger = {
            let view = ReadyView {
                now,
                ready: &self.state.ready,
                registry: &self.registry,
                rotation: &self.state.rotation,
            };
            policy::select(active, &view)
        };
        let Some(challenger) = challenger else { return };

        // Strictly more urgent only: equal urgency never displaces the
        // incumbent.
        let challenger_urgency = policy::urgency(active, &self.registry, challenger, now);
        let occupant_urgency = policy::urgency(active, &self.registry, occupant, now);
        if challenger_urgency < occupant_urgency {
            self.close_segment(core, now, IntervalKind::Preempted);
            self.state.cores[core].running = None;
            self.state.cores[core].slice_used = 0;
            self.registry.state_mut(occupant).preemptions += 1;
            if let Some(controller) = &mut self.controller {
                controller.record_preemption();
            }
            self.state.make_ready(occupant);
        }
    }

    /// Satisfy the task's due resource requests in declared order. The
    /// first unavailable one blocks the task; everything acquired so far
    /// stays held.
    fn claim(&mut self, task: TaskId) -> Claim {
        let requests = self.registry.spec(task).requests.clone();
        let executed = self.registry.executed(task);
        loop {
            let satisfied = self.registry.state(task).satisfied;
            if satisfied >= requests.len() {
                return Claim::Runnable;
            }
            let request = requests[satisfied];
            if request.at > executed {
                return Claim::Runnable;
            }
            if self.resources.try_acquire(request.resource, task) {
                let task_state = self.registry.state_mut(task);
                task_state.held.push(request.resource);
                task_state.satisfied += 1;
            } else {
                self.resources.enqueue_waiter(request.resource, task);
                return Claim::Blocked(request.resource);
            }
        }
    }

    fn execute(&mut self, active: PolicyKind) {
        let num_cores = self.config.num_cores;
        let mut busy = 0usize;
        for core in 0..num_cores {
            match self.state.cores[core].running {
                Some(task) => {
                    busy += 1;
                    self.state.cores[core].slice_used += 1;
                    self.registry.state_mut(task).remaining -= 1;
                    self.model.observe(core, true);
                    if active == PolicyKind::Llf
                        && policy::strategies::laxity(&self.registry, task, self.state.now) < 0
                    {
                        self.mark_missed(task, self.state.now);
                    }
                }
                None => {
                    self.model.observe(core, false);
                }
            }
        }
        if let Some(controller) = &mut self.controller {
            controller.observe_load(busy as f64 / num_cores as f64);
        }
    }

    fn post_execute(&mut self, active: PolicyKind) -> Result<()> {
        let now = self.state.now;
        for core in 0..self.config.num_cores {
            let Some(task) = self.state.cores[core].running else {
                continue;
            };

            if self.registry.state(task).is_complete() {
                self.registry.complete(task, now);
                self.state.completed.push(task);
                self.events.record(SimEvent::TaskCompleted {
                    task,
                    core,
                    tick: now,
                });
                if let Some(controller) = &mut self.controller {
                    controller.record_completion();
                }
                if let Some(deadline) = self.registry.spec(task).deadline {
                    if now > deadline {
                        self.mark_missed(task, now);
                    }
                }
                self.close_segment(core, now, IntervalKind::Run);
                self.state.cores[core].running = None;
                self.state.cores[core].slice_used = 0;
                self.release_resources(task);
                self.resolve_deadlocks(now)?;
            } else if active == PolicyKind::RoundRobin {
                let quantum = self.config.quantum.expect("validated for round robin");
                if self.state.cores[core].slice_used >= quantum {
                    self.close_segment(core, now, IntervalKind::SliceExpired);
                    self.state.cores[core].running = None;
                    self.state.cores[core].slice_used = 0;
                    self.state.make_ready(task);
                }
            }
        }
        Ok(())
    }

    /// Release everything `task` holds and walk each grant forward: a
    /// waiter that can now satisfy all its due requests rejoins the ready
    /// set, one that hits the next contended resource stays blocked there.
    fn release_resources(&mut self, task: TaskId) {
        let grants = self.resources.release_all(task);
        self.registry.state_mut(task).held.clear();
        for (resource, waiter) in grants {
            let waiter_state = self.registry.state_mut(waiter);
            waiter_state.held.push(resource);
            waiter_state.satisfied += 1;
            self.state.blocked.remove(&waiter);
            match self.claim(waiter) {
                Claim::Runnable => self.state.make_ready(waiter),
                Claim::Blocked(next) => {
                    self.state.blocked.insert(waiter, next);
                }
            }
        }
    }

    /// Break wait-for cycles by preempting the least urgent member until
    /// none remain. Bounded: each resolution unblocks at least one task, so
    /// needing more rounds than blocked tasks means the invariant broke.
    fn resolve_deadlocks(&mut self, now: u64) -> Result<()> {
        let mut rounds = 0usize;
        while let Some(cycle) = deadlock::find_cycle(&self.state.blocked, &self.resources) {
            rounds += 1;
            if rounds > self.state.blocked.len().max(1) {
                return Err(Error::DeadlockUnresolved { tick: now });
            }

            let victim = deadlock::choose_victim(&cycle, &self.registry);
            let released = self.registry.state(victim).held.clone();
            self.state.blocked.remove(&victim);
            self.resources.cancel_waits(victim);
            self.release_resources(victim);

            let victim_state = self.registry.state_mut(victim);
            victim_state.satisfied = 0;
            victim_state.preemptions += 1;
            if let Some(controller) = &mut self.controller {
                controller.record_preemption();
            }
            self.state.make_ready(victim);
            self.events.record(SimEvent::DeadlockResolved {
                cycle,
                victim,
                released,
                tick: now,
            });
        }
        Ok(())
    }

    fn mark_missed(&mut self, task: TaskId, now: u64) {
        let task_state = self.registry.state_mut(task);
        if task_state.deadline_missed {
            return;
        }
        task_state.deadline_missed = true;
        let deadline = self
            .registry
            .spec(task)
            .deadline
            .expect("missed deadline implies a deadline");
        self.events.record(SimEvent::DeadlineMissed {
            task,
            deadline,
            tick: now,
        });
        if let Some(controller) = &mut self.controller {
            controller.record_miss();
        }
    }

    fn close_segment(&mut self, core: usize, end: u64, kind: IntervalKind) {
        if let Some(interval) = self.state.close_segment(core, end, kind) {
            if let Some(feed) = &self.feed {
                feed.publish(interval);
            }
        }
    }

    fn publish_live(&self, active: PolicyKind) {
        let mut live = self.live.write();
        live.tick = self.state.now;
        live.active_policy = active;
        live.ready = self.state.ready.len();
        live.blocked = self.state.blocked.len();
        live.completed = self.state.completed.len();
        live.cores = self.model.statuses();
    }

    fn finish(mut self, stop: StopReason) -> SimReport {
        for interval in self.state.close_all_segments() {
            if let Some(feed) = &self.feed {
                feed.publish(interval);
            }
        }
        let metrics = MetricsSnapshot::compute(
            &self.registry,
            &self.state.timeline,
            &self.config.power,
            self.config.num_cores,
        );
        SimReport {
            final_policy: self.active_policy(),
            timeline: self.state.timeline,
            events: self.events.into_events(),
            metrics,
            stop,
            ticks: self.state.now,
        }
    }
}

/// Convenience: build an engine and run it in one call.
pub fn run(config: SimConfig, tasks: Vec<TaskSpec>, resources: ResourceGraph) -> Result<SimReport> {
    Engine::new(config, tasks, resources)?.run()
}
