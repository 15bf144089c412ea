use tempo::prelude::*;

fn timeline_triples(report: &SimReport) -> Vec<(Option<TaskId>, u64, u64)> {
    report
        .timeline
        .iter()
        .map(|i| (i.task, i.start, i.end))
        .collect()
}

/// Checks the invariants every run must satisfy, whatever the policy.
fn assert_run_invariants(report: &SimReport) {
    // Utilization is a fraction, and hits 1.0 exactly when nothing idled.
    let has_idle = report.timeline.iter().any(|i| i.is_idle());
    assert!(report.metrics.cpu_utilization >= 0.0 && report.metrics.cpu_utilization <= 1.0);
    if report.metrics.total_ticks > 0 {
        assert_eq!(report.metrics.cpu_utilization == 1.0, !has_idle);
    }

    // Per-core intervals never overlap and tile the run back to back.
    for core in 0..report.metrics.per_core_utilization.len() {
        let mut intervals: Vec<_> = report
            .timeline
            .iter()
            .filter(|i| i.core == core)
            .collect();
        intervals.sort_by_key(|i| i.start);
        for pair in intervals.windows(2) {
            assert!(pair[0].end <= pair[1].start, "overlap on core {core}");
        }
    }

    // Completed tasks received exactly their burst, and their timing
    // figures are consistent.
    for task in &report.metrics.per_task {
        if !task.completed {
            continue;
        }
        let executed: u64 = report
            .intervals_for(task.id)
            .map(ExecutionInterval::duration)
            .sum();
        assert_eq!(executed, task.burst, "burst accounting for {}", task.id);

        let turnaround = task.turnaround.unwrap();
        assert!(turnaround >= task.burst);
        assert_eq!(task.waiting.unwrap(), turnaround - task.burst);
    }
}

#[test]
fn test_fcfs_reference_run() {
    let config = SimConfig::builder().policy(PolicyKind::Fcfs).build().unwrap();
    let tasks = vec![TaskSpec::new(0, 0, 4), TaskSpec::new(1, 1, 2)];
    let report = tempo::run(config, tasks, ResourceGraph::new()).unwrap();

    assert_eq!(
        timeline_triples(&report),
        vec![(Some(TaskId(0)), 0, 4), (Some(TaskId(1)), 4, 6)]
    );
    assert_eq!(report.metrics.task(TaskId(0)).unwrap().waiting, Some(0));
    assert_eq!(report.metrics.task(TaskId(1)).unwrap().waiting, Some(3));
    assert_run_invariants(&report);
}

#[test]
fn test_edf_reference_run() {
    let config = SimConfig::builder().policy(PolicyKind::Edf).build().unwrap();
    let tasks = vec![
        TaskSpec::new(0, 0, 3).with_deadline(5),
        TaskSpec::new(1, 1, 2).with_deadline(3),
    ];
    let report = tempo::run(config, tasks, ResourceGraph::new()).unwrap();

    assert_eq!(
        timeline_triples(&report),
        vec![
            (Some(TaskId(0)), 0, 1),
            (Some(TaskId(1)), 1, 3),
            (Some(TaskId(0)), 3, 5),
        ]
    );
    assert_eq!(report.metrics.missed_deadlines, 0);
    assert!(report
        .events
        .iter()
        .all(|e| !matches!(e, SimEvent::DeadlineMissed { .. })));
    assert_run_invariants(&report);
}

#[test]
fn test_round_robin_honors_quantum() {
    let config = SimConfig::builder()
        .policy(PolicyKind::RoundRobin)
        .quantum(3)
        .build()
        .unwrap();
    let tasks = generate(&WorkloadConfig {
        tasks: 8,
        seed: 11,
        ..WorkloadConfig::default()
    });
    let report = tempo::run(config, tasks, ResourceGraph::new()).unwrap();

    for interval in report.timeline.iter().filter(|i| !i.is_idle()) {
        assert!(
            interval.duration() <= 3,
            "interval {interval:?} exceeds the quantum"
        );
    }
    assert_eq!(report.metrics.completed, 8);
    assert_run_invariants(&report);
}

#[test]
fn test_srtf_prefers_short_newcomer() {
    let config = SimConfig::builder().policy(PolicyKind::Srtf).build().unwrap();
    let tasks = vec![TaskSpec::new(0, 0, 8), TaskSpec::new(1, 2, 2)];
    let report = tempo::run(config, tasks, ResourceGraph::new()).unwrap();

    // The long task is displaced as soon as the short one arrives.
    assert_eq!(
        timeline_triples(&report),
        vec![
            (Some(TaskId(0)), 0, 2),
            (Some(TaskId(1)), 2, 4),
            (Some(TaskId(0)), 4, 10),
        ]
    );
    assert_eq!(report.metrics.task(TaskId(0)).unwrap().preemptions, 1);
    assert_run_invariants(&report);
}

#[test]
fn test_rms_runs_shorter_period_first() {
    let config = SimConfig::builder()
        .policy(PolicyKind::Rms)
        .periodic_horizon(0)
        .build()
        .unwrap();
    let tasks = vec![
        TaskSpec::new(0, 0, 2).with_period(40),
        TaskSpec::new(1, 0, 2).with_period(10),
    ];
    let report = tempo::run(config, tasks, ResourceGraph::new()).unwrap();

    assert_eq!(
        timeline_triples(&report),
        vec![(Some(TaskId(1)), 0, 2), (Some(TaskId(0)), 2, 4)]
    );
    assert_run_invariants(&report);
}

#[test]
fn test_periodic_jobs_all_complete() {
    let config = SimConfig::builder()
        .policy(PolicyKind::Rms)
        .periodic_horizon(50)
        .build()
        .unwrap();
    let tasks = vec![
        TaskSpec::new(0, 0, 1).with_period(10).with_deadline(10),
        TaskSpec::new(1, 0, 2).with_period(25).with_deadline(20),
    ];
    let report = tempo::run(config, tasks, ResourceGraph::new()).unwrap();

    // 6 releases of the first task, 3 of the second.
    assert_eq!(report.metrics.total_releases, 9);
    assert_eq!(report.metrics.completed, 9);
    assert_eq!(report.metrics.missed_deadlines, 0);
    assert_run_invariants(&report);
}

#[test]
fn test_llf_flags_unavoidable_miss_early() {
    let config = SimConfig::builder().policy(PolicyKind::Llf).build().unwrap();
    let tasks = vec![TaskSpec::new(0, 0, 5).with_deadline(2)];
    let report = tempo::run(config, tasks, ResourceGraph::new()).unwrap();

    let miss_tick = report
        .events
        .iter()
        .find_map(|e| match e {
            SimEvent::DeadlineMissed { tick, .. } => Some(*tick),
            _ => None,
        })
        .expect("miss must be recorded");
    // Flagged as soon as laxity goes negative, well before completion.
    assert!(miss_tick < 5);
    assert_eq!(report.metrics.completed, 1);
    assert_eq!(report.metrics.missed_deadlines, 1);
}

#[test]
fn test_deadlock_is_resolved_and_everyone_completes() {
    let mut resources = ResourceGraph::new();
    let r0 = resources.add("bus");
    let r1 = resources.add("disk");

    // Each task grabs one resource at dispatch and the other after two
    // executed units; round robin interleaves them into a deadlock.
    let tasks = vec![
        TaskSpec::new(0, 0, 6)
            .with_priority(1)
            .with_request(ResourceRequest::at_start(r0))
            .with_request(ResourceRequest::after(r1, 2)),
        TaskSpec::new(1, 0, 6)
            .with_priority(5)
            .with_request(ResourceRequest::at_start(r1))
            .with_request(ResourceRequest::after(r0, 2)),
    ];
    let config = SimConfig::builder()
        .policy(PolicyKind::RoundRobin)
        .quantum(2)
        .build()
        .unwrap();
    let report = tempo::run(config, tasks, resources).unwrap();

    let resolutions: Vec<_> = report
        .events
        .iter()
        .filter_map(|e| match e {
            SimEvent::DeadlockResolved { cycle, victim, .. } => Some((cycle.clone(), *victim)),
            _ => None,
        })
        .collect();
    assert_eq!(resolutions.len(), 1);

    let (cycle, victim) = &resolutions[0];
    assert_eq!(cycle.len(), 2);
    // The lower-priority task (higher number) is preempted.
    assert_eq!(*victim, TaskId(1));
    assert_eq!(report.metrics.completed, 2);
    assert_run_invariants(&report);
}

#[test]
fn test_plain_contention_is_not_a_deadlock() {
    let mut resources = ResourceGraph::new();
    let r0 = resources.add("lock");

    let tasks = vec![
        TaskSpec::new(0, 0, 4).with_request(ResourceRequest::at_start(r0)),
        TaskSpec::new(1, 0, 4).with_request(ResourceRequest::at_start(r0)),
    ];
    let config = SimConfig::builder().policy(PolicyKind::Fcfs).build().unwrap();
    let report = tempo::run(config, tasks, resources).unwrap();

    assert!(report
        .events
        .iter()
        .all(|e| !matches!(e, SimEvent::DeadlockResolved { .. })));
    // Serialized by the lock: one after the other.
    assert_eq!(report.metrics.completed, 2);
    assert_eq!(report.ticks, 8);
    assert_run_invariants(&report);
}

#[test]
fn test_hybrid_switches_at_window_boundary_only() {
    let config = SimConfig::builder()
        .policy(PolicyKind::Hybrid)
        .decision_window(4)
        .build()
        .unwrap();
    // Hopeless deadlines: every completion is a miss, so the miss-rate rule
    // fires at the first boundary.
    let tasks = vec![
        TaskSpec::new(0, 0, 2).with_deadline(1),
        TaskSpec::new(1, 0, 2).with_deadline(1),
        TaskSpec::new(2, 0, 2).with_deadline(1),
    ];
    let report = tempo::run(config, tasks, ResourceGraph::new()).unwrap();

    let switches: Vec<(PolicyKind, PolicyKind, u64)> = report
        .events
        .iter()
        .filter_map(|e| match e {
            SimEvent::PolicySwitched { from, to, tick } => Some((*from, *to, *tick)),
            _ => None,
        })
        .collect();

    assert!(!switches.is_empty(), "expected a policy switch");
    let (_, to, tick) = switches[0];
    assert_eq!(to, PolicyKind::Edf);
    assert_eq!(tick, 4, "switch must land exactly on the boundary");
    assert_eq!(report.final_policy, PolicyKind::Edf);
}

#[test]
fn test_multicore_partitions_never_overlap() {
    let config = SimConfig::builder()
        .policy(PolicyKind::Srtf)
        .num_cores(2)
        .build()
        .unwrap();
    let tasks = generate(&WorkloadConfig {
        tasks: 20,
        seed: 3,
        ..WorkloadConfig::default()
    });
    let report = tempo::run(config, tasks, ResourceGraph::new()).unwrap();

    assert_eq!(report.metrics.completed, 20);
    assert_eq!(report.metrics.per_core_utilization.len(), 2);
    assert_run_invariants(&report);
}

#[test]
fn test_timeline_feed_receives_the_run() {
    let config = SimConfig::builder()
        .policy(PolicyKind::Fcfs)
        .feed_capacity(256)
        .build()
        .unwrap();
    let tasks = vec![TaskSpec::new(0, 0, 2), TaskSpec::new(1, 3, 2)];
    let mut engine = Engine::new(config, tasks, ResourceGraph::new()).unwrap();
    let feed = engine.timeline_feed();
    let report = engine.run().unwrap();

    let streamed: Vec<ExecutionInterval> = feed.try_iter().collect();
    assert_eq!(streamed, report.timeline);
}

#[test]
fn test_energy_and_temperature_are_modeled() {
    let config = SimConfig::builder().policy(PolicyKind::Fcfs).build().unwrap();
    let tasks = vec![TaskSpec::new(0, 0, 30)];
    let report = tempo::run(config, tasks, ResourceGraph::new()).unwrap();

    assert!(report.metrics.energy_joules > 0.0);
    // A fully loaded core runs hotter than ambient.
    assert!(report.metrics.avg_temperature_celsius > PowerConfig::default().ambient_celsius);
    assert_eq!(report.metrics.cpu_utilization, 1.0);
}

#[test]
fn test_heavy_workload_under_every_policy() {
    let tasks = generate(&WorkloadConfig {
        tasks: 100,
        seed: 42,
        arrival_span: 80,
        ..WorkloadConfig::default()
    });

    for policy in [
        PolicyKind::Fcfs,
        PolicyKind::Sjf,
        PolicyKind::Srtf,
        PolicyKind::Edf,
        PolicyKind::RoundRobin,
        PolicyKind::Priority { preemptive: true },
        PolicyKind::Rms,
        PolicyKind::Llf,
        PolicyKind::Hybrid,
    ] {
        let config = SimConfig::builder()
            .policy(policy)
            .quantum(4)
            .num_cores(2)
            .build()
            .unwrap();
        let report = tempo::run(config, tasks.clone(), ResourceGraph::new()).unwrap();
        assert_eq!(report.metrics.completed, 100, "policy {policy}");
        assert_run_invariants(&report);
    }
}
