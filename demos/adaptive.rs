//! Hybrid mode under a deadline-heavy load spike: watch the controller
//! switch policies at decision-window boundaries.

use tempo::prelude::*;

fn main() -> Result<()> {
    let config = SimConfig::builder()
        .policy(PolicyKind::Hybrid)
        .decision_window(10)
        .build()?;

    // A background mix plus a burst of tight-deadline arrivals.
    let mut tasks = generate(&WorkloadConfig {
        tasks: 15,
        seed: 21,
        arrival_span: 30,
        deadline_probability: 0.0,
        ..WorkloadConfig::default()
    });
    let base = tasks.len() as u32;
    for i in 0..6 {
        let arrival = 5 + u64::from(i);
        tasks.push(
            TaskSpec::new(base + i, arrival, 3)
                .named(format!("spike{i}"))
                .with_deadline(arrival + 2),
        );
    }

    let report = tempo::run(config, tasks, ResourceGraph::new())?;

    for event in &report.events {
        if let SimEvent::PolicySwitched { from, to, tick } = event {
            println!("tick {tick:>4}: {from} -> {to}");
        }
    }
    println!("final policy: {}", report.final_policy);
    println!(
        "completed {}/{} with {} misses",
        report.metrics.completed, report.metrics.total_releases, report.metrics.missed_deadlines
    );
    Ok(())
}
