//! Run a small task set under EDF and print the timeline and metrics.

use tempo::prelude::*;

fn main() -> Result<()> {
    let config = SimConfig::builder().policy(PolicyKind::Edf).build()?;

    let tasks = vec![
        TaskSpec::new(0, 0, 3).named("render").with_deadline(5),
        TaskSpec::new(1, 1, 2).named("audio").with_deadline(3),
        TaskSpec::new(2, 2, 4).named("network").with_deadline(12),
    ];

    let report = tempo::run(config, tasks, ResourceGraph::new())?;

    println!("timeline:");
    for interval in &report.timeline {
        match interval.task {
            Some(task) => println!(
                "  core {} | {:>3}..{:<3} | {} ({:?})",
                interval.core, interval.start, interval.end, task, interval.kind
            ),
            None => println!(
                "  core {} | {:>3}..{:<3} | idle",
                interval.core, interval.start, interval.end
            ),
        }
    }

    let m = &report.metrics;
    println!("\nutilization: {:.1}%", m.cpu_utilization * 100.0);
    println!("avg waiting: {:.2} ticks", m.avg_waiting);
    println!("missed deadlines: {}", m.missed_deadlines);
    println!("energy: {:.1} J", m.energy_joules);
    Ok(())
}
