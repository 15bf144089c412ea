//! TEMPO - Tick-driven Execution Modeling and Policy Orchestration
//!
//! A deterministic CPU-scheduling simulation library: given a set of task
//! descriptors, it computes an execution timeline under a selectable policy
//! and derives the run's performance metrics.
//!
//! # Quick Start
//!
//! ```
//! use tempo::prelude::*;
//!
//! let config = SimConfig::builder()
//!     .policy(PolicyKind::Edf)
//!     .build()
//!     .unwrap();
//!
//! let tasks = vec![
//!     TaskSpec::new(0, 0, 3).with_deadline(5),
//!     TaskSpec::new(1, 1, 2).with_deadline(3),
//! ];
//!
//! let report = tempo::run(config, tasks, ResourceGraph::new()).unwrap();
//! assert_eq!(report.metrics.missed_deadlines, 0);
//! ```
//!
//! # Features
//!
//! - **Nine policies**: FCFS, SJF, SRTF, EDF, RR, Priority, RMS, LLF, and
//!   an adaptive hybrid driven by an injectable rule table
//! - **Deterministic replay**: identical inputs reproduce identical
//!   timelines, metrics, and events
//! - **Deadlock recovery**: wait-for cycle detection with automatic
//!   victim preemption
//! - **Metrics**: waiting/turnaround/response times, utilization,
//!   throughput, deadline misses, and an energy estimate from a simulated
//!   frequency/temperature model
//! - **Live consumers**: a bounded drop-oldest timeline feed and a
//!   pollable status handle that never stall the simulation

#![warn(missing_debug_implementations)]

pub mod config;
pub mod deadlock;
pub mod engine;
pub mod error;
pub mod events;
pub mod feed;
pub mod metrics;
pub mod policy;
pub mod power;
pub mod prelude;
pub mod report;
pub mod resource;
pub mod task;
pub mod workload;

pub use config::{SimConfig, SimConfigBuilder};
pub use engine::{run, Engine};
pub use error::{Error, Result};
pub use policy::PolicyKind;
pub use report::SimReport;
