//! Core status model: simulated frequency, temperature, and power draw.
//!
//! Each core's frequency tracks its utilization over a sliding window of
//! recent ticks; temperature rises at a fixed rate while busy and decays
//! toward ambient while idle. The model is purely derived from the busy/idle
//! sequence fed to it, so replaying a timeline reproduces it exactly.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Tunable constants of the frequency/temperature/power response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerConfig {
    pub ambient_celsius: f64,
    pub max_celsius: f64,
    /// Degrees gained per busy tick.
    pub heat_per_tick: f64,
    /// Degrees shed per idle tick.
    pub cool_per_tick: f64,
    pub idle_watts: f64,
    pub busy_base_watts: f64,
    pub watts_per_ghz: f64,
    pub min_ghz: f64,
    pub max_ghz: f64,
    /// Sliding-window length, in ticks, for the utilization estimate.
    pub window: usize,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            ambient_celsius: 20.0,
            max_celsius: 100.0,
            heat_per_tick: 5.0,
            cool_per_tick: 2.0,
            idle_watts: 2.0,
            busy_base_watts: 5.0,
            watts_per_ghz: 10.0,
            min_ghz: 1.0,
            max_ghz: 3.0,
            window: 8,
        }
    }
}

impl PowerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(Error::config("power window must be > 0"));
        }
        if self.min_ghz <= 0.0 || self.max_ghz < self.min_ghz {
            return Err(Error::config("frequency range must satisfy 0 < min <= max"));
        }
        if self.max_celsius < self.ambient_celsius {
            return Err(Error::config("max temperature below ambient"));
        }
        Ok(())
    }
}

/// Instantaneous status of one simulated core.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoreStatus {
    pub frequency_ghz: f64,
    pub temperature_celsius: f64,
}

#[derive(Debug, Clone)]
struct CoreModel {
    window: VecDeque<bool>,
    status: CoreStatus,
}

/// Tracks per-core status from the sequence of busy/idle ticks.
#[derive(Debug, Clone)]
pub struct CoreStatusModel {
    config: PowerConfig,
    cores: Vec<CoreModel>,
}

impl CoreStatusModel {
    pub fn new(config: PowerConfig, num_cores: usize) -> Self {
        let initial = CoreStatus {
            frequency_ghz: config.min_ghz,
            temperature_celsius: config.ambient_celsius,
        };
        let cores = (0..num_cores)
            .map(|_| CoreModel {
                window: VecDeque::with_capacity(config.window),
                status: initial,
            })
            .collect();
        Self { config, cores }
    }

    /// Advance `core` by one tick and return the watts drawn over it.
    pub fn observe(&mut self, core: usize, busy: bool) -> f64 {
        let cfg = &self.config;
        let model = &mut self.cores[core];

        if model.window.len() == cfg.window {
            model.window.pop_front();
        }
        model.window.push_back(busy);

        let busy_ticks = model.window.iter().filter(|&&b| b).count();
        let utilization = busy_ticks as f64 / model.window.len() as f64;
        model.status.frequency_ghz = cfg.min_ghz + (cfg.max_ghz - cfg.min_ghz) * utilization;

        let temp = &mut model.status.temperature_celsius;
        if busy {
            *temp = (*temp + cfg.heat_per_tick).min(cfg.max_celsius);
            cfg.busy_base_watts + cfg.watts_per_ghz * model.status.frequency_ghz
        } else {
            *temp = (*temp - cfg.cool_per_tick).max(cfg.ambient_celsius);
            cfg.idle_watts
        }
    }

    pub fn status(&self, core: usize) -> CoreStatus {
        self.cores[core].status
    }

    pub fn statuses(&self) -> Vec<CoreStatus> {
        self.cores.iter().map(|c| c.status).collect()
    }

    pub fn average_temperature(&self) -> f64 {
        if self.cores.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .cores
            .iter()
            .map(|c| c.status.temperature_celsius)
            .sum();
        total / self.cores.len() as f64
    }

    pub fn num_cores(&self) -> usize {
        self.cores.len()
    }
}
