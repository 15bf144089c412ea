use crate::error::{Error, Result};
use crate::policy::adaptive::{default_rules, AdaptiveRule};
use crate::policy::PolicyKind;
use crate::power::PowerConfig;

/// Simulation parameters. Validated before any tick executes.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub policy: PolicyKind,
    pub num_cores: usize,
    /// Round-robin time slice; required (and only meaningful) for `RoundRobin`.
    pub quantum: Option<u64>,
    /// Safety ceiling: a run still alive after this many ticks is reported
    /// as divergent.
    pub max_ticks: u64,
    /// Hybrid mode: ticks between rule-table evaluations.
    pub decision_window: u64,
    /// Hybrid mode: ordered rule table, first match wins.
    pub rules: Vec<AdaptiveRule>,
    /// Hybrid mode: policy used when no rule matches.
    pub fallback: PolicyKind,
    /// Periodic tasks release jobs up to this simulated time.
    pub periodic_horizon: u64,
    pub power: PowerConfig,
    /// Capacity of the live timeline feed.
    pub feed_capacity: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::Fcfs,
            num_cores: 1,
            quantum: None,
            max_ticks: 100_000,
            decision_window: 20,
            rules: default_rules(),
            fallback: PolicyKind::Priority { preemptive: true },
            periodic_horizon: 1_000,
            power: PowerConfig::default(),
            feed_capacity: 1_024,
        }
    }
}

impl SimConfig {
    pub fn builder() -> SimConfigBuilder {
        SimConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_cores == 0 {
            return Err(Error::config("num_cores must be > 0"));
        }
        if self.max_ticks == 0 {
            return Err(Error::config("max_ticks must be > 0"));
        }
        match (self.policy, self.quantum) {
            (PolicyKind::RoundRobin, None) => {
                return Err(Error::config("round robin requires a quantum"));
            }
            (_, Some(0)) => {
                return Err(Error::config("quantum must be > 0"));
            }
            _ => {}
        }
        if self.policy == PolicyKind::Hybrid {
            if self.decision_window == 0 {
                return Err(Error::config("decision_window must be > 0"));
            }
            if self.rules.is_empty() {
                return Err(Error::config("hybrid mode requires a rule table"));
            }
            let targets_rr = self.fallback == PolicyKind::RoundRobin
                || self.rules.iter().any(|r| r.then == PolicyKind::RoundRobin);
            if targets_rr && self.quantum.is_none() {
                return Err(Error::config(
                    "a rule targeting round robin requires a quantum",
                ));
            }
        }
        self.power.validate()?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SimConfigBuilder {
    config: SimConfig,
}

impl SimConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SimConfig::default(),
        }
    }

    pub fn policy(mut self, policy: PolicyKind) -> Self {
        self.config.policy = policy;
        self
    }

    pub fn num_cores(mut self, cores: usize) -> Self {
        self.config.num_cores = cores;
        self
    }

    pub fn quantum(mut self, quantum: u64) -> Self {
        self.config.quantum = Some(quantum);
        self
    }

    pub fn max_ticks(mut self, ticks: u64) -> Self {
        self.config.max_ticks = ticks;
        self
    }

    pub fn decision_window(mut self, window: u64) -> Self {
        self.config.decision_window = window;
        self
    }

    pub fn rules(mut self, rules: Vec<AdaptiveRule>) -> Self {
        self.config.rules = rules;
        self
    }

    pub fn fallback(mut self, fallback: PolicyKind) -> Self {
        self.config.fallback = fallback;
        self
    }

    pub fn periodic_horizon(mut self, horizon: u64) -> Self {
        self.config.periodic_horizon = horizon;
        self
    }

    pub fn power(mut self, power: PowerConfig) -> Self {
        self.config.power = power;
        self
    }

    pub fn feed_capacity(mut self, capacity: usize) -> Self {
        self.config.feed_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<SimConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
