//! Adaptive policy controller for hybrid mode.
//!
//! Every decision window the controller folds the window's observations
//! into a [`WindowStats`] snapshot and maps it through an ordered rule
//! table. Selection is a pure function of the snapshot, so a replayed run
//! switches policies at exactly the same ticks.

use super::PolicyKind;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

const LOAD_EWMA_ALPHA: f64 = 0.3;

/// Rolling observations for one decision window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    /// Ready-queue length at the window boundary.
    pub ready_len: usize,
    /// Deadline misses recorded in the window per completed job; misses with
    /// no completions count against a denominator of one.
    pub miss_rate: f64,
    /// Preemptions per tick over the window.
    pub preemption_rate: f64,
    /// Coefficient of variation of the ready tasks' remaining bursts.
    /// High values mean a mix of short and long work.
    pub burst_cv: f64,
    /// Exponentially weighted core occupancy, 0..=1.
    pub load: f64,
}

/// One row of the rule table: all present bounds must hold for the rule to
/// fire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleCondition {
    pub min_miss_rate: Option<f64>,
    pub min_ready_len: Option<usize>,
    pub min_burst_cv: Option<f64>,
    pub min_preemption_rate: Option<f64>,
    pub min_load: Option<f64>,
}

impl RuleCondition {
    pub fn matches(&self, stats: &WindowStats) -> bool {
        self.min_miss_rate.map_or(true, |t| stats.miss_rate >= t)
            && self.min_ready_len.map_or(true, |t| stats.ready_len >= t)
            && self.min_burst_cv.map_or(true, |t| stats.burst_cv >= t)
            && self
                .min_preemption_rate
                .map_or(true, |t| stats.preemption_rate >= t)
            && self.min_load.map_or(true, |t| stats.load >= t)
    }
}

/// `when` the condition holds, run `then`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveRule {
    pub when: RuleCondition,
    pub then: PolicyKind,
}

impl AdaptiveRule {
    pub fn new(when: RuleCondition, then: PolicyKind) -> Self {
        Self { when, then }
    }
}

/// Default rule table: deadline pressure flips to EDF, a long mixed-size
/// ready queue flips to SRTF, anything else falls back to preemptive
/// priority scheduling.
pub fn default_rules() -> Vec<AdaptiveRule> {
    vec![
        AdaptiveRule::new(
            RuleCondition {
                min_miss_rate: Some(0.25),
                ..RuleCondition::default()
            },
            PolicyKind::Edf,
        ),
        AdaptiveRule::new(
            RuleCondition {
                min_ready_len: Some(5),
                min_burst_cv: Some(0.5),
                ..RuleCondition::default()
            },
            PolicyKind::Srtf,
        ),
    ]
}

/// Evaluates the rule table at decision-window boundaries and tracks the
/// active base policy between them.
#[derive(Debug, Clone)]
pub struct AdaptiveController {
    rules: Vec<AdaptiveRule>,
    fallback: PolicyKind,
    active: PolicyKind,
    load_ewma: f64,
    window_misses: u32,
    window_completions: u32,
    window_preemptions: u32,
}

impl AdaptiveController {
    pub fn new(rules: Vec<AdaptiveRule>, fallback: PolicyKind) -> Result<Self> {
        if rules.is_empty() {
            return Err(Error::config("adaptive rule table is empty"));
        }
        for rule in &rules {
            if rule.then == PolicyKind::Hybrid {
                return Err(Error::config("adaptive rule cannot target hybrid"));
            }
        }
        if fallback == PolicyKind::Hybrid {
            return Err(Error::config("adaptive fallback cannot be hybrid"));
        }
        Ok(Self {
            rules,
            fallback,
            active: fallback,
            load_ewma: 0.0,
            window_misses: 0,
            window_completions: 0,
            window_preemptions: 0,
        })
    }

    /// The base policy currently in force.
    pub fn active(&self) -> PolicyKind {
        self.active
    }

    /// Per-tick observation: fraction of cores that were busy.
    pub fn observe_load(&mut self, busy_fraction: f64) {
        self.load_ewma = LOAD_EWMA_ALPHA * busy_fraction + (1.0 - LOAD_EWMA_ALPHA) * self.load_ewma;
    }

    pub fn record_miss(&mut self) {
        self.window_misses += 1;
    }

    pub fn record_completion(&mut self) {
        self.window_completions += 1;
    }

    pub fn record_preemption(&mut self) {
        self.window_preemptions += 1;
    }

    /// Fold the window's counters into a snapshot and reset them.
    pub fn window_stats(&mut self, window_len: u64, ready_len: usize, burst_cv: f64) -> WindowStats {
        let denominator = self.window_completions.max(1) as f64;
        let stats = WindowStats {
            ready_len,
            miss_rate: f64::from(self.window_misses) / denominator,
            preemption_rate: f64::from(self.window_preemptions) / window_len.max(1) as f64,
            burst_cv,
            load: self.load_ewma,
        };
        self.window_misses = 0;
        self.window_completions = 0;
        self.window_preemptions = 0;
        stats
    }

    /// Pure rule evaluation: the first matching rule's policy, else the
    /// fallback.
    pub fn evaluate(rules: &[AdaptiveRule], fallback: PolicyKind, stats: &WindowStats) -> PolicyKind {
        rules
            .iter()
            .find(|rule| rule.when.matches(stats))
            .map_or(fallback, |rule| rule.then)
    }

    /// Apply the rule table at a window boundary. Returns `Some((from, to))`
    /// when the active policy changes.
    pub fn reevaluate(&mut self, stats: &WindowStats) -> Option<(PolicyKind, PolicyKind)> {
        let next = Self::evaluate(&self.rules, self.fallback, stats);
        if next != self.active {
            let previous = self.active;
            self.active = next;
            Some((previous, next))
        } else {
            None
        }
    }
}

/// Coefficient of variation of a sample; zero for empty or zero-mean input.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = values
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt() / mean
}
