//! Adaptive bias correction
//!
//! A run of same-direction decisions is more often a detector or regime artifact
//! than a genuine edge. Once a streak reaches the threshold, the streak side's
//! score is dampened and the opposite side boosted, growing linearly up to a cap.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::aggregator::AggregateScores;
use super::perturbation::PerturbationPolicy;
use super::types::Action;
use crate::context::MarketType;
use crate::error::{Error, Result};
use crate::signal::Direction;

/// Bias correction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasConfig {
    /// Streak length at which correction starts
    #[serde(default = "default_streak_threshold")]
    pub streak_threshold: u32,

    /// Streak length at which correction reaches its maximum
    #[serde(default = "default_streak_cap")]
    pub streak_cap: u32,

    /// Maximum reduction of the streak side (factor floor is `1 - max_dampening`)
    #[serde(default = "default_max_dampening")]
    pub max_dampening: f64,

    /// Maximum increase of the opposite side
    #[serde(default = "default_max_boost")]
    pub max_boost: f64,

    /// Boost the opposite side as well as dampening the streak side
    #[serde(default = "default_boost_enabled")]
    pub boost_enabled: bool,
}

fn default_streak_threshold() -> u32 {
    3
}

fn default_streak_cap() -> u32 {
    7
}

fn default_max_dampening() -> f64 {
    0.5
}

fn default_max_boost() -> f64 {
    0.5
}

fn default_boost_enabled() -> bool {
    true
}

impl Default for BiasConfig {
    fn default() -> Self {
        Self {
            streak_threshold: default_streak_threshold(),
            streak_cap: default_streak_cap(),
            max_dampening: default_max_dampening(),
            max_boost: default_max_boost(),
            boost_enabled: default_boost_enabled(),
        }
    }
}

impl BiasConfig {
    pub fn validate(&self) -> Result<()> {
        if self.streak_threshold == 0 {
            return Err(Error::Config("bias.streak_threshold must be at least 1".into()));
        }
        if self.streak_cap < self.streak_threshold {
            return Err(Error::Config(format!(
                "bias.streak_cap ({}) must not be below streak_threshold ({})",
                self.streak_cap, self.streak_threshold
            )));
        }
        if !(0.0..=0.5).contains(&self.max_dampening) {
            return Err(Error::Config("bias.max_dampening must be within [0, 0.5]".into()));
        }
        if !(0.0..=0.5).contains(&self.max_boost) {
            return Err(Error::Config("bias.max_boost must be within [0, 0.5]".into()));
        }
        Ok(())
    }
}

/// Consecutive decision counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionCounters {
    pub up: u32,
    pub down: u32,
    pub neutral: u32,
}

/// Per-session decision history
///
/// At most one counter is non-zero. Owned by the calling session and replaced
/// once per completed decision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiasState {
    #[serde(default)]
    pub consecutive_by_direction: DirectionCounters,
    /// Market type of the last recorded decision
    #[serde(default)]
    pub market_type: Option<MarketType>,
    /// Completed evaluations, used as the perturbation index
    #[serde(default)]
    pub evaluations: u64,
}

impl BiasState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current streak direction and length
    ///
    /// Ties between counters (only possible in a hand-built state) resolve to the
    /// first of up, down, neutral.
    pub fn streak(&self) -> (Direction, u32) {
        let c = &self.consecutive_by_direction;
        [
            (Direction::Up, c.up),
            (Direction::Down, c.down),
            (Direction::Neutral, c.neutral),
        ]
        .into_iter()
        .fold((Direction::Neutral, 0), |best, (dir, count)| {
            if count > best.1 {
                (dir, count)
            } else {
                best
            }
        })
    }

    pub fn count(&self, direction: Direction) -> u32 {
        match direction {
            Direction::Up => self.consecutive_by_direction.up,
            Direction::Down => self.consecutive_by_direction.down,
            Direction::Neutral => self.consecutive_by_direction.neutral,
        }
    }

    /// State as seen by an evaluation on `market_type`
    ///
    /// The streak resets when the market type differs from the last decision's.
    /// The evaluation index survives the reset.
    pub fn for_market(&self, market_type: MarketType) -> BiasState {
        let (view, changed) = self.rebased(market_type);
        if changed {
            warn!(
                previous = ?self.market_type,
                current = %market_type,
                "Market type changed, resetting bias streak"
            );
        }
        view
    }

    fn rebased(&self, market_type: MarketType) -> (BiasState, bool) {
        match self.market_type {
            Some(previous) if previous != market_type => (
                BiasState {
                    consecutive_by_direction: DirectionCounters::default(),
                    market_type: Some(market_type),
                    evaluations: self.evaluations,
                },
                true,
            ),
            _ => (self.clone(), false),
        }
    }

    /// Record a completed decision: increment the matching counter, zero the rest
    ///
    /// A market type change resets the streak here too, without logging again.
    pub fn record(&self, action: Action, market_type: MarketType) -> BiasState {
        let (base, _) = self.rebased(market_type);
        let mut counters = DirectionCounters::default();
        match action.direction() {
            Direction::Up => counters.up = base.consecutive_by_direction.up.saturating_add(1),
            Direction::Down => {
                counters.down = base.consecutive_by_direction.down.saturating_add(1)
            }
            Direction::Neutral => {
                counters.neutral = base.consecutive_by_direction.neutral.saturating_add(1)
            }
        }

        BiasState {
            consecutive_by_direction: counters,
            market_type: Some(market_type),
            evaluations: base.evaluations.saturating_add(1),
        }
    }
}

/// Correction applied to one evaluation's scores
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BiasCorrection {
    pub streak_direction: Direction,
    pub streak: u32,
    /// Multiplier on the streak side, in [0.5, 1.0]
    pub dampening: f64,
    /// Multiplier on the opposite side, in [1.0, 1.5]
    pub boost: f64,
}

impl BiasCorrection {
    pub fn identity() -> Self {
        Self {
            streak_direction: Direction::Neutral,
            streak: 0,
            dampening: 1.0,
            boost: 1.0,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.dampening == 1.0 && self.boost == 1.0
    }

    /// Apply to aggregate scores
    pub fn apply(&self, scores: &AggregateScores) -> AggregateScores {
        match self.streak_direction {
            Direction::Up => scores.scaled(self.dampening, self.boost),
            Direction::Down => scores.scaled(self.boost, self.dampening),
            Direction::Neutral => scores.clone(),
        }
    }
}

/// The adaptive bias corrector
#[derive(Debug, Clone)]
pub struct AdaptiveBiasCorrector {
    config: BiasConfig,
}

impl AdaptiveBiasCorrector {
    pub fn new(config: BiasConfig) -> Self {
        Self { config }
    }

    /// Correction strength in [0, 1] for a streak length
    fn strength(&self, streak: u32) -> f64 {
        if streak < self.config.streak_threshold {
            return 0.0;
        }
        let start = self.config.streak_threshold - 1;
        let span = (self.config.streak_cap - start) as f64;
        let capped = streak.min(self.config.streak_cap);
        ((capped - start) as f64 / span).clamp(0.0, 1.0)
    }

    /// Compute the correction for a bias state
    ///
    /// Deterministic in the streak; the only variation comes from `perturbation`,
    /// indexed by the state's evaluation count.
    pub fn correction(&self, state: &BiasState, perturbation: &PerturbationPolicy) -> BiasCorrection {
        let (direction, streak) = state.streak();

        if !direction.is_directional() || streak < self.config.streak_threshold {
            return BiasCorrection {
                streak_direction: direction,
                streak,
                ..BiasCorrection::identity()
            };
        }

        let k = self.strength(streak);
        let floor = 1.0 - self.config.max_dampening;
        let dampening = ((1.0 - self.config.max_dampening * k)
            * perturbation.factor(state.evaluations))
        .clamp(floor, 1.0);
        let boost = if self.config.boost_enabled {
            1.0 + self.config.max_boost * k
        } else {
            1.0
        };

        debug!(
            direction = %direction,
            streak,
            dampening,
            boost,
            "Bias correction active"
        );

        BiasCorrection {
            streak_direction: direction,
            streak,
            dampening,
            boost,
        }
    }
}

impl Default for AdaptiveBiasCorrector {
    fn default() -> Self {
        Self::new(BiasConfig::default())
    }
}
