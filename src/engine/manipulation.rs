//! Manipulation Assessment
//!
//! Scores signal configurations that tend to appear around manufactured price
//! action rather than organic moves.
//!
//! Detection heuristics (additive):
//! 1. Near-even split: many directional signals cancelling each other out
//! 2. Horizon conflict: short-term signals unanimously against long-term ones
//! 3. Strong reversal: a reversal detector firing hard against the move
//! 4. Volume extremes: climactic or absent participation
//! 5. OTC loading: synthetic venues get a fixed surcharge once anything fires

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{Action, ManipulationAssessment, RiskRecommendation, RiskTier};
use crate::context::MarketContext;
use crate::error::{Error, Result};
use crate::signal::{Direction, Signal, SignalCategory, TimeframeClass};

/// Configuration for manipulation assessment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManipulationConfig {
    /// Balance ratio below which a split counts as near-even
    #[serde(default = "default_balance_threshold")]
    pub balance_threshold: f64,

    /// Minimum directional signals for the split rule
    #[serde(default = "default_min_split_signals")]
    pub min_split_signals: usize,

    #[serde(default = "default_split_points")]
    pub split_points: f64,

    #[serde(default = "default_horizon_conflict_points")]
    pub horizon_conflict_points: f64,

    /// Extra points when both sides of a horizon conflict are strong
    #[serde(default = "default_horizon_conviction_points")]
    pub horizon_conviction_points: f64,

    #[serde(default = "default_horizon_conviction_strength")]
    pub horizon_conviction_strength: f64,

    /// Reversal strength above which the reversal rule fires
    #[serde(default = "default_reversal_threshold")]
    pub reversal_threshold: f64,

    #[serde(default = "default_reversal_points")]
    pub reversal_points: f64,

    /// Excess over the threshold that earns the full reversal points
    #[serde(default = "default_reversal_full_excess")]
    pub reversal_full_excess: f64,

    #[serde(default = "default_volume_high_strength")]
    pub volume_high_strength: f64,

    #[serde(default = "default_volume_high_points")]
    pub volume_high_points: f64,

    #[serde(default = "default_volume_low_strength")]
    pub volume_low_strength: f64,

    #[serde(default = "default_volume_low_points")]
    pub volume_low_points: f64,

    /// Mean strength both sides of a split need for the conviction rule
    #[serde(default = "default_opposing_conviction_strength")]
    pub opposing_conviction_strength: f64,

    #[serde(default = "default_opposing_conviction_points")]
    pub opposing_conviction_points: f64,

    /// Reversal strength that counts as a trap on OTC venues
    #[serde(default = "default_otc_trap_strength")]
    pub otc_trap_strength: f64,

    #[serde(default = "default_otc_trap_points")]
    pub otc_trap_points: f64,

    /// Fixed OTC surcharge, within [10, 20]
    #[serde(default = "default_otc_loading")]
    pub otc_loading: f64,

    #[serde(default = "default_abort_score")]
    pub abort_score: f64,

    #[serde(default = "default_caution_score")]
    pub caution_score: f64,
}

fn default_balance_threshold() -> f64 {
    0.25
}
fn default_min_split_signals() -> usize {
    4
}
fn default_split_points() -> f64 {
    25.0
}
fn default_horizon_conflict_points() -> f64 {
    20.0
}
fn default_horizon_conviction_points() -> f64 {
    10.0
}
fn default_horizon_conviction_strength() -> f64 {
    70.0
}
fn default_reversal_threshold() -> f64 {
    65.0
}
fn default_reversal_points() -> f64 {
    25.0
}
fn default_reversal_full_excess() -> f64 {
    25.0
}
fn default_volume_high_strength() -> f64 {
    80.0
}
fn default_volume_high_points() -> f64 {
    15.0
}
fn default_volume_low_strength() -> f64 {
    25.0
}
fn default_volume_low_points() -> f64 {
    10.0
}
fn default_opposing_conviction_strength() -> f64 {
    80.0
}
fn default_opposing_conviction_points() -> f64 {
    10.0
}
fn default_otc_trap_strength() -> f64 {
    80.0
}
fn default_otc_trap_points() -> f64 {
    15.0
}
fn default_otc_loading() -> f64 {
    20.0
}
fn default_abort_score() -> f64 {
    70.0
}
fn default_caution_score() -> f64 {
    40.0
}

impl Default for ManipulationConfig {
    fn default() -> Self {
        Self {
            balance_threshold: default_balance_threshold(),
            min_split_signals: default_min_split_signals(),
            split_points: default_split_points(),
            horizon_conflict_points: default_horizon_conflict_points(),
            horizon_conviction_points: default_horizon_conviction_points(),
            horizon_conviction_strength: default_horizon_conviction_strength(),
            reversal_threshold: default_reversal_threshold(),
            reversal_points: default_reversal_points(),
            reversal_full_excess: default_reversal_full_excess(),
            volume_high_strength: default_volume_high_strength(),
            volume_high_points: default_volume_high_points(),
            volume_low_strength: default_volume_low_strength(),
            volume_low_points: default_volume_low_points(),
            opposing_conviction_strength: default_opposing_conviction_strength(),
            opposing_conviction_points: default_opposing_conviction_points(),
            otc_trap_strength: default_otc_trap_strength(),
            otc_trap_points: default_otc_trap_points(),
            otc_loading: default_otc_loading(),
            abort_score: default_abort_score(),
            caution_score: default_caution_score(),
        }
    }
}

impl ManipulationConfig {
    pub fn validate(&self) -> Result<()> {
        if !(10.0..=20.0).contains(&self.otc_loading) {
            return Err(Error::Config(format!(
                "manipulation.otc_loading must be within [10, 20], got {}",
                self.otc_loading
            )));
        }
        if !(self.balance_threshold > 0.0 && self.balance_threshold <= 1.0) {
            return Err(Error::Config(
                "manipulation.balance_threshold must be within (0, 1]".into(),
            ));
        }
        if self.reversal_full_excess <= 0.0 {
            return Err(Error::Config(
                "manipulation.reversal_full_excess must be positive".into(),
            ));
        }
        if self.caution_score > self.abort_score {
            return Err(Error::Config(
                "manipulation.caution_score must not exceed abort_score".into(),
            ));
        }
        let points = [
            self.split_points,
            self.horizon_conflict_points,
            self.horizon_conviction_points,
            self.reversal_points,
            self.volume_high_points,
            self.volume_low_points,
            self.opposing_conviction_points,
            self.otc_trap_points,
        ];
        if points.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(Error::Config(
                "manipulation rule points must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// A triggered heuristic
#[derive(Debug, Clone, PartialEq)]
struct Finding {
    points: f64,
    reason: String,
}

impl Finding {
    fn new(points: f64, reason: String) -> Self {
        Self { points, reason }
    }
}

fn mean_strength<'a>(signals: impl Iterator<Item = &'a Signal>) -> Option<f64> {
    let (sum, count) = signals.fold((0.0, 0usize), |(sum, count), s| (sum + s.strength, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Manipulation assessor
#[derive(Debug, Clone)]
pub struct ManipulationAssessor {
    config: ManipulationConfig,
}

impl ManipulationAssessor {
    pub fn new(config: ManipulationConfig) -> Self {
        Self { config }
    }

    /// Assess signals for a candidate action
    pub fn assess(
        &self,
        signals: &[Signal],
        context: &MarketContext,
        candidate: Action,
    ) -> ManipulationAssessment {
        let mut findings = Vec::new();

        let split = self.check_even_split(signals);
        let split_triggered = split.is_some();
        findings.extend(split);
        findings.extend(self.check_horizon_conflict(signals));
        findings.extend(self.check_reversal(signals));
        findings.extend(self.check_volume(signals));
        if split_triggered {
            findings.extend(self.check_opposing_conviction(signals));
        }

        if context.market_type.is_otc() {
            findings.extend(self.check_otc_trap(signals));
            if !findings.is_empty() {
                findings.push(Finding::new(
                    self.config.otc_loading,
                    "OTC market loading".to_string(),
                ));
            }
        }

        let score = findings.iter().map(|f| f.points).sum::<f64>().clamp(0.0, 100.0);
        let recommendation = self.recommend(score, candidate);

        debug!(
            score,
            findings = findings.len(),
            candidate = %candidate,
            recommendation = %recommendation,
            "Manipulation assessed"
        );

        ManipulationAssessment {
            score,
            suspicious_factors: findings.into_iter().map(|f| f.reason).collect(),
            risk_tier: RiskTier::from_score(score),
            recommendation,
        }
    }

    /// Recommendation for a score and candidate action; WAIT is never aborted
    pub fn recommend(&self, score: f64, candidate: Action) -> RiskRecommendation {
        if score >= self.config.abort_score && !candidate.is_wait() {
            RiskRecommendation::Abort
        } else if score >= self.config.caution_score {
            RiskRecommendation::Caution
        } else {
            RiskRecommendation::Proceed
        }
    }

    /// Near-even split between up and down signals
    fn check_even_split(&self, signals: &[Signal]) -> Option<Finding> {
        let up = signals.iter().filter(|s| s.direction == Direction::Up).count();
        let down = signals.iter().filter(|s| s.direction == Direction::Down).count();
        let directional = up + down;

        if directional < self.config.min_split_signals {
            return None;
        }

        let ratio = up.abs_diff(down) as f64 / directional as f64;
        if ratio >= self.config.balance_threshold {
            return None;
        }

        let points = self.config.split_points * (1.0 - ratio / self.config.balance_threshold);
        Some(Finding::new(
            points,
            format!("near-even directional split ({} up / {} down)", up, down),
        ))
    }

    /// Short-horizon signals unanimously opposing long-horizon signals
    fn check_horizon_conflict(&self, signals: &[Signal]) -> Option<Finding> {
        let group = |class: TimeframeClass| -> Vec<&Signal> {
            signals
                .iter()
                .filter(|s| s.timeframe_class == class && s.is_directional())
                .collect()
        };
        let short = group(TimeframeClass::Short);
        let long = group(TimeframeClass::Long);

        let short_dir = unanimous(&short)?;
        let long_dir = unanimous(&long)?;
        if short_dir != long_dir.opposite() {
            return None;
        }

        let mut points = self.config.horizon_conflict_points;
        let strong = |group: &[&Signal]| {
            mean_strength(group.iter().copied())
                .is_some_and(|m| m > self.config.horizon_conviction_strength)
        };
        if strong(&short[..]) && strong(&long[..]) {
            points += self.config.horizon_conviction_points;
        }

        Some(Finding::new(
            points,
            format!(
                "short-term signals ({}) oppose long-term signals ({})",
                short_dir, long_dir
            ),
        ))
    }

    /// Strongest reversal-type signal above the threshold
    fn check_reversal(&self, signals: &[Signal]) -> Option<Finding> {
        let strongest = strongest_reversal(signals)?;
        if strongest <= self.config.reversal_threshold {
            return None;
        }

        let excess = strongest - self.config.reversal_threshold;
        let points = self.config.reversal_points * (excess / self.config.reversal_full_excess).min(1.0);
        Some(Finding::new(
            points,
            format!("strong reversal signal (strength {:.0})", strongest),
        ))
    }

    /// Climactic or absent volume
    fn check_volume(&self, signals: &[Signal]) -> Option<Finding> {
        let mean = mean_strength(
            signals
                .iter()
                .filter(|s| s.category() == SignalCategory::Volume),
        )?;

        if mean > self.config.volume_high_strength {
            Some(Finding::new(
                self.config.volume_high_points,
                format!("climactic volume (strength {:.0})", mean),
            ))
        } else if mean < self.config.volume_low_strength {
            Some(Finding::new(
                self.config.volume_low_points,
                format!("weak volume participation (strength {:.0})", mean),
            ))
        } else {
            None
        }
    }

    /// Both sides of a split pushing hard at once
    fn check_opposing_conviction(&self, signals: &[Signal]) -> Option<Finding> {
        let side = |dir: Direction| mean_strength(signals.iter().filter(move |s| s.direction == dir));
        let up = side(Direction::Up)?;
        let down = side(Direction::Down)?;
        let threshold = self.config.opposing_conviction_strength;

        (up >= threshold && down >= threshold).then(|| {
            Finding::new(
                self.config.opposing_conviction_points,
                "high-conviction signals on both sides".to_string(),
            )
        })
    }

    /// Hard reversal on a synthetic venue
    fn check_otc_trap(&self, signals: &[Signal]) -> Option<Finding> {
        let strongest = strongest_reversal(signals)?;
        (strongest > self.config.otc_trap_strength).then(|| {
            Finding::new(
                self.config.otc_trap_points,
                "OTC reversal trap".to_string(),
            )
        })
    }
}

impl Default for ManipulationAssessor {
    fn default() -> Self {
        Self::new(ManipulationConfig::default())
    }
}

/// Direction shared by every signal of a non-empty group
fn unanimous(group: &[&Signal]) -> Option<Direction> {
    let first = group.first()?.direction;
    group.iter().all(|s| s.direction == first).then_some(first)
}

fn strongest_reversal(signals: &[Signal]) -> Option<f64> {
    signals
        .iter()
        .filter(|s| s.category() == SignalCategory::Reversal)
        .map(|s| s.strength)
        .fold(None, |best: Option<f64>, s| Some(best.map_or(s, |b| b.max(s))))
}
