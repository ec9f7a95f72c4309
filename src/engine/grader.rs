//! Confluence grading
//!
//! Counts independent reasons for and against a candidate trade, turns them into
//! a 0-100 setup score and a letter grade. Correlated sources are grouped by
//! category so three pattern detectors agreeing still count once.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::aggregator::AggregateScores;
use super::types::{Action, Grade, ManipulationAssessment, UpstreamFactor};
use crate::context::{MarketContext, VolumeProfile};
use crate::error::{Error, Result};
use crate::signal::{Direction, Signal, TimeframeClass};

/// Minimum scores per grade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeThresholds {
    #[serde(default = "default_grade_a")]
    pub a: f64,
    #[serde(default = "default_grade_b")]
    pub b: f64,
    #[serde(default = "default_grade_c")]
    pub c: f64,
    #[serde(default = "default_grade_d")]
    pub d: f64,
}

fn default_grade_a() -> f64 {
    90.0
}
fn default_grade_b() -> f64 {
    75.0
}
fn default_grade_c() -> f64 {
    60.0
}
fn default_grade_d() -> f64 {
    45.0
}

impl Default for GradeThresholds {
    fn default() -> Self {
        Self {
            a: default_grade_a(),
            b: default_grade_b(),
            c: default_grade_c(),
            d: default_grade_d(),
        }
    }
}

impl GradeThresholds {
    pub fn grade(&self, score: f64) -> Grade {
        if score >= self.a {
            Grade::A
        } else if score >= self.b {
            Grade::B
        } else if score >= self.c {
            Grade::C
        } else if score >= self.d {
            Grade::D
        } else {
            Grade::F
        }
    }

    pub fn validate(&self) -> Result<()> {
        let ordered = [self.a, self.b, self.c, self.d];
        if ordered.iter().any(|t| !t.is_finite() || !(0.0..=100.0).contains(t)) {
            return Err(Error::Config(
                "grading.thresholds must be within [0, 100]".into(),
            ));
        }
        if ordered.windows(2).any(|w| w[0] <= w[1]) {
            return Err(Error::Config(format!(
                "grading.thresholds must be strictly descending (a={}, b={}, c={}, d={})",
                self.a, self.b, self.c, self.d
            )));
        }
        Ok(())
    }
}

/// Grading configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingConfig {
    /// Confluence count that earns the full confluence points
    #[serde(default = "default_ideal_confluence_count")]
    pub ideal_confluence_count: usize,

    #[serde(default = "default_confluence_points")]
    pub confluence_points: f64,

    #[serde(default = "default_contraindication_penalty")]
    pub contraindication_penalty: f64,

    /// Points per confidence point above (or below) 50
    #[serde(default = "default_confidence_factor")]
    pub confidence_factor: f64,

    /// 30s charts need at least this trend strength to avoid the penalty
    #[serde(default = "default_short_chart_min_trend")]
    pub short_chart_min_trend: f64,

    #[serde(default = "default_short_chart_penalty")]
    pub short_chart_penalty: f64,

    #[serde(default = "default_otc_contraindication_penalty")]
    pub otc_contraindication_penalty: f64,

    #[serde(default = "default_high_volatility")]
    pub high_volatility: f64,

    #[serde(default = "default_high_volatility_penalty")]
    pub high_volatility_penalty: f64,

    /// Confluence count that earns the bonus
    #[serde(default = "default_bonus_confluences")]
    pub bonus_confluences: usize,

    #[serde(default = "default_bonus_points")]
    pub bonus_points: f64,

    /// Trend strength that counts as a confluence
    #[serde(default = "default_strong_trend")]
    pub strong_trend: f64,

    #[serde(default)]
    pub thresholds: GradeThresholds,
}

fn default_ideal_confluence_count() -> usize {
    5
}
fn default_confluence_points() -> f64 {
    60.0
}
fn default_contraindication_penalty() -> f64 {
    12.0
}
fn default_confidence_factor() -> f64 {
    0.6
}
fn default_short_chart_min_trend() -> f64 {
    75.0
}
fn default_short_chart_penalty() -> f64 {
    20.0
}
fn default_otc_contraindication_penalty() -> f64 {
    15.0
}
fn default_high_volatility() -> f64 {
    75.0
}
fn default_high_volatility_penalty() -> f64 {
    15.0
}
fn default_bonus_confluences() -> usize {
    6
}
fn default_bonus_points() -> f64 {
    10.0
}
fn default_strong_trend() -> f64 {
    70.0
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            ideal_confluence_count: default_ideal_confluence_count(),
            confluence_points: default_confluence_points(),
            contraindication_penalty: default_contraindication_penalty(),
            confidence_factor: default_confidence_factor(),
            short_chart_min_trend: default_short_chart_min_trend(),
            short_chart_penalty: default_short_chart_penalty(),
            otc_contraindication_penalty: default_otc_contraindication_penalty(),
            high_volatility: default_high_volatility(),
            high_volatility_penalty: default_high_volatility_penalty(),
            bonus_confluences: default_bonus_confluences(),
            bonus_points: default_bonus_points(),
            strong_trend: default_strong_trend(),
            thresholds: GradeThresholds::default(),
        }
    }
}

impl GradingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ideal_confluence_count == 0 {
            return Err(Error::Config(
                "grading.ideal_confluence_count must be at least 1".into(),
            ));
        }
        self.thresholds.validate()
    }
}

/// Reasons for and against a candidate
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfluenceTally {
    pub confluences: Vec<String>,
    pub contraindications: Vec<String>,
}

impl ConfluenceTally {
    pub fn confluence_count(&self) -> usize {
        self.confluences.len()
    }

    pub fn contraindication_count(&self) -> usize {
        self.contraindications.len()
    }

    fn tally(&mut self, label: String, supports: Option<bool>) {
        match supports {
            Some(true) => self.confluences.push(label),
            Some(false) => self.contraindications.push(label),
            None => {}
        }
    }
}

/// Result of grading a setup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeReport {
    pub score: f64,
    pub grade: Grade,
    pub expected_success_rate: f64,
}

/// Outcome of the grade gate
#[derive(Debug, Clone, PartialEq)]
pub struct GateOutcome {
    pub action: Action,
    pub confidence: f64,
    pub reason: Option<String>,
}

/// Everything the grader looks at
#[derive(Debug, Clone, Copy)]
pub struct GradingInput<'a> {
    pub direction: Direction,
    pub signals: &'a [Signal],
    pub scores: &'a AggregateScores,
    pub context: &'a MarketContext,
    pub factors: &'a [UpstreamFactor],
    pub manipulation: &'a ManipulationAssessment,
}

/// The confluence grader
#[derive(Debug, Clone)]
pub struct ConfluenceGrader {
    config: GradingConfig,
}

impl ConfluenceGrader {
    pub fn new(config: GradingConfig) -> Self {
        Self { config }
    }

    /// Collect confluences and contraindications for a candidate direction
    pub fn collect(&self, input: &GradingInput<'_>) -> ConfluenceTally {
        let mut tally = ConfluenceTally::default();
        let direction = input.direction;

        if direction.is_directional() {
            for (category, cat) in &input.scores.by_category {
                let net = cat.net_direction();
                if net == direction {
                    tally.tally(format!("{} signals agree ({})", category, direction), Some(true));
                } else if net == direction.opposite() {
                    tally.tally(format!("{} signals oppose ({})", category, net), Some(false));
                }
            }

            if let Some(supports) = horizon_alignment(input.signals, direction) {
                tally.tally("multi-horizon alignment".to_string(), Some(supports));
            }
        }

        if input.context.trend_strength >= self.config.strong_trend {
            tally.tally("strong prevailing trend".to_string(), Some(true));
        }

        match input.context.volume_profile {
            VolumeProfile::High => tally.tally("high participation volume".to_string(), Some(true)),
            VolumeProfile::Low => tally.tally("thin volume".to_string(), Some(false)),
            VolumeProfile::Medium => {}
        }

        for factor in input.factors {
            tally.tally(factor.label.clone(), factor.supports(direction));
        }

        if input.manipulation.risk_tier.is_elevated() {
            tally.tally(
                format!("manipulation risk {}", input.manipulation.risk_tier),
                Some(false),
            );
        }

        tally
    }

    /// Score and grade a tally at a given confidence
    pub fn grade(
        &self,
        tally: &ConfluenceTally,
        confidence: f64,
        context: &MarketContext,
        manipulation_score: f64,
    ) -> GradeReport {
        let cfg = &self.config;
        let confluences = tally.confluence_count();
        let contraindications = tally.contraindication_count();

        let coverage = (confluences as f64 / cfg.ideal_confluence_count as f64).min(1.0);
        let mut score = cfg.confluence_points * coverage
            - cfg.contraindication_penalty * contraindications as f64
            + cfg.confidence_factor * (confidence - 50.0);

        if context.timeframe.is_thirty_seconds() && context.trend_strength < cfg.short_chart_min_trend {
            score -= cfg.short_chart_penalty;
        }
        if context.market_type.is_otc() && contraindications > 0 {
            score -= cfg.otc_contraindication_penalty;
        }
        if context.volatility > cfg.high_volatility {
            score -= cfg.high_volatility_penalty;
        }
        if confluences >= cfg.bonus_confluences {
            score += cfg.bonus_points;
        }

        let score = score.clamp(0.0, 100.0);
        let expected_success_rate = (40.0 + 0.4 * score - 0.1 * manipulation_score).clamp(0.0, 90.0);

        GradeReport {
            score,
            grade: cfg.thresholds.grade(score),
            expected_success_rate,
        }
    }

    /// Only A/B setups may trade; anything else becomes WAIT with reduced confidence
    pub fn gate(&self, grade: Grade, action: Action, confidence: f64) -> GateOutcome {
        if action.is_wait() || grade.allows_trade() {
            return GateOutcome {
                action,
                confidence,
                reason: None,
            };
        }

        GateOutcome {
            action: Action::Wait,
            confidence: (confidence - 25.0).max(25.0).min(confidence),
            reason: Some(format!(
                "grade {} setup below trading quality, waiting",
                grade
            )),
        }
    }
}

impl Default for ConfluenceGrader {
    fn default() -> Self {
        Self::new(GradingConfig::default())
    }
}

/// Whether signal horizons line up behind `direction`
///
/// `Some(true)` when at least two horizons lean with it and none against,
/// `Some(false)` when at least two lean against it and none with it.
fn horizon_alignment(signals: &[Signal], direction: Direction) -> Option<bool> {
    let mut net: BTreeMap<TimeframeClass, f64> = BTreeMap::new();
    for signal in signals {
        let sign = match signal.direction {
            Direction::Up => 1.0,
            Direction::Down => -1.0,
            Direction::Neutral => continue,
        };
        *net.entry(signal.timeframe_class).or_default() += sign * signal.confidence;
    }

    let wanted = if direction == Direction::Up { 1.0 } else { -1.0 };
    let agree = net.values().filter(|v| **v * wanted > 0.0).count();
    let oppose = net.values().filter(|v| **v * wanted < 0.0).count();

    match (agree, oppose) {
        (a, 0) if a >= 2 => Some(true),
        (0, o) if o >= 2 => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MarketType;
    use crate::engine::aggregator::WeightedAggregator;
    use crate::engine::types::{FactorStance, RiskRecommendation, RiskTier};
    use crate::signal::SignalSource;

    fn tally_of(confluences: usize, contraindications: usize) -> ConfluenceTally {
        ConfluenceTally {
            confluences: (0..confluences).map(|i| format!("c{}", i)).collect(),
            contraindications: (0..contraindications).map(|i| format!("x{}", i)).collect(),
        }
    }

    #[test]
    fn test_grade_formula() {
        let grader = ConfluenceGrader::default();
        let ctx = MarketContext::new("1m", MarketType::Regular).with_volatility(20.0);

        // 60 + 0.6 * 40 = 84
        let report = grader.grade(&tally_of(5, 0), 90.0, &ctx, 0.0);
        assert!((report.score - 84.0).abs() < 1e-9);
        assert_eq!(report.grade, Grade::B);
        assert!((report.expected_success_rate - 73.6).abs() < 1e-9);

        // 60 + 24 + 10 bonus = 94
        let report = grader.grade(&tally_of(6, 0), 90.0, &ctx, 0.0);
        assert_eq!(report.grade, Grade::A);

        // 36 - 12 + 6 = 30
        let report = grader.grade(&tally_of(3, 1), 60.0, &ctx, 0.0);
        assert!((report.score - 30.0).abs() < 1e-9);
        assert_eq!(report.grade, Grade::F);
    }

    #[test]
    fn test_context_penalties() {
        let grader = ConfluenceGrader::default();
        let base = grader.grade(&tally_of(5, 1), 90.0, &MarketContext::new("1m", MarketType::Regular).with_volatility(20.0), 0.0);

        let short = MarketContext::new("30s", MarketType::Regular)
            .with_volatility(20.0)
            .with_trend_strength(60.0);
        let report = grader.grade(&tally_of(5, 1), 90.0, &short, 0.0);
        assert!((base.score - report.score - 20.0).abs() < 1e-9);

        let otc = MarketContext::new("1m", MarketType::Otc).with_volatility(20.0);
        let report = grader.grade(&tally_of(5, 1), 90.0, &otc, 0.0);
        assert!((base.score - report.score - 15.0).abs() < 1e-9);

        let noisy = MarketContext::new("1m", MarketType::Regular).with_volatility(80.0);
        let report = grader.grade(&tally_of(5, 1), 90.0, &noisy, 0.0);
        assert!((base.score - report.score - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_and_success_bounds() {
        let grader = ConfluenceGrader::default();
        let ctx = MarketContext::new("30s", MarketType::Otc)
            .with_volatility(90.0)
            .with_trend_strength(10.0);
        let report = grader.grade(&tally_of(0, 8), 0.0, &ctx, 100.0);
        assert_eq!(report.score, 0.0);
        assert_eq!(report.grade, Grade::F);
        assert_eq!(report.expected_success_rate, 30.0);

        let calm = MarketContext::new("1m", MarketType::Regular).with_volatility(10.0);
        let report = grader.grade(&tally_of(10, 0), 100.0, &calm, 0.0);
        assert_eq!(report.score, 100.0);
        assert_eq!(report.expected_success_rate, 80.0);
    }

    #[test]
    fn test_collect_counts_categories_once() {
        let grader = ConfluenceGrader::default();
        let ctx = MarketContext::new("1m", MarketType::Regular)
            .with_trend_strength(85.0)
            .with_volume_profile(VolumeProfile::Low);
        let signals = vec![
            Signal::up(SignalSource::ChartPattern, 80.0, 90.0),
            Signal::up(SignalSource::Candlestick, 80.0, 90.0),
            Signal::up(SignalSource::Harmonic, 80.0, 90.0),
            Signal::down(SignalSource::Momentum, 60.0, 70.0),
        ];
        let scores = WeightedAggregator::default().aggregate(&signals, &ctx);
        let manipulation = ManipulationAssessment::default();
        let factors = vec![UpstreamFactor::new("higher lows", FactorStance::Bullish)];

        let tally = grader.collect(&GradingInput {
            direction: Direction::Up,
            signals: &signals,
            scores: &scores,
            context: &ctx,
            factors: &factors,
            manipulation: &manipulation,
        });

        // pattern + strong trend + factor (medium and short horizons both lean up)
        assert!(tally.confluences.iter().any(|c| c.starts_with("pattern")));
        assert!(tally.confluences.contains(&"strong prevailing trend".to_string()));
        assert!(tally.confluences.contains(&"higher lows".to_string()));
        assert!(tally.contraindications.iter().any(|c| c.starts_with("momentum")));
        assert!(tally.contraindications.contains(&"thin volume".to_string()));
        assert_eq!(
            tally.confluences.iter().filter(|c| c.starts_with("pattern")).count(),
            1
        );
    }

    #[test]
    fn test_collect_flags_elevated_manipulation() {
        let grader = ConfluenceGrader::default();
        let ctx = MarketContext::new("1m", MarketType::Regular);
        let scores = AggregateScores::default();
        let manipulation = ManipulationAssessment {
            score: 65.0,
            suspicious_factors: vec![],
            risk_tier: RiskTier::High,
            recommendation: RiskRecommendation::Caution,
        };
        let tally = grader.collect(&GradingInput {
            direction: Direction::Down,
            signals: &[],
            scores: &scores,
            context: &ctx,
            factors: &[],
            manipulation: &manipulation,
        });
        assert_eq!(tally.contraindications, vec!["manipulation risk HIGH".to_string()]);
    }

    #[test]
    fn test_horizon_alignment() {
        let signals = vec![
            Signal::up(SignalSource::Trendline, 70.0, 80.0),
            Signal::up(SignalSource::Candlestick, 70.0, 80.0),
        ];
        assert_eq!(horizon_alignment(&signals, Direction::Up), Some(true));
        assert_eq!(horizon_alignment(&signals, Direction::Down), Some(false));

        let mixed = vec![
            Signal::up(SignalSource::Trendline, 70.0, 80.0),
            Signal::up(SignalSource::Candlestick, 70.0, 80.0),
            Signal::down(SignalSource::ChartPattern, 70.0, 80.0),
        ];
        assert_eq!(horizon_alignment(&mixed, Direction::Up), None);
    }

    #[test]
    fn test_gate() {
        let grader = ConfluenceGrader::default();

        let pass = grader.gate(Grade::B, Action::Buy, 85.0);
        assert_eq!(pass.action, Action::Buy);
        assert_eq!(pass.confidence, 85.0);
        assert!(pass.reason.is_none());

        let blocked = grader.gate(Grade::C, Action::Sell, 70.0);
        assert_eq!(blocked.action, Action::Wait);
        assert_eq!(blocked.confidence, 45.0);
        assert!(blocked.reason.unwrap().contains("grade C"));

        let floored = grader.gate(Grade::F, Action::Buy, 40.0);
        assert_eq!(floored.confidence, 25.0);

        let low = grader.gate(Grade::D, Action::Buy, 20.0);
        assert_eq!(low.confidence, 20.0);
    }

    #[test]
    fn test_threshold_validation() {
        assert!(GradingConfig::default().validate().is_ok());

        let mut config = GradingConfig::default();
        config.thresholds.b = 95.0;
        assert!(config.validate().is_err());

        let config = GradingConfig {
            ideal_confluence_count: 0,
            ..GradingConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
