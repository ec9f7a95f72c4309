//! Shared types for the decision pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::context::MarketContext;
use crate::signal::{Direction, Signal};

/// Final trading action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Buy,
    Sell,
    Wait,
}

impl Action {
    /// Direction counter this action increments in the bias state
    pub fn direction(&self) -> Direction {
        match self {
            Action::Buy => Direction::Up,
            Action::Sell => Direction::Down,
            Action::Wait => Direction::Neutral,
        }
    }

    pub fn from_direction(direction: Direction) -> Self {
        match direction {
            Direction::Up => Action::Buy,
            Direction::Down => Action::Sell,
            Direction::Neutral => Action::Wait,
        }
    }

    pub fn is_wait(&self) -> bool {
        matches!(self, Action::Wait)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::Wait => write!(f, "WAIT"),
        }
    }
}

/// Setup quality grade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// Only A and B setups may lead to a trade
    pub fn allows_trade(&self) -> bool {
        matches!(self, Grade::A | Grade::B)
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Manipulation risk tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            RiskTier::Critical
        } else if score >= 60.0 {
            RiskTier::High
        } else if score >= 35.0 {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }

    pub fn is_elevated(&self) -> bool {
        matches!(self, RiskTier::High | RiskTier::Critical)
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskTier::Low => write!(f, "LOW"),
            RiskTier::Medium => write!(f, "MEDIUM"),
            RiskTier::High => write!(f, "HIGH"),
            RiskTier::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// What to do about the manipulation risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskRecommendation {
    Proceed,
    Caution,
    Abort,
}

impl fmt::Display for RiskRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskRecommendation::Proceed => write!(f, "PROCEED"),
            RiskRecommendation::Caution => write!(f, "CAUTION"),
            RiskRecommendation::Abort => write!(f, "ABORT"),
        }
    }
}

/// Anti-manipulation assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManipulationAssessment {
    /// Heuristic manipulation likelihood (0 to 100)
    pub score: f64,
    pub suspicious_factors: Vec<String>,
    pub risk_tier: RiskTier,
    pub recommendation: RiskRecommendation,
}

impl ManipulationAssessment {
    pub fn is_abort(&self) -> bool {
        matches!(self.recommendation, RiskRecommendation::Abort)
    }
}

impl Default for ManipulationAssessment {
    fn default() -> Self {
        Self {
            score: 0.0,
            suspicious_factors: Vec::new(),
            risk_tier: RiskTier::Low,
            recommendation: RiskRecommendation::Proceed,
        }
    }
}

/// Entry timing and validity window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timing {
    pub enter_now: bool,
    pub wait_seconds: f64,
    pub validity_seconds: f64,
    /// Suggested trade expiration (0 when not trading)
    pub expiry_seconds: f64,
}

/// Final decision, never mutated after construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub action: Action,
    pub confidence: f64,
    pub grade: Grade,
    pub confluence_count: usize,
    pub confluences: Vec<String>,
    pub contraindications: Vec<String>,
    pub timing: Timing,
    pub expected_success_rate: f64,
    pub reasoning: Vec<String>,
}

impl Decision {
    pub fn is_actionable(&self) -> bool {
        !self.action.is_wait()
    }
}

/// How an upstream factor relates to the trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorStance {
    /// Supports an upward move
    Bullish,
    /// Supports a downward move
    Bearish,
    /// Supports the setup whatever its direction
    Confirming,
    /// Undermines the setup whatever its direction
    Contradicting,
}

/// Qualitative factor reported by an upstream analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamFactor {
    pub label: String,
    pub stance: FactorStance,
}

impl UpstreamFactor {
    pub fn new(label: impl Into<String>, stance: FactorStance) -> Self {
        Self {
            label: label.into(),
            stance,
        }
    }

    pub fn confirming(label: impl Into<String>) -> Self {
        Self::new(label, FactorStance::Confirming)
    }

    pub fn contradicting(label: impl Into<String>) -> Self {
        Self::new(label, FactorStance::Contradicting)
    }

    /// Whether this factor supports a trade in `direction`
    ///
    /// `Some(true)` is a confluence, `Some(false)` a contraindication and `None`
    /// means the factor says nothing about this direction.
    pub fn supports(&self, direction: Direction) -> Option<bool> {
        match (self.stance, direction) {
            (FactorStance::Confirming, _) => Some(true),
            (FactorStance::Contradicting, _) => Some(false),
            (_, Direction::Neutral) => None,
            (FactorStance::Bullish, Direction::Up) | (FactorStance::Bearish, Direction::Down) => {
                Some(true)
            }
            (FactorStance::Bullish, Direction::Down) | (FactorStance::Bearish, Direction::Up) => {
                Some(false)
            }
        }
    }
}

/// Everything one analysis needs besides the bias state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisInput {
    pub signals: Vec<Signal>,
    pub context: MarketContext,
    #[serde(default)]
    pub factors: Vec<UpstreamFactor>,
    /// Upstream timing override; derived from timing signals when absent
    #[serde(default)]
    pub optimal_entry: Option<bool>,
}

impl AnalysisInput {
    pub fn new(signals: Vec<Signal>, context: MarketContext) -> Self {
        Self {
            signals,
            context,
            factors: Vec::new(),
            optimal_entry: None,
        }
    }

    pub fn with_factors(mut self, factors: Vec<UpstreamFactor>) -> Self {
        self.factors = factors;
        self
    }

    pub fn with_optimal_entry(mut self, optimal: bool) -> Self {
        self.optimal_entry = Some(optimal);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_tier_thresholds() {
        assert_eq!(RiskTier::from_score(0.0), RiskTier::Low);
        assert_eq!(RiskTier::from_score(34.9), RiskTier::Low);
        assert_eq!(RiskTier::from_score(35.0), RiskTier::Medium);
        assert_eq!(RiskTier::from_score(59.9), RiskTier::Medium);
        assert_eq!(RiskTier::from_score(60.0), RiskTier::High);
        assert_eq!(RiskTier::from_score(79.9), RiskTier::High);
        assert_eq!(RiskTier::from_score(80.0), RiskTier::Critical);
    }

    #[test]
    fn test_factor_support() {
        let bullish = UpstreamFactor::new("higher lows", FactorStance::Bullish);
        assert_eq!(bullish.supports(Direction::Up), Some(true));
        assert_eq!(bullish.supports(Direction::Down), Some(false));
        assert_eq!(bullish.supports(Direction::Neutral), None);

        let confirming = UpstreamFactor::confirming("trend structure valid");
        assert_eq!(confirming.supports(Direction::Down), Some(true));
        assert_eq!(confirming.supports(Direction::Neutral), Some(true));
    }

    #[test]
    fn test_action_serialization() {
        assert_eq!(serde_json::to_string(&Action::Buy).unwrap(), "\"BUY\"");
        assert_eq!(serde_json::to_string(&RiskTier::Critical).unwrap(), "\"CRITICAL\"");
        assert_eq!(Action::Wait.direction(), Direction::Neutral);
        assert!(Grade::B.allows_trade());
        assert!(!Grade::C.allows_trade());
    }
}
