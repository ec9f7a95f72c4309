//! Weighted aggregation of signals into directional scores
//!
//! Each signal's weight is its source's base weight, scaled by the detector's
//! confidence and by how well its natural horizon matches the chart timeframe.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::context::MarketContext;
use crate::error::{Error, Result};
use crate::signal::{Direction, Signal, SignalCategory, SignalSource, TimeframeClass};

/// Weight table configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightConfig {
    /// Base weight overrides keyed by source name
    #[serde(default)]
    pub base_weights: BTreeMap<String, f64>,

    /// Base weight for sources with no built-in or configured weight
    #[serde(default = "default_base_weight")]
    pub default_base_weight: f64,

    /// Share of a neutral signal's weight added to both sides
    #[serde(default = "default_neutral_share")]
    pub neutral_share: f64,
}

fn default_base_weight() -> f64 {
    1.0
}

fn default_neutral_share() -> f64 {
    0.3
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            base_weights: BTreeMap::new(),
            default_base_weight: default_base_weight(),
            neutral_share: default_neutral_share(),
        }
    }
}

impl WeightConfig {
    /// Parse weight overrides from string keys to sources
    pub fn source_weights(&self) -> HashMap<SignalSource, f64> {
        self.base_weights
            .iter()
            .map(|(key, &weight)| (SignalSource::from(key.clone()), weight))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen: BTreeMap<SignalSource, &str> = BTreeMap::new();
        for key in self.base_weights.keys() {
            let source = SignalSource::from(key.clone());
            if let Some(previous) = seen.insert(source.clone(), key) {
                return Err(Error::Config(format!(
                    "base weights '{}' and '{}' both configure source '{}'",
                    previous,
                    key,
                    source.as_str()
                )));
            }
        }
        for (key, &weight) in &self.base_weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::Config(format!(
                    "base weight for '{}' must be a non-negative number, got {}",
                    key, weight
                )));
            }
        }
        if !self.default_base_weight.is_finite() || self.default_base_weight < 0.0 {
            return Err(Error::Config(
                "default_base_weight must be a non-negative number".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.neutral_share) {
            return Err(Error::Config("neutral_share must be within [0, 1]".into()));
        }
        Ok(())
    }
}

/// Net weighted opinion of one signal category
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryTally {
    pub up_weight: f64,
    pub down_weight: f64,
    pub signal_count: usize,
}

impl CategoryTally {
    /// Net direction of the category (neutral on a tie or no directional weight)
    pub fn net_direction(&self) -> Direction {
        if self.up_weight > self.down_weight {
            Direction::Up
        } else if self.down_weight > self.up_weight {
            Direction::Down
        } else {
            Direction::Neutral
        }
    }
}

/// Aggregated directional scores
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateScores {
    pub buy_score: f64,
    pub sell_score: f64,
    pub total_weight: f64,
    /// Confidence of the contributing signals, weighted by base weight
    pub mean_confidence: f64,
    pub signal_count: usize,
    pub by_category: BTreeMap<SignalCategory, CategoryTally>,
}

impl AggregateScores {
    /// No usable weight: callers must treat this as insufficient data
    pub fn is_empty(&self) -> bool {
        self.total_weight <= 0.0
    }

    pub fn buy_fraction(&self) -> f64 {
        fraction(self.buy_score, self.total_weight)
    }

    pub fn sell_fraction(&self) -> f64 {
        fraction(self.sell_score, self.total_weight)
    }

    /// Apply multiplicative factors to each side, keeping the total weight
    pub fn scaled(&self, buy_factor: f64, sell_factor: f64) -> Self {
        Self {
            buy_score: self.buy_score * buy_factor,
            sell_score: self.sell_score * sell_factor,
            ..self.clone()
        }
    }
}

fn fraction(score: f64, total: f64) -> f64 {
    if total > 0.0 {
        (score / total).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// The weighted aggregator
#[derive(Debug, Clone)]
pub struct WeightedAggregator {
    /// Base weights by source (overrides defaults)
    weights: HashMap<SignalSource, f64>,
    default_base_weight: f64,
    neutral_share: f64,
}

impl WeightedAggregator {
    pub fn new(config: &WeightConfig) -> Self {
        Self {
            weights: config.source_weights(),
            default_base_weight: config.default_base_weight,
            neutral_share: config.neutral_share,
        }
    }

    /// Set custom weight for a source
    pub fn set_weight(&mut self, source: SignalSource, weight: f64) {
        self.weights.insert(source, weight);
    }

    /// Effective base weight for a source
    pub fn base_weight(&self, source: &SignalSource) -> f64 {
        self.weights
            .get(source)
            .copied()
            .or_else(|| source.default_weight())
            .unwrap_or(self.default_base_weight)
    }

    /// Multiplier for a signal horizon on a given chart
    ///
    /// Matching horizons are favoured; unknown chart timeframes are neutral (1.0).
    pub fn timeframe_multiplier(class: TimeframeClass, context: &MarketContext) -> f64 {
        let Some(chart) = context.timeframe.horizon() else {
            return 1.0;
        };

        match (chart, class) {
            (a, b) if a == b => 1.2,
            (TimeframeClass::Short, TimeframeClass::Medium) => 1.0,
            (a, b) if a.rank().abs_diff(b.rank()) == 1 => 0.9,
            _ => 0.75,
        }
    }

    /// Weight of one signal in this context
    pub fn signal_weight(&self, signal: &Signal, context: &MarketContext) -> f64 {
        self.base_weight(&signal.source)
            * (signal.confidence / 100.0)
            * Self::timeframe_multiplier(signal.timeframe_class, context)
    }

    /// Aggregate signals into directional scores
    pub fn aggregate(&self, signals: &[Signal], context: &MarketContext) -> AggregateScores {
        let mut scores = AggregateScores::default();
        let mut confidence_sum = 0.0;
        let mut base_sum = 0.0;

        for signal in signals {
            let weight = self.signal_weight(signal, context);
            let tally = scores.by_category.entry(signal.category()).or_default();
            tally.signal_count += 1;

            match signal.direction {
                Direction::Up => {
                    scores.buy_score += weight;
                    tally.up_weight += weight;
                }
                Direction::Down => {
                    scores.sell_score += weight;
                    tally.down_weight += weight;
                }
                Direction::Neutral => {
                    scores.buy_score += self.neutral_share * weight;
                    scores.sell_score += self.neutral_share * weight;
                }
            }

            scores.total_weight += weight;
            scores.signal_count += 1;

            let base = self.base_weight(&signal.source);
            confidence_sum += signal.confidence * base;
            base_sum += base;
        }

        scores.mean_confidence = if base_sum > 0.0 {
            confidence_sum / base_sum
        } else {
            0.0
        };

        scores
    }
}

impl Default for WeightedAggregator {
    fn default() -> Self {
        Self::new(&WeightConfig::default())
    }
}
