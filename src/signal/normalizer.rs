//! Signal normalization
//!
//! Detectors report in their own vocabulary ("bullish", "call", 0.0-1.0 scales,
//! missing horizons). The normalizer turns those outputs into bounded `Signal`
//! values the engine can weigh against each other.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::{clamp_percent, Direction, Signal, SignalSource, TimeframeClass};

/// Scale a detector reports strength/confidence on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueScale {
    /// 0 to 100
    #[default]
    Percent,
    /// 0.0 to 1.0
    Unit,
}

impl ValueScale {
    fn to_percent(self, value: f64) -> f64 {
        match self {
            ValueScale::Percent => clamp_percent(value),
            ValueScale::Unit => clamp_percent(value * 100.0),
        }
    }
}

/// Raw output of a detector, before normalization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorOutput {
    pub source: String,
    pub direction: String,
    pub strength: f64,
    pub confidence: f64,
    #[serde(default)]
    pub scale: ValueScale,
    #[serde(default)]
    pub timeframe_class: Option<String>,
    #[serde(default)]
    pub reason: String,
}

impl DetectorOutput {
    pub fn new(
        source: impl Into<String>,
        direction: impl Into<String>,
        strength: f64,
        confidence: f64,
    ) -> Self {
        Self {
            source: source.into(),
            direction: direction.into(),
            strength,
            confidence,
            scale: ValueScale::Percent,
            timeframe_class: None,
            reason: String::new(),
        }
    }

    pub fn with_scale(mut self, scale: ValueScale) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_timeframe_class(mut self, class: impl Into<String>) -> Self {
        self.timeframe_class = Some(class.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }
}

/// Converts detector outputs into engine signals
#[derive(Debug, Clone, Default)]
pub struct SignalNormalizer;

impl SignalNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Parse a direction label; anything unrecognized is neutral
    pub fn parse_direction(label: &str) -> Direction {
        match label.trim().to_lowercase().as_str() {
            "up" | "bullish" | "bull" | "buy" | "call" | "long" | "higher" => Direction::Up,
            "down" | "bearish" | "bear" | "sell" | "put" | "short" | "lower" => Direction::Down,
            _ => Direction::Neutral,
        }
    }

    /// Normalize a single output. Returns `None` when the source is empty.
    pub fn normalize_one(&self, output: &DetectorOutput) -> Option<Signal> {
        if output.source.trim().is_empty() {
            return None;
        }

        let source: SignalSource = SignalSource::from(output.source.clone());
        let direction = Self::parse_direction(&output.direction);

        let timeframe_class = match output.timeframe_class.as_deref() {
            Some(label) => TimeframeClass::parse_loose(label).unwrap_or_else(|| {
                debug!(
                    source = %source,
                    label,
                    "Unknown timeframe class, using source default"
                );
                source.default_timeframe_class()
            }),
            None => source.default_timeframe_class(),
        };

        let signal = Signal::new(
            source,
            direction,
            output.scale.to_percent(output.strength),
            output.scale.to_percent(output.confidence),
            timeframe_class,
        )
        .with_reason(output.reason.clone());

        Some(signal)
    }

    /// Normalize a batch of outputs
    ///
    /// Empty sources are dropped. Repeated outputs from the same detector with the
    /// same direction and horizon collapse to the most confident one, so a detector
    /// that fires twice on one chart is not counted twice.
    pub fn normalize(&self, outputs: &[DetectorOutput]) -> Vec<Signal> {
        let mut signals: Vec<Signal> = Vec::with_capacity(outputs.len());
        let mut index: HashMap<(SignalSource, Direction, TimeframeClass), usize> =
            HashMap::new();

        for output in outputs {
            let Some(signal) = self.normalize_one(output) else {
                warn!(
                    direction = %output.direction,
                    "Dropping detector output with empty source"
                );
                continue;
            };

            let key = (
                signal.source.clone(),
                signal.direction,
                signal.timeframe_class,
            );

            match index.get(&key) {
                Some(&existing) => {
                    if signal.confidence > signals[existing].confidence {
                        signals[existing] = signal;
                    }
                    debug!(source = %key.0, "Collapsed duplicate detector output");
                }
                None => {
                    index.insert(key, signals.len());
                    signals.push(signal);
                }
            }
        }

        signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_vocabulary() {
        assert_eq!(SignalNormalizer::parse_direction("Bullish"), Direction::Up);
        assert_eq!(SignalNormalizer::parse_direction("CALL"), Direction::Up);
        assert_eq!(SignalNormalizer::parse_direction("put"), Direction::Down);
        assert_eq!(SignalNormalizer::parse_direction("sideways"), Direction::Neutral);
        assert_eq!(SignalNormalizer::parse_direction(""), Direction::Neutral);
    }

    #[test]
    fn test_unit_scale_conversion() {
        let normalizer = SignalNormalizer::new();
        let output = DetectorOutput::new("rsi", "bullish", 0.72, 0.9).with_scale(ValueScale::Unit);
        let signal = normalizer.normalize_one(&output).unwrap();
        assert_eq!(signal.source, SignalSource::Momentum);
        assert!((signal.strength - 72.0).abs() < 1e-9);
        assert!((signal.confidence - 90.0).abs() < 1e-9);
        assert_eq!(signal.timeframe_class, TimeframeClass::Short);
    }

    #[test]
    fn test_out_of_range_values_clamped() {
        let normalizer = SignalNormalizer::new();
        let output = DetectorOutput::new("trendline", "up", 180.0, -20.0);
        let signal = normalizer.normalize_one(&output).unwrap();
        assert_eq!(signal.strength, 100.0);
        assert_eq!(signal.confidence, 0.0);
        assert_eq!(signal.timeframe_class, TimeframeClass::Long);
    }

    #[test]
    fn test_explicit_and_unknown_timeframe_class() {
        let normalizer = SignalNormalizer::new();

        let explicit = DetectorOutput::new("trendline", "up", 60.0, 60.0).with_timeframe_class("swing");
        assert_eq!(
            normalizer.normalize_one(&explicit).unwrap().timeframe_class,
            TimeframeClass::Long
        );

        let unknown = DetectorOutput::new("candlestick", "up", 60.0, 60.0).with_timeframe_class("weekly-ish");
        assert_eq!(
            normalizer.normalize_one(&unknown).unwrap().timeframe_class,
            TimeframeClass::Short
        );
    }

    #[test]
    fn test_empty_source_dropped() {
        let normalizer = SignalNormalizer::new();
        let outputs = vec![
            DetectorOutput::new("  ", "up", 50.0, 50.0),
            DetectorOutput::new("volume", "up", 50.0, 50.0),
        ];
        let signals = normalizer.normalize(&outputs);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].source, SignalSource::Volume);
    }

    #[test]
    fn test_duplicates_collapse_to_most_confident() {
        let normalizer = SignalNormalizer::new();
        let outputs = vec![
            DetectorOutput::new("candlestick", "up", 70.0, 55.0).with_reason("hammer"),
            DetectorOutput::new("candlestick", "bullish", 65.0, 80.0).with_reason("engulfing"),
            DetectorOutput::new("candlestick", "down", 60.0, 70.0).with_reason("shooting star"),
        ];
        let signals = normalizer.normalize(&outputs);

        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].reason, "engulfing");
        assert_eq!(signals[0].confidence, 80.0);
        assert_eq!(signals[1].direction, Direction::Down);
    }
}
