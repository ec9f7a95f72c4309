//! Signals produced by upstream detectors
//!
//! Each detector (trendline tracer, candlestick recognizer, momentum oscillator, ...)
//! reports one directional opinion. Signals are combined by the engine to produce
//! a single decision.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod normalizer;

pub use normalizer::{DetectorOutput, SignalNormalizer, ValueScale};

/// Directional opinion of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Neutral,
}

impl Direction {
    /// The opposing direction (neutral has none)
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Neutral => Direction::Neutral,
        }
    }

    pub fn is_directional(&self) -> bool {
        !matches!(self, Direction::Neutral)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
            Direction::Neutral => write!(f, "neutral"),
        }
    }
}

/// Natural horizon of a detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeframeClass {
    Short,
    Medium,
    Long,
}

impl TimeframeClass {
    /// Ordinal position used for horizon distance
    pub fn rank(&self) -> u8 {
        match self {
            TimeframeClass::Short => 0,
            TimeframeClass::Medium => 1,
            TimeframeClass::Long => 2,
        }
    }

    /// Parse a loose label ("short", "scalp", "swing", ...)
    pub fn parse_loose(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "short" | "scalp" | "fast" => Some(TimeframeClass::Short),
            "medium" | "mid" | "intraday" => Some(TimeframeClass::Medium),
            "long" | "swing" | "slow" => Some(TimeframeClass::Long),
            _ => None,
        }
    }
}

/// Identifier of the producing detector
///
/// Open-ended: unknown names are kept as `Custom` and weighted with the
/// configured default base weight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SignalSource {
    // === Structural ===
    Trendline,
    SupportResistance,
    MarketStructure,
    Fibonacci,

    // === Patterns ===
    ChartPattern,
    Candlestick,
    Harmonic,

    // === Trend ===
    MovingAverage,
    Breakout,
    PriceAction,

    // === Snapshots ===
    Momentum,
    Volume,

    // === Special purpose ===
    /// Dedicated reversal detector (divergence, exhaustion)
    Reversal,
    /// Entry timing detector
    Timing,

    /// Any other detector
    Custom(String),
}

impl SignalSource {
    /// Built-in sources, in declaration order
    pub const BUILTIN: [SignalSource; 14] = [
        SignalSource::Trendline,
        SignalSource::SupportResistance,
        SignalSource::MarketStructure,
        SignalSource::Fibonacci,
        SignalSource::ChartPattern,
        SignalSource::Candlestick,
        SignalSource::Harmonic,
        SignalSource::MovingAverage,
        SignalSource::Breakout,
        SignalSource::PriceAction,
        SignalSource::Momentum,
        SignalSource::Volume,
        SignalSource::Reversal,
        SignalSource::Timing,
    ];

    /// Default base weight (empirical reliability tier)
    ///
    /// Returns `None` for custom sources; the aggregator falls back to the
    /// configured default.
    pub fn default_weight(&self) -> Option<f64> {
        let weight = match self {
            // Structural - most reliable
            SignalSource::Trendline => 1.5,
            SignalSource::SupportResistance => 1.5,
            SignalSource::MarketStructure => 1.4,
            SignalSource::Fibonacci => 1.1,

            // Patterns
            SignalSource::ChartPattern => 1.3,
            SignalSource::Harmonic => 1.2,
            SignalSource::Candlestick => 1.0,

            // Trend
            SignalSource::Breakout => 1.2,
            SignalSource::MovingAverage => 0.9,
            SignalSource::PriceAction => 1.0,

            // Snapshots - least reliable on their own
            SignalSource::Momentum => 0.8,
            SignalSource::Volume => 0.7,

            SignalSource::Reversal => 1.0,
            SignalSource::Timing => 0.6,

            SignalSource::Custom(_) => return None,
        };
        Some(weight)
    }

    /// Natural horizon when the detector does not report one
    pub fn default_timeframe_class(&self) -> TimeframeClass {
        match self {
            SignalSource::Trendline
            | SignalSource::SupportResistance
            | SignalSource::MarketStructure => TimeframeClass::Long,

            SignalSource::Fibonacci
            | SignalSource::ChartPattern
            | SignalSource::Harmonic
            | SignalSource::MovingAverage
            | SignalSource::Breakout
            | SignalSource::Custom(_) => TimeframeClass::Medium,

            SignalSource::Candlestick
            | SignalSource::PriceAction
            | SignalSource::Momentum
            | SignalSource::Volume
            | SignalSource::Reversal
            | SignalSource::Timing => TimeframeClass::Short,
        }
    }

    /// Category for grouping correlated sources
    pub fn category(&self) -> SignalCategory {
        match self {
            SignalSource::Trendline
            | SignalSource::SupportResistance
            | SignalSource::MarketStructure
            | SignalSource::Fibonacci => SignalCategory::Structural,

            SignalSource::ChartPattern | SignalSource::Candlestick | SignalSource::Harmonic => {
                SignalCategory::Pattern
            }

            SignalSource::MovingAverage | SignalSource::Breakout | SignalSource::PriceAction => {
                SignalCategory::Trend
            }

            SignalSource::Momentum => SignalCategory::Momentum,
            SignalSource::Volume => SignalCategory::Volume,
            SignalSource::Reversal => SignalCategory::Reversal,
            SignalSource::Timing => SignalCategory::Timing,
            SignalSource::Custom(_) => SignalCategory::Custom,
        }
    }

    /// Canonical snake_case name
    pub fn as_str(&self) -> &str {
        match self {
            SignalSource::Trendline => "trendline",
            SignalSource::SupportResistance => "support_resistance",
            SignalSource::MarketStructure => "market_structure",
            SignalSource::Fibonacci => "fibonacci",
            SignalSource::ChartPattern => "chart_pattern",
            SignalSource::Candlestick => "candlestick",
            SignalSource::Harmonic => "harmonic",
            SignalSource::MovingAverage => "moving_average",
            SignalSource::Breakout => "breakout",
            SignalSource::PriceAction => "price_action",
            SignalSource::Momentum => "momentum",
            SignalSource::Volume => "volume",
            SignalSource::Reversal => "reversal",
            SignalSource::Timing => "timing",
            SignalSource::Custom(name) => name.as_str(),
        }
    }
}

impl FromStr for SignalSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace(['-', ' '], "_");
        let source = match key.as_str() {
            "trendline" | "trend_line" => SignalSource::Trendline,
            "support_resistance" | "sr" => SignalSource::SupportResistance,
            "market_structure" => SignalSource::MarketStructure,
            "fibonacci" | "fib" => SignalSource::Fibonacci,
            "chart_pattern" => SignalSource::ChartPattern,
            "candlestick" | "candle" => SignalSource::Candlestick,
            "harmonic" => SignalSource::Harmonic,
            "moving_average" | "ma" | "ema" => SignalSource::MovingAverage,
            "breakout" => SignalSource::Breakout,
            "price_action" => SignalSource::PriceAction,
            "momentum" | "rsi" | "macd" | "stochastic" => SignalSource::Momentum,
            "volume" => SignalSource::Volume,
            "reversal" | "divergence" => SignalSource::Reversal,
            "timing" | "entry_timing" => SignalSource::Timing,
            _ => SignalSource::Custom(key),
        };
        Ok(source)
    }
}

impl From<String> for SignalSource {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(source) => source,
            Err(never) => match never {},
        }
    }
}

impl From<SignalSource> for String {
    fn from(source: SignalSource) -> Self {
        source.as_str().to_string()
    }
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Groups of correlated sources, each counted once as a confluence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalCategory {
    Structural,
    Pattern,
    Trend,
    Momentum,
    Volume,
    Reversal,
    Timing,
    Custom,
}

impl fmt::Display for SignalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignalCategory::Structural => "structure",
            SignalCategory::Pattern => "pattern",
            SignalCategory::Trend => "trend",
            SignalCategory::Momentum => "momentum",
            SignalCategory::Volume => "volume",
            SignalCategory::Reversal => "reversal",
            SignalCategory::Timing => "timing",
            SignalCategory::Custom => "custom",
        };
        write!(f, "{}", name)
    }
}

/// One detector's opinion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub source: SignalSource,
    pub direction: Direction,
    /// Detector-internal magnitude (0 to 100)
    #[serde(deserialize_with = "deserialize_bounded")]
    pub strength: f64,
    /// Detector's self-reported reliability (0 to 100)
    #[serde(deserialize_with = "deserialize_bounded")]
    pub confidence: f64,
    pub timeframe_class: TimeframeClass,
    /// Human-readable explanation
    #[serde(default)]
    pub reason: String,
}

impl Signal {
    /// Create a new signal, clamping strength and confidence
    pub fn new(
        source: SignalSource,
        direction: Direction,
        strength: f64,
        confidence: f64,
        timeframe_class: TimeframeClass,
    ) -> Self {
        Self {
            source,
            direction,
            strength: clamp_percent(strength),
            confidence: clamp_percent(confidence),
            timeframe_class,
            reason: String::new(),
        }
    }

    /// Create an upward signal on the source's natural horizon
    pub fn up(source: SignalSource, strength: f64, confidence: f64) -> Self {
        let class = source.default_timeframe_class();
        Self::new(source, Direction::Up, strength, confidence, class)
    }

    /// Create a downward signal on the source's natural horizon
    pub fn down(source: SignalSource, strength: f64, confidence: f64) -> Self {
        let class = source.default_timeframe_class();
        Self::new(source, Direction::Down, strength, confidence, class)
    }

    /// Attach an explanation
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Override the timeframe class
    pub fn with_timeframe_class(mut self, class: TimeframeClass) -> Self {
        self.timeframe_class = class;
        self
    }

    pub fn category(&self) -> SignalCategory {
        self.source.category()
    }

    pub fn is_directional(&self) -> bool {
        self.direction.is_directional()
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (strength: {:.0}, conf: {:.0}, {:?})",
            self.source, self.direction, self.strength, self.confidence, self.timeframe_class
        )
    }
}

/// Clamp to [0, 100], mapping NaN to 0
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

fn deserialize_bounded<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    Ok(clamp_percent(value))
}
