//! Entry timing and validity windows

use serde::{Deserialize, Serialize};

use super::types::{Action, Timing};
use crate::context::{MarketContext, Timeframe};
use crate::error::{Error, Result};
use crate::signal::{Direction, Signal, SignalCategory};

/// Wait range and validity for one chart timeframe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingWindow {
    pub timeframe: String,
    pub wait_min: f64,
    pub wait_max: f64,
    pub validity: f64,
}

impl TimingWindow {
    pub fn new(timeframe: &str, wait_min: f64, wait_max: f64, validity: f64) -> Self {
        Self {
            timeframe: timeframe.to_string(),
            wait_min,
            wait_max,
            validity,
        }
    }

    fn seconds(&self) -> Option<u64> {
        Timeframe::new(self.timeframe.as_str()).seconds()
    }

    fn scaled(&self, ratio: f64) -> Self {
        Self {
            timeframe: self.timeframe.clone(),
            wait_min: self.wait_min * ratio,
            wait_max: self.wait_max * ratio,
            validity: self.validity * ratio,
        }
    }
}

/// Timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_table")]
    pub table: Vec<TimingWindow>,

    /// Validity handed out with WAIT decisions
    #[serde(default = "default_reevaluation_seconds")]
    pub reevaluation_seconds: f64,

    #[serde(default = "default_enter_confidence")]
    pub enter_confidence: f64,

    #[serde(default = "default_enter_confluences")]
    pub enter_confluences: usize,

    /// Strength a timing signal needs to mark the entry as optimal
    #[serde(default = "default_timing_signal_strength")]
    pub timing_signal_strength: f64,

    /// Volatility above which validity shrinks
    #[serde(default = "default_volatility_start")]
    pub volatility_start: f64,

    /// Validity factor reached at volatility 100
    #[serde(default = "default_volatility_floor")]
    pub volatility_floor: f64,

    /// Trade expiration in chart candles
    #[serde(default = "default_expiry_candles")]
    pub expiry_candles: u32,
}

fn default_table() -> Vec<TimingWindow> {
    vec![
        TimingWindow::new("30s", 5.0, 20.0, 15.0),
        TimingWindow::new("1m", 10.0, 40.0, 30.0),
        TimingWindow::new("5m", 50.0, 200.0, 150.0),
    ]
}
fn default_reevaluation_seconds() -> f64 {
    90.0
}
fn default_enter_confidence() -> f64 {
    80.0
}
fn default_enter_confluences() -> usize {
    4
}
fn default_timing_signal_strength() -> f64 {
    60.0
}
fn default_volatility_start() -> f64 {
    60.0
}
fn default_volatility_floor() -> f64 {
    0.7
}
fn default_expiry_candles() -> u32 {
    2
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
            reevaluation_seconds: default_reevaluation_seconds(),
            enter_confidence: default_enter_confidence(),
            enter_confluences: default_enter_confluences(),
            timing_signal_strength: default_timing_signal_strength(),
            volatility_start: default_volatility_start(),
            volatility_floor: default_volatility_floor(),
            expiry_candles: default_expiry_candles(),
        }
    }
}

impl TimingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.table.is_empty() {
            return Err(Error::MissingConfigEntry("timing.table".into()));
        }
        for window in &self.table {
            if window.seconds().is_none() {
                return Err(Error::Config(format!(
                    "timing.table entry has unparseable timeframe '{}'",
                    window.timeframe
                )));
            }
            if window.wait_min < 0.0 || window.wait_min > window.wait_max {
                return Err(Error::Config(format!(
                    "timing.table entry '{}' needs 0 <= wait_min <= wait_max",
                    window.timeframe
                )));
            }
            if window.validity <= 0.0 {
                return Err(Error::Config(format!(
                    "timing.table entry '{}' needs a positive validity",
                    window.timeframe
                )));
            }
        }
        if self.reevaluation_seconds <= 0.0 {
            return Err(Error::Config("timing.reevaluation_seconds must be positive".into()));
        }
        if !(0.0..100.0).contains(&self.volatility_start) {
            return Err(Error::Config("timing.volatility_start must be within [0, 100)".into()));
        }
        if !(0.0..=1.0).contains(&self.volatility_floor) || self.volatility_floor == 0.0 {
            return Err(Error::Config("timing.volatility_floor must be within (0, 1]".into()));
        }
        Ok(())
    }
}

/// Timing calculator
#[derive(Debug, Clone)]
pub struct TimingCalculator {
    config: TimingConfig,
}

impl TimingCalculator {
    pub fn new(config: TimingConfig) -> Self {
        Self { config }
    }

    /// Whether the current bar is a good entry for `direction`
    ///
    /// An explicit caller flag wins; otherwise a timing signal agreeing with the
    /// direction at sufficient strength marks the entry as optimal.
    pub fn optimal_entry(&self, signals: &[Signal], direction: Direction, flag: Option<bool>) -> bool {
        if let Some(flag) = flag {
            return flag;
        }
        direction.is_directional()
            && signals.iter().any(|s| {
                s.category() == SignalCategory::Timing
                    && s.direction == direction
                    && s.strength >= self.config.timing_signal_strength
            })
    }

    /// Window for a chart timeframe
    pub fn window_for(&self, timeframe: &Timeframe) -> Option<TimingWindow> {
        let table = &self.config.table;

        let label = timeframe.label().trim();
        if let Some(exact) = table.iter().find(|w| w.timeframe.eq_ignore_ascii_case(label)) {
            return Some(exact.clone());
        }

        let Some(chart_secs) = timeframe.seconds() else {
            return table
                .iter()
                .find(|w| w.seconds() == Some(60))
                .or_else(|| table.iter().min_by_key(|w| w.seconds().unwrap_or(u64::MAX)))
                .cloned();
        };

        let with_secs = table.iter().filter_map(|w| w.seconds().map(|s| (s, w)));
        let below = with_secs.clone().filter(|(s, _)| *s <= chart_secs).max_by_key(|(s, _)| *s);
        let (base_secs, base) = below.or_else(|| with_secs.min_by_key(|(s, _)| *s))?;

        Some(base.scaled(chart_secs as f64 / base_secs as f64))
    }

    /// Validity multiplier for the market noise level
    fn volatility_factor(&self, volatility: f64) -> f64 {
        let start = self.config.volatility_start;
        if volatility <= start {
            return 1.0;
        }
        let progress = ((volatility - start) / (100.0 - start)).clamp(0.0, 1.0);
        1.0 - (1.0 - self.config.volatility_floor) * progress
    }

    /// Compute timing for a final action
    pub fn calculate(
        &self,
        action: Action,
        confidence: f64,
        confluence_count: usize,
        optimal_entry: bool,
        context: &MarketContext,
    ) -> Timing {
        if action.is_wait() {
            return Timing {
                enter_now: false,
                wait_seconds: 0.0,
                validity_seconds: self.config.reevaluation_seconds,
                expiry_seconds: 0.0,
            };
        }

        let enter_now = confidence >= self.config.enter_confidence
            && confluence_count >= self.config.enter_confluences
            && optimal_entry;

        let expiry_seconds =
            context.timeframe.seconds().unwrap_or(60) as f64 * self.config.expiry_candles as f64;

        let Some(window) = self.window_for(&context.timeframe) else {
            return Timing {
                enter_now,
                wait_seconds: 0.0,
                validity_seconds: self.config.reevaluation_seconds,
                expiry_seconds,
            };
        };

        let wait_seconds = if enter_now {
            0.0
        } else {
            let eagerness = ((confidence - 50.0) / 50.0).clamp(0.0, 1.0);
            window.wait_max - (window.wait_max - window.wait_min) * eagerness
        };

        Timing {
            enter_now,
            wait_seconds,
            validity_seconds: window.validity * self.volatility_factor(context.volatility),
            expiry_seconds,
        }
    }
}

impl Default for TimingCalculator {
    fn default() -> Self {
        Self::new(TimingConfig::default())
    }
}
