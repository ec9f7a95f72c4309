//! Market context supplied with each analysis

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::signal::TimeframeClass;

/// Chart timeframe label ("30s", "1m", "5m", "1h", ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeframe(String);

impl Timeframe {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn label(&self) -> &str {
        &self.0
    }

    /// Duration in seconds, or `None` when the label is not `<n><s|m|h|d>`
    /// or the duration overflows
    pub fn seconds(&self) -> Option<u64> {
        let label = self.0.trim().to_lowercase();
        let unit_start = label.char_indices().last()?.0;
        let (amount, unit) = label.split_at(unit_start);
        let amount: u64 = amount.parse().ok()?;
        if amount == 0 {
            return None;
        }
        let unit_secs = match unit {
            "s" => 1,
            "m" => 60,
            "h" => 3_600,
            "d" => 86_400,
            _ => return None,
        };
        amount.checked_mul(unit_secs)
    }

    /// Horizon of the chart: up to 1m is short, up to 15m medium, beyond is long
    pub fn horizon(&self) -> Option<TimeframeClass> {
        self.seconds().map(|secs| match secs {
            0..=60 => TimeframeClass::Short,
            61..=900 => TimeframeClass::Medium,
            _ => TimeframeClass::Long,
        })
    }

    pub fn is_thirty_seconds(&self) -> bool {
        self.seconds() == Some(30)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Timeframe {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

/// Market venue type
///
/// Unknown labels behave as regular markets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum MarketType {
    #[default]
    Regular,
    /// Over-the-counter synthetic quotes, more prone to manufactured moves
    Otc,
}

impl MarketType {
    pub fn is_otc(&self) -> bool {
        matches!(self, MarketType::Otc)
    }
}

impl From<String> for MarketType {
    fn from(label: String) -> Self {
        match label.trim().to_lowercase().as_str() {
            "otc" => MarketType::Otc,
            _ => MarketType::Regular,
        }
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketType::Regular => write!(f, "regular"),
            MarketType::Otc => write!(f, "otc"),
        }
    }
}

/// Relative traded volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeProfile {
    High,
    #[default]
    Medium,
    Low,
}

/// Immutable per-analysis market context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketContext {
    pub timeframe: Timeframe,
    #[serde(default)]
    pub market_type: MarketType,
    /// Noise level (0 to 100)
    pub volatility: f64,
    /// Strength of the prevailing trend (0 to 100)
    pub trend_strength: f64,
    #[serde(default)]
    pub volume_profile: VolumeProfile,
}

impl MarketContext {
    pub fn new(timeframe: impl Into<String>, market_type: MarketType) -> Self {
        Self {
            timeframe: Timeframe::new(timeframe),
            market_type,
            volatility: 50.0,
            trend_strength: 50.0,
            volume_profile: VolumeProfile::Medium,
        }
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility;
        self
    }

    pub fn with_trend_strength(mut self, trend_strength: f64) -> Self {
        self.trend_strength = trend_strength;
        self
    }

    pub fn with_volume_profile(mut self, profile: VolumeProfile) -> Self {
        self.volume_profile = profile;
        self
    }

    /// Reject structurally invalid contexts (caller bugs)
    pub fn validate(&self) -> Result<()> {
        if self.timeframe.label().trim().is_empty() {
            return Err(Error::InvalidContext("timeframe must not be empty".into()));
        }

        check_percent("volatility", self.volatility)?;
        check_percent("trendStrength", self.trend_strength)?;

        Ok(())
    }
}

fn check_percent(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(Error::InvalidContext(format!(
            "{} must be within [0, 100], got {}",
            field, value
        )));
    }
    Ok(())
}
