//! Engine configuration
//!
//! One object carries every tunable of the pipeline. Each section deserializes
//! with per-field defaults, so a partial file only overrides what it names.

use serde::{Deserialize, Serialize};

use super::aggregator::WeightConfig;
use super::bias::BiasConfig;
use super::grader::GradingConfig;
use super::manipulation::ManipulationConfig;
use super::perturbation::PerturbationPolicy;
use super::timing::TimingConfig;
use crate::error::{Error, Result};

/// Orchestrator gates and confidence shaping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Fewer signals than this short-circuit to WAIT
    #[serde(default = "default_min_signals")]
    pub min_signals: usize,

    /// Minimum |buy - sell| fraction for a directional candidate
    #[serde(default = "default_min_edge")]
    pub min_edge: f64,

    /// Fewer confluences than this force WAIT
    #[serde(default = "default_min_confluences")]
    pub min_confluences: usize,

    #[serde(default = "default_max_confidence")]
    pub max_confidence: f64,

    /// Confidence lost per manipulation score point
    #[serde(default = "default_manipulation_penalty")]
    pub manipulation_penalty: f64,

    /// Confidence reported on insufficient data
    #[serde(default = "default_insufficient_confidence")]
    pub insufficient_confidence: f64,
}

fn default_min_signals() -> usize {
    2
}
fn default_min_edge() -> f64 {
    0.10
}
fn default_min_confluences() -> usize {
    3
}
fn default_max_confidence() -> f64 {
    95.0
}
fn default_manipulation_penalty() -> f64 {
    0.2
}
fn default_insufficient_confidence() -> f64 {
    30.0
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            min_signals: default_min_signals(),
            min_edge: default_min_edge(),
            min_confluences: default_min_confluences(),
            max_confidence: default_max_confidence(),
            manipulation_penalty: default_manipulation_penalty(),
            insufficient_confidence: default_insufficient_confidence(),
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_signals == 0 {
            return Err(Error::Config("orchestrator.min_signals must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.min_edge) {
            return Err(Error::Config("orchestrator.min_edge must be within [0, 1]".into()));
        }
        if !(0.0..=100.0).contains(&self.max_confidence) {
            return Err(Error::Config(
                "orchestrator.max_confidence must be within [0, 100]".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.insufficient_confidence) {
            return Err(Error::Config(
                "orchestrator.insufficient_confidence must be within [0, 100]".into(),
            ));
        }
        if !self.manipulation_penalty.is_finite() || self.manipulation_penalty < 0.0 {
            return Err(Error::Config(
                "orchestrator.manipulation_penalty must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// Full engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub weights: WeightConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub bias: BiasConfig,
    #[serde(default)]
    pub manipulation: ManipulationConfig,
    #[serde(default)]
    pub grading: GradingConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    /// Default perturbation for sessions
    #[serde(default)]
    pub perturbation: PerturbationPolicy,
}

impl EngineConfig {
    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        self.orchestrator.validate()?;
        self.bias.validate()?;
        self.manipulation.validate()?;
        self.grading.validate()?;
        self.timing.validate()?;
        self.perturbation.validate()?;
        Ok(())
    }
}
