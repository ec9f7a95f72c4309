//! Confluence decision engine
//!
//! Turns a set of normalized signals plus market context into one
//! BUY/SELL/WAIT decision with a grade, a manipulation assessment and a timing
//! window.

pub mod aggregator;
pub mod bias;
pub mod config;
pub mod grader;
pub mod manipulation;
pub mod orchestrator;
pub mod perturbation;
pub mod timing;
pub mod types;

pub use aggregator::{AggregateScores, WeightConfig, WeightedAggregator};
pub use bias::{AdaptiveBiasCorrector, BiasConfig, BiasCorrection, BiasState};
pub use config::{EngineConfig, OrchestratorConfig};
pub use grader::{ConfluenceGrader, GradeThresholds, GradingConfig};
pub use manipulation::{ManipulationAssessor, ManipulationConfig};
pub use orchestrator::{DecisionOrchestrator, Diagnostics, Evaluation, EvaluationState};
pub use perturbation::PerturbationPolicy;
pub use timing::{TimingCalculator, TimingConfig, TimingWindow};
pub use types::{
    Action, AnalysisInput, Decision, FactorStance, Grade, ManipulationAssessment,
    RiskRecommendation, RiskTier, Timing, UpstreamFactor,
};
