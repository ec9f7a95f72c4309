//! Confluence Engine Library
//!
//! Combines independently scored technical signals into one BUY/SELL/WAIT
//! decision with a quality grade, an anti-manipulation assessment and an
//! entry-timing window.

pub mod cli;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod session;
pub mod signal;

// Re-export commonly used types
pub use config::Config;
pub use context::{MarketContext, MarketType, Timeframe, VolumeProfile};
pub use engine::{
    Action, AnalysisInput, BiasState, Decision, DecisionOrchestrator, EngineConfig, Evaluation,
    Grade, ManipulationAssessment, PerturbationPolicy, RiskRecommendation, RiskTier,
};
pub use error::{Error, Result};
pub use session::SessionStore;
pub use signal::{DetectorOutput, Direction, Signal, SignalNormalizer, SignalSource, TimeframeClass};
