//! CLI command implementations

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::context::MarketContext;
use crate::engine::{
    Action, AnalysisInput, BiasState, DecisionOrchestrator, Evaluation, UpstreamFactor,
};
use crate::session::SessionStore;
use crate::signal::{DetectorOutput, Signal, SignalNormalizer};

/// Session used when the caller does not name one
const DEFAULT_SESSION: &str = "cli";

/// One analysis request as read from disk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    /// Raw detector outputs, normalized before evaluation
    #[serde(default)]
    pub detectors: Vec<DetectorOutput>,
    /// Already-normalized signals
    #[serde(default)]
    pub signals: Vec<Signal>,
    pub context: MarketContext,
    #[serde(default)]
    pub factors: Vec<UpstreamFactor>,
    #[serde(default)]
    pub optimal_entry: Option<bool>,
}

impl AnalysisRequest {
    /// Normalize detector outputs and merge them with ready signals
    pub fn into_input(self, normalizer: &SignalNormalizer) -> AnalysisInput {
        let mut signals = normalizer.normalize(&self.detectors);
        signals.extend(self.signals);

        AnalysisInput {
            signals,
            context: self.context,
            factors: self.factors,
            optimal_entry: self.optimal_entry,
        }
    }
}

/// Output of one evaluation
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    session: &'a str,
    #[serde(flatten)]
    evaluation: &'a Evaluation,
}

fn build_store(config: &Config) -> Result<SessionStore> {
    let orchestrator = DecisionOrchestrator::new(config.engine.clone())
        .context("Failed to build decision engine")?;
    Ok(SessionStore::new(
        Arc::new(orchestrator),
        config.engine.perturbation.clone(),
        config.session.max_sessions,
    ))
}

fn read_bias(path: &Path) -> Result<BiasState> {
    if !path.exists() {
        info!(path = %path.display(), "No bias file yet, starting fresh");
        return Ok(BiasState::new());
    }
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read bias file {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("Invalid bias file {}", path.display()))
}

/// Evaluate a single request file
pub async fn evaluate(
    config: &Config,
    input: &Path,
    session: Option<&str>,
    bias_file: Option<&Path>,
) -> Result<()> {
    let data = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let request: AnalysisRequest = serde_json::from_str(&data)
        .with_context(|| format!("Invalid analysis request in {}", input.display()))?;

    let store = build_store(config)?;
    let session = session.unwrap_or(DEFAULT_SESSION);
    match bias_file {
        Some(path) => store.restore(session, read_bias(path)?).await?,
        None => {
            store.open_named(session)?;
        }
    }

    let analysis = request.into_input(&SignalNormalizer::new());
    let evaluation = store.evaluate(session, &analysis).await?;

    if let Some(path) = bias_file {
        let bias = serde_json::to_string_pretty(&evaluation.bias_state)?;
        std::fs::write(path, bias)
            .with_context(|| format!("Failed to write bias file {}", path.display()))?;
    }

    let report = Report {
        session,
        evaluation: &evaluation,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Replay a JSON-lines file of requests through one session
pub async fn replay(config: &Config, input: &Path, session: Option<&str>) -> Result<()> {
    let data = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let store = build_store(config)?;
    let session = session.unwrap_or(DEFAULT_SESSION);
    store.open_named(session)?;
    let normalizer = SignalNormalizer::new();

    let (mut buys, mut sells, mut waits, mut skipped) = (0usize, 0usize, 0usize, 0usize);

    for (line_no, line) in data.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let request: AnalysisRequest = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                warn!(line = line_no + 1, error = %e, "Skipping malformed request");
                skipped += 1;
                continue;
            }
        };

        let evaluation = match store.evaluate(session, &request.into_input(&normalizer)).await {
            Ok(ev) => ev,
            Err(e) if e.is_caller_bug() => {
                warn!(line = line_no + 1, error = %e, "Skipping invalid request");
                skipped += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        match evaluation.decision.action {
            Action::Buy => buys += 1,
            Action::Sell => sells += 1,
            Action::Wait => waits += 1,
        }

        let report = Report {
            session,
            evaluation: &evaluation,
        };
        println!("{}", serde_json::to_string(&report)?);
    }

    info!(buys, sells, waits, skipped, session, "Replay complete");
    Ok(())
}

/// Print the effective configuration
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.display()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalSource;

    #[test]
    fn test_request_parsing_and_normalization() {
        let json = r#"{
            "detectors": [
                {"source": "trendline", "direction": "bullish", "strength": 0.8, "confidence": 0.9, "scale": "unit"},
                {"source": "rsi", "direction": "call", "strength": 70, "confidence": 65}
            ],
            "signals": [
                {"source": "volume", "direction": "up", "strength": 60, "confidence": 70, "timeframeClass": "short"}
            ],
            "context": {"timeframe": "1m", "marketType": "otc", "volatility": 30, "trendStrength": 70},
            "factors": [{"label": "clean retest", "stance": "confirming"}]
        }"#;

        let request: AnalysisRequest = serde_json::from_str(json).unwrap();
        let input = request.into_input(&SignalNormalizer::new());

        assert_eq!(input.signals.len(), 3);
        assert_eq!(input.signals[0].source, SignalSource::Trendline);
        assert_eq!(input.signals[0].strength, 80.0);
        assert_eq!(input.signals[1].source, SignalSource::Momentum);
        assert_eq!(input.signals[2].source, SignalSource::Volume);
        assert!(input.context.market_type.is_otc());
        assert_eq!(input.factors.len(), 1);
        assert!(input.optimal_entry.is_none());
    }

    #[tokio::test]
    async fn test_evaluate_persists_bias_file() {
        let dir = tempfile::tempdir().unwrap();
        let request_path = dir.path().join("request.json");
        let bias_path = dir.path().join("bias.json");

        std::fs::write(
            &request_path,
            r#"{"signals": [], "context": {"timeframe": "1m", "volatility": 20, "trendStrength": 50}}"#,
        )
        .unwrap();

        let config = Config::default();
        evaluate(&config, &request_path, None, Some(&bias_path)).await.unwrap();
        evaluate(&config, &request_path, None, Some(&bias_path)).await.unwrap();

        let bias: BiasState =
            serde_json::from_str(&std::fs::read_to_string(&bias_path).unwrap()).unwrap();
        assert_eq!(bias.consecutive_by_direction.neutral, 2);
        assert_eq!(bias.evaluations, 2);
    }

    #[tokio::test]
    async fn test_replay_skips_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"signals": [], "context": {"timeframe": "1m", "volatility": 20, "trendStrength": 50}}"#,
                "\n",
                "not json\n",
                "\n",
                r#"{"signals": [], "context": {"timeframe": "1m", "volatility": 500, "trendStrength": 50}}"#,
                "\n",
            ),
        )
        .unwrap();

        assert!(replay(&Config::default(), &path, Some("test")).await.is_ok());
    }
}
