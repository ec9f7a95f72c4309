//! Decision Orchestrator
//!
//! Runs one analysis through the pipeline:
//! COLLECTING -> AGGREGATING -> BIAS_ADJUSTING -> ASSESSING_RISK -> GRADING -> TIMING -> FINALIZED
//!
//! Every call produces exactly one decision and exactly one bias state update.
//! Degraded inputs end as WAIT decisions with reasoning, never as errors.

use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

use super::aggregator::{AggregateScores, WeightedAggregator};
use super::bias::{AdaptiveBiasCorrector, BiasCorrection, BiasState};
use super::config::{EngineConfig, OrchestratorConfig};
use super::grader::{ConfluenceGrader, ConfluenceTally, GradingInput};
use super::manipulation::ManipulationAssessor;
use super::perturbation::PerturbationPolicy;
use super::timing::TimingCalculator;
use super::types::{Action, AnalysisInput, Decision, Grade, ManipulationAssessment};
use crate::context::MarketContext;
use crate::error::{Error, Result};
use crate::signal::{Direction, Signal};

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationState {
    Collecting,
    Aggregating,
    BiasAdjusting,
    AssessingRisk,
    Grading,
    Timing,
    Finalized,
}

impl fmt::Display for EvaluationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EvaluationState::Collecting => "COLLECTING",
            EvaluationState::Aggregating => "AGGREGATING",
            EvaluationState::BiasAdjusting => "BIAS_ADJUSTING",
            EvaluationState::AssessingRisk => "ASSESSING_RISK",
            EvaluationState::Grading => "GRADING",
            EvaluationState::Timing => "TIMING",
            EvaluationState::Finalized => "FINALIZED",
        };
        write!(f, "{}", name)
    }
}

/// Intermediate values behind a decision
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub state_path: Vec<EvaluationState>,
    pub raw_scores: AggregateScores,
    pub adjusted_scores: AggregateScores,
    pub bias_correction: BiasCorrection,
    /// Action before risk, grade and confluence gates
    pub candidate: Action,
    pub candidate_confidence: f64,
    pub grade_score: f64,
}

/// Result of one evaluation
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub decision: Decision,
    pub manipulation: ManipulationAssessment,
    pub bias_state: BiasState,
    pub diagnostics: Diagnostics,
}

/// Tracks the visited states of one run
struct StateTrace(Vec<EvaluationState>);

impl StateTrace {
    fn start() -> Self {
        debug!(state = %EvaluationState::Collecting, "Evaluation started");
        Self(vec![EvaluationState::Collecting])
    }

    fn enter(&mut self, state: EvaluationState) {
        debug!(state = %state, "Evaluation state");
        self.0.push(state);
    }

    fn finish(mut self) -> Vec<EvaluationState> {
        self.enter(EvaluationState::Finalized);
        self.0
    }
}

/// The decision orchestrator
#[derive(Debug, Clone)]
pub struct DecisionOrchestrator {
    config: OrchestratorConfig,
    aggregator: WeightedAggregator,
    corrector: AdaptiveBiasCorrector,
    assessor: ManipulationAssessor,
    grader: ConfluenceGrader,
    timing: TimingCalculator,
}

impl DecisionOrchestrator {
    /// Build an orchestrator, rejecting invalid configuration
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            aggregator: WeightedAggregator::new(&config.weights),
            corrector: AdaptiveBiasCorrector::new(config.bias),
            assessor: ManipulationAssessor::new(config.manipulation),
            grader: ConfluenceGrader::new(config.grading),
            timing: TimingCalculator::new(config.timing),
            config: config.orchestrator,
        })
    }

    /// Evaluate signals without exploratory perturbation
    pub fn evaluate_signals(
        &self,
        signals: &[Signal],
        context: &MarketContext,
        bias: &BiasState,
    ) -> Result<Evaluation> {
        let input = AnalysisInput::new(signals.to_vec(), context.clone());
        self.evaluate(&input, bias, &PerturbationPolicy::None)
    }

    /// Evaluate one analysis
    ///
    /// Fails only on an invalid market context or perturbation policy. The
    /// returned bias state replaces the caller's.
    pub fn evaluate(
        &self,
        input: &AnalysisInput,
        bias: &BiasState,
        perturbation: &PerturbationPolicy,
    ) -> Result<Evaluation> {
        let context = &input.context;
        let signals = input.signals.as_slice();
        context.validate()?;
        perturbation.validate()?;

        let mut trace = StateTrace::start();
        let bias_view = bias.for_market(context.market_type);

        // === Aggregating ===
        trace.enter(EvaluationState::Aggregating);
        let raw_scores = self.aggregator.aggregate(signals, context);

        if raw_scores.is_empty() || signals.len() < self.config.min_signals {
            let reason = Error::InsufficientData {
                available: signals.len(),
                required: self.config.min_signals,
            };
            debug!(error = %reason, total_weight = raw_scores.total_weight, "Short-circuiting to WAIT");
            return Ok(self.insufficient(input, &bias_view, raw_scores, trace));
        }

        // === Bias adjusting ===
        trace.enter(EvaluationState::BiasAdjusting);
        let correction = self.corrector.correction(&bias_view, perturbation);
        let adjusted = correction.apply(&raw_scores);

        let buy = adjusted.buy_fraction();
        let sell = adjusted.sell_fraction();
        let mut reasoning = vec![format!(
            "weighted signals: buy {:.0}% vs sell {:.0}% across {} signals",
            buy * 100.0,
            sell * 100.0,
            raw_scores.signal_count
        )];
        if !correction.is_identity() {
            reasoning.push(format!(
                "{} streak of {}: streak side x{:.2}, opposite side x{:.2}",
                correction.streak_direction, correction.streak, correction.dampening, correction.boost
            ));
        }

        let (direction, dominant) = if (buy - sell).abs() < self.config.min_edge {
            reasoning.push("no directional edge".to_string());
            (Direction::Neutral, buy.max(sell))
        } else if buy > sell {
            (Direction::Up, buy)
        } else {
            (Direction::Down, sell)
        };
        let candidate = Action::from_direction(direction);

        // === Assessing risk ===
        trace.enter(EvaluationState::AssessingRisk);
        let manipulation = self.assessor.assess(signals, context, candidate);

        let candidate_confidence = (dominant * raw_scores.mean_confidence
            - self.config.manipulation_penalty * manipulation.score)
            .min(self.config.max_confidence)
            .clamp(0.0, 100.0);

        let mut action = candidate;
        let mut confidence = candidate_confidence;

        if !manipulation.suspicious_factors.is_empty() {
            reasoning.push(format!(
                "manipulation score {:.0} ({}): {}",
                manipulation.score,
                manipulation.risk_tier,
                manipulation.suspicious_factors.join("; ")
            ));
        }
        if manipulation.is_abort() {
            warn!(
                score = manipulation.score,
                candidate = %candidate,
                "Manipulation risk too high, aborting trade"
            );
            action = Action::Wait;
            confidence /= 2.0;
            reasoning.push(format!("aborted {} on manipulation risk", candidate));
        }

        // === Grading ===
        trace.enter(EvaluationState::Grading);
        let tally = self.grader.collect(&GradingInput {
            direction,
            signals,
            scores: &adjusted,
            context,
            factors: &input.factors,
            manipulation: &manipulation,
        });
        let report = self.grader.grade(&tally, confidence, context, manipulation.score);
        reasoning.push(format!(
            "grade {} (score {:.0}) with {} confluences and {} contraindications",
            report.grade,
            report.score,
            tally.confluence_count(),
            tally.contraindication_count()
        ));

        let gate = self.grader.gate(report.grade, action, confidence);
        action = gate.action;
        confidence = gate.confidence;
        reasoning.extend(gate.reason);

        if !action.is_wait() && tally.confluence_count() < self.config.min_confluences {
            reasoning.push(format!(
                "only {} confluences, {} required",
                tally.confluence_count(),
                self.config.min_confluences
            ));
            action = Action::Wait;
        }

        // === Timing ===
        trace.enter(EvaluationState::Timing);
        let optimal = self
            .timing
            .optimal_entry(signals, action.direction(), input.optimal_entry);
        let timing = self.timing.calculate(
            action,
            confidence,
            tally.confluence_count(),
            optimal,
            context,
        );

        let ConfluenceTally {
            confluences,
            contraindications,
        } = tally;

        let decision = Decision {
            action,
            confidence: confidence.clamp(0.0, 100.0),
            grade: report.grade,
            confluence_count: confluences.len(),
            confluences,
            contraindications,
            timing,
            expected_success_rate: report.expected_success_rate,
            reasoning,
        };

        let state_path = trace.finish();
        let bias_state = bias_view.record(decision.action, context.market_type);

        info!(
            action = %decision.action,
            confidence = decision.confidence,
            grade = %decision.grade,
            confluences = decision.confluence_count,
            manipulation = manipulation.score,
            timeframe = %context.timeframe,
            "Decision finalized"
        );

        Ok(Evaluation {
            decision,
            manipulation,
            bias_state,
            diagnostics: Diagnostics {
                state_path,
                raw_scores,
                adjusted_scores: adjusted,
                bias_correction: correction,
                candidate,
                candidate_confidence,
                grade_score: report.score,
            },
        })
    }

    /// WAIT outcome for inputs too thin to judge
    fn insufficient(
        &self,
        input: &AnalysisInput,
        bias: &BiasState,
        raw_scores: AggregateScores,
        trace: StateTrace,
    ) -> Evaluation {
        let context = &input.context;
        let manipulation = self.assessor.assess(&input.signals, context, Action::Wait);
        let confidence = self.config.insufficient_confidence;
        let report = self.grader.grade(
            &ConfluenceTally::default(),
            confidence,
            context,
            manipulation.score,
        );

        let decision = Decision {
            action: Action::Wait,
            confidence,
            grade: Grade::F,
            confluence_count: 0,
            confluences: Vec::new(),
            contraindications: Vec::new(),
            timing: self.timing.calculate(Action::Wait, confidence, 0, false, context),
            expected_success_rate: report.expected_success_rate,
            reasoning: vec!["insufficient signal data".to_string()],
        };

        info!(
            signals = input.signals.len(),
            manipulation = manipulation.score,
            "Decision finalized on insufficient data"
        );

        Evaluation {
            decision,
            manipulation,
            bias_state: bias.record(Action::Wait, context.market_type),
            diagnostics: Diagnostics {
                state_path: trace.finish(),
                adjusted_scores: raw_scores.clone(),
                raw_scores,
                bias_correction: BiasCorrection::identity(),
                candidate: Action::Wait,
                candidate_confidence: confidence,
                grade_score: report.score,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{MarketType, VolumeProfile};
    use crate::engine::bias::DirectionCounters;
    use crate::engine::types::{RiskRecommendation, RiskTier, UpstreamFactor};
    use crate::signal::{SignalSource, TimeframeClass};

    fn orchestrator() -> DecisionOrchestrator {
        DecisionOrchestrator::new(EngineConfig::default()).unwrap()
    }

    fn short(source: SignalSource, direction: Direction, strength: f64, confidence: f64) -> Signal {
        Signal::new(source, direction, strength, confidence, TimeframeClass::Short)
    }

    /// Five agreeing short-horizon signals on a calm trending 1m chart
    fn scenario_a() -> (Vec<Signal>, MarketContext) {
        let signals = [
            SignalSource::Trendline,
            SignalSource::ChartPattern,
            SignalSource::MovingAverage,
            SignalSource::Momentum,
            SignalSource::Candlestick,
        ]
        .into_iter()
        .map(|source| short(source, Direction::Up, 80.0, 90.0))
        .collect();

        let context = MarketContext::new("1m", MarketType::Regular)
            .with_volatility(20.0)
            .with_trend_strength(85.0);
        (signals, context)
    }

    fn streak(up: u32) -> BiasState {
        BiasState {
            consecutive_by_direction: DirectionCounters { up, down: 0, neutral: 0 },
            market_type: Some(MarketType::Regular),
            evaluations: up as u64,
        }
    }

    #[test]
    fn test_scenario_clean_confluence_buys() {
        let (signals, context) = scenario_a();
        let result = orchestrator()
            .evaluate_signals(&signals, &context, &BiasState::new())
            .unwrap();

        let decision = &result.decision;
        assert_eq!(decision.action, Action::Buy);
        assert!(matches!(decision.grade, Grade::A | Grade::B));
        assert_eq!(result.manipulation.risk_tier, RiskTier::Low);
        assert_eq!(result.manipulation.recommendation, RiskRecommendation::Proceed);
        assert_eq!(decision.confluence_count, 5);
        assert!((decision.confidence - 90.0).abs() < 1e-9);
        assert!(decision.timing.validity_seconds > 0.0);
        assert_eq!(decision.timing.expiry_seconds, 120.0);
        assert_eq!(result.bias_state.consecutive_by_direction.up, 1);
        assert_eq!(
            result.diagnostics.state_path,
            vec![
                EvaluationState::Collecting,
                EvaluationState::Aggregating,
                EvaluationState::BiasAdjusting,
                EvaluationState::AssessingRisk,
                EvaluationState::Grading,
                EvaluationState::Timing,
                EvaluationState::Finalized,
            ]
        );
    }

    #[test]
    fn test_scenario_even_split_waits() {
        let signals = vec![
            Signal::new(SignalSource::ChartPattern, Direction::Up, 90.0, 80.0, TimeframeClass::Medium),
            Signal::new(SignalSource::Breakout, Direction::Up, 90.0, 80.0, TimeframeClass::Medium),
            Signal::new(SignalSource::Harmonic, Direction::Down, 90.0, 80.0, TimeframeClass::Medium),
            Signal::new(SignalSource::MovingAverage, Direction::Down, 90.0, 80.0, TimeframeClass::Medium),
        ];
        let context = MarketContext::new("5m", MarketType::Regular);
        let result = orchestrator()
            .evaluate_signals(&signals, &context, &BiasState::new())
            .unwrap();

        assert_eq!(result.decision.action, Action::Wait);
        assert!(matches!(
            result.manipulation.risk_tier,
            RiskTier::Medium | RiskTier::High
        ));
        assert_eq!(result.bias_state.consecutive_by_direction.neutral, 1);
    }

    #[test]
    fn test_scenario_otc_reversal_flagged() {
        let signals = vec![Signal::down(SignalSource::Reversal, 95.0, 85.0)];
        let context = MarketContext::new("1m", MarketType::Otc);
        let result = orchestrator()
            .evaluate_signals(&signals, &context, &BiasState::new())
            .unwrap();

        assert!(result.manipulation.score >= 60.0);
        assert!(matches!(
            result.manipulation.recommendation,
            RiskRecommendation::Caution | RiskRecommendation::Abort
        ));
        assert_eq!(result.decision.action, Action::Wait);
    }

    #[test]
    fn test_empty_input_waits() {
        let context = MarketContext::new("1m", MarketType::Regular);
        let result = orchestrator()
            .evaluate_signals(&[], &context, &BiasState::new())
            .unwrap();

        assert_eq!(result.decision.action, Action::Wait);
        assert_eq!(result.decision.confidence, 30.0);
        assert_eq!(result.decision.reasoning, vec!["insufficient signal data".to_string()]);
        assert_eq!(result.decision.timing.validity_seconds, 90.0);
        assert_eq!(result.bias_state.consecutive_by_direction.neutral, 1);
        assert_eq!(
            result.diagnostics.state_path,
            vec![
                EvaluationState::Collecting,
                EvaluationState::Aggregating,
                EvaluationState::Finalized,
            ]
        );
    }

    #[test]
    fn test_zero_weight_short_circuits() {
        let signals = vec![
            Signal::up(SignalSource::Trendline, 90.0, 0.0),
            Signal::up(SignalSource::Breakout, 90.0, 0.0),
        ];
        let context = MarketContext::new("1m", MarketType::Regular);
        let result = orchestrator()
            .evaluate_signals(&signals, &context, &BiasState::new())
            .unwrap();
        assert_eq!(result.decision.reasoning, vec!["insufficient signal data".to_string()]);
    }

    #[test]
    fn test_deterministic() {
        let (signals, context) = scenario_a();
        let engine = orchestrator();
        let bias = streak(4);
        let first = engine.evaluate_signals(&signals, &context, &bias).unwrap();
        let second = engine.evaluate_signals(&signals, &context, &bias).unwrap();
        assert_eq!(first.decision, second.decision);
        assert_eq!(first.manipulation, second.manipulation);
        assert_eq!(first.bias_state, second.bias_state);
    }

    #[test]
    fn test_seeded_perturbation_is_reproducible() {
        let (signals, context) = scenario_a();
        let engine = orchestrator();
        let input = AnalysisInput::new(signals, context);
        let policy = PerturbationPolicy::seeded(11, 0.1);

        let first = engine.evaluate(&input, &streak(5), &policy).unwrap();
        let second = engine.evaluate(&input, &streak(5), &policy).unwrap();
        assert_eq!(first.decision, second.decision);
        assert_eq!(
            first.diagnostics.bias_correction,
            second.diagnostics.bias_correction
        );
    }

    #[test]
    fn test_bounds_hold_under_extremes() {
        let engine = orchestrator();
        let context = MarketContext::new("30s", MarketType::Otc)
            .with_volatility(100.0)
            .with_trend_strength(0.0)
            .with_volume_profile(VolumeProfile::Low);
        let signals: Vec<Signal> = (0..12)
            .map(|i| {
                let dir = if i % 2 == 0 { Direction::Up } else { Direction::Down };
                Signal::new(SignalSource::Custom(format!("d{}", i)), dir, 100.0, 100.0, TimeframeClass::Short)
            })
            .collect();

        let result = engine.evaluate_signals(&signals, &context, &streak(20)).unwrap();
        let d = &result.decision;
        assert!((0.0..=100.0).contains(&d.confidence));
        assert!((0.0..=100.0).contains(&d.expected_success_rate));
        assert!((0.0..=100.0).contains(&result.manipulation.score));
    }

    #[test]
    fn test_low_grade_forces_wait() {
        // Two agreeing signals on a choppy 30s chart grade poorly
        let signals = vec![
            short(SignalSource::Candlestick, Direction::Up, 70.0, 70.0),
            short(SignalSource::Momentum, Direction::Up, 70.0, 70.0),
        ];
        let context = MarketContext::new("30s", MarketType::Regular)
            .with_volatility(80.0)
            .with_trend_strength(40.0);
        let result = orchestrator()
            .evaluate_signals(&signals, &context, &BiasState::new())
            .unwrap();

        assert_eq!(result.diagnostics.candidate, Action::Buy);
        assert!(!result.decision.grade.allows_trade());
        assert_eq!(result.decision.action, Action::Wait);
        assert!(result
            .decision
            .reasoning
            .iter()
            .any(|r| r.contains(&format!("grade {}", result.decision.grade))));
        assert!(result.decision.confidence <= result.diagnostics.candidate_confidence);
    }

    #[test]
    fn test_abort_forces_wait() {
        // Unanimous short-term buying into strong long-term selling with a hard reversal
        let signals = vec![
            short(SignalSource::Candlestick, Direction::Up, 95.0, 95.0),
            short(SignalSource::Momentum, Direction::Up, 95.0, 95.0),
            short(SignalSource::PriceAction, Direction::Up, 95.0, 95.0),
            short(SignalSource::Breakout, Direction::Up, 95.0, 95.0),
            Signal::new(SignalSource::Trendline, Direction::Down, 90.0, 40.0, TimeframeClass::Long),
            Signal::new(SignalSource::Reversal, Direction::Down, 100.0, 40.0, TimeframeClass::Medium),
            short(SignalSource::Volume, Direction::Up, 95.0, 90.0),
        ];
        let context = MarketContext::new("1m", MarketType::Regular).with_volatility(20.0);
        let result = orchestrator()
            .evaluate_signals(&signals, &context, &BiasState::new())
            .unwrap();

        assert_eq!(result.diagnostics.candidate, Action::Buy);
        assert_eq!(result.manipulation.recommendation, RiskRecommendation::Abort);
        assert_eq!(result.decision.action, Action::Wait);
        assert!(result.decision.reasoning.iter().any(|r| r.starts_with("aborted BUY")));
    }

    #[test]
    fn test_bias_never_raises_streak_confidence() {
        let (signals, context) = scenario_a();
        let engine = orchestrator();

        let mut previous = f64::MAX;
        for run in 0..10 {
            let result = engine.evaluate_signals(&signals, &context, &streak(run)).unwrap();
            let confidence = result.diagnostics.candidate_confidence;
            assert!(confidence <= previous + 1e-9, "run {} raised confidence", run);
            previous = confidence;
        }
    }

    #[test]
    fn test_streak_dampens_and_records() {
        let (signals, context) = scenario_a();
        let engine = orchestrator();

        let fresh = engine.evaluate_signals(&signals, &context, &streak(0)).unwrap();
        let long = engine.evaluate_signals(&signals, &context, &streak(7)).unwrap();
        assert!(fresh.diagnostics.bias_correction.is_identity());
        assert_eq!(long.diagnostics.bias_correction.dampening, 0.5);
        assert!((long.diagnostics.candidate_confidence - 45.0).abs() < 1e-9);

        // Dampened confidence drops the setup to grade D, which breaks the streak
        assert_eq!(long.decision.grade, Grade::D);
        assert_eq!(long.decision.action, Action::Wait);
        assert_eq!(long.bias_state.consecutive_by_direction.up, 0);
        assert_eq!(long.bias_state.consecutive_by_direction.neutral, 1);
    }

    #[test]
    fn test_min_confluence_gate() {
        let mut config = EngineConfig::default();
        config.orchestrator.min_confluences = 6;
        let engine = DecisionOrchestrator::new(config).unwrap();

        let (signals, context) = scenario_a();
        let result = engine.evaluate_signals(&signals, &context, &BiasState::new()).unwrap();
        assert_eq!(result.decision.action, Action::Wait);
        assert!(result
            .decision
            .reasoning
            .iter()
            .any(|r| r.contains("6 required")));
    }

    #[test]
    fn test_factors_feed_confluences() {
        let (signals, context) = scenario_a();
        let input = AnalysisInput::new(signals, context)
            .with_factors(vec![
                UpstreamFactor::confirming("clean retest"),
                UpstreamFactor::contradicting("news in 2 minutes"),
            ])
            .with_optimal_entry(true);
        let result = orchestrator()
            .evaluate(&input, &BiasState::new(), &PerturbationPolicy::None)
            .unwrap();

        assert!(result.decision.confluences.contains(&"clean retest".to_string()));
        assert!(result
            .decision
            .contraindications
            .contains(&"news in 2 minutes".to_string()));
        assert!(result.decision.timing.enter_now || result.decision.action == Action::Wait);
    }

    #[test]
    fn test_invalid_context_fails_fast() {
        let (signals, _) = scenario_a();
        let context = MarketContext::new("1m", MarketType::Regular).with_volatility(150.0);
        let err = orchestrator()
            .evaluate_signals(&signals, &context, &BiasState::new())
            .unwrap_err();
        assert!(err.is_caller_bug());
    }

    #[test]
    fn test_oversized_timeframe_is_treated_as_unknown() {
        let (signals, _) = scenario_a();
        let context = MarketContext::new("300000000000000d", MarketType::Regular)
            .with_volatility(20.0)
            .with_trend_strength(85.0);
        assert_eq!(
            WeightedAggregator::timeframe_multiplier(TimeframeClass::Short, &context),
            1.0
        );

        let result = orchestrator()
            .evaluate_signals(&signals, &context, &BiasState::new())
            .unwrap();
        assert!((0.0..=100.0).contains(&result.decision.confidence));
        assert_eq!(result.bias_state.evaluations, 1);
    }

    #[test]
    fn test_invalid_perturbation_is_rejected() {
        let (signals, context) = scenario_a();
        let input = AnalysisInput::new(signals, context);
        let engine = orchestrator();

        for policy in [
            PerturbationPolicy::seeded(1, f64::NAN),
            PerturbationPolicy::seeded(1, f64::INFINITY),
            PerturbationPolicy::fixed_table(vec![]),
        ] {
            let err = engine.evaluate(&input, &streak(3), &policy).unwrap_err();
            assert!(matches!(err, Error::Config(_)));
        }
    }

    #[test]
    fn test_sequential_buys_never_raise_confidence() {
        let (signals, context) = scenario_a();
        let engine = orchestrator();

        let mut bias = BiasState::new();
        let mut runs = Vec::new();
        for _ in 0..5 {
            let result = engine.evaluate_signals(&signals, &context, &bias).unwrap();
            bias = result.bias_state.clone();
            runs.push(result);
        }

        // Runs 1 to 3 see streaks of 0 to 2, below the threshold
        assert!(runs[..3]
            .iter()
            .all(|r| r.diagnostics.bias_correction.dampening == 1.0));
        assert!(runs[..4].iter().all(|r| r.decision.action == Action::Buy));

        let third = &runs[2].diagnostics;
        let fifth = &runs[4].diagnostics;
        assert!((fifth.bias_correction.dampening - 0.8).abs() < 1e-9);
        assert!(fifth.bias_correction.dampening <= third.bias_correction.dampening);
        assert!(fifth.candidate_confidence <= third.candidate_confidence);
        assert!(runs[4].decision.confidence <= runs[2].decision.confidence);
        assert_eq!(bias.evaluations, 5);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.timing.table.clear();
        assert!(DecisionOrchestrator::new(config).is_err());
    }
}
