//! One evaluation cycle of the control loop.
//!
//! ```text
//! snapshot ─► risk engine ─► breaker report ─► Gate
//!          ├► Taylor rule ──────────────────► policy adjustments
//!          └► incentive optimizer (telemetry) ► reward/fee tuning
//! ```
//!
//! The resulting [`CycleReport`] is what callers consult before driving
//! the aggregates; its [`Gate`] is handed to any transition that starts
//! active work.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::aggregate::issuance::IssuanceAggregate;
use crate::aggregate::Gate;
use crate::collaborators::{AgencyConverter, CapmInput, CapmPricer, CapmQuote, ConversionRequest, ConversionResult};
use crate::error::EconError;
use crate::logging::{log, log_breaker_trip, obj, v_num, v_str, Domain, Level};
use crate::policy::{BehavioralTelemetry, IncentiveAdjustment, IncentiveMechanismOptimizer, TaylorRulePolicyCalculator, TaylorRuleResult};
use crate::reliability::circuit::BreakerReport;
use crate::risk::{HysteresisCounter, RiskAssessment, RiskAssessmentEngine, SharedHysteresis};
use crate::state::{EconomicSystemState, PolicyConfig};

/// Where the consecutive-high-risk-day count lives.
#[derive(Debug, Clone)]
pub enum Hysteresis {
    Owned(HysteresisCounter),
    Shared(Arc<SharedHysteresis>),
}

impl Hysteresis {
    pub fn days(&self) -> u32 {
        match self {
            Hysteresis::Owned(c) => c.days(),
            Hysteresis::Shared(c) => c.days(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub assessment: RiskAssessment,
    pub breaker: BreakerReport,
    pub policy: TaylorRuleResult,
    pub incentives: Option<IncentiveAdjustment>,
    pub gate: Gate,
}

impl CycleReport {
    pub fn is_halted(&self) -> bool {
        !self.gate.is_open()
    }
}

pub struct ControlLoop {
    engine: RiskAssessmentEngine,
    taylor: TaylorRulePolicyCalculator,
    optimizer: IncentiveMechanismOptimizer,
    hysteresis: Hysteresis,
}

impl ControlLoop {
    /// Loop with its own hysteresis counter starting at zero.
    pub fn new(cfg: &PolicyConfig) -> Result<Self, EconError> {
        Self::with_hysteresis(cfg, Hysteresis::Owned(HysteresisCounter::new()))
    }

    /// Loop recording into a counter shared with other loops.
    pub fn shared(cfg: &PolicyConfig, counter: Arc<SharedHysteresis>) -> Result<Self, EconError> {
        Self::with_hysteresis(cfg, Hysteresis::Shared(counter))
    }

    fn with_hysteresis(cfg: &PolicyConfig, hysteresis: Hysteresis) -> Result<Self, EconError> {
        cfg.validate()?;
        Ok(Self {
            engine: RiskAssessmentEngine::new(cfg),
            taylor: TaylorRulePolicyCalculator::new(cfg),
            optimizer: IncentiveMechanismOptimizer::new(cfg),
            hysteresis,
        })
    }

    pub fn consecutive_high_risk_days(&self) -> u32 {
        self.hysteresis.days()
    }

    /// Run one cycle. Records exactly one observation in the hysteresis counter.
    pub fn evaluate(
        &mut self,
        snapshot: &EconomicSystemState,
        telemetry: Option<&BehavioralTelemetry>,
    ) -> Result<CycleReport, EconError> {
        snapshot.validate()?;
        // telemetry is checked before the counter moves
        let incentives = telemetry.map(|t| self.optimizer.optimize(t)).transpose()?;

        let assessment = match &mut self.hysteresis {
            Hysteresis::Owned(counter) => self.engine.assess(snapshot, counter),
            Hysteresis::Shared(counter) => self.engine.assess_shared(snapshot, counter),
        };
        let breaker = self
            .engine
            .breaker()
            .report(snapshot, assessment.consecutive_high_risk_days);
        if breaker.tripped {
            log_breaker_trip(&breaker.reason, breaker.recovery_minutes);
        }
        let policy = self.taylor.recommend(snapshot);
        let gate = Gate::from_report(&breaker);

        log(
            Level::Info,
            Domain::System,
            "cycle",
            obj(&[
                ("overall", v_str(assessment.overall.as_str())),
                ("gate_open", json!(gate.is_open())),
                ("recommended_rate", v_num(policy.recommended_rate)),
                ("consecutive_high_risk_days", json!(assessment.consecutive_high_risk_days)),
            ]),
        );

        Ok(CycleReport { assessment, breaker, policy, incentives, gate })
    }

    /// Feed this cycle's PMP-issuance adjustment into an issuance aggregate.
    pub fn adjust_issuance(
        &self,
        issuance: &IssuanceAggregate,
        report: &CycleReport,
    ) -> Result<IssuanceAggregate, EconError> {
        issuance.apply_policy_adjustment(report.policy.pmp_issuance_adjustment)
    }

    /// PMP → PMC conversion through the external converter.
    ///
    /// Refused while the gate is halted. The converter's rate is scaled by
    /// `1 + pmc_conversion_adjustment` and the output recomputed from it.
    pub fn convert_pmp(
        &self,
        converter: &dyn AgencyConverter,
        report: &CycleReport,
        request: &ConversionRequest,
    ) -> Result<ConversionResult> {
        report.gate.ensure_open()?;
        if !request.pmp_amount.is_finite() || request.pmp_amount <= 0.0 {
            return Err(EconError::InvalidParameter { name: "pmp_amount", value: request.pmp_amount }.into());
        }
        let mut result = converter.convert(request)?;
        let scale = (1.0 + report.policy.pmc_conversion_adjustment).max(0.0);
        result.conversion_rate *= scale;
        result.pmc_output = request.pmp_amount * result.conversion_rate;
        log(
            Level::Info,
            Domain::Policy,
            "conversion",
            obj(&[
                ("pmp_amount", v_num(request.pmp_amount)),
                ("conversion_rate", v_num(result.conversion_rate)),
                ("pmc_output", v_num(result.pmc_output)),
            ]),
        );
        Ok(result)
    }

    /// PMC valuation through the external pricer. Allowed regardless of the gate.
    pub fn price_pmc(&self, pricer: &dyn CapmPricer, input: &CapmInput) -> Result<CapmQuote> {
        if !input.current_price.is_finite() || input.current_price <= 0.0 {
            return Err(EconError::InvalidParameter { name: "current_price", value: input.current_price }.into());
        }
        let quote = pricer.price(input)?;
        log(
            Level::Debug,
            Domain::Policy,
            "capm_quote",
            obj(&[
                ("fair_value", v_num(quote.fair_value)),
                ("required_return", v_num(quote.required_return)),
            ]),
        );
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::issuance::AgencyMetrics;
    use crate::collaborators::{PredictionData, PriceRecommendation};
    use crate::error::ErrorKind;
    use crate::risk::RiskLevel;
    use crate::state::sample_state;

    struct FixedConverter;

    impl AgencyConverter for FixedConverter {
        fn convert(&self, request: &ConversionRequest) -> Result<ConversionResult> {
            Ok(ConversionResult {
                pmc_output: request.pmp_amount * 0.5,
                conversion_rate: 0.5,
                agency_metrics: AgencyMetrics {
                    prediction_accuracy: request.prediction.accuracy,
                    social_learning_index: 0.5,
                    information_transparency: 0.5,
                },
            })
        }
    }

    struct FixedPricer;

    impl CapmPricer for FixedPricer {
        fn price(&self, input: &CapmInput) -> Result<CapmQuote> {
            let required = input.risk_free_rate + input.beta * input.market_risk_premium;
            Ok(CapmQuote {
                fair_value: input.current_price * 1.1,
                required_return: required,
                recommendation: PriceRecommendation::Buy,
            })
        }
    }

    fn request() -> ConversionRequest {
        ConversionRequest {
            pmp_amount: 100.0,
            prediction: PredictionData { accuracy: 0.8, predictions_made: 20 },
            participants: 50,
        }
    }

    #[test]
    fn test_calm_cycle_is_open() {
        let mut cl = ControlLoop::new(&PolicyConfig::default()).unwrap();
        let report = cl.evaluate(&sample_state(), None).unwrap();
        assert_eq!(report.assessment.overall, RiskLevel::Low);
        assert!(report.gate.is_open());
        assert!(report.incentives.is_none());
        assert_eq!(cl.consecutive_high_risk_days(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let cfg = PolicyConfig { max_consecutive_high_risk_days: 0, ..PolicyConfig::default() };
        assert!(ControlLoop::new(&cfg).is_err());
    }

    #[test]
    fn test_invalid_snapshot_does_not_touch_counter() {
        let mut cl = ControlLoop::new(&PolicyConfig::default()).unwrap();
        let bad = EconomicSystemState { liquidity_ratio: f64::NAN, ..sample_state() };
        assert!(cl.evaluate(&bad, None).is_err());
        assert_eq!(cl.consecutive_high_risk_days(), 0);
    }

    #[test]
    fn test_telemetry_runs_optimizer() {
        let mut cl = ControlLoop::new(&PolicyConfig::default()).unwrap();
        let t = BehavioralTelemetry { participation_rate: 0.2, average_contribution: 100.0 };
        let report = cl.evaluate(&sample_state(), Some(&t)).unwrap();
        assert_eq!(report.incentives.unwrap().adjusted_reward_rate, 1.5);
    }

    #[test]
    fn test_conversion_refused_when_halted() {
        let mut cl = ControlLoop::new(&PolicyConfig::default()).unwrap();
        let stressed = EconomicSystemState { liquidity_ratio: 0.01, ..sample_state() };
        let report = cl.evaluate(&stressed, None).unwrap();
        assert!(report.is_halted());
        let err = cl.convert_pmp(&FixedConverter, &report, &request()).unwrap_err();
        let econ = err.downcast_ref::<EconError>().unwrap();
        assert_eq!(econ.kind(), ErrorKind::Halted);
    }

    #[test]
    fn test_conversion_scaled_by_policy() {
        let mut cl = ControlLoop::new(&PolicyConfig::default()).unwrap();
        // output gap 0.05 -> 0.03 beyond the band -> pmc adjustment -0.3
        let hot = EconomicSystemState { output_gap: 0.05, ..sample_state() };
        let report = cl.evaluate(&hot, None).unwrap();
        assert!(report.gate.is_open());
        let adj = report.policy.pmc_conversion_adjustment;
        assert!((adj + 0.3).abs() < 1e-9);
        let result = cl.convert_pmp(&FixedConverter, &report, &request()).unwrap();
        assert!((result.conversion_rate - 0.5 * (1.0 + adj)).abs() < 1e-9);
        assert!((result.pmc_output - 100.0 * result.conversion_rate).abs() < 1e-9);
    }

    #[test]
    fn test_pricing_allowed_and_validated() {
        let cl = ControlLoop::new(&PolicyConfig::default()).unwrap();
        let input = CapmInput { beta: 1.2, risk_free_rate: 0.02, market_risk_premium: 0.05, current_price: 10.0 };
        let quote = cl.price_pmc(&FixedPricer, &input).unwrap();
        assert!((quote.required_return - 0.08).abs() < 1e-12);
        let bad = CapmInput { current_price: 0.0, ..input };
        assert!(cl.price_pmc(&FixedPricer, &bad).is_err());
    }

    #[test]
    fn test_shared_counter_spans_loops() {
        let counter = Arc::new(SharedHysteresis::new());
        let cfg = PolicyConfig::default();
        let mut a = ControlLoop::shared(&cfg, counter.clone()).unwrap();
        let mut b = ControlLoop::shared(&cfg, counter.clone()).unwrap();
        let stressed = EconomicSystemState { liquidity_ratio: 0.03, ..sample_state() };
        a.evaluate(&stressed, None).unwrap();
        b.evaluate(&stressed, None).unwrap();
        assert_eq!(counter.days(), 2);
        assert_eq!(a.consecutive_high_risk_days(), 2);
    }
}
