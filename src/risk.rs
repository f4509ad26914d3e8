//! Systemic risk scoring with cross-call hysteresis.
//!
//! Four dimensions are scored independently by threshold ladders and folded
//! into an overall level. The consecutive-high-risk-day counter is owned by
//! the caller ([`HysteresisCounter`]) or shared behind a mutex
//! ([`SharedHysteresis`]); it is the only mutable state the engine touches.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logging::log_assessment;
use crate::reliability::circuit::CircuitBreaker;
use crate::state::{EconomicSystemState, PolicyConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }

    /// Severity in [0, 1] attached to mitigation actions
    pub fn severity(&self) -> f64 {
        match self {
            RiskLevel::Low => 0.0,
            RiskLevel::Medium => 0.4,
            RiskLevel::High => 0.7,
            RiskLevel::Critical => 1.0,
        }
    }

    pub fn is_high(&self) -> bool {
        matches!(self, RiskLevel::High | RiskLevel::Critical)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MitigationType {
    InjectLiquidity,
    TightenIssuance,
    DampenSpeculation,
    ThrottleIssuance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MitigationAction {
    pub action_type: MitigationType,
    pub severity: f64,
    pub description: String,
    pub expected_impact: String,
}

/// Result of one assessment. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub overall: RiskLevel,
    pub liquidity: RiskLevel,
    pub inflation: RiskLevel,
    pub bubble: RiskLevel,
    pub systemic: RiskLevel,
    pub recommendations: Vec<String>,
    pub circuit_breaker_triggered: bool,
    pub mitigation_actions: Vec<MitigationAction>,
    /// Counter value after this assessment was recorded
    pub consecutive_high_risk_days: u32,
    pub assessed_at: DateTime<Utc>,
}

// =============================================================================
// Hysteresis
// =============================================================================

/// Consecutive evaluation cycles with overall risk HIGH or CRITICAL.
///
/// Only [`HysteresisCounter::record`] changes the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HysteresisCounter {
    consecutive_high_risk_days: u32,
}

impl HysteresisCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn days(&self) -> u32 {
        self.consecutive_high_risk_days
    }

    /// Increment on HIGH/CRITICAL, reset on LOW/MEDIUM. Returns the new count.
    pub fn record(&mut self, overall: RiskLevel) -> u32 {
        if overall.is_high() {
            self.consecutive_high_risk_days = self.consecutive_high_risk_days.saturating_add(1);
        } else {
            self.consecutive_high_risk_days = 0;
        }
        self.consecutive_high_risk_days
    }
}

/// Process-wide counter for hosts that assess from several threads.
#[derive(Debug, Default)]
pub struct SharedHysteresis {
    inner: Mutex<HysteresisCounter>,
}

impl SharedHysteresis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn days(&self) -> u32 {
        self.lock().days()
    }

    /// Serialized read-increment-write.
    pub fn record(&self, overall: RiskLevel) -> u32 {
        self.lock().record(overall)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HysteresisCounter> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// =============================================================================
// Threshold ladders
// =============================================================================

/// `num / den` with a zero denominator mapped to signed infinity (or 0 for 0/0).
fn guarded_ratio(num: f64, den: f64) -> f64 {
    if den != 0.0 {
        num / den
    } else if num > 0.0 {
        f64::INFINITY
    } else if num < 0.0 {
        f64::NEG_INFINITY
    } else {
        0.0
    }
}

pub fn liquidity_level(liquidity_ratio: f64) -> RiskLevel {
    if liquidity_ratio < 0.02 {
        RiskLevel::Critical
    } else if liquidity_ratio < 0.05 {
        RiskLevel::High
    } else if liquidity_ratio < 0.10 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

pub fn inflation_level(inflation_rate: f64, target_inflation: f64) -> RiskLevel {
    let deviation = (inflation_rate - target_inflation).abs();
    if deviation > 0.05 {
        RiskLevel::Critical
    } else if deviation > 0.03 {
        RiskLevel::High
    } else if deviation > 0.015 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

pub fn bubble_level(price_volatility: f64, output_gap: f64) -> RiskLevel {
    let pressure = price_volatility + output_gap.abs();
    if pressure > 0.30 {
        RiskLevel::Critical
    } else if pressure > 0.20 {
        RiskLevel::High
    } else if pressure > 0.10 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

pub fn systemic_level(daily_issuance_volume: f64, daily_issuance_limit: f64) -> RiskLevel {
    let utilization = guarded_ratio(daily_issuance_volume, daily_issuance_limit);
    if utilization > 0.90 {
        RiskLevel::Critical
    } else if utilization > 0.70 {
        RiskLevel::High
    } else if utilization > 0.50 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Fold dimension levels into the overall level. First matching rule wins.
pub fn combine_levels(levels: &[RiskLevel]) -> RiskLevel {
    let count = |target: RiskLevel| levels.iter().filter(|l| **l == target).count();
    let critical = count(RiskLevel::Critical);
    let high = count(RiskLevel::High);
    let medium = count(RiskLevel::Medium);

    if critical > 0 {
        RiskLevel::Critical
    } else if high >= 2 {
        RiskLevel::High
    } else if high == 1 {
        RiskLevel::High
    } else if medium >= 3 {
        RiskLevel::High
    } else if medium > 0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

// =============================================================================
// Engine
// =============================================================================

#[derive(Debug, Clone)]
pub struct RiskAssessmentEngine {
    target_inflation: f64,
    daily_issuance_limit: f64,
    breaker: CircuitBreaker,
}

impl RiskAssessmentEngine {
    pub fn new(cfg: &PolicyConfig) -> Self {
        Self {
            target_inflation: cfg.target_inflation,
            daily_issuance_limit: cfg.daily_issuance_limit,
            breaker: CircuitBreaker::new(cfg),
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Score a snapshot and record the outcome in a caller-owned counter.
    pub fn assess(&self, state: &EconomicSystemState, counter: &mut HysteresisCounter) -> RiskAssessment {
        let levels = self.dimension_levels(state);
        let overall = combine_levels(&levels);
        let days = counter.record(overall);
        self.build(state, levels, overall, days)
    }

    /// Same as [`assess`](Self::assess) against a process-wide counter.
    pub fn assess_shared(&self, state: &EconomicSystemState, counter: &SharedHysteresis) -> RiskAssessment {
        let levels = self.dimension_levels(state);
        let overall = combine_levels(&levels);
        let days = counter.record(overall);
        self.build(state, levels, overall, days)
    }

    fn dimension_levels(&self, state: &EconomicSystemState) -> [RiskLevel; 4] {
        [
            liquidity_level(state.liquidity_ratio),
            inflation_level(state.inflation_rate, self.target_inflation),
            bubble_level(state.price_volatility, state.output_gap),
            systemic_level(state.daily_issuance_volume, self.daily_issuance_limit),
        ]
    }

    fn build(
        &self,
        state: &EconomicSystemState,
        levels: [RiskLevel; 4],
        overall: RiskLevel,
        days: u32,
    ) -> RiskAssessment {
        let [liquidity, inflation, bubble, systemic] = levels;
        let tripped = self.breaker.should_trip(state, days);

        let mut recommendations = Vec::new();
        let mut actions = Vec::new();

        if liquidity != RiskLevel::Low {
            recommendations.push(format!(
                "liquidity ratio {:.2}% is thin; widen PMP reserves before further conversion",
                state.liquidity_ratio * 100.0
            ));
            actions.push(MitigationAction {
                action_type: MitigationType::InjectLiquidity,
                severity: liquidity.severity(),
                description: "release reserve PMP into the conversion pool".to_string(),
                expected_impact: "restores conversion headroom".to_string(),
            });
        }
        if inflation != RiskLevel::Low {
            let direction = if state.inflation_rate > self.target_inflation { "above" } else { "below" };
            recommendations.push(format!(
                "inflation {:.2}% is {} target {:.2}%; rebalance issuance",
                state.inflation_rate * 100.0,
                direction,
                self.target_inflation * 100.0
            ));
            actions.push(MitigationAction {
                action_type: MitigationType::TightenIssuance,
                severity: inflation.severity(),
                description: format!("steer issuance toward {:.2}% inflation", self.target_inflation * 100.0),
                expected_impact: "pulls inflation back inside its band".to_string(),
            });
        }
        if bubble != RiskLevel::Low {
            recommendations.push(format!(
                "volatility {:.2}% with output gap {:.2}% signals speculative pressure",
                state.price_volatility * 100.0,
                state.output_gap * 100.0
            ));
            actions.push(MitigationAction {
                action_type: MitigationType::DampenSpeculation,
                severity: bubble.severity(),
                description: "raise PMC conversion fees temporarily".to_string(),
                expected_impact: "cools speculative conversion demand".to_string(),
            });
        }
        if systemic != RiskLevel::Low {
            recommendations.push(format!(
                "daily issuance {:.0} is {:.0}% of the limit",
                state.daily_issuance_volume,
                guarded_ratio(state.daily_issuance_volume, self.daily_issuance_limit) * 100.0
            ));
            actions.push(MitigationAction {
                action_type: MitigationType::ThrottleIssuance,
                severity: systemic.severity(),
                description: "lower the daily issuance quota".to_string(),
                expected_impact: "keeps issuance under the systemic limit".to_string(),
            });
        }
        if tripped {
            recommendations.push("circuit breaker engaged: suspend issuance, redistribution and venture allocation".to_string());
        }

        log_assessment(
            overall.as_str(),
            &[
                ("liquidity", liquidity.as_str()),
                ("inflation", inflation.as_str()),
                ("bubble", bubble.as_str()),
                ("systemic", systemic.as_str()),
            ],
            days,
            tripped,
        );

        RiskAssessment {
            overall,
            liquidity,
            inflation,
            bubble,
            systemic,
            recommendations,
            circuit_breaker_triggered: tripped,
            mitigation_actions: actions,
            consecutive_high_risk_days: days,
            assessed_at: state.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::sample_state;

    fn engine() -> RiskAssessmentEngine {
        RiskAssessmentEngine::new(&PolicyConfig::default())
    }

    #[test]
    fn test_liquidity_ladder() {
        assert_eq!(liquidity_level(0.01), RiskLevel::Critical);
        assert_eq!(liquidity_level(0.02), RiskLevel::High);
        assert_eq!(liquidity_level(0.07), RiskLevel::Medium);
        assert_eq!(liquidity_level(0.10), RiskLevel::Low);
    }

    #[test]
    fn test_inflation_ladder_is_symmetric() {
        assert_eq!(inflation_level(0.08, 0.02), RiskLevel::Critical);
        assert_eq!(inflation_level(-0.04, 0.02), RiskLevel::Critical);
        assert_eq!(inflation_level(0.06, 0.02), RiskLevel::High);
        assert_eq!(inflation_level(0.04, 0.02), RiskLevel::Medium);
        assert_eq!(inflation_level(0.03, 0.02), RiskLevel::Low);
    }

    #[test]
    fn test_bubble_uses_absolute_gap() {
        assert_eq!(bubble_level(0.05, -0.30), RiskLevel::Critical);
        assert_eq!(bubble_level(0.15, 0.06), RiskLevel::High);
        assert_eq!(bubble_level(0.05, 0.06), RiskLevel::Medium);
        assert_eq!(bubble_level(0.05, 0.0), RiskLevel::Low);
    }

    #[test]
    fn test_systemic_zero_limit_maps_to_extreme_bucket() {
        assert_eq!(systemic_level(1.0, 0.0), RiskLevel::Critical);
        assert_eq!(systemic_level(0.0, 0.0), RiskLevel::Low);
        assert_eq!(systemic_level(95.0, 100.0), RiskLevel::Critical);
        assert_eq!(systemic_level(75.0, 100.0), RiskLevel::High);
        assert_eq!(systemic_level(55.0, 100.0), RiskLevel::Medium);
    }

    #[test]
    fn test_combine_precedence() {
        use RiskLevel::*;
        assert_eq!(combine_levels(&[Critical, Low, Low, Low]), Critical);
        assert_eq!(combine_levels(&[High, High, Low, Low]), High);
        assert_eq!(combine_levels(&[High, Low, Low, Low]), High);
        assert_eq!(combine_levels(&[Medium, Medium, Medium, Low]), High);
        assert_eq!(combine_levels(&[Medium, Medium, Low, Low]), Medium);
        assert_eq!(combine_levels(&[Low, Low, Low, Low]), Low);
    }

    #[test]
    fn test_three_mediums_escalate() {
        let mut s = sample_state();
        s.liquidity_ratio = 0.07; // medium
        s.inflation_rate = 0.04; // deviation 0.02 -> medium
        s.price_volatility = 0.12; // medium
        let mut counter = HysteresisCounter::new();
        let a = engine().assess(&s, &mut counter);
        assert_eq!(a.liquidity, RiskLevel::Medium);
        assert_eq!(a.inflation, RiskLevel::Medium);
        assert_eq!(a.bubble, RiskLevel::Medium);
        assert_eq!(a.systemic, RiskLevel::Low);
        assert_eq!(a.overall, RiskLevel::High);
        assert_eq!(counter.days(), 1);
    }

    #[test]
    fn test_counter_increments_and_resets() {
        let e = engine();
        let mut counter = HysteresisCounter::new();
        let mut risky = sample_state();
        risky.liquidity_ratio = 0.03; // HIGH
        for expected in 1..=3 {
            let a = e.assess(&risky, &mut counter);
            assert_eq!(a.consecutive_high_risk_days, expected);
        }
        let calm = e.assess(&sample_state(), &mut counter);
        assert_eq!(calm.overall, RiskLevel::Low);
        assert_eq!(counter.days(), 0);
        assert!(!calm.circuit_breaker_triggered);
    }

    #[test]
    fn test_counter_alone_trips_breaker_on_third_day() {
        let e = engine();
        let mut counter = HysteresisCounter::new();
        let mut s = sample_state();
        // HIGH inflation, no raw breaker threshold violated
        s.inflation_rate = 0.06;
        let first = e.assess(&s, &mut counter);
        assert_eq!(first.overall, RiskLevel::High);
        assert!(!first.circuit_breaker_triggered);
        let second = e.assess(&s, &mut counter);
        assert!(!second.circuit_breaker_triggered);
        let third = e.assess(&s, &mut counter);
        assert!(third.circuit_breaker_triggered);
    }

    #[test]
    fn test_shared_counter_matches_owned() {
        let e = engine();
        let shared = SharedHysteresis::new();
        let mut s = sample_state();
        s.liquidity_ratio = 0.01;
        e.assess_shared(&s, &shared);
        e.assess_shared(&s, &shared);
        assert_eq!(shared.days(), 2);
        e.assess_shared(&sample_state(), &shared);
        assert_eq!(shared.days(), 0);
    }

    #[test]
    fn test_shared_counter_across_threads() {
        let shared = std::sync::Arc::new(SharedHysteresis::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = shared.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        c.record(RiskLevel::Critical);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(shared.days(), 800);
    }

    #[test]
    fn test_mitigations_only_for_elevated_dimensions() {
        let mut s = sample_state();
        s.liquidity_ratio = 0.01;
        let a = engine().assess(&s, &mut HysteresisCounter::new());
        assert_eq!(a.mitigation_actions.len(), 1);
        assert_eq!(a.mitigation_actions[0].action_type, MitigationType::InjectLiquidity);
        assert_eq!(a.mitigation_actions[0].severity, 1.0);
        assert!(a.circuit_breaker_triggered);
    }
}
