//! Issuance circuit breaker.
//!
//! Stateless over a single snapshot; hysteresis comes from the consecutive
//! high-risk-day count maintained by the risk engine.

use serde::{Deserialize, Serialize};

use crate::state::{EconomicSystemState, PolicyConfig};

const RECOVERY_BASE_MINUTES: u32 = 30;
const RECOVERY_CAP_MINUTES: u32 = 480;

const EMERGENCY_ACTIONS: [&str; 5] = [
    "halt new PMP issuance",
    "hold large PMC conversion requests",
    "notify operators",
    "notify users",
    "stage failover",
];

/// One violated trip condition with its measured value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TripCondition {
    IssuanceLimit { volume: f64, limit: f64 },
    Volatility { volatility: f64, threshold: f64 },
    Liquidity { ratio: f64, threshold: f64 },
    EmergencyVolatility { volatility: f64, threshold: f64 },
    ConsecutiveHighRisk { days: u32, max: u32 },
}

impl TripCondition {
    pub fn describe(&self) -> String {
        match self {
            Self::IssuanceLimit { volume, limit } => {
                format!("daily issuance {:.2} exceeds limit {:.2}", volume, limit)
            }
            Self::Volatility { volatility, threshold } => {
                format!("price volatility {:.4} exceeds threshold {:.4}", volatility, threshold)
            }
            Self::Liquidity { ratio, threshold } => {
                format!("liquidity ratio {:.4} below threshold {:.4}", ratio, threshold)
            }
            Self::EmergencyVolatility { volatility, threshold } => format!(
                "price volatility {:.4} exceeds emergency threshold {:.4}",
                volatility, threshold
            ),
            Self::ConsecutiveHighRisk { days, max } => {
                format!("{} consecutive high-risk days (max {})", days, max)
            }
        }
    }
}

/// Everything a caller needs once the breaker has been consulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerReport {
    pub tripped: bool,
    pub conditions: Vec<TripCondition>,
    pub reason: String,
    pub emergency_actions: Vec<String>,
    pub recovery_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreaker {
    pub daily_issuance_limit: f64,
    pub volatility_threshold: f64,
    pub emergency_volatility_threshold: f64,
    pub liquidity_threshold: f64,
    pub max_consecutive_high_risk_days: u32,
}

impl CircuitBreaker {
    pub fn new(cfg: &PolicyConfig) -> Self {
        Self {
            daily_issuance_limit: cfg.daily_issuance_limit,
            volatility_threshold: cfg.volatility_threshold,
            emergency_volatility_threshold: cfg.emergency_volatility_threshold,
            liquidity_threshold: cfg.liquidity_threshold,
            max_consecutive_high_risk_days: cfg.max_consecutive_high_risk_days,
        }
    }

    /// All violated conditions, in a fixed order.
    pub fn violations(&self, state: &EconomicSystemState, consecutive_high_risk_days: u32) -> Vec<TripCondition> {
        let mut out = Vec::new();
        if state.daily_issuance_volume > self.daily_issuance_limit {
            out.push(TripCondition::IssuanceLimit {
                volume: state.daily_issuance_volume,
                limit: self.daily_issuance_limit,
            });
        }
        if state.price_volatility > self.volatility_threshold {
            out.push(TripCondition::Volatility {
                volatility: state.price_volatility,
                threshold: self.volatility_threshold,
            });
        }
        if state.liquidity_ratio < self.liquidity_threshold {
            out.push(TripCondition::Liquidity {
                ratio: state.liquidity_ratio,
                threshold: self.liquidity_threshold,
            });
        }
        if state.price_volatility > self.emergency_volatility_threshold {
            out.push(TripCondition::EmergencyVolatility {
                volatility: state.price_volatility,
                threshold: self.emergency_volatility_threshold,
            });
        }
        if consecutive_high_risk_days >= self.max_consecutive_high_risk_days {
            out.push(TripCondition::ConsecutiveHighRisk {
                days: consecutive_high_risk_days,
                max: self.max_consecutive_high_risk_days,
            });
        }
        out
    }

    pub fn should_trip(&self, state: &EconomicSystemState, consecutive_high_risk_days: u32) -> bool {
        !self.violations(state, consecutive_high_risk_days).is_empty()
    }

    /// Every violated condition joined with "; ", empty when nothing is violated.
    pub fn describe_reason(&self, state: &EconomicSystemState, consecutive_high_risk_days: u32) -> String {
        self.violations(state, consecutive_high_risk_days)
            .iter()
            .map(TripCondition::describe)
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn emergency_actions() -> Vec<String> {
        EMERGENCY_ACTIONS.iter().map(|s| s.to_string()).collect()
    }

    pub fn estimate_recovery_minutes(state: &EconomicSystemState) -> u32 {
        let mut minutes = RECOVERY_BASE_MINUTES;
        if state.price_volatility > 0.25 {
            minutes += 60;
        }
        if state.liquidity_ratio < 0.02 {
            minutes += 120;
        }
        if state.inflation_rate > 0.10 {
            minutes += 90;
        }
        minutes.min(RECOVERY_CAP_MINUTES)
    }

    pub fn report(&self, state: &EconomicSystemState, consecutive_high_risk_days: u32) -> BreakerReport {
        let conditions = self.violations(state, consecutive_high_risk_days);
        let tripped = !conditions.is_empty();
        let reason = conditions
            .iter()
            .map(TripCondition::describe)
            .collect::<Vec<_>>()
            .join("; ");
        BreakerReport {
            tripped,
            conditions,
            reason,
            emergency_actions: if tripped { Self::emergency_actions() } else { Vec::new() },
            recovery_minutes: if tripped { Self::estimate_recovery_minutes(state) } else { 0 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::sample_state;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(&PolicyConfig::default())
    }

    #[test]
    fn test_calm_snapshot_does_not_trip() {
        let cb = breaker();
        assert!(!cb.should_trip(&sample_state(), 0));
        assert_eq!(cb.describe_reason(&sample_state(), 0), "");
    }

    #[test]
    fn test_each_threshold_trips() {
        let cb = breaker();

        let mut s = sample_state();
        s.daily_issuance_volume = 2_000_000.0;
        assert!(cb.should_trip(&s, 0));

        let mut s = sample_state();
        s.price_volatility = 0.16;
        assert!(cb.should_trip(&s, 0));

        let mut s = sample_state();
        s.liquidity_ratio = 0.04;
        assert!(cb.should_trip(&s, 0));
    }

    #[test]
    fn test_consecutive_days_trip_at_max() {
        let cb = breaker();
        assert!(!cb.should_trip(&sample_state(), 2));
        assert!(cb.should_trip(&sample_state(), 3));
    }

    #[test]
    fn test_emergency_volatility_listed_alongside_ordinary() {
        let cb = breaker();
        let mut s = sample_state();
        s.price_volatility = 0.35;
        let v = cb.violations(&s, 0);
        assert_eq!(v.len(), 2);
        assert!(matches!(v[0], TripCondition::Volatility { .. }));
        assert!(matches!(v[1], TripCondition::EmergencyVolatility { .. }));
    }

    #[test]
    fn test_reason_concatenates_measured_values() {
        let cb = breaker();
        let mut s = sample_state();
        s.liquidity_ratio = 0.01;
        s.daily_issuance_volume = 1_500_000.0;
        let reason = cb.describe_reason(&s, 0);
        assert!(reason.contains("daily issuance 1500000.00 exceeds limit 1000000.00"));
        assert!(reason.contains("liquidity ratio 0.0100 below threshold 0.0500"));
        assert!(reason.contains("; "));
    }

    #[test]
    fn test_emergency_actions_fixed_order() {
        let actions = CircuitBreaker::emergency_actions();
        assert_eq!(actions.len(), 5);
        assert_eq!(actions[0], "halt new PMP issuance");
        assert_eq!(actions[4], "stage failover");
    }

    #[test]
    fn test_recovery_estimate_buckets_and_cap() {
        let mut s = sample_state();
        assert_eq!(CircuitBreaker::estimate_recovery_minutes(&s), 30);
        s.liquidity_ratio = 0.01;
        assert_eq!(CircuitBreaker::estimate_recovery_minutes(&s), 150);
        s.price_volatility = 0.3;
        s.inflation_rate = 0.2;
        assert_eq!(CircuitBreaker::estimate_recovery_minutes(&s), 300);
    }

    #[test]
    fn test_report_is_empty_when_closed() {
        let report = breaker().report(&sample_state(), 0);
        assert!(!report.tripped);
        assert!(report.emergency_actions.is_empty());
        assert_eq!(report.recovery_minutes, 0);
    }
}
