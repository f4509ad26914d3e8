use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EconError;

/// One evaluation-cycle snapshot of the point economy.
///
/// Produced by an external aggregator and consumed read-only by every
/// component of the control loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicSystemState {
    pub total_pmp_supply: f64,
    pub total_pmc_supply: f64,
    /// EBIT-derived rate, used as the risk-free rate for PMC pricing
    pub current_ebit_rate: f64,
    pub inflation_rate: f64,
    pub output_gap: f64,
    pub liquidity_ratio: f64,
    pub daily_issuance_volume: f64,
    pub price_volatility: f64,
    pub timestamp: DateTime<Utc>,
}

impl EconomicSystemState {
    /// Rejects snapshots the aggregator could not have produced honestly.
    pub fn validate(&self) -> Result<(), EconError> {
        let fields = [
            ("total_pmp_supply", self.total_pmp_supply),
            ("total_pmc_supply", self.total_pmc_supply),
            ("current_ebit_rate", self.current_ebit_rate),
            ("inflation_rate", self.inflation_rate),
            ("output_gap", self.output_gap),
            ("liquidity_ratio", self.liquidity_ratio),
            ("daily_issuance_volume", self.daily_issuance_volume),
            ("price_volatility", self.price_volatility),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(EconError::InvalidParameter { name, value });
            }
        }
        for (name, value) in [
            ("total_pmp_supply", self.total_pmp_supply),
            ("total_pmc_supply", self.total_pmc_supply),
            ("liquidity_ratio", self.liquidity_ratio),
            ("daily_issuance_volume", self.daily_issuance_volume),
            ("price_volatility", self.price_volatility),
        ] {
            if value < 0.0 {
                return Err(EconError::InvalidParameter { name, value });
            }
        }
        Ok(())
    }
}

/// Tunables for the whole control loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    // === Monetary policy ===
    pub target_inflation: f64,
    pub natural_rate: f64,
    pub inflation_weight: f64,
    pub output_gap_weight: f64,
    /// Inflation deviation tolerated before issuance is adjusted
    pub inflation_band: f64,
    /// Output gap tolerated before conversion is adjusted
    pub output_gap_band: f64,
    /// Adjustment per unit of deviation beyond the band
    pub adjustment_sensitivity: f64,

    // === Circuit breaker ===
    pub daily_issuance_limit: f64,
    pub volatility_threshold: f64,
    pub emergency_volatility_threshold: f64,
    pub liquidity_threshold: f64,
    pub max_consecutive_high_risk_days: u32,

    // === Incentives ===
    /// Average contribution that counts as a contribution ratio of 1.0
    pub target_contribution: f64,

    pub sqlite_path: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            target_inflation: 0.02,
            natural_rate: 0.02,
            inflation_weight: 0.5,
            output_gap_weight: 0.5,
            inflation_band: 0.01,
            output_gap_band: 0.02,
            adjustment_sensitivity: 10.0,
            daily_issuance_limit: 1_000_000.0,
            volatility_threshold: 0.15,
            emergency_volatility_threshold: 0.30,
            liquidity_threshold: 0.05,
            max_consecutive_high_risk_days: 3,
            target_contribution: 100.0,
            sqlite_path: "./econloop.sqlite".to_string(),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl PolicyConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            target_inflation: env_or("TARGET_INFLATION", d.target_inflation),
            natural_rate: env_or("NATURAL_RATE", d.natural_rate),
            inflation_weight: env_or("INFLATION_WEIGHT", d.inflation_weight),
            output_gap_weight: env_or("OUTPUT_GAP_WEIGHT", d.output_gap_weight),
            inflation_band: env_or("INFLATION_BAND", d.inflation_band),
            output_gap_band: env_or("OUTPUT_GAP_BAND", d.output_gap_band),
            adjustment_sensitivity: env_or("ADJUSTMENT_SENSITIVITY", d.adjustment_sensitivity),
            daily_issuance_limit: env_or("DAILY_ISSUANCE_LIMIT", d.daily_issuance_limit),
            volatility_threshold: env_or("VOLATILITY_THRESHOLD", d.volatility_threshold),
            emergency_volatility_threshold: env_or("EMERGENCY_VOLATILITY", d.emergency_volatility_threshold),
            liquidity_threshold: env_or("LIQUIDITY_THRESHOLD", d.liquidity_threshold),
            max_consecutive_high_risk_days: env_or("MAX_HIGH_RISK_DAYS", d.max_consecutive_high_risk_days),
            target_contribution: env_or("TARGET_CONTRIBUTION", d.target_contribution),
            sqlite_path: std::env::var("SQLITE_PATH").unwrap_or(d.sqlite_path),
        }
    }

    pub fn validate(&self) -> Result<(), EconError> {
        let non_negative = [
            ("target_inflation", self.target_inflation),
            ("natural_rate", self.natural_rate),
            ("inflation_weight", self.inflation_weight),
            ("output_gap_weight", self.output_gap_weight),
            ("inflation_band", self.inflation_band),
            ("output_gap_band", self.output_gap_band),
            ("adjustment_sensitivity", self.adjustment_sensitivity),
            ("daily_issuance_limit", self.daily_issuance_limit),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(EconError::InvalidParameter { name, value });
            }
        }
        let unit = [
            ("volatility_threshold", self.volatility_threshold),
            ("emergency_volatility_threshold", self.emergency_volatility_threshold),
            ("liquidity_threshold", self.liquidity_threshold),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(EconError::InvalidParameter { name, value });
            }
        }
        if self.emergency_volatility_threshold < self.volatility_threshold {
            return Err(EconError::InvalidParameter {
                name: "emergency_volatility_threshold",
                value: self.emergency_volatility_threshold,
            });
        }
        if self.max_consecutive_high_risk_days == 0 {
            return Err(EconError::InvalidParameter {
                name: "max_consecutive_high_risk_days",
                value: 0.0,
            });
        }
        if !self.target_contribution.is_finite() || self.target_contribution <= 0.0 {
            return Err(EconError::InvalidParameter {
                name: "target_contribution",
                value: self.target_contribution,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn sample_state() -> EconomicSystemState {
    EconomicSystemState {
        total_pmp_supply: 10_000_000.0,
        total_pmc_supply: 2_500_000.0,
        current_ebit_rate: 0.03,
        inflation_rate: 0.02,
        output_gap: 0.0,
        liquidity_ratio: 0.20,
        daily_issuance_volume: 100.0,
        price_volatility: 0.02,
        timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
    }
}
