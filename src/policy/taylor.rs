//! Taylor-rule analogue for the point economy.
//!
//! ```text
//! rate = natural + inflation + w_pi * (inflation - target) + w_y * output_gap
//! ```
//!
//! The issuance and conversion adjustments are contractionary when the
//! economy runs hot: inflation above its band lowers PMP issuance, an output
//! gap above its band lowers PMC conversion. Both are clamped to [-1, 1].

use serde::{Deserialize, Serialize};

use crate::logging::log_policy;
use crate::state::{EconomicSystemState, PolicyConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InflationStance {
    AboveTarget,
    AtTarget,
    BelowTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStance {
    Overheating,
    AtPotential,
    Depressed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaylorRuleResult {
    pub recommended_rate: f64,
    /// In [-1, 1]; negative means issue less PMP
    pub pmp_issuance_adjustment: f64,
    /// In [-1, 1]; negative means convert less PMP into PMC
    pub pmc_conversion_adjustment: f64,
    pub inflation_stance: InflationStance,
    pub output_stance: OutputStance,
    pub rationale: String,
}

#[derive(Debug, Clone)]
pub struct TaylorRulePolicyCalculator {
    natural_rate: f64,
    target_inflation: f64,
    inflation_weight: f64,
    output_gap_weight: f64,
    inflation_band: f64,
    output_gap_band: f64,
    sensitivity: f64,
}

/// Portion of `deviation` outside `[-band, band]`, keeping its sign.
fn beyond_band(deviation: f64, band: f64) -> f64 {
    if deviation > band {
        deviation - band
    } else if deviation < -band {
        deviation + band
    } else {
        0.0
    }
}

impl TaylorRulePolicyCalculator {
    pub fn new(cfg: &PolicyConfig) -> Self {
        Self {
            natural_rate: cfg.natural_rate,
            target_inflation: cfg.target_inflation,
            inflation_weight: cfg.inflation_weight,
            output_gap_weight: cfg.output_gap_weight,
            inflation_band: cfg.inflation_band,
            output_gap_band: cfg.output_gap_band,
            sensitivity: cfg.adjustment_sensitivity,
        }
    }

    pub fn recommend(&self, state: &EconomicSystemState) -> TaylorRuleResult {
        let inflation_gap = state.inflation_rate - self.target_inflation;
        let rate = (self.natural_rate
            + state.inflation_rate
            + self.inflation_weight * inflation_gap
            + self.output_gap_weight * state.output_gap)
            .max(0.0);

        let pmp = (-beyond_band(inflation_gap, self.inflation_band) * self.sensitivity).clamp(-1.0, 1.0);
        let pmc = (-beyond_band(state.output_gap, self.output_gap_band) * self.sensitivity).clamp(-1.0, 1.0);

        let inflation_stance = if inflation_gap > self.inflation_band {
            InflationStance::AboveTarget
        } else if inflation_gap < -self.inflation_band {
            InflationStance::BelowTarget
        } else {
            InflationStance::AtTarget
        };
        let output_stance = if state.output_gap > self.output_gap_band {
            OutputStance::Overheating
        } else if state.output_gap < -self.output_gap_band {
            OutputStance::Depressed
        } else {
            OutputStance::AtPotential
        };

        let inflation_text = match inflation_stance {
            InflationStance::AboveTarget => "above target",
            InflationStance::AtTarget => "at target",
            InflationStance::BelowTarget => "below target",
        };
        let output_text = match output_stance {
            OutputStance::Overheating => "overheating",
            OutputStance::AtPotential => "at potential",
            OutputStance::Depressed => "depressed",
        };
        let rationale = format!(
            "inflation {:.2}% is {} ({:.2}%); output is {} (gap {:.2}%); recommended rate {:.2}%",
            state.inflation_rate * 100.0,
            inflation_text,
            self.target_inflation * 100.0,
            output_text,
            state.output_gap * 100.0,
            rate * 100.0
        );

        log_policy(rate, pmp, pmc, &rationale);

        TaylorRuleResult {
            recommended_rate: rate,
            pmp_issuance_adjustment: pmp,
            pmc_conversion_adjustment: pmc,
            inflation_stance,
            output_stance,
            rationale,
        }
    }
}
