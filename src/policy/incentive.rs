use serde::{Deserialize, Serialize};

use crate::error::EconError;
use crate::state::PolicyConfig;

const LOW_PARTICIPATION: f64 = 0.3;
const HIGH_PARTICIPATION: f64 = 0.8;
const MIN_FEE: f64 = 0.01;
const BASE_FEE: f64 = 0.05;

/// Participation telemetry gathered by the host for the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BehavioralTelemetry {
    /// Share of active accounts that contributed this cycle, in [0, 1]
    pub participation_rate: f64,
    pub average_contribution: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IncentiveAdjustment {
    pub adjusted_reward_rate: f64,
    pub optimal_fee_structure: f64,
    pub incentive_alignment: f64,
}

/// Reward-rate and fee tuning from participation telemetry.
#[derive(Debug, Clone)]
pub struct IncentiveMechanismOptimizer {
    target_contribution: f64,
}

impl IncentiveMechanismOptimizer {
    pub fn new(cfg: &PolicyConfig) -> Self {
        Self { target_contribution: cfg.target_contribution }
    }

    /// Average contribution relative to the configured target.
    pub fn contribution_ratio(&self, average_contribution: f64) -> f64 {
        if self.target_contribution > 0.0 {
            average_contribution / self.target_contribution
        } else {
            0.0
        }
    }

    pub fn optimize(&self, telemetry: &BehavioralTelemetry) -> Result<IncentiveAdjustment, EconError> {
        if !(0.0..=1.0).contains(&telemetry.participation_rate) {
            return Err(EconError::InvalidScore {
                field: "participation_rate",
                value: telemetry.participation_rate,
            });
        }
        if !telemetry.average_contribution.is_finite() || telemetry.average_contribution < 0.0 {
            return Err(EconError::InvalidParameter {
                name: "average_contribution",
                value: telemetry.average_contribution,
            });
        }

        let reward = if telemetry.participation_rate < LOW_PARTICIPATION {
            1.5
        } else if telemetry.participation_rate > HIGH_PARTICIPATION {
            0.8
        } else {
            1.0
        };
        let ratio = self.contribution_ratio(telemetry.average_contribution);

        Ok(IncentiveAdjustment {
            adjusted_reward_rate: reward,
            optimal_fee_structure: (BASE_FEE * (2.0 - ratio)).max(MIN_FEE),
            incentive_alignment: (telemetry.participation_rate * ratio).min(1.0),
        })
    }
}
