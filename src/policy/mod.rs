//! Monetary-policy and incentive calculators. Both are stateless.

pub mod incentive;
pub mod taylor;

pub use incentive::{BehavioralTelemetry, IncentiveAdjustment, IncentiveMechanismOptimizer};
pub use taylor::{InflationStance, OutputStance, TaylorRulePolicyCalculator, TaylorRuleResult};
