//! Call contracts for the calculators that live outside this crate.
//!
//! The control loop only depends on these traits. Hosts plug in their own
//! pricing, conversion and nudging engines.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::aggregate::issuance::AgencyMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapmInput {
    pub beta: f64,
    pub risk_free_rate: f64,
    pub market_risk_premium: f64,
    pub current_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceRecommendation {
    Buy,
    Hold,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapmQuote {
    pub fair_value: f64,
    pub required_return: f64,
    pub recommendation: PriceRecommendation,
}

/// PMC valuation.
pub trait CapmPricer {
    fn price(&self, input: &CapmInput) -> Result<CapmQuote>;
}

/// Prediction telemetry fed to the PMP → PMC converter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionData {
    pub accuracy: f64,
    pub predictions_made: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub pmp_amount: f64,
    pub prediction: PredictionData,
    pub participants: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub pmc_output: f64,
    pub conversion_rate: f64,
    pub agency_metrics: AgencyMetrics,
}

pub trait AgencyConverter {
    fn convert(&self, request: &ConversionRequest) -> Result<ConversionResult>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionContext {
    pub user_id: String,
    pub situation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NudgeType {
    Default,
    SocialProof,
    LossAversion,
    Reminder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nudge {
    pub message: String,
    pub nudge_type: NudgeType,
    pub expected_effectiveness: f64,
}

/// Consulted by orchestration above the control loop.
pub trait BehavioralNudger {
    fn nudge(&self, context: &DecisionContext, target_behavior: &str) -> Result<Nudge>;
}
