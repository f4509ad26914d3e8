//! Token issuance lifecycle.
//!
//! ```text
//! CALCULATING ──activate──► ACTIVE ──complete──► COMPLETED
//!                             │
//!                             └──suspend──► SUSPENDED
//! ```
//!
//! The daily PMP emission quota is derived from expected EBIT at creation
//! and can be nudged by the Taylor-rule issuance adjustment afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{unit_score, Aggregate, AggregateId, Gate};
use crate::error::EconError;
use crate::logging::{log_rejected, log_transition, Domain};

const DAYS_PER_YEAR: f64 = 365.0;
const INITIAL_AGENCY_COST_SCORE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssuanceStatus {
    Calculating,
    Active,
    Completed,
    Suspended,
}

impl IssuanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calculating => "calculating",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Suspended => "suspended",
        }
    }
}

/// Expected annual figures the emission quota is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EbitInputs {
    pub expected_revenue: f64,
    pub cost_of_goods_sold: f64,
    pub sga: f64,
    pub tax: f64,
    pub interest: f64,
}

impl EbitInputs {
    pub fn ebit(&self) -> f64 {
        self.expected_revenue - self.cost_of_goods_sold - self.sga
    }

    pub fn daily_emission(&self) -> f64 {
        ((self.ebit() - self.tax - self.interest) / DAYS_PER_YEAR).max(0.0)
    }
}

/// Signals from the Agency-Theory side used to score agency cost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgencyMetrics {
    pub prediction_accuracy: f64,
    pub social_learning_index: f64,
    pub information_transparency: f64,
}

impl AgencyMetrics {
    /// `(0.4·accuracy + 0.3·learning + 0.3·transparency)²`, clamped to [0, 1].
    pub fn score(&self) -> Result<f64, EconError> {
        let a = unit_score("prediction_accuracy", self.prediction_accuracy)?;
        let l = unit_score("social_learning_index", self.social_learning_index)?;
        let t = unit_score("information_transparency", self.information_transparency)?;
        let composite = 0.4 * a + 0.3 * l + 0.3 * t;
        Ok((composite * composite).clamp(0.0, 1.0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IssuanceCommand {
    Activate { gate: Gate },
    Complete,
    Suspend { reason: String },
    UpdateParticipants { count: u64 },
    UpdateAgencyCost { metrics: AgencyMetrics },
    ApplyPolicyAdjustment { adjustment: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuanceAggregate {
    id: AggregateId,
    status: IssuanceStatus,
    inputs: EbitInputs,
    daily_emission_quota: f64,
    network_participants: u64,
    agency_cost_score: f64,
    suspension_reason: Option<String>,
    updated_at: DateTime<Utc>,
}

impl IssuanceAggregate {
    pub fn create(inputs: EbitInputs) -> Result<Self, EconError> {
        let ebit = inputs.ebit();
        if !ebit.is_finite() || ebit <= 0.0 {
            return Err(EconError::InvalidEbit {
                revenue: inputs.expected_revenue,
                cogs: inputs.cost_of_goods_sold,
                sga: inputs.sga,
            });
        }
        for (name, value) in [("tax", inputs.tax), ("interest", inputs.interest)] {
            if !value.is_finite() || value < 0.0 {
                return Err(EconError::InvalidParameter { name, value });
            }
        }
        let agg = Self {
            id: AggregateId::new(),
            status: IssuanceStatus::Calculating,
            inputs,
            daily_emission_quota: inputs.daily_emission(),
            network_participants: 0,
            agency_cost_score: INITIAL_AGENCY_COST_SCORE,
            suspension_reason: None,
            updated_at: Utc::now(),
        };
        log_transition(Domain::Issuance, &agg.id.to_string(), "none", agg.status.as_str(), "create");
        Ok(agg)
    }

    pub fn status(&self) -> IssuanceStatus {
        self.status
    }

    pub fn inputs(&self) -> &EbitInputs {
        &self.inputs
    }

    pub fn daily_emission_quota(&self) -> f64 {
        self.daily_emission_quota
    }

    pub fn network_participants(&self) -> u64 {
        self.network_participants
    }

    pub fn agency_cost_score(&self) -> f64 {
        self.agency_cost_score
    }

    pub fn suspension_reason(&self) -> Option<&str> {
        self.suspension_reason.as_deref()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn reject(&self, action: &'static str) -> EconError {
        let err = EconError::InvalidStatusTransition { from: self.status.as_str(), action };
        log_rejected(Domain::Issuance, &self.id.to_string(), action, &err.to_string());
        err
    }

    fn moved(&self, status: IssuanceStatus, action: &str) -> Self {
        let mut next = self.clone();
        next.status = status;
        next.updated_at = Utc::now();
        log_transition(Domain::Issuance, &self.id.to_string(), self.status.as_str(), status.as_str(), action);
        next
    }

    /// CALCULATING → ACTIVE, only while the breaker is closed.
    pub fn activate(&self, gate: &Gate) -> Result<Self, EconError> {
        if self.status != IssuanceStatus::Calculating {
            return Err(self.reject("activate"));
        }
        if let Err(err) = gate.ensure_open() {
            log_rejected(Domain::Issuance, &self.id.to_string(), "activate", &err.to_string());
            return Err(err);
        }
        Ok(self.moved(IssuanceStatus::Active, "activate"))
    }

    pub fn complete(&self) -> Result<Self, EconError> {
        if self.status != IssuanceStatus::Active {
            return Err(self.reject("complete"));
        }
        Ok(self.moved(IssuanceStatus::Completed, "complete"))
    }

    pub fn suspend(&self, reason: &str) -> Result<Self, EconError> {
        if self.status != IssuanceStatus::Active {
            return Err(self.reject("suspend"));
        }
        let mut next = self.moved(IssuanceStatus::Suspended, "suspend");
        next.suspension_reason = Some(reason.to_string());
        Ok(next)
    }

    fn ensure_mutable(&self, action: &'static str) -> Result<(), EconError> {
        match self.status {
            IssuanceStatus::Calculating | IssuanceStatus::Active => Ok(()),
            _ => Err(self.reject(action)),
        }
    }

    pub fn update_participants(&self, count: u64) -> Result<Self, EconError> {
        self.ensure_mutable("update_participants")?;
        let mut next = self.clone();
        next.network_participants = count;
        next.updated_at = Utc::now();
        Ok(next)
    }

    pub fn update_agency_cost(&self, metrics: &AgencyMetrics) -> Result<Self, EconError> {
        self.ensure_mutable("update_agency_cost")?;
        let score = metrics.score()?;
        let mut next = self.clone();
        next.agency_cost_score = score;
        next.updated_at = Utc::now();
        Ok(next)
    }

    /// Set the quota to the EBIT-derived base scaled by `1 + adjustment`;
    /// `adjustment` is the Taylor-rule PMP issuance adjustment in [-1, 1].
    /// Adjustments do not compound, so a full cut can be reversed by the
    /// next cycle.
    pub fn apply_policy_adjustment(&self, adjustment: f64) -> Result<Self, EconError> {
        self.ensure_mutable("apply_policy_adjustment")?;
        if !(-1.0..=1.0).contains(&adjustment) {
            return Err(EconError::InvalidParameter { name: "pmp_issuance_adjustment", value: adjustment });
        }
        let mut next = self.clone();
        next.daily_emission_quota = (self.inputs.daily_emission() * (1.0 + adjustment)).max(0.0);
        next.updated_at = Utc::now();
        Ok(next)
    }

    /// Metcalfe's law: `participants² × density × agency score`.
    pub fn network_value(&self, density_adjustment: f64) -> f64 {
        let n = self.network_participants as f64;
        n * n * density_adjustment.max(0.0) * self.agency_cost_score
    }

    pub fn step(&self, cmd: IssuanceCommand) -> Result<Self, EconError> {
        match cmd {
            IssuanceCommand::Activate { gate } => self.activate(&gate),
            IssuanceCommand::Complete => self.complete(),
            IssuanceCommand::Suspend { reason } => self.suspend(&reason),
            IssuanceCommand::UpdateParticipants { count } => self.update_participants(count),
            IssuanceCommand::UpdateAgencyCost { metrics } => self.update_agency_cost(&metrics),
            IssuanceCommand::ApplyPolicyAdjustment { adjustment } => self.apply_policy_adjustment(adjustment),
        }
    }
}

impl Aggregate for IssuanceAggregate {
    const KIND: &'static str = "issuance";

    fn id(&self) -> AggregateId {
        self.id
    }

    fn status_str(&self) -> &'static str {
        self.status.as_str()
    }

    fn check_invariants(&self) -> Result<(), EconError> {
        if !self.daily_emission_quota.is_finite() || self.daily_emission_quota < 0.0 {
            return Err(EconError::InvariantViolation(format!(
                "daily emission quota {} negative",
                self.daily_emission_quota
            )));
        }
        if !(0.0..=1.0).contains(&self.agency_cost_score) {
            return Err(EconError::InvariantViolation(format!(
                "agency cost score {} outside [0, 1]",
                self.agency_cost_score
            )));
        }
        Ok(())
    }
}
