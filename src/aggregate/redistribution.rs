//! Wealth redistribution from the dormant-holdings pool.
//!
//! ```text
//! IDLE → SCANNING → ANALYZING → CALCULATING → REDISTRIBUTING → COMPLETED
//!                       │                                          ▲
//!                       └────────────── no need ───────────────────┘
//! ```
//!
//! Strictly forward: nothing leaves COMPLETED.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Aggregate, AggregateId, Gate};
use crate::error::EconError;
use crate::logging::{log_rejected, log_transition, Domain};

const MAX_RECOMMENDED_RATE: f64 = 0.1;
const PAYOUT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RedistributionStatus {
    Idle,
    Scanning,
    Analyzing,
    Calculating,
    Redistributing,
    Completed,
}

impl RedistributionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Analyzing => "analyzing",
            Self::Calculating => "calculating",
            Self::Redistributing => "redistributing",
            Self::Completed => "completed",
        }
    }
}

/// Gini coefficient of a balance distribution (0 = perfectly equal).
///
/// Uses the sorted closed form `Σ (2i − n − 1)·x_i / (n·Σx)`; empty or
/// all-zero input is treated as perfectly equal.
pub fn gini_coefficient(balances: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = balances.iter().copied().filter(|b| b.is_finite()).map(|b| b.max(0.0)).collect();
    let n = sorted.len();
    let total: f64 = sorted.iter().sum();
    if n == 0 || total <= 0.0 {
        return 0.0;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, x)| (2.0 * (i as f64 + 1.0) - n as f64 - 1.0) * x)
        .sum();
    (weighted / (n as f64 * total)).clamp(0.0, 1.0)
}

/// A balance that has not moved for long enough to be reclaimed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DormantHolding {
    pub account_id: String,
    pub amount: f64,
    pub dormant_days: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RedistributionNeed {
    pub current_gini: f64,
    pub needed: bool,
    pub recommended_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub recipient_id: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionPlan {
    pub rate: f64,
    pub pool: f64,
    pub allocations: Vec<Allocation>,
}

impl DistributionPlan {
    pub fn total(&self) -> f64 {
        self.allocations.iter().map(|a| a.amount).sum()
    }
}

/// Audit record for one executed allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedistributionEvent {
    pub seq: u64,
    pub recipient_id: String,
    pub amount: f64,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RedistributionCommand {
    StartScan { gate: Gate },
    RecordDormantHoldings { holdings: Vec<DormantHolding> },
    AnalyzeNeed { current_gini: f64 },
    CalculateDistribution { recipients: Vec<String>, rate: f64 },
    Execute { plan: DistributionPlan, gate: Gate },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedistributionAggregate {
    id: AggregateId,
    status: RedistributionStatus,
    target_gini: f64,
    redistribution_rate: f64,
    dormant_pool: f64,
    last_need: Option<RedistributionNeed>,
    plan: Option<DistributionPlan>,
    events: Vec<RedistributionEvent>,
    updated_at: DateTime<Utc>,
}

fn in_unit_open_closed(value: f64) -> bool {
    value > 0.0 && value <= 1.0
}

impl RedistributionAggregate {
    pub fn create(target_gini: f64, redistribution_rate: f64) -> Result<Self, EconError> {
        if !in_unit_open_closed(redistribution_rate) {
            return Err(EconError::InvalidRedistributionRate(redistribution_rate));
        }
        if !in_unit_open_closed(target_gini) {
            return Err(EconError::InvalidGiniThreshold(target_gini));
        }
        let agg = Self {
            id: AggregateId::new(),
            status: RedistributionStatus::Idle,
            target_gini,
            redistribution_rate,
            dormant_pool: 0.0,
            last_need: None,
            plan: None,
            events: Vec::new(),
            updated_at: Utc::now(),
        };
        log_transition(Domain::Redistribution, &agg.id.to_string(), "none", agg.status.as_str(), "create");
        Ok(agg)
    }

    pub fn status(&self) -> RedistributionStatus {
        self.status
    }

    pub fn target_gini(&self) -> f64 {
        self.target_gini
    }

    pub fn redistribution_rate(&self) -> f64 {
        self.redistribution_rate
    }

    pub fn dormant_pool(&self) -> f64 {
        self.dormant_pool
    }

    pub fn last_need(&self) -> Option<&RedistributionNeed> {
        self.last_need.as_ref()
    }

    pub fn plan(&self) -> Option<&DistributionPlan> {
        self.plan.as_ref()
    }

    pub fn events(&self) -> &[RedistributionEvent] {
        &self.events
    }

    fn require(&self, expected: RedistributionStatus, action: &'static str) -> Result<(), EconError> {
        if self.status == expected {
            return Ok(());
        }
        Err(self.refuse(action, EconError::InvalidStatusTransition { from: self.status.as_str(), action }))
    }

    fn refuse(&self, action: &str, err: EconError) -> EconError {
        log_rejected(Domain::Redistribution, &self.id.to_string(), action, &err.to_string());
        err
    }

    fn moved(mut self, status: RedistributionStatus, action: &str) -> Self {
        log_transition(Domain::Redistribution, &self.id.to_string(), self.status.as_str(), status.as_str(), action);
        self.status = status;
        self.updated_at = Utc::now();
        self
    }

    /// IDLE → SCANNING, only while the breaker is closed.
    pub fn start_scan(&self, gate: &Gate) -> Result<Self, EconError> {
        self.require(RedistributionStatus::Idle, "start_scan")?;
        gate.ensure_open()?;
        Ok(self.clone().moved(RedistributionStatus::Scanning, "start_scan"))
    }

    /// SCANNING → ANALYZING; the pool is the sum of the dormant balances.
    pub fn record_dormant_holdings(&self, holdings: &[DormantHolding]) -> Result<Self, EconError> {
        self.require(RedistributionStatus::Scanning, "record_dormant_holdings")?;
        for h in holdings {
            if !h.amount.is_finite() || h.amount < 0.0 {
                return Err(EconError::InvalidParameter { name: "dormant_amount", value: h.amount });
            }
        }
        let mut next = self.clone();
        next.dormant_pool = holdings.iter().map(|h| h.amount).sum();
        Ok(next.moved(RedistributionStatus::Analyzing, "record_dormant_holdings"))
    }

    /// Pure need evaluation against the target Gini.
    pub fn evaluate_need(&self, current_gini: f64) -> RedistributionNeed {
        let needed = current_gini > self.target_gini;
        let recommended_rate = if needed {
            ((current_gini - self.target_gini) * 2.0).min(MAX_RECOMMENDED_RATE)
        } else {
            0.0
        };
        RedistributionNeed { current_gini, needed, recommended_rate }
    }

    /// ANALYZING → CALCULATING when a need exists, otherwise ANALYZING → COMPLETED.
    pub fn analyze_redistribution_need(&self, current_gini: f64) -> Result<Self, EconError> {
        self.require(RedistributionStatus::Analyzing, "analyze_redistribution_need")?;
        if !(0.0..=1.0).contains(&current_gini) {
            return Err(EconError::InvalidScore { field: "current_gini", value: current_gini });
        }
        let need = self.evaluate_need(current_gini);
        let mut next = self.clone();
        next.last_need = Some(need);
        let status = if need.needed {
            RedistributionStatus::Calculating
        } else {
            RedistributionStatus::Completed
        };
        Ok(next.moved(status, "analyze_redistribution_need"))
    }

    /// CALCULATING → REDISTRIBUTING. Each recipient receives
    /// `pool × rate / recipients`; the rate is capped at the configured
    /// redistribution rate.
    pub fn calculate_distribution(&self, recipients: &[String], rate: f64) -> Result<Self, EconError> {
        self.require(RedistributionStatus::Calculating, "calculate_distribution")?;
        if !in_unit_open_closed(rate) {
            return Err(EconError::InvalidRedistributionRate(rate));
        }
        let rate = rate.min(self.redistribution_rate);
        let amount = if recipients.is_empty() {
            0.0
        } else {
            self.dormant_pool * rate / recipients.len() as f64
        };
        let plan = DistributionPlan {
            rate,
            pool: self.dormant_pool,
            allocations: recipients
                .iter()
                .map(|r| Allocation { recipient_id: r.clone(), amount })
                .collect(),
        };
        let mut next = self.clone();
        next.plan = Some(plan);
        Ok(next.moved(RedistributionStatus::Redistributing, "calculate_distribution"))
    }

    /// REDISTRIBUTING → COMPLETED, one audit event per allocation.
    ///
    /// Only the plan produced by [`calculate_distribution`](Self::calculate_distribution)
    /// is accepted, and only while the breaker is closed.
    pub fn execute_redistribution(&self, plan: &DistributionPlan, gate: &Gate) -> Result<Self, EconError> {
        const ACTION: &str = "execute_redistribution";
        self.require(RedistributionStatus::Redistributing, ACTION)?;
        gate.ensure_open().map_err(|e| self.refuse(ACTION, e))?;
        if let Some(a) = plan.allocations.iter().find(|a| !a.amount.is_finite() || a.amount < 0.0) {
            return Err(self.refuse(ACTION, EconError::InvalidParameter { name: "allocation_amount", value: a.amount }));
        }
        if self.plan.as_ref() != Some(plan) {
            return Err(self.refuse(ACTION, EconError::PlanMismatch));
        }
        if plan.total() > self.dormant_pool + PAYOUT_EPSILON * self.dormant_pool.max(1.0) {
            return Err(self.refuse(ACTION, EconError::InvalidParameter { name: "plan_total", value: plan.total() }));
        }
        let mut next = self.clone();
        let base = next.events.len() as u64;
        let now = Utc::now();
        next.events.extend(plan.allocations.iter().enumerate().map(|(i, a)| RedistributionEvent {
            seq: base + i as u64,
            recipient_id: a.recipient_id.clone(),
            amount: a.amount,
            at: now,
        }));
        Ok(next.moved(RedistributionStatus::Completed, ACTION))
    }

    pub fn step(&self, cmd: RedistributionCommand) -> Result<Self, EconError> {
        match cmd {
            RedistributionCommand::StartScan { gate } => self.start_scan(&gate),
            RedistributionCommand::RecordDormantHoldings { holdings } => self.record_dormant_holdings(&holdings),
            RedistributionCommand::AnalyzeNeed { current_gini } => self.analyze_redistribution_need(current_gini),
            RedistributionCommand::CalculateDistribution { recipients, rate } => {
                self.calculate_distribution(&recipients, rate)
            }
            RedistributionCommand::Execute { plan, gate } => self.execute_redistribution(&plan, &gate),
        }
    }
}

impl Aggregate for RedistributionAggregate {
    const KIND: &'static str = "redistribution";

    fn id(&self) -> AggregateId {
        self.id
    }

    fn status_str(&self) -> &'static str {
        self.status.as_str()
    }

    fn check_invariants(&self) -> Result<(), EconError> {
        if !in_unit_open_closed(self.redistribution_rate) {
            return Err(EconError::InvariantViolation(format!(
                "redistribution rate {} outside (0, 1]",
                self.redistribution_rate
            )));
        }
        if !in_unit_open_closed(self.target_gini) {
            return Err(EconError::InvariantViolation(format!(
                "target gini {} outside (0, 1]",
                self.target_gini
            )));
        }
        if let Some(e) = self.events.iter().find(|e| !e.amount.is_finite() || e.amount < 0.0) {
            return Err(EconError::InvariantViolation(format!(
                "event {} pays {} to {}",
                e.seq, e.amount, e.recipient_id
            )));
        }
        let paid: f64 = self.events.iter().map(|e| e.amount).sum();
        let cap = self.dormant_pool * self.redistribution_rate;
        if paid > cap + PAYOUT_EPSILON * self.dormant_pool.max(1.0) {
            return Err(EconError::InvariantViolation(format!(
                "redistributed {} exceeds pool {} at rate {}",
                paid, self.dormant_pool, self.redistribution_rate
            )));
        }
        if let Some(plan) = &self.plan {
            if plan.rate > self.redistribution_rate {
                return Err(EconError::InvariantViolation(format!(
                    "plan rate {} above configured rate {}",
                    plan.rate, self.redistribution_rate
                )));
            }
        }
        Ok(())
    }
}
