//! Lifecycle aggregates driven by the control loop.
//!
//! Each aggregate is a plain value. Transition methods take `&self` and
//! return the next value, so the owner replaces its copy only when a
//! transition succeeds:
//!
//! ```text
//! owner value ──(method / step(cmd))──► Result<next value, EconError>
//! ```
//!
//! Work that starts active issuance, redistribution or allocation takes a
//! [`Gate`] built from the circuit-breaker report of the current cycle.

pub mod issuance;
pub mod redistribution;
pub mod venture;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::EconError;
use crate::reliability::circuit::BreakerReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(Uuid);

impl AggregateId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AggregateId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AggregateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AggregateId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Circuit-breaker status as seen by the aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gate {
    Open,
    Halted { reason: String },
}

impl Gate {
    pub fn from_report(report: &BreakerReport) -> Self {
        if report.tripped {
            Gate::Halted { reason: report.reason.clone() }
        } else {
            Gate::Open
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Gate::Open)
    }

    pub fn ensure_open(&self) -> Result<(), EconError> {
        match self {
            Gate::Open => Ok(()),
            Gate::Halted { reason } => Err(EconError::CircuitOpen { reason: reason.clone() }),
        }
    }
}

/// Common surface used by persistence and invariant sweeps.
pub trait Aggregate: Serialize {
    const KIND: &'static str;

    fn id(&self) -> AggregateId;
    fn status_str(&self) -> &'static str;
    fn check_invariants(&self) -> Result<(), EconError>;
}

/// Hex SHA-256 of the JSON encoding of a value.
pub fn state_hash<T: Serialize>(value: &T) -> Result<String, EconError> {
    let encoded = serde_json::to_vec(value)
        .map_err(|e| EconError::InvariantViolation(format!("unserializable state: {}", e)))?;
    Ok(hex::encode(Sha256::digest(&encoded)))
}

/// Rejects NaN and values outside [0, 1].
pub(crate) fn unit_score(field: &'static str, value: f64) -> Result<f64, EconError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(EconError::InvalidScore { field, value })
    }
}
