//! Error taxonomy for the control loop.
//!
//! Every fallible operation returns `Result<_, EconError>`. Callers that only
//! care about the broad class of failure use [`EconError::kind`].

use thiserror::Error;

/// Broad classes of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Out-of-range policy parameter, rate, threshold or score
    Validation,
    /// Transition attempted from a state that does not permit it
    InvalidStateTransition,
    /// Not enough proposals/allocations/entities to proceed
    InsufficientData,
    /// Circuit breaker is open; active work must wait
    Halted,
    /// An aggregate invariant failed; indicates a defect
    Invariant,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EconError {
    #[error("expected EBIT must be positive: revenue {revenue} - cogs {cogs} - sga {sga} <= 0")]
    InvalidEbit { revenue: f64, cogs: f64, sga: f64 },

    #[error("cannot {action} while {from}")]
    InvalidStatusTransition { from: &'static str, action: &'static str },

    #[error("redistribution rate {0} outside (0, 1]")]
    InvalidRedistributionRate(f64),

    #[error("gini threshold {0} outside (0, 1]")]
    InvalidGiniThreshold(f64),

    #[error("investment pool {0} must be positive")]
    InvalidInvestmentPool(f64),

    #[error("{field} = {value} outside [0, 1]")]
    InvalidScore { field: &'static str, value: f64 },

    #[error("parameter {name} = {value} out of range")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("entrepreneur {0} already registered")]
    DuplicateEntrepreneur(String),

    #[error("entrepreneur {0} is not registered")]
    UnknownEntrepreneur(String),

    #[error("entrepreneur {entrepreneur_id} potential {potential:.3} below minimum {minimum}")]
    InsufficientPotential { entrepreneur_id: String, potential: f64, minimum: f64 },

    #[error("proposal {0} already submitted")]
    DuplicateProposal(String),

    #[error("proposal {proposal_id} creative destruction {score:.3} below minimum {minimum}")]
    InsufficientCreativeDestruction { proposal_id: String, score: f64, minimum: f64 },

    #[error("no proposals to allocate")]
    NoProposals,

    #[error("proposal {proposal_id} allocation ratio {ratio:.4} exceeds cap {cap}")]
    ConcentrationRisk { proposal_id: String, ratio: f64, cap: f64 },

    #[error("{allocations} allocations, at least {required} required")]
    InsufficientDiversification { allocations: usize, required: usize },

    #[error("proposal {0} not found")]
    UnknownProposal(String),

    #[error("milestone {milestone_id} not found on proposal {proposal_id}")]
    UnknownMilestone { proposal_id: String, milestone_id: String },

    #[error("milestone {milestone_id} on proposal {proposal_id} already rewarded")]
    MilestoneAlreadyRewarded { proposal_id: String, milestone_id: String },

    #[error("proposal {0} received no allocation")]
    UnfundedProposal(String),

    #[error("distribution plan does not match the calculated plan")]
    PlanMismatch,

    #[error("circuit breaker open: {reason}")]
    CircuitOpen { reason: String },

    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl EconError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidEbit { .. }
            | Self::InvalidRedistributionRate(_)
            | Self::InvalidGiniThreshold(_)
            | Self::InvalidInvestmentPool(_)
            | Self::InvalidScore { .. }
            | Self::InvalidParameter { .. }
            | Self::DuplicateEntrepreneur(_)
            | Self::UnknownEntrepreneur(_)
            | Self::InsufficientPotential { .. }
            | Self::DuplicateProposal(_)
            | Self::InsufficientCreativeDestruction { .. }
            | Self::ConcentrationRisk { .. }
            | Self::UnknownProposal(_)
            | Self::UnknownMilestone { .. }
            | Self::MilestoneAlreadyRewarded { .. }
            | Self::UnfundedProposal(_)
            | Self::PlanMismatch => ErrorKind::Validation,
            Self::InvalidStatusTransition { .. } => ErrorKind::InvalidStateTransition,
            Self::NoProposals | Self::InsufficientDiversification { .. } => {
                ErrorKind::InsufficientData
            }
            Self::CircuitOpen { .. } => ErrorKind::Halted,
            Self::InvariantViolation(_) => ErrorKind::Invariant,
        }
    }
}
