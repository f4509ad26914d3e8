//! Venture ecosystem: onboarding, proposal evaluation, diversified
//! allocation of a fixed pool and milestone rewards.
//!
//! ```text
//! ECOSYSTEM_BUILDING → RECRUITING_ENTREPRENEURS → EVALUATING_PROPOSALS
//!     → ALLOCATING_INVESTMENTS → MONITORING_VENTURES → REWARDING_ACHIEVEMENTS
//!     → COMPLETED
//! ```
//!
//! SUSPENDED is reachable from every state except COMPLETED. Every
//! successful operation appends to the event log; the log is never edited.
//!
//! Diversification rules:
//! - no allocation ratio above [`MAX_ALLOCATION_RATIO`]
//! - at least [`MIN_ALLOCATIONS`] allocations
//! - ratios sum to at most 1

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{unit_score, Aggregate, AggregateId, Gate};
use crate::error::EconError;
use crate::logging::{log_rejected, log_transition, Domain};

pub const MAX_ALLOCATION_RATIO: f64 = 0.25;
pub const MIN_ALLOCATIONS: usize = 3;
pub const MIN_ENTREPRENEURIAL_POTENTIAL: f64 = 0.30;
pub const MIN_CREATIVE_DESTRUCTION: f64 = 0.20;
const MIN_IMPACT_MULTIPLIER: f64 = 0.5;
const MAX_IMPACT_MULTIPLIER: f64 = 2.0;
const RATIO_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VentureStatus {
    EcosystemBuilding,
    RecruitingEntrepreneurs,
    EvaluatingProposals,
    AllocatingInvestments,
    MonitoringVentures,
    RewardingAchievements,
    Completed,
    Suspended,
}

impl VentureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EcosystemBuilding => "ecosystem_building",
            Self::RecruitingEntrepreneurs => "recruiting_entrepreneurs",
            Self::EvaluatingProposals => "evaluating_proposals",
            Self::AllocatingInvestments => "allocating_investments",
            Self::MonitoringVentures => "monitoring_ventures",
            Self::RewardingAchievements => "rewarding_achievements",
            Self::Completed => "completed",
            Self::Suspended => "suspended",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrepreneurProfile {
    pub id: String,
    pub innovation_score: f64,
    pub execution_capability: f64,
    /// Unbounded; only the first 1.0 counts toward potential
    pub network_strength: f64,
    pub past_ventures: u32,
}

impl EntrepreneurProfile {
    /// `0.4·innovation + 0.4·execution + 0.2·min(1, network) + min(0.3, 0.1·past)`
    pub fn potential(&self) -> f64 {
        0.4 * self.innovation_score
            + 0.4 * self.execution_capability
            + 0.2 * self.network_strength.min(1.0)
            + (0.1 * self.past_ventures as f64).min(0.3)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub description: String,
    pub base_reward: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VentureProposal {
    pub id: String,
    pub entrepreneur_id: String,
    pub title: String,
    pub required_investment: f64,
    pub expected_roi: f64,
    pub innovation_level: f64,
    pub market_size: f64,
    pub competitive_advantages: Vec<String>,
    pub milestones: Vec<Milestone>,
}

impl VentureProposal {
    /// `0.4·innovation + 0.3·min(1, market/1e6) + 0.3·min(1, advantages/5)`
    pub fn creative_destruction_potential(&self) -> f64 {
        0.4 * self.innovation_level
            + 0.3 * (self.market_size / 1_000_000.0).min(1.0)
            + 0.3 * (self.competitive_advantages.len() as f64 / 5.0).min(1.0)
    }

    pub fn milestone(&self, milestone_id: &str) -> Option<&Milestone> {
        self.milestones.iter().find(|m| m.id == milestone_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentAllocation {
    pub proposal_id: String,
    pub ratio: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VentureEventKind {
    EntrepreneurRegistered,
    ProposalSubmitted,
    InvestmentApproved,
    MilestoneAchieved,
    EcosystemCompleted,
    EcosystemSuspended,
}

/// One entry of the append-only audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VentureEvent {
    pub seq: u64,
    pub kind: VentureEventKind,
    /// Entrepreneur, proposal or aggregate the event is about
    pub subject_id: String,
    pub amount: Option<f64>,
    pub detail: String,
    pub at: DateTime<Utc>,
}

/// `base × clamp(actual_impact, 0.5, 2.0)`
pub fn milestone_reward(base_reward: f64, actual_impact: f64) -> f64 {
    base_reward * actual_impact.clamp(MIN_IMPACT_MULTIPLIER, MAX_IMPACT_MULTIPLIER)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VentureCommand {
    RegisterEntrepreneur { profile: EntrepreneurProfile },
    SubmitProposal { proposal: VentureProposal },
    AllocateInvestments { gate: Gate },
    BeginMonitoring,
    RewardMilestone { proposal_id: String, milestone_id: String, actual_impact: f64, gate: Gate },
    Complete,
    Suspend { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VentureEcosystemAggregate {
    id: AggregateId,
    status: VentureStatus,
    entrepreneurs: Vec<EntrepreneurProfile>,
    proposals: Vec<VentureProposal>,
    allocations: Vec<InvestmentAllocation>,
    events: Vec<VentureEvent>,
    total_investment_pool: f64,
    total_rewards_paid: f64,
    rewarded_milestones: Vec<(String, String)>,
    suspension_reason: Option<String>,
}

impl VentureEcosystemAggregate {
    pub fn create(total_investment_pool: f64) -> Result<Self, EconError> {
        if !total_investment_pool.is_finite() || total_investment_pool <= 0.0 {
            return Err(EconError::InvalidInvestmentPool(total_investment_pool));
        }
        let agg = Self {
            id: AggregateId::new(),
            status: VentureStatus::EcosystemBuilding,
            entrepreneurs: Vec::new(),
            proposals: Vec::new(),
            allocations: Vec::new(),
            events: Vec::new(),
            total_investment_pool,
            total_rewards_paid: 0.0,
            rewarded_milestones: Vec::new(),
            suspension_reason: None,
        };
        log_transition(Domain::Venture, &agg.id.to_string(), "none", agg.status.as_str(), "create");
        Ok(agg)
    }

    pub fn status(&self) -> VentureStatus {
        self.status
    }

    pub fn entrepreneurs(&self) -> &[EntrepreneurProfile] {
        &self.entrepreneurs
    }

    pub fn proposals(&self) -> &[VentureProposal] {
        &self.proposals
    }

    pub fn allocations(&self) -> &[InvestmentAllocation] {
        &self.allocations
    }

    pub fn events(&self) -> &[VentureEvent] {
        &self.events
    }

    pub fn total_investment_pool(&self) -> f64 {
        self.total_investment_pool
    }

    /// Pool left after allocations.
    pub fn available_pool(&self) -> f64 {
        self.total_investment_pool - self.allocations.iter().map(|a| a.amount).sum::<f64>()
    }

    pub fn total_rewards_paid(&self) -> f64 {
        self.total_rewards_paid
    }

    pub fn suspension_reason(&self) -> Option<&str> {
        self.suspension_reason.as_deref()
    }

    fn require(&self, allowed: &[VentureStatus], action: &'static str) -> Result<(), EconError> {
        if allowed.contains(&self.status) {
            return Ok(());
        }
        Err(self.refuse(
            action,
            EconError::InvalidStatusTransition { from: self.status.as_str(), action },
        ))
    }

    fn refuse(&self, action: &str, err: EconError) -> EconError {
        log_rejected(Domain::Venture, &self.id.to_string(), action, &err.to_string());
        err
    }

    fn record(&mut self, kind: VentureEventKind, subject_id: &str, amount: Option<f64>, detail: String) {
        let seq = self.events.len() as u64;
        self.events.push(VentureEvent {
            seq,
            kind,
            subject_id: subject_id.to_string(),
            amount,
            detail,
            at: Utc::now(),
        });
    }

    fn moved(mut self, status: VentureStatus, action: &str) -> Self {
        if status != self.status {
            log_transition(Domain::Venture, &self.id.to_string(), self.status.as_str(), status.as_str(), action);
        }
        self.status = status;
        self
    }

    pub fn register_entrepreneur(&self, profile: EntrepreneurProfile) -> Result<Self, EconError> {
        const ACTION: &str = "register_entrepreneur";
        self.require(
            &[VentureStatus::EcosystemBuilding, VentureStatus::RecruitingEntrepreneurs],
            ACTION,
        )?;
        unit_score("innovation_score", profile.innovation_score).map_err(|e| self.refuse(ACTION, e))?;
        unit_score("execution_capability", profile.execution_capability).map_err(|e| self.refuse(ACTION, e))?;
        if !profile.network_strength.is_finite() || profile.network_strength < 0.0 {
            return Err(self.refuse(
                ACTION,
                EconError::InvalidParameter { name: "network_strength", value: profile.network_strength },
            ));
        }
        if self.entrepreneurs.iter().any(|e| e.id == profile.id) {
            return Err(self.refuse(ACTION, EconError::DuplicateEntrepreneur(profile.id)));
        }
        let potential = profile.potential();
        if potential < MIN_ENTREPRENEURIAL_POTENTIAL {
            return Err(self.refuse(
                ACTION,
                EconError::InsufficientPotential {
                    entrepreneur_id: profile.id,
                    potential,
                    minimum: MIN_ENTREPRENEURIAL_POTENTIAL,
                },
            ));
        }

        let mut next = self.clone();
        next.record(
            VentureEventKind::EntrepreneurRegistered,
            &profile.id,
            None,
            format!("potential {:.3}", potential),
        );
        next.entrepreneurs.push(profile);
        Ok(next.moved(VentureStatus::RecruitingEntrepreneurs, ACTION))
    }

    pub fn submit_venture_proposal(&self, proposal: VentureProposal) -> Result<Self, EconError> {
        const ACTION: &str = "submit_venture_proposal";
        self.require(
            &[VentureStatus::RecruitingEntrepreneurs, VentureStatus::EvaluatingProposals],
            ACTION,
        )?;
        if !self.entrepreneurs.iter().any(|e| e.id == proposal.entrepreneur_id) {
            return Err(self.refuse(ACTION, EconError::UnknownEntrepreneur(proposal.entrepreneur_id)));
        }
        if self.proposals.iter().any(|p| p.id == proposal.id) {
            return Err(self.refuse(ACTION, EconError::DuplicateProposal(proposal.id)));
        }
        let positive = [
            ("required_investment", proposal.required_investment),
            ("expected_roi", proposal.expected_roi),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(self.refuse(ACTION, EconError::InvalidParameter { name, value }));
            }
        }
        unit_score("innovation_level", proposal.innovation_level).map_err(|e| self.refuse(ACTION, e))?;
        if !proposal.market_size.is_finite() || proposal.market_size < 0.0 {
            return Err(self.refuse(
                ACTION,
                EconError::InvalidParameter { name: "market_size", value: proposal.market_size },
            ));
        }
        if let Some(m) = proposal
            .milestones
            .iter()
            .find(|m| !m.base_reward.is_finite() || m.base_reward < 0.0)
        {
            return Err(self.refuse(
                ACTION,
                EconError::InvalidParameter { name: "base_reward", value: m.base_reward },
            ));
        }
        let score = proposal.creative_destruction_potential();
        if score < MIN_CREATIVE_DESTRUCTION {
            return Err(self.refuse(
                ACTION,
                EconError::InsufficientCreativeDestruction {
                    proposal_id: proposal.id,
                    score,
                    minimum: MIN_CREATIVE_DESTRUCTION,
                },
            ));
        }

        let mut next = self.clone();
        next.record(
            VentureEventKind::ProposalSubmitted,
            &proposal.id,
            Some(proposal.required_investment),
            format!("creative destruction {:.3}", score),
        );
        next.proposals.push(proposal);
        Ok(next.moved(VentureStatus::EvaluatingProposals, ACTION))
    }

    /// Risk-weighted split of the pool across proposals.
    ///
    /// A proposal's weight is `1 − expected_roi`; proposals with a
    /// non-positive weight get nothing and the rest are normalized. Each
    /// allocation is funded up to its required investment.
    pub fn allocate_investments(&self, gate: &Gate) -> Result<Self, EconError> {
        const ACTION: &str = "allocate_investments";
        self.require(&[VentureStatus::EvaluatingProposals], ACTION)?;
        gate.ensure_open().map_err(|e| self.refuse(ACTION, e))?;
        if self.proposals.is_empty() {
            return Err(self.refuse(ACTION, EconError::NoProposals));
        }

        let weighted: Vec<(&VentureProposal, f64)> = self
            .proposals
            .iter()
            .map(|p| (p, 1.0 - p.expected_roi))
            .filter(|(_, w)| *w > 0.0)
            .collect();
        if weighted.len() < MIN_ALLOCATIONS {
            return Err(self.refuse(
                ACTION,
                EconError::InsufficientDiversification {
                    allocations: weighted.len(),
                    required: MIN_ALLOCATIONS,
                },
            ));
        }
        let total_weight: f64 = weighted.iter().map(|(_, w)| w).sum();

        let mut allocations = Vec::with_capacity(weighted.len());
        for (proposal, weight) in weighted {
            let ratio = weight / total_weight;
            if ratio > MAX_ALLOCATION_RATIO + RATIO_EPSILON {
                return Err(self.refuse(
                    ACTION,
                    EconError::ConcentrationRisk {
                        proposal_id: proposal.id.clone(),
                        ratio,
                        cap: MAX_ALLOCATION_RATIO,
                    },
                ));
            }
            let ratio = ratio.min(MAX_ALLOCATION_RATIO);
            allocations.push(InvestmentAllocation {
                proposal_id: proposal.id.clone(),
                ratio,
                amount: (ratio * self.total_investment_pool).min(proposal.required_investment),
            });
        }

        let mut next = self.clone();
        for a in &allocations {
            next.record(
                VentureEventKind::InvestmentApproved,
                &a.proposal_id,
                Some(a.amount),
                format!("ratio {:.4}", a.ratio),
            );
        }
        next.allocations = allocations;
        Ok(next.moved(VentureStatus::AllocatingInvestments, ACTION))
    }

    pub fn begin_monitoring(&self) -> Result<Self, EconError> {
        self.require(&[VentureStatus::AllocatingInvestments], "begin_monitoring")?;
        Ok(self.clone().moved(VentureStatus::MonitoringVentures, "begin_monitoring"))
    }

    /// Pays a milestone of a funded proposal; refused while the breaker is open.
    pub fn reward_milestone_achievement(
        &self,
        proposal_id: &str,
        milestone_id: &str,
        actual_impact: f64,
        gate: &Gate,
    ) -> Result<Self, EconError> {
        const ACTION: &str = "reward_milestone_achievement";
        self.require(
            &[
                VentureStatus::AllocatingInvestments,
                VentureStatus::MonitoringVentures,
                VentureStatus::RewardingAchievements,
            ],
            ACTION,
        )?;
        gate.ensure_open().map_err(|e| self.refuse(ACTION, e))?;
        if actual_impact.is_nan() {
            return Err(self.refuse(
                ACTION,
                EconError::InvalidParameter { name: "actual_impact", value: actual_impact },
            ));
        }
        let proposal = self
            .proposals
            .iter()
            .find(|p| p.id == proposal_id)
            .ok_or_else(|| self.refuse(ACTION, EconError::UnknownProposal(proposal_id.to_string())))?;
        let milestone = proposal.milestone(milestone_id).ok_or_else(|| {
            self.refuse(
                ACTION,
                EconError::UnknownMilestone {
                    proposal_id: proposal_id.to_string(),
                    milestone_id: milestone_id.to_string(),
                },
            )
        })?;
        if !self.allocations.iter().any(|a| a.proposal_id == proposal_id) {
            return Err(self.refuse(ACTION, EconError::UnfundedProposal(proposal_id.to_string())));
        }
        if self
            .rewarded_milestones
            .iter()
            .any(|(p, m)| p == proposal_id && m == milestone_id)
        {
            return Err(self.refuse(
                ACTION,
                EconError::MilestoneAlreadyRewarded {
                    proposal_id: proposal_id.to_string(),
                    milestone_id: milestone_id.to_string(),
                },
            ));
        }

        let reward = milestone_reward(milestone.base_reward, actual_impact);
        let mut next = self.clone();
        next.total_rewards_paid += reward;
        next.rewarded_milestones.push((proposal_id.to_string(), milestone_id.to_string()));
        next.record(
            VentureEventKind::MilestoneAchieved,
            proposal_id,
            Some(reward),
            format!("milestone {} impact {:.3}", milestone_id, actual_impact),
        );
        Ok(next.moved(VentureStatus::RewardingAchievements, ACTION))
    }

    pub fn complete(&self) -> Result<Self, EconError> {
        if self.status == VentureStatus::Completed {
            return Err(self.refuse(
                "complete",
                EconError::InvalidStatusTransition { from: self.status.as_str(), action: "complete" },
            ));
        }
        let mut next = self.clone();
        let subject = self.id.to_string();
        next.record(
            VentureEventKind::EcosystemCompleted,
            &subject,
            Some(self.total_rewards_paid),
            format!("{} allocations", self.allocations.len()),
        );
        Ok(next.moved(VentureStatus::Completed, "complete"))
    }

    pub fn suspend(&self, reason: &str) -> Result<Self, EconError> {
        if self.status == VentureStatus::Completed {
            return Err(self.refuse(
                "suspend",
                EconError::InvalidStatusTransition { from: self.status.as_str(), action: "suspend" },
            ));
        }
        let mut next = self.clone();
        let subject = self.id.to_string();
        next.record(VentureEventKind::EcosystemSuspended, &subject, None, reason.to_string());
        next.suspension_reason = Some(reason.to_string());
        Ok(next.moved(VentureStatus::Suspended, "suspend"))
    }

    /// Invariants that hold at every observation point.
    pub fn validate_invariants(&self) -> Result<(), EconError> {
        let slack = RATIO_EPSILON * self.total_investment_pool.max(1.0);
        if self.total_investment_pool < 0.0 || self.available_pool() < -slack {
            return Err(EconError::InvariantViolation(format!(
                "pool {} / available {} negative",
                self.total_investment_pool,
                self.available_pool()
            )));
        }
        for e in &self.entrepreneurs {
            if !(0.0..=1.0).contains(&e.innovation_score) || !(0.0..=1.0).contains(&e.execution_capability) {
                return Err(EconError::InvariantViolation(format!(
                    "entrepreneur {} scores outside [0, 1]",
                    e.id
                )));
            }
        }
        if let Some(a) = self
            .allocations
            .iter()
            .find(|a| a.ratio > MAX_ALLOCATION_RATIO + RATIO_EPSILON)
        {
            return Err(EconError::InvariantViolation(format!(
                "allocation {} ratio {} above cap",
                a.proposal_id, a.ratio
            )));
        }
        let ratio_sum: f64 = self.allocations.iter().map(|a| a.ratio).sum();
        if ratio_sum > 1.0 + RATIO_EPSILON {
            return Err(EconError::InvariantViolation(format!("allocation ratios sum to {}", ratio_sum)));
        }
        if !self.allocations.is_empty() && self.allocations.len() < MIN_ALLOCATIONS {
            return Err(EconError::InvariantViolation(format!(
                "{} allocations finalized",
                self.allocations.len()
            )));
        }
        Ok(())
    }

    pub fn step(&self, cmd: VentureCommand) -> Result<Self, EconError> {
        match cmd {
            VentureCommand::RegisterEntrepreneur { profile } => self.register_entrepreneur(profile),
            VentureCommand::SubmitProposal { proposal } => self.submit_venture_proposal(proposal),
            VentureCommand::AllocateInvestments { gate } => self.allocate_investments(&gate),
            VentureCommand::BeginMonitoring => self.begin_monitoring(),
            VentureCommand::RewardMilestone { proposal_id, milestone_id, actual_impact, gate } => {
                self.reward_milestone_achievement(&proposal_id, &milestone_id, actual_impact, &gate)
            }
            VentureCommand::Complete => self.complete(),
            VentureCommand::Suspend { reason } => self.suspend(&reason),
        }
    }
}

impl Aggregate for VentureEcosystemAggregate {
    const KIND: &'static str = "venture";

    fn id(&self) -> AggregateId {
        self.id
    }

    fn status_str(&self) -> &'static str {
        self.status.as_str()
    }

    fn check_invariants(&self) -> Result<(), EconError> {
        self.validate_invariants()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn founder(id: &str) -> EntrepreneurProfile {
        EntrepreneurProfile {
            id: id.to_string(),
            innovation_score: 0.8,
            execution_capability: 0.7,
            network_strength: 0.5,
            past_ventures: 1,
        }
    }

    fn proposal(id: &str, roi: f64) -> VentureProposal {
        VentureProposal {
            id: id.to_string(),
            entrepreneur_id: "e1".to_string(),
            title: format!("venture {}", id),
            required_investment: 500_000.0,
            expected_roi: roi,
            innovation_level: 0.8,
            market_size: 2_000_000.0,
            competitive_advantages: vec!["speed".into(), "cost".into()],
            milestones: vec![Milestone {
                id: "m1".into(),
                description: "beta launch".into(),
                base_reward: 1_000.0,
            }],
        }
    }

    fn with_proposals(rois: &[f64]) -> VentureEcosystemAggregate {
        let mut agg = VentureEcosystemAggregate::create(1_000_000.0)
            .unwrap()
            .register_entrepreneur(founder("e1"))
            .unwrap();
        for (i, roi) in rois.iter().enumerate() {
            agg = agg.submit_venture_proposal(proposal(&format!("p{}", i), *roi)).unwrap();
        }
        agg
    }

    #[test]
    fn test_create_rejects_non_positive_pool() {
        assert!(matches!(
            VentureEcosystemAggregate::create(0.0),
            Err(EconError::InvalidInvestmentPool(_))
        ));
        assert!(VentureEcosystemAggregate::create(-5.0).is_err());
    }

    #[test]
    fn test_potential_formula() {
        // 0.32 + 0.28 + 0.1 + 0.1
        assert!((founder("x").potential() - 0.8).abs() < 1e-12);
        let veteran = EntrepreneurProfile { past_ventures: 10, network_strength: 4.0, ..founder("v") };
        // 0.32 + 0.28 + 0.2 + 0.3
        assert!((veteran.potential() - 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_register_validation() {
        let agg = VentureEcosystemAggregate::create(1_000.0).unwrap();
        let bad = EntrepreneurProfile { innovation_score: 1.2, ..founder("a") };
        assert!(matches!(agg.register_entrepreneur(bad), Err(EconError::InvalidScore { .. })));

        let weak = EntrepreneurProfile {
            innovation_score: 0.1,
            execution_capability: 0.1,
            network_strength: 0.1,
            past_ventures: 0,
            id: "w".into(),
        };
        assert!(matches!(
            agg.register_entrepreneur(weak),
            Err(EconError::InsufficientPotential { .. })
        ));

        let one = agg.register_entrepreneur(founder("a")).unwrap();
        assert_eq!(one.status(), VentureStatus::RecruitingEntrepreneurs);
        assert!(matches!(
            one.register_entrepreneur(founder("a")),
            Err(EconError::DuplicateEntrepreneur(_))
        ));
        assert_eq!(one.events().len(), 1);
        assert_eq!(one.events()[0].kind, VentureEventKind::EntrepreneurRegistered);
    }

    #[test]
    fn test_submit_requires_registered_proposer() {
        let agg = VentureEcosystemAggregate::create(1_000.0)
            .unwrap()
            .register_entrepreneur(founder("e1"))
            .unwrap();
        let stranger = VentureProposal { entrepreneur_id: "nobody".into(), ..proposal("p", 0.2) };
        assert!(matches!(
            agg.submit_venture_proposal(stranger),
            Err(EconError::UnknownEntrepreneur(_))
        ));

        let no_roi = proposal("p", 0.0);
        assert!(agg.submit_venture_proposal(no_roi).is_err());

        let dull = VentureProposal {
            innovation_level: 0.1,
            market_size: 10_000.0,
            competitive_advantages: Vec::new(),
            ..proposal("p", 0.2)
        };
        assert!(matches!(
            agg.submit_venture_proposal(dull),
            Err(EconError::InsufficientCreativeDestruction { .. })
        ));

        let ok = agg.submit_venture_proposal(proposal("p", 0.2)).unwrap();
        assert_eq!(ok.status(), VentureStatus::EvaluatingProposals);
        assert_eq!(ok.events().last().unwrap().kind, VentureEventKind::ProposalSubmitted);
    }

    #[test]
    fn test_two_proposals_insufficient_diversification() {
        let agg = with_proposals(&[0.2, 0.3]);
        let err = agg.allocate_investments(&Gate::Open).unwrap_err();
        assert!(matches!(err, EconError::InsufficientDiversification { allocations: 2, required: 3 }));
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
    }

    #[test]
    fn test_uneven_weights_concentration_risk() {
        // weights 0.9, 0.2, 0.2, 0.2 -> first ratio 0.6
        let agg = with_proposals(&[0.1, 0.8, 0.8, 0.8]);
        let err = agg.allocate_investments(&Gate::Open).unwrap_err();
        assert!(matches!(err, EconError::ConcentrationRisk { ref proposal_id, .. } if proposal_id == "p0"));
    }

    #[test]
    fn test_even_allocation_succeeds() {
        let agg = with_proposals(&[0.2, 0.2, 0.2, 0.2]).allocate_investments(&Gate::Open).unwrap();
        assert_eq!(agg.status(), VentureStatus::AllocatingInvestments);
        assert_eq!(agg.allocations().len(), 4);
        for a in agg.allocations() {
            assert!((a.ratio - 0.25).abs() < 1e-12);
            assert!((a.amount - 250_000.0).abs() < 1e-6);
        }
        let approvals = agg
            .events()
            .iter()
            .filter(|e| e.kind == VentureEventKind::InvestmentApproved)
            .count();
        assert_eq!(approvals, 4);
        assert!(agg.available_pool().abs() < 1e-6);
        assert!(agg.validate_invariants().is_ok());
    }

    #[test]
    fn test_allocation_blocked_by_open_breaker() {
        let agg = with_proposals(&[0.2, 0.2, 0.2, 0.2]);
        let err = agg.allocate_investments(&Gate::Halted { reason: "liquidity".into() }).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Halted);
    }

    #[test]
    fn test_milestone_reward_clamped() {
        assert_eq!(milestone_reward(100.0, 5.0), 200.0);
        assert_eq!(milestone_reward(100.0, 0.1), 50.0);
        assert_eq!(milestone_reward(100.0, 1.5), 150.0);
        let mut last = 0.0;
        for i in 0..=40 {
            let r = milestone_reward(100.0, i as f64 * 0.1);
            assert!(r >= last);
            last = r;
        }
    }

    #[test]
    fn test_reward_flow() {
        let agg = with_proposals(&[0.2, 0.2, 0.2, 0.2])
            .allocate_investments(&Gate::Open)
            .unwrap()
            .begin_monitoring()
            .unwrap();
        assert!(matches!(
            agg.reward_milestone_achievement("missing", "m1", 1.0, &Gate::Open),
            Err(EconError::UnknownProposal(_))
        ));
        assert!(matches!(
            agg.reward_milestone_achievement("p1", "m9", 1.0, &Gate::Open),
            Err(EconError::UnknownMilestone { .. })
        ));
        let rewarded = agg.reward_milestone_achievement("p1", "m1", 5.0, &Gate::Open).unwrap();
        assert_eq!(rewarded.status(), VentureStatus::RewardingAchievements);
        assert_eq!(rewarded.total_rewards_paid(), 2_000.0);
        let last = rewarded.events().last().unwrap();
        assert_eq!(last.kind, VentureEventKind::MilestoneAchieved);
        assert_eq!(last.amount, Some(2_000.0));
        assert!(matches!(
            rewarded.reward_milestone_achievement("p1", "m1", 1.0, &Gate::Open),
            Err(EconError::MilestoneAlreadyRewarded { .. })
        ));
    }

    #[test]
    fn test_reward_refused_when_breaker_trips_mid_lifecycle() {
        let monitoring = with_proposals(&[0.2, 0.2, 0.2, 0.2])
            .allocate_investments(&Gate::Open)
            .unwrap()
            .begin_monitoring()
            .unwrap();
        let halted = Gate::Halted { reason: "price volatility 0.3100 exceeds threshold 0.1500".into() };
        let err = monitoring
            .step(VentureCommand::RewardMilestone {
                proposal_id: "p1".into(),
                milestone_id: "m1".into(),
                actual_impact: 1.0,
                gate: halted,
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Halted);
        assert_eq!(monitoring.total_rewards_paid(), 0.0);
        assert_eq!(monitoring.status(), VentureStatus::MonitoringVentures);
    }

    #[test]
    fn test_reward_requires_funded_proposal() {
        // p4 has ROI 1.5 and receives no allocation
        let allocated = with_proposals(&[0.2, 0.2, 0.2, 0.2, 1.5])
            .allocate_investments(&Gate::Open)
            .unwrap();
        assert_eq!(allocated.allocations().len(), 4);
        let err = allocated
            .reward_milestone_achievement("p4", "m1", 1.0, &Gate::Open)
            .unwrap_err();
        assert_eq!(err, EconError::UnfundedProposal("p4".into()));
        assert!(allocated.reward_milestone_achievement("p0", "m1", 1.0, &Gate::Open).is_ok());
    }

    #[test]
    fn test_complete_and_suspend_terminal_rules() {
        let agg = with_proposals(&[0.2]);
        let suspended = agg.suspend("audit").unwrap();
        assert_eq!(suspended.status(), VentureStatus::Suspended);
        assert!(suspended.submit_venture_proposal(proposal("q", 0.2)).is_err());

        let done = suspended.complete().unwrap();
        assert_eq!(done.status(), VentureStatus::Completed);
        assert_eq!(done.complete().unwrap_err().kind(), ErrorKind::InvalidStateTransition);
        assert!(done.suspend("again").is_err());
    }

    #[test]
    fn test_event_log_is_append_only() {
        let a = with_proposals(&[0.2, 0.2]);
        let before = a.events().to_vec();
        let b = a.submit_venture_proposal(proposal("p9", 0.2)).unwrap();
        assert_eq!(&b.events()[..before.len()], &before[..]);
        for (i, e) in b.events().iter().enumerate() {
            assert_eq!(e.seq, i as u64);
        }
    }

    #[test]
    fn test_failed_transition_leaves_value_untouched() {
        let agg = with_proposals(&[0.2, 0.3]);
        let snapshot = agg.clone();
        let _ = agg.allocate_investments(&Gate::Open);
        assert_eq!(agg, snapshot);
    }
}
