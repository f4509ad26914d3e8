//! Full venture ecosystem lifecycle driven through commands.

use econloop::aggregate::venture::{
    EntrepreneurProfile, Milestone, VentureCommand, VentureEcosystemAggregate, VentureEventKind, VentureProposal,
    VentureStatus,
};
use econloop::aggregate::{state_hash, Aggregate, Gate};
use econloop::error::{EconError, ErrorKind};

fn profile(id: &str) -> EntrepreneurProfile {
    EntrepreneurProfile {
        id: id.to_string(),
        innovation_score: 0.9,
        execution_capability: 0.6,
        network_strength: 1.5,
        past_ventures: 2,
    }
}

fn proposal(id: &str, owner: &str, roi: f64) -> VentureProposal {
    VentureProposal {
        id: id.to_string(),
        entrepreneur_id: owner.to_string(),
        title: format!("{} platform", id),
        required_investment: 300_000.0,
        expected_roi: roi,
        innovation_level: 0.7,
        market_size: 5_000_000.0,
        competitive_advantages: vec!["network".into(), "data".into(), "brand".into()],
        milestones: vec![
            Milestone { id: "mvp".into(), description: "minimum viable product".into(), base_reward: 500.0 },
            Milestone { id: "scale".into(), description: "10k users".into(), base_reward: 2_000.0 },
        ],
    }
}

fn run(agg: VentureEcosystemAggregate, cmds: Vec<VentureCommand>) -> Result<VentureEcosystemAggregate, EconError> {
    cmds.into_iter().try_fold(agg, |acc, cmd| {
        let next = acc.step(cmd)?;
        next.check_invariants()?;
        Ok(next)
    })
}

#[test]
fn happy_path_through_completion() {
    let start = VentureEcosystemAggregate::create(1_200_000.0).unwrap();
    let cmds = vec![
        VentureCommand::RegisterEntrepreneur { profile: profile("ada") },
        VentureCommand::RegisterEntrepreneur { profile: profile("lin") },
        VentureCommand::SubmitProposal { proposal: proposal("a", "ada", 0.30) },
        VentureCommand::SubmitProposal { proposal: proposal("b", "ada", 0.30) },
        VentureCommand::SubmitProposal { proposal: proposal("c", "lin", 0.30) },
        VentureCommand::SubmitProposal { proposal: proposal("d", "lin", 0.30) },
        VentureCommand::SubmitProposal { proposal: proposal("e", "lin", 0.30) },
        VentureCommand::AllocateInvestments { gate: Gate::Open },
        VentureCommand::BeginMonitoring,
        VentureCommand::RewardMilestone { proposal_id: "a".into(), milestone_id: "mvp".into(), actual_impact: 1.2, gate: Gate::Open },
        VentureCommand::RewardMilestone { proposal_id: "c".into(), milestone_id: "scale".into(), actual_impact: 0.1, gate: Gate::Open },
        VentureCommand::Complete,
    ];
    let done = run(start, cmds).unwrap();
    assert_eq!(done.status(), VentureStatus::Completed);

    // five equal weights -> 0.2 each of 1.2M, capped at required investment
    assert_eq!(done.allocations().len(), 5);
    for a in done.allocations() {
        assert!((a.ratio - 0.2).abs() < 1e-12);
        assert!((a.amount - 240_000.0).abs() < 1e-6);
    }
    assert!((done.available_pool() - 0.0).abs() < 1e-6);
    assert!((done.total_rewards_paid() - (600.0 + 1_000.0)).abs() < 1e-9);

    let kinds: Vec<VentureEventKind> = done.events().iter().map(|e| e.kind).collect();
    assert_eq!(kinds.iter().filter(|k| **k == VentureEventKind::EntrepreneurRegistered).count(), 2);
    assert_eq!(kinds.iter().filter(|k| **k == VentureEventKind::ProposalSubmitted).count(), 5);
    assert_eq!(kinds.iter().filter(|k| **k == VentureEventKind::InvestmentApproved).count(), 5);
    assert_eq!(kinds.iter().filter(|k| **k == VentureEventKind::MilestoneAchieved).count(), 2);
    assert_eq!(kinds.last(), Some(&VentureEventKind::EcosystemCompleted));
}

#[test]
fn funding_capped_at_required_investment() {
    let start = VentureEcosystemAggregate::create(10_000_000.0).unwrap();
    let mut cmds = vec![VentureCommand::RegisterEntrepreneur { profile: profile("ada") }];
    for id in ["a", "b", "c", "d"] {
        cmds.push(VentureCommand::SubmitProposal { proposal: proposal(id, "ada", 0.5) });
    }
    cmds.push(VentureCommand::AllocateInvestments { gate: Gate::Open });
    let agg = run(start, cmds).unwrap();
    for a in agg.allocations() {
        assert_eq!(a.amount, 300_000.0);
    }
    assert!((agg.available_pool() - 8_800_000.0).abs() < 1e-6);
}

#[test]
fn high_roi_proposals_receive_nothing() {
    let start = VentureEcosystemAggregate::create(1_000_000.0).unwrap();
    let mut cmds = vec![VentureCommand::RegisterEntrepreneur { profile: profile("ada") }];
    for (id, roi) in [("a", 0.4), ("b", 0.4), ("c", 1.5), ("d", 2.0)] {
        cmds.push(VentureCommand::SubmitProposal { proposal: proposal(id, "ada", roi) });
    }
    cmds.push(VentureCommand::AllocateInvestments { gate: Gate::Open });
    let err = run(start, cmds).unwrap_err();
    assert!(matches!(err, EconError::InsufficientDiversification { allocations: 2, .. }));
}

#[test]
fn rejected_command_keeps_last_good_value() {
    let agg = run(
        VentureEcosystemAggregate::create(500_000.0).unwrap(),
        vec![VentureCommand::RegisterEntrepreneur { profile: profile("ada") }],
    )
    .unwrap();
    let hash = state_hash(&agg).unwrap();

    let err = agg.step(VentureCommand::BeginMonitoring).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
    let err = agg
        .step(VentureCommand::SubmitProposal { proposal: proposal("x", "ghost", 0.2) })
        .unwrap_err();
    assert!(matches!(err, EconError::UnknownEntrepreneur(_)));
    assert_eq!(state_hash(&agg).unwrap(), hash);
}

#[test]
fn suspension_is_logged_and_reason_updates() {
    let agg = VentureEcosystemAggregate::create(500_000.0).unwrap();
    let first = agg.suspend("regulatory review").unwrap();
    let second = first.suspend("extended review").unwrap();
    assert_eq!(second.suspension_reason(), Some("extended review"));
    let suspended: Vec<_> = second
        .events()
        .iter()
        .filter(|e| e.kind == VentureEventKind::EcosystemSuspended)
        .map(|e| e.detail.as_str())
        .collect();
    assert_eq!(suspended, vec!["regulatory review", "extended review"]);
    assert!(second.register_entrepreneur(profile("ada")).is_err());
}

#[test]
fn aggregate_state_round_trips_through_json() {
    let agg = run(
        VentureEcosystemAggregate::create(900_000.0).unwrap(),
        vec![
            VentureCommand::RegisterEntrepreneur { profile: profile("ada") },
            VentureCommand::SubmitProposal { proposal: proposal("a", "ada", 0.1 + 0.2) },
        ],
    )
    .unwrap();
    let json = serde_json::to_string(&agg).unwrap();
    let back: VentureEcosystemAggregate = serde_json::from_str(&json).unwrap();
    assert_eq!(back, agg);
    assert_eq!(state_hash(&back).unwrap(), state_hash(&agg).unwrap());
}
