//! Seeded stress run over the control loop and the aggregates.
//!
//! Random snapshots go through the loop; random command sequences drive
//! venture and redistribution aggregates with the cycle's gate. Invariants
//! are checked after every accepted step.
//!
//! Usage: SEED=7 CYCLES=500 cargo run --release --bin stress

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use chrono::{Duration, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::json;

use econloop::aggregate::redistribution::{
    gini_coefficient, DistributionPlan, DormantHolding, RedistributionAggregate, RedistributionCommand, RedistributionStatus,
};
use econloop::aggregate::venture::{
    EntrepreneurProfile, Milestone, VentureCommand, VentureEcosystemAggregate, VentureProposal, VentureStatus,
};
use econloop::aggregate::{Aggregate, Gate};
use econloop::control::ControlLoop;
use econloop::error::EconError;
use econloop::state::{EconomicSystemState, PolicyConfig};

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn random_snapshot(rng: &mut StdRng, cycle: u64) -> EconomicSystemState {
    EconomicSystemState {
        total_pmp_supply: rng.gen_range(1e6..1e8),
        total_pmc_supply: rng.gen_range(1e5..1e7),
        current_ebit_rate: rng.gen_range(0.0..0.1),
        inflation_rate: rng.gen_range(-0.02..0.12),
        output_gap: rng.gen_range(-0.1..0.1),
        liquidity_ratio: rng.gen_range(0.0..0.4),
        daily_issuance_volume: rng.gen_range(0.0..1.2e6),
        price_volatility: rng.gen_range(0.0..0.4),
        timestamp: Utc::now() + Duration::days(cycle as i64),
    }
}

fn random_profile(rng: &mut StdRng, id: usize) -> EntrepreneurProfile {
    EntrepreneurProfile {
        id: format!("e{}", id),
        innovation_score: rng.gen_range(0.0..1.0),
        execution_capability: rng.gen_range(0.0..1.0),
        network_strength: rng.gen_range(0.0..2.0),
        past_ventures: rng.gen_range(0..5),
    }
}

fn random_proposal(rng: &mut StdRng, id: usize, entrepreneur: usize) -> VentureProposal {
    let advantages = rng.gen_range(0..6);
    VentureProposal {
        id: format!("p{}", id),
        entrepreneur_id: format!("e{}", entrepreneur),
        title: format!("venture {}", id),
        required_investment: rng.gen_range(1e4..5e5),
        expected_roi: rng.gen_range(0.05..0.9),
        innovation_level: rng.gen_range(0.0..1.0),
        market_size: rng.gen_range(0.0..3e6),
        competitive_advantages: (0..advantages).map(|i| format!("adv{}", i)).collect(),
        milestones: vec![Milestone {
            id: "m1".into(),
            description: "first milestone".into(),
            base_reward: rng.gen_range(100.0..5_000.0),
        }],
    }
}

fn venture_command(rng: &mut StdRng, agg: &VentureEcosystemAggregate, gate: &Gate, n: usize) -> VentureCommand {
    let entrepreneurs = agg.entrepreneurs().len().max(1);
    match rng.gen_range(0..100) {
        0..=29 => VentureCommand::RegisterEntrepreneur { profile: random_profile(rng, n) },
        30..=64 => {
            let owner = rng.gen_range(0..entrepreneurs);
            VentureCommand::SubmitProposal { proposal: random_proposal(rng, n, owner) }
        }
        65..=74 => VentureCommand::AllocateInvestments { gate: gate.clone() },
        75..=79 => VentureCommand::BeginMonitoring,
        80..=93 => VentureCommand::RewardMilestone {
            proposal_id: format!("p{}", rng.gen_range(0..n.max(1))),
            milestone_id: "m1".into(),
            actual_impact: rng.gen_range(0.0..3.0),
            gate: gate.clone(),
        },
        94..=97 => VentureCommand::Suspend { reason: "stress".into() },
        _ => VentureCommand::Complete,
    }
}

fn redistribution_command(rng: &mut StdRng, agg: &RedistributionAggregate, gate: &Gate) -> RedistributionCommand {
    match agg.status() {
        RedistributionStatus::Idle => RedistributionCommand::StartScan { gate: gate.clone() },
        RedistributionStatus::Scanning => RedistributionCommand::RecordDormantHoldings {
            holdings: (0..rng.gen_range(0..8))
                .map(|i| DormantHolding {
                    account_id: format!("a{}", i),
                    amount: rng.gen_range(0.0..1e4),
                    dormant_days: rng.gen_range(180..720),
                })
                .collect(),
        },
        RedistributionStatus::Analyzing => {
            let balances: Vec<f64> = (0..10).map(|_| rng.gen_range(0.0..1e3)).collect();
            RedistributionCommand::AnalyzeNeed { current_gini: gini_coefficient(&balances) }
        }
        RedistributionStatus::Calculating => RedistributionCommand::CalculateDistribution {
            recipients: (0..rng.gen_range(0..6)).map(|i| format!("r{}", i)).collect(),
            rate: rng.gen_range(0.01..1.0),
        },
        RedistributionStatus::Redistributing | RedistributionStatus::Completed => {
            let plan = agg.plan().cloned().unwrap_or(DistributionPlan {
                rate: agg.redistribution_rate(),
                pool: 0.0,
                allocations: Vec::new(),
            });
            RedistributionCommand::Execute { plan, gate: gate.clone() }
        }
    }
}

fn tally(counts: &mut BTreeMap<String, u64>, result: &Result<(), EconError>) {
    let key = match result {
        Ok(()) => "accepted".to_string(),
        Err(e) => format!("{:?}", e.kind()),
    };
    *counts.entry(key).or_default() += 1;
}

fn main() -> Result<()> {
    let seed = env_u64("SEED", 42);
    let cycles = env_u64("CYCLES", 200);
    let steps = env_u64("STEPS", 8) as usize;
    let mut rng = StdRng::seed_from_u64(seed);

    let cfg = PolicyConfig::from_env();
    let mut control = ControlLoop::new(&cfg)?;
    let mut venture = VentureEcosystemAggregate::create(1_000_000.0)?;
    let mut redistribution = RedistributionAggregate::create(0.35, 0.05)?;

    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut halted = 0u64;
    let mut max_days = 0u32;
    let mut ventures_completed = 0u64;
    let mut n = 0usize;

    for cycle in 0..cycles {
        let snapshot = random_snapshot(&mut rng, cycle);
        let report = control.evaluate(&snapshot, None)?;
        if report.breaker.tripped != !report.gate.is_open() {
            bail!("cycle {}: gate disagrees with breaker", cycle);
        }
        if report.policy.pmp_issuance_adjustment.abs() > 1.0 || report.policy.pmc_conversion_adjustment.abs() > 1.0 {
            bail!("cycle {}: policy adjustment out of [-1, 1]", cycle);
        }
        if report.breaker.recovery_minutes > 480 {
            bail!("cycle {}: recovery estimate above cap", cycle);
        }
        if report.is_halted() {
            halted += 1;
        }
        max_days = max_days.max(report.assessment.consecutive_high_risk_days);

        for _ in 0..steps {
            n += 1;
            let cmd = venture_command(&mut rng, &venture, &report.gate, n);
            let paying = matches!(
                cmd,
                VentureCommand::AllocateInvestments { .. } | VentureCommand::RewardMilestone { .. }
            );
            let result = venture.step(cmd).map(|next| venture = next);
            tally(&mut counts, &result);
            if let Err(e) = venture.check_invariants() {
                bail!("cycle {}: venture invariant: {}", cycle, e);
            }
            if paying && result.is_ok() && report.is_halted() {
                bail!("cycle {}: venture payout accepted while halted", cycle);
            }

            let cmd = redistribution_command(&mut rng, &redistribution, &report.gate);
            let executing = matches!(cmd, RedistributionCommand::Execute { .. });
            let result = redistribution.step(cmd).map(|next| redistribution = next);
            tally(&mut counts, &result);
            if executing && result.is_ok() && report.is_halted() {
                bail!("cycle {}: redistribution paid out while halted", cycle);
            }
            if let Err(e) = redistribution.check_invariants() {
                bail!("cycle {}: redistribution invariant: {}", cycle, e);
            }
        }

        if matches!(venture.status(), VentureStatus::Completed | VentureStatus::Suspended) {
            ventures_completed += 1;
            venture = VentureEcosystemAggregate::create(1_000_000.0)?;
        }
        if redistribution.status() == RedistributionStatus::Completed {
            redistribution = RedistributionAggregate::create(0.35, 0.05)?;
        }
    }

    println!(
        "{}",
        json!({
            "seed": seed,
            "cycles": cycles,
            "halted_cycles": halted,
            "max_consecutive_high_risk_days": max_days,
            "ventures_closed": ventures_completed,
            "outcomes": counts,
        })
    );
    Ok(())
}
