//! Scenario files for `qvote simulate`.
//!
//! A scenario describes one poll, the votes cast on it in order, and whether
//! the voters claim once it ends. It runs against the real engine with
//! in-memory token, oracle and clock.

use anyhow::Context;
use qvote_engine::{EngineConfig, LeaderboardEntry, VoteEngine};
use qvote_ledger::PollInfo;
use qvote_nullables::{NullClock, NullOracle, NullToken};
use qvote_registry::PollRequest;
use qvote_settlement::FlowOutcome;
use qvote_types::{Credits, Identity, Multiplier, UserStats};
use qvote_utils::time_remaining;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

const DEFAULT_START: u64 = 1_700_000_000;

#[derive(Clone, Debug, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_creator")]
    pub creator: String,
    pub question: String,
    pub options: Vec<String>,
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
    #[serde(default = "default_max_weight_cap")]
    pub max_weight_cap: u32,
    /// Clock value at poll creation, in unix seconds.
    #[serde(default = "default_start")]
    pub start: u64,
    /// Claim for every voter after the poll ends.
    #[serde(default = "default_claim")]
    pub claim: bool,
    #[serde(default)]
    pub votes: Vec<ScenarioVote>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ScenarioVote {
    pub voter: String,
    pub option: usize,
    pub credits: u128,
    /// Decimal multiplier, e.g. "1.5". Defaults to 1.0.
    #[serde(default)]
    pub multiplier: Option<String>,
    #[serde(default)]
    pub reputation: u128,
    /// Tokens minted before voting. Defaults to one faucet drip.
    #[serde(default)]
    pub funds: Option<u128>,
}

fn default_creator() -> String {
    "creator".to_string()
}

fn default_duration_secs() -> u64 {
    86_400
}

fn default_max_weight_cap() -> u32 {
    10
}

fn default_start() -> u64 {
    DEFAULT_START
}

fn default_claim() -> bool {
    true
}

#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub poll: PollInfo,
    pub time_remaining: String,
    pub results: Vec<String>,
    pub winner: Winner,
    pub votes: Vec<StepReport>,
    pub claims: Vec<StepReport>,
    pub unclaimed: u128,
    pub snapshot_hash: String,
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Winner {
    pub option: usize,
    pub label: String,
    pub weight: String,
}

/// How one vote or claim ended.
#[derive(Clone, Debug, Serialize)]
pub struct StepReport {
    pub identity: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepReport {
    fn from_outcome<T>(identity: &Identity, outcome: &FlowOutcome<T>) -> Self {
        let (status, error) = match outcome {
            FlowOutcome::Confirmed(_) => ("confirmed", None),
            FlowOutcome::Rejected(e) => ("rejected", Some(e.to_string())),
            FlowOutcome::Failed(e) => ("failed", Some(e.to_string())),
        };
        Self {
            identity: identity.to_string(),
            status,
            weight: None,
            raw_weight: None,
            payout: None,
            error,
        }
    }
}

impl Scenario {
    pub fn from_toml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing scenario {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub async fn run(&self, config: EngineConfig) -> anyhow::Result<Report> {
        let token = Arc::new(NullToken::new());
        let oracle = Arc::new(NullOracle::new());
        let clock = Arc::new(NullClock::new(self.start));
        let engine = Arc::new(VoteEngine::local(
            config,
            token.clone(),
            oracle.clone(),
            clock.clone(),
        )?);

        let info = engine.create_poll(PollRequest {
            creator: Identity::new(self.creator.as_str()),
            question: self.question.clone(),
            options: self.options.clone(),
            duration_secs: self.duration_secs,
            max_weight_cap: self.max_weight_cap,
        })?;
        let poll = info.id;
        tracing::info!(poll = %poll.short(), votes = self.votes.len(), "simulating scenario");

        let mut votes = Vec::with_capacity(self.votes.len());
        for step in &self.votes {
            let voter = Identity::new(step.voter.as_str());
            let multiplier = match &step.multiplier {
                Some(raw) => Multiplier::parse_decimal(raw)
                    .with_context(|| format!("{voter}: bad multiplier {raw:?}"))?,
                None => Multiplier::ONE,
            };
            oracle.set_stats(
                &voter,
                UserStats {
                    effective_reputation: step.reputation,
                    multiplier,
                    last_vote: None,
                },
            );
            match step.funds {
                Some(funds) => token.mint(&voter, Credits::new(funds)),
                None => token.faucet(&voter),
            };

            let outcome = engine
                .submit_vote(&voter, &poll, step.option, Credits::new(step.credits))
                .outcome()
                .await;
            let mut report = StepReport::from_outcome(&voter, &outcome);
            if let FlowOutcome::Confirmed(vote) = &outcome {
                oracle.record_vote(&voter, vote.timestamp);
                report.weight = Some(vote.weight.to_string());
                report.raw_weight = Some(vote.raw_weight.to_string());
            }
            votes.push(report);
        }

        clock.advance(self.duration_secs);

        let mut claims = Vec::new();
        if self.claim {
            for step in &self.votes {
                let claimant = Identity::new(step.voter.as_str());
                let outcome = engine.claim(&claimant, &poll).outcome().await;
                let mut report = StepReport::from_outcome(&claimant, &outcome);
                if let FlowOutcome::Confirmed(record) = &outcome {
                    report.payout = Some(record.payout.raw());
                }
                claims.push(report);
            }
        }

        let info = engine.poll_info(&poll)?;
        let (option, weight) = engine.winner(&poll)?;
        Ok(Report {
            time_remaining: time_remaining(info.end_time, engine.now()),
            results: engine.results(&poll)?.iter().map(ToString::to_string).collect(),
            winner: Winner {
                option,
                label: info.options.get(option).cloned().unwrap_or_default(),
                weight: weight.to_string(),
            },
            votes,
            claims,
            unclaimed: engine.unclaimed_amount(&poll)?.raw(),
            snapshot_hash: engine.export_snapshot(&poll)?.hash_hex(),
            leaderboard: engine.leaderboard(10)?,
            poll: info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO_A: &str = r#"
        question = "Ship it?"
        options = ["Yes", "No"]

        [[votes]]
        voter = "alice"
        option = 0
        credits = 9

        [[votes]]
        voter = "bob"
        option = 1
        credits = 16
        multiplier = "2.0"
        reputation = 40
    "#;

    #[tokio::test]
    async fn runs_two_voter_scenario() {
        let scenario = Scenario::from_toml_str(SCENARIO_A).unwrap();
        let report = scenario.run(EngineConfig::default()).await.unwrap();

        assert_eq!(report.results, vec!["3.00", "8.00"]);
        assert_eq!(report.winner.label, "No");
        assert_eq!(report.time_remaining, "Ended");
        assert!(!report.poll.is_active);

        let statuses: Vec<_> = report.claims.iter().map(|c| c.status).collect();
        assert_eq!(statuses, vec!["rejected", "confirmed"]);
        assert_eq!(report.claims[1].payout, Some(25));
        assert_eq!(report.unclaimed, 0);
        assert_eq!(report.leaderboard.len(), 1);
        assert_eq!(report.leaderboard[0].identity.as_str(), "bob");
    }

    #[tokio::test]
    async fn duplicate_voter_is_reported_not_fatal() {
        let toml = r#"
            question = "Again?"
            options = ["a", "b"]
            claim = false

            [[votes]]
            voter = "alice"
            option = 0
            credits = 4

            [[votes]]
            voter = "alice"
            option = 1
            credits = 4
        "#;
        let report = Scenario::from_toml_str(toml)
            .unwrap()
            .run(EngineConfig::default())
            .await
            .unwrap();
        assert_eq!(report.votes[0].status, "confirmed");
        assert_eq!(report.votes[1].status, "rejected");
        assert!(report.claims.is_empty());
        assert_eq!(report.results, vec!["2.00", "0.00"]);
    }

    #[test]
    fn bad_scenario_is_an_error() {
        assert!(Scenario::from_toml_str("question = 3").is_err());
    }
}
