//! The weight calculator: credits + multiplier → capped weight.

use crate::error::WeightError;
use crate::fixed::{mul_div_floor, sqrt_wad};
use qvote_types::{Credits, Multiplier, PollLimits, Weight, WAD};
use serde::{Deserialize, Serialize};

/// Poll totals immediately before a vote is applied.
///
/// The cap is derived from these, so a preview built from the same snapshot
/// the ledger will see yields the same weight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallySnapshot {
    pub total_voters: u64,
    pub total_weighted: Weight,
    /// The poll's cap as a multiple of the running average.
    pub max_weight_cap: u32,
}

impl TallySnapshot {
    pub fn new(total_voters: u64, total_weighted: Weight, max_weight_cap: u32) -> Self {
        Self {
            total_voters,
            total_weighted,
            max_weight_cap,
        }
    }

    /// Average weight per voter, floored. `None` before the first vote.
    pub fn average(&self) -> Option<Weight> {
        if self.total_voters == 0 {
            return None;
        }
        Some(Weight::from_raw(
            self.total_weighted.raw() / self.total_voters as u128,
        ))
    }
}

/// Result of weighting one vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightOutcome {
    /// `sqrt(credits) × multiplier` before capping.
    pub raw: Weight,
    /// The weight that is (or would be) recorded.
    pub applied: Weight,
    /// The cap in force, if any.
    pub cap: Option<Weight>,
}

impl WeightOutcome {
    pub fn was_capped(&self) -> bool {
        self.applied < self.raw
    }
}

/// Stateless apart from the per-vote credit ceiling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WeightCalculator {
    max_credits_per_vote: u128,
}

impl WeightCalculator {
    pub fn new(max_credits_per_vote: u128) -> Self {
        Self {
            max_credits_per_vote,
        }
    }

    pub fn from_limits(limits: &PollLimits) -> Self {
        Self::new(limits.max_credits_per_vote)
    }

    pub fn max_credits_per_vote(&self) -> u128 {
        self.max_credits_per_vote
    }

    pub fn validate_credits(&self, credits: Credits) -> Result<(), WeightError> {
        if credits.is_zero() {
            return Err(WeightError::InvalidCredits);
        }
        if credits.raw() > self.max_credits_per_vote {
            return Err(WeightError::CreditsExceedMax {
                credits: credits.raw(),
                max: self.max_credits_per_vote,
            });
        }
        Ok(())
    }

    /// `sqrt(credits) × multiplier`, uncapped.
    pub fn raw_weight(
        &self,
        credits: Credits,
        multiplier: Multiplier,
    ) -> Result<Weight, WeightError> {
        self.validate_credits(credits)?;
        if !multiplier.in_range() {
            return Err(WeightError::MultiplierOutOfRange(multiplier));
        }
        let root = sqrt_wad(credits.raw());
        mul_div_floor(root, multiplier.raw(), WAD)
            .map(Weight::from_raw)
            .ok_or(WeightError::Overflow)
    }

    /// `maxWeightCap × total / voters`; `None` before the first vote.
    pub fn cap_for(&self, snapshot: &TallySnapshot) -> Result<Option<Weight>, WeightError> {
        if snapshot.total_voters == 0 {
            return Ok(None);
        }
        mul_div_floor(
            snapshot.total_weighted.raw(),
            snapshot.max_weight_cap as u128,
            snapshot.total_voters as u128,
        )
        .map(|raw| Some(Weight::from_raw(raw)))
        .ok_or(WeightError::Overflow)
    }

    /// Weight a vote against the poll totals it will be applied to.
    pub fn compute(
        &self,
        credits: Credits,
        multiplier: Multiplier,
        snapshot: &TallySnapshot,
    ) -> Result<WeightOutcome, WeightError> {
        let raw = self.raw_weight(credits, multiplier)?;
        let cap = self.cap_for(snapshot)?;
        let applied = match cap {
            Some(cap) if raw > cap => cap,
            _ => raw,
        };
        Ok(WeightOutcome { raw, applied, cap })
    }

    /// Same arithmetic as [`compute`](Self::compute); named for callers that
    /// only want to show the expected weight.
    pub fn preview(
        &self,
        credits: Credits,
        multiplier: Multiplier,
        snapshot: &TallySnapshot,
    ) -> Result<WeightOutcome, WeightError> {
        self.compute(credits, multiplier, snapshot)
    }
}

impl Default for WeightCalculator {
    fn default() -> Self {
        Self::from_limits(&PollLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(n: u128) -> Weight {
        Weight::from_units(n).unwrap()
    }

    #[test]
    fn scenario_a_weights() {
        let calc = WeightCalculator::default();
        let empty = TallySnapshot::new(0, Weight::ZERO, 10);
        let a = calc.compute(Credits::new(9), Multiplier::ONE, &empty).unwrap();
        assert_eq!(a.applied, units(3));
        assert_eq!(a.applied.to_string(), "3.00");

        let after_a = TallySnapshot::new(1, a.applied, 10);
        let b = calc
            .compute(Credits::new(16), Multiplier::from_tenths(20), &after_a)
            .unwrap();
        assert_eq!(b.applied, units(8));
        assert!(!b.was_capped());
    }

    #[test]
    fn scenario_c_cap_clamps_to_twice_average() {
        let calc = WeightCalculator::new(1_000);
        let first = calc
            .compute(Credits::new(100), Multiplier::ONE, &TallySnapshot::new(0, Weight::ZERO, 2))
            .unwrap();
        assert_eq!(first.applied, units(10));
        assert_eq!(first.cap, None);

        let second = calc
            .compute(
                Credits::new(625),
                Multiplier::from_tenths(20),
                &TallySnapshot::new(1, first.applied, 2),
            )
            .unwrap();
        assert_eq!(second.raw, units(50));
        assert_eq!(second.cap, Some(units(20)));
        assert_eq!(second.applied, units(20));
        assert!(second.was_capped());
    }

    #[test]
    fn first_vote_is_never_capped() {
        let calc = WeightCalculator::default();
        let out = calc
            .compute(Credits::new(100), Multiplier::MAX, &TallySnapshot::new(0, Weight::ZERO, 2))
            .unwrap();
        assert_eq!(out.applied, out.raw);
        assert_eq!(out.applied, units(30));
    }

    #[test]
    fn rejects_zero_and_excess_credits() {
        let calc = WeightCalculator::new(100);
        let snap = TallySnapshot::default();
        assert_eq!(
            calc.compute(Credits::ZERO, Multiplier::ONE, &snap),
            Err(WeightError::InvalidCredits)
        );
        assert_eq!(
            calc.compute(Credits::new(101), Multiplier::ONE, &snap),
            Err(WeightError::CreditsExceedMax { credits: 101, max: 100 })
        );
        assert!(calc.compute(Credits::new(100), Multiplier::ONE, &snap).is_ok());
    }

    #[test]
    fn rejects_out_of_range_multiplier() {
        let calc = WeightCalculator::default();
        let m = Multiplier::from_tenths(31);
        assert_eq!(
            calc.raw_weight(Credits::new(4), m),
            Err(WeightError::MultiplierOutOfRange(m))
        );
    }

    #[test]
    fn preview_matches_compute() {
        let calc = WeightCalculator::default();
        let snap = TallySnapshot::new(3, Weight::from_raw(7_123_456_789_000_000_001), 3);
        let m = Multiplier::from_tenths(17);
        assert_eq!(
            calc.preview(Credits::new(37), m, &snap),
            calc.compute(Credits::new(37), m, &snap)
        );
    }

    #[test]
    fn average_is_floored() {
        let snap = TallySnapshot::new(3, Weight::from_raw(10), 2);
        assert_eq!(snap.average(), Some(Weight::from_raw(3)));
        assert_eq!(TallySnapshot::default().average(), None);
    }
}
