use proptest::prelude::*;

use qvote_types::{Credits, Multiplier, Weight, WAD};
use qvote_weight::{sqrt_wad, TallySnapshot, WeightCalculator};

fn multiplier_strategy() -> impl Strategy<Value = Multiplier> {
    (Multiplier::MIN.raw()..=Multiplier::MAX.raw()).prop_map(Multiplier::from_raw)
}

proptest! {
    /// Uncapped weight tracks sqrt(c)·m to within floating-point noise.
    #[test]
    fn weight_is_sqrt_credits_times_multiplier(
        credits in 1u128..=100,
        m in multiplier_strategy(),
    ) {
        let calc = WeightCalculator::default();
        let w = calc.raw_weight(Credits::new(credits), m).unwrap();
        let expected = (credits as f64).sqrt() * (m.raw() as f64 / WAD as f64);
        let got = w.raw() as f64 / WAD as f64;
        prop_assert!((got - expected).abs() < 1e-9, "got {got}, expected {expected}");
    }

    /// Strictly increasing in credits.
    #[test]
    fn weight_strictly_increasing_in_credits(credits in 1u128..100, m in multiplier_strategy()) {
        let calc = WeightCalculator::default();
        let lo = calc.raw_weight(Credits::new(credits), m).unwrap();
        let hi = calc.raw_weight(Credits::new(credits + 1), m).unwrap();
        prop_assert!(hi > lo);
    }

    /// Strictly increasing in multiplier.
    #[test]
    fn weight_strictly_increasing_in_multiplier(
        credits in 1u128..=100,
        raw in Multiplier::MIN.raw()..Multiplier::MAX.raw(),
        step in 1u128..1_000_000_000_000,
    ) {
        let calc = WeightCalculator::default();
        let upper = (raw + step).min(Multiplier::MAX.raw());
        prop_assume!(upper > raw);
        let lo = calc.raw_weight(Credits::new(credits), Multiplier::from_raw(raw)).unwrap();
        let hi = calc.raw_weight(Credits::new(credits), Multiplier::from_raw(upper)).unwrap();
        prop_assert!(hi > lo);
    }

    /// After the first vote, applied·voters ≤ cap·total (exact rational form).
    #[test]
    fn applied_weight_never_exceeds_cap(
        credits in 1u128..=100,
        m in multiplier_strategy(),
        voters in 1u64..1_000,
        total_units in 1u128..10_000,
        cap in 2u32..=20,
    ) {
        let calc = WeightCalculator::default();
        let total = Weight::from_raw(total_units * WAD / 3);
        let snap = TallySnapshot::new(voters, total, cap);
        let out = calc.compute(Credits::new(credits), m, &snap).unwrap();
        prop_assert!(out.applied <= out.raw);
        prop_assert!(out.applied.raw() * voters as u128 <= total.raw() * cap as u128);
    }

    /// Perfect squares are exact; anything strictly between neighbours stays between.
    #[test]
    fn sqrt_wad_brackets_integer_roots(k in 1u128..10_000, off in 1u128..100) {
        let n = k * k;
        prop_assert_eq!(sqrt_wad(n), k * WAD);
        let r = sqrt_wad(n + off.min(2 * k));
        prop_assert!(r > k * WAD && r < (k + 1) * WAD);
    }
}
