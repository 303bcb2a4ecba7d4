use proptest::prelude::*;

use qvote_types::{Multiplier, Timestamp, Weight, WAD};

proptest! {
    /// Decimal parsing agrees with integer construction for one-decimal inputs.
    #[test]
    fn multiplier_parse_matches_tenths(whole in 0u128..10, tenth in 0u128..10) {
        let parsed = Multiplier::parse_decimal(&format!("{whole}.{tenth}")).unwrap();
        prop_assert_eq!(parsed, Multiplier::from_tenths(whole * 10 + tenth));
    }

    /// Multipliers built from tenths are in range exactly for 3..=30 tenths.
    #[test]
    fn multiplier_range_by_tenths(tenths in 0u128..100) {
        prop_assert_eq!(Multiplier::from_tenths(tenths).in_range(), (3..=30).contains(&tenths));
    }

    /// The two-decimal rendering never rounds up.
    #[test]
    fn weight_rendering_truncates(raw in 0u128..1_000_000 * WAD) {
        let rendered = Weight::from_raw(raw).to_decimal_string(2);
        let (whole, frac) = rendered.split_once('.').unwrap();
        let shown = whole.parse::<u128>().unwrap() * 100 + frac.parse::<u128>().unwrap();
        prop_assert!(shown * (WAD / 100) <= raw);
        prop_assert!(raw - shown * (WAD / 100) < WAD / 100);
    }

    /// Elapsed and remaining time are complementary around a fixed point.
    #[test]
    fn elapsed_plus_remaining(a in 0u64..1_000_000, b in 0u64..1_000_000) {
        let ta = Timestamp::new(a);
        let tb = Timestamp::new(b);
        prop_assert_eq!(ta.elapsed_since(tb) + ta.remaining_from(tb), a.abs_diff(b));
    }
}
