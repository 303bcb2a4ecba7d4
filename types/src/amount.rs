//! Credit, weight and multiplier units.
//!
//! Weights and multipliers are fixed-point integers (u128) with 18 decimals so
//! every node and every offline preview computes bit-identical results. Credits
//! are whole token units.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// Fixed-point scale: 1.0 == `WAD`.
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Whole-unit stake committed to a vote.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Credits(u128);

impl Credits {
    pub const ZERO: Self = Self(0);

    pub const fn new(raw: u128) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl Add for Credits {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} credits", self.0)
    }
}

/// A weighted vote amount, fixed-point with 18 decimals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Weight(u128);

impl Weight {
    pub const ZERO: Self = Self(0);

    /// Build from raw fixed-point units (`WAD` == 1.0).
    pub fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Build from a whole number of weight units.
    pub fn from_units(units: u128) -> Option<Self> {
        units.checked_mul(WAD).map(Self)
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Render with a fixed number of decimal places, truncating.
    pub fn to_decimal_string(&self, places: u32) -> String {
        format_fixed(self.0, places)
    }

    /// Parse `"12.5"`-style input; digits past the 18th decimal are dropped.
    pub fn parse_decimal(s: &str) -> Option<Self> {
        parse_fixed(s).map(Self)
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_fixed(self.0, 2))
    }
}

/// Reputation multiplier, fixed-point with 18 decimals.
///
/// Valid multipliers lie in `[MIN, MAX]` = `[0.3, 3.0]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Multiplier(u128);

impl Multiplier {
    /// 0.3×
    pub const MIN: Self = Self(300_000_000_000_000_000);
    /// 3.0×
    pub const MAX: Self = Self(3_000_000_000_000_000_000);
    /// 1.0×
    pub const ONE: Self = Self(WAD);

    pub fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Build from tenths, e.g. `from_tenths(15)` == 1.5×.
    pub fn from_tenths(tenths: u128) -> Self {
        Self(tenths * (WAD / 10))
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn in_range(&self) -> bool {
        *self >= Self::MIN && *self <= Self::MAX
    }

    /// Parse a decimal string such as `"1.5"` or `"2"`, truncating beyond 18 decimals.
    pub fn parse_decimal(s: &str) -> Option<Self> {
        parse_fixed(s).map(Self)
    }
}

impl fmt::Display for Multiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", format_fixed(self.0, 1))
    }
}

fn format_fixed(raw: u128, places: u32) -> String {
    let whole = raw / WAD;
    if places == 0 {
        return whole.to_string();
    }
    let places = places.min(18);
    let frac = (raw % WAD) / 10u128.pow(18 - places);
    format!("{whole}.{frac:0width$}", width = places as usize)
}

fn parse_fixed(s: &str) -> Option<u128> {
    let s = s.trim();
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut frac_raw: u128 = 0;
    for (i, ch) in frac.chars().enumerate() {
        let digit = ch.to_digit(10)? as u128;
        if i < 18 {
            frac_raw += digit * 10u128.pow(17 - i as u32);
        }
    }
    whole.checked_mul(WAD)?.checked_add(frac_raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_parse_decimal() {
        assert_eq!(Weight::parse_decimal("30"), Weight::from_units(30));
        assert_eq!(Weight::parse_decimal("0.5"), Some(Weight::from_raw(WAD / 2)));
        assert_eq!(Weight::parse_decimal("abc"), None);
    }

    #[test]
    fn weight_display_truncates_to_two_places() {
        let w = Weight::from_raw(3 * WAD + 999_999_999_999_999_999);
        assert_eq!(w.to_string(), "3.99");
        assert_eq!(Weight::from_units(8).unwrap().to_string(), "8.00");
    }

    #[test]
    fn multiplier_bounds() {
        assert!(Multiplier::ONE.in_range());
        assert!(Multiplier::from_tenths(3).in_range());
        assert!(Multiplier::from_tenths(30).in_range());
        assert!(!Multiplier::from_tenths(2).in_range());
        assert!(!Multiplier::from_tenths(31).in_range());
    }

    #[test]
    fn multiplier_parse_decimal() {
        assert_eq!(Multiplier::parse_decimal("2"), Some(Multiplier::from_tenths(20)));
        assert_eq!(Multiplier::parse_decimal("1.5"), Some(Multiplier::from_tenths(15)));
        assert_eq!(Multiplier::parse_decimal(".3"), Some(Multiplier::MIN));
        assert_eq!(Multiplier::parse_decimal("abc"), None);
        assert_eq!(Multiplier::parse_decimal(""), None);
    }

    #[test]
    fn multiplier_display() {
        assert_eq!(Multiplier::from_tenths(25).to_string(), "2.5x");
    }

    #[test]
    fn credits_checked_arithmetic() {
        let a = Credits::new(5);
        assert_eq!(a.checked_sub(Credits::new(6)), None);
        assert_eq!(a.saturating_sub(Credits::new(6)), Credits::ZERO);
        assert_eq!(a + Credits::new(2), Credits::new(7));
    }
}
