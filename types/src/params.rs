//! Poll creation and voting limits.

use serde::{Deserialize, Serialize};

/// Seconds in one day.
pub const DAY_SECS: u64 = 86_400;

/// Bounds enforced by the registry at poll creation and by the ledger at vote time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollLimits {
    // ── Options ──────────────────────────────────────────────────────────
    pub min_options: usize,
    pub max_options: usize,
    /// Maximum characters per option label.
    pub max_option_len: usize,
    /// Maximum characters in the question.
    pub max_question_len: usize,

    // ── Timing ───────────────────────────────────────────────────────────
    pub min_duration_secs: u64,
    pub max_duration_secs: u64,

    // ── Weighting ────────────────────────────────────────────────────────
    /// Smallest allowed per-poll weight cap (multiple of the running average).
    pub min_weight_cap: u32,
    pub max_weight_cap: u32,
    /// Upper bound on credits a single vote may stake.
    pub max_credits_per_vote: u128,

    // ── Discovery ────────────────────────────────────────────────────────
    /// How many recently created polls the registry remembers for discovery.
    pub recent_index_capacity: usize,
}

impl Default for PollLimits {
    fn default() -> Self {
        Self {
            min_options: 2,
            max_options: 10,
            max_option_len: 100,
            max_question_len: 200,
            min_duration_secs: DAY_SECS,
            max_duration_secs: 30 * DAY_SECS,
            min_weight_cap: 2,
            max_weight_cap: 20,
            max_credits_per_vote: 100,
            recent_index_capacity: 50,
        }
    }
}
