//! Poll creation requests and their validation.

use crate::error::RegistryError;
use qvote_types::{Identity, PollLimits};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollRequest {
    pub creator: Identity,
    pub question: String,
    pub options: Vec<String>,
    pub duration_secs: u64,
    pub max_weight_cap: u32,
}

impl PollRequest {
    /// Check every field against `limits`. Labels are compared trimmed.
    pub fn validate(&self, limits: &PollLimits) -> Result<(), RegistryError> {
        if !self.creator.is_valid() || self.creator.is_escrow() {
            return Err(RegistryError::InvalidCreator(self.creator.to_string()));
        }

        let question = self.question.trim();
        if question.is_empty() {
            return Err(RegistryError::EmptyQuestion);
        }
        let qlen = question.chars().count();
        if qlen > limits.max_question_len {
            return Err(RegistryError::QuestionTooLong {
                len: qlen,
                max: limits.max_question_len,
            });
        }

        let count = self.options.len();
        if count < limits.min_options || count > limits.max_options {
            return Err(RegistryError::OptionCount {
                count,
                min: limits.min_options,
                max: limits.max_options,
            });
        }
        let mut seen = HashSet::with_capacity(count);
        for (index, option) in self.options.iter().enumerate() {
            let label = option.trim();
            if label.is_empty() {
                return Err(RegistryError::EmptyOption(index));
            }
            let len = label.chars().count();
            if len > limits.max_option_len {
                return Err(RegistryError::OptionTooLong {
                    index,
                    len,
                    max: limits.max_option_len,
                });
            }
            if !seen.insert(label.to_lowercase()) {
                return Err(RegistryError::DuplicateOption(index));
            }
        }

        if self.duration_secs < limits.min_duration_secs
            || self.duration_secs > limits.max_duration_secs
        {
            return Err(RegistryError::DurationOutOfRange {
                secs: self.duration_secs,
                min: limits.min_duration_secs,
                max: limits.max_duration_secs,
            });
        }

        if self.max_weight_cap < limits.min_weight_cap || self.max_weight_cap > limits.max_weight_cap
        {
            return Err(RegistryError::WeightCapOutOfRange {
                cap: self.max_weight_cap,
                min: limits.min_weight_cap,
                max: limits.max_weight_cap,
            });
        }

        Ok(())
    }

    /// Trimmed question and option labels, as stored on the poll.
    pub(crate) fn normalized(&self) -> (String, Vec<String>) {
        (
            self.question.trim().to_string(),
            self.options.iter().map(|o| o.trim().to_string()).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qvote_types::params::DAY_SECS;

    fn request() -> PollRequest {
        PollRequest {
            creator: Identity::new("creator"),
            question: "Adopt the new logo?".into(),
            options: vec!["Yes".into(), "No".into()],
            duration_secs: 7 * DAY_SECS,
            max_weight_cap: 10,
        }
    }

    #[test]
    fn valid_request_passes() {
        assert_eq!(request().validate(&PollLimits::default()), Ok(()));
    }

    #[test]
    fn option_count_bounds() {
        let limits = PollLimits::default();
        let mut r = request();
        r.options = vec!["Only".into()];
        assert!(matches!(r.validate(&limits), Err(RegistryError::OptionCount { count: 1, .. })));
        r.options = (0..11).map(|i| format!("o{i}")).collect();
        assert!(matches!(r.validate(&limits), Err(RegistryError::OptionCount { count: 11, .. })));
        r.options = (0..10).map(|i| format!("o{i}")).collect();
        assert_eq!(r.validate(&limits), Ok(()));
    }

    #[test]
    fn duration_bounds() {
        let limits = PollLimits::default();
        let mut r = request();
        r.duration_secs = DAY_SECS - 1;
        assert!(matches!(r.validate(&limits), Err(RegistryError::DurationOutOfRange { .. })));
        r.duration_secs = 30 * DAY_SECS + 1;
        assert!(matches!(r.validate(&limits), Err(RegistryError::DurationOutOfRange { .. })));
        r.duration_secs = 30 * DAY_SECS;
        assert_eq!(r.validate(&limits), Ok(()));
    }

    #[test]
    fn weight_cap_bounds() {
        let limits = PollLimits::default();
        let mut r = request();
        r.max_weight_cap = 1;
        assert!(matches!(r.validate(&limits), Err(RegistryError::WeightCapOutOfRange { cap: 1, .. })));
        r.max_weight_cap = 21;
        assert!(matches!(r.validate(&limits), Err(RegistryError::WeightCapOutOfRange { cap: 21, .. })));
        r.max_weight_cap = 2;
        assert_eq!(r.validate(&limits), Ok(()));
    }

    #[test]
    fn label_rules() {
        let limits = PollLimits::default();
        let mut r = request();
        r.question = "   ".into();
        assert_eq!(r.validate(&limits), Err(RegistryError::EmptyQuestion));

        let mut r = request();
        r.question = "x".repeat(201);
        assert!(matches!(r.validate(&limits), Err(RegistryError::QuestionTooLong { len: 201, .. })));

        let mut r = request();
        r.options = vec!["Yes".into(), " ".into()];
        assert_eq!(r.validate(&limits), Err(RegistryError::EmptyOption(1)));

        let mut r = request();
        r.options = vec!["Yes".into(), "yes ".into()];
        assert_eq!(r.validate(&limits), Err(RegistryError::DuplicateOption(1)));

        let mut r = request();
        r.options = vec!["Yes".into(), "n".repeat(101)];
        assert!(matches!(r.validate(&limits), Err(RegistryError::OptionTooLong { index: 1, .. })));
    }
}
