use qvote_types::{ErrorCategory, PollId};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("question is {len} characters, maximum is {max}")]
    QuestionTooLong { len: usize, max: usize },

    #[error("poll needs between {min} and {max} options, got {count}")]
    OptionCount { count: usize, min: usize, max: usize },

    #[error("option {0} is empty")]
    EmptyOption(usize),

    #[error("option {index} is {len} characters, maximum is {max}")]
    OptionTooLong { index: usize, len: usize, max: usize },

    #[error("option {0} duplicates an earlier option")]
    DuplicateOption(usize),

    #[error("duration {secs}s outside [{min}s, {max}s]")]
    DurationOutOfRange { secs: u64, min: u64, max: u64 },

    #[error("weight cap {cap} outside [{min}, {max}]")]
    WeightCapOutOfRange { cap: u32, min: u32, max: u32 },

    #[error("invalid creator identity {0:?}")]
    InvalidCreator(String),

    #[error("poll {0} not found")]
    PollNotFound(PollId),

    #[error("failed to encode poll id preimage: {0}")]
    Encoding(String),
}

impl RegistryError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::PollNotFound(_) => ErrorCategory::State,
            Self::Encoding(_) => ErrorCategory::Internal,
            _ => ErrorCategory::Validation,
        }
    }
}
