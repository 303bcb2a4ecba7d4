//! Vote and claim settlement.
//!
//! A vote is a multi-step conversation with the ledger: check allowance,
//! maybe approve, submit, await confirmation, then tell read-models what
//! changed. [`VoteFlow`] and [`ClaimFlow`] drive those steps as explicit state
//! machines over a [`PollGateway`], so timeouts and retries never lose track of
//! what has already been written.

pub mod claim;
pub mod confirm;
pub mod error;
pub mod gateway;
pub mod invalidation;
pub mod machine;
pub mod outcome;
pub mod settings;
pub mod state;

pub use claim::ClaimFlow;
pub use confirm::await_confirmation;
pub use error::{GatewayError, SettlementError};
pub use gateway::{PollGateway, TxKind, TxStatus, TxTicket};
pub use invalidation::{Invalidation, InvalidationSink};
pub use machine::{ApprovalPrompt, AutoApprove, VoteFlow, VoteRequest};
pub use outcome::FlowOutcome;
pub use settings::FlowSettings;
pub use state::{ClaimFlowState, Transition, VoteFlowState};
