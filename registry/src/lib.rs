//! Poll factory and registry.
//!
//! Validates poll parameters, derives poll ids, creates each poll's ledger and
//! keeps a bounded index of recently created polls for discovery.

pub mod error;
pub mod registry;
pub mod request;

pub use error::RegistryError;
pub use registry::PollRegistry;
pub use request::PollRequest;
