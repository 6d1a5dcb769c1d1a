//! Per-session state: record types and the single-owner coordinator that
//! serializes all access to them.

pub mod coordinator;
pub mod types;

pub use coordinator::{SessionCommand, SessionCoordinator, SessionHandle};
pub use types::{SessionData, SessionStats, SessionUpdate, TierDistribution};
