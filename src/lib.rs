//! flowgate - tiered caching and per-key session coordination for an
//! automation-platform tool gateway.
//!
//! The crate is built around three pieces:
//!
//! - a three-level read-through/write-through [`cache::CacheManager`]
//!   (in-process map, distributed KV, relational persistent store)
//! - single-owner coordinators in [`session`] and [`registry`], hosted on
//!   the mailbox runtime in [`coordination`]
//! - the [`gateway`] dispatch layer tying permissions, sessions, the cache
//!   and the audit trail together

pub mod audit;
pub mod cache;
pub mod cli;
pub mod config;
pub mod coordination;
mod db;
pub mod error;
pub mod gateway;
pub mod registry;
pub mod session;

pub use error::{FlowgateError, Result};
