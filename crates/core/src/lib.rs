//! Shared domain types for the pixshop platform.
//!
//! This crate is I/O-free: it defines the normalized generation request and
//! result model, provider identifiers and execution profiles, the domain
//! error type, and the pure usage-gate decision logic. Everything that talks
//! to the network or the database lives in the sibling crates.

pub mod error;
pub mod intent;
pub mod provider;
pub mod types;
pub mod usage;
