//! Domain layer for the peercode session registry.
//!
//! Holds the session model, the [`store::SessionStore`] seam the registry
//! talks to, code generation, and the lifecycle rules enforced by
//! [`registry::SessionRegistry`]. Nothing here knows about HTTP or SQL.

pub mod error;
pub mod memory;
pub mod registry;
pub mod report;
pub mod session;
pub mod store;
pub mod types;
