//! Routed operations
//!
//! [`ShardCoordinator`] is the entry point callers use. Each submodule adds the
//! operations for one record kind:
//! - `single_use`: WebAuthn challenges and OAuth authorization codes
//! - `refresh`: refresh-token families with rotation and reuse detection
//! - `rate_limit`: failed-login throttling
//! - `session`: sessions held by session actors
//! - `entity`: prefix-routed access to sessions and cache-aside entities

mod coordinator;
mod entity;
mod errors;
mod rate_limit;
mod refresh;
mod session;
mod single_use;

pub use coordinator::ShardCoordinator;
pub use errors::CoordinationError;
pub use single_use::IssuedRecord;
