//! Actor routing
//!
//! Turns `(tenant, shard key)` into a placed record and `(tenant, record id)`
//! back into the actor that owns it.

mod routing;
mod errors;
mod handle;

pub use routing::{ActorRouter, RoutedRecord};
pub(crate) use routing::validate_tenant_id;
pub use errors::RoutingError;
pub use handle::{ActorHandle, ActorKind, RouteTarget};
