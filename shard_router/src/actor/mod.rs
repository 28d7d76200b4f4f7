//! Actor runtime
//!
//! One tokio task per actor instance, addressed by instance name. Messages go
//! through a bounded mailbox and are answered over a oneshot channel.

mod host;

pub use host::{Actor, ActorHost, Clock, HostSettings, system_clock};
