//! Actor kinds hosted by the coordinator

mod rate_limit;
mod refresh;
mod session;
mod single_use;

pub use rate_limit::{RateLimitConfig, RateLimitMessage, RateLimitReply, RateLimiterActor};
pub use refresh::{RefreshConfig, RefreshMessage, RefreshReply, RefreshTokenActor};
pub use session::{SessionActor, SessionConfig, SessionMessage, SessionReply};
pub use single_use::{SingleUseActor, SingleUseConfig, SingleUseMessage, SingleUseReply};
