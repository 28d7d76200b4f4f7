//! Lifecycle guards
//!
//! Pure state machines enforced inside actors. They take the current time as
//! an argument and never perform I/O; the owning actor's serialized execution
//! is what makes each transition atomic.

mod consumption;
mod rotation;
mod throttle;

pub use consumption::{ConsumeOutcome, SingleUseLedger};
pub use rotation::{FamilyLedger, FamilyState, FamilyStatus, RotationOutcome, TokenFamily};
pub use throttle::{AttemptRecord, AttemptThrottle, ThrottleConfig, ThrottleStatus};
