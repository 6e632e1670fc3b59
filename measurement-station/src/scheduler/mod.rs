//! Adaptive periodic measurement scheduler.
//!
//! One [`ScheduleActor`] owns the timer and the schedule state; the rest of
//! the process talks to it through a cloned [`SchedulerHandle`].
//!
//! ```text
//! Disabled ⇄ PendingStart → Recurring
//!     ↑___________________________|   (any state, on Reconfigure)
//! ```

pub mod actor;
pub mod handle;
pub mod messages;
pub mod period;
pub mod runner;

pub use actor::{ActorOutcome, DEFAULT_SHUTDOWN_TIMEOUT, ScheduleActor};
pub use handle::{SchedulerHandle, SendError};
pub use messages::{SchedulePhase, ScheduleSnapshot};
pub use period::RecurrencePeriod;
pub use runner::AcquisitionRunner;
