pub mod delivery;
pub mod deps;
pub mod error;
pub mod guard;
pub mod notify;
pub mod scheduler;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod workflow;

pub use error::CycleError;
pub use guard::{CycleGuard, CyclePermit};
pub use scheduler::DailySchedule;
pub use workflow::{CycleOutcome, CycleReport, CycleState, CycleStats, SkipReason, Workflow};
