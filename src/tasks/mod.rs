//! The task pipeline (spec §4.9-§4.12): task shapes, the per-queue-group
//! scheduler, the three worker pools, and the `TaskManager` façade that
//! external producers push work through.

pub mod manager;
pub mod pools;
pub mod queue;
pub mod task;

pub use manager::TaskManager;
pub use queue::{PopFromOutcome, PopToken, QueueState, QueueStatus, TaskQueueGroup};
pub use task::{IndexingTask, IndexingTaskKind, ProcessingTask, ProcessingTaskKind, ReadonlyTask, ReadonlyTaskKind};
