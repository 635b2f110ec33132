//! Statement task tracking.
//!
//! - `matrix`: per (simulation, frequency) task state and progress queries
//! - `poller`: the per-task status polling loop and its policy
//! - `service`: `StatementTracker`, which ties creation, polling and views together

pub mod matrix;
pub mod poller;
pub mod service;

pub use matrix::{Progress, TaskEntry, TaskMatrix, TaskStatus};
pub use poller::{poll_task, Backoff, PollOutcome, PollPolicy};
pub use service::{CreateOutcome, StatementTracker, Views};
