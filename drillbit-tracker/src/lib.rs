//! Drillbit statement tracker
//!
//! Session-scoped state for generating financial statements against the
//! Drillbit backend:
//!
//! - [`EnvironmentAggregate`]: four forecasts plus the lock gate
//! - [`ProjectGroup`]: the projects being compared
//! - [`resolve_simulations`]: environment × project pairs
//! - [`StatementTracker`]: creates statements and polls their tasks
//! - [`Workspace`]: owns all of the above for one session
//!
//! ## Example
//!
//! ```rust,no_run
//! use drillbit_client::Frequency;
//! use drillbit_tracker::{HttpBackend, TrackerConfig, Workspace};
//! use std::sync::Arc;
//!
//! # async fn example() -> drillbit_tracker::Result<()> {
//! let config = TrackerConfig::default();
//! let backend = Arc::new(HttpBackend::from_config(config.client.clone())?);
//! let mut workspace = Workspace::with_backend(backend, &config);
//!
//! workspace.load_environment(3).await?;
//! workspace.load_group(12).await?;
//! workspace.lock_environment()?;
//! workspace.create_statements(Frequency::Monthly, false).await?;
//! workspace.tracker_mut().wait_idle().await;
//!
//! println!("{:?}", workspace.tracker().progress());
//! workspace.close();
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod environment;
pub mod error;
pub mod model;
pub mod project;
pub mod simulation;
pub mod store;
pub mod tracker;
pub mod workspace;

pub use backend::{ActionMethod, BackendError, HttpBackend, MockBackend, ObjectBackend, StatementBackend};
pub use config::{BackoffConfig, PollConfig, TrackerConfig, TrackerSettings};
pub use environment::{EnvironmentAggregate, EnvironmentComponent, LockFlags};
pub use error::{Result, TrackerError};
pub use model::{EnvironmentRecord, ForecastRecord, ProjectGroupRecord, ProjectRecord};
pub use project::ProjectGroup;
pub use simulation::{resolve_simulations, SimulationKey};
pub use store::ObjectStore;
pub use tracker::{
    Backoff, CreateOutcome, PollPolicy, Progress, StatementTracker, TaskEntry, TaskMatrix, TaskStatus, Views,
};
pub use workspace::Workspace;
