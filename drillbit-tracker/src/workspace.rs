//! Workspace - one editing session over an environment and a project group.
//!
//! Owns the aggregates and the tracker for as long as the session lives;
//! nothing here is global. Call [`Workspace::close`] on teardown.

use drillbit_client::{Frequency, ObjectId};
use std::sync::Arc;
use tracing::info;

use crate::backend::{ObjectBackend, StatementBackend};
use crate::config::TrackerConfig;
use crate::environment::{EnvironmentAggregate, EnvironmentComponent};
use crate::error::Result;
use crate::model::{EnvironmentRecord, ProjectGroupRecord};
use crate::project::ProjectGroup;
use crate::simulation::{resolve_simulations, SimulationKey};
use crate::tracker::{CreateOutcome, StatementTracker};

pub struct Workspace {
    objects: Arc<dyn ObjectBackend>,
    environment: EnvironmentAggregate,
    group: ProjectGroup,
    tracker: StatementTracker,
}

impl Workspace {
    pub fn new(
        objects: Arc<dyn ObjectBackend>,
        statements: Arc<dyn StatementBackend>,
        config: &TrackerConfig,
    ) -> Self {
        Self {
            objects,
            environment: EnvironmentAggregate::new(),
            group: ProjectGroup::new(),
            tracker: StatementTracker::new(statements, config.poll_policy(), config.tracker.clone()),
        }
    }

    /// Build from one backend serving both object and statement endpoints.
    pub fn with_backend<B>(backend: Arc<B>, config: &TrackerConfig) -> Self
    where
        B: ObjectBackend + StatementBackend + 'static,
    {
        Self::new(backend.clone(), backend, config)
    }

    pub fn objects(&self) -> &dyn ObjectBackend {
        self.objects.as_ref()
    }

    pub fn environment(&self) -> &EnvironmentAggregate {
        &self.environment
    }

    pub fn environment_mut(&mut self) -> &mut EnvironmentAggregate {
        &mut self.environment
    }

    pub fn group(&self) -> &ProjectGroup {
        &self.group
    }

    pub fn group_mut(&mut self) -> &mut ProjectGroup {
        &mut self.group
    }

    pub fn tracker(&self) -> &StatementTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut StatementTracker {
        &mut self.tracker
    }

    pub async fn load_environment(&mut self, pk: ObjectId) -> Result<&EnvironmentRecord> {
        self.environment.load(self.objects.as_ref(), pk).await
    }

    pub async fn load_group(&mut self, pk: ObjectId) -> Result<&ProjectGroupRecord> {
        self.group.load(self.objects.as_ref(), pk).await
    }

    /// Lock every component in gate order, block schedule first.
    pub fn lock_environment(&mut self) -> Result<()> {
        for component in EnvironmentComponent::ALL {
            if !self.environment.is_locked(component) {
                self.environment.lock(component)?;
            }
        }
        Ok(())
    }

    /// Current environment × project pairs.
    pub fn simulations(&self) -> Result<Vec<SimulationKey>> {
        resolve_simulations(&self.environment, &self.group)
    }

    pub async fn create_statements(&mut self, frequency: Frequency, overwrite: bool) -> Result<CreateOutcome> {
        self.tracker
            .create_statements(&self.environment, &self.group, frequency, overwrite)
            .await
    }

    /// Tear down the session, cancelling any running pollers.
    pub fn close(mut self) {
        info!(pollers = self.tracker.active_pollers(), "Closing workspace");
        self.tracker.cancel_all();
    }
}
