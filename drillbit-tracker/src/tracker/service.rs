//! StatementTracker - creates statements and tracks their generation tasks.
//!
//! One tracker owns one task matrix at a time. Every accepted creation
//! request replaces the matrix, cancels the pollers of the previous one,
//! and spawns a poller per (simulation, frequency) cell. Pollers report
//! back through a shared, mutex-guarded matrix and a watch channel.

use drillbit_client::{Frequency, ObjectId, StatementQuery, StatementTasks};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::matrix::{Progress, TaskMatrix, TaskStatus};
use super::poller::{poll_task, PollOutcome, PollPolicy};
use crate::backend::StatementBackend;
use crate::config::TrackerSettings;
use crate::environment::EnvironmentAggregate;
use crate::error::{Result, TrackerError};
use crate::project::ProjectGroup;
use crate::simulation::resolve_simulations;

/// Result of a `create_statements` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// Statements already existed; nothing was created or tracked.
    Existing,
    /// New tasks are being tracked under `generation`.
    Created { tasks: usize, generation: u64 },
}

/// Side-channel report views, refreshed independently of polling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Views {
    pub summary: Option<Value>,
    pub projects_by_account: Option<Value>,
}

struct Shared {
    matrix: Mutex<TaskMatrix>,
    views: Mutex<Views>,
    progress: watch::Sender<Progress>,
}

impl Shared {
    fn matrix(&self) -> MutexGuard<'_, TaskMatrix> {
        self.matrix.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn views(&self) -> MutexGuard<'_, Views> {
        self.views.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, matrix: &TaskMatrix) {
        self.progress.send_replace(matrix.progress());
    }

    /// Record a pending tick. False once the matrix has moved on.
    fn record_attempt(
        &self,
        generation: u64,
        simulation_id: ObjectId,
        frequency: Frequency,
        attempt: u32,
        error: Option<String>,
    ) -> bool {
        let mut matrix = self.matrix();
        if matrix.generation() != generation {
            return false;
        }
        let applied = matrix.record_attempt(simulation_id, frequency, attempt, error);
        if applied {
            self.publish(&matrix);
        }
        applied
    }

    /// Write a poll outcome. Returns true when this write settled the
    /// last open cell of the current matrix.
    fn finish(
        &self,
        generation: u64,
        simulation_id: ObjectId,
        frequency: Frequency,
        outcome: PollOutcome,
    ) -> bool {
        let (status, attempts, error) = match outcome {
            PollOutcome::Success { attempts } => (TaskStatus::Success, attempts, None),
            PollOutcome::Failed { attempts, reason } => (TaskStatus::Failed, attempts, Some(reason)),
            PollOutcome::Abandoned { .. } => return false,
        };

        let mut matrix = self.matrix();
        if matrix.generation() != generation
            || !matrix.finish(simulation_id, frequency, status, attempts, error)
        {
            return false;
        }
        self.publish(&matrix);
        matrix.all_settled()
    }
}

/// Orchestrates statement creation and task completion tracking.
pub struct StatementTracker {
    backend: Arc<dyn StatementBackend>,
    policy: PollPolicy,
    settings: TrackerSettings,
    shared: Arc<Shared>,
    pollers: JoinSet<()>,
}

impl StatementTracker {
    pub fn new(backend: Arc<dyn StatementBackend>, policy: PollPolicy, settings: TrackerSettings) -> Self {
        let (progress, _) = watch::channel(Progress::default());
        Self {
            backend,
            policy,
            settings,
            shared: Arc::new(Shared {
                matrix: Mutex::new(TaskMatrix::default()),
                views: Mutex::new(Views::default()),
                progress,
            }),
            pollers: JoinSet::new(),
        }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    /// Ensure statements exist for every project of `group` at `frequency`.
    ///
    /// Returns once the backend has accepted (or short-circuited) the
    /// request; task completion is observed through [`Self::progress`] or
    /// [`Self::subscribe`].
    pub async fn create_statements(
        &mut self,
        environment: &EnvironmentAggregate,
        group: &ProjectGroup,
        frequency: Frequency,
        overwrite: bool,
    ) -> Result<CreateOutcome> {
        let keys = resolve_simulations(environment, group)?;
        if self.settings.require_locked_environment && !environment.all_locked() {
            return Err(TrackerError::EnvironmentUnlocked);
        }

        let environment_id = keys[0].environment_id;
        let project_ids: Vec<ObjectId> = keys.iter().map(|k| k.project_id).collect();
        let query = StatementQuery::new(environment_id, project_ids, frequency);

        if overwrite {
            let simulations: Vec<ObjectId> = self
                .backend
                .simulations(environment_id, &query.project_ids)
                .await?
                .into_iter()
                .map(|s| s.id)
                .collect();
            info!(
                environment = environment_id,
                simulations = simulations.len(),
                "Deleting existing statements"
            );
            self.backend.delete_all_statements(&simulations).await?;
        }

        if self.backend.statement_exists(&query).await? {
            if !overwrite {
                info!(
                    environment = environment_id,
                    frequency = %frequency,
                    "Statements already exist, skipping creation"
                );
                if self.settings.fetch_views {
                    self.refresh_summary(&query).await;
                    refresh_accounts(self.backend.as_ref(), &self.shared, &query).await;
                }
                return Ok(CreateOutcome::Existing);
            }
            warn!(environment = environment_id, "Statements still exist after delete, recreating");
        }

        let tasks = self.backend.create_statements(&query).await?;
        let owners = self.owners(&query, &tasks).await;
        let count = tasks.values().map(|row| row.len()).sum::<usize>();

        self.cancel_all();
        let generation = {
            let mut matrix = self.shared.matrix();
            let generation = matrix.generation() + 1;
            *matrix = TaskMatrix::from_tasks(generation, &tasks, owners);
            matrix.start_all();
            self.shared.publish(&matrix);
            generation
        };
        info!(
            environment = environment_id,
            frequency = %frequency,
            tasks = count,
            generation,
            "Tracking statement tasks"
        );

        if self.settings.fetch_views {
            self.refresh_summary(&query).await;
        }

        let query = Arc::new(query);
        for (simulation_id, row) in &tasks {
            for (task_frequency, task_id) in row {
                self.spawn_poller(generation, *simulation_id, *task_frequency, task_id.clone(), query.clone());
            }
        }

        Ok(CreateOutcome::Created {
            tasks: count,
            generation,
        })
    }

    /// Snapshot of the current matrix.
    pub fn matrix(&self) -> TaskMatrix {
        self.shared.matrix().clone()
    }

    pub fn progress(&self) -> Progress {
        self.shared.matrix().progress()
    }

    /// Receive a new [`Progress`] after every matrix change.
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.shared.progress.subscribe()
    }

    pub fn views(&self) -> Views {
        self.shared.views().clone()
    }

    /// Number of pollers still owned (running or not yet joined).
    pub fn active_pollers(&self) -> usize {
        self.pollers.len()
    }

    /// Abort every running poller. Cells they were polling stay `Polling`.
    pub fn cancel_all(&mut self) {
        if !self.pollers.is_empty() {
            debug!(pollers = self.pollers.len(), "Cancelling pollers");
        }
        self.pollers.abort_all();
        self.pollers.detach_all();
    }

    /// Wait for every poller to finish.
    pub async fn wait_idle(&mut self) {
        while let Some(joined) = self.pollers.join_next().await {
            if let Err(e) = joined {
                if !e.is_cancelled() {
                    warn!(error = %e, "Poller panicked");
                }
            }
        }
    }

    fn spawn_poller(
        &mut self,
        generation: u64,
        simulation_id: ObjectId,
        frequency: Frequency,
        task_id: String,
        query: Arc<StatementQuery>,
    ) {
        let backend = self.backend.clone();
        let shared = self.shared.clone();
        let policy = self.policy;
        let fetch_views = self.settings.fetch_views;

        self.pollers.spawn(async move {
            let outcome = poll_task(backend.as_ref(), &policy, &task_id, |attempt, error| {
                shared.record_attempt(generation, simulation_id, frequency, attempt, error)
            })
            .await;

            if shared.finish(generation, simulation_id, frequency, outcome) {
                let progress = shared.matrix().progress();
                info!(
                    generation,
                    complete = progress.complete,
                    failed = progress.failed,
                    "All statement tasks settled"
                );
                if fetch_views {
                    refresh_accounts(backend.as_ref(), &shared, &query).await;
                }
            }
        });
    }

    /// Map each created simulation back to its project.
    ///
    /// The tasks are already accepted at this point, so a failed lookup only
    /// leaves per-project completion unresolved.
    async fn owners(&self, query: &StatementQuery, tasks: &StatementTasks) -> HashMap<ObjectId, ObjectId> {
        let simulations = match self
            .backend
            .simulations(query.environment, &query.project_ids)
            .await
        {
            Ok(simulations) => simulations,
            Err(e) => {
                warn!(error = %e, "Failed to resolve simulation owners");
                return HashMap::new();
            }
        };
        let owners: HashMap<ObjectId, ObjectId> = simulations
            .into_iter()
            .filter(|s| tasks.contains_key(&s.id))
            .map(|s| (s.id, s.project))
            .collect();

        if owners.len() < tasks.len() {
            warn!(
                tasks = tasks.len(),
                resolved = owners.len(),
                "Some simulations could not be mapped to a project"
            );
        }
        owners
    }

    async fn refresh_summary(&self, query: &StatementQuery) {
        match self.backend.summary(query).await {
            Ok(summary) => self.shared.views().summary = Some(summary),
            Err(e) => warn!(error = %e, "Failed to fetch statement summary"),
        }
    }
}

async fn refresh_accounts(backend: &dyn StatementBackend, shared: &Shared, query: &StatementQuery) {
    match backend.projects_by_account(query).await {
        Ok(view) => shared.views().projects_by_account = Some(view),
        Err(e) => warn!(error = %e, "Failed to fetch projects by account"),
    }
}
