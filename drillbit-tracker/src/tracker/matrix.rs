//! Task status matrix: simulation → frequency → task.
//!
//! The matrix is the only source of progress. It is rebuilt from scratch
//! for every accepted creation request and tagged with a generation so
//! pollers from an earlier request can tell they are stale.

use chrono::{DateTime, Utc};
use drillbit_client::{Frequency, ObjectId, StatementTasks, TaskId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Lifecycle of one statement task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Created,
    Polling,
    Success,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed)
    }

    fn can_become(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Created, TaskStatus::Polling)
                | (TaskStatus::Polling, TaskStatus::Success)
                | (TaskStatus::Polling, TaskStatus::Failed)
        )
    }
}

/// One (simulation, frequency) cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskEntry {
    pub task_id: TaskId,
    pub simulation_id: ObjectId,
    pub frequency: Frequency,
    pub status: TaskStatus,
    /// Status queries made so far
    pub attempts: u32,
    /// Last poll error, or the failure reason once `Failed`
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskMatrix {
    generation: u64,
    cells: BTreeMap<ObjectId, BTreeMap<Frequency, TaskEntry>>,
    /// simulation id → project id
    owners: HashMap<ObjectId, ObjectId>,
    frequencies: BTreeSet<Frequency>,
}

/// Point-in-time view of a matrix, published after every change.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Progress {
    pub generation: u64,
    pub expected: usize,
    pub complete: usize,
    pub failed: usize,
    pub all_complete: bool,
    pub per_project: BTreeMap<ObjectId, bool>,
}

impl Progress {
    /// Every cell has reached `Success` or `Failed`.
    pub fn is_settled(&self) -> bool {
        self.complete + self.failed >= self.expected
    }
}

impl TaskMatrix {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            ..Default::default()
        }
    }

    /// Build a matrix from a creation response. Every cell starts `Created`.
    pub fn from_tasks(
        generation: u64,
        tasks: &StatementTasks,
        owners: HashMap<ObjectId, ObjectId>,
    ) -> Self {
        let now = Utc::now();
        let mut matrix = Self::new(generation);
        for (simulation_id, row) in tasks {
            let cells = matrix.cells.entry(*simulation_id).or_default();
            for (frequency, task_id) in row {
                matrix.frequencies.insert(*frequency);
                cells.insert(
                    *frequency,
                    TaskEntry {
                        task_id: task_id.clone(),
                        simulation_id: *simulation_id,
                        frequency: *frequency,
                        status: TaskStatus::Created,
                        attempts: 0,
                        error: None,
                        created_at: now,
                        finished_at: None,
                    },
                );
            }
        }
        matrix.owners = owners;
        matrix
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, simulation_id: ObjectId, frequency: Frequency) -> Option<&TaskEntry> {
        self.cells.get(&simulation_id)?.get(&frequency)
    }

    pub fn entries(&self) -> impl Iterator<Item = &TaskEntry> {
        self.cells.values().flat_map(|row| row.values())
    }

    pub fn simulations(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.cells.keys().copied()
    }

    pub fn frequencies(&self) -> &BTreeSet<Frequency> {
        &self.frequencies
    }

    pub fn owner(&self, simulation_id: ObjectId) -> Option<ObjectId> {
        self.owners.get(&simulation_id).copied()
    }

    /// Move a cell to `next`. Returns false if the cell is missing or the
    /// move is not allowed; terminal cells never move again.
    pub fn transition(&mut self, simulation_id: ObjectId, frequency: Frequency, next: TaskStatus) -> bool {
        let Some(entry) = self.cell_mut(simulation_id, frequency) else {
            return false;
        };
        if !entry.status.can_become(next) {
            return false;
        }
        entry.status = next;
        if next.is_terminal() {
            entry.finished_at = Some(Utc::now());
        }
        true
    }

    /// Record a non-terminal poll. Only applies while the cell is polling.
    pub fn record_attempt(
        &mut self,
        simulation_id: ObjectId,
        frequency: Frequency,
        attempts: u32,
        error: Option<String>,
    ) -> bool {
        match self.cell_mut(simulation_id, frequency) {
            Some(entry) if entry.status == TaskStatus::Polling => {
                entry.attempts = attempts;
                entry.error = error;
                true
            }
            _ => false,
        }
    }

    /// Finish a cell as `Success` or `Failed`.
    pub fn finish(
        &mut self,
        simulation_id: ObjectId,
        frequency: Frequency,
        status: TaskStatus,
        attempts: u32,
        error: Option<String>,
    ) -> bool {
        if !status.is_terminal() || !self.transition(simulation_id, frequency, status) {
            return false;
        }
        if let Some(entry) = self.cell_mut(simulation_id, frequency) {
            entry.attempts = attempts;
            entry.error = error;
        }
        true
    }

    /// Move every `Created` cell to `Polling`.
    pub fn start_all(&mut self) {
        for row in self.cells.values_mut() {
            for entry in row.values_mut() {
                if entry.status == TaskStatus::Created {
                    entry.status = TaskStatus::Polling;
                }
            }
        }
    }

    // ==================== Progress ====================

    pub fn has_tasks(&self) -> bool {
        self.cells.values().any(|row| !row.is_empty())
    }

    /// Simulations × tracked frequencies.
    pub fn total_expected(&self) -> usize {
        self.cells.len() * self.frequencies.len()
    }

    pub fn total_complete(&self) -> usize {
        self.count(TaskStatus::Success)
    }

    pub fn total_failed(&self) -> usize {
        self.count(TaskStatus::Failed)
    }

    pub fn all_complete(&self) -> bool {
        let expected = self.total_expected();
        expected > 0 && self.total_complete() == expected
    }

    pub fn all_settled(&self) -> bool {
        self.has_tasks() && self.entries().all(|e| e.status.is_terminal())
    }

    /// Per project: every tracked frequency of every owned simulation succeeded.
    pub fn per_project_complete(&self) -> BTreeMap<ObjectId, bool> {
        let mut result = BTreeMap::new();
        for (simulation_id, project_id) in &self.owners {
            let done = self.simulation_complete(*simulation_id);
            *result.entry(*project_id).or_insert(true) &= done;
        }
        result
    }

    pub fn progress(&self) -> Progress {
        Progress {
            generation: self.generation,
            expected: self.total_expected(),
            complete: self.total_complete(),
            failed: self.total_failed(),
            all_complete: self.all_complete(),
            per_project: self.per_project_complete(),
        }
    }

    fn simulation_complete(&self, simulation_id: ObjectId) -> bool {
        let Some(row) = self.cells.get(&simulation_id) else {
            return false;
        };
        self.frequencies.iter().all(|frequency| {
            row.get(frequency)
                .map(|e| e.status == TaskStatus::Success)
                .unwrap_or(false)
        })
    }

    fn count(&self, status: TaskStatus) -> usize {
        self.entries().filter(|e| e.status == status).count()
    }

    fn cell_mut(&mut self, simulation_id: ObjectId, frequency: Frequency) -> Option<&mut TaskEntry> {
        self.cells.get_mut(&simulation_id)?.get_mut(&frequency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const S1: ObjectId = 1;
    const S2: ObjectId = 2;
    const S3: ObjectId = 3;
    const A: ObjectId = 100;
    const B: ObjectId = 200;

    fn scenario() -> TaskMatrix {
        let mut tasks = StatementTasks::new();
        for sim in [S1, S2, S3] {
            let row = tasks.entry(sim).or_default();
            for frequency in [Frequency::Monthly, Frequency::Quarterly] {
                row.insert(frequency, format!("t-{}-{}", sim, frequency));
            }
        }
        let owners = HashMap::from([(S1, A), (S2, A), (S3, B)]);
        let mut matrix = TaskMatrix::from_tasks(1, &tasks, owners);
        matrix.start_all();
        matrix
    }

    fn succeed(matrix: &mut TaskMatrix, sim: ObjectId, frequency: Frequency) {
        assert!(matrix.finish(sim, frequency, TaskStatus::Success, 1, None));
    }

    #[test]
    fn test_per_project_completion() {
        let mut matrix = scenario();
        assert_eq!(matrix.total_expected(), 6);
        assert_eq!(matrix.owner(S2), Some(A));
        assert_eq!(matrix.owner(99), None);

        succeed(&mut matrix, S1, Frequency::Monthly);
        succeed(&mut matrix, S1, Frequency::Quarterly);
        succeed(&mut matrix, S2, Frequency::Monthly);

        let per_project = matrix.per_project_complete();
        assert_eq!(per_project[&A], false);
        assert_eq!(per_project[&B], false);

        succeed(&mut matrix, S2, Frequency::Quarterly);
        assert_eq!(matrix.per_project_complete()[&A], true);
        assert_eq!(matrix.per_project_complete()[&B], false);
        assert!(!matrix.all_complete());

        succeed(&mut matrix, S3, Frequency::Monthly);
        succeed(&mut matrix, S3, Frequency::Quarterly);
        assert_eq!(matrix.per_project_complete()[&B], true);
        assert!(matrix.all_complete());
        assert_eq!(matrix.total_complete(), 6);
    }

    #[test]
    fn test_terminal_cells_never_move() {
        let mut matrix = scenario();
        assert!(matrix.finish(S1, Frequency::Monthly, TaskStatus::Failed, 3, Some("boom".into())));

        assert!(!matrix.transition(S1, Frequency::Monthly, TaskStatus::Success));
        assert!(!matrix.transition(S1, Frequency::Monthly, TaskStatus::Polling));
        assert!(!matrix.record_attempt(S1, Frequency::Monthly, 4, None));

        let entry = matrix.get(S1, Frequency::Monthly).unwrap();
        assert_eq!(entry.status, TaskStatus::Failed);
        assert_eq!(entry.attempts, 3);
        assert!(entry.finished_at.is_some());
    }

    #[test]
    fn test_failed_cells_block_all_complete() {
        let mut matrix = scenario();
        for sim in [S1, S2, S3] {
            for frequency in [Frequency::Monthly, Frequency::Quarterly] {
                let status = if sim == S3 && frequency == Frequency::Quarterly {
                    TaskStatus::Failed
                } else {
                    TaskStatus::Success
                };
                matrix.finish(sim, frequency, status, 1, None);
                assert!(matrix.total_complete() <= matrix.total_expected());
            }
        }

        let progress = matrix.progress();
        assert_eq!(progress.complete, 5);
        assert_eq!(progress.failed, 1);
        assert!(!progress.all_complete);
        assert!(progress.is_settled());
        assert!(matrix.all_settled());
    }

    #[test]
    fn test_created_must_poll_before_finishing() {
        let mut tasks = StatementTasks::new();
        tasks.entry(S1).or_default().insert(Frequency::Annual, "t".to_string());
        let mut matrix = TaskMatrix::from_tasks(1, &tasks, HashMap::new());

        assert!(!matrix.finish(S1, Frequency::Annual, TaskStatus::Success, 1, None));
        assert!(matrix.transition(S1, Frequency::Annual, TaskStatus::Polling));
        assert!(matrix.finish(S1, Frequency::Annual, TaskStatus::Success, 1, None));
    }

    #[test]
    fn test_empty_matrix_is_never_complete() {
        let matrix = TaskMatrix::new(0);
        assert!(!matrix.has_tasks());
        assert_eq!(matrix.total_expected(), 0);
        assert!(!matrix.all_complete());
        assert!(!matrix.all_settled());
    }
}
