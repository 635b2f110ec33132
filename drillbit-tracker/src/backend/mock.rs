//! In-memory backend for tests and dry runs.

use async_trait::async_trait;
use drillbit_client::{
    CreateShape, Created, Frequency, ObjectId, Pk, ResourceRef, SimulationRecord, StatementQuery,
    StatementRequest, StatementTasks, TaskState,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::traits::*;

/// Mock backend for testing.
///
/// Keeps records, simulations and statements in memory. Task states are
/// scripted per task id; once a script runs dry its last state repeats.
/// Every call is appended to an ordered log so tests can assert sequencing.
pub struct MockBackend {
    state: Mutex<MockState>,
    available: AtomicBool,
    reject_create: AtomicBool,
    fail_simulations: AtomicBool,
}

struct MockState {
    objects: HashMap<ResourceRef, BTreeMap<ObjectId, Value>>,
    next_object_id: ObjectId,
    simulations: Vec<SimulationRecord>,
    next_simulation_id: ObjectId,
    statements: HashSet<(ObjectId, Frequency)>,
    generated_frequencies: Option<Vec<Frequency>>,
    task_scripts: HashMap<String, VecDeque<TaskState>>,
    default_task_state: TaskState,
    failing_tasks: HashSet<String>,
    task_calls: HashMap<String, u32>,
    calls: Vec<String>,
}

impl MockBackend {
    /// Create an empty mock backend.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                objects: HashMap::new(),
                next_object_id: 1,
                simulations: Vec::new(),
                next_simulation_id: 101,
                statements: HashSet::new(),
                generated_frequencies: None,
                task_scripts: HashMap::new(),
                default_task_state: TaskState::Success,
                failing_tasks: HashSet::new(),
                task_calls: HashMap::new(),
                calls: Vec::new(),
            }),
            available: AtomicBool::new(true),
            reject_create: AtomicBool::new(false),
            fail_simulations: AtomicBool::new(false),
        }
    }

    /// Task id the mock hands out for a simulation and frequency.
    pub fn task_id(simulation: ObjectId, frequency: Frequency) -> String {
        format!("task-{}-{}", simulation, frequency)
    }

    /// State returned for tasks without a script.
    pub fn with_default_task_state(self, state: TaskState) -> Self {
        self.lock().default_task_state = state;
        self
    }

    /// Generate these frequencies on every create instead of only the requested one.
    pub fn with_generated_frequencies(self, frequencies: Vec<Frequency>) -> Self {
        self.lock().generated_frequencies = Some(frequencies);
        self
    }

    /// Script the states a task reports, one per poll.
    pub fn with_task_script(self, task_id: impl Into<String>, states: Vec<TaskState>) -> Self {
        self.lock().task_scripts.insert(task_id.into(), states.into());
        self
    }

    /// Make every status query for this task fail at the transport level.
    pub fn with_failing_task(self, task_id: impl Into<String>) -> Self {
        self.lock().failing_tasks.insert(task_id.into());
        self
    }

    /// Set availability.
    pub fn with_available(self, available: bool) -> Self {
        self.available.store(available, Ordering::SeqCst);
        self
    }

    /// Reject statement creation with a request error.
    pub fn set_reject_create(&self, reject: bool) {
        self.reject_create.store(reject, Ordering::SeqCst);
    }

    /// Fail simulation listings with a transport error.
    pub fn set_fail_simulations(&self, fail: bool) {
        self.fail_simulations.store(fail, Ordering::SeqCst);
    }

    /// Store a record and return its id (an `id` in the value is kept).
    pub fn insert_object(&self, resource: ResourceRef, value: Value) -> ObjectId {
        let mut state = self.lock();
        state.store(resource, value)
    }

    /// Read a stored record.
    pub fn object(&self, resource: ResourceRef, id: ObjectId) -> Option<Value> {
        self.lock().objects.get(&resource).and_then(|m| m.get(&id)).cloned()
    }

    /// Persist a simulation ahead of time and return its id.
    pub fn seed_simulation(&self, environment: ObjectId, project: ObjectId) -> ObjectId {
        self.lock().simulation_for(environment, project)
    }

    /// Mark a statement as already generated.
    pub fn seed_statement(&self, simulation: ObjectId, frequency: Frequency) {
        self.lock().statements.insert((simulation, frequency));
    }

    /// Number of statements currently stored.
    pub fn statement_count(&self) -> usize {
        self.lock().statements.len()
    }

    /// Number of status queries made for a task.
    pub fn task_calls(&self, task_id: &str) -> u32 {
        self.lock().task_calls.get(task_id).copied().unwrap_or(0)
    }

    /// Ordered log of calls, e.g. `statement_exists` or `task_state:task-101-M`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Number of logged calls whose name starts with `prefix`.
    pub fn call_count(&self, prefix: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Reset the call log and counters.
    pub fn reset_calls(&self) {
        let mut state = self.lock();
        state.calls.clear();
        state.task_calls.clear();
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(&self, call: impl Into<String>) -> Result<MutexGuard<'_, MockState>, BackendError> {
        let mut state = self.lock();
        state.calls.push(call.into());
        if !self.available.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("Mock backend disabled".to_string()));
        }
        Ok(state)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockState {
    fn store(&mut self, resource: ResourceRef, mut value: Value) -> ObjectId {
        let id = match value.get("id").and_then(Value::as_i64) {
            Some(id) => id,
            None => {
                let id = self.next_object_id;
                value["id"] = json!(id);
                id
            }
        };
        self.next_object_id = self.next_object_id.max(id + 1);
        self.objects.entry(resource).or_default().insert(id, value);
        id
    }

    fn fetch(&self, resource: &ResourceRef, id: ObjectId) -> Result<Value, BackendError> {
        let value = self
            .objects
            .get(resource)
            .and_then(|m| m.get(&id))
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("{}/{}", resource, id)))?;

        if *resource == ResourceRef::PROJECT_GROUP {
            return Ok(self.expand_group(value));
        }
        Ok(value)
    }

    /// Groups are saved as `project_ids` but read back with full `projects`.
    fn expand_group(&self, mut group: Value) -> Value {
        let ids: Vec<ObjectId> = group
            .get("project_ids")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default();

        if !ids.is_empty() || group.get("projects").is_none() {
            let projects: Vec<Value> = ids
                .iter()
                .filter_map(|id| {
                    self.objects
                        .get(&ResourceRef::PROJECT)
                        .and_then(|m| m.get(id))
                        .cloned()
                })
                .collect();
            group["projects"] = Value::Array(projects);
        }
        group
    }

    fn simulation_for(&mut self, environment: ObjectId, project: ObjectId) -> ObjectId {
        if let Some(sim) = self
            .simulations
            .iter()
            .find(|s| s.environment == environment && s.project == project)
        {
            return sim.id;
        }
        let id = self.next_simulation_id;
        self.next_simulation_id += 1;
        self.simulations.push(SimulationRecord {
            id,
            environment,
            project,
        });
        id
    }

    fn simulations_for(&self, environment: ObjectId, project_ids: &[ObjectId]) -> Vec<SimulationRecord> {
        self.simulations
            .iter()
            .filter(|s| s.environment == environment && project_ids.contains(&s.project))
            .cloned()
            .collect()
    }

    fn pk_id(resource: &ResourceRef, pk: &Pk) -> Result<ObjectId, BackendError> {
        match pk {
            Pk::Int(id) => Ok(*id),
            Pk::Str(s) => s
                .parse()
                .map_err(|_| BackendError::NotFound(format!("{}/{}", resource, s))),
        }
    }
}

#[async_trait]
impl ObjectBackend for MockBackend {
    async fn list_objects(&self, resource: &ResourceRef) -> Result<Vec<Value>, BackendError> {
        let state = self.enter(format!("list:{}", resource))?;
        Ok(state
            .objects
            .get(resource)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_object(&self, resource: &ResourceRef, pk: &Pk) -> Result<Value, BackendError> {
        let state = self.enter(format!("get:{}/{}", resource, pk))?;
        state.fetch(resource, MockState::pk_id(resource, pk)?)
    }

    async fn create_object(
        &self,
        resource: &ResourceRef,
        body: Value,
        shape: CreateShape,
    ) -> Result<Created<Value>, BackendError> {
        let mut state = self.enter(format!("create:{}", resource))?;
        match (shape, body) {
            (CreateShape::Many, Value::Array(items)) => {
                let mut created = Vec::with_capacity(items.len());
                for item in items {
                    let id = state.store(*resource, item);
                    created.push(state.fetch(resource, id)?);
                }
                Ok(Created::Many(created))
            }
            (CreateShape::One, body @ Value::Object(_)) => {
                let id = state.store(*resource, body);
                Ok(Created::One(state.fetch(resource, id)?))
            }
            (shape, _) => Err(BackendError::RequestFailed(format!(
                "body does not match {:?} create",
                shape
            ))),
        }
    }

    async fn update_object(
        &self,
        resource: &ResourceRef,
        pk: &Pk,
        mut body: Value,
    ) -> Result<Value, BackendError> {
        let mut state = self.enter(format!("update:{}/{}", resource, pk))?;
        let id = MockState::pk_id(resource, pk)?;
        state.fetch(resource, id)?;
        body["id"] = json!(id);
        state.store(*resource, body);
        state.fetch(resource, id)
    }

    async fn delete_object(&self, resource: &ResourceRef, pk: &Pk) -> Result<bool, BackendError> {
        let mut state = self.enter(format!("delete:{}/{}", resource, pk))?;
        let id = MockState::pk_id(resource, pk)?;
        Ok(state
            .objects
            .get_mut(resource)
            .and_then(|m| m.remove(&id))
            .is_some())
    }

    async fn bulk_update(
        &self,
        resource: &ResourceRef,
        items: Vec<Value>,
    ) -> Result<Vec<Value>, BackendError> {
        let mut state = self.enter(format!("bulk_update:{}", resource))?;
        let mut updated = Vec::with_capacity(items.len());
        for item in items {
            let id = state.store(*resource, item);
            updated.push(state.fetch(resource, id)?);
        }
        Ok(updated)
    }

    async fn object_action(
        &self,
        resource: &ResourceRef,
        pk: &Pk,
        action: &str,
        method: ActionMethod,
    ) -> Result<Value, BackendError> {
        let state = self.enter(format!("action:{}/{}/{}", resource, pk, action))?;
        let record = state.fetch(resource, MockState::pk_id(resource, pk)?)?;
        match method {
            ActionMethod::Put => Ok(record),
            ActionMethod::Get => Ok(json!({ "id": record["id"], "action": action })),
        }
    }
}

#[async_trait]
impl StatementBackend for MockBackend {
    async fn simulations(
        &self,
        environment: ObjectId,
        project_ids: &[ObjectId],
    ) -> Result<Vec<SimulationRecord>, BackendError> {
        let state = self.enter("simulations")?;
        if self.fail_simulations.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("simulation listing failed".into()));
        }
        Ok(state.simulations_for(environment, project_ids))
    }

    async fn statement_exists(&self, query: &StatementQuery) -> Result<bool, BackendError> {
        let state = self.enter("statement_exists")?;
        let sims = state.simulations_for(query.environment, &query.project_ids);
        Ok(!sims.is_empty()
            && sims.len() == query.project_ids.len()
            && sims
                .iter()
                .all(|s| state.statements.contains(&(s.id, query.frequency))))
    }

    async fn create_statements(
        &self,
        request: &StatementRequest,
    ) -> Result<StatementTasks, BackendError> {
        let mut state = self.enter("create_statements")?;
        if self.reject_create.load(Ordering::SeqCst) {
            return Err(BackendError::RequestFailed("HTTP 400: creation rejected".into()));
        }

        let frequencies = state
            .generated_frequencies
            .clone()
            .unwrap_or_else(|| vec![request.frequency]);

        let mut tasks = StatementTasks::new();
        for project in &request.project_ids {
            let sim = state.simulation_for(request.environment, *project);
            let row = tasks.entry(sim).or_insert_with(BTreeMap::new);
            for frequency in &frequencies {
                row.insert(*frequency, Self::task_id(sim, *frequency));
                state.statements.insert((sim, *frequency));
            }
        }
        Ok(tasks)
    }

    async fn delete_all_statements(&self, simulations: &[ObjectId]) -> Result<(), BackendError> {
        let mut state = self.enter("delete_all_statements")?;
        state.statements.retain(|(sim, _)| !simulations.contains(sim));
        Ok(())
    }

    async fn task_state(&self, task_id: &str) -> Result<TaskState, BackendError> {
        let mut state = self.enter(format!("task_state:{}", task_id))?;
        *state.task_calls.entry(task_id.to_string()).or_insert(0) += 1;

        if state.failing_tasks.contains(task_id) {
            return Err(BackendError::Unavailable(format!("task {} unreachable", task_id)));
        }

        let fallback = state.default_task_state.clone();
        let next = match state.task_scripts.get_mut(task_id) {
            Some(script) if script.len() > 1 => script.pop_front(),
            Some(script) => script.front().cloned(),
            None => None,
        };
        Ok(next.unwrap_or(fallback))
    }

    async fn summary(&self, query: &StatementQuery) -> Result<Value, BackendError> {
        self.enter("summary")?;
        Ok(json!({ "kind": "summary", "query": query }))
    }

    async fn projects_by_account(&self, query: &StatementQuery) -> Result<Value, BackendError> {
        self.enter("projects_by_account")?;
        Ok(json!({ "kind": "projects_by_account", "query": query }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_task_script_repeats_last_state() {
        let backend = MockBackend::new().with_task_script(
            "t1",
            vec![TaskState::Pending, TaskState::Success],
        );

        assert_eq!(backend.task_state("t1").await.unwrap(), TaskState::Pending);
        assert_eq!(backend.task_state("t1").await.unwrap(), TaskState::Success);
        assert_eq!(backend.task_state("t1").await.unwrap(), TaskState::Success);
        assert_eq!(backend.task_calls("t1"), 3);
    }

    #[tokio::test]
    async fn test_statement_lifecycle() {
        let backend = MockBackend::new();
        let query = StatementQuery::new(1, vec![10, 11], Frequency::Monthly);

        assert!(!backend.statement_exists(&query).await.unwrap());

        let tasks = backend.create_statements(&query).await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(backend.statement_count(), 2);
        assert!(backend.statement_exists(&query).await.unwrap());

        let sims: Vec<ObjectId> = tasks.keys().copied().collect();
        backend.delete_all_statements(&sims).await.unwrap();
        assert_eq!(backend.statement_count(), 0);
        assert!(!backend.statement_exists(&query).await.unwrap());
        assert_eq!(
            backend.calls(),
            vec![
                "statement_exists",
                "create_statements",
                "statement_exists",
                "delete_all_statements",
                "statement_exists"
            ]
        );
    }

    #[tokio::test]
    async fn test_group_reads_back_projects() {
        let backend = MockBackend::new();
        let p1 = backend.insert_object(ResourceRef::PROJECT, json!({"name": "Texas"}));
        let group = backend.insert_object(
            ResourceRef::PROJECT_GROUP,
            json!({"name": "Compare", "project_ids": [p1]}),
        );

        let value = backend
            .get_object(&ResourceRef::PROJECT_GROUP, &Pk::Int(group))
            .await
            .unwrap();
        assert_eq!(value["projects"][0]["name"], "Texas");
    }

    #[tokio::test]
    async fn test_mock_unavailable() {
        let backend = MockBackend::new().with_available(false);
        let result = backend.task_state("t1").await;
        assert!(matches!(result, Err(BackendError::Unavailable(_))));
    }
}
