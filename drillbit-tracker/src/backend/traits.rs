//! Core traits for Drillbit backends.

use async_trait::async_trait;
use drillbit_client::{
    CreateShape, Created, ObjectId, Pk, ResourceRef, SimulationRecord, StatementQuery,
    StatementRequest, StatementTasks, TaskState,
};
use serde_json::Value;

/// Error types for backend operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Backend is not reachable
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Request was rejected by the backend
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Response could not be decoded
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// HTTP verb for detail actions such as `project/{pk}/scale/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionMethod {
    Get,
    Put,
}

/// Generic record CRUD over `/{app}/{model}/` collections.
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// List every record in a collection.
    async fn list_objects(&self, resource: &ResourceRef) -> Result<Vec<Value>, BackendError>;

    /// Fetch one record.
    async fn get_object(&self, resource: &ResourceRef, pk: &Pk) -> Result<Value, BackendError>;

    /// Create records; `shape` is the endpoint's documented return shape.
    async fn create_object(
        &self,
        resource: &ResourceRef,
        body: Value,
        shape: CreateShape,
    ) -> Result<Created<Value>, BackendError>;

    /// Replace one record.
    async fn update_object(
        &self,
        resource: &ResourceRef,
        pk: &Pk,
        body: Value,
    ) -> Result<Value, BackendError>;

    /// Delete one record. Returns `false` if it did not exist.
    async fn delete_object(&self, resource: &ResourceRef, pk: &Pk) -> Result<bool, BackendError>;

    /// Replace many records at once.
    async fn bulk_update(
        &self,
        resource: &ResourceRef,
        items: Vec<Value>,
    ) -> Result<Vec<Value>, BackendError>;

    /// Invoke a detail action (`/{app}/{model}/{pk}/{action}/`).
    async fn object_action(
        &self,
        resource: &ResourceRef,
        pk: &Pk,
        action: &str,
        method: ActionMethod,
    ) -> Result<Value, BackendError>;
}

/// Statement generation and task polling.
#[async_trait]
pub trait StatementBackend: Send + Sync {
    /// Persisted simulations for an environment and a set of projects.
    async fn simulations(
        &self,
        environment: ObjectId,
        project_ids: &[ObjectId],
    ) -> Result<Vec<SimulationRecord>, BackendError>;

    /// Whether statements already exist for the query.
    async fn statement_exists(&self, query: &StatementQuery) -> Result<bool, BackendError>;

    /// Ask the backend to generate statements; returns the async task ids.
    async fn create_statements(
        &self,
        request: &StatementRequest,
    ) -> Result<StatementTasks, BackendError>;

    /// Delete every statement belonging to the given simulations.
    async fn delete_all_statements(&self, simulations: &[ObjectId]) -> Result<(), BackendError>;

    /// Current state of one generation task.
    async fn task_state(&self, task_id: &str) -> Result<TaskState, BackendError>;

    /// Summary view for the query.
    async fn summary(&self, query: &StatementQuery) -> Result<Value, BackendError>;

    /// Account breakdown across projects for the query.
    async fn projects_by_account(&self, query: &StatementQuery) -> Result<Value, BackendError>;
}
