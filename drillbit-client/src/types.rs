//! Types for the Drillbit REST API

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Integer primary key used by every Drillbit model
pub type ObjectId = i64;

/// Celery task identifier returned by statement creation
pub type TaskId = String;

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL for the Django REST API
    pub base_url: String,
    /// Optional API key, sent as a bearer token
    pub api_key: Option<String>,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

// ==================== Resources ====================

/// A REST collection, addressed as `/{app}/{model}/`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub app: &'static str,
    pub model: &'static str,
}

impl ResourceRef {
    pub const RIG: Self = Self::new("products", "rig");
    pub const COOLING: Self = Self::new("products", "cooling");
    pub const HEAT_REJECTION: Self = Self::new("products", "heat-rejection");
    pub const ELECTRICAL: Self = Self::new("products", "electrical");

    pub const BLOCK_SCHEDULE: Self = Self::new("environment", "block-schedule");
    pub const BITCOIN_PRICE: Self = Self::new("environment", "bitcoin-price");
    pub const TRANSACTION_FEES: Self = Self::new("environment", "transaction-fees");
    pub const HASH_RATE: Self = Self::new("environment", "hash-rate");
    pub const ENVIRONMENT: Self = Self::new("environment", "environment");

    pub const PROJECT: Self = Self::new("projects", "project");
    pub const PROJECT_GROUP: Self = Self::new("projects", "projects");
    pub const SIMULATION: Self = Self::new("projects", "simulation");
    pub const STATEMENT: Self = Self::new("projects", "statement");

    pub const fn new(app: &'static str, model: &'static str) -> Self {
        Self { app, model }
    }

    /// `{base}/{app}/{model}/`
    pub fn collection_url(&self, base_url: &str) -> String {
        format!("{}/{}/{}/", base_url.trim_end_matches('/'), self.app, self.model)
    }

    /// `{base}/{app}/{model}/{pk}/`
    pub fn detail_url(&self, base_url: &str, pk: &Pk) -> String {
        format!("{}{}/", self.collection_url(base_url), pk)
    }

    /// `{base}/{app}/{model}/bulk-update/`
    pub fn bulk_update_url(&self, base_url: &str) -> String {
        format!("{}bulk-update/", self.collection_url(base_url))
    }

    /// `{base}/{app}/{model}/{pk}/{action}/`
    pub fn action_url(&self, base_url: &str, pk: &Pk, action: &str) -> String {
        format!("{}{}/", self.detail_url(base_url, pk), action)
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app, self.model)
    }
}

/// Primary key of a record, either numeric or string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Pk {
    Int(i64),
    Str(String),
}

impl From<i64> for Pk {
    fn from(id: i64) -> Self {
        Pk::Int(id)
    }
}

impl From<&str> for Pk {
    fn from(id: &str) -> Self {
        Pk::Str(id.to_string())
    }
}

impl From<String> for Pk {
    fn from(id: String) -> Self {
        Pk::Str(id)
    }
}

impl fmt::Display for Pk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pk::Int(id) => write!(f, "{}", id),
            Pk::Str(id) => f.write_str(id),
        }
    }
}

// ==================== Create results ====================

/// Shape a create endpoint is documented to return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateShape {
    One,
    Many,
}

/// Result of a create call, tagged by the endpoint contract
#[derive(Debug, Clone, PartialEq)]
pub enum Created<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Created<T> {
    pub fn len(&self) -> usize {
        match self {
            Created::One(_) => 1,
            Created::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into a list regardless of shape
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Created::One(item) => vec![item],
            Created::Many(items) => items,
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Created<U> {
        match self {
            Created::One(item) => Created::One(f(item)),
            Created::Many(items) => Created::Many(items.into_iter().map(f).collect()),
        }
    }
}

// ==================== Statements ====================

/// Reporting granularity of a financial statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Frequency {
    #[serde(rename = "H")]
    Hourly,
    #[serde(rename = "D")]
    Daily,
    #[serde(rename = "M")]
    Monthly,
    #[serde(rename = "Q")]
    Quarterly,
    #[serde(rename = "A")]
    Annual,
}

impl Frequency {
    /// Every frequency the backend generates, finest first
    pub const ALL: [Frequency; 5] = [
        Frequency::Hourly,
        Frequency::Daily,
        Frequency::Monthly,
        Frequency::Quarterly,
        Frequency::Annual,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Frequency::Hourly => "H",
            Frequency::Daily => "D",
            Frequency::Monthly => "M",
            Frequency::Quarterly => "Q",
            Frequency::Annual => "A",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "H" => Ok(Frequency::Hourly),
            "D" => Ok(Frequency::Daily),
            "M" => Ok(Frequency::Monthly),
            "Q" => Ok(Frequency::Quarterly),
            "A" => Ok(Frequency::Annual),
            other => Err(format!("unknown frequency '{}' (expected one of H, D, M, Q, A)", other)),
        }
    }
}

/// Celery task state as reported by `/projects/tasks/{id}/`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskState {
    Pending,
    Started,
    Retry,
    Success,
    Failure,
    Revoked,
    Other(String),
}

impl TaskState {
    pub fn as_str(&self) -> &str {
        match self {
            TaskState::Pending => "PENDING",
            TaskState::Started => "STARTED",
            TaskState::Retry => "RETRY",
            TaskState::Success => "SUCCESS",
            TaskState::Failure => "FAILURE",
            TaskState::Revoked => "REVOKED",
            TaskState::Other(s) => s,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskState::Success)
    }

    /// States the worker never recovers from
    pub fn is_terminal_failure(&self) -> bool {
        matches!(self, TaskState::Failure | TaskState::Revoked)
    }
}

impl From<String> for TaskState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "PENDING" => TaskState::Pending,
            "STARTED" => TaskState::Started,
            "RETRY" => TaskState::Retry,
            "SUCCESS" => TaskState::Success,
            "FAILURE" => TaskState::Failure,
            "REVOKED" => TaskState::Revoked,
            _ => TaskState::Other(s),
        }
    }
}

impl From<TaskState> for String {
    fn from(state: TaskState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response from the task status endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    pub state: TaskState,
}

/// Selects the statements of one environment/project-group/frequency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementQuery {
    pub environment: ObjectId,
    pub project_ids: Vec<ObjectId>,
    pub frequency: Frequency,
}

impl StatementQuery {
    pub fn new(environment: ObjectId, project_ids: Vec<ObjectId>, frequency: Frequency) -> Self {
        Self {
            environment,
            project_ids,
            frequency,
        }
    }

    /// Django-style query string with repeated `project_ids` keys
    pub fn to_query_string(&self) -> String {
        let mut params = simulation_params(self.environment, &self.project_ids);
        params.push(format!("frequency={}", self.frequency));
        params.join("&")
    }
}

pub(crate) fn simulation_params(environment: ObjectId, project_ids: &[ObjectId]) -> Vec<String> {
    let mut params = vec![format!("environment={}", environment)];
    for id in project_ids {
        params.push(format!("project_ids={}", id));
    }
    params
}

/// Request body for `POST /projects/statement/`
pub type StatementRequest = StatementQuery;

/// Task ids per simulation and frequency, as accepted by the backend
pub type StatementTasks = BTreeMap<ObjectId, BTreeMap<Frequency, TaskId>>;

/// A persisted (environment, project) simulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationRecord {
    pub id: ObjectId,
    pub environment: ObjectId,
    pub project: ObjectId,
}

/// Request body for the bulk statement delete
#[derive(Debug, Clone, Serialize)]
pub struct DeleteStatementsRequest {
    pub simulations: Vec<ObjectId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_urls() {
        let base = "http://localhost:8000/";
        let res = ResourceRef::BLOCK_SCHEDULE;
        assert_eq!(
            res.collection_url(base),
            "http://localhost:8000/environment/block-schedule/"
        );
        assert_eq!(
            res.detail_url(base, &Pk::Int(4)),
            "http://localhost:8000/environment/block-schedule/4/"
        );
        assert_eq!(
            res.bulk_update_url(base),
            "http://localhost:8000/environment/block-schedule/bulk-update/"
        );
        assert_eq!(
            ResourceRef::PROJECT.action_url(base, &Pk::Int(2), "scale"),
            "http://localhost:8000/projects/project/2/scale/"
        );
    }

    #[test]
    fn test_pk_untagged() {
        let int: Pk = serde_json::from_str("12").unwrap();
        let text: Pk = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(int, Pk::Int(12));
        assert_eq!(text, Pk::Str("abc".into()));
        assert_eq!(text.to_string(), "abc");
    }

    #[test]
    fn test_frequency_codes() {
        assert_eq!(serde_json::to_string(&Frequency::Quarterly).unwrap(), "\"Q\"");
        assert_eq!("m".parse::<Frequency>().unwrap(), Frequency::Monthly);
        assert!("10T".parse::<Frequency>().is_err());
        assert!(Frequency::Hourly < Frequency::Annual);
    }

    #[test]
    fn test_task_state_parsing() {
        let resp: TaskStatusResponse = serde_json::from_str(r#"{"state": "SUCCESS"}"#).unwrap();
        assert!(resp.state.is_success());

        let resp: TaskStatusResponse = serde_json::from_str(r#"{"state": "PROGRESS"}"#).unwrap();
        assert_eq!(resp.state, TaskState::Other("PROGRESS".into()));
        assert!(!resp.state.is_terminal_failure());
        assert!(TaskState::Revoked.is_terminal_failure());
    }

    #[test]
    fn test_statement_query_string() {
        let query = StatementQuery::new(3, vec![10, 11], Frequency::Annual);
        assert_eq!(
            query.to_query_string(),
            "environment=3&project_ids=10&project_ids=11&frequency=A"
        );
    }

    #[test]
    fn test_created_into_vec() {
        assert_eq!(Created::One(1).into_vec(), vec![1]);
        let many = Created::Many(vec![1, 2]).map(|x| x * 10);
        assert_eq!(many.len(), 2);
        assert_eq!(many.into_vec(), vec![10, 20]);
    }
}
