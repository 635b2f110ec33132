//! HTTP backend over the Drillbit REST client.

use async_trait::async_trait;
use drillbit_client::{
    ClientConfig, ClientError, CreateShape, Created, DrillbitClient, ObjectId, Pk, ResourceRef,
    SimulationRecord, StatementQuery, StatementRequest, StatementTasks, TaskState,
};
use serde_json::Value;
use tracing::debug;

use super::traits::*;

/// Backend that talks to a live Django server.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: DrillbitClient,
}

impl HttpBackend {
    /// Wrap an existing client.
    pub fn new(client: DrillbitClient) -> Self {
        Self { client }
    }

    /// Build a client from configuration.
    pub fn from_config(config: ClientConfig) -> Result<Self, BackendError> {
        DrillbitClient::new(config)
            .map(Self::new)
            .map_err(BackendError::from)
    }

    /// Backend pointing at a local development server.
    pub fn local() -> Result<Self, BackendError> {
        Self::from_config(ClientConfig::default())
    }

    pub fn client(&self) -> &DrillbitClient {
        &self.client
    }
}

impl From<ClientError> for BackendError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Http(e) if e.is_connect() || e.is_timeout() => {
                BackendError::Unavailable(e.to_string())
            }
            ClientError::Http(e) => BackendError::RequestFailed(e.to_string()),
            ClientError::Server { status, message } => {
                BackendError::RequestFailed(format!("HTTP {}: {}", status, message))
            }
            ClientError::NotFound(what) => BackendError::NotFound(what),
            ClientError::Json(e) => BackendError::ParseError(e.to_string()),
            e @ (ClientError::InvalidResponse(_) | ClientError::UnexpectedShape { .. }) => {
                BackendError::ParseError(e.to_string())
            }
        }
    }
}

#[async_trait]
impl ObjectBackend for HttpBackend {
    async fn list_objects(&self, resource: &ResourceRef) -> Result<Vec<Value>, BackendError> {
        Ok(self.client.list(resource).await?)
    }

    async fn get_object(&self, resource: &ResourceRef, pk: &Pk) -> Result<Value, BackendError> {
        Ok(self.client.get(resource, pk).await?)
    }

    async fn create_object(
        &self,
        resource: &ResourceRef,
        body: Value,
        shape: CreateShape,
    ) -> Result<Created<Value>, BackendError> {
        Ok(self.client.create(resource, &body, shape).await?)
    }

    async fn update_object(
        &self,
        resource: &ResourceRef,
        pk: &Pk,
        body: Value,
    ) -> Result<Value, BackendError> {
        Ok(self.client.update(resource, pk, &body).await?)
    }

    async fn delete_object(&self, resource: &ResourceRef, pk: &Pk) -> Result<bool, BackendError> {
        Ok(self.client.delete(resource, pk).await?)
    }

    async fn bulk_update(
        &self,
        resource: &ResourceRef,
        items: Vec<Value>,
    ) -> Result<Vec<Value>, BackendError> {
        Ok(self.client.bulk_update(resource, &items).await?)
    }

    async fn object_action(
        &self,
        resource: &ResourceRef,
        pk: &Pk,
        action: &str,
        method: ActionMethod,
    ) -> Result<Value, BackendError> {
        debug!(%resource, %pk, action, ?method, "Invoking detail action");
        let value = match method {
            ActionMethod::Get => self.client.get_action(resource, pk, action).await?,
            ActionMethod::Put => self.client.put_action(resource, pk, action).await?,
        };
        Ok(value)
    }
}

#[async_trait]
impl StatementBackend for HttpBackend {
    async fn simulations(
        &self,
        environment: ObjectId,
        project_ids: &[ObjectId],
    ) -> Result<Vec<SimulationRecord>, BackendError> {
        Ok(self.client.list_simulations(environment, project_ids).await?)
    }

    async fn statement_exists(&self, query: &StatementQuery) -> Result<bool, BackendError> {
        Ok(self.client.statement_exists(query).await?)
    }

    async fn create_statements(
        &self,
        request: &StatementRequest,
    ) -> Result<StatementTasks, BackendError> {
        Ok(self.client.create_statements(request).await?)
    }

    async fn delete_all_statements(&self, simulations: &[ObjectId]) -> Result<(), BackendError> {
        Ok(self.client.delete_all_statements(simulations).await?)
    }

    async fn task_state(&self, task_id: &str) -> Result<TaskState, BackendError> {
        Ok(self.client.task_state(task_id).await?)
    }

    async fn summary(&self, query: &StatementQuery) -> Result<Value, BackendError> {
        Ok(self.client.summary(query).await?)
    }

    async fn projects_by_account(&self, query: &StatementQuery) -> Result<Value, BackendError> {
        Ok(self.client.projects_by_account(query).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_backend() {
        let backend = HttpBackend::local().unwrap();
        assert_eq!(backend.client().base_url(), "http://localhost:8000");
    }

    #[test]
    fn test_client_error_mapping() {
        let err: BackendError = ClientError::Server {
            status: 400,
            message: "bad frequency".into(),
        }
        .into();
        assert_eq!(err, BackendError::RequestFailed("HTTP 400: bad frequency".into()));

        let err: BackendError = ClientError::NotFound("/projects/tasks/x/".into()).into();
        assert!(matches!(err, BackendError::NotFound(_)));

        let err: BackendError = ClientError::UnexpectedShape { expected: "array" }.into();
        assert!(matches!(err, BackendError::ParseError(_)));
    }
}
