//! Statement generation endpoints
//!
//! These sit outside the generic `/{app}/{model}/` verbs: existence checks,
//! the asynchronous create that hands back Celery task ids, the bulk delete
//! used by overwrite, and task polling.

use crate::client::DrillbitClient;
use crate::error::{ClientError, Result};
use crate::types::*;
use reqwest::header;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

impl DrillbitClient {
    /// `GET /projects/statement/exists/?environment=..&project_ids=..&frequency=..`
    pub async fn statement_exists(&self, query: &StatementQuery) -> Result<bool> {
        let url = format!(
            "{}?{}",
            self.url("projects/statement/exists/"),
            query.to_query_string()
        );

        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// `POST /projects/statement/`
    ///
    /// The backend answers with one `{simulation_id: {frequency: task_id}}`
    /// object per simulation.
    pub async fn create_statements(&self, request: &StatementRequest) -> Result<StatementTasks> {
        let url = self.url("projects/statement/");

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await?;

        let body: Value = self.handle_response(response).await?;
        parse_statement_tasks(body)
    }

    /// `DELETE /projects/simulation/delete_all_statements/`
    pub async fn delete_all_statements(&self, simulations: &[ObjectId]) -> Result<()> {
        let url = self.url("projects/simulation/delete_all_statements/");
        let body = DeleteStatementsRequest {
            simulations: simulations.to_vec(),
        };

        let response = self
            .client
            .delete(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Server { status, message: body });
        }
        Ok(())
    }

    /// `GET /projects/simulation/?environment=..&project_ids=..`
    pub async fn list_simulations(
        &self,
        environment: ObjectId,
        project_ids: &[ObjectId],
    ) -> Result<Vec<SimulationRecord>> {
        let url = format!(
            "{}?{}",
            self.url("projects/simulation/"),
            simulation_params(environment, project_ids).join("&")
        );

        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// `GET /projects/tasks/{task_id}/`
    pub async fn task_state(&self, task_id: &str) -> Result<TaskState> {
        let url = self.url(&format!("projects/tasks/{}/", task_id));

        let response = self.client.get(&url).send().await?;
        let status: TaskStatusResponse = self.handle_response(response).await?;
        Ok(status.state)
    }

    /// `GET /projects/summary/`
    pub async fn summary(&self, query: &StatementQuery) -> Result<Value> {
        let url = format!("{}?{}", self.url("projects/summary/"), query.to_query_string());

        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// `GET /projects/statement/projects_by_account/`
    pub async fn projects_by_account(&self, query: &StatementQuery) -> Result<Value> {
        let url = format!(
            "{}?{}",
            self.url("projects/statement/projects_by_account/"),
            query.to_query_string()
        );

        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }
}

/// Flatten the create response into task ids keyed by simulation then frequency
pub fn parse_statement_tasks(body: Value) -> Result<StatementTasks> {
    if !body.is_array() {
        return Err(ClientError::UnexpectedShape { expected: "array" });
    }
    let entries: Vec<HashMap<String, HashMap<String, TaskId>>> = serde_json::from_value(body)?;

    let mut tasks = StatementTasks::new();
    for entry in entries {
        for (sim_key, by_frequency) in entry {
            let sim_id: ObjectId = sim_key.parse().map_err(|_| {
                ClientError::InvalidResponse(format!("non-numeric simulation id '{}'", sim_key))
            })?;

            let row = tasks.entry(sim_id).or_insert_with(BTreeMap::new);
            for (code, task_id) in by_frequency {
                let frequency: Frequency = code.parse().map_err(ClientError::InvalidResponse)?;
                row.insert(frequency, task_id);
            }
        }
    }

    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_statement_tasks() {
        let body = json!([
            {"11": {"M": "t-11-m", "Q": "t-11-q"}},
            {"12": {"M": "t-12-m", "Q": "t-12-q"}},
        ]);

        let tasks = parse_statement_tasks(body).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[&11][&Frequency::Monthly], "t-11-m");
        assert_eq!(tasks[&12][&Frequency::Quarterly], "t-12-q");
    }

    #[test]
    fn test_parse_statement_tasks_rejects_bad_keys() {
        let err = parse_statement_tasks(json!([{"sim-a": {"M": "t"}}])).unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)));

        let err = parse_statement_tasks(json!([{"1": {"10T": "t"}}])).unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)));

        let err = parse_statement_tasks(json!("nope")).unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedShape { expected: "array" }));

        let err = parse_statement_tasks(json!({"11": {"M": "t-11-m"}})).unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedShape { expected: "array" }));
    }
}
