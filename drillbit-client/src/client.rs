//! HTTP client for the Drillbit REST API

use crate::error::{ClientError, Result};
use crate::types::*;
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// HTTP client for the Drillbit REST API
///
/// Every collection is addressed by a [`ResourceRef`]; the client only
/// assembles URLs and forwards JSON.
///
/// # Example
///
/// ```rust,no_run
/// use drillbit_client::{ClientConfig, CreateShape, DrillbitClient, ResourceRef};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = DrillbitClient::new(ClientConfig::default())?;
///
/// // List rigs
/// let rigs: Vec<serde_json::Value> = client.list(&ResourceRef::RIG).await?;
///
/// // Create a block schedule (single-object endpoint)
/// let created = client
///     .create::<serde_json::Value, _>(
///         &ResourceRef::BLOCK_SCHEDULE,
///         &serde_json::json!({"start_date": "2024-04-20", "last_epoch": 4}),
///         CreateShape::One,
///     )
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DrillbitClient {
    pub(crate) config: ClientConfig,
    pub(crate) client: Client,
}

impl DrillbitClient {
    /// Create a new client
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        if let Some(ref api_key) = config.api_key {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| ClientError::InvalidResponse(format!("invalid API key: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    /// Base URL this client talks to
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    // ==================== Object API ====================

    /// `GET /{app}/{model}/`
    pub async fn list<T: DeserializeOwned>(&self, resource: &ResourceRef) -> Result<Vec<T>> {
        let url = resource.collection_url(&self.config.base_url);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// `GET /{app}/{model}/{pk}/`
    pub async fn get<T: DeserializeOwned>(&self, resource: &ResourceRef, pk: &Pk) -> Result<T> {
        let url = resource.detail_url(&self.config.base_url, pk);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// `POST /{app}/{model}/`
    ///
    /// `shape` is the endpoint's documented return shape. A response of the
    /// other shape is rejected instead of being guessed at.
    pub async fn create<T, B>(
        &self,
        resource: &ResourceRef,
        body: &B,
        shape: CreateShape,
    ) -> Result<Created<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = resource.collection_url(&self.config.base_url);
        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await?;

        let value: Value = self.handle_response(response).await?;
        decode_created(value, shape)
    }

    /// `PUT /{app}/{model}/{pk}/`
    pub async fn update<T, B>(&self, resource: &ResourceRef, pk: &Pk, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = resource.detail_url(&self.config.base_url, pk);
        let response = self
            .client
            .put(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// `DELETE /{app}/{model}/{pk}/`
    ///
    /// Returns `false` if the record did not exist.
    pub async fn delete(&self, resource: &ResourceRef, pk: &Pk) -> Result<bool> {
        let url = resource.detail_url(&self.config.base_url, pk);
        let response = self.client.delete(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Server { status, message: body });
        }
        Ok(true)
    }

    /// `PUT /{app}/{model}/bulk-update/` with body `{"data": [...]}`
    pub async fn bulk_update<T, B>(&self, resource: &ResourceRef, items: &[B]) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let url = resource.bulk_update_url(&self.config.base_url);
        let body = serde_json::json!({ "data": items });

        let response = self
            .client
            .put(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// `GET /{app}/{model}/{pk}/{action}/`
    pub async fn get_action<T: DeserializeOwned>(
        &self,
        resource: &ResourceRef,
        pk: &Pk,
        action: &str,
    ) -> Result<T> {
        let url = resource.action_url(&self.config.base_url, pk, action);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// `PUT /{app}/{model}/{pk}/{action}/`
    pub async fn put_action<T: DeserializeOwned>(
        &self,
        resource: &ResourceRef,
        pk: &Pk,
        action: &str,
    ) -> Result<T> {
        let url = resource.action_url(&self.config.base_url, pk, action);
        let response = self.client.put(&url).send().await?;
        self.handle_response(response).await
    }

    // ==================== Helper Methods ====================

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    pub(crate) async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(response.url().path().to_string()));
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Server {
                status,
                message: body,
            });
        }

        let body = response.json().await?;
        Ok(body)
    }
}

/// Decode a create response according to the endpoint's contract
pub fn decode_created<T: DeserializeOwned>(value: Value, shape: CreateShape) -> Result<Created<T>> {
    match (shape, value) {
        (CreateShape::Many, Value::Array(items)) => {
            let items = items
                .into_iter()
                .map(serde_json::from_value)
                .collect::<std::result::Result<Vec<T>, _>>()?;
            Ok(Created::Many(items))
        }
        (CreateShape::Many, _) => Err(ClientError::UnexpectedShape { expected: "array" }),
        (CreateShape::One, Value::Array(_)) => Err(ClientError::UnexpectedShape { expected: "object" }),
        (CreateShape::One, value) => Ok(Created::One(serde_json::from_value(value)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_created_by_contract() {
        let one: Created<Value> = decode_created(json!({"id": 1}), CreateShape::One).unwrap();
        assert_eq!(one, Created::One(json!({"id": 1})));

        let many: Created<Value> =
            decode_created(json!([{"id": 1}, {"id": 2}]), CreateShape::Many).unwrap();
        assert_eq!(many.len(), 2);
    }

    #[test]
    fn test_decode_created_rejects_wrong_shape() {
        let err = decode_created::<Value>(json!([{"id": 1}]), CreateShape::One).unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedShape { expected: "object" }));

        let err = decode_created::<Value>(json!({"id": 1}), CreateShape::Many).unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedShape { expected: "array" }));
    }

    #[test]
    fn test_url_join() {
        let client = DrillbitClient::new(ClientConfig {
            base_url: "http://localhost:8000/".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            client.url("/projects/summary/"),
            "http://localhost:8000/projects/summary/"
        );
    }
}
