use reqwest::multipart::Form;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ApiConnectionError {
    #[error("API key not found in environment: {0}")]
    MissingApiKey(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("API error {status}: {error_body}")]
    ApiError {
        status: reqwest::StatusCode,
        error_body: String,
    },
    /// The backend answered 200 but carried an `error` field instead of data.
    #[error("Backend error: {0}")]
    BackendError(String),
}

/// A configured HTTP client bound to one base URL.
#[derive(Debug, Clone)]
pub struct Connection {
    client: Client,
    base_url: String,
}

impl Connection {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Value, ApiConnectionError> {
        let url = self.url(path);
        debug!(%url, "POST json");
        let response = self.client.post(&url).json(body).send().await?;
        read_json(response).await
    }

    pub async fn post_multipart(&self, path: &str, form: Form) -> Result<Value, ApiConnectionError> {
        let url = self.url(path);
        debug!(%url, "POST multipart");
        let response = self.client.post(&url).multipart(form).send().await?;
        read_json(response).await
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiConnectionError> {
        let url = self.url(path);
        debug!(%url, "GET");
        let response = self.client.get(&url).query(query).send().await?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiConnectionError> {
    let status = response.status();
    if !status.is_success() {
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error body".to_string());
        return Err(ApiConnectionError::ApiError { status, error_body });
    }
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

/// Turns a 200 response carrying `{"error": "..."}` into a failure.
pub fn reject_in_band_error(value: Value) -> Result<Value, ApiConnectionError> {
    match value.get("error") {
        Some(Value::String(message)) => Err(ApiConnectionError::BackendError(message.clone())),
        Some(other) => Err(ApiConnectionError::BackendError(other.to_string())),
        None => Ok(value),
    }
}
