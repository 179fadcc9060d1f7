//! Live provider client.
//!
//! Posts each request as JSON to a provider gateway:
//!
//! ```text
//! POST {endpoint}/v1/actions/{Operation}
//! {"DocumentName": "...", "InstanceIds": [...], ...}
//! ```
//!
//! A 2xx response carries the operation's output document. Anything else
//! carries `{"Code": "...", "Message": "..."}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, instrument};

use crate::client::CloudProvider;
use crate::error::{ProviderError, ProviderResult};
use crate::request::{ProviderRequest, ProviderResponse};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorBody {
    code: String,
    #[serde(default)]
    message: String,
}

/// Provider client speaking JSON over HTTP.
pub struct HttpProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpProvider {
    /// Create a client for the given gateway endpoint.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> ProviderResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    /// The gateway endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CloudProvider for HttpProvider {
    #[instrument(skip(self, request), fields(operation = %request.operation()))]
    async fn call(&self, request: ProviderRequest) -> ProviderResult<ProviderResponse> {
        let operation = request.operation();
        let url = format!("{}/v1/actions/{}", self.endpoint, operation);
        debug!(url = %url, "Calling provider");

        let response = self
            .client
            .post(&url)
            .json(&request.params())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (code, message) = match serde_json::from_str::<ErrorBody>(&body) {
                Ok(err) => (err.code, err.message),
                Err(_) => (status.as_u16().to_string(), body),
            };
            error!(status = %status, code = %code, message = %message, "Provider call failed");
            return Err(ProviderError::service(operation, code, message));
        }

        let bytes = response.bytes().await?;
        let body = if bytes.is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            serde_json::from_slice(&bytes)
                .map_err(|source| ProviderError::Decode { operation, source })?
        };

        ProviderResponse::from_json(operation, body)
    }
}
