use crate::config::ApiSettings;
use crate::error::ApiError;
use crate::models::Envelope;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use service_core::observability::TracedRequestExt;

/// Thin HTTP client for the SewaHub REST API. Every response is unwrapped
/// from the `{ success, message, data }` envelope and classified into an
/// [`ApiError`].
pub struct ApiClient {
    client: Client,
    settings: ApiSettings,
}

impl ApiClient {
    pub fn new(settings: ApiSettings) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, settings })
    }

    /// Request builder for an API path, with trace context propagation.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.settings.base_url.trim_end_matches('/'), path);
        self.client.request(method, url).with_trace_context()
    }

    /// Sends the request and returns the envelope, failures already mapped.
    pub async fn send(&self, request: RequestBuilder) -> Result<Envelope<Value>, ApiError> {
        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, url = ?e.url().map(|u| u.as_str()), "API request failed");
            ApiError::from(e)
        })?;

        classify(response).await
    }

    /// Sends the request and deserializes the envelope's `data`.
    pub async fn send_data<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let envelope = self.send(request).await?;
        let data = envelope.data.ok_or_else(|| {
            ApiError::rejected(StatusCode::OK, "Response carried no data")
        })?;

        serde_json::from_value(data).map_err(|e| {
            tracing::warn!(error = %e, "API returned data of unexpected shape");
            ApiError::rejected(StatusCode::OK, format!("Malformed response data: {}", e))
        })
    }

    /// Sends the request and returns only the envelope's message.
    pub async fn send_message(
        &self,
        request: RequestBuilder,
        fallback: &str,
    ) -> Result<String, ApiError> {
        let envelope = self.send(request).await?;
        Ok(envelope.message.unwrap_or_else(|| fallback.to_string()))
    }
}

async fn classify(response: Response) -> Result<Envelope<Value>, ApiError> {
    let status = response.status();
    let url = response.url().path().to_string();

    if matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    ) {
        tracing::warn!(%status, %url, "API unavailable");
        return Err(ApiError::Network(format!("API returned {}", status)));
    }

    let bytes = response.bytes().await?;
    let envelope = serde_json::from_slice::<Envelope<Value>>(&bytes).ok();
    let message = envelope.as_ref().and_then(|e| e.message.clone());

    // 403 is a refusal of this request, not of the token.
    if status == StatusCode::UNAUTHORIZED {
        tracing::info!(%status, %url, "API rejected credentials");
        return Err(ApiError::Authentication(
            message.unwrap_or_else(|| "Session expired, please sign in again".to_string()),
        ));
    }

    match envelope {
        Some(envelope) if status.is_success() && envelope.success => Ok(envelope),
        Some(_) => {
            let message = message.unwrap_or_else(|| default_message(status));
            tracing::warn!(%status, %url, %message, "API reported failure");
            Err(ApiError::rejected(status, message))
        }
        None => {
            tracing::warn!(%status, %url, "API returned a non-envelope body");
            Err(ApiError::rejected(status, default_message(status)))
        }
    }
}

fn default_message(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()))
}
