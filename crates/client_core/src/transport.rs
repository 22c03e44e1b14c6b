//! Uniform transport-result mapping.
//!
//! Every remote call in the client funnels through [`Transport::execute`],
//! which converts raw HTTP outcomes (status codes, connect failures,
//! timeouts) into [`RemoteState`]. No transport error escapes as a panic or
//! raw `Err`, and no retries happen here; retrying is always an explicit
//! new request by the caller.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::error::ApiError;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};
use url::Url;

use crate::{
    error::{ErrorKind, FetchError},
    types::RemoteState,
};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Read-only stream of the current bearer token. Owned by the
/// authentication layer; this core only observes it.
pub type AuthTokenStream = watch::Receiver<Option<String>>;

#[derive(Debug, Error)]
pub enum TransportInitError {
    #[error("invalid server base url {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("failed to build http client: {0}")]
    ClientBuild(#[from] reqwest::Error),
}

pub struct Transport {
    http: Client,
    base_url: Url,
    auth: AuthTokenStream,
}

impl Transport {
    pub fn connect(server_url: &str, auth: AuthTokenStream) -> Result<Self, TransportInitError> {
        Self::with_timeout(server_url, auth, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        server_url: &str,
        auth: AuthTokenStream,
        timeout: Duration,
    ) -> Result<Self, TransportInitError> {
        let base_url =
            Url::parse(server_url).map_err(|err| TransportInitError::InvalidBaseUrl {
                url: server_url.to_string(),
                reason: err.to_string(),
            })?;
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(DEFAULT_CONNECT_TIMEOUT))
            .build()?;
        Ok(Self {
            http,
            base_url,
            auth,
        })
    }

    /// Builds an authorized GET for a path under the server base URL.
    pub fn get(&self, path: &str) -> RequestBuilder {
        self.authorize(self.http.get(self.endpoint(path)))
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}{path}",
            self.base_url.as_str().trim_end_matches('/')
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.auth.borrow().as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Issues the request and maps the raw outcome through the fixed
    /// status table.
    pub async fn execute(&self, request: RequestBuilder) -> RemoteState<Response> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => return RemoteState::Failed(classify_transport_error(&err)),
        };

        let status = response.status();
        if status.is_success() {
            return RemoteState::Ready(response);
        }

        let kind = ErrorKind::from_status(status.as_u16());
        let detail = match response.text().await {
            Ok(body) => detail_from_body(&body),
            Err(err) => {
                debug!("failed to read error body: {err}");
                None
            }
        };
        warn!(status = status.as_u16(), kind = ?kind, "request failed");
        RemoteState::Failed(FetchError { kind, detail })
    }

    /// `execute` plus JSON decoding; malformed payloads surface as
    /// `Unknown` and never abort the caller.
    pub async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> RemoteState<T> {
        match self.execute(request).await {
            RemoteState::Ready(response) => match response.json::<T>().await {
                Ok(payload) => RemoteState::Ready(payload),
                Err(err) => RemoteState::Failed(FetchError::new(
                    ErrorKind::Unknown,
                    format!("invalid response payload: {err}"),
                )),
            },
            RemoteState::Failed(error) => RemoteState::Failed(error),
            RemoteState::Loading => RemoteState::Loading,
        }
    }
}

fn classify_transport_error(err: &reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::bare(ErrorKind::Timeout)
    } else if err.is_connect() {
        FetchError::bare(ErrorKind::NoConnectivity)
    } else {
        FetchError::new(ErrorKind::Unknown, err.to_string())
    }
}

/// Best-effort detail extraction: structured `ApiError` bodies contribute
/// their message, anything else passes through verbatim.
fn detail_from_body(body: &str) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str::<ApiError>(body) {
        Ok(api_error) => Some(api_error.message),
        Err(_) => Some(body.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::error::ErrorCode;

    #[test]
    fn detail_prefers_structured_api_error_messages() {
        let body = serde_json::to_string(&ApiError::new(ErrorCode::Conflict, "already booked"))
            .expect("encode");
        assert_eq!(detail_from_body(&body), Some("already booked".to_string()));
    }

    #[test]
    fn detail_passes_plain_bodies_through_verbatim() {
        assert_eq!(
            detail_from_body("conflict-detail"),
            Some("conflict-detail".to_string())
        );
        assert_eq!(detail_from_body(""), None);
    }
}
