// HTTP adapter for the notification backend
//
// Implements the remote registry and unread-count collaborators on top of
// reqwest. Every endpoint answers with the `{code, message, data}` envelope.

use crate::collaborators::{DeviceRegistration, NotificationRegistry, TokenRefresh, UnreadCountSource};
use crate::config::ApiConfig;
use crate::error::{PushError, PushResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Response envelope shared by every backend endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    fn into_data(self) -> PushResult<T> {
        self.data.ok_or_else(|| {
            PushError::InvalidResponse(format!(
                "missing data (code {}: {})",
                self.code, self.message
            ))
        })
    }
}

/// Refresh request body: the new registration plus the token it replaces
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody<'a> {
    #[serde(flatten)]
    refresh: &'a TokenRefresh,
    old_token: &'a str,
}

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    paths: ApiConfig,
    bearer_token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, paths: ApiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            paths,
            bearer_token: None,
        }
    }

    /// Authenticate requests as the signed-in user
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> PushResult<ApiResponse<T>> {
        let response = self
            .authorize(request)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PushError::Network(format!(
                "{} failed ({}): {}",
                what, status, text
            )));
        }

        response
            .json::<ApiResponse<T>>()
            .await
            .map_err(|e| PushError::InvalidResponse(format!("{}: {}", what, e)))
    }
}

#[async_trait]
impl NotificationRegistry for HttpBackend {
    async fn register(&self, registration: &DeviceRegistration) -> PushResult<()> {
        let request = self
            .client
            .post(self.url(&self.paths.register_path))
            .json(registration);
        let response: ApiResponse<serde_json::Value> = self.send(request, "register device").await?;
        log::debug!("Register device answered {}: {}", response.code, response.message);
        Ok(())
    }

    async fn refresh(&self, refresh: &TokenRefresh, old_token: &str) -> PushResult<()> {
        let body = RefreshBody { refresh, old_token };
        let request = self
            .client
            .post(self.url(&self.paths.refresh_path))
            .json(&body);
        let response: ApiResponse<serde_json::Value> = self.send(request, "refresh token").await?;
        log::debug!("Refresh token answered {}: {}", response.code, response.message);
        Ok(())
    }
}

#[async_trait]
impl UnreadCountSource for HttpBackend {
    async fn fetch(&self) -> PushResult<u32> {
        let request = self.client.get(self.url(&self.paths.unread_path));
        self.send::<u32>(request, "count unread").await?.into_data()
    }
}
