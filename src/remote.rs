//! HTTP implementations of the remote collaborators.

use crate::error::{RemoteError, TransportError};
use crate::options::ApiConfig;
use crate::retry::{RetryConfig, retry_async_with_config};
use crate::stream::{ByteStream, QuizSource};
use crate::sync::{RemoteStore, SyncDomain};
use async_trait::async_trait;
use futures::stream::StreamExt;
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReassignBody<'a> {
    from_user_id: &'a str,
    to_user_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MigrateBody<'a> {
    old_id: &'a str,
    new_id: &'a str,
}

/// Talks to the quiz backend over HTTP. Success means a 2xx status.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    config: ApiConfig,
    retry: RetryConfig,
}

impl HttpBackend {
    pub fn new(config: ApiConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder().connect_timeout(config.request_timeout).build()?;
        let retry = RetryConfig::from_api(&config);
        Ok(Self { client, config, retry })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    async fn post<B: Serialize + Sync>(&self, url: &str, body: &B) -> Result<(), RemoteError> {
        let client = &self.client;
        let timeout = self.config.request_timeout;
        retry_async_with_config(&self.retry, RemoteError::is_retryable, move || async move {
            let response = client.post(url).json(body).timeout(timeout).send().await?;
            let status = response.status();
            if status.is_success() {
                Ok(())
            } else {
                tracing::debug!(url, status = status.as_u16(), "request rejected");
                Err(RemoteError::from_status(status.as_u16()))
            }
        })
        .await
    }
}

#[async_trait]
impl RemoteStore for HttpBackend {
    async fn reassign(
        &self,
        domain: SyncDomain,
        from_id: &str,
        to_id: &str,
    ) -> Result<(), RemoteError> {
        let url = self.config.quiz_url(domain.endpoint());
        let body = ReassignBody { from_user_id: from_id, to_user_id: to_id };
        self.post(&url, &body).await
    }

    async fn migrate_user(&self, old_id: &str, new_id: &str) -> Result<(), RemoteError> {
        let url = self.config.migrate_url();
        self.post(&url, &MigrateBody { old_id, new_id }).await
    }
}

#[async_trait]
impl QuizSource for HttpBackend {
    async fn open(&self, lesson_id: &str) -> Result<ByteStream, RemoteError> {
        let url = self.config.stream_url(lesson_id);
        let (client, url) = (&self.client, url.as_str());
        let fetch = move || async move {
            let response = client.get(url).send().await?;
            let status = response.status();
            if status.is_success() {
                Ok(response)
            } else {
                Err(RemoteError::from_status(status.as_u16()))
            }
        };
        let response =
            retry_async_with_config(&self.retry, RemoteError::is_retryable, fetch).await?;
        Ok(response
            .bytes_stream()
            .map(|r| r.map_err(|e| TransportError(e.to_string())))
            .boxed())
    }
}
