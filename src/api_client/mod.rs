use std::{sync::Arc, time::Duration};

use anyhow::Context;
use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, CONNECTION};
use serde::Deserialize;

use crate::{
    auth::{CredentialSource, Credentials},
    domain::models::{DocumentId, ReadingProgress, ServerPosition},
    tracker::{
        persister::{Channel, ProgressSink},
        resume::PositionSource,
    },
};

const XSRF_HEADER: &str = "X-XSRF-TOKEN";
const DEFAULT_KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_LOGGED_BODY_CHARS: usize = 2000;

/// Leading `max_chars` characters of a response body, cut on a char boundary.
fn body_snippet(body: &str, max_chars: usize) -> &str {
    body.char_indices()
        .nth(max_chars)
        .map_or(body, |(i, _)| &body[..i])
}

#[derive(Clone)]
pub struct StudyDocsClient {
    base_url: String,
    credentials: Arc<dyn CredentialSource>,
    keepalive_timeout: Duration,
    client: reqwest::Client,
}

impl StudyDocsClient {
    /// Create a new client with the given API origin (e.g. "http://localhost:8080/api").
    pub fn new(
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialSource>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        let base_url_str = base_url.into();
        tracing::debug!(base_url = %base_url_str, "creating StudyDocsClient");
        Ok(StudyDocsClient {
            base_url: base_url_str.trim_end_matches('/').to_string(),
            credentials,
            keepalive_timeout: DEFAULT_KEEPALIVE_TIMEOUT,
            client,
        })
    }

    /// Timeout applied to unload-channel deliveries.
    pub fn with_keepalive_timeout(mut self, timeout: Duration) -> Self {
        self.keepalive_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn authorize(
        req: reqwest::RequestBuilder,
        credentials: Option<&Credentials>,
    ) -> reqwest::RequestBuilder {
        let Some(creds) = credentials else {
            return req;
        };
        let req = req.header(AUTHORIZATION, creds.authorization());
        match &creds.xsrf_token {
            Some(token) => req.header(XSRF_HEADER, token),
            None => req,
        }
    }

    /// POST /documents/:id/open
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn open_document(&self, document_id: DocumentId) -> anyhow::Result<OpenDocumentResponse> {
        let url = self.url(&format!("/documents/{}/open", document_id));
        tracing::debug!(%url, "POST open document");
        let req = Self::authorize(self.client.post(&url), self.credentials.current().as_ref());
        let resp = req.send().await?;
        let status = resp.error_for_status()?;
        let body = status.text().await?;
        let parsed: OpenDocumentResponse = serde_json::from_str(&body)
            .with_context(|| format!("unexpected open response for document {}", document_id))?;
        Ok(parsed)
    }

    /// GET /documents/:id
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_document(&self, document_id: DocumentId) -> anyhow::Result<DocumentResponse> {
        let url = self.url(&format!("/documents/{}", document_id));
        tracing::debug!(%url, "GET document");
        let req = Self::authorize(self.client.get(&url), self.credentials.current().as_ref());
        let resp = req.send().await?;
        let status = resp.error_for_status()?;
        let body = status.text().await?;
        let parsed: DocumentResponse = serde_json::from_str(&body)?;
        Ok(parsed)
    }

    /// GET /users/:user_id/reading/continue
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_continue_reading(&self, user_id: i64) -> anyhow::Result<Vec<ContinueItem>> {
        let url = self.url(&format!("/users/{}/reading/continue", user_id));
        tracing::debug!(%url, "GET continue reading");
        let req = Self::authorize(self.client.get(&url), self.credentials.current().as_ref());
        let resp = req.send().await?;
        let status = resp.error_for_status()?;
        let body = status.text().await?;
        match serde_json::from_str::<PageResponse<ContinueItem>>(&body) {
            Ok(parsed) => Ok(parsed.content),
            Err(e) => {
                let snippet = body_snippet(&body, MAX_LOGGED_BODY_CHARS);
                tracing::error!(error = %e, body_snippet = %snippet, "failed to parse continue reading page");
                Err(e.into())
            }
        }
    }

    /// Build the thumbnail URL for a document page. This does not perform a request.
    pub fn thumbnail_url(&self, document_id: DocumentId, page: u32, width: u32) -> String {
        self.url(&format!(
            "/documents/{}/thumbnail?page={}&width={}",
            document_id, page, width
        ))
    }

    /// POST /recent-views/upsert
    #[tracing::instrument(level = "debug", skip(self, credentials))]
    pub async fn upsert_progress(
        &self,
        credentials: &Credentials,
        progress: &ReadingProgress,
        channel: Channel,
    ) -> anyhow::Result<()> {
        let url = self.url("/recent-views/upsert");
        let req = Self::authorize(self.client.post(&url), Some(credentials)).json(progress);
        let req = match channel {
            Channel::Normal => req,
            Channel::Unload => req
                .header(CONNECTION, "keep-alive")
                .timeout(self.keepalive_timeout),
        };
        req.send().await?.error_for_status()?;
        tracing::debug!(
            document_id = progress.document_id,
            last_page = progress.last_page,
            ?channel,
            "progress upserted"
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProgressSink for StudyDocsClient {
    async fn upsert(
        &self,
        credentials: &Credentials,
        progress: &ReadingProgress,
        channel: Channel,
    ) -> anyhow::Result<()> {
        self.upsert_progress(credentials, progress, channel).await
    }
}

#[async_trait::async_trait]
impl PositionSource for StudyDocsClient {
    async fn last_position(&self, document_id: DocumentId) -> anyhow::Result<ServerPosition> {
        let doc = self.open_document(document_id).await?;
        Ok(doc.server_position())
    }
}

/// Response of the "open" call; carries the reader's last recorded position.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenDocumentResponse {
    pub document_id: DocumentId,
    pub title: String,
    pub file_path: Option<String>,
    pub upload_time: Option<String>,
    pub user_id: Option<i64>,
    pub user_name: Option<String>,
    pub subject_id: Option<i64>,
    pub subject_name: Option<String>,
    pub last_page: Option<i64>,
    pub percent: Option<i64>,
    pub last_viewed_at: Option<DateTime<Utc>>,
    pub total_pages: Option<i64>,
    pub viewer_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub document_id: DocumentId,
    pub title: String,
    pub file_path: String,
    pub upload_time: Option<String>,
    pub user_id: Option<i64>,
    pub user_name: Option<String>,
    pub subject_id: Option<i64>,
    pub subject_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContinueItem {
    pub document_id: DocumentId,
    pub title: String,
    pub file_path: Option<String>,
    pub last_page: Option<i64>,
    pub percent: Option<i64>,
    pub last_read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub content: Vec<T>,
    pub total_elements: Option<i64>,
    pub total_pages: Option<i64>,
    pub number: Option<i64>,
    pub size: Option<i64>,
}
