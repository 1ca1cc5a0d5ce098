use std::sync::Arc;

use poem_openapi::{
    OpenApi,
    param::Path,
    payload::{Json, PlainText},
};
use uuid::Uuid;

use super::models::{
    AuthResponse, ContinueReadingResponse, CredentialsRequest, DocumentResponseDto, LayoutRequest,
    LayoutResponse, OpenSessionRequest, ScrollRequest, SessionEventResponse, SessionResponse,
    StepRequest, StepResponse,
};
use super::services::{
    auth::AuthService,
    health::HealthService,
    reading::ReadingService,
    session::{SessionRegistry, SessionService},
};
use crate::{api_client::StudyDocsClient, auth::CookieCredentials};

pub struct ReaderBridgeApi {
    pub client: Arc<StudyDocsClient>,
    pub credentials: Arc<CookieCredentials>,
    pub sessions: Arc<SessionRegistry>,
}

#[OpenApi]
impl ReaderBridgeApi {
    #[oai(path = "/status", method = "get")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn status(&self) -> PlainText<String> {
        HealthService::new(&self.sessions, &self.credentials)
            .status_text()
            .await
    }

    // ===== Credentials =====

    /// Store the tokens handed out by a StudyDocs login
    #[oai(path = "/auth/cookies", method = "put")]
    #[tracing::instrument(level = "debug", skip(self, body))]
    async fn sign_in(&self, body: Json<CredentialsRequest>) -> AuthResponse {
        AuthService::new(&self.credentials).sign_in(body.0)
    }

    /// Forget the stored tokens; later sessions read as a guest
    #[oai(path = "/auth/cookies", method = "delete")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn sign_out(&self) -> AuthResponse {
        AuthService::new(&self.credentials).sign_out()
    }

    // ===== Viewing sessions =====

    /// Open a viewing session for a document
    #[oai(path = "/sessions", method = "post")]
    #[tracing::instrument(level = "debug", skip(self, body))]
    async fn open_session(&self, body: Json<OpenSessionRequest>) -> SessionResponse {
        SessionService::new(&self.sessions).open(body.0).await
    }

    /// Report the page count and canvas height once the document is laid out
    #[oai(path = "/sessions/:session_id/layout", method = "post")]
    #[tracing::instrument(level = "debug", skip(self, session_id, body))]
    async fn layout(&self, session_id: Path<Uuid>, body: Json<LayoutRequest>) -> LayoutResponse {
        SessionService::new(&self.sessions)
            .layout(session_id.0, body.0)
            .await
    }

    /// Report the viewport and page geometry after a scroll
    #[oai(path = "/sessions/:session_id/scroll", method = "post")]
    #[tracing::instrument(level = "debug", skip(self, session_id, body))]
    async fn scroll(
        &self,
        session_id: Path<Uuid>,
        body: Json<ScrollRequest>,
    ) -> SessionEventResponse {
        SessionService::new(&self.sessions)
            .scroll(session_id.0, body.0)
            .await
    }

    /// Previous or next page button
    #[oai(path = "/sessions/:session_id/step", method = "post")]
    #[tracing::instrument(level = "debug", skip(self, session_id, body))]
    async fn step(&self, session_id: Path<Uuid>, body: Json<StepRequest>) -> StepResponse {
        SessionService::new(&self.sessions)
            .step(session_id.0, body.0)
            .await
    }

    /// Persist the current page before navigating back
    #[oai(path = "/sessions/:session_id/back", method = "post")]
    #[tracing::instrument(level = "debug", skip(self, session_id))]
    async fn back(&self, session_id: Path<Uuid>) -> SessionEventResponse {
        SessionService::new(&self.sessions).back(session_id.0).await
    }

    /// Page hidden or viewer closed
    #[oai(path = "/sessions/:session_id/unload", method = "post")]
    #[tracing::instrument(level = "debug", skip(self, session_id))]
    async fn unload(&self, session_id: Path<Uuid>) -> SessionEventResponse {
        SessionService::new(&self.sessions)
            .unload(session_id.0)
            .await
    }

    // ===== Documents =====

    #[oai(path = "/documents/:document_id", method = "get")]
    #[tracing::instrument(level = "debug", skip(self, document_id))]
    async fn get_document(&self, document_id: Path<i64>) -> DocumentResponseDto {
        ReadingService::new(&self.client)
            .get_document(document_id.0)
            .await
    }

    /// Recently read documents with their last position
    #[oai(path = "/users/:user_id/continue-reading", method = "get")]
    #[tracing::instrument(level = "debug", skip(self, user_id))]
    async fn continue_reading(&self, user_id: Path<i64>) -> ContinueReadingResponse {
        ReadingService::new(&self.client)
            .continue_reading(user_id.0)
            .await
    }
}
