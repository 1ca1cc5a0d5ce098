use chrono::{DateTime, Utc};
use poem_openapi::{ApiResponse, Enum, Object, payload::Json};
use uuid::Uuid;

use crate::tracker::{
    observer::{PageRect, Viewport},
    resume::ResumeTarget,
    session::Step,
};

#[derive(Debug, Clone, Object)]
pub struct ErrorDto {
    /// Human-readable error message
    pub message: String,
}

// ===== Credentials =====

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct CredentialsRequest {
    pub access_token: String,
    pub xsrf_token: Option<String>,
}

#[derive(ApiResponse)]
pub enum AuthResponse {
    /// Credential store updated
    #[oai(status = 204)]
    NoContent,

    #[oai(status = 400)]
    BadRequest(Json<ErrorDto>),
}

// ===== Viewing sessions =====

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct OpenSessionRequest {
    pub document_id: i64,
    /// Raw `page` query parameter of the viewer URL
    pub url_page: Option<String>,
    /// Page carried by the caller, e.g. a "continue reading" card
    pub hinted_page: Option<i64>,
    /// Percent carried by the caller
    pub hinted_percent: Option<i64>,
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct SessionDto {
    pub session_id: Uuid,
    pub document_id: i64,
    pub current_page: u32,
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct LayoutRequest {
    pub total_pages: u32,
    /// Estimated height of one page canvas in pixels
    pub canvas_height: f64,
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct ResumeTargetDto {
    pub page: u32,
    pub scroll_top: f64,
}

impl From<ResumeTarget> for ResumeTargetDto {
    fn from(t: ResumeTarget) -> Self {
        ResumeTargetDto {
            page: t.page,
            scroll_top: t.scroll_top,
        }
    }
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct LayoutResultDto {
    /// Present only the first time the layout is usable and a hint applies
    pub resume: Option<ResumeTargetDto>,
}

#[derive(Debug, Clone, Copy, Object)]
pub struct ViewportDto {
    pub top: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, Object)]
pub struct PageRectDto {
    pub page: u32,
    pub top: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Object)]
pub struct ScrollRequest {
    pub viewport: ViewportDto,
    pub pages: Vec<PageRectDto>,
}

impl ScrollRequest {
    pub fn into_geometry(self) -> (Viewport, Vec<PageRect>) {
        let viewport = Viewport {
            top: self.viewport.top,
            height: self.viewport.height,
        };
        let pages = self
            .pages
            .into_iter()
            .map(|p| PageRect {
                page: p.page,
                top: p.top,
                height: p.height,
            })
            .collect();
        (viewport, pages)
    }
}

#[derive(Debug, Clone, Copy, Enum)]
#[oai(rename_all = "lowercase")]
pub enum StepDirection {
    Prev,
    Next,
}

impl From<StepDirection> for Step {
    fn from(d: StepDirection) -> Self {
        match d {
            StepDirection::Prev => Step::Prev,
            StepDirection::Next => Step::Next,
        }
    }
}

#[derive(Debug, Clone, Object)]
pub struct StepRequest {
    pub direction: StepDirection,
}

#[derive(Debug, Clone, Object)]
pub struct PageDto {
    pub page: u32,
}

#[derive(ApiResponse)]
pub enum SessionResponse {
    /// Session opened
    #[oai(status = 201)]
    Created(Json<SessionDto>),

    #[oai(status = 400)]
    BadRequest(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum LayoutResponse {
    #[oai(status = 200)]
    Ok(Json<LayoutResultDto>),

    /// Unknown or closed session
    #[oai(status = 404)]
    NotFound(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum StepResponse {
    /// Target page after the step
    #[oai(status = 200)]
    Ok(Json<PageDto>),

    #[oai(status = 404)]
    NotFound(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum SessionEventResponse {
    /// Event accepted
    #[oai(status = 204)]
    NoContent,

    #[oai(status = 404)]
    NotFound(Json<ErrorDto>),
}

// ===== Documents =====

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct DocumentDto {
    pub document_id: i64,
    pub title: String,
    pub subject_name: Option<String>,
    pub uploader_id: Option<i64>,
    pub uploader_name: Option<String>,
    pub thumbnail_url: String,
}

#[derive(ApiResponse)]
pub enum DocumentResponseDto {
    #[oai(status = 200)]
    Ok(Json<DocumentDto>),

    /// Document could not be loaded from StudyDocs
    #[oai(status = 502)]
    BadGateway(Json<ErrorDto>),
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct ContinueReadingDto {
    pub document_id: i64,
    pub title: String,
    pub last_page: Option<i64>,
    pub percent: Option<i64>,
    pub last_read_at: Option<DateTime<Utc>>,
    /// Viewer route, with `?page=` when a last page is known
    pub viewer_path: String,
    pub thumbnail_url: String,
    /// Hints to pass back in `POST /sessions` when the card is opened
    pub hinted_page: Option<i64>,
    pub hinted_percent: Option<i64>,
}

#[derive(ApiResponse)]
pub enum ContinueReadingResponse {
    #[oai(status = 200)]
    Ok(Json<Vec<ContinueReadingDto>>),

    /// Upstream StudyDocs error
    #[oai(status = 502)]
    BadGateway(Json<ErrorDto>),
}
