use std::{collections::HashMap, sync::Arc, time::Duration};

use poem_openapi::payload::Json;
use tokio::{
	sync::Mutex,
	time::{Instant, MissedTickBehavior},
};
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::{
	bridge::models::{
		ErrorDto, LayoutRequest, LayoutResponse, LayoutResultDto, OpenSessionRequest, PageDto, ScrollRequest,
		SessionDto, SessionEventResponse, SessionResponse, StepRequest, StepResponse,
	},
	domain::models::{ClientHints, DocumentId},
	tracker::session::{ReadingSession, SessionDeps},
};

struct Entry {
	session: Arc<ReadingSession>,
	last_seen: Instant,
}

/// Open viewing sessions, keyed by session id.
///
/// Sessions the viewer stops reporting on are unloaded by [`SessionRegistry::run_idle_sweep`].
pub struct SessionRegistry {
	deps: SessionDeps,
	sessions: Mutex<HashMap<Uuid, Entry>>,
}

impl SessionRegistry {
	pub fn new(deps: SessionDeps) -> Self {
		Self { deps, sessions: Mutex::new(HashMap::new()) }
	}

	/// Tracker holding the unload deliveries of every session.
	pub fn keepalive(&self) -> &TaskTracker {
		&self.deps.keepalive
	}

	pub async fn open(&self, document_id: DocumentId, hints: ClientHints) -> Arc<ReadingSession> {
		let session = Arc::new(ReadingSession::open(document_id, hints, &self.deps));
		let entry = Entry { session: Arc::clone(&session), last_seen: Instant::now() };
		self.sessions.lock().await.insert(session.id(), entry);
		session
	}

	/// Look up a session and mark it as active.
	pub async fn get(&self, id: Uuid) -> Option<Arc<ReadingSession>> {
		let mut sessions = self.sessions.lock().await;
		let entry = sessions.get_mut(&id)?;
		entry.last_seen = Instant::now();
		Some(Arc::clone(&entry.session))
	}

	pub async fn remove(&self, id: Uuid) -> Option<Arc<ReadingSession>> {
		self.sessions.lock().await.remove(&id).map(|e| e.session)
	}

	pub async fn len(&self) -> usize {
		self.sessions.lock().await.len()
	}

	/// Unload every open session. Returns how many were closed.
	pub async fn close_all(&self) -> usize {
		let sessions: Vec<_> = self.sessions.lock().await.drain().map(|(_, e)| e.session).collect();
		for session in &sessions {
			let _ = session.unload().await;
		}
		sessions.len()
	}

	/// Unload sessions with no activity for at least `idle`. Returns how many were closed.
	pub async fn unload_idle(&self, idle: Duration) -> usize {
		let stale: Vec<_> = {
			let mut sessions = self.sessions.lock().await;
			let ids: Vec<Uuid> =
				sessions.iter().filter(|(_, e)| e.last_seen.elapsed() >= idle).map(|(id, _)| *id).collect();
			ids.iter().filter_map(|id| sessions.remove(id)).map(|e| e.session).collect()
		};
		for session in &stale {
			tracing::info!(session_id = %session.id(), document_id = session.document_id(), "unloading idle session");
			let _ = session.unload().await;
		}
		stale.len()
	}

	/// Periodically unload idle sessions. Runs until the task is aborted.
	pub async fn run_idle_sweep(&self, idle: Duration) {
		let mut interval = tokio::time::interval(idle / 2);
		interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
		loop {
			interval.tick().await;
			let closed = self.unload_idle(idle).await;
			if closed > 0 {
				tracing::debug!(closed, "idle sweep finished");
			}
		}
	}
}

fn unknown_session(id: Uuid) -> Json<ErrorDto> {
	Json(ErrorDto { message: format!("unknown session {}", id) })
}

pub struct SessionService<'a> {
	pub registry: &'a SessionRegistry,
}

impl<'a> SessionService<'a> {
	pub fn new(registry: &'a SessionRegistry) -> Self {
		Self { registry }
	}

	#[tracing::instrument(level = "debug", skip(self, body), fields(document_id = body.document_id))]
	pub async fn open(&self, body: OpenSessionRequest) -> SessionResponse {
		if body.document_id <= 0 {
			return SessionResponse::BadRequest(Json(ErrorDto { message: "documentId must be positive".into() }));
		}
		let hints = ClientHints {
			url_page: body.url_page,
			hinted_page: body.hinted_page,
			hinted_percent: body.hinted_percent,
		};
		let session = self.registry.open(body.document_id, hints).await;
		SessionResponse::Created(Json(SessionDto {
			session_id: session.id(),
			document_id: session.document_id(),
			current_page: session.current_page(),
		}))
	}

	#[tracing::instrument(level = "debug", skip(self, body))]
	pub async fn layout(&self, id: Uuid, body: LayoutRequest) -> LayoutResponse {
		let Some(session) = self.registry.get(id).await else {
			return LayoutResponse::NotFound(unknown_session(id));
		};
		match session.layout(body.total_pages, body.canvas_height).await {
			Ok(target) => LayoutResponse::Ok(Json(LayoutResultDto { resume: target.map(Into::into) })),
			Err(e) => LayoutResponse::NotFound(Json(ErrorDto { message: e.to_string() })),
		}
	}

	#[tracing::instrument(level = "debug", skip(self, body))]
	pub async fn scroll(&self, id: Uuid, body: ScrollRequest) -> SessionEventResponse {
		let Some(session) = self.registry.get(id).await else {
			return SessionEventResponse::NotFound(unknown_session(id));
		};
		let (viewport, pages) = body.into_geometry();
		match session.scroll(viewport, pages).await {
			Ok(()) => SessionEventResponse::NoContent,
			Err(e) => SessionEventResponse::NotFound(Json(ErrorDto { message: e.to_string() })),
		}
	}

	#[tracing::instrument(level = "debug", skip(self, body))]
	pub async fn step(&self, id: Uuid, body: StepRequest) -> StepResponse {
		let Some(session) = self.registry.get(id).await else {
			return StepResponse::NotFound(unknown_session(id));
		};
		match session.step(body.direction.into()).await {
			Ok(page) => StepResponse::Ok(Json(PageDto { page })),
			Err(e) => StepResponse::NotFound(Json(ErrorDto { message: e.to_string() })),
		}
	}

	#[tracing::instrument(level = "debug", skip(self))]
	pub async fn back(&self, id: Uuid) -> SessionEventResponse {
		let Some(session) = self.registry.get(id).await else {
			return SessionEventResponse::NotFound(unknown_session(id));
		};
		match session.back().await {
			Ok(()) => SessionEventResponse::NoContent,
			Err(e) => SessionEventResponse::NotFound(Json(ErrorDto { message: e.to_string() })),
		}
	}

	/// Ends the session. The unload delivery keeps running on the keep-alive tracker.
	#[tracing::instrument(level = "debug", skip(self))]
	pub async fn unload(&self, id: Uuid) -> SessionEventResponse {
		let Some(session) = self.registry.remove(id).await else {
			return SessionEventResponse::NotFound(unknown_session(id));
		};
		let _ = session.unload().await;
		SessionEventResponse::NoContent
	}
}
