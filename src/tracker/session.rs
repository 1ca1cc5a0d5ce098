//! One document-viewing session.
//!
//! A worker task owns the observer, resume resolver, debouncer and persister and
//! handles events from a [`ReadingSession`] handle one at a time. Dropping the
//! handle is an unmount: the worker performs a final unload flush and exits.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tokio_util::task::TaskTracker;
use tracing::Instrument;
use uuid::Uuid;

use super::{
    debounce::{Debouncer, quiet_period},
    observer::{PageRect, PositionObserver, Viewport},
    persister::{Channel, ProgressPersister, ProgressSink, ReadTime},
    resume::{PageGeometry, PositionSource, ResumeResolver, ResumeTarget},
};
use crate::{
    auth::CredentialSource,
    domain::models::{ClientHints, DocumentId, ServerPosition, clamp_page},
};

const EVENT_BUFFER: usize = 64;

/// Collaborators shared by every session.
#[derive(Clone)]
pub struct SessionDeps {
    pub sink: Arc<dyn ProgressSink>,
    pub positions: Arc<dyn PositionSource>,
    pub credentials: Arc<dyn CredentialSource>,
    /// Tracks unload deliveries so they can finish after their session ended.
    pub keepalive: TaskTracker,
    pub quiet_window: Duration,
    pub geometry: PageGeometry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Prev,
    Next,
}

enum SessionEvent {
    Layout {
        total_pages: u32,
        canvas_height: f64,
        reply: oneshot::Sender<Option<ResumeTarget>>,
    },
    Scroll {
        viewport: Viewport,
        pages: Vec<PageRect>,
    },
    Step {
        step: Step,
        reply: oneshot::Sender<u32>,
    },
    Back {
        reply: oneshot::Sender<Option<JoinHandle<()>>>,
    },
    ServerPosition(ServerPosition),
    Unload {
        reply: oneshot::Sender<Option<JoinHandle<()>>>,
    },
}

/// Handle to a running viewing session.
pub struct ReadingSession {
    id: Uuid,
    document_id: DocumentId,
    events: mpsc::Sender<SessionEvent>,
    current_page: watch::Receiver<u32>,
}

impl ReadingSession {
    /// Start a session and fetch the backend's last position in the background.
    pub fn open(document_id: DocumentId, hints: ClientHints, deps: &SessionDeps) -> Self {
        let id = Uuid::now_v7();
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let observer = PositionObserver::new();
        let current_page = observer.subscribe();

        let worker = SessionWorker {
            events: events_rx,
            observer,
            resolver: ResumeResolver::new(hints, deps.geometry),
            debouncer: Debouncer::new(deps.quiet_window),
            persister: ProgressPersister::new(
                document_id,
                Arc::clone(&deps.sink),
                Arc::clone(&deps.credentials),
                deps.keepalive.clone(),
            ),
            total_pages: 0,
        };
        let span = tracing::info_span!("reading_session", session_id = %id, document_id);
        tokio::spawn(worker.run().instrument(span));

        spawn_position_fetch(document_id, Arc::clone(&deps.positions), events_tx.downgrade());
        tracing::info!(session_id = %id, document_id, "reading session opened");

        ReadingSession {
            id,
            document_id,
            events: events_tx,
            current_page,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    pub fn current_page(&self) -> u32 {
        *self.current_page.borrow()
    }

    fn closed(&self) -> anyhow::Error {
        anyhow::anyhow!("reading session {} is closed", self.id)
    }

    async fn send(&self, event: SessionEvent) -> anyhow::Result<()> {
        self.events.send(event).await.map_err(|_| self.closed())
    }

    /// Report the page count and measured canvas height; returns the resume target
    /// the first time the layout is usable.
    pub async fn layout(
        &self,
        total_pages: u32,
        canvas_height: f64,
    ) -> anyhow::Result<Option<ResumeTarget>> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionEvent::Layout {
            total_pages,
            canvas_height,
            reply,
        })
        .await?;
        rx.await.map_err(|_| self.closed())
    }

    pub async fn scroll(&self, viewport: Viewport, pages: Vec<PageRect>) -> anyhow::Result<()> {
        self.send(SessionEvent::Scroll { viewport, pages }).await
    }

    /// Move one page and persist it right away. Returns the target page.
    pub async fn step(&self, step: Step) -> anyhow::Result<u32> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionEvent::Step { step, reply }).await?;
        rx.await.map_err(|_| self.closed())
    }

    /// Persist the current page before the reader navigates back.
    pub async fn back(&self) -> anyhow::Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionEvent::Back { reply }).await?;
        if let Some(delivery) = rx.await.map_err(|_| self.closed())? {
            let _ = delivery.await;
        }
        Ok(())
    }

    /// End the session with a keep-alive flush. The returned delivery keeps running
    /// even if it is dropped; later calls on this handle fail.
    pub async fn unload(&self) -> Option<JoinHandle<()>> {
        let (reply, rx) = oneshot::channel();
        if self.send(SessionEvent::Unload { reply }).await.is_err() {
            return None;
        }
        rx.await.ok().flatten()
    }
}

fn spawn_position_fetch(
    document_id: DocumentId,
    positions: Arc<dyn PositionSource>,
    events: mpsc::WeakSender<SessionEvent>,
) {
    tokio::spawn(async move {
        let position = match positions.last_position(document_id).await {
            Ok(position) => position,
            Err(e) => {
                tracing::warn!(error = %e, document_id, "last reading position unavailable");
                return;
            }
        };
        let Some(events) = events.upgrade() else {
            tracing::debug!(document_id, "session ended before last position arrived");
            return;
        };
        let _ = events.send(SessionEvent::ServerPosition(position)).await;
    });
}

enum Flow {
    Continue,
    Terminate,
}

struct SessionWorker {
    events: mpsc::Receiver<SessionEvent>,
    observer: PositionObserver,
    resolver: ResumeResolver,
    debouncer: Debouncer,
    persister: ProgressPersister,
    total_pages: u32,
}

impl SessionWorker {
    async fn run(mut self) {
        loop {
            let deadline = self.debouncer.deadline();
            tokio::select! {
                event = self.events.recv() => {
                    let Some(event) = event else {
                        tracing::debug!("session handle dropped");
                        self.terminate();
                        break;
                    };
                    if let Flow::Terminate = self.handle(event) {
                        break;
                    }
                }
                _ = quiet_period(deadline), if deadline.is_some() => {
                    if self.debouncer.take_elapsed() {
                        self.flush(Channel::Normal, ReadTime::SinceLastFlush);
                    }
                }
            }
        }
        tracing::info!(page = self.observer.current(), "reading session closed");
    }

    fn handle(&mut self, event: SessionEvent) -> Flow {
        match event {
            SessionEvent::Layout {
                total_pages,
                canvas_height,
                reply,
            } => {
                if total_pages != self.total_pages {
                    self.total_pages = total_pages;
                    // records the view once the reader settles
                    if total_pages > 0 {
                        self.debouncer.touch();
                    }
                }
                let _ = reply.send(self.resolver.try_resolve(total_pages, canvas_height));
            }
            SessionEvent::Scroll { viewport, pages } => {
                if let Some(page) = self.observer.observe(&viewport, &pages) {
                    tracing::trace!(page, "current page changed");
                    if self.total_pages > 0 {
                        self.debouncer.touch();
                    }
                }
            }
            SessionEvent::Step { step, reply } => {
                let current = i64::from(self.observer.current());
                let target = match step {
                    Step::Prev => current - 1,
                    Step::Next => current + 1,
                };
                let target = clamp_page(target, self.total_pages);
                self.persister.flush(
                    i64::from(target),
                    self.total_pages,
                    Channel::Normal,
                    ReadTime::SinceLastFlush,
                );
                let _ = reply.send(target);
            }
            SessionEvent::Back { reply } => {
                let delivery = self.flush(Channel::Normal, ReadTime::Untimed);
                let _ = reply.send(delivery);
            }
            SessionEvent::ServerPosition(position) => {
                tracing::debug!(?position, "last reading position received");
                self.resolver.set_server_position(position);
            }
            SessionEvent::Unload { reply } => {
                let delivery = self.terminate();
                let _ = reply.send(delivery);
                return Flow::Terminate;
            }
        }
        Flow::Continue
    }

    /// Cancel any pending debounce and flush through the unload channel.
    fn terminate(&mut self) -> Option<JoinHandle<()>> {
        self.debouncer.cancel();
        self.flush(Channel::Unload, ReadTime::SinceLastFlush)
    }

    fn flush(&mut self, channel: Channel, read_time: ReadTime) -> Option<JoinHandle<()>> {
        let page = i64::from(self.observer.current());
        self.persister.flush(page, self.total_pages, channel, read_time)
    }
}
