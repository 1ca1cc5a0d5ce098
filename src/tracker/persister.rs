use std::sync::Arc;

use tokio::{task::JoinHandle, time::Instant};
use tokio_util::task::TaskTracker;

use crate::{
    auth::{CredentialSource, Credentials},
    domain::models::{DocumentId, ReadingProgress},
};

/// Delivery path of a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Regular request while the session is alive.
    Normal,
    /// Keep-alive request that must outlive the session issuing it.
    Unload,
}

/// Backend endpoint that upserts reading progress.
#[async_trait::async_trait]
pub trait ProgressSink: Send + Sync {
    async fn upsert(
        &self,
        credentials: &Credentials,
        progress: &ReadingProgress,
        channel: Channel,
    ) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadTime {
    /// Report the seconds elapsed since the previous flush and restart the clock.
    SinceLastFlush,
    /// Report zero and leave the clock running.
    Untimed,
}

/// Builds progress records for one viewing session and dispatches them.
///
/// Deliveries are fire-and-forget: failures are logged and dropped, never retried.
/// Unload deliveries run on the shared keep-alive tracker so they survive the
/// session.
pub struct ProgressPersister {
    document_id: DocumentId,
    sink: Arc<dyn ProgressSink>,
    credentials: Arc<dyn CredentialSource>,
    keepalive: TaskTracker,
    last_flushed_at: Instant,
}

impl ProgressPersister {
    pub fn new(
        document_id: DocumentId,
        sink: Arc<dyn ProgressSink>,
        credentials: Arc<dyn CredentialSource>,
        keepalive: TaskTracker,
    ) -> Self {
        Self {
            document_id,
            sink,
            credentials,
            keepalive,
            last_flushed_at: Instant::now(),
        }
    }

    /// Compute the record for `page`, or `None` for guests and unknown page counts.
    pub fn prepare(
        &mut self,
        page: i64,
        total_pages: u32,
        read_time: ReadTime,
    ) -> Option<(Credentials, ReadingProgress)> {
        if total_pages == 0 {
            return None;
        }
        let Some(credentials) = self.credentials.current() else {
            tracing::trace!(document_id = self.document_id, "guest reader, progress not tracked");
            return None;
        };
        let seconds = match read_time {
            ReadTime::SinceLastFlush => {
                let now = Instant::now();
                let secs = now.duration_since(self.last_flushed_at).as_secs();
                self.last_flushed_at = now;
                secs
            }
            ReadTime::Untimed => 0,
        };
        let progress = ReadingProgress::at_page(self.document_id, page, total_pages, seconds);
        Some((credentials, progress))
    }

    pub fn flush(
        &mut self,
        page: i64,
        total_pages: u32,
        channel: Channel,
        read_time: ReadTime,
    ) -> Option<JoinHandle<()>> {
        let (credentials, progress) = self.prepare(page, total_pages, read_time)?;
        tracing::debug!(
            document_id = progress.document_id,
            last_page = progress.last_page,
            percent = progress.percent,
            session_read_seconds = progress.session_read_seconds,
            ?channel,
            "flushing progress"
        );
        let sink = Arc::clone(&self.sink);
        let delivery = async move {
            if let Err(e) = sink.upsert(&credentials, &progress, channel).await {
                tracing::debug!(error = %e, document_id = progress.document_id, ?channel, "progress flush dropped");
            }
        };
        let handle = match channel {
            Channel::Normal => tokio::spawn(delivery),
            Channel::Unload => self.keepalive.spawn(delivery),
        };
        Some(handle)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use tokio::sync::mpsc;

    use super::*;

    /// Records every upsert; optionally fails them.
    pub(crate) struct RecordingSink {
        calls: Mutex<Vec<(Channel, ReadingProgress)>>,
        notify: mpsc::UnboundedSender<(Channel, ReadingProgress)>,
        fail: bool,
    }

    impl RecordingSink {
        pub(crate) fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<(Channel, ReadingProgress)>) {
            Self::build(false)
        }

        pub(crate) fn failing() -> (Arc<Self>, mpsc::UnboundedReceiver<(Channel, ReadingProgress)>) {
            Self::build(true)
        }

        fn build(fail: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<(Channel, ReadingProgress)>) {
            let (notify, rx) = mpsc::unbounded_channel();
            let sink = RecordingSink {
                calls: Mutex::new(Vec::new()),
                notify,
                fail,
            };
            (Arc::new(sink), rx)
        }

        pub(crate) fn calls(&self) -> Vec<(Channel, ReadingProgress)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ProgressSink for RecordingSink {
        async fn upsert(
            &self,
            _credentials: &Credentials,
            progress: &ReadingProgress,
            channel: Channel,
        ) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push((channel, *progress));
            let _ = self.notify.send((channel, *progress));
            if self.fail {
                anyhow::bail!("connection reset");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{testing::RecordingSink, *};
    use crate::auth::CookieCredentials;

    fn signed_in() -> Arc<CookieCredentials> {
        let creds = CookieCredentials::new();
        creds.sign_in("token", Some("xsrf"));
        Arc::new(creds)
    }

    #[tokio::test]
    async fn guest_is_a_no_op() {
        let (sink, _rx) = RecordingSink::new();
        let mut persister =
            ProgressPersister::new(3, sink.clone(), Arc::new(CookieCredentials::new()), TaskTracker::new());

        assert!(persister.flush(2, 10, Channel::Normal, ReadTime::SinceLastFlush).is_none());
        assert!(persister.flush(2, 10, Channel::Unload, ReadTime::SinceLastFlush).is_none());
        assert!(sink.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_page_count_is_a_no_op() {
        let (sink, _rx) = RecordingSink::new();
        let mut persister = ProgressPersister::new(3, sink.clone(), signed_in(), TaskTracker::new());
        assert!(persister.prepare(2, 0, ReadTime::SinceLastFlush).is_none());
    }

    #[tokio::test]
    async fn clamps_and_derives_percent() {
        let (sink, _rx) = RecordingSink::new();
        let mut persister = ProgressPersister::new(3, sink.clone(), signed_in(), TaskTracker::new());

        persister.flush(57, 10, Channel::Normal, ReadTime::SinceLastFlush).unwrap().await.unwrap();
        persister.flush(-3, 10, Channel::Normal, ReadTime::SinceLastFlush).unwrap().await.unwrap();

        let calls = sink.calls();
        assert_eq!(calls[0].1.last_page, 10);
        assert_eq!(calls[0].1.percent, 100);
        assert_eq!(calls[1].1.last_page, 1);
        assert_eq!(calls[1].1.percent, 10);
        assert_eq!(calls[1].1.document_id, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn read_seconds_restart_on_every_attempt() {
        let (sink, _rx) = RecordingSink::failing();
        let mut persister = ProgressPersister::new(3, sink.clone(), signed_in(), TaskTracker::new());

        tokio::time::advance(Duration::from_secs(5)).await;
        let (_, first) = persister.prepare(1, 10, ReadTime::SinceLastFlush).unwrap();
        assert_eq!(first.session_read_seconds, 5);

        tokio::time::advance(Duration::from_millis(2500)).await;
        let (_, untimed) = persister.prepare(1, 10, ReadTime::Untimed).unwrap();
        assert_eq!(untimed.session_read_seconds, 0);

        // a failed delivery still restarts the clock
        persister.flush(2, 10, Channel::Normal, ReadTime::SinceLastFlush).unwrap().await.unwrap();
        assert_eq!(sink.calls()[0].1.session_read_seconds, 2);

        tokio::time::advance(Duration::from_secs(1)).await;
        let (_, next) = persister.prepare(3, 10, ReadTime::SinceLastFlush).unwrap();
        assert_eq!(next.session_read_seconds, 1);
    }

    #[tokio::test]
    async fn unload_delivery_runs_on_keepalive_tracker() {
        let (sink, mut rx) = RecordingSink::new();
        let keepalive = TaskTracker::new();
        let mut persister = ProgressPersister::new(9, sink.clone(), signed_in(), keepalive.clone());

        persister.flush(4, 8, Channel::Unload, ReadTime::SinceLastFlush).unwrap();
        drop(persister);

        keepalive.close();
        keepalive.wait().await;
        let (channel, progress) = rx.recv().await.unwrap();
        assert_eq!(channel, Channel::Unload);
        assert_eq!(progress.last_page, 4);
        assert_eq!(progress.percent, 50);
    }
}
