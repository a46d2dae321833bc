use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::{
    metrics::{
        ALERTS_FETCHED_TOTAL, DEGRADED, FETCH_FAILURES_TOTAL, REFRESHES_TOTAL,
        REFRESH_DURATION_SECONDS, SNAPSHOT_ALERTS, STALE_REFRESHES_TOTAL,
    },
    models::AnnotatedAlert,
    pipeline::Pipeline,
    sources::{sample_alerts, TicketSource},
};

/// Published, immutable view of the upstream data.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Sequence number of the refresh that published this snapshot.
    pub seq: u64,
    /// Time of the last successful fetch; `None` until one succeeds.
    pub fetched_at: Option<DateTime<Utc>>,
    pub alerts: Arc<Vec<AnnotatedAlert>>,
    /// Serving fallback rows, or older rows after a failed refresh.
    pub degraded: bool,
    pub error: Option<String>,
}

impl Snapshot {
    pub fn info(&self) -> SnapshotInfo {
        SnapshotInfo {
            seq: self.seq,
            fetched_at: self.fetched_at,
            degraded: self.degraded,
            error: self.error.clone(),
            count: self.alerts.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotInfo {
    pub seq: u64,
    pub fetched_at: Option<DateTime<Utc>>,
    pub degraded: bool,
    pub error: Option<String>,
    pub count: usize,
}

pub struct Poller {
    source: Arc<dyn TicketSource>,
    pipeline: Arc<Pipeline>,
    snapshot: RwLock<Snapshot>,
    next_seq: AtomicU64,
    interval: Duration,
}

impl Poller {
    pub fn new(source: Arc<dyn TicketSource>, pipeline: Arc<Pipeline>, interval: Duration) -> Self {
        Self {
            source,
            pipeline,
            snapshot: RwLock::new(Snapshot::default()),
            next_seq: AtomicU64::new(0),
            interval,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.snapshot.read().await.clone()
    }

    /// Fetch, annotate and publish. A result is dropped when a refresh that
    /// started later has already published.
    pub async fn refresh(&self) -> SnapshotInfo {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        REFRESHES_TOTAL.inc();
        let timer = REFRESH_DURATION_SECONDS.start_timer();

        debug!(seq, source = self.source.name(), "Refreshing snapshot");
        let result = self
            .source
            .fetch()
            .await
            .map(|raw| self.pipeline.annotate_all(&raw));
        timer.observe_duration();

        let mut current = self.snapshot.write().await;
        if current.seq > seq {
            STALE_REFRESHES_TOTAL.inc();
            warn!(seq, published = current.seq, "Dropping stale refresh result");
            return current.info();
        }

        match result {
            Ok(alerts) => {
                ALERTS_FETCHED_TOTAL.inc_by(alerts.len() as u64);
                info!(seq, count = alerts.len(), source = self.source.name(), "Snapshot refreshed");
                *current = Snapshot {
                    seq,
                    fetched_at: Some(Utc::now()),
                    alerts: Arc::new(alerts),
                    degraded: false,
                    error: None,
                };
            }
            Err(e) => {
                FETCH_FAILURES_TOTAL.inc();
                error!(seq, source = self.source.name(), "Failed to fetch tickets: {}", e);

                if current.fetched_at.is_some() {
                    warn!("Keeping previous snapshot from {:?}", current.fetched_at);
                } else {
                    warn!("No successful fetch yet, serving fallback data");
                    current.alerts = Arc::new(self.pipeline.annotate_all(&sample_alerts()));
                }
                current.seq = seq;
                current.degraded = true;
                current.error = Some(e.to_string());
            }
        }

        SNAPSHOT_ALERTS.set(current.alerts.len() as i64);
        DEGRADED.set(i64::from(current.degraded));
        current.info()
    }

    /// Refresh on every tick. Refreshes run inline, so a slow fetch delays
    /// the next tick instead of overlapping with it.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Polling {} every {:?}", self.source.name(), self.interval);
        loop {
            ticker.tick().await;
            self.refresh().await;
        }
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::RawAlert,
        sources::{FallbackSource, MockTicketSource},
        Error, Result,
    };
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    fn poller_with(results: Vec<Result<Vec<RawAlert>>>) -> Poller {
        let mut results = results.into_iter();
        let mut source = MockTicketSource::new();
        source.expect_name().return_const("mock".to_string());
        source
            .expect_fetch()
            .times(results.len())
            .returning(move || results.next().unwrap());
        Poller::new(Arc::new(source), Arc::new(Pipeline::default()), Duration::from_secs(30))
    }

    fn rows(ids: &[i64]) -> Vec<RawAlert> {
        ids.iter()
            .map(|id| RawAlert::new(*id, "Problem: x", "Problem started", "2025-09-26 10:00:00"))
            .collect()
    }

    #[tokio::test]
    async fn successful_refresh_publishes() {
        let poller = poller_with(vec![Ok(rows(&[1, 2]))]);

        let info = poller.refresh().await;
        assert_eq!(info.seq, 1);
        assert_eq!(info.count, 2);
        assert!(!info.degraded);
        assert!(info.fetched_at.is_some());
        assert_eq!(poller.snapshot().await.alerts[0].id(), 1);
    }

    #[tokio::test]
    async fn first_failure_serves_fallback() {
        let poller = poller_with(vec![Err(Error::Upstream("db down".to_string()))]);

        let info = poller.refresh().await;
        assert!(info.degraded);
        assert_eq!(info.count, sample_alerts().len());
        assert_eq!(info.error.as_deref(), Some("Upstream error: db down"));
        assert!(info.fetched_at.is_none());
    }

    #[tokio::test]
    async fn later_failure_keeps_last_good_data() {
        let poller = poller_with(vec![
            Ok(rows(&[7])),
            Err(Error::Upstream("timeout".to_string())),
            Ok(rows(&[8, 9])),
        ]);

        let good = poller.refresh().await;
        let failed = poller.refresh().await;
        assert!(failed.degraded);
        assert_eq!(failed.count, 1);
        assert_eq!(failed.fetched_at, good.fetched_at);
        assert_eq!(poller.snapshot().await.alerts[0].id(), 7);

        let recovered = poller.refresh().await;
        assert!(!recovered.degraded);
        assert!(recovered.error.is_none());
        assert_eq!(recovered.count, 2);
    }

    struct GatedSource {
        calls: AtomicUsize,
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl TicketSource for GatedSource {
        fn name(&self) -> &str {
            "gated"
        }

        async fn fetch(&self) -> Result<Vec<RawAlert>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.gate.notified().await;
                return Ok(rows(&[1]));
            }
            Ok(rows(&[2, 3]))
        }
    }

    #[tokio::test]
    async fn slow_older_refresh_cannot_overwrite_newer_one() {
        let gate = Arc::new(Notify::new());
        let source = GatedSource {
            calls: AtomicUsize::new(0),
            gate: gate.clone(),
        };
        let poller = Poller::new(Arc::new(source), Arc::new(Pipeline::default()), Duration::from_secs(30));

        let slow = poller.refresh();
        let fast = async {
            let info = poller.refresh().await;
            gate.notify_one();
            info
        };
        let (slow_info, fast_info) = tokio::join!(slow, fast);

        assert_eq!(fast_info.seq, 2);
        assert_eq!(slow_info.seq, 2);
        let snapshot = poller.snapshot().await;
        assert_eq!(snapshot.seq, 2);
        assert_eq!(snapshot.alerts.len(), 2);
    }

    #[tokio::test]
    async fn run_refreshes_on_interval() {
        let poller = Arc::new(Poller::new(
            Arc::new(FallbackSource),
            Arc::new(Pipeline::default()),
            Duration::from_millis(40),
        ));

        let handle = poller.clone().spawn();
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.abort();

        let snapshot = poller.snapshot().await;
        assert!(snapshot.seq >= 2);
        assert!(!snapshot.degraded);
    }

    struct PanickingSource;

    #[async_trait]
    impl TicketSource for PanickingSource {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn fetch(&self) -> Result<Vec<RawAlert>> {
            panic!("source blew up")
        }
    }

    #[tokio::test]
    async fn spawned_loop_reports_a_panicking_source() {
        let poller = Arc::new(Poller::new(
            Arc::new(PanickingSource),
            Arc::new(Pipeline::default()),
            Duration::from_millis(10),
        ));
        assert_eq!(poller.interval(), Duration::from_millis(10));

        let joined = poller.clone().spawn().await;
        assert!(joined.unwrap_err().is_panic());
    }
}
