//! Periodic weather refresh.
//!
//! One supervising task runs a refresh pass immediately and then on every
//! tick of a fixed interval. Each pass lists the located farms, fetches
//! their weather with at most `concurrency` requests in flight, and
//! publishes a `weather.updated` event per success. A failing farm is
//! logged and skipped; it never aborts the pass.
//!
//! The task ends when the shutdown signal handed to
//! [`WeatherUpdater::start`] fires or when [`WeatherUpdater::stop`] is
//! called. Either way in-flight fetches are abandoned rather than awaited.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

use crate::bus::EventPublisher;
use crate::domain::{Event, EventType, FarmLocation};
use crate::error::AnalyticsError;
use crate::persistence::FarmDirectory;
use crate::weather::WeatherFetcher;

/// `source` of every event this worker publishes.
pub const WORKER_SOURCE: &str = "weather-updater-worker";

/// Upper bound on listing farms at the start of a pass.
const DIRECTORY_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on publishing one event.
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle of a [`WeatherUpdater`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// No supervising task.
    Stopped,
    /// Supervising task alive.
    Running,
    /// Stop requested, waiting for the task to exit.
    Stopping,
}

/// Tuning for [`WeatherUpdater`].
#[derive(Debug, Clone, Copy)]
pub struct WeatherUpdaterOptions {
    /// Time between passes.
    pub interval: Duration,
    /// Maximum fetches in flight during a pass.
    pub concurrency: usize,
}

impl Default for WeatherUpdaterOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15 * 60),
            concurrency: 5,
        }
    }
}

/// Outcome of one refresh pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Located farms that got a fetch slot before the pass ended.
    pub farms: usize,
    /// `weather.updated` events published.
    pub published: usize,
    /// Farms whose fetch or publish failed.
    pub failed: usize,
}

/// Shutdown signal and stop signal, merged.
///
/// A signal fires when its value becomes `true` or when its sender is
/// dropped. A missing receiver never fires.
#[derive(Debug, Clone, Default)]
struct Cancellation {
    shutdown: Option<watch::Receiver<bool>>,
    stop: Option<watch::Receiver<bool>>,
}

impl Cancellation {
    async fn cancelled(&mut self) {
        tokio::select! {
            () = fired(self.shutdown.as_mut()) => {}
            () = fired(self.stop.as_mut()) => {}
        }
    }
}

async fn fired(signal: Option<&mut watch::Receiver<bool>>) {
    match signal {
        Some(rx) => {
            let _ = rx.wait_for(|cancelled| *cancelled).await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Shared state of the supervising task and its per-farm subtasks.
#[derive(Debug)]
struct Refresher {
    directory: Arc<dyn FarmDirectory>,
    fetcher: Arc<dyn WeatherFetcher>,
    publisher: Arc<dyn EventPublisher>,
    concurrency: usize,
}

impl Refresher {
    async fn refresh_all(self: &Arc<Self>, cancel: &Cancellation) -> PassSummary {
        let mut summary = PassSummary::default();
        let farms = match tokio::time::timeout(
            DIRECTORY_TIMEOUT,
            self.directory.list_farms_with_location(),
        )
        .await
        {
            Ok(Ok(farms)) => farms,
            Ok(Err(err)) => {
                tracing::error!(error = %err, "failed to list farms for weather refresh");
                return summary;
            }
            Err(_) => {
                tracing::error!("listing farms for weather refresh timed out");
                return summary;
            }
        };

        let semaphore = Arc::new(Semaphore::new(self.concurrency.max(1)));
        let mut waiter = cancel.clone();
        let mut tasks = JoinSet::new();

        for farm in farms {
            if !farm.has_coordinates() {
                tracing::debug!(farm_id = %farm.farm_id, "skipping farm without coordinates");
                continue;
            }

            let permit = tokio::select! {
                biased;
                () = waiter.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            summary.farms += 1;

            let refresher = Arc::clone(self);
            let mut cancel = cancel.clone();
            tasks.spawn(async move {
                let _permit = permit;
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        tracing::debug!(farm_id = %farm.farm_id, "weather fetch cancelled");
                        false
                    }
                    ok = refresher.refresh_farm(&farm) => ok,
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(true) => summary.published += 1,
                Ok(false) => summary.failed += 1,
                Err(err) => {
                    summary.failed += 1;
                    tracing::error!(error = %err, "weather refresh task failed");
                }
            }
        }
        summary
    }

    async fn refresh_farm(&self, farm: &FarmLocation) -> bool {
        let snapshot = match self
            .fetcher
            .current_weather(farm.latitude, farm.longitude)
            .await
        {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(
                    farm_id = %farm.farm_id,
                    lat = farm.latitude,
                    lon = farm.longitude,
                    error = %err,
                    "weather fetch failed"
                );
                return false;
            }
        };

        let event = match weather_event(farm, &snapshot) {
            Ok(event) => event,
            Err(err) => {
                tracing::error!(
                    farm_id = %farm.farm_id,
                    error = %err,
                    "failed to build weather event"
                );
                return false;
            }
        };

        match tokio::time::timeout(PUBLISH_TIMEOUT, self.publisher.publish(&event)).await {
            Ok(Ok(())) => {
                tracing::debug!(farm_id = %farm.farm_id, event_id = %event.id, "weather.updated published");
                true
            }
            Ok(Err(err)) => {
                tracing::error!(farm_id = %farm.farm_id, error = %err, "failed to publish weather.updated");
                false
            }
            Err(_) => {
                tracing::error!(farm_id = %farm.farm_id, "publishing weather.updated timed out");
                false
            }
        }
    }
}

/// Builds the `weather.updated` event: the snapshot plus farm id and
/// coordinates, keyed on the farm.
fn weather_event(
    farm: &FarmLocation,
    snapshot: &crate::domain::WeatherSnapshot,
) -> Result<Event, AnalyticsError> {
    let mut payload = serde_json::to_value(snapshot)?;
    if let Some(fields) = payload.as_object_mut() {
        fields.insert("farm_id".to_string(), json!(farm.farm_id));
        fields.insert("lat".to_string(), json!(farm.latitude));
        fields.insert("lon".to_string(), json!(farm.longitude));
    }
    Ok(Event::new(
        EventType::WeatherUpdated.as_str(),
        WORKER_SOURCE,
        farm.farm_id.as_str(),
        payload,
    ))
}

/// Periodic weather refresher with `start`/`stop` lifecycle.
#[derive(Debug)]
pub struct WeatherUpdater {
    refresher: Arc<Refresher>,
    interval: Duration,
    state: WorkerState,
    stop_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl WeatherUpdater {
    /// Creates a stopped worker.
    #[must_use]
    pub fn new(
        directory: Arc<dyn FarmDirectory>,
        fetcher: Arc<dyn WeatherFetcher>,
        publisher: Arc<dyn EventPublisher>,
        options: WeatherUpdaterOptions,
    ) -> Self {
        Self {
            refresher: Arc::new(Refresher {
                directory,
                fetcher,
                publisher,
                concurrency: options.concurrency.max(1),
            }),
            interval: options.interval.max(Duration::from_millis(1)),
            state: WorkerState::Stopped,
            stop_tx: None,
            task: None,
        }
    }

    /// Returns the current lifecycle state.
    ///
    /// A worker whose task ended because the shutdown signal fired reports
    /// [`WorkerState::Stopped`] even before [`Self::stop`] is called.
    #[must_use]
    pub fn state(&self) -> WorkerState {
        match (&self.task, self.state) {
            (Some(task), WorkerState::Running) if task.is_finished() => WorkerState::Stopped,
            (_, state) => state,
        }
    }

    /// Spawns the supervising task. The first pass runs immediately.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::InvalidRequest`] if the worker is already
    /// running.
    pub fn start(&mut self, shutdown: watch::Receiver<bool>) -> Result<(), AnalyticsError> {
        if self.task.as_ref().is_some_and(|task| !task.is_finished()) {
            return Err(AnalyticsError::InvalidRequest(
                "weather updater already running".to_string(),
            ));
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let cancel = Cancellation {
            shutdown: Some(shutdown),
            stop: Some(stop_rx),
        };
        let refresher = Arc::clone(&self.refresher);
        let interval = self.interval;

        tracing::info!(interval_secs = interval.as_secs(), "starting weather updater");
        self.task = Some(tokio::spawn(supervise(refresher, cancel, interval)));
        self.stop_tx = Some(stop_tx);
        self.state = WorkerState::Running;
        Ok(())
    }

    /// Signals the supervising task and waits for it to exit.
    ///
    /// Once this returns no further fetches are issued. Calling it on a
    /// stopped worker does nothing.
    pub async fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        self.state = WorkerState::Stopping;
        if let Some(stop_tx) = self.stop_tx.take() {
            stop_tx.send_replace(true);
        }
        if let Err(err) = task.await {
            tracing::error!(error = %err, "weather updater task ended abnormally");
        }
        self.state = WorkerState::Stopped;
        tracing::info!("weather updater stopped");
    }

    /// Runs one pass on the caller's task, outside the schedule.
    pub async fn refresh_now(&self) -> PassSummary {
        self.refresher.refresh_all(&Cancellation::default()).await
    }
}

async fn supervise(refresher: Arc<Refresher>, mut cancel: Cancellation, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let pass_cancel = cancel.clone();
        let summary = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            summary = refresher.refresh_all(&pass_cancel) => summary,
        };
        tracing::info!(
            farms = summary.farms,
            published = summary.published,
            failed = summary.failed,
            "weather refresh pass finished"
        );
    }
    tracing::debug!("weather updater task exiting");
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::domain::{FarmId, WeatherSnapshot};

    #[derive(Debug, Default)]
    struct Farms(Vec<FarmLocation>);

    #[async_trait]
    impl FarmDirectory for Farms {
        async fn list_farms_with_location(&self) -> Result<Vec<FarmLocation>, AnalyticsError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Debug, Default)]
    struct SlowFetcher {
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
        failing_latitude: Option<f64>,
    }

    #[async_trait]
    impl WeatherFetcher for SlowFetcher {
        async fn current_weather(
            &self,
            latitude: f64,
            _longitude: f64,
        ) -> Result<WeatherSnapshot, AnalyticsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing_latitude == Some(latitude) {
                return Err(AnalyticsError::WeatherFetch("HTTP 500".to_string()));
            }
            Ok(WeatherSnapshot {
                temp_celsius: Some(20.0),
                ..WeatherSnapshot::default()
            })
        }
    }

    #[derive(Debug, Default)]
    struct Recording {
        events: Mutex<Vec<Event>>,
    }

    #[async_trait]
    impl EventPublisher for Recording {
        async fn publish(&self, event: &Event) -> Result<(), AnalyticsError> {
            if let Ok(mut events) = self.events.lock() {
                events.push(event.clone());
            }
            Ok(())
        }
    }

    impl Recording {
        fn aggregate_ids(&self) -> HashSet<String> {
            self.events
                .lock()
                .map(|events| events.iter().map(|e| e.aggregate_id.clone()).collect())
                .unwrap_or_default()
        }
    }

    fn farm(id: &str, latitude: f64, longitude: f64) -> FarmLocation {
        let Some(farm_id) = FarmId::parse(id) else {
            panic!("bad farm id");
        };
        FarmLocation {
            farm_id,
            name: id.to_string(),
            latitude,
            longitude,
        }
    }

    fn updater(
        farms: Vec<FarmLocation>,
        fetcher: &Arc<SlowFetcher>,
        publisher: &Arc<Recording>,
        options: WeatherUpdaterOptions,
    ) -> WeatherUpdater {
        WeatherUpdater::new(
            Arc::new(Farms(farms)),
            Arc::clone(fetcher) as Arc<dyn WeatherFetcher>,
            Arc::clone(publisher) as Arc<dyn EventPublisher>,
            options,
        )
    }

    #[tokio::test]
    async fn fan_out_never_exceeds_concurrency() {
        let farms = (1..=12).map(|i| farm(&format!("f{i}"), f64::from(i), 1.0)).collect();
        let fetcher = Arc::new(SlowFetcher {
            delay: Duration::from_millis(20),
            ..SlowFetcher::default()
        });
        let publisher = Arc::new(Recording::default());
        let options = WeatherUpdaterOptions {
            concurrency: 3,
            ..WeatherUpdaterOptions::default()
        };

        let summary = updater(farms, &fetcher, &publisher, options).refresh_now().await;

        assert_eq!(summary.farms, 12);
        assert_eq!(summary.published, 12);
        assert!(fetcher.max_in_flight.load(Ordering::SeqCst) <= 3);
        assert_eq!(publisher.aggregate_ids().len(), 12);
    }

    #[tokio::test]
    async fn one_failing_farm_does_not_stop_the_others() {
        let farms = vec![farm("a", 1.0, 1.0), farm("b", 2.0, 2.0), farm("c", 3.0, 3.0)];
        let fetcher = Arc::new(SlowFetcher {
            failing_latitude: Some(1.0),
            ..SlowFetcher::default()
        });
        let publisher = Arc::new(Recording::default());

        let summary = updater(farms, &fetcher, &publisher, WeatherUpdaterOptions::default())
            .refresh_now()
            .await;

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.published, 2);
        let ids = publisher.aggregate_ids();
        assert!(ids.contains("b") && ids.contains("c"));
        assert!(!ids.contains("a"));
    }

    #[tokio::test]
    async fn farms_at_origin_are_skipped() {
        let farms = vec![farm("nowhere", 0.0, 0.0), farm("here", 5.0, 6.0)];
        let fetcher = Arc::new(SlowFetcher::default());
        let publisher = Arc::new(Recording::default());

        let summary = updater(farms, &fetcher, &publisher, WeatherUpdaterOptions::default())
            .refresh_now()
            .await;

        assert_eq!(summary.farms, 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn published_event_carries_snapshot_and_coordinates() {
        let fetcher = Arc::new(SlowFetcher::default());
        let publisher = Arc::new(Recording::default());

        let worker = updater(
            vec![farm("f1", 10.0, 20.0)],
            &fetcher,
            &publisher,
            WeatherUpdaterOptions::default(),
        );
        let _ = worker.refresh_now().await;

        let events = publisher.events.lock().map(|e| e.clone()).unwrap_or_default();
        let Some(event) = events.first() else {
            panic!("no event published");
        };
        assert_eq!(event.event_type, "weather.updated");
        assert_eq!(event.source, WORKER_SOURCE);
        assert_eq!(event.aggregate_id, "f1");
        assert_eq!(event.payload_str("farm_id"), Some("f1"));
        assert_eq!(event.payload.get("lat"), Some(&json!(10.0)));
        assert_eq!(event.payload.get("lon"), Some(&json!(20.0)));
        assert_eq!(event.payload.get("temp_celsius"), Some(&json!(20.0)));
    }

    #[tokio::test]
    async fn start_runs_first_pass_and_stop_joins() {
        let fetcher = Arc::new(SlowFetcher::default());
        let publisher = Arc::new(Recording::default());
        let options = WeatherUpdaterOptions {
            interval: Duration::from_secs(3600),
            concurrency: 2,
        };
        let mut worker = updater(vec![farm("f1", 1.0, 1.0)], &fetcher, &publisher, options);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        assert!(worker.start(shutdown_rx.clone()).is_ok());
        assert_eq!(worker.state(), WorkerState::Running);
        assert!(worker.start(shutdown_rx).is_err());

        for _ in 0..100 {
            if !publisher.aggregate_ids().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(publisher.aggregate_ids().len(), 1);

        worker.stop().await;
        assert_eq!(worker.state(), WorkerState::Stopped);
        let calls = fetcher.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), calls);

        worker.stop().await;
    }

    #[tokio::test]
    async fn stop_abandons_slow_fetches() {
        let fetcher = Arc::new(SlowFetcher {
            delay: Duration::from_secs(30),
            ..SlowFetcher::default()
        });
        let publisher = Arc::new(Recording::default());
        let mut worker = updater(
            vec![farm("f1", 1.0, 1.0), farm("f2", 2.0, 2.0)],
            &fetcher,
            &publisher,
            WeatherUpdaterOptions::default(),
        );
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        assert!(worker.start(shutdown_rx).is_ok());
        tokio::time::sleep(Duration::from_millis(50)).await;

        let stopped = tokio::time::timeout(Duration::from_secs(2), worker.stop()).await;

        assert!(stopped.is_ok());
        assert!(publisher.aggregate_ids().is_empty());
    }

    #[tokio::test]
    async fn cancelled_pass_counts_only_farms_that_got_a_slot() {
        let fetcher = Arc::new(SlowFetcher {
            delay: Duration::from_secs(30),
            ..SlowFetcher::default()
        });
        let publisher = Arc::new(Recording::default());
        let farms = vec![farm("f1", 1.0, 1.0), farm("f2", 2.0, 2.0), farm("f3", 3.0, 3.0)];
        let options = WeatherUpdaterOptions {
            concurrency: 1,
            ..WeatherUpdaterOptions::default()
        };
        let worker = updater(farms, &fetcher, &publisher, options);
        let (stop_tx, stop_rx) = watch::channel(false);
        let cancel = Cancellation {
            shutdown: None,
            stop: Some(stop_rx),
        };

        let (summary, ()) = tokio::join!(worker.refresher.refresh_all(&cancel), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            stop_tx.send_replace(true);
        });

        assert_eq!(summary.farms, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.published, 0);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pass_cancelled_up_front_considers_no_farm() {
        let fetcher = Arc::new(SlowFetcher::default());
        let publisher = Arc::new(Recording::default());
        let worker = updater(
            vec![farm("f1", 1.0, 1.0), farm("f2", 2.0, 2.0)],
            &fetcher,
            &publisher,
            WeatherUpdaterOptions::default(),
        );
        let (_stop_tx, stop_rx) = watch::channel(true);
        let cancel = Cancellation {
            shutdown: None,
            stop: Some(stop_rx),
        };

        let summary = worker.refresher.refresh_all(&cancel).await;

        assert_eq!(summary, PassSummary::default());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn shutdown_signal_ends_the_task() {
        let fetcher = Arc::new(SlowFetcher::default());
        let publisher = Arc::new(Recording::default());
        let mut worker = updater(
            Vec::new(),
            &fetcher,
            &publisher,
            WeatherUpdaterOptions::default(),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        assert!(worker.start(shutdown_rx).is_ok());

        shutdown_tx.send_replace(true);
        for _ in 0..100 {
            if worker.state() == WorkerState::Stopped {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(worker.state(), WorkerState::Stopped);
        worker.stop().await;
    }
}
