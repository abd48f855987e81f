use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::Utc;
use futures::future::join_all;
use tokio::{
    sync::{broadcast, Mutex, RwLock},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

use crate::{
    error::ClientError,
    series::{RollingSeries, SeriesView},
    telemetry::TelemetryFetcher,
    transport::ReactorService,
    types::{FleetEvent, FleetState, ReactorSnapshot, SeriesMetric},
};

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
    pub history_window: Duration,
    pub metric: SeriesMetric,
}

/// Periodically rebuilds the [`FleetState`] and feeds the rolling series.
///
/// At most one poll interval is active per poller. The interval task is held
/// in an owned handle; `start` refuses to run while it is set and `stop`
/// releases it. Each tick runs in its own task so one hung request only stalls
/// that tick. Ticks belonging to a stopped interval, and ticks that finish
/// after a later-started tick was already applied, are discarded.
pub struct FleetPoller {
    shared: Arc<PollerShared>,
    interval_task: Mutex<Option<JoinHandle<()>>>,
}

struct PollerShared {
    service: Arc<dyn ReactorService>,
    fetcher: TelemetryFetcher,
    interval: Duration,
    metric: SeriesMetric,
    fleet: Arc<RwLock<FleetState>>,
    series: RwLock<RollingSeries>,
    generation: AtomicU64,
    /// Start order of ticks; only ever moves forward.
    sequence: AtomicU64,
    /// Sequence of the newest applied tick. Read and written under the fleet
    /// write lock.
    applied: AtomicU64,
    events: broadcast::Sender<FleetEvent>,
}

impl FleetPoller {
    pub fn new(
        service: Arc<dyn ReactorService>,
        config: PollerConfig,
        events: broadcast::Sender<FleetEvent>,
    ) -> Self {
        let series = RollingSeries::for_window(config.history_window, config.interval);
        Self {
            shared: Arc::new(PollerShared {
                fetcher: TelemetryFetcher::new(Arc::clone(&service)),
                service,
                interval: config.interval,
                metric: config.metric,
                fleet: Arc::new(RwLock::new(FleetState::default())),
                series: RwLock::new(series),
                generation: AtomicU64::new(0),
                sequence: AtomicU64::new(0),
                applied: AtomicU64::new(0),
                events,
            }),
            interval_task: Mutex::new(None),
        }
    }

    pub async fn start(&self) -> Result<(), ClientError> {
        let mut interval_task = self.interval_task.lock().await;
        if interval_task.is_some() {
            return Err(ClientError::AlreadyPolling);
        }

        let shared = Arc::clone(&self.shared);
        let generation = shared.generation.load(Ordering::SeqCst);
        *interval_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(shared.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let sequence = shared.next_sequence();
                let tick_shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    let _ = tick_shared.run_tick(generation, sequence).await;
                });
            }
        }));
        info!(
            interval_ms = self.shared.interval.as_millis() as u64,
            generation, "fleet poller started"
        );
        Ok(())
    }

    /// Cancels future ticks. Requests already in flight run to completion and
    /// their results are dropped. Returns whether an interval was running.
    pub async fn stop(&self) -> bool {
        let Some(task) = self.interval_task.lock().await.take() else {
            return false;
        };
        task.abort();
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(generation, "fleet poller stopped");
        true
    }

    /// Drops all fleet state and history, then resumes polling if it was running.
    pub async fn reset(&self) -> Result<(), ClientError> {
        let was_running = self.stop().await;
        {
            let mut fleet = self.shared.fleet.write().await;
            let mut series = self.shared.series.write().await;
            *fleet = FleetState::default();
            series.reset();
            let _ = self
                .shared
                .events
                .send(FleetEvent::SeriesUpdated(series.view()));
            let _ = self
                .shared
                .events
                .send(FleetEvent::FleetStateUpdated(fleet.clone()));
        }
        info!(was_running, "fleet state and history reset");
        if was_running {
            self.start().await?;
        }
        Ok(())
    }

    /// Runs one tick inline and returns the resulting fleet state.
    pub async fn poll_once(&self) -> Result<FleetState, ClientError> {
        let generation = self.shared.generation.load(Ordering::SeqCst);
        let sequence = self.shared.next_sequence();
        match self.shared.run_tick(generation, sequence).await? {
            Some(state) => Ok(state),
            None => Ok(self.fleet_state().await),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.interval_task.lock().await.is_some()
    }

    pub async fn fleet_state(&self) -> FleetState {
        self.shared.fleet.read().await.clone()
    }

    pub async fn series_view(&self) -> SeriesView {
        self.shared.series.read().await.view()
    }

    /// Read access to the fleet state for collaborators that act on it.
    pub fn fleet_handle(&self) -> Arc<RwLock<FleetState>> {
        Arc::clone(&self.shared.fleet)
    }
}

impl Drop for FleetPoller {
    fn drop(&mut self) {
        if let Some(task) = self.interval_task.get_mut().take() {
            task.abort();
        }
    }
}

impl PollerShared {
    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// `Ok(None)` means nothing was applied: the tick's interval was cancelled,
    /// or a tick started after it has already been applied.
    async fn run_tick(
        &self,
        generation: u64,
        sequence: u64,
    ) -> Result<Option<FleetState>, ClientError> {
        let (listing, logs) = tokio::join!(self.service.list_reactors(), self.service.logs());
        let listing = match listing {
            Ok(listing) => listing,
            Err(err) => {
                warn!(%err, "failed to list reactors; keeping previous fleet state");
                let _ = self.events.send(FleetEvent::PollFailed(err.to_string()));
                return Err(err);
            }
        };

        let results = join_all(
            listing
                .reactors
                .iter()
                .map(|reactor| self.fetcher.fetch(reactor)),
        )
        .await;

        let mut fleet = self.fleet.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "discarding tick from a cancelled poll interval");
            return Ok(None);
        }
        if self.applied.load(Ordering::SeqCst) > sequence {
            debug!(sequence, "discarding tick overtaken by a newer one");
            return Ok(None);
        }
        self.applied.store(sequence, Ordering::SeqCst);

        let mut fresh = Vec::with_capacity(results.len());
        let mut reactors = Vec::with_capacity(results.len());
        for (summary, result) in listing.reactors.iter().zip(results) {
            match result {
                Ok(snapshot) => {
                    fresh.push(snapshot.clone());
                    reactors.push(snapshot);
                }
                Err(err) => {
                    warn!(reactor_id = %summary.id, %err, "telemetry fetch failed; keeping previous snapshot");
                    if let Some(previous) = fleet.get(&summary.id) {
                        reactors.push(previous.clone());
                    }
                }
            }
        }

        fleet.plant_name = listing.plant_name;
        fleet.reactors = reactors;
        match logs {
            Ok(lines) => fleet.logs = lines,
            Err(err) => warn!(%err, "failed to fetch plant logs; keeping previous entries"),
        }
        fleet.tick += 1;
        fleet.updated_at = Some(Utc::now());
        let published = fleet.clone();

        match metric_value(&self.metric, &fresh) {
            Some(value) => {
                let mut series = self.series.write().await;
                series.append(value);
                let _ = self.events.send(FleetEvent::SeriesUpdated(series.view()));
            }
            None => debug!(
                tick = published.tick,
                "no fresh temperature for the series metric; skipping append"
            ),
        }
        drop(fleet);

        let _ = self
            .events
            .send(FleetEvent::FleetStateUpdated(published.clone()));
        Ok(Some(published))
    }
}

/// Mean temperature over `snapshots`, or `None` when there are none.
pub fn fleet_average_temperature(snapshots: &[ReactorSnapshot]) -> Option<f64> {
    if snapshots.is_empty() {
        return None;
    }
    let total: f64 = snapshots
        .iter()
        .map(|snapshot| snapshot.temperature.amount)
        .sum();
    Some(total / snapshots.len() as f64)
}

fn metric_value(metric: &SeriesMetric, fresh: &[ReactorSnapshot]) -> Option<f64> {
    match metric {
        SeriesMetric::FleetAverageTemperature => fleet_average_temperature(fresh),
        SeriesMetric::ReactorTemperature(id) => fresh
            .iter()
            .find(|snapshot| &snapshot.id == id)
            .map(|snapshot| snapshot.temperature.amount),
    }
}

#[cfg(test)]
#[path = "tests/poller_tests.rs"]
mod tests;
