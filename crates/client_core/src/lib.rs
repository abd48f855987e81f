use std::{sync::Arc, time::Duration};

use shared::domain::ReactorId;
use tokio::sync::broadcast;
use tracing::info;

pub mod error;
pub mod orchestrator;
pub mod poller;
pub mod series;
pub mod telemetry;
pub mod transport;
pub mod types;

pub use error::{ClientError, TelemetryError, TelemetryResource};
pub use orchestrator::{ControlOrchestrator, MAX_ROD_STEPS};
pub use poller::{fleet_average_temperature, FleetPoller, PollerConfig};
pub use series::{RollingSeries, SeriesView, DEFAULT_HISTORY_WINDOW};
pub use telemetry::TelemetryFetcher;
pub use transport::{HttpReactorService, ReactorService};
pub use types::{
    ActionResult, ControlIntent, ControlKind, FleetEvent, FleetState, Operation, ReactorSnapshot,
    SeriesMetric, TargetScope,
};

pub const DEFAULT_SERVICE_URL: &str = "https://nuclear.dacoder.io";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub poll_interval: Duration,
    pub history_window: Duration,
    pub request_timeout: Option<Duration>,
    pub metric: SeriesMetric,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERVICE_URL.to_string(),
            api_key: String::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            history_window: DEFAULT_HISTORY_WINDOW,
            request_timeout: None,
            metric: SeriesMetric::default(),
        }
    }
}

/// One plant session: a poller, an orchestrator acting on the poller's state,
/// and the event stream both publish to.
pub struct PlantClient {
    poller: FleetPoller,
    orchestrator: ControlOrchestrator,
    events: broadcast::Sender<FleetEvent>,
}

impl PlantClient {
    pub fn connect(config: ClientConfig) -> Result<Arc<Self>, ClientError> {
        let service = HttpReactorService::new(
            &config.base_url,
            config.api_key.clone(),
            config.request_timeout,
        )?;
        info!(base_url = service.base_url(), "reactor service configured");
        Ok(Self::with_service(Arc::new(service), &config))
    }

    pub fn with_service(service: Arc<dyn ReactorService>, config: &ClientConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let poller = FleetPoller::new(
            Arc::clone(&service),
            PollerConfig {
                interval: config.poll_interval,
                history_window: config.history_window,
                metric: config.metric.clone(),
            },
            events.clone(),
        );
        let orchestrator = ControlOrchestrator::new(service, poller.fleet_handle(), events.clone());
        Arc::new(Self {
            poller,
            orchestrator,
            events,
        })
    }

    pub async fn start_polling(&self) -> Result<(), ClientError> {
        self.poller.start().await
    }

    pub async fn stop_polling(&self) -> bool {
        self.poller.stop().await
    }

    pub async fn poll_once(&self) -> Result<FleetState, ClientError> {
        self.poller.poll_once().await
    }

    pub async fn execute(&self, intent: ControlIntent) -> Vec<ActionResult> {
        self.orchestrator.execute(intent).await
    }

    pub async fn rename_plant(&self, name: &str) -> Result<(), ClientError> {
        self.orchestrator.rename_plant(name).await
    }

    pub async fn rename_reactor(&self, id: &ReactorId, name: &str) -> Result<(), ClientError> {
        self.orchestrator.rename_reactor(id, name).await
    }

    /// Resets the remote plant, then drops local state and history and
    /// restarts polling if it was running.
    pub async fn reset_plant(&self) -> Result<(), ClientError> {
        self.orchestrator.reset_plant().await?;
        self.poller.reset().await
    }

    pub async fn fleet_state(&self) -> FleetState {
        self.poller.fleet_state().await
    }

    pub async fn series_view(&self) -> SeriesView {
        self.poller.series_view().await
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<FleetEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/fake_service.rs"]
pub(crate) mod fake_service;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
