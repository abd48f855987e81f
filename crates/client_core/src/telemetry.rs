use std::sync::Arc;

use shared::domain::ReactorSummary;

use crate::{
    error::{ClientError, TelemetryError, TelemetryResource},
    transport::ReactorService,
    types::ReactorSnapshot,
};

/// Retrieves the six per-reactor resources and merges them into one snapshot.
///
/// The six requests are issued concurrently and the first failure fails the
/// whole fetch. Retrying and staleness are the caller's business.
#[derive(Clone)]
pub struct TelemetryFetcher {
    service: Arc<dyn ReactorService>,
}

impl TelemetryFetcher {
    pub fn new(service: Arc<dyn ReactorService>) -> Self {
        Self { service }
    }

    pub async fn fetch(&self, reactor: &ReactorSummary) -> Result<ReactorSnapshot, TelemetryError> {
        let id = &reactor.id;
        let tag = |resource: TelemetryResource| {
            move |source: ClientError| TelemetryError {
                reactor_id: id.clone(),
                resource,
                source,
            }
        };

        let (temperature, state, control_rods, coolant, output, fuel_level) = tokio::try_join!(
            async {
                self.service
                    .temperature(id)
                    .await
                    .map_err(tag(TelemetryResource::Temperature))
            },
            async {
                self.service
                    .reactor_state(id)
                    .await
                    .map_err(tag(TelemetryResource::ReactorState))
            },
            async {
                self.service
                    .control_rods(id)
                    .await
                    .map_err(tag(TelemetryResource::RodState))
            },
            async {
                self.service
                    .coolant(id)
                    .await
                    .map_err(tag(TelemetryResource::Coolant))
            },
            async {
                self.service
                    .output(id)
                    .await
                    .map_err(tag(TelemetryResource::Output))
            },
            async {
                self.service
                    .fuel_level(id)
                    .await
                    .map_err(tag(TelemetryResource::FuelLevel))
            },
        )?;

        Ok(ReactorSnapshot {
            id: id.clone(),
            name: reactor.name.clone(),
            temperature,
            state,
            control_rods,
            coolant,
            output,
            fuel_level,
        })
    }
}

#[cfg(test)]
#[path = "tests/telemetry_tests.rs"]
mod tests;
