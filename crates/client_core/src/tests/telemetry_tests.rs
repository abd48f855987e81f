use super::*;
use crate::fake_service::{FakeReactor, FakeService};
use shared::domain::{ControlRods, CoolantState, ReactorId, ReactorState};

fn summary(id: &str) -> ReactorSummary {
    ReactorSummary {
        id: ReactorId::new(id),
        name: format!("Reactor {id}"),
    }
}

#[tokio::test]
async fn merges_all_six_resources_into_one_snapshot() {
    let service = Arc::new(FakeService::with_reactors(vec![FakeReactor::new(
        "r-1",
        412.0,
        ReactorState::Active,
    )
    .with_coolant(CoolantState::On)
    .with_fuel(55.5)
    .with_rods(120, 180)]));
    let fetcher = TelemetryFetcher::new(service);

    let snapshot = fetcher.fetch(&summary("r-1")).await.expect("snapshot");

    assert_eq!(snapshot.id, ReactorId::new("r-1"));
    assert_eq!(snapshot.name, "Reactor r-1");
    assert_eq!(snapshot.temperature.amount, 412.0);
    assert_eq!(snapshot.temperature.unit, "kelvin");
    assert_eq!(snapshot.state, ReactorState::Active);
    assert_eq!(
        snapshot.control_rods,
        ControlRods {
            inserted: 120,
            withdrawn: 180
        }
    );
    assert_eq!(snapshot.coolant, CoolantState::On);
    assert_eq!(snapshot.output.amount, 1200.0);
    assert_eq!(snapshot.fuel_level, 55.5);
}

#[tokio::test]
async fn any_failed_resource_fails_the_fetch() {
    let service = Arc::new(FakeService::with_reactors(vec![FakeReactor::new(
        "r-1",
        300.0,
        ReactorState::Active,
    )]));
    service.fail_resource("r-1", TelemetryResource::FuelLevel);
    let fetcher = TelemetryFetcher::new(service);

    let err = fetcher.fetch(&summary("r-1")).await.expect_err("must fail");

    assert_eq!(err.reactor_id, ReactorId::new("r-1"));
    assert_eq!(err.resource, TelemetryResource::FuelLevel);
    assert!(matches!(err.source, ClientError::Network { .. }));
    assert!(err.to_string().contains("fuel-level"));
}

#[tokio::test]
async fn unknown_reactor_surfaces_service_error() {
    let service = Arc::new(FakeService::with_reactors(Vec::new()));
    let fetcher = TelemetryFetcher::new(service);

    let err = fetcher.fetch(&summary("ghost")).await.expect_err("must fail");
    assert!(matches!(err.source, ClientError::Api { status: 404, .. }));
}
