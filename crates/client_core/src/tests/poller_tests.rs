use super::*;
use crate::{
    error::TelemetryResource,
    fake_service::{FakeReactor, FakeService},
};
use shared::domain::{ReactorId, ReactorState};

fn poller_with(
    service: Arc<FakeService>,
    interval: Duration,
    window: Duration,
    metric: SeriesMetric,
) -> (FleetPoller, broadcast::Receiver<FleetEvent>) {
    let (events, rx) = broadcast::channel(64);
    let poller = FleetPoller::new(
        service,
        PollerConfig {
            interval,
            history_window: window,
            metric,
        },
        events,
    );
    (poller, rx)
}

fn two_reactor_service() -> Arc<FakeService> {
    Arc::new(FakeService::with_reactors(vec![
        FakeReactor::new("1", 300.0, ReactorState::Active),
        FakeReactor::new("2", 340.0, ReactorState::Active),
    ]))
}

fn default_poller(service: Arc<FakeService>) -> (FleetPoller, broadcast::Receiver<FleetEvent>) {
    poller_with(
        service,
        Duration::from_millis(200),
        Duration::from_secs(300),
        SeriesMetric::FleetAverageTemperature,
    )
}

#[tokio::test]
async fn tick_merges_snapshots_and_appends_fleet_average() {
    let service = two_reactor_service();
    let (poller, _rx) = default_poller(Arc::clone(&service));

    let state = poller.poll_once().await.expect("tick");

    assert_eq!(state.plant_name, "Test Plant");
    assert_eq!(state.tick, 1);
    assert_eq!(state.logs, vec!["plant online".to_string()]);
    assert_eq!(
        state.reactor_ids(),
        vec![ReactorId::new("1"), ReactorId::new("2")]
    );
    let first = state.get(&ReactorId::new("1")).expect("reactor 1");
    assert_eq!(first.temperature.amount, 300.0);
    assert_eq!(first.state, ReactorState::Active);
    assert_eq!(first.fuel_level, 80.0);
    assert_eq!(poller.series_view().await.values, vec![320.0]);
}

#[tokio::test]
async fn full_series_evicts_oldest_average_first() {
    let service = two_reactor_service();
    let (poller, _rx) = poller_with(
        Arc::clone(&service),
        Duration::from_millis(1000),
        Duration::from_secs(3),
        SeriesMetric::FleetAverageTemperature,
    );

    for offset in [0.0, 10.0, 20.0, 30.0] {
        service.set_temperature("1", 300.0 + offset);
        service.set_temperature("2", 340.0 + offset);
        poller.poll_once().await.expect("tick");
    }

    let view = poller.series_view().await;
    assert_eq!(view.capacity, 3);
    assert_eq!(view.values, vec![330.0, 340.0, 350.0]);
}

#[tokio::test]
async fn zero_reactors_skip_the_series_append() {
    let service = Arc::new(FakeService::with_reactors(Vec::new()));
    let (poller, _rx) = default_poller(Arc::clone(&service));

    let state = poller.poll_once().await.expect("tick");

    assert!(state.reactors.is_empty());
    assert!(poller.series_view().await.values.is_empty());
    assert_eq!(fleet_average_temperature(&[]), None);
}

#[tokio::test]
async fn failed_fetch_keeps_previous_snapshot_and_excludes_it_from_average() {
    let service = two_reactor_service();
    let (poller, _rx) = default_poller(Arc::clone(&service));
    poller.poll_once().await.expect("first tick");

    service.set_temperature("1", 500.0);
    service.set_temperature("2", 360.0);
    service.fail_resource("1", TelemetryResource::Coolant);
    let state = poller.poll_once().await.expect("second tick");

    let stale = state.get(&ReactorId::new("1")).expect("retained");
    assert_eq!(stale.temperature.amount, 300.0);
    assert_eq!(
        state.get(&ReactorId::new("2")).map(|s| s.temperature.amount),
        Some(360.0)
    );
    assert_eq!(poller.series_view().await.values, vec![320.0, 360.0]);

    service.clear_resource_failures();
    let state = poller.poll_once().await.expect("third tick");
    assert_eq!(
        state.get(&ReactorId::new("1")).map(|s| s.temperature.amount),
        Some(500.0)
    );
}

#[tokio::test]
async fn listing_failure_is_reported_and_prior_state_survives() {
    let service = two_reactor_service();
    let (poller, mut rx) = default_poller(Arc::clone(&service));
    poller.poll_once().await.expect("first tick");

    service.fail_listing(true);
    let err = poller.poll_once().await.expect_err("listing fails");
    assert!(matches!(err, ClientError::Network { .. }));

    let state = poller.fleet_state().await;
    assert_eq!(state.tick, 1);
    assert_eq!(state.reactors.len(), 2);

    let mut saw_failure = false;
    while let Ok(event) = rx.try_recv() {
        if let FleetEvent::PollFailed(message) = event {
            assert!(message.contains("connection refused"));
            saw_failure = true;
        }
    }
    assert!(saw_failure);
}

#[tokio::test]
async fn removed_reactors_drop_out_of_the_fleet() {
    let service = two_reactor_service();
    let (poller, _rx) = default_poller(Arc::clone(&service));
    poller.poll_once().await.expect("first tick");

    service.set_reactors(vec![FakeReactor::new("2", 340.0, ReactorState::Offline)]);
    let state = poller.poll_once().await.expect("second tick");

    assert_eq!(state.reactor_ids(), vec![ReactorId::new("2")]);
}

#[tokio::test]
async fn reactor_metric_tracks_one_reactor_temperature() {
    let service = two_reactor_service();
    let (poller, _rx) = poller_with(
        Arc::clone(&service),
        Duration::from_millis(200),
        Duration::from_secs(300),
        SeriesMetric::ReactorTemperature(ReactorId::new("2")),
    );

    poller.poll_once().await.expect("tick");
    assert_eq!(poller.series_view().await.values, vec![340.0]);
}

#[tokio::test]
async fn second_start_is_rejected_until_stopped() {
    let service = two_reactor_service();
    let (poller, _rx) = default_poller(service);

    poller.start().await.expect("first start");
    assert!(poller.is_running().await);
    assert_eq!(poller.start().await, Err(ClientError::AlreadyPolling));

    assert!(poller.stop().await);
    assert!(!poller.stop().await);
    poller.start().await.expect("restart after stop");
    poller.stop().await;
}

#[tokio::test]
async fn running_poller_publishes_fleet_updates() {
    let service = two_reactor_service();
    let (poller, mut rx) = poller_with(
        service,
        Duration::from_millis(20),
        Duration::from_secs(1),
        SeriesMetric::FleetAverageTemperature,
    );

    poller.start().await.expect("start");
    let update = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Ok(FleetEvent::FleetStateUpdated(state)) => return state,
                Ok(_) => continue,
                Err(err) => panic!("event stream closed: {err}"),
            }
        }
    })
    .await
    .expect("fleet update within timeout");
    poller.stop().await;

    assert_eq!(update.reactors.len(), 2);
}

#[tokio::test]
async fn reset_clears_history_and_keeps_polling() {
    let service = two_reactor_service();
    let (poller, _rx) = default_poller(service);
    poller.poll_once().await.expect("tick");
    poller.poll_once().await.expect("tick");

    poller.start().await.expect("start");
    poller.reset().await.expect("reset");

    assert!(poller.is_running().await);
    let state = poller.fleet_state().await;
    assert!(state.tick <= 1, "state should have been rebuilt, tick={}", state.tick);
    assert!(poller.series_view().await.values.len() <= 1);
    poller.stop().await;
}

#[tokio::test]
async fn reset_on_idle_poller_does_not_start_it() {
    let service = two_reactor_service();
    let (poller, mut rx) = default_poller(service);
    poller.poll_once().await.expect("tick");
    while rx.try_recv().is_ok() {}

    poller.reset().await.expect("reset");

    assert!(!poller.is_running().await);
    assert_eq!(poller.fleet_state().await, FleetState::default());
    assert!(poller.series_view().await.values.is_empty());

    let mut cleared_fleet = None;
    let mut cleared_series = None;
    while let Ok(event) = rx.try_recv() {
        match event {
            FleetEvent::FleetStateUpdated(state) => cleared_fleet = Some(state),
            FleetEvent::SeriesUpdated(view) => cleared_series = Some(view),
            _ => {}
        }
    }
    assert_eq!(cleared_fleet, Some(FleetState::default()));
    assert!(cleared_series.expect("series event").values.is_empty());
}

#[tokio::test]
async fn slow_tick_finishing_after_a_newer_one_is_discarded() {
    let service = Arc::new(FakeService::with_reactors(vec![FakeReactor::new(
        "1",
        100.0,
        ReactorState::Active,
    )]));
    let (poller, _rx) = default_poller(Arc::clone(&service));
    service.delay_next_temperature(Duration::from_millis(300));

    let slow = poller.poll_once();
    let fast = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        service.set_temperature("1", 500.0);
        poller.poll_once().await
    };
    let (slow, fast) = tokio::join!(slow, fast);

    let fast = fast.expect("fast tick");
    assert_eq!(fast.tick, 1);
    assert_eq!(
        fast.get(&ReactorId::new("1")).map(|s| s.temperature.amount),
        Some(500.0)
    );
    let slow = slow.expect("slow tick");
    assert_eq!(slow, fast);

    let state = poller.fleet_state().await;
    assert_eq!(state.tick, 1);
    assert_eq!(
        state.get(&ReactorId::new("1")).map(|s| s.temperature.amount),
        Some(500.0)
    );
    assert_eq!(poller.series_view().await.values, vec![500.0]);
}

#[tokio::test]
async fn running_poller_keeps_newest_state_when_a_tick_stalls() {
    let service = Arc::new(FakeService::with_reactors(vec![FakeReactor::new(
        "1",
        500.0,
        ReactorState::Active,
    )]));
    let (poller, _rx) = poller_with(
        Arc::clone(&service),
        Duration::from_millis(100),
        Duration::from_secs(10),
        SeriesMetric::FleetAverageTemperature,
    );
    poller.poll_once().await.expect("first tick");
    service.delay_next_temperature(Duration::from_millis(300));
    service.set_temperature("1", 100.0);

    poller.start().await.expect("start");
    tokio::time::sleep(Duration::from_millis(50)).await;
    service.set_temperature("1", 500.0);
    tokio::time::sleep(Duration::from_millis(450)).await;
    poller.stop().await;

    let state = poller.fleet_state().await;
    assert_eq!(
        state.get(&ReactorId::new("1")).map(|s| s.temperature.amount),
        Some(500.0)
    );
    let values = poller.series_view().await.values;
    assert!(
        values.iter().all(|value| *value == 500.0),
        "stale tick leaked into the series: {values:?}"
    );
}
