use super::*;

fn series(capacity: usize, tick_ms: u64) -> RollingSeries {
    RollingSeries::new(capacity, Duration::from_millis(tick_ms))
}

#[test]
fn length_is_min_of_appends_and_capacity() {
    for appends in [0usize, 1, 4, 5, 6, 17] {
        let mut series = series(5, 200);
        for value in 0..appends {
            series.append(value as f64);
        }
        assert_eq!(series.len(), appends.min(5), "after {appends} appends");
    }
}

#[test]
fn keeps_most_recent_values_in_insertion_order() {
    let mut series = series(3, 1000);
    for value in [1.0, 2.0, 3.0, 4.0, 5.0] {
        series.append(value);
    }
    assert_eq!(series.values(), vec![3.0, 4.0, 5.0]);
    assert_eq!(series.latest(), Some(5.0));
}

#[test]
fn sample_timestamps_advance_by_one_tick() {
    let mut series = series(4, 200);
    for value in 0..6 {
        series.append(value as f64);
    }
    let stamps: Vec<u64> = series.samples().map(|sample| sample.elapsed_ms).collect();
    assert_eq!(stamps, vec![600, 800, 1000, 1200]);
    assert_eq!(series.elapsed_ms(), 1200);
}

#[test]
fn capacity_is_derived_from_window_and_tick() {
    let dashboard = RollingSeries::for_window(DEFAULT_HISTORY_WINDOW, Duration::from_millis(1000));
    assert_eq!(dashboard.capacity(), 300);
    let reactor_view = RollingSeries::for_window(DEFAULT_HISTORY_WINDOW, Duration::from_millis(200));
    assert_eq!(reactor_view.capacity(), 1500);
}

#[test]
fn labels_are_index_relative_before_rollover() {
    let series = series(10, 200);
    assert_eq!(series.boundary_ms(), 2000);
    assert_eq!(series.label_for(0, 1800), 0.0);
    assert_eq!(series.label_for(3, 1800), 0.6);
    assert_eq!(series.label_for(9, 0), 1.8);
}

#[test]
fn labels_shift_with_elapsed_time_after_rollover() {
    let series = series(10, 200);
    // (current - (boundary - tick * i)) / 1000
    assert_eq!(series.label_for(0, 2000), 0.0);
    assert_eq!(series.label_for(0, 3000), 1.0);
    assert_eq!(series.label_for(4, 3000), 1.8);
    assert_eq!(series.label_for(9, 5000), 4.8);
}

#[test]
fn labels_strictly_increase_in_both_regimes() {
    let series = series(50, 1000);
    for current in [10_000u64, 49_000, 50_000, 123_000] {
        let labels: Vec<f64> = (0..50).map(|i| series.label_for(i, current)).collect();
        assert!(
            labels.windows(2).all(|pair| pair[0] < pair[1]),
            "labels not increasing at {current}ms"
        );
    }
}

#[test]
fn view_labels_follow_the_series_clock() {
    let mut series = series(3, 1000);
    for value in [10.0, 20.0, 30.0, 40.0] {
        series.append(value);
    }
    let view = series.view();
    assert_eq!(view.values, vec![20.0, 30.0, 40.0]);
    assert_eq!(view.labels, vec![1.0, 2.0, 3.0]);
    assert_eq!(view.elapsed_ms, 4000);
}

#[test]
fn reset_clears_samples_and_clock() {
    let mut series = series(3, 500);
    series.append(1.0);
    series.append(2.0);
    series.reset();
    assert!(series.is_empty());
    assert_eq!(series.elapsed_ms(), 0);
    series.append(3.0);
    assert_eq!(series.samples().next().map(|s| s.elapsed_ms), Some(500));
}
