mod support;

use std::collections::HashSet;

use sim_core::engine::{Engine, StopHandle, StopReason};
use sim_core::entity::Stage;
use sim_core::observer::{observer_channel, SimNotification};
use sim_core::runner::{run_service_center, run_with_observer, spawn_simulation};
use sim_core::service_center::{ServiceCenterModel, ServiceCenterParams};
use sim_core::telemetry::SimSnapshotConfig;

use support::params::{busy_params, constant_params};
use support::stepping::step_to_end;

#[test]
fn population_is_conserved_after_every_tick() {
    let params = busy_params(11);
    let model = ServiceCenterModel::new(&params).unwrap();
    let mut engine = Engine::new(model, params.engine_config()).unwrap();

    let mut ticks = 0;
    step_to_end(&mut engine, |_, model| {
        ticks += 1;
        let in_points: u64 = [Stage::Reception, Stage::Mechanic, Stage::Wash]
            .iter()
            .map(|s| model.point(*s).in_service_point() as u64)
            .sum();
        assert_eq!(model.customers_in_system(), in_points);
        assert_eq!(
            model.customers_created(),
            model.customers_departed() + model.customers_in_system()
        );
    });
    assert!(ticks > 100);
}

#[test]
fn every_customer_is_in_exactly_one_place() {
    let params = busy_params(5);
    let model = ServiceCenterModel::new(&params).unwrap();
    let mut engine = Engine::new(model, params.engine_config()).unwrap();

    step_to_end(&mut engine, |_, model| {
        let mut seen = HashSet::new();
        for customer in model.customers() {
            assert!(seen.insert(customer.id), "{} held twice", customer.id);
        }
        for stage in [Stage::Reception, Stage::Mechanic, Stage::Wash] {
            let point = model.point(stage);
            assert!(point.busy_server_count() <= point.capacity());
        }
    });
}

#[test]
fn same_seed_reproduces_the_run() {
    let a = run_service_center(&busy_params(77)).unwrap();
    let b = run_service_center(&busy_params(77)).unwrap();
    assert_eq!(a.summary, b.summary);
    assert_eq!(a.report, b.report);
    assert_eq!(a.telemetry.departed, b.telemetry.departed);

    let c = run_service_center(&busy_params(78)).unwrap();
    assert_ne!(a.report, c.report);
}

#[test]
fn constant_pipeline_matches_hand_computed_times() {
    let outcome = run_service_center(&constant_params().with_duration(25.0)).unwrap();

    // Customer 1: reception 0..4, mechanic 4..16, wash 16..24.
    let first = &outcome.telemetry.departed[0];
    assert_eq!(first.id, 1);
    assert_eq!(first.departure_time, 24.0);
    assert_eq!(first.reception_wait, Some(0.0));
    assert_eq!(first.mechanic_service, Some(12.0));
    assert_eq!(first.wash_service, Some(8.0));

    // Customer 2 arrives at 10 and waits for the mechanic until 16.
    assert_eq!(outcome.report.customers_departed, 1);
    let mechanic = outcome.report.service_point("Mechanic").unwrap();
    assert_eq!(mechanic.served, 1);
    assert_eq!(outcome.summary.stop_reason, StopReason::HorizonReached);
}

#[test]
fn waits_are_never_negative() {
    let outcome = run_service_center(&busy_params(3)).unwrap();
    for record in &outcome.telemetry.departed {
        for wait in [record.reception_wait, record.mechanic_wait, record.wash_wait]
            .into_iter()
            .flatten()
        {
            assert!(wait >= 0.0);
        }
        assert!(record.departure_time >= record.arrival_time);
    }
    for point in &outcome.report.service_points {
        assert!(point.avg_wait >= 0.0);
        assert!((0.0..=1.0).contains(&point.utilization), "{point:?}");
    }
}

#[test]
fn faster_mechanics_shorten_service() {
    let base = busy_params(21).with_mechanics(2);
    let slow = run_service_center(&base.clone().with_mechanic_speed_factors(vec![1.0, 1.0])).unwrap();
    let fast = run_service_center(&base.with_mechanic_speed_factors(vec![3.0, 3.0])).unwrap();
    let slow_avg = slow.report.service_point("Mechanic").unwrap().avg_service;
    let fast_avg = fast.report.service_point("Mechanic").unwrap().avg_service;
    assert!(fast_avg < slow_avg, "fast {fast_avg} vs slow {slow_avg}");
}

#[test]
fn wash_program_counts_cover_every_wash_customer() {
    let params = busy_params(8).with_routing_probabilities(0.0, 1.0);
    let outcome = run_service_center(&params).unwrap();
    let counts = outcome.report.wash_programs;
    assert_eq!(
        counts.exterior + counts.interior + counts.both,
        outcome.report.customers_created
    );
    assert!(counts.exterior > counts.both);
}

#[test]
fn reports_are_idempotent() {
    let params = busy_params(2);
    let model = ServiceCenterModel::new(&params).unwrap();
    let mut engine = Engine::new(model, params.engine_config()).unwrap();
    let summary = engine.run().unwrap();
    let first = engine.model().report(summary.end_time);
    let second = engine.model().report(summary.end_time);
    assert_eq!(first, second);
    assert_eq!(engine.model().final_report(), Some(&first));
}

#[test]
fn observer_sees_every_arrival_move_and_departure() {
    let params = busy_params(4).with_duration(600.0);
    let (observer, rx) = observer_channel();
    let outcome = run_with_observer(&params, observer, StopHandle::new()).unwrap();
    let notes: Vec<_> = rx.try_iter().collect();

    let created = notes
        .iter()
        .filter(|n| matches!(n, SimNotification::EntityCreated { .. }))
        .count() as u64;
    let departed = notes
        .iter()
        .filter(|n| matches!(n, SimNotification::EntityDeparted { .. }))
        .count() as u64;
    let arrivals_at_reception = notes
        .iter()
        .filter(|n| matches!(n, SimNotification::EntityMoved { from: None, to: Stage::Reception, .. }))
        .count() as u64;
    assert_eq!(created, outcome.report.customers_created);
    assert_eq!(departed, outcome.report.customers_departed);
    assert_eq!(arrivals_at_reception, created);
    assert!(notes
        .iter()
        .any(|n| matches!(n, SimNotification::QueueSnapshot { points, .. } if points.len() == 3)));
    match notes.last() {
        Some(SimNotification::Finished { end_time, report }) => {
            assert_eq!(*end_time, outcome.summary.end_time);
            assert_eq!(**report, outcome.report);
        }
        other => panic!("expected Finished last, got {other:?}"),
    }
}

#[test]
fn snapshots_follow_configured_interval() {
    let params = busy_params(6).with_snapshots(SimSnapshotConfig {
        interval: 100.0,
        max_snapshots: 1_000,
    });
    let outcome = run_service_center(&params).unwrap();
    let snapshots = &outcome.snapshots.snapshots;
    assert!(snapshots.len() >= 20);
    for pair in snapshots.iter().collect::<Vec<_>>().windows(2) {
        assert!(pair[1].timestamp - pair[0].timestamp >= 100.0);
    }
    for snapshot in snapshots {
        assert_eq!(
            snapshot.counts.created,
            snapshot.counts.departed + snapshot.counts.in_system
        );
    }
}

#[test]
fn stopping_a_spawned_run_cancels_it() {
    let params = ServiceCenterParams::default()
        .with_duration(1.0e9)
        .with_pacing_ms(1);
    let (handle, _rx) = spawn_simulation(params);
    std::thread::sleep(std::time::Duration::from_millis(20));
    handle.stop();
    let outcome = handle.join().unwrap();
    assert_eq!(outcome.summary.stop_reason, StopReason::Cancelled);
    assert_eq!(
        outcome.report.customers_created,
        outcome.report.customers_departed + outcome.report.customers_in_system
    );
}
