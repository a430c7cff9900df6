//! Change detection scenarios across multiple collection runs.

use std::sync::Arc;

use routewatch::diff::{diff_route_sets, ChangeDetector};
use routewatch::model::{ChangeKind, CollectionRun, Device, StoredRoute};
use routewatch::parsers::ParsedRoute;
use routewatch::store::{MemoryStore, RouteStore};
use uuid::Uuid;

fn route(
    destination: &str,
    prefix: u8,
    protocol: &str,
    next_hop: &str,
    metric: i64,
    vrf: &str,
) -> ParsedRoute {
    let mut parsed = ParsedRoute::new(destination, prefix, protocol, vrf);
    parsed.next_hop = Some(next_hop.to_string());
    parsed.metric = Some(metric);
    parsed
}

fn persist_run(
    store: &MemoryStore,
    device: &Device,
    vrf_id: Uuid,
    routes: &[ParsedRoute],
) -> CollectionRun {
    let run = store.create_run(CollectionRun::start(device.id)).unwrap();
    let rows: Vec<StoredRoute> = routes
        .iter()
        .map(|p| StoredRoute::from_parsed(p, vrf_id, run.id))
        .collect();
    store.insert_routes(&rows).unwrap();
    store
        .complete_run(run.id, rows.len() as u64, 1, 0.1)
        .unwrap();
    store.get_run(run.id).unwrap().unwrap()
}

#[test]
fn consecutive_runs_diff_against_the_right_baseline() {
    let store = Arc::new(MemoryStore::new());
    let device = store
        .upsert_device(Device::new("edge1", "192.0.2.1", "cisco"))
        .unwrap();
    let vrf_id = Uuid::new_v4();
    let detector = ChangeDetector::new(Arc::clone(&store) as Arc<dyn RouteStore>, 0.1);

    let base = vec![
        route("10.1.1.0", 24, "BGP", "192.168.1.1", 0, "default"),
        route("10.2.0.0", 16, "OSPF", "192.168.1.2", 20, "default"),
    ];
    let first = persist_run(&store, &device, vrf_id, &base);
    let summary = detector.detect_changes(device.id, first.id).unwrap();
    assert_eq!(summary.added, 2);

    // Second run: one route gone, one new.
    let next = vec![
        route("10.1.1.0", 24, "BGP", "192.168.1.1", 0, "default"),
        route("10.3.0.0", 16, "STATIC", "192.168.1.254", 0, "default"),
    ];
    let second = persist_run(&store, &device, vrf_id, &next);
    let summary = detector.detect_changes(device.id, second.id).unwrap();
    assert_eq!(summary.added, 1);
    assert_eq!(summary.removed, 1);
    assert_eq!(summary.modified, 0);

    // Third run identical to the second: clean diff against run two, not
    // run one.
    let third = persist_run(&store, &device, vrf_id, &next);
    let summary = detector.detect_changes(device.id, third.id).unwrap();
    assert!(summary.is_empty());
}

#[test]
fn failed_runs_are_not_used_as_baselines() {
    let store = Arc::new(MemoryStore::new());
    let device = store
        .upsert_device(Device::new("edge1", "192.0.2.1", "cisco"))
        .unwrap();
    let vrf_id = Uuid::new_v4();
    let detector = ChangeDetector::new(Arc::clone(&store) as Arc<dyn RouteStore>, 0.0);

    let base = vec![route("10.1.1.0", 24, "BGP", "192.168.1.1", 0, "default")];
    let first = persist_run(&store, &device, vrf_id, &base);
    detector.detect_changes(device.id, first.id).unwrap();

    // A failed run in between must be skipped when picking the baseline.
    let failed = store.create_run(CollectionRun::start(device.id)).unwrap();
    store.fail_run(failed.id, "connection refused").unwrap();

    let second = persist_run(&store, &device, vrf_id, &base);
    let summary = detector.detect_changes(device.id, second.id).unwrap();
    assert!(summary.is_empty());
}

#[test]
fn devices_are_diffed_independently() {
    let store = Arc::new(MemoryStore::new());
    let edge1 = store
        .upsert_device(Device::new("edge1", "192.0.2.1", "cisco"))
        .unwrap();
    let edge2 = store
        .upsert_device(Device::new("edge2", "192.0.2.2", "juniper"))
        .unwrap();
    let vrf1 = Uuid::new_v4();
    let vrf2 = Uuid::new_v4();
    let detector = ChangeDetector::new(Arc::clone(&store) as Arc<dyn RouteStore>, 0.1);

    let routes = vec![route("10.1.1.0", 24, "BGP", "192.168.1.1", 0, "default")];
    let run1 = persist_run(&store, &edge1, vrf1, &routes);
    detector.detect_changes(edge1.id, run1.id).unwrap();

    // edge2's first run is a cold start even though edge1 already has
    // history with the same routes.
    let run2 = persist_run(&store, &edge2, vrf2, &routes);
    let summary = detector.detect_changes(edge2.id, run2.id).unwrap();
    assert_eq!(summary.added, 1);
}

#[test]
fn change_fraction_exactly_at_threshold_keeps_records_out() {
    let device_id = Uuid::new_v4();
    let vrf_id = Uuid::new_v4();
    let run_id = Uuid::new_v4();
    let stored = |p: &ParsedRoute| StoredRoute::from_parsed(p, vrf_id, run_id);

    // 10 routes, 1 change, threshold 0.1: the fraction equals the
    // threshold and must not trigger record emission.
    let previous: Vec<StoredRoute> = (0..10)
        .map(|i| {
            stored(&route(
                &format!("10.0.{i}.0"),
                24,
                "OSPF",
                "192.168.1.1",
                20,
                "default",
            ))
        })
        .collect();
    let mut current = previous.clone();
    current[0].metric = Some(30);

    let (summary, changes) = diff_route_sets(device_id, &previous, &current, 0.1);
    assert_eq!(summary.modified, 1);
    assert!(changes.is_empty());

    // Just above the threshold the records appear.
    let (summary, changes) = diff_route_sets(device_id, &previous, &current, 0.09);
    assert_eq!(summary.modified, 1);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].change_kind, ChangeKind::Modified);
}

#[test]
fn modified_records_carry_both_snapshots() {
    let device_id = Uuid::new_v4();
    let vrf_id = Uuid::new_v4();
    let run_id = Uuid::new_v4();
    let stored = |p: &ParsedRoute| StoredRoute::from_parsed(p, vrf_id, run_id);

    let previous = vec![stored(&route(
        "10.1.1.0",
        24,
        "OSPF",
        "192.168.1.1",
        20,
        "default",
    ))];
    let current = vec![stored(&route(
        "10.1.1.0",
        24,
        "OSPF",
        "192.168.1.1",
        45,
        "default",
    ))];

    let (_, changes) = diff_route_sets(device_id, &previous, &current, 0.0);
    assert_eq!(changes.len(), 1);
    let change = &changes[0];
    assert_eq!(change.change_kind, ChangeKind::Modified);
    assert_eq!(change.old_values.as_ref().unwrap().metric, Some(20));
    assert_eq!(change.new_values.as_ref().unwrap().metric, Some(45));
    assert_eq!(change.vrf_name, "default");
}

#[test]
fn protocol_change_on_same_prefix_is_a_modification() {
    let device_id = Uuid::new_v4();
    let vrf_id = Uuid::new_v4();
    let run_id = Uuid::new_v4();
    let stored = |p: &ParsedRoute| StoredRoute::from_parsed(p, vrf_id, run_id);

    // A static route replaced by a BGP route for the same prefix is one
    // logical route changing hands, not an add plus a remove.
    let previous = vec![stored(&route(
        "10.1.1.0",
        24,
        "STATIC",
        "192.168.1.254",
        0,
        "default",
    ))];
    let current = vec![stored(&route(
        "10.1.1.0",
        24,
        "BGP",
        "192.168.1.1",
        0,
        "default",
    ))];

    let (summary, _) = diff_route_sets(device_id, &previous, &current, 0.0);
    assert_eq!(summary.modified, 1);
    assert_eq!(summary.added, 0);
    assert_eq!(summary.removed, 0);
}
