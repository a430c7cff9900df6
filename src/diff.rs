//! Route change detection between consecutive collection runs.
//!
//! Routes are compared at two granularities. The identity key
//! (`destination/prefix:vrf`) says which logical route a row describes;
//! the signature extends it with protocol, next hop, metric, and
//! administrative distance. A signature present on only one side is a
//! change candidate, and candidates on opposite sides that share an
//! identity key collapse into a single modification instead of an
//! add/remove pair.
//!
//! Counters are always written back to the run, exactly once. Individual
//! [`ChangeRecord`] rows are only emitted when the changed fraction of
//! the table exceeds the configured threshold, so steady-state flap noise
//! stays out of the audit log.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::model::{ChangeKind, ChangeRecord, RouteSnapshot, StoredRoute};
use crate::store::RouteStore;

/// Per-run change counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub added: u64,
    pub removed: u64,
    pub modified: u64,
}

impl ChangeSummary {
    pub fn total(&self) -> u64 {
        self.added + self.removed + self.modified
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl std::fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} added, {} removed, {} modified",
            self.added, self.removed, self.modified
        )
    }
}

/// Which logical route a row describes, regardless of attributes.
fn identity_key(route: &StoredRoute) -> String {
    format!(
        "{}/{}:{}",
        route.destination, route.prefix_length, route.vrf_name
    )
}

/// Identity plus the comparable attributes. Two rows with equal
/// signatures are the same route in the same state.
fn signature(route: &StoredRoute) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        identity_key(route),
        route.protocol,
        route.next_hop.as_deref().unwrap_or(""),
        route.metric.map_or(String::new(), |m| m.to_string()),
        route
            .admin_distance
            .map_or(String::new(), |d| d.to_string()),
    )
}

/// Compares each completed run against the device's previous completed
/// run and records the outcome.
#[derive(Clone)]
pub struct ChangeDetector {
    store: Arc<dyn RouteStore>,
    /// Changed fraction of the table above which change records are kept
    threshold: f64,
}

impl ChangeDetector {
    pub fn new(store: Arc<dyn RouteStore>, threshold: f64) -> Self {
        Self { store, threshold }
    }

    /// Diffs `run_id` against the device's previous completed run and
    /// persists the result. Returns the computed summary.
    pub fn detect_changes(&self, device_id: Uuid, run_id: Uuid) -> Result<ChangeSummary> {
        let Some(current_run) = self.store.get_run(run_id)? else {
            warn!(%run_id, "change detection requested for unknown run");
            return Ok(ChangeSummary::default());
        };

        let current_routes = self.store.routes_for_run(run_id)?;
        let previous =
            self.store
                .previous_completed_run(device_id, current_run.started_at, run_id)?;

        // First run for this device: everything is new, and there is no
        // baseline worth emitting individual records against.
        let Some(previous_run) = previous else {
            let summary = ChangeSummary {
                added: current_routes.len() as u64,
                ..Default::default()
            };
            info!(%device_id, %run_id, %summary, "no baseline run, recording initial snapshot");
            self.store.record_change_results(run_id, &summary, &[])?;
            return Ok(summary);
        };

        let previous_routes = self.store.routes_for_run(previous_run.id)?;
        let (summary, changes) =
            diff_route_sets(device_id, &previous_routes, &current_routes, self.threshold);

        debug!(
            %device_id,
            %run_id,
            baseline = %previous_run.id,
            %summary,
            records = changes.len(),
            "change detection complete"
        );
        self.store.record_change_results(run_id, &summary, &changes)?;
        Ok(summary)
    }
}

/// Pure diff over two route sets. Returns the summary and the change
/// records to persist (empty when the change fraction stays at or below
/// `threshold`).
pub fn diff_route_sets(
    device_id: Uuid,
    previous: &[StoredRoute],
    current: &[StoredRoute],
    threshold: f64,
) -> (ChangeSummary, Vec<ChangeRecord>) {
    // ECMP rows can repeat a signature; the first occurrence represents it.
    let mut current_map: HashMap<String, &StoredRoute> = HashMap::new();
    for route in current {
        current_map.entry(signature(route)).or_insert(route);
    }
    let mut previous_map: HashMap<String, &StoredRoute> = HashMap::new();
    for route in previous {
        previous_map.entry(signature(route)).or_insert(route);
    }

    // Candidates grouped by identity key so attribute changes can be
    // matched up across the two sides.
    let mut added_by_identity: HashMap<String, Vec<&StoredRoute>> = HashMap::new();
    for (sig, &route) in &current_map {
        if !previous_map.contains_key(sig) {
            added_by_identity
                .entry(identity_key(route))
                .or_default()
                .push(route);
        }
    }
    let mut removed_by_identity: HashMap<String, Vec<&StoredRoute>> = HashMap::new();
    for (sig, &route) in &previous_map {
        if !current_map.contains_key(sig) {
            removed_by_identity
                .entry(identity_key(route))
                .or_default()
                .push(route);
        }
    }

    // An added and a removed candidate for the same identity key is one
    // route whose attributes changed. Pair at most one per key; surplus
    // candidates (ECMP path count changes) stay added or removed.
    let mut modified: Vec<(&StoredRoute, &StoredRoute)> = Vec::new();
    for (key, new_candidates) in added_by_identity.iter_mut() {
        if let Some(old_candidates) = removed_by_identity.get_mut(key) {
            if let (Some(new_route), Some(old_route)) = (new_candidates.pop(), old_candidates.pop())
            {
                modified.push((old_route, new_route));
            }
        }
    }

    let mut added: Vec<&StoredRoute> = added_by_identity.into_values().flatten().collect();
    let mut removed: Vec<&StoredRoute> = removed_by_identity.into_values().flatten().collect();
    added.sort_by_key(|&r| signature(r));
    removed.sort_by_key(|&r| signature(r));
    modified.sort_by_key(|&(_, new_route)| signature(new_route));

    let summary = ChangeSummary {
        added: added.len() as u64,
        removed: removed.len() as u64,
        modified: modified.len() as u64,
    };

    let total = current.len().max(1) as f64;
    let change_fraction = summary.total() as f64 / total;
    if change_fraction <= threshold {
        if !summary.is_empty() {
            debug!(
                %device_id,
                %summary,
                change_fraction,
                threshold,
                "changes below threshold, counters only"
            );
        }
        return (summary, Vec::new());
    }

    info!(
        %device_id,
        %summary,
        change_fraction,
        threshold,
        "significant routing table change detected"
    );

    let detected_at = Utc::now();
    let mut changes = Vec::with_capacity(summary.total() as usize);
    for route in added {
        changes.push(ChangeRecord {
            id: Uuid::new_v4(),
            device_id,
            vrf_name: route.vrf_name.clone(),
            change_kind: ChangeKind::Added,
            route_network: route.network(),
            old_values: None,
            new_values: Some(RouteSnapshot::of(route)),
            detected_at,
        });
    }
    for route in removed {
        changes.push(ChangeRecord {
            id: Uuid::new_v4(),
            device_id,
            vrf_name: route.vrf_name.clone(),
            change_kind: ChangeKind::Removed,
            route_network: route.network(),
            old_values: Some(RouteSnapshot::of(route)),
            new_values: None,
            detected_at,
        });
    }
    for (old_route, new_route) in modified {
        changes.push(ChangeRecord {
            id: Uuid::new_v4(),
            device_id,
            vrf_name: new_route.vrf_name.clone(),
            change_kind: ChangeKind::Modified,
            route_network: new_route.network(),
            old_values: Some(RouteSnapshot::of(old_route)),
            new_values: Some(RouteSnapshot::of(new_route)),
            detected_at,
        });
    }

    (summary, changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CollectionRun, Device};
    use crate::parsers::ParsedRoute;
    use crate::store::MemoryStore;

    fn route(
        destination: &str,
        prefix: u8,
        protocol: &str,
        next_hop: Option<&str>,
        vrf: &str,
    ) -> StoredRoute {
        let mut parsed = ParsedRoute::new(destination, prefix, protocol, vrf);
        parsed.next_hop = next_hop.map(str::to_string);
        StoredRoute::from_parsed(&parsed, Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn test_identical_sets_produce_no_changes() {
        let device_id = Uuid::new_v4();
        let a = vec![route("10.1.1.0", 24, "BGP", Some("192.168.1.1"), "default")];
        let b = vec![route("10.1.1.0", 24, "BGP", Some("192.168.1.1"), "default")];
        let (summary, changes) = diff_route_sets(device_id, &a, &b, 0.1);
        assert!(summary.is_empty());
        assert!(changes.is_empty());
    }

    #[test]
    fn test_attribute_change_is_one_modification() {
        let device_id = Uuid::new_v4();
        let previous = vec![route("10.1.1.0", 24, "BGP", Some("192.168.1.1"), "default")];
        let current = vec![route("10.1.1.0", 24, "BGP", Some("192.168.1.2"), "default")];

        // threshold 0 so records are emitted
        let (summary, changes) = diff_route_sets(device_id, &previous, &current, 0.0);
        assert_eq!(summary.added, 0);
        assert_eq!(summary.removed, 0);
        assert_eq!(summary.modified, 1);

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_kind, ChangeKind::Modified);
        assert_eq!(changes[0].route_network, "10.1.1.0/24");
        assert_eq!(
            changes[0].old_values.as_ref().unwrap().next_hop.as_deref(),
            Some("192.168.1.1")
        );
        assert_eq!(
            changes[0].new_values.as_ref().unwrap().next_hop.as_deref(),
            Some("192.168.1.2")
        );
    }

    #[test]
    fn test_same_network_in_different_vrfs_is_add_plus_remove() {
        let device_id = Uuid::new_v4();
        let previous = vec![route("10.1.1.0", 24, "BGP", Some("192.168.1.1"), "CUST_A")];
        let current = vec![route("10.1.1.0", 24, "BGP", Some("192.168.1.1"), "CUST_B")];

        let (summary, _) = diff_route_sets(device_id, &previous, &current, 0.0);
        assert_eq!(summary.added, 1);
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.modified, 0);
    }

    #[test]
    fn test_ecmp_surplus_candidates_stay_added() {
        let device_id = Uuid::new_v4();
        // One path before, two replacement paths after: the pairing
        // consumes one candidate per side, the extra path is an add.
        let previous = vec![route("10.1.1.0", 24, "BGP", Some("192.168.1.1"), "default")];
        let current = vec![
            route("10.1.1.0", 24, "BGP", Some("192.168.1.2"), "default"),
            route("10.1.1.0", 24, "BGP", Some("192.168.1.3"), "default"),
        ];

        let (summary, _) = diff_route_sets(device_id, &previous, &current, 0.0);
        assert_eq!(summary.modified, 1);
        assert_eq!(summary.added, 1);
        assert_eq!(summary.removed, 0);
    }

    #[test]
    fn test_duplicate_rows_collapse_to_one_signature() {
        let device_id = Uuid::new_v4();
        let previous = vec![];
        let current = vec![
            route("10.1.1.0", 24, "BGP", Some("192.168.1.1"), "default"),
            route("10.1.1.0", 24, "BGP", Some("192.168.1.1"), "default"),
        ];
        let (summary, _) = diff_route_sets(device_id, &previous, &current, 0.0);
        assert_eq!(summary.added, 1);
    }

    #[test]
    fn test_threshold_gates_records_but_not_counters() {
        let device_id = Uuid::new_v4();
        // 1 change out of 100 routes: below the default 10% threshold.
        let mut previous: Vec<StoredRoute> = (0..100)
            .map(|i| {
                route(
                    &format!("10.0.{i}.0"),
                    24,
                    "OSPF",
                    Some("192.168.1.1"),
                    "default",
                )
            })
            .collect();
        let mut current = previous.clone();
        current.push(route("10.200.0.0", 16, "BGP", Some("192.168.1.9"), "default"));
        previous.truncate(100);

        let (summary, changes) = diff_route_sets(device_id, &previous, &current, 0.1);
        assert_eq!(summary.added, 1);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_detector_cold_start_counts_everything_added() {
        let store = Arc::new(MemoryStore::new());
        let device = store
            .upsert_device(Device::new("edge1", "192.0.2.1", "cisco"))
            .unwrap();
        let run = store.create_run(CollectionRun::start(device.id)).unwrap();
        let vrf_id = Uuid::new_v4();
        let rows: Vec<StoredRoute> = [
            ParsedRoute::new("10.1.1.0", 24, "BGP", "default"),
            ParsedRoute::new("10.2.0.0", 16, "OSPF", "default"),
        ]
        .iter()
        .map(|p| StoredRoute::from_parsed(p, vrf_id, run.id))
        .collect();
        store.insert_routes(&rows).unwrap();
        store.complete_run(run.id, 2, 1, 0.2).unwrap();

        let detector = ChangeDetector::new(store.clone(), 0.1);
        let summary = detector.detect_changes(device.id, run.id).unwrap();
        assert_eq!(summary.added, 2);
        assert_eq!(summary.removed, 0);

        // Counters land on the run; no records on a cold start.
        let persisted = store.get_run(run.id).unwrap().unwrap();
        assert_eq!(persisted.routes_added, 2);
        let changes = store
            .changes_since(Some(device.id), Utc::now() - chrono::Duration::hours(1), 100)
            .unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn test_detector_unknown_run_is_zero_summary() {
        let store = Arc::new(MemoryStore::new());
        let detector = ChangeDetector::new(store, 0.1);
        let summary = detector
            .detect_changes(Uuid::new_v4(), Uuid::new_v4())
            .unwrap();
        assert!(summary.is_empty());
    }

    #[test]
    fn test_detector_end_to_end_with_baseline() {
        let store = Arc::new(MemoryStore::new());
        let device = store
            .upsert_device(Device::new("edge1", "192.0.2.1", "cisco"))
            .unwrap();
        let vrf_id = Uuid::new_v4();

        let first = store.create_run(CollectionRun::start(device.id)).unwrap();
        let baseline = [
            route("10.1.1.0", 24, "BGP", Some("192.168.1.1"), "default"),
            route("10.2.0.0", 16, "OSPF", Some("192.168.1.1"), "default"),
        ]
        .map(|mut r| {
            r.collection_run_id = first.id;
            r.vrf_id = vrf_id;
            r
        });
        store.insert_routes(&baseline).unwrap();
        store.complete_run(first.id, 2, 1, 0.2).unwrap();

        let detector = ChangeDetector::new(store.clone(), 0.1);
        detector.detect_changes(device.id, first.id).unwrap();

        let second = store.create_run(CollectionRun::start(device.id)).unwrap();
        let snapshot = [
            route("10.1.1.0", 24, "BGP", Some("192.168.1.1"), "default"),
            route("10.3.0.0", 16, "STATIC", Some("192.168.1.254"), "default"),
        ]
        .map(|mut r| {
            r.collection_run_id = second.id;
            r.vrf_id = vrf_id;
            r
        });
        store.insert_routes(&snapshot).unwrap();
        store.complete_run(second.id, 2, 1, 0.2).unwrap();

        let summary = detector.detect_changes(device.id, second.id).unwrap();
        assert_eq!(summary.added, 1);
        assert_eq!(summary.removed, 1);

        // 2 changes over 2 routes clears the 10% threshold: records exist.
        let changes = store
            .changes_since(Some(device.id), Utc::now() - chrono::Duration::hours(1), 100)
            .unwrap();
        assert_eq!(changes.len(), 2);
    }
}
