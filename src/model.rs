//! Persisted records shared by the collector, the store, and the change
//! detection engine.
//!
//! Stored rows are immutable once written: a changed route shows up as a
//! new [`StoredRoute`] under a new [`CollectionRun`], never as an update
//! in place, and [`ChangeRecord`] rows are append-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::parsers::ParsedRoute;

/// A router under collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: Uuid,
    /// Unique hostname
    pub hostname: String,
    /// Management address
    pub address: String,
    /// Platform tag ("cisco", "juniper", "huawei")
    pub platform: String,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_seen: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl Device {
    pub fn new(
        hostname: impl Into<String>,
        address: impl Into<String>,
        platform: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            hostname: hostname.into(),
            address: address.into(),
            platform: platform.into(),
            location: None,
            created_at: Utc::now(),
            last_seen: None,
            is_active: true,
        }
    }
}

/// A VRF discovered on a device. Unique per (device, name).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VrfRecord {
    pub id: Uuid,
    pub device_id: Uuid,
    pub name: String,
    pub rd: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One persisted route row, owned by a VRF and a collection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRoute {
    pub id: Uuid,
    pub vrf_id: Uuid,
    /// Owning VRF name, denormalized for keying and display
    pub vrf_name: String,
    pub collection_run_id: Uuid,
    pub destination: String,
    pub prefix_length: u8,
    pub next_hop: Option<String>,
    pub protocol: String,
    pub metric: Option<i64>,
    pub admin_distance: Option<i64>,
    pub interface: Option<String>,
    pub as_path: Option<String>,
    pub local_preference: Option<i64>,
    pub med: Option<i64>,
    pub communities: Option<Vec<String>>,
    pub route_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StoredRoute {
    /// Builds a stored row from a parser record. Many rows may share the
    /// same (destination, prefix, VRF) when a device load-balances across
    /// multiple next hops; that multiplicity is preserved.
    pub fn from_parsed(parsed: &ParsedRoute, vrf_id: Uuid, collection_run_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            vrf_id,
            vrf_name: parsed.vrf.clone(),
            collection_run_id,
            destination: parsed.destination.clone(),
            prefix_length: parsed.prefix_length,
            next_hop: parsed.next_hop.clone(),
            protocol: parsed.protocol.clone(),
            metric: parsed.metric,
            admin_distance: parsed.admin_distance,
            interface: parsed.interface.clone(),
            as_path: parsed.as_path.clone(),
            local_preference: parsed.local_preference,
            med: parsed.med,
            communities: parsed.communities.clone(),
            route_type: parsed.route_type.clone(),
            created_at: Utc::now(),
        }
    }

    /// The route's network in CIDR text form.
    pub fn network(&self) -> String {
        format!("{}/{}", self.destination, self.prefix_length)
    }
}

/// Status of a collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One polling attempt against one device, bounding a set of stored
/// routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionRun {
    pub id: Uuid,
    pub device_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub error_message: Option<String>,
    pub total_routes: u64,
    pub total_vrfs: u64,
    /// Seconds spent collecting and parsing
    pub processing_time: Option<f64>,
    /// Change counters, filled in by the diff engine exactly once per run
    pub routes_added: u64,
    pub routes_removed: u64,
    pub routes_modified: u64,
}

impl CollectionRun {
    pub fn start(device_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_id,
            started_at: Utc::now(),
            completed_at: None,
            status: RunStatus::Running,
            error_message: None,
            total_routes: 0,
            total_vrfs: 0,
            processing_time: None,
            routes_added: 0,
            routes_removed: 0,
            routes_modified: 0,
        }
    }
}

/// Kind of a detected route change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Added => write!(f, "added"),
            ChangeKind::Removed => write!(f, "removed"),
            ChangeKind::Modified => write!(f, "modified"),
        }
    }
}

/// Attribute snapshot carried on change records: the comparable subset of
/// a route's attributes at detection time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSnapshot {
    pub protocol: String,
    pub next_hop: Option<String>,
    pub metric: Option<i64>,
    pub admin_distance: Option<i64>,
    pub interface: Option<String>,
}

impl RouteSnapshot {
    pub fn of(route: &StoredRoute) -> Self {
        Self {
            protocol: route.protocol.clone(),
            next_hop: route.next_hop.clone(),
            metric: route.metric,
            admin_distance: route.admin_distance,
            interface: route.interface.clone(),
        }
    }
}

/// Append-only audit record for one detected route change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub id: Uuid,
    pub device_id: Uuid,
    pub vrf_name: String,
    pub change_kind: ChangeKind,
    /// The route's network in CIDR text form
    pub route_network: String,
    /// Present for removed and modified changes
    pub old_values: Option<RouteSnapshot>,
    /// Present for added and modified changes
    pub new_values: Option<RouteSnapshot>,
    pub detected_at: DateTime<Utc>,
}
