//! Persistence seam for collected routing state.
//!
//! [`RouteStore`] is the single interface the collector, the change
//! detection engine, and the CLI read paths talk to. Implementations must
//! keep writes for one device serialized per collection run: the engine
//! assumes that once a run is completed, its route set no longer grows.
//! Concurrency across devices is the caller's business.

pub mod memory;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::diff::ChangeSummary;
use crate::error::Result;
use crate::model::{ChangeRecord, CollectionRun, Device, StoredRoute, VrfRecord};
use crate::parsers::VrfInfo;

pub use memory::MemoryStore;

/// Filter for route read queries. Empty filter returns the latest
/// completed snapshot for every device.
#[derive(Debug, Clone, Default)]
pub struct RouteQuery {
    pub hostname: Option<String>,
    pub vrf: Option<String>,
    pub protocol: Option<String>,
    pub limit: Option<usize>,
}

/// Storage operations for devices, runs, routes, and change history.
pub trait RouteStore: Send + Sync {
    /// Creates the device or refreshes its address/platform/location if a
    /// row with the same hostname already exists.
    fn upsert_device(&self, device: Device) -> Result<Device>;

    fn get_device(&self, hostname: &str) -> Result<Option<Device>>;

    fn list_devices(&self) -> Result<Vec<Device>>;

    /// Stamps the device's `last_seen` after a successful collection.
    fn touch_device(&self, device_id: Uuid, seen_at: DateTime<Utc>) -> Result<()>;

    /// Creates the VRF or returns the existing row for (device, name).
    fn upsert_vrf(&self, device_id: Uuid, vrf: &VrfInfo) -> Result<VrfRecord>;

    /// Opens a new run in `Running` state.
    fn create_run(&self, run: CollectionRun) -> Result<CollectionRun>;

    fn get_run(&self, run_id: Uuid) -> Result<Option<CollectionRun>>;

    /// Marks a run `Completed` and records its totals.
    fn complete_run(
        &self,
        run_id: Uuid,
        total_routes: u64,
        total_vrfs: u64,
        processing_time: f64,
    ) -> Result<()>;

    /// Marks a run `Failed` with the failure message.
    fn fail_run(&self, run_id: Uuid, error_message: &str) -> Result<()>;

    /// Appends route rows. Rows are immutable once written.
    fn insert_routes(&self, routes: &[StoredRoute]) -> Result<()>;

    /// All routes persisted under one run.
    fn routes_for_run(&self, run_id: Uuid) -> Result<Vec<StoredRoute>>;

    /// The most recent `Completed` run for a device, if any.
    fn latest_completed_run(&self, device_id: Uuid) -> Result<Option<CollectionRun>>;

    /// The most recent `Completed` run for a device that started strictly
    /// before `before`, excluding the run `excluding`. This is the
    /// baseline lookup for change detection.
    fn previous_completed_run(
        &self,
        device_id: Uuid,
        before: DateTime<Utc>,
        excluding: Uuid,
    ) -> Result<Option<CollectionRun>>;

    /// Recent runs for a device, newest first.
    fn run_history(&self, device_id: Uuid, limit: usize) -> Result<Vec<CollectionRun>>;

    /// Writes a run's change counters and appends its change records in
    /// one operation. Counters for a run are written exactly once.
    fn record_change_results(
        &self,
        run_id: Uuid,
        summary: &ChangeSummary,
        changes: &[ChangeRecord],
    ) -> Result<()>;

    /// Change records newer than `since`, optionally for one device,
    /// newest first.
    fn changes_since(
        &self,
        device_id: Option<Uuid>,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ChangeRecord>>;

    /// Latest completed snapshot routes matching the filter.
    fn query_routes(&self, query: &RouteQuery) -> Result<Vec<StoredRoute>>;

    /// Deletes runs (and their routes) and change records older than
    /// `cutoff`. Returns the number of runs removed.
    fn cleanup_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}
