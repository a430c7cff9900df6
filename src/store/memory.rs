//! In-memory [`RouteStore`] with optional JSON file persistence.
//!
//! All state lives behind one `RwLock`; every mutating call flushes the
//! whole snapshot to disk when a path is configured. That keeps writes
//! for a device trivially serialized and makes restarts cheap for the
//! inventory sizes this tool targets.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::diff::ChangeSummary;
use crate::error::{Error, Result};
use crate::model::{ChangeRecord, CollectionRun, Device, RunStatus, StoredRoute, VrfRecord};
use crate::parsers::VrfInfo;
use crate::store::{RouteQuery, RouteStore};

#[derive(Debug, Default, Serialize, Deserialize)]
struct State {
    devices: HashMap<Uuid, Device>,
    vrfs: HashMap<Uuid, VrfRecord>,
    runs: HashMap<Uuid, CollectionRun>,
    routes: Vec<StoredRoute>,
    changes: Vec<ChangeRecord>,
    /// Runs whose change counters have been written
    processed_runs: Vec<Uuid>,
}

/// In-memory store, optionally backed by a JSON snapshot file.
pub struct MemoryStore {
    state: RwLock<State>,
    path: Option<PathBuf>,
}

impl MemoryStore {
    /// A purely in-memory store. Nothing survives the process.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            path: None,
        }
    }

    /// Opens a file-backed store, loading the snapshot if the file exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            State::default()
        };
        Ok(Self {
            state: RwLock::new(state),
            path: Some(path),
        })
    }

    fn flush(&self, state: &State) -> Result<()> {
        if let Some(path) = &self.path {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let raw = serde_json::to_string_pretty(state)?;
            std::fs::write(path, raw)?;
        }
        Ok(())
    }

    fn device_id_for(&self, hostname: &str) -> Result<Uuid> {
        let state = self.state.read();
        state
            .devices
            .values()
            .find(|d| d.hostname == hostname)
            .map(|d| d.id)
            .ok_or_else(|| Error::DeviceNotFound(hostname.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteStore for MemoryStore {
    fn upsert_device(&self, device: Device) -> Result<Device> {
        let mut state = self.state.write();
        let existing = state
            .devices
            .values_mut()
            .find(|d| d.hostname == device.hostname);
        let device = match existing {
            Some(row) => {
                row.address = device.address;
                row.platform = device.platform;
                row.location = device.location;
                row.is_active = device.is_active;
                row.clone()
            }
            None => {
                state.devices.insert(device.id, device.clone());
                device
            }
        };
        self.flush(&state)?;
        Ok(device)
    }

    fn get_device(&self, hostname: &str) -> Result<Option<Device>> {
        let state = self.state.read();
        Ok(state
            .devices
            .values()
            .find(|d| d.hostname == hostname)
            .cloned())
    }

    fn list_devices(&self) -> Result<Vec<Device>> {
        let state = self.state.read();
        let mut devices: Vec<Device> = state.devices.values().cloned().collect();
        devices.sort_by(|a, b| a.hostname.cmp(&b.hostname));
        Ok(devices)
    }

    fn touch_device(&self, device_id: Uuid, seen_at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.write();
        if let Some(device) = state.devices.get_mut(&device_id) {
            device.last_seen = Some(seen_at);
        }
        self.flush(&state)
    }

    fn upsert_vrf(&self, device_id: Uuid, vrf: &VrfInfo) -> Result<VrfRecord> {
        let mut state = self.state.write();
        if let Some(row) = state
            .vrfs
            .values()
            .find(|v| v.device_id == device_id && v.name == vrf.name)
        {
            return Ok(row.clone());
        }
        let row = VrfRecord {
            id: Uuid::new_v4(),
            device_id,
            name: vrf.name.clone(),
            rd: vrf.rd.clone(),
            description: vrf.description.clone(),
            created_at: Utc::now(),
        };
        state.vrfs.insert(row.id, row.clone());
        self.flush(&state)?;
        Ok(row)
    }

    fn create_run(&self, run: CollectionRun) -> Result<CollectionRun> {
        let mut state = self.state.write();
        state.runs.insert(run.id, run.clone());
        self.flush(&state)?;
        Ok(run)
    }

    fn get_run(&self, run_id: Uuid) -> Result<Option<CollectionRun>> {
        let state = self.state.read();
        Ok(state.runs.get(&run_id).cloned())
    }

    fn complete_run(
        &self,
        run_id: Uuid,
        total_routes: u64,
        total_vrfs: u64,
        processing_time: f64,
    ) -> Result<()> {
        let mut state = self.state.write();
        let run = state
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| Error::Storage(format!("unknown collection run {run_id}")))?;
        run.status = RunStatus::Completed;
        run.completed_at = Some(Utc::now());
        run.total_routes = total_routes;
        run.total_vrfs = total_vrfs;
        run.processing_time = Some(processing_time);
        self.flush(&state)
    }

    fn fail_run(&self, run_id: Uuid, error_message: &str) -> Result<()> {
        let mut state = self.state.write();
        let run = state
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| Error::Storage(format!("unknown collection run {run_id}")))?;
        run.status = RunStatus::Failed;
        run.completed_at = Some(Utc::now());
        run.error_message = Some(error_message.to_string());
        self.flush(&state)
    }

    fn insert_routes(&self, routes: &[StoredRoute]) -> Result<()> {
        let mut state = self.state.write();
        state.routes.extend_from_slice(routes);
        self.flush(&state)
    }

    fn routes_for_run(&self, run_id: Uuid) -> Result<Vec<StoredRoute>> {
        let state = self.state.read();
        Ok(state
            .routes
            .iter()
            .filter(|r| r.collection_run_id == run_id)
            .cloned()
            .collect())
    }

    fn latest_completed_run(&self, device_id: Uuid) -> Result<Option<CollectionRun>> {
        let state = self.state.read();
        Ok(state
            .runs
            .values()
            .filter(|r| r.device_id == device_id && r.status == RunStatus::Completed)
            .max_by_key(|r| r.started_at)
            .cloned())
    }

    fn previous_completed_run(
        &self,
        device_id: Uuid,
        before: DateTime<Utc>,
        excluding: Uuid,
    ) -> Result<Option<CollectionRun>> {
        let state = self.state.read();
        Ok(state
            .runs
            .values()
            .filter(|r| {
                r.device_id == device_id
                    && r.status == RunStatus::Completed
                    && r.id != excluding
                    && r.started_at < before
            })
            .max_by_key(|r| r.started_at)
            .cloned())
    }

    fn run_history(&self, device_id: Uuid, limit: usize) -> Result<Vec<CollectionRun>> {
        let state = self.state.read();
        let mut runs: Vec<CollectionRun> = state
            .runs
            .values()
            .filter(|r| r.device_id == device_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit);
        Ok(runs)
    }

    fn record_change_results(
        &self,
        run_id: Uuid,
        summary: &ChangeSummary,
        changes: &[ChangeRecord],
    ) -> Result<()> {
        let mut state = self.state.write();
        if state.processed_runs.contains(&run_id) {
            return Err(Error::Storage(format!(
                "change counters already recorded for run {run_id}"
            )));
        }
        let run = state
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| Error::Storage(format!("unknown collection run {run_id}")))?;
        run.routes_added = summary.added;
        run.routes_removed = summary.removed;
        run.routes_modified = summary.modified;
        state.changes.extend_from_slice(changes);
        state.processed_runs.push(run_id);
        self.flush(&state).map_err(|err| Error::ChangePersist {
            message: err.to_string(),
            summary: *summary,
        })
    }

    fn changes_since(
        &self,
        device_id: Option<Uuid>,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ChangeRecord>> {
        let state = self.state.read();
        let mut changes: Vec<ChangeRecord> = state
            .changes
            .iter()
            .filter(|c| c.detected_at >= since && device_id.is_none_or(|id| c.device_id == id))
            .cloned()
            .collect();
        changes.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        changes.truncate(limit);
        Ok(changes)
    }

    fn query_routes(&self, query: &RouteQuery) -> Result<Vec<StoredRoute>> {
        let device_ids: Vec<Uuid> = match &query.hostname {
            Some(hostname) => vec![self.device_id_for(hostname)?],
            None => self.list_devices()?.iter().map(|d| d.id).collect(),
        };

        let mut routes = Vec::new();
        for device_id in device_ids {
            let Some(run) = self.latest_completed_run(device_id)? else {
                continue;
            };
            routes.extend(self.routes_for_run(run.id)?.into_iter().filter(|r| {
                query.vrf.as_ref().is_none_or(|v| &r.vrf_name == v)
                    && query
                        .protocol
                        .as_ref()
                        .is_none_or(|p| r.protocol.eq_ignore_ascii_case(p))
            }));
        }
        if let Some(limit) = query.limit {
            routes.truncate(limit);
        }
        Ok(routes)
    }

    fn cleanup_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state.write();
        let stale: Vec<Uuid> = state
            .runs
            .values()
            .filter(|r| r.started_at < cutoff)
            .map(|r| r.id)
            .collect();
        for run_id in &stale {
            state.runs.remove(run_id);
        }
        state
            .routes
            .retain(|r| !stale.contains(&r.collection_run_id));
        state.changes.retain(|c| c.detected_at >= cutoff);
        state.processed_runs.retain(|id| !stale.contains(id));
        self.flush(&state)?;
        Ok(stale.len() as u64)
    }
}
