//! Collection pipeline: command transport, per-device collection, and the
//! bounded fan-out across the inventory.
//!
//! A collection cycle for one device is strictly sequential: VRF
//! discovery, then one routing table per VRF, all persisted under a
//! single [`CollectionRun`]. Devices run concurrently up to the worker
//! ceiling; one device failing marks only its own run failed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::diff::{ChangeDetector, ChangeSummary};
use crate::error::{Error, Result};
use crate::model::{CollectionRun, Device, StoredRoute};
use crate::parsers::{ParsedRoute, Platform, VrfInfo};
use crate::store::RouteStore;

/// Obtains CLI command output from a device.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    async fn send_command(&self, device: &Device, command: &str) -> Result<String>;
}

/// Transport that replays captured command output from disk. Each device
/// gets a directory named after its hostname, each command a text file
/// named after the sanitized command string.
///
/// `show ip route vrf CUST_A` for device `edge1` resolves to
/// `<root>/edge1/show_ip_route_vrf_CUST_A.txt`.
pub struct FileTransport {
    root: PathBuf,
}

impl FileTransport {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Maps a command string to its capture filename.
    pub fn capture_filename(command: &str) -> String {
        let sanitized: String = command
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("{sanitized}.txt")
    }
}

#[async_trait]
impl DeviceTransport for FileTransport {
    async fn send_command(&self, device: &Device, command: &str) -> Result<String> {
        let path = self
            .root
            .join(&device.hostname)
            .join(Self::capture_filename(command));
        tokio::fs::read_to_string(&path).await.map_err(|err| {
            Error::command_failed(
                &device.hostname,
                command,
                format!("no capture at {}: {err}", path.display()),
            )
        })
    }
}

/// Result of one successful device collection.
#[derive(Debug, Clone)]
pub struct CollectionReport {
    pub run_id: Uuid,
    pub total_routes: u64,
    pub total_vrfs: u64,
    pub processing_time: f64,
    /// Present when change detection ran and its results were persisted
    pub changes: Option<ChangeSummary>,
}

/// Drives collection cycles against the device inventory.
pub struct Collector {
    store: Arc<dyn RouteStore>,
    transport: Arc<dyn DeviceTransport>,
    detector: Option<ChangeDetector>,
    max_workers: usize,
    /// Fetch the BGP table per VRF to enrich BGP routes with path detail
    bgp_detail: bool,
}

impl Collector {
    pub fn new(
        store: Arc<dyn RouteStore>,
        transport: Arc<dyn DeviceTransport>,
        detector: Option<ChangeDetector>,
        max_workers: usize,
        bgp_detail: bool,
    ) -> Self {
        Self {
            store,
            transport,
            detector,
            max_workers: max_workers.max(1),
            bgp_detail,
        }
    }

    /// Runs one collection cycle for one device. The run is marked failed
    /// (not left dangling) on any error after it was opened.
    pub async fn collect_device(&self, device: &Device) -> Result<CollectionReport> {
        let started = Instant::now();
        let run = self.store.create_run(CollectionRun::start(device.id))?;
        info!(device = %device.hostname, run_id = %run.id, "starting collection");

        match self.collect_into_run(device, run.id).await {
            Ok((total_routes, total_vrfs)) => {
                let processing_time = started.elapsed().as_secs_f64();
                self.store
                    .complete_run(run.id, total_routes, total_vrfs, processing_time)?;
                self.store.touch_device(device.id, chrono::Utc::now())?;
                info!(
                    device = %device.hostname,
                    run_id = %run.id,
                    total_routes,
                    total_vrfs,
                    processing_time,
                    "collection complete"
                );

                let changes = self.run_change_detection(device, run.id);
                Ok(CollectionReport {
                    run_id: run.id,
                    total_routes,
                    total_vrfs,
                    processing_time,
                    changes,
                })
            }
            Err(err) => {
                self.store.fail_run(run.id, &err.to_string())?;
                Err(Error::collection_failed(&device.hostname, err.to_string()))
            }
        }
    }

    /// VRF discovery plus per-VRF table collection, persisted under `run_id`.
    async fn collect_into_run(&self, device: &Device, run_id: Uuid) -> Result<(u64, u64)> {
        let platform = Platform::for_device(&device.hostname, &device.platform)?;
        let parser = platform.parser();

        // VRF discovery failing is not fatal: the implicit default VRF is
        // still collectable.
        let vrfs = match self
            .transport
            .send_command(device, &parser.vrf_list_command())
            .await
        {
            Ok(output) => parser.parse_vrf_list(&output),
            Err(err) => {
                warn!(
                    device = %device.hostname,
                    error = %err,
                    "VRF discovery failed, collecting default VRF only"
                );
                vec![VrfInfo::default_vrf()]
            }
        };

        let mut rows: Vec<StoredRoute> = Vec::new();
        for vrf in &vrfs {
            let vrf_record = self.store.upsert_vrf(device.id, vrf)?;
            let output = self
                .transport
                .send_command(device, &parser.route_table_command(&vrf.name))
                .await?;
            let mut routes = parser.parse_route_table(&output, &vrf.name);

            if self.bgp_detail && routes.iter().any(|r| r.protocol.starts_with("BGP")) {
                self.enrich_bgp_routes(device, parser.as_ref(), &vrf.name, &mut routes)
                    .await;
            }

            debug!(
                device = %device.hostname,
                vrf = %vrf.name,
                route_count = routes.len(),
                "collected VRF"
            );
            rows.extend(
                routes
                    .iter()
                    .map(|parsed| StoredRoute::from_parsed(parsed, vrf_record.id, run_id)),
            );
        }

        self.store.insert_routes(&rows)?;
        Ok((rows.len() as u64, vrfs.len() as u64))
    }

    /// Overlays BGP path attributes from the BGP table onto BGP routes
    /// already parsed from the main table. Failures here lose detail, not
    /// the run.
    async fn enrich_bgp_routes(
        &self,
        device: &Device,
        parser: &dyn crate::parsers::TableParser,
        vrf: &str,
        routes: &mut [ParsedRoute],
    ) {
        let output = match self
            .transport
            .send_command(device, &parser.bgp_table_command(vrf))
            .await
        {
            Ok(output) => output,
            Err(err) => {
                debug!(device = %device.hostname, vrf, error = %err, "no BGP detail available");
                return;
            }
        };

        let detail: std::collections::HashMap<String, ParsedRoute> = parser
            .parse_bgp_table(&output, vrf)
            .into_iter()
            .map(|r| (r.network(), r))
            .collect();

        for route in routes.iter_mut().filter(|r| r.protocol.starts_with("BGP")) {
            if let Some(bgp) = detail.get(&route.network()) {
                if route.as_path.is_none() {
                    route.as_path.clone_from(&bgp.as_path);
                }
                if route.local_preference.is_none() {
                    route.local_preference = bgp.local_preference;
                }
                if route.med.is_none() {
                    route.med = bgp.med;
                }
                if route.communities.is_none() {
                    route.communities.clone_from(&bgp.communities);
                }
                if route.route_type.is_none() {
                    route.route_type.clone_from(&bgp.route_type);
                }
            }
        }
    }

    /// Detection failures never undo a completed collection. A persist
    /// failure still carries the computed summary, so it gets logged.
    fn run_change_detection(&self, device: &Device, run_id: Uuid) -> Option<ChangeSummary> {
        let detector = self.detector.as_ref()?;
        match detector.detect_changes(device.id, run_id) {
            Ok(summary) => Some(summary),
            Err(err) => {
                match err.change_summary() {
                    Some(summary) => warn!(
                        device = %device.hostname,
                        %summary,
                        error = %err,
                        "change results not persisted"
                    ),
                    None => warn!(
                        device = %device.hostname,
                        error = %err,
                        "change detection failed"
                    ),
                }
                None
            }
        }
    }

    /// Collects every device concurrently, bounded by the worker ceiling.
    /// Returns per-device outcomes in no particular order.
    pub async fn collect_all(
        self: &Arc<Self>,
        devices: Vec<Device>,
    ) -> Vec<(String, Result<CollectionReport>)> {
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut tasks = JoinSet::new();

        for device in devices {
            let collector = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                // Semaphore is never closed while tasks hold it.
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let outcome = collector.collect_device(&device).await;
                (device.hostname, outcome)
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => outcomes.push((
                    "<unknown>".to_string(),
                    Err(Error::Internal(format!("collection task panicked: {err}"))),
                )),
            }
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_filename_sanitizes_commands() {
        assert_eq!(
            FileTransport::capture_filename("show ip route vrf CUST-A"),
            "show_ip_route_vrf_CUST_A.txt"
        );
        assert_eq!(
            FileTransport::capture_filename("display ip routing-table"),
            "display_ip_routing_table.txt"
        );
    }
}
