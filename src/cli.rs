//! Command-line interface.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use crate::collector::{Collector, FileTransport};
use crate::config::Config;
use crate::diff::ChangeDetector;
use crate::error::{Error, Result};
use crate::model::Device;
use crate::scheduler::Scheduler;
use crate::store::{MemoryStore, RouteQuery, RouteStore};

/// Multi-vendor routing table collector and change monitor.
#[derive(Debug, Parser)]
#[command(name = "routewatch", version, about)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, global = true, env = "ROUTEWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one collection cycle now
    Collect {
        /// Collect a single device instead of the whole inventory
        #[arg(short, long)]
        device: Option<String>,
        /// Parse and report without persisting anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Run the periodic collection scheduler in the foreground
    Scheduler,
    /// List configured devices and their collection state
    Devices,
    /// Show routes from the latest completed snapshots
    Routes {
        #[arg(short, long)]
        device: Option<String>,
        #[arg(long)]
        vrf: Option<String>,
        #[arg(short, long)]
        protocol: Option<String>,
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
    },
    /// Show recent route changes
    Changes {
        #[arg(short, long)]
        device: Option<String>,
        /// Look back this many days
        #[arg(long, default_value_t = 7)]
        days: i64,
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// Show collection statistics per device
    Stats {
        #[arg(short, long)]
        device: Option<String>,
    },
    /// Export the latest route snapshots to a file
    Export {
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
        #[arg(short, long)]
        device: Option<String>,
        #[arg(long)]
        vrf: Option<String>,
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}

/// Executes the parsed command.
pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    match cli.command {
        Command::Collect { device, dry_run } => collect(&config, device, dry_run).await,
        Command::Scheduler => scheduler(&config).await,
        Command::Devices => devices(&config),
        Command::Routes {
            device,
            vrf,
            protocol,
            limit,
        } => routes(&config, device, vrf, protocol, limit),
        Command::Changes {
            device,
            days,
            limit,
        } => changes(&config, device, days, limit),
        Command::Stats { device } => stats(&config, device),
        Command::Export {
            output,
            device,
            vrf,
            format,
        } => export(&config, output, device, vrf, format),
    }
}

fn open_store(config: &Config) -> Result<Arc<dyn RouteStore>> {
    Ok(match &config.store_path {
        Some(path) => Arc::new(MemoryStore::open(path)?),
        None => Arc::new(MemoryStore::new()),
    })
}

fn build_collector(
    config: &Config,
    store: Arc<dyn RouteStore>,
    with_detection: bool,
) -> Arc<Collector> {
    let detector = (with_detection && config.enable_change_detection)
        .then(|| ChangeDetector::new(Arc::clone(&store), config.change_threshold));
    Arc::new(Collector::new(
        store,
        Arc::new(FileTransport::new(&config.capture_dir)),
        detector,
        config.max_workers,
        config.bgp_detail,
    ))
}

/// Registers the configured inventory, optionally narrowed to one host.
fn register_devices(
    config: &Config,
    store: &Arc<dyn RouteStore>,
    only: Option<&str>,
) -> Result<Vec<Device>> {
    let mut selected = Vec::new();
    for device in config.devices() {
        if only.is_none_or(|hostname| device.hostname == hostname) {
            selected.push(store.upsert_device(device)?);
        }
    }
    if let Some(hostname) = only {
        if selected.is_empty() {
            return Err(Error::DeviceNotFound(hostname.to_string()));
        }
    }
    Ok(selected)
}

async fn collect(config: &Config, device: Option<String>, dry_run: bool) -> Result<()> {
    // Dry runs collect into a throwaway in-memory store.
    let store: Arc<dyn RouteStore> = if dry_run {
        Arc::new(MemoryStore::new())
    } else {
        open_store(config)?
    };
    let devices = register_devices(config, &store, device.as_deref())?;
    if devices.is_empty() {
        println!("No devices configured.");
        return Ok(());
    }

    let collector = build_collector(config, Arc::clone(&store), !dry_run);
    let total = devices.len();
    let outcomes = collector.collect_all(devices).await;

    let mut first_error = None;
    let mut succeeded = 0usize;
    for (hostname, outcome) in outcomes {
        match outcome {
            Ok(report) => {
                succeeded += 1;
                let changes = report
                    .changes
                    .map_or(String::new(), |s| format!(", changes: {s}"));
                println!(
                    "{hostname}: {} routes across {} VRFs in {:.2}s{changes}",
                    report.total_routes, report.total_vrfs, report.processing_time
                );
            }
            Err(err) => {
                println!("{hostname}: FAILED ({err})");
                first_error.get_or_insert(err);
            }
        }
    }
    if dry_run {
        println!("Dry run: nothing was persisted.");
    }

    match first_error {
        Some(err) if succeeded == 0 && total > 0 => Err(err),
        _ => Ok(()),
    }
}

async fn scheduler(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    register_devices(config, &store, None)?;
    let collector = build_collector(config, Arc::clone(&store), true);
    let scheduler = Scheduler::new(
        collector,
        store,
        std::time::Duration::from_secs(config.collection_interval),
        config.retention_days,
    );
    info!("running scheduler, interrupt to stop");
    scheduler.run().await
}

fn devices(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    register_devices(config, &store, None)?;
    let devices = store.list_devices()?;
    if devices.is_empty() {
        println!("No devices configured.");
        return Ok(());
    }

    println!(
        "{:<20} {:<16} {:<10} {:<12} {}",
        "HOSTNAME", "ADDRESS", "PLATFORM", "LOCATION", "LAST SEEN"
    );
    for device in devices {
        let last_seen = device
            .last_seen
            .map_or("never".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string());
        println!(
            "{:<20} {:<16} {:<10} {:<12} {}",
            device.hostname,
            device.address,
            device.platform,
            device.location.as_deref().unwrap_or("-"),
            last_seen
        );
    }
    Ok(())
}

fn routes(
    config: &Config,
    device: Option<String>,
    vrf: Option<String>,
    protocol: Option<String>,
    limit: usize,
) -> Result<()> {
    let store = open_store(config)?;
    let routes = store.query_routes(&RouteQuery {
        hostname: device,
        vrf,
        protocol,
        limit: Some(limit),
    })?;
    if routes.is_empty() {
        println!("No routes found.");
        return Ok(());
    }

    println!(
        "{:<20} {:<12} {:<10} {:<16} {:<8} {:<8} {}",
        "NETWORK", "VRF", "PROTOCOL", "NEXT HOP", "METRIC", "AD", "INTERFACE"
    );
    for route in routes {
        println!(
            "{:<20} {:<12} {:<10} {:<16} {:<8} {:<8} {}",
            route.network(),
            route.vrf_name,
            route.protocol,
            route.next_hop.as_deref().unwrap_or("-"),
            route.metric.map_or("-".to_string(), |m| m.to_string()),
            route.admin_distance.map_or("-".to_string(), |d| d.to_string()),
            route.interface.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn changes(config: &Config, device: Option<String>, days: i64, limit: usize) -> Result<()> {
    let store = open_store(config)?;
    let device_id = match device {
        Some(hostname) => Some(
            store
                .get_device(&hostname)?
                .ok_or(Error::DeviceNotFound(hostname))?
                .id,
        ),
        None => None,
    };
    let since = Utc::now() - chrono::Duration::days(days);
    let changes = store.changes_since(device_id, since, limit)?;
    if changes.is_empty() {
        println!("No changes in the last {days} day(s).");
        return Ok(());
    }

    println!(
        "{:<20} {:<10} {:<20} {:<12} {}",
        "DETECTED", "KIND", "NETWORK", "VRF", "DETAIL"
    );
    for change in changes {
        let detail = match (&change.old_values, &change.new_values) {
            (Some(old), Some(new)) => format!(
                "{} via {} -> {} via {}",
                old.protocol,
                old.next_hop.as_deref().unwrap_or("-"),
                new.protocol,
                new.next_hop.as_deref().unwrap_or("-")
            ),
            (None, Some(new)) => format!(
                "{} via {}",
                new.protocol,
                new.next_hop.as_deref().unwrap_or("-")
            ),
            (Some(old), None) => format!(
                "was {} via {}",
                old.protocol,
                old.next_hop.as_deref().unwrap_or("-")
            ),
            (None, None) => String::new(),
        };
        println!(
            "{:<20} {:<10} {:<20} {:<12} {}",
            change.detected_at.format("%Y-%m-%d %H:%M:%S"),
            change.change_kind,
            change.route_network,
            change.vrf_name,
            detail
        );
    }
    Ok(())
}

fn stats(config: &Config, device: Option<String>) -> Result<()> {
    let store = open_store(config)?;
    let devices = match device {
        Some(hostname) => vec![store
            .get_device(&hostname)?
            .ok_or(Error::DeviceNotFound(hostname))?],
        None => store.list_devices()?,
    };
    if devices.is_empty() {
        println!("No devices known.");
        return Ok(());
    }

    for device in devices {
        println!("{} ({})", device.hostname, device.platform);
        let history = store.run_history(device.id, 5)?;
        if history.is_empty() {
            println!("  no collection runs yet");
            continue;
        }
        for run in history {
            let duration = run
                .processing_time
                .map_or("-".to_string(), |t| format!("{t:.2}s"));
            println!(
                "  {} {:<9} routes={:<6} vrfs={:<3} +{}/-{}/~{} ({})",
                run.started_at.format("%Y-%m-%d %H:%M:%S"),
                run.status.to_string(),
                run.total_routes,
                run.total_vrfs,
                run.routes_added,
                run.routes_removed,
                run.routes_modified,
                duration
            );
            if let Some(message) = run.error_message {
                println!("    error: {message}");
            }
        }
    }
    Ok(())
}

fn export(
    config: &Config,
    output: PathBuf,
    device: Option<String>,
    vrf: Option<String>,
    format: ExportFormat,
) -> Result<()> {
    let store = open_store(config)?;
    let routes = store.query_routes(&RouteQuery {
        hostname: device,
        vrf,
        protocol: None,
        limit: None,
    })?;

    match format {
        ExportFormat::Json => {
            let raw = serde_json::to_string_pretty(&routes)?;
            std::fs::write(&output, raw)?;
        }
        ExportFormat::Csv => {
            let mut writer = csv::Writer::from_path(&output)?;
            writer.write_record([
                "network",
                "vrf",
                "protocol",
                "next_hop",
                "metric",
                "admin_distance",
                "interface",
                "as_path",
            ])?;
            for route in &routes {
                writer.write_record([
                    route.network(),
                    route.vrf_name.clone(),
                    route.protocol.clone(),
                    route.next_hop.clone().unwrap_or_default(),
                    route.metric.map_or(String::new(), |m| m.to_string()),
                    route
                        .admin_distance
                        .map_or(String::new(), |d| d.to_string()),
                    route.interface.clone().unwrap_or_default(),
                    route.as_path.clone().unwrap_or_default(),
                ])?;
            }
            writer.flush()?;
        }
    }
    println!("Exported {} routes to {}", routes.len(), output.display());
    Ok(())
}
