//! routewatch - multi-vendor routing table collection and change
//! monitoring.
//!
//! routewatch polls Cisco IOS, Juniper JunOS, and Huawei VRP devices for
//! their per-VRF routing tables, normalizes the vendor output into a
//! common route model, and diffs consecutive snapshots to keep an audit
//! trail of routing changes.
//!
//! ## Architecture
//!
//! - [`parsers`] - vendor CLI output parsers behind the
//!   [`parsers::TableParser`] trait
//! - [`collector`] - command transport and the per-device collection
//!   pipeline
//! - [`diff`] - change detection between consecutive collection runs
//! - [`store`] - persistence behind the [`store::RouteStore`] trait
//! - [`scheduler`] - periodic collection and retention
//! - [`cli`] - the `routewatch` command-line interface

pub mod cli;
pub mod collector;
pub mod config;
pub mod diff;
pub mod error;
pub mod model;
pub mod net;
pub mod parsers;
pub mod scheduler;
pub mod store;

pub use collector::{Collector, DeviceTransport, FileTransport};
pub use config::Config;
pub use diff::{ChangeDetector, ChangeSummary};
pub use error::{Error, Result};
pub use model::{ChangeKind, ChangeRecord, CollectionRun, Device, RunStatus, StoredRoute};
pub use parsers::{ParsedRoute, Platform, TableParser, VrfInfo};
pub use store::{MemoryStore, RouteStore};
