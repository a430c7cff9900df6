//! Vendor parser contract and platform dispatch.
//!
//! Each supported vendor implements [`TableParser`]: pure functions from
//! VRF names to the CLI commands that retrieve routing state, and pure
//! parsers from raw command output to normalized [`ParsedRoute`] /
//! [`VrfInfo`] records. Parsers hold no per-invocation state, so one
//! instance can be shared across concurrent collection tasks.

pub mod cisco;
pub mod huawei;
pub mod juniper;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub use cisco::CiscoParser;
pub use huawei::HuaweiParser;
pub use juniper::JuniperParser;

/// A normalized route entry produced by a vendor parser. Transient: routes
/// are translated into stored records before persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRoute {
    /// Destination network address
    pub destination: String,
    /// Prefix length, always resolved to a concrete integer
    pub prefix_length: u8,
    /// Next hop address, if the route has one
    pub next_hop: Option<String>,
    /// Canonical protocol name (BGP, OSPF, STATIC, ...)
    pub protocol: String,
    /// Route metric / cost
    pub metric: Option<i64>,
    /// Administrative distance or preference
    pub admin_distance: Option<i64>,
    /// Egress interface name
    pub interface: Option<String>,
    /// BGP AS path
    pub as_path: Option<String>,
    /// BGP local preference
    pub local_preference: Option<i64>,
    /// BGP multi-exit discriminator
    pub med: Option<i64>,
    /// BGP communities
    pub communities: Option<Vec<String>>,
    /// Route classification tag ("best", "valid", "internal", ...)
    pub route_type: Option<String>,
    /// Owning VRF name
    pub vrf: String,
}

impl ParsedRoute {
    /// Creates a route with the mandatory fields; everything else `None`.
    pub fn new(
        destination: impl Into<String>,
        prefix_length: u8,
        protocol: impl Into<String>,
        vrf: impl Into<String>,
    ) -> Self {
        Self {
            destination: destination.into(),
            prefix_length,
            next_hop: None,
            protocol: protocol.into(),
            metric: None,
            admin_distance: None,
            interface: None,
            as_path: None,
            local_preference: None,
            med: None,
            communities: None,
            route_type: None,
            vrf: vrf.into(),
        }
    }

    /// The route's network in CIDR text form.
    pub fn network(&self) -> String {
        format!("{}/{}", self.destination, self.prefix_length)
    }
}

/// A VRF (routing instance) discovered on a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VrfInfo {
    /// VRF name, unique within a device
    pub name: String,
    /// Route distinguisher, when the device reports one
    pub rd: Option<String>,
    /// Free-text description
    pub description: Option<String>,
}

impl VrfInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rd: None,
            description: None,
        }
    }

    /// The implicit VRF every device has, synthesized even when the VRF
    /// listing command fails or returns nothing.
    pub fn default_vrf() -> Self {
        Self::new(DEFAULT_VRF)
    }
}

/// Name of the implicit VRF present on every device.
pub const DEFAULT_VRF: &str = "default";

/// Supported device platforms. Resolved once per device, not per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Cisco IOS / IOS-XE / IOS-XR
    Cisco,
    /// Juniper JunOS
    Juniper,
    /// Huawei VRP
    Huawei,
}

impl Platform {
    /// Returns the parser for this platform.
    pub fn parser(self) -> Box<dyn TableParser> {
        match self {
            Platform::Cisco => Box::new(CiscoParser),
            Platform::Juniper => Box::new(JuniperParser),
            Platform::Huawei => Box::new(HuaweiParser),
        }
    }

    /// Resolves a platform tag for a device, mapping the failure onto the
    /// device so callers can fail that device alone.
    pub fn for_device(device: &str, platform: &str) -> Result<Self, Error> {
        platform.parse().map_err(|_| Error::UnknownPlatform {
            device: device.to_string(),
            platform: platform.to_string(),
        })
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Cisco => write!(f, "cisco"),
            Platform::Juniper => write!(f, "juniper"),
            Platform::Huawei => write!(f, "huawei"),
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "cisco" | "cisco_ios" | "ios" | "ios_xe" | "iosxe" | "ios_xr" | "iosxr" => {
                Ok(Platform::Cisco)
            }
            "juniper" | "junos" | "juniper_junos" => Ok(Platform::Juniper),
            "huawei" | "vrp" | "huawei_vrp" => Ok(Platform::Huawei),
            _ => Err(format!(
                "Unknown platform: {}. Valid options: cisco, juniper, huawei",
                s
            )),
        }
    }
}

/// Capability set every vendor parser implements.
///
/// Command functions are pure string producers; no device interaction
/// happens here. Parse functions never fail on malformed input as a
/// whole: unmatched lines are dropped silently and a bad network token
/// drops only that candidate route.
pub trait TableParser: Send + Sync {
    /// The platform this parser handles.
    fn platform(&self) -> Platform;

    /// Command that lists the device's VRFs.
    fn vrf_list_command(&self) -> String;

    /// Command that dumps the routing table for a VRF.
    fn route_table_command(&self, vrf: &str) -> String;

    /// Command that dumps the BGP table for a VRF.
    fn bgp_table_command(&self, vrf: &str) -> String;

    /// Parses VRF listing output. The synthetic default VRF is always the
    /// first element, regardless of input.
    fn parse_vrf_list(&self, output: &str) -> Vec<VrfInfo>;

    /// Parses routing table output into normalized routes, preserving
    /// input line order.
    fn parse_route_table(&self, output: &str, vrf: &str) -> Vec<ParsedRoute>;

    /// Parses BGP table output for detailed BGP attributes. Invoked only
    /// when BGP detail is explicitly requested.
    fn parse_bgp_table(&self, output: &str, vrf: &str) -> Vec<ParsedRoute>;

    /// Normalizes a short protocol code into a canonical name. Vendor
    /// parsers override this to consult their own table first.
    fn normalize_protocol(&self, code: &str) -> String {
        normalize_protocol_base(code)
    }
}

/// Shared protocol-code table. Codes absent from the table pass through
/// upper-cased, unchanged.
pub fn normalize_protocol_base(code: &str) -> String {
    let upper = code.to_uppercase();
    match upper.as_str() {
        "B" => "BGP",
        "O" => "OSPF",
        "S" => "STATIC",
        "C" => "CONNECTED",
        "L" => "LOCAL",
        "R" => "RIP",
        "E" => "EIGRP",
        "I" => "ISIS",
        "IA" => "OSPF_IA",
        "E1" => "OSPF_E1",
        "E2" => "OSPF_E2",
        "N1" => "OSPF_NSSA_E1",
        "N2" => "OSPF_NSSA_E2",
        _ => return upper,
    }
    .to_string()
}
