//! Huawei VRP routing table parser.
//!
//! Column-aligned single-line routes: preference and cost appear as plain
//! integers (no brackets) and the interface is the trailing column.
//! Placeholder next hops (`0.0.0.0`, non-IP tokens) and `NULL0`
//! interfaces are dropped. The vendor protocol table is consulted before
//! the shared one — Huawei's `D` means DIRECT, unlike Cisco's usage.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::net::{clean_output, parse_network, validate_address};
use crate::parsers::{normalize_protocol_base, ParsedRoute, Platform, TableParser, VrfInfo};

/// Standard: `B       10.1.1.0/24         192.168.1.1         UG    100     0       GE0/0/1`
static ROUTE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([BOSCLED*\s]+)\s+(\S+)\s+(\S+)\s+([A-Z]+)\s+(\d+)\s+(\d+)\s+(\S+)").unwrap()
});

/// BGP table row: `*>i 10.1.1.0/24        192.168.1.1      100    0    65001 i`
static BGP_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([*>di\s]+)\s+(\S+)\s+(\S+)\s+(\d+)\s+(\d+)\s+(.+)\s+([ie])\s*$").unwrap()
});

/// Parser for Huawei VRP routing tables.
pub struct HuaweiParser;

impl TableParser for HuaweiParser {
    fn platform(&self) -> Platform {
        Platform::Huawei
    }

    fn vrf_list_command(&self) -> String {
        "display ip vpn-instance".to_string()
    }

    fn route_table_command(&self, vrf: &str) -> String {
        if vrf == "default" {
            "display ip routing-table".to_string()
        } else {
            format!("display ip routing-table vpn-instance {vrf}")
        }
    }

    fn bgp_table_command(&self, vrf: &str) -> String {
        if vrf == "default" {
            "display bgp routing-table".to_string()
        } else {
            format!("display bgp vpnv4 vpn-instance {vrf} routing-table")
        }
    }

    /// Huawei-specific codes take precedence over the shared table.
    fn normalize_protocol(&self, code: &str) -> String {
        let upper = code.to_uppercase();
        let vendor = match upper.as_str() {
            "D" => Some("DIRECT"),
            "U" => Some("USER"),
            "I" => Some("ISIS"),
            "O_INTRA" => Some("OSPF_INTRA"),
            "O_INTER" => Some("OSPF_INTER"),
            "O_ASE" => Some("OSPF_ASE"),
            "O_NSSA" => Some("OSPF_NSSA"),
            _ => None,
        };
        match vendor {
            Some(name) => name.to_string(),
            None => normalize_protocol_base(code),
        }
    }

    fn parse_vrf_list(&self, output: &str) -> Vec<VrfInfo> {
        let mut vrfs = vec![VrfInfo::default_vrf()];
        let cleaned = clean_output(output);

        // Data rows follow the "VPN-Instance ... RD ..." header line.
        let mut data_started = false;
        for line in cleaned.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line.contains("VPN-Instance") && line.contains("RD") {
                data_started = true;
                continue;
            }
            if !data_started || line.starts_with('-') {
                continue;
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            if let Some(name) = parts.first() {
                let rd = parts
                    .get(1)
                    .filter(|token| token.contains(':'))
                    .map(|token| token.to_string());
                vrfs.push(VrfInfo {
                    name: name.to_string(),
                    rd,
                    description: None,
                });
            }
        }
        vrfs
    }

    fn parse_route_table(&self, output: &str, vrf: &str) -> Vec<ParsedRoute> {
        let mut routes = Vec::new();
        let cleaned = clean_output(output);

        for line in cleaned.lines() {
            let line = line.trim();
            if line.is_empty()
                || ["Route Flags:", "Destination", "---", "Proto"]
                    .iter()
                    .any(|header| line.contains(header))
            {
                continue;
            }

            let Some(caps) = ROUTE_LINE.captures(line) else {
                continue;
            };

            let code = caps[1].trim();
            let (destination, prefix_length) = parse_network(&caps[2]);
            let next_hop = &caps[3];
            let preference = &caps[5];
            let cost = &caps[6];
            let interface = &caps[7];

            let mut route = ParsedRoute::new(
                destination,
                prefix_length,
                self.normalize_protocol(code),
                vrf,
            );
            // 0.0.0.0 is VRP's placeholder for locally originated routes.
            route.next_hop = if next_hop == "0.0.0.0" || !validate_address(next_hop) {
                None
            } else {
                Some(next_hop.to_string())
            };
            route.admin_distance = preference.parse().ok();
            route.metric = cost.parse().ok();
            route.interface = if interface == "NULL0" {
                None
            } else {
                Some(interface.to_string())
            };
            routes.push(route);
        }

        tracing::info!(vrf, route_count = routes.len(), "parsed huawei routing table");
        routes
    }

    fn parse_bgp_table(&self, output: &str, vrf: &str) -> Vec<ParsedRoute> {
        let mut routes = Vec::new();
        let cleaned = clean_output(output);

        for line in cleaned.lines() {
            let line = line.trim_end();
            if line.is_empty()
                || ["BGP", "Network", "Total"]
                    .iter()
                    .any(|header| line.contains(header))
            {
                continue;
            }

            let Some(caps) = BGP_LINE.captures(line) else {
                continue;
            };
            let status = caps[1].trim().to_string();
            let (destination, prefix_length) = parse_network(&caps[2]);
            let next_hop = &caps[3];

            let mut route = ParsedRoute::new(destination, prefix_length, "BGP", vrf);
            route.next_hop = if next_hop == "0.0.0.0" {
                None
            } else {
                Some(next_hop.to_string())
            };
            route.local_preference = caps[4].parse().ok();
            route.med = caps[5].parse().ok();
            route.as_path = Some(caps[6].trim().to_string());
            route.route_type = if status.contains('>') {
                Some("best".to_string())
            } else if status.contains('*') {
                Some("valid".to_string())
            } else if status.contains('i') {
                Some("internal".to_string())
            } else {
                None
            };
            routes.push(route);
        }
        routes
    }
}
