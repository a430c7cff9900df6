//! Juniper JunOS routing table parser.
//!
//! JunOS output is structurally different from the Cisco family: a
//! destination appears once on its own line, and one or more subsequent
//! indented lines each describe one candidate path for that destination.
//! The current destination is carried as an accumulator through a single
//! forward pass, which keeps the parser reentrant — detail lines have no
//! network prefix of their own.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::net::{clean_output, parse_network};
use crate::parsers::{ParsedRoute, Platform, TableParser, VrfInfo};

static DESTINATION_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\d+\.\d+\.\d+/\d+").unwrap());

/// `*[BGP/170]` — protocol and route preference
static PROTO_PREF: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([A-Za-z]+)/(\d+)\]").unwrap());

static MED: Lazy<Regex> = Lazy::new(|| Regex::new(r"MED (\d+)").unwrap());
static LOCALPREF: Lazy<Regex> = Lazy::new(|| Regex::new(r"localpref (\d+)").unwrap());
static METRIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"metric (\d+)").unwrap());

/// `> to 10.0.0.1 via ae0.100`
static TO_VIA: Lazy<Regex> = Lazy::new(|| Regex::new(r"to\s+(\S+)\s+via\s+(\S+)").unwrap());
static TO_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r">\s+to\s+(\S+)").unwrap());
static VIA_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"via\s+(\S+)").unwrap());

static AS_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"AS path: (.+?)(?:,|$)").unwrap());

/// Parser for Juniper JunOS routing tables.
pub struct JuniperParser;

impl JuniperParser {
    /// Parses one candidate-path line attributed to `destination`. Returns
    /// `None` only when the destination token itself cannot be resolved.
    fn parse_route_line(&self, destination: &str, line: &str, vrf: &str) -> Option<ParsedRoute> {
        let (dest_ip, prefix_length) = parse_network(destination);

        let mut protocol = None;
        let mut admin_distance = None;
        if let Some(caps) = PROTO_PREF.captures(line) {
            protocol = Some(self.normalize_protocol(&caps[1]));
            admin_distance = caps[2].parse().ok();
        }

        let med = MED.captures(line).and_then(|c| c[1].parse().ok());
        let local_preference = LOCALPREF.captures(line).and_then(|c| c[1].parse().ok());
        let metric = METRIC.captures(line).and_then(|c| c[1].parse().ok());

        let mut next_hop = None;
        let mut interface = None;
        if let Some(caps) = TO_VIA.captures(line) {
            next_hop = Some(caps[1].to_string());
            interface = Some(caps[2].to_string());
        } else {
            if let Some(caps) = TO_ONLY.captures(line) {
                next_hop = Some(caps[1].to_string());
            }
            if let Some(caps) = VIA_ONLY.captures(line) {
                interface = Some(caps[1].to_string());
            }
        }

        let protocol = protocol.unwrap_or_else(|| "UNKNOWN".to_string());
        let as_path = if protocol == "BGP" {
            AS_PATH
                .captures(line)
                .map(|caps| caps[1].trim().to_string())
        } else {
            None
        };

        let mut route = ParsedRoute::new(dest_ip, prefix_length, protocol, vrf);
        route.next_hop = next_hop;
        route.metric = metric;
        route.admin_distance = admin_distance;
        route.interface = interface;
        route.local_preference = local_preference;
        route.med = med;
        route.as_path = as_path;
        Some(route)
    }
}

impl TableParser for JuniperParser {
    fn platform(&self) -> Platform {
        Platform::Juniper
    }

    fn vrf_list_command(&self) -> String {
        "show route instance".to_string()
    }

    fn route_table_command(&self, vrf: &str) -> String {
        if vrf == "default" {
            "show route".to_string()
        } else {
            format!("show route table {vrf}")
        }
    }

    fn bgp_table_command(&self, vrf: &str) -> String {
        if vrf == "default" {
            "show route protocol bgp".to_string()
        } else {
            format!("show route table {vrf} protocol bgp")
        }
    }

    fn parse_vrf_list(&self, output: &str) -> Vec<VrfInfo> {
        let mut vrfs = vec![VrfInfo::default_vrf()];
        let cleaned = clean_output(output);

        static RD_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+:\d+").unwrap());

        for line in cleaned.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("Instance") {
                continue;
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            if let Some(name) = parts.first() {
                let rd = parts
                    .iter()
                    .find(|part| part.contains(':') && RD_TOKEN.is_match(part))
                    .map(|part| part.to_string());
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

        let mut current_destination: Option<String> = None;

        for line in cleaned.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            // Table banners and column headers carry no route data.
            if ["Destination", "inet.0:", "inet6.0:"]
                .iter()
                .any(|header| line.contains(header))
            {
                continue;
            }

            if DESTINATION_LINE.is_match(line) {
                let parts: Vec<&str> = line.split_whitespace().collect();
                let destination = parts[0].to_string();

                // Some outputs fold the first path onto the destination line.
                if parts.len() > 1 {
                    if let Some(route) = self.parse_route_line(&destination, line, vrf) {
                        routes.push(route);
                    }
                }
                current_destination = Some(destination);
            } else if line.starts_with("*[") || line.starts_with('[') {
                if let Some(destination) = &current_destination {
                    if let Some(route) = self.parse_route_line(destination, line, vrf) {
                        routes.push(route);
                    }
                }
            } else if line.starts_with('>') || line.starts_with("via") || line.starts_with("to") {
                if let Some(destination) = &current_destination {
                    if let Some(route) = self.parse_route_line(destination, line, vrf) {
                        routes.push(route);
                    }
                }
            }
        }

        tracing::info!(vrf, route_count = routes.len(), "parsed juniper routing table");
        routes
    }

    fn parse_bgp_table(&self, output: &str, vrf: &str) -> Vec<ParsedRoute> {
        // `show route protocol bgp` uses the same grammar as the main
        // table; localpref/MED/AS path are already extracted there.
        self.parse_route_table(output, vrf)
    }
}
