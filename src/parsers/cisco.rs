//! Cisco IOS / IOS-XE / IOS-XR routing table parser.
//!
//! Three line shapes are matched in priority order: protocol-coded routes
//! with `[AD/metric]` brackets and a next hop, directly-connected routes
//! naming an interface, and static routes in the same bracket form. A line
//! beginning with `[` directly after a matched route is an additional
//! equal-cost next hop for the same destination and is emitted as a second
//! route — the representation for load-balanced paths.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::net::{clean_output, parse_network};
use crate::parsers::{ParsedRoute, Platform, TableParser, VrfInfo};

/// Standard format: `B    10.1.1.0/24 [200/0] via 192.168.1.1`
static ROUTE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([BOSCLERIAD*]+\*?)\s+(\S+)\s+\[(\d+)/(\d+)\]\s+via\s+(\S+)(?:\s+\d+:\d+:\d+)?(?:,\s+(\S+))?")
        .unwrap()
});

/// Connected: `C    192.168.1.0/24 is directly connected, GigabitEthernet0/0`
static CONNECTED_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([CL])\s+(\S+)\s+is\s+directly\s+connected,\s+(\S+)").unwrap());

/// Static: `S    10.0.0.0/8 [1/0] via 192.168.1.1`
static STATIC_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(S)\s+(\S+)\s+\[(\d+)/(\d+)\]\s+via\s+(\S+)").unwrap());

/// Additional next hop continuation: `[200/0] via 192.168.1.2`
static CONTINUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d+)/(\d+)\]\s+via\s+(\S+)").unwrap());

/// BGP table row: `*> 10.1.1.0/24    192.168.1.1    0    100    0 65001 i`
static BGP_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([*>sd\s]+)\s+(\S+)\s+(\S+)\s+(\d+)\s+(\d+)\s+(\d+)\s+(.+)\s+([ie?])\s*$")
        .unwrap()
});

/// Parser for Cisco IOS-family routing tables.
pub struct CiscoParser;

impl TableParser for CiscoParser {
    fn platform(&self) -> Platform {
        Platform::Cisco
    }

    fn vrf_list_command(&self) -> String {
        "show vrf".to_string()
    }

    fn route_table_command(&self, vrf: &str) -> String {
        if vrf == "default" {
            "show ip route".to_string()
        } else {
            format!("show ip route vrf {vrf}")
        }
    }

    fn bgp_table_command(&self, vrf: &str) -> String {
        if vrf == "default" {
            "show ip bgp".to_string()
        } else {
            format!("show ip bgp vpnv4 vrf {vrf}")
        }
    }

    fn parse_vrf_list(&self, output: &str) -> Vec<VrfInfo> {
        let mut vrfs = vec![VrfInfo::default_vrf()];
        let cleaned = clean_output(output);

        // Rows before the "Name ..." header are banner or prompt text.
        let mut data_started = false;
        for line in cleaned.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("Name") {
                if line.starts_with("Name") {
                    data_started = true;
                }
                continue;
            }
            if !data_started {
                continue;
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            if let Some(name) = parts.first() {
                let rd = parts
                    .get(2)
                    .filter(|rd| **rd != "<not")
                    .map(|rd| rd.to_string());
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
        let mut routes: Vec<ParsedRoute> = Vec::new();
        let cleaned = clean_output(output);

        // Last matched route, carried forward for continuation lines.
        let mut current: Option<ParsedRoute> = None;

        for line in cleaned.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("Codes:") || line.starts_with("Gateway") {
                continue;
            }

            if let Some(caps) = ROUTE_LINE.captures(line) {
                let code = caps[1].replace('*', "");
                let (destination, prefix_length) = parse_network(&caps[2]);
                let mut route = ParsedRoute::new(
                    destination,
                    prefix_length,
                    self.normalize_protocol(code.trim()),
                    vrf,
                );
                route.admin_distance = caps[3].parse().ok();
                route.metric = caps[4].parse().ok();
                route.next_hop = Some(caps[5].to_string());
                route.interface = caps.get(6).map(|m| m.as_str().to_string());
                current = Some(route.clone());
                routes.push(route);
                continue;
            }

            if let Some(caps) = CONNECTED_LINE.captures(line) {
                let (destination, prefix_length) = parse_network(&caps[2]);
                let mut route = ParsedRoute::new(
                    destination,
                    prefix_length,
                    self.normalize_protocol(&caps[1]),
                    vrf,
                );
                route.interface = Some(caps[3].to_string());
                current = Some(route.clone());
                routes.push(route);
                continue;
            }

            if let Some(caps) = STATIC_LINE.captures(line) {
                let (destination, prefix_length) = parse_network(&caps[2]);
                let mut route = ParsedRoute::new(
                    destination,
                    prefix_length,
                    self.normalize_protocol(&caps[1]),
                    vrf,
                );
                route.admin_distance = caps[3].parse().ok();
                route.metric = caps[4].parse().ok();
                route.next_hop = Some(caps[5].to_string());
                current = Some(route.clone());
                routes.push(route);
                continue;
            }

            // Equal-cost continuation: `[200/0] via 192.168.1.2` after a
            // matched route shares its destination and protocol.
            if line.starts_with('[') {
                if let (Some(prev), Some(caps)) = (&current, CONTINUATION.captures(line)) {
                    let mut route = ParsedRoute::new(
                        prev.destination.clone(),
                        prev.prefix_length,
                        prev.protocol.clone(),
                        vrf,
                    );
                    route.admin_distance = caps[1].parse().ok();
                    route.metric = caps[2].parse().ok();
                    route.next_hop = Some(caps[3].to_string());
                    routes.push(route);
                }
            }
        }

        tracing::info!(vrf, route_count = routes.len(), "parsed cisco routing table");
        routes
    }

    fn parse_bgp_table(&self, output: &str, vrf: &str) -> Vec<ParsedRoute> {
        let mut routes = Vec::new();
        let cleaned = clean_output(output);

        for line in cleaned.lines() {
            let line = line.trim_end();
            if line.is_empty() || line.starts_with("BGP") || line.starts_with("Network") {
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
            route.metric = caps[4].parse().ok();
            route.local_preference = caps[5].parse().ok();
            route.as_path = Some(caps[7].trim().to_string());
            route.route_type = if status.contains('>') {
                Some("best".to_string())
            } else if status.contains('*') {
                Some("valid".to_string())
            } else {
                None
            };
            routes.push(route);
        }
        routes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUTE_TABLE: &str = "\
Codes: L - local, C - connected, S - static, R - RIP, M - mobile, B - BGP
Gateway of last resort is 192.168.1.1 to network 0.0.0.0

B    10.1.1.0/24 [200/0] via 192.168.1.1
     [200/0] via 192.168.1.2
C    192.168.1.0/24 is directly connected, GigabitEthernet0/0
S    10.0.0.0/8 [1/0] via 192.168.1.1
O    172.16.5.0/24 [110/20] via 192.168.1.3
this line carries no route information
";

    #[test]
    fn test_parse_bgp_route_line() {
        let parser = CiscoParser;
        let routes = parser.parse_route_table("B    10.1.1.0/24 [200/0] via 192.168.1.1", "default");
        assert_eq!(routes.len(), 1);
        let route = &routes[0];
        assert_eq!(route.destination, "10.1.1.0");
        assert_eq!(route.prefix_length, 24);
        assert_eq!(route.protocol, "BGP");
        assert_eq!(route.admin_distance, Some(200));
        assert_eq!(route.metric, Some(0));
        assert_eq!(route.next_hop.as_deref(), Some("192.168.1.1"));
    }

    #[test]
    fn test_parse_full_table_with_continuation() {
        let parser = CiscoParser;
        let routes = parser.parse_route_table(ROUTE_TABLE, "default");
        assert_eq!(routes.len(), 5);

        // The continuation line shares destination/prefix/protocol but
        // carries a different next hop.
        assert_eq!(routes[1].destination, "10.1.1.0");
        assert_eq!(routes[1].prefix_length, 24);
        assert_eq!(routes[1].protocol, "BGP");
        assert_eq!(routes[1].next_hop.as_deref(), Some("192.168.1.2"));

        assert_eq!(routes[2].protocol, "CONNECTED");
        assert_eq!(routes[2].interface.as_deref(), Some("GigabitEthernet0/0"));
        assert_eq!(routes[2].next_hop, None);

        assert_eq!(routes[3].protocol, "STATIC");
        assert_eq!(routes[4].protocol, "OSPF");
        assert_eq!(routes[4].admin_distance, Some(110));
        assert_eq!(routes[4].metric, Some(20));
    }

    #[test]
    fn test_unrecognizable_text_yields_empty() {
        let parser = CiscoParser;
        let routes = parser.parse_route_table("router> show ip route\n% Invalid input\n", "default");
        assert!(routes.is_empty());
    }

    #[test]
    fn test_parse_vrf_list_prepends_default() {
        let parser = CiscoParser;
        let output = "\
  Name                             Default RD            Protocols   Interfaces
  CUSTOMER_A                       RD 65000:100          ipv4        Gi0/1
  MGMT                             RD <not set>          ipv4        Gi0/2
";
        let vrfs = parser.parse_vrf_list(output);
        assert_eq!(vrfs[0].name, "default");
        assert_eq!(vrfs[1].name, "CUSTOMER_A");
        assert_eq!(vrfs[1].rd.as_deref(), Some("65000:100"));
        assert_eq!(vrfs[2].name, "MGMT");
        assert_eq!(vrfs[2].rd, None);
    }

    #[test]
    fn test_parse_vrf_list_empty_output_still_has_default() {
        let parser = CiscoParser;
        let vrfs = parser.parse_vrf_list("");
        assert_eq!(vrfs.len(), 1);
        assert_eq!(vrfs[0].name, "default");
    }

    #[test]
    fn test_commands() {
        let parser = CiscoParser;
        assert_eq!(parser.vrf_list_command(), "show vrf");
        assert_eq!(parser.route_table_command("default"), "show ip route");
        assert_eq!(parser.route_table_command("CUST"), "show ip route vrf CUST");
        assert_eq!(parser.bgp_table_command("default"), "show ip bgp");
        assert_eq!(parser.bgp_table_command("CUST"), "show ip bgp vpnv4 vrf CUST");
    }

    #[test]
    fn test_parse_bgp_table() {
        let parser = CiscoParser;
        let output = "\
BGP table version is 5, local router ID is 192.168.1.1
   Network          Next Hop            Metric LocPrf Weight Path
*> 10.1.1.0/24      192.168.1.1         0      100    0 65001 i
*  10.2.0.0/16      0.0.0.0             0      100    0 65002 65003 i
";
        let routes = parser.parse_bgp_table(output, "default");
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].route_type.as_deref(), Some("best"));
        assert_eq!(routes[0].local_preference, Some(100));
        assert_eq!(routes[0].as_path.as_deref(), Some("65001"));
        // Placeholder next hop is dropped
        assert_eq!(routes[1].next_hop, None);
        assert_eq!(routes[1].route_type.as_deref(), Some("valid"));
        assert_eq!(routes[1].as_path.as_deref(), Some("65002 65003"));
    }
}
