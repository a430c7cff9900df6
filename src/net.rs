//! Network string utilities shared by the vendor parsers.
//!
//! Router CLI output is noisy: ANSI escapes, CR/LF variance, truncated
//! tokens. Everything here degrades instead of failing — a malformed
//! network token becomes a host route, an unknown protocol code passes
//! through upper-cased.

use std::net::IpAddr;

use once_cell::sync::Lazy;
use regex::Regex;

static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").unwrap());

/// Parses a network string into an address and a prefix length.
///
/// Accepts "A.B.C.D/N" directly and "A.B.C.D MASK" by counting set bits in
/// the dotted mask. Any other form, or any parse error, falls back to
/// treating the whole token as a host address with prefix length 32.
/// Routers occasionally emit malformed or truncated lines; a lenient
/// fallback keeps the rest of the table usable.
pub fn parse_network(network: &str) -> (String, u8) {
    if let Some((ip, prefix)) = network.split_once('/') {
        if let Ok(len) = prefix.trim().parse::<u8>() {
            return (ip.trim().to_string(), len);
        }
        return (network.trim().to_string(), 32);
    }

    let parts: Vec<&str> = network.split_whitespace().collect();
    if parts.len() >= 2 {
        if let Some(len) = prefix_from_mask(parts[1]) {
            return (parts[0].to_string(), len);
        }
    }
    (network.trim().to_string(), 32)
}

/// Converts a dotted-decimal subnet mask into a prefix length by counting
/// set bits. Returns `None` when the token is not four dotted octets.
pub fn prefix_from_mask(mask: &str) -> Option<u8> {
    let octets: Vec<&str> = mask.split('.').collect();
    if octets.len() != 4 {
        return None;
    }
    let mut bits = 0u8;
    for octet in octets {
        let value: u8 = octet.parse().ok()?;
        bits += value.count_ones() as u8;
    }
    Some(bits)
}

/// Strict IP syntax check. Used to discard placeholder next hops such as
/// "0.0.0.0" printed by some vendors.
pub fn validate_address(value: &str) -> bool {
    value.parse::<IpAddr>().is_ok()
}

/// Cleans raw command output: strips ANSI escape sequences and trailing
/// whitespace on every line. Every parser runs its input through this
/// before pattern matching.
pub fn clean_output(output: &str) -> String {
    let cleaned = ANSI_ESCAPE.replace_all(output, "");
    cleaned
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extracts BGP community tokens (anything containing ':') from a
/// whitespace-separated community string.
pub fn extract_communities(value: &str) -> Vec<String> {
    value
        .split_whitespace()
        .filter(|token| token.contains(':'))
        .map(|token| token.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_network_cidr() {
        assert_eq!(parse_network("10.1.1.0/24"), ("10.1.1.0".to_string(), 24));
        assert_eq!(parse_network("0.0.0.0/0"), ("0.0.0.0".to_string(), 0));
    }

    #[test]
    fn test_parse_network_mask() {
        assert_eq!(
            parse_network("192.168.1.0 255.255.255.0"),
            ("192.168.1.0".to_string(), 24)
        );
        assert_eq!(
            parse_network("10.0.0.0 255.0.0.0"),
            ("10.0.0.0".to_string(), 8)
        );
    }

    #[test]
    fn test_parse_network_host_fallback() {
        assert_eq!(parse_network("172.16.0.1"), ("172.16.0.1".to_string(), 32));
        // Garbage prefix falls back instead of erroring
        assert_eq!(
            parse_network("10.1.1.0/abc"),
            ("10.1.1.0/abc".to_string(), 32)
        );
        // Non-mask second token falls back too
        assert_eq!(
            parse_network("10.1.1.0 nonsense"),
            ("10.1.1.0 nonsense".to_string(), 32)
        );
    }

    #[test]
    fn test_prefix_from_mask() {
        assert_eq!(prefix_from_mask("255.255.255.0"), Some(24));
        assert_eq!(prefix_from_mask("255.255.255.255"), Some(32));
        assert_eq!(prefix_from_mask("0.0.0.0"), Some(0));
        assert_eq!(prefix_from_mask("255.255"), None);
        assert_eq!(prefix_from_mask("255.255.255.x"), None);
    }

    #[test]
    fn test_validate_address() {
        assert!(validate_address("192.168.1.1"));
        assert!(validate_address("2001:db8::1"));
        assert!(!validate_address("NULL0"));
        assert!(!validate_address("192.168.1"));
    }

    #[test]
    fn test_clean_output_strips_ansi_and_trailing_space() {
        let raw = "\x1b[32mB    10.0.0.0/8 via 1.1.1.1   \r\nGateway of last resort\x1b[0m  ";
        let cleaned = clean_output(raw);
        assert_eq!(cleaned, "B    10.0.0.0/8 via 1.1.1.1\nGateway of last resort");
    }

    #[test]
    fn test_extract_communities() {
        assert_eq!(
            extract_communities("65001:100 no-export 65001:200"),
            vec!["65001:100".to_string(), "65001:200".to_string()]
        );
        assert!(extract_communities("").is_empty());
    }
}
