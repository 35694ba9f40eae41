/* src/ip.rs */

use std::collections::HashMap;

/// Headers checked after the peer address, most trusted first.
/// `x-forwarded-for` is special-cased to its first hop.
const IP_HEADERS: [&str; 8] = [
    "cf-connecting-ip",
    "x-forwarded-for",
    "x-real-ip",
    "x-client-ip",
    "x-forwarded",
    "x-cluster-client-ip",
    "forwarded-for",
    "forwarded",
];

pub const UNKNOWN_CLIENT: &str = "unknown";

/// Anything a caller identifier can be read from.
pub trait RequestLike {
    /// Case-insensitive header lookup.
    fn header(&self, name: &str) -> Option<&str>;

    /// Peer address verified by the server, if it has one.
    fn ip(&self) -> Option<String> {
        None
    }
}

impl RequestLike for HashMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Best-effort caller identifier. Falls back to `"unknown"`, which every
/// unidentifiable caller then shares.
pub fn get_client_ip<R: RequestLike + ?Sized>(request: &R) -> String {
    if let Some(ip) = request.ip().filter(|ip| !ip.trim().is_empty()) {
        return ip.trim().to_string();
    }

    for name in IP_HEADERS {
        let Some(value) = request.header(name) else {
            continue;
        };
        let value = if name == "x-forwarded-for" {
            value.split(',').next().unwrap_or_default()
        } else {
            value
        };
        let value = value.trim();
        if !value.is_empty() {
            return value.to_string();
        }
    }

    UNKNOWN_CLIENT.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestRequest {
        ip: Option<&'static str>,
        headers: HashMap<String, String>,
    }

    impl TestRequest {
        fn new(ip: Option<&'static str>, headers: &[(&str, &str)]) -> Self {
            Self {
                ip,
                headers: headers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            }
        }
    }

    impl RequestLike for TestRequest {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers.header(name)
        }

        fn ip(&self) -> Option<String> {
            self.ip.map(str::to_string)
        }
    }

    #[test]
    fn test_forwarded_for_beats_real_ip() {
        let request = TestRequest::new(
            None,
            &[("x-forwarded-for", "1.1.1.1, 2.2.2.2"), ("x-real-ip", "3.3.3.3")],
        );
        assert_eq!(get_client_ip(&request), "1.1.1.1");
    }

    #[test]
    fn test_cloudflare_header_beats_proxies() {
        let request = TestRequest::new(
            None,
            &[
                ("cf-connecting-ip", "4.4.4.4"),
                ("x-forwarded-for", "1.1.1.1, 2.2.2.2"),
                ("x-real-ip", "3.3.3.3"),
            ],
        );
        assert_eq!(get_client_ip(&request), "4.4.4.4");
    }

    #[test]
    fn test_peer_ip_beats_every_header() {
        let request = TestRequest::new(
            Some("5.5.5.5"),
            &[
                ("cf-connecting-ip", "4.4.4.4"),
                ("x-forwarded-for", "1.1.1.1, 2.2.2.2"),
                ("x-real-ip", "3.3.3.3"),
            ],
        );
        assert_eq!(get_client_ip(&request), "5.5.5.5");
    }

    #[test]
    fn test_nothing_yields_unknown() {
        assert_eq!(get_client_ip(&TestRequest::new(None, &[])), "unknown");
        assert_eq!(get_client_ip(&TestRequest::new(Some(""), &[])), "unknown");
    }

    #[test]
    fn test_remaining_headers_in_order() {
        let chain = [
            ("x-client-ip", "6.6.6.6"),
            ("x-forwarded", "7.7.7.7"),
            ("x-cluster-client-ip", "8.8.8.8"),
            ("forwarded-for", "9.9.9.9"),
            ("forwarded", "10.10.10.10"),
        ];
        for start in 0..chain.len() {
            let request = TestRequest::new(None, &chain[start..]);
            assert_eq!(get_client_ip(&request), chain[start].1);
        }
    }

    #[test]
    fn test_header_lookup_ignores_case_and_empty_values() {
        let request = TestRequest::new(None, &[("X-Real-IP", " 3.3.3.3 "), ("x-forwarded-for", " ")]);
        assert_eq!(get_client_ip(&request), "3.3.3.3");
    }
}
