//! Normalization of vendor status payloads.
//!
//! Modem firmware revisions disagree on field names and types, so parsing
//! works from ordered alias lists per attribute. Aliases are checked in
//! order and the last one present in the payload wins; unparseable or
//! absent fields fall back to defaults. This function never fails.

use serde_json::Value;

use super::ModemStatus;

const SIGNAL_ALIASES: &[&str] = &["SignalStrength", "signal_strength", "rssi"];
const DOWNLOAD_ALIASES: &[&str] = &["CurrentDownloadRate"];
const UPLOAD_ALIASES: &[&str] = &["CurrentUploadRate"];
const PUBLIC_IP_ALIASES: &[&str] = &["WanIPAddress", "wan_ip", "ipv4_addr"];
const CONNECTION_TYPE_ALIASES: &[&str] = &["NetworkType", "network_type"];
const PROVIDER_ALIASES: &[&str] = &["Provider", "provider"];
const FIRMWARE_ALIASES: &[&str] = &["SoftwareVersion", "firmware"];

/// Parse an arbitrary vendor response body into a canonical snapshot.
pub fn parse_status(data: &Value) -> ModemStatus {
    let mut status = ModemStatus::reachable_default();

    for key in SIGNAL_ALIASES {
        if let Some(v) = int_field(data, key) {
            status.signal_strength = v;
        }
    }
    for key in DOWNLOAD_ALIASES {
        if let Some(v) = int_field(data, key) {
            status.download_speed = v;
        }
    }
    for key in UPLOAD_ALIASES {
        if let Some(v) = int_field(data, key) {
            status.upload_speed = v;
        }
    }
    for key in PUBLIC_IP_ALIASES {
        if let Some(v) = str_field(data, key) {
            status.public_ip = Some(v);
        }
    }
    for key in CONNECTION_TYPE_ALIASES {
        if let Some(v) = str_field(data, key) {
            status.connection_type = v;
        }
    }
    for key in PROVIDER_ALIASES {
        if let Some(v) = str_field(data, key) {
            status.provider = v;
        }
    }
    for key in FIRMWARE_ALIASES {
        if let Some(v) = str_field(data, key) {
            status.firmware = v;
        }
    }

    // An explicit connection-status field overrides the optimistic default.
    if field_is(data, "ConnectionStatus", "Connected")
        || field_is(data, "connection_status", "connected")
    {
        status.connected = true;
    } else if field_is(data, "ConnectionStatus", "Disconnected")
        || field_is(data, "connection_status", "disconnected")
    {
        status.connected = false;
    }

    status
}

fn int_field(data: &Value, key: &str) -> Option<i64> {
    match data.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => parse_leading_int(s),
        _ => None,
    }
}

fn str_field(data: &Value, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn field_is(data: &Value, key: &str, expected: &str) -> bool {
    matches!(data.get(key), Some(Value::String(s)) if s == expected)
}

/// Parse the leading integer of a lenient firmware string, e.g.
/// "-70dBm" -> -70.
fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(&b'+') | Some(&b'-')) {
        end = 1;
    }
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    s[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_on_empty_payload() {
        let status = parse_status(&json!({}));
        assert!(status.connected);
        assert_eq!(status.signal_strength, -70);
        assert_eq!(status.download_speed, 0);
        assert_eq!(status.upload_speed, 0);
        assert_eq!(status.public_ip, None);
        assert_eq!(status.connection_type, "4G");
        assert_eq!(status.provider, "Vodafone");
        assert_eq!(status.firmware, "Unknown");
    }

    #[test]
    fn test_last_alias_wins() {
        // Both aliases present: rssi is checked after signal_strength, so
        // its value lands in the snapshot regardless of key order.
        let status = parse_status(&json!({
            "signal_strength": -60,
            "rssi": -85,
        }));
        assert_eq!(status.signal_strength, -85);

        let status = parse_status(&json!({
            "rssi": -85,
            "signal_strength": -60,
        }));
        assert_eq!(status.signal_strength, -85);

        let status = parse_status(&json!({
            "WanIPAddress": "198.51.100.1",
            "ipv4_addr": "203.0.113.7",
        }));
        assert_eq!(status.public_ip.as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_numbers_from_strings() {
        let status = parse_status(&json!({
            "SignalStrength": "-70dBm",
            "CurrentDownloadRate": "2048",
            "CurrentUploadRate": 512,
        }));
        assert_eq!(status.signal_strength, -70);
        assert_eq!(status.download_speed, 2048);
        assert_eq!(status.upload_speed, 512);
    }

    #[test]
    fn test_unparseable_number_keeps_default() {
        let status = parse_status(&json!({
            "SignalStrength": "excellent",
            "CurrentDownloadRate": {"nested": true},
        }));
        assert_eq!(status.signal_strength, -70);
        assert_eq!(status.download_speed, 0);
    }

    #[test]
    fn test_connection_status_override() {
        let status = parse_status(&json!({"ConnectionStatus": "Disconnected"}));
        assert!(!status.connected);

        let status = parse_status(&json!({"connection_status": "disconnected"}));
        assert!(!status.connected);

        let status = parse_status(&json!({"ConnectionStatus": "Connected"}));
        assert!(status.connected);

        // Unrecognized token: the optimistic default stands.
        let status = parse_status(&json!({"ConnectionStatus": "Dormant"}));
        assert!(status.connected);
    }

    #[test]
    fn test_vendor_payload() {
        let status = parse_status(&json!({
            "SignalStrength": -67,
            "WanIPAddress": "203.0.113.45",
            "NetworkType": "LTE",
            "Provider": "Vodafone DE",
            "SoftwareVersion": "BD_M300zV1.0.0B04",
            "ConnectionStatus": "Connected",
        }));
        assert!(status.connected);
        assert_eq!(status.signal_strength, -67);
        assert_eq!(status.public_ip.as_deref(), Some("203.0.113.45"));
        assert_eq!(status.connection_type, "LTE");
        assert_eq!(status.provider, "Vodafone DE");
        assert_eq!(status.firmware, "BD_M300zV1.0.0B04");
    }

    #[test]
    fn test_non_object_payload_degrades_to_defaults() {
        assert_eq!(parse_status(&Value::Null), ModemStatus::reachable_default());
        assert_eq!(
            parse_status(&json!("<html>login required</html>")),
            ModemStatus::reachable_default()
        );
    }
}
