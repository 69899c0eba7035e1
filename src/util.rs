//! Utility functions shared by the publisher and monitor modes.
//!
//! QoS conversions, client ID generation and payload formatting for log lines.

use rumqttc::v5::mqttbytes::QoS;

/// Timeout in seconds for graceful MQTT disconnect operations.
pub const DISCONNECT_TIMEOUT_SECS: u64 = 2;

/// Convert QoS enum to u8 value.
#[must_use]
pub fn qos_to_u8(qos: QoS) -> u8 {
    match qos {
        QoS::AtMostOnce => 0,
        QoS::AtLeastOnce => 1,
        QoS::ExactlyOnce => 2,
    }
}

/// Convert a u8 QoS level to the QoS enum.
///
/// Returns `None` for anything other than 0, 1 or 2 so callers can report
/// the bad value instead of silently downgrading it.
#[must_use]
pub fn u8_to_qos(qos: u8) -> Option<QoS> {
    match qos {
        0 => Some(QoS::AtMostOnce),
        1 => Some(QoS::AtLeastOnce),
        2 => Some(QoS::ExactlyOnce),
        _ => None,
    }
}

/// Generate a client ID from an optional string.
///
/// If `client_id` is `Some` and non-empty, returns a clone of the string.
/// Otherwise, generates a unique client ID using timestamp-based hashing.
#[must_use]
pub fn generate_client_id(client_id: &Option<String>) -> String {
    match client_id {
        Some(id) if !id.is_empty() => id.clone(),
        _ => {
            use std::time::{SystemTime, UNIX_EPOCH};
            let timestamp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos();
            let hash = timestamp ^ (timestamp >> 32);
            format!("ip-reporter-{:08x}", hash as u32)
        }
    }
}

/// Decode an MQTT payload for display. Invalid UTF-8 is replaced, never rejected.
#[must_use]
pub fn decode_payload(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

/// Format a payload for log output (truncated, hex for binary).
#[must_use]
pub fn format_payload_preview(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(s) if s.chars().count() <= 120 => s.to_string(),
        Ok(s) => format!("{}...", s.chars().take(120).collect::<String>()),
        Err(_) => {
            let shown = data.len().min(60);
            let hex = data[..shown]
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(" ");
            if data.len() > shown {
                format!("{}...", hex)
            } else {
                hex
            }
        }
    }
}
