use serde::{Deserialize, Serialize};

/// Control messages sent to the server as WebSocket text frames.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Sent immediately when the wakeword opens a recording window
    Wakeup,
    /// Sent immediately after a successful connection
    DeviceInfo { mac: String, timestamp: i64 },
}

impl ControlMessage {
    /// Device identity announcement; "unknown" when no MAC is configured,
    /// timestamp in unix seconds.
    pub fn device_info(mac: Option<&str>) -> Self {
        Self::DeviceInfo {
            mac: mac.unwrap_or("unknown").to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Format a hardware address as colon-separated uppercase hex.
pub fn format_mac(bytes: [u8; 6]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wakeup_wire_shape() {
        let json = serde_json::to_string(&ControlMessage::Wakeup).unwrap();
        assert_eq!(json, r#"{"type":"wakeup"}"#);
    }

    #[test]
    fn device_info_wire_shape() {
        let msg = ControlMessage::DeviceInfo {
            mac: "AA:BB:CC:DD:EE:FF".to_string(),
            timestamp: 1_700_000_000,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(
            json,
            r#"{"type":"device_info","mac":"AA:BB:CC:DD:EE:FF","timestamp":1700000000}"#
        );
    }

    #[test]
    fn device_info_without_mac_reports_unknown() {
        match ControlMessage::device_info(None) {
            ControlMessage::DeviceInfo { mac, timestamp } => {
                assert_eq!(mac, "unknown");
                assert!(timestamp > 0);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn mac_formatting() {
        assert_eq!(
            format_mac([0xAA, 0x0B, 0xCC, 0x01, 0xEE, 0xFF]),
            "AA:0B:CC:01:EE:FF"
        );
    }

    #[test]
    fn control_message_round_trip() {
        let msg = ControlMessage::device_info(Some("11:22:33:44:55:66"));
        let json = serde_json::to_string(&msg).unwrap();
        let back: ControlMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }
}
