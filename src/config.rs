use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::uplink::{format_mac, ReconnectPolicy};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub device: DeviceConfig,
    pub uplink: UplinkConfig,
    pub capture: CaptureConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// MAC address reported to the server; "unknown" is sent when absent
    pub mac: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UplinkConfig {
    /// WebSocket server URI (ws:// or wss://)
    pub uri: String,

    /// Path to a PEM bundle holding the server's (self-signed) CA
    pub ca_cert: Option<String>,

    #[serde(default = "default_max_attempts")]
    pub max_reconnect_attempts: u32,

    #[serde(default = "default_initial_interval_ms")]
    pub initial_reconnect_interval_ms: u64,

    #[serde(default = "default_max_interval_ms")]
    pub max_reconnect_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// Bytes of 16-bit PCM per uplink frame
    #[serde(default = "default_frame_size")]
    pub frame_size: usize,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_channels")]
    pub channels: u16,

    /// How long a wake keeps the recording window open
    #[serde(default = "default_recording_secs")]
    pub recording_duration_secs: u64,

    /// Optional WAV file replayed as the capture source (development)
    pub source_file: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaybackConfig {
    /// Compressed audio file decoded and played at startup
    pub prompt_file: Option<String>,
}

fn default_max_attempts() -> u32 {
    15
}

fn default_initial_interval_ms() -> u64 {
    3000
}

fn default_max_interval_ms() -> u64 {
    30000
}

fn default_frame_size() -> usize {
    6400
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_channels() -> u16 {
    1
}

fn default_recording_secs() -> u64 {
    60
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

impl DeviceConfig {
    /// Configured MAC normalized to colon-separated uppercase hex. A value
    /// that does not parse as six hex octets is passed through verbatim.
    pub fn normalized_mac(&self) -> Option<String> {
        let raw = self.mac.as_ref()?;

        let octets: Vec<u8> = raw
            .split([':', '-'])
            .map(|part| u8::from_str_radix(part, 16))
            .collect::<Result<_, _>>()
            .unwrap_or_default();

        match <[u8; 6]>::try_from(octets) {
            Ok(bytes) => Some(format_mac(bytes)),
            Err(_) => Some(raw.clone()),
        }
    }
}

impl UplinkConfig {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            Duration::from_millis(self.initial_reconnect_interval_ms),
            Duration::from_millis(self.max_reconnect_interval_ms),
            self.max_reconnect_attempts,
        )
    }
}

impl CaptureConfig {
    pub fn recording_duration(&self) -> Duration {
        Duration::from_secs(self.recording_duration_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_normalized_to_uppercase_colons() {
        let device = DeviceConfig {
            mac: Some("aa-0b-cc-01-ee-ff".to_string()),
        };
        assert_eq!(device.normalized_mac().as_deref(), Some("AA:0B:CC:01:EE:FF"));
    }

    #[test]
    fn unparseable_mac_passes_through() {
        let device = DeviceConfig {
            mac: Some("not-a-mac".to_string()),
        };
        assert_eq!(device.normalized_mac().as_deref(), Some("not-a-mac"));
    }

    #[test]
    fn missing_mac_stays_missing() {
        let device = DeviceConfig { mac: None };
        assert_eq!(device.normalized_mac(), None);
    }
}
