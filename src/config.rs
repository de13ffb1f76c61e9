// MIT License - Copyright (c) Nick Whyte
// Rust translation

use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::constants::ZONE_COUNT;
use crate::event::PanelModel;

/// Configuration for a [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Interval between refresh cycles (zone banks + arming status)
    pub update_interval_secs: u64,
    /// Keep the current arming state when the panel reports an empty arming
    /// status. Needed for firmware older than 5.8.
    pub infer_arming_state: bool,
    /// Timeout for `send_command_and_wait` issued by the client itself
    pub request_timeout_ms: u64,
    /// Grace added to the update interval before an idle connection is
    /// considered stale and redialled
    pub stale_grace_secs: u64,
    /// Reconnect backoff: first delay
    pub backoff_min_ms: u64,
    /// Reconnect backoff: maximum delay
    pub backoff_max_ms: u64,
    /// Reconnect backoff: growth factor per attempt
    pub backoff_factor: u32,
    /// Capacity of the `subscribe()` broadcast channel
    pub event_channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: 60,
            infer_arming_state: false,
            request_timeout_ms: 5000,
            stale_grace_secs: 30,
            backoff_min_ms: 100,
            backoff_max_ms: 10000,
            backoff_factor: 2,
            event_channel_capacity: 256,
        }
    }
}

impl ClientConfig {
    /// Create a new config builder starting from defaults.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Refresh interval, never shorter than one second.
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Idle time after which the connection is considered stale.
    pub fn stale_after(&self) -> Duration {
        self.update_interval() + Duration::from_secs(self.stale_grace_secs)
    }
}

/// Builder for ClientConfig.
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn update_interval_secs(mut self, secs: u64) -> Self {
        self.config.update_interval_secs = secs;
        self
    }

    pub fn infer_arming_state(mut self, infer: bool) -> Self {
        self.config.infer_arming_state = infer;
        self
    }

    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.request_timeout_ms = ms;
        self
    }

    pub fn stale_grace_secs(mut self, secs: u64) -> Self {
        self.config.stale_grace_secs = secs;
        self
    }

    pub fn backoff_min_ms(mut self, ms: u64) -> Self {
        self.config.backoff_min_ms = ms;
        self
    }

    pub fn backoff_max_ms(mut self, ms: u64) -> Self {
        self.config.backoff_max_ms = ms;
        self
    }

    pub fn backoff_factor(mut self, factor: u32) -> Self {
        self.config.backoff_factor = factor;
        self
    }

    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.event_channel_capacity = capacity;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Configuration for a [`PanelSimulator`](crate::simulator::PanelSimulator).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Zones 1..=num_zones exist and start sealed. At most 32.
    #[serde(deserialize_with = "deserialize_num_zones")]
    pub num_zones: u8,
    pub exit_delay_ms: u64,
    pub entry_delay_ms: u64,
    /// Code accepted for arming and disarming
    pub user_code: String,
    /// Reported in the panel version response
    pub model: PanelModel,
    pub major_version: u8,
    pub minor_version: u8,
}

fn deserialize_num_zones<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let num_zones = u8::deserialize(deserializer)?;
    if usize::from(num_zones) > ZONE_COUNT {
        return Err(serde::de::Error::custom(format!(
            "num_zones {num_zones} exceeds the {ZONE_COUNT} zones a panel reports"
        )));
    }
    Ok(num_zones)
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            num_zones: 8,
            exit_delay_ms: 10000,
            entry_delay_ms: 10000,
            user_code: "1234".to_string(),
            model: PanelModel::D16x,
            major_version: 8,
            minor_version: 7,
        }
    }
}

impl SimulatorConfig {
    pub fn builder() -> SimulatorConfigBuilder {
        SimulatorConfigBuilder::default()
    }

    pub fn exit_delay(&self) -> Duration {
        Duration::from_millis(self.exit_delay_ms)
    }

    pub fn entry_delay(&self) -> Duration {
        Duration::from_millis(self.entry_delay_ms)
    }
}

/// Builder for SimulatorConfig.
#[derive(Debug, Clone, Default)]
pub struct SimulatorConfigBuilder {
    config: SimulatorConfig,
}

impl SimulatorConfigBuilder {
    pub fn num_zones(mut self, num_zones: u8) -> Self {
        self.config.num_zones = num_zones.min(ZONE_COUNT as u8);
        self
    }

    pub fn exit_delay_ms(mut self, ms: u64) -> Self {
        self.config.exit_delay_ms = ms;
        self
    }

    pub fn entry_delay_ms(mut self, ms: u64) -> Self {
        self.config.entry_delay_ms = ms;
        self
    }

    pub fn user_code(mut self, code: impl Into<String>) -> Self {
        self.config.user_code = code.into();
        self
    }

    pub fn model(mut self, model: PanelModel) -> Self {
        self.config.model = model;
        self
    }

    pub fn version(mut self, major: u8, minor: u8) -> Self {
        self.config.major_version = major;
        self.config.minor_version = minor;
        self
    }

    pub fn build(self) -> SimulatorConfig {
        self.config
    }
}
