//! Daemon configuration structs and defaults.
//!
//! `RawConfig` mirrors the file as written; `NutwakeConfig` is the validated,
//! immutable form handed to the control loop.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::config::mac::MacAddress;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field: '{0}'")]
    MissingField(String),
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawConfig {
    pub nut: Option<RawNutSettings>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    #[serde(default = "default_fast_poll_interval")]
    pub fast_poll_interval: u64,
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub wake_on: WakeOnSettings,
    pub clients: Option<Vec<RawClient>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawNutSettings {
    pub ups: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawClient {
    pub name: Option<String>,
    pub host: Option<String>,
    pub mac: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NutwakeConfig {
    pub nut: NutSettings,
    pub poll_interval: u64,
    pub fast_poll_interval: u64,
    pub state_file: PathBuf,
    pub log_level: String,
    pub wake_on: WakeOnSettings,
    pub clients: Vec<ClientConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NutSettings {
    pub ups: String,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WakeOnSettings {
    #[serde(default = "default_min_battery_percent")]
    pub min_battery_percent: u8,
    #[serde(default = "default_client_timeout_sec")]
    pub client_timeout_sec: u64,
    #[serde(default = "default_reattempt_delay")]
    pub reattempt_delay: u64,
    /// Clear per-client flags when a restoration cycle times out
    #[serde(default = "default_reset_on_timeout")]
    pub reset_on_timeout: bool,
    #[serde(default = "default_broadcast_address")]
    pub broadcast_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientConfig {
    pub name: String,
    pub host: String,
    pub mac: MacAddress,
}

pub fn default_poll_interval() -> u64 { 10 }
pub fn default_fast_poll_interval() -> u64 { 2 }
pub fn default_state_file() -> PathBuf { PathBuf::from("nutwake_state.json") }
pub fn default_log_level() -> String { "INFO".to_string() }
pub fn default_min_battery_percent() -> u8 { 20 }
pub fn default_client_timeout_sec() -> u64 { 360 }
pub fn default_reattempt_delay() -> u64 { 30 }
pub fn default_reset_on_timeout() -> bool { true }
pub fn default_broadcast_address() -> String { "255.255.255.255".to_string() }

impl Default for WakeOnSettings {
    fn default() -> Self {
        Self {
            min_battery_percent: default_min_battery_percent(),
            client_timeout_sec: default_client_timeout_sec(),
            reattempt_delay: default_reattempt_delay(),
            reset_on_timeout: default_reset_on_timeout(),
            broadcast_address: default_broadcast_address(),
        }
    }
}
