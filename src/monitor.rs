//! Collaborator traits consumed by the control loop, and their system-backed
//! implementations (NUT, ping, UDP magic packet, ARP).

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::warn;

use crate::config::mac::MacAddress;

pub mod arp;
pub mod nut;
pub mod ping;
pub mod wol;

pub use arp::ArpMacResolver;
pub use nut::NutUpsMonitor;
pub use ping::PingChecker;
pub use wol::UdpWolSender;

pub const BATTERY_CHARGE_KEY: &str = "battery.charge";
pub const UPS_STATUS_KEY: &str = "ups.status";
pub const DEFAULT_BATTERY_PERCENT: u8 = 100;
pub const DEFAULT_POWER_STATUS: &str = "OL";

#[async_trait]
pub trait UpsStatusProvider: Send + Sync {
    /// Query all variables for a UPS. An empty map means the query failed.
    async fn query(&self, ups_id: &str) -> HashMap<String, String>;
}

#[async_trait]
pub trait OnlineChecker: Send + Sync {
    /// Probe reachability. Probe failures report offline, never an error.
    async fn probe(&self, host: &str) -> bool;
}

#[async_trait]
pub trait WolSender: Send + Sync {
    /// Send a magic packet. False marks a transient failure worth retrying.
    async fn send(&self, mac: &MacAddress, broadcast: &str) -> bool;
}

#[async_trait]
pub trait MacResolver: Send + Sync {
    async fn resolve(&self, host: &str) -> Option<MacAddress>;
}

/// One observation of the UPS, with documented defaults for missing data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsReading {
    pub battery_percent: u8,
    pub power_status: String,
}

impl UpsReading {
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let battery_percent = match vars.get(BATTERY_CHARGE_KEY) {
            Some(raw) => match raw.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => v.round().clamp(0.0, 100.0) as u8,
                _ => {
                    warn!("Unparseable battery charge '{}', assuming {}%", raw, DEFAULT_BATTERY_PERCENT);
                    DEFAULT_BATTERY_PERCENT
                }
            },
            None => DEFAULT_BATTERY_PERCENT,
        };

        let power_status = vars
            .get(UPS_STATUS_KEY)
            .cloned()
            .unwrap_or_else(|| DEFAULT_POWER_STATUS.to_string());

        Self { battery_percent, power_status }
    }

    pub fn on_battery(&self) -> bool {
        self.power_status.contains("OB")
    }

    pub fn on_line(&self) -> bool {
        self.power_status.contains("OL")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn empty_observation_resolves_to_defaults() {
        let reading = UpsReading::from_vars(&HashMap::new());
        assert_eq!(reading.battery_percent, 100);
        assert_eq!(reading.power_status, "OL");
        assert!(reading.on_line());
        assert!(!reading.on_battery());
    }

    #[test]
    fn reads_charge_and_status() {
        let reading = UpsReading::from_vars(&vars(&[("battery.charge", "42"), ("ups.status", "OB DISCHRG LB")]));
        assert_eq!(reading.battery_percent, 42);
        assert!(reading.on_battery());
        assert!(!reading.on_line());
    }

    #[test]
    fn fractional_and_garbage_charge() {
        assert_eq!(UpsReading::from_vars(&vars(&[("battery.charge", "79.6")])).battery_percent, 80);
        assert_eq!(UpsReading::from_vars(&vars(&[("battery.charge", "n/a")])).battery_percent, 100);
    }
}
