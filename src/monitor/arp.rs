//! MAC resolution from the local ARP cache.

use async_trait::async_trait;
use tracing::warn;

use crate::config::mac::MacAddress;
use crate::monitor::MacResolver;
use crate::system::executor::{run_arp, run_ping};

#[derive(Debug, Default)]
pub struct ArpMacResolver;

#[async_trait]
impl MacResolver for ArpMacResolver {
    async fn resolve(&self, host: &str) -> Option<MacAddress> {
        // The ping only primes the ARP cache; whether it answers does not matter.
        if let Err(e) = run_ping(host).await {
            warn!("Failed to ping: {}: {:#}", host, e);
            return None;
        }

        match run_arp(host).await {
            Ok(out) => MacAddress::find_in(&out),
            Err(e) => {
                warn!("Failed to resolve ARP for: {}: {:#}", host, e);
                None
            }
        }
    }
}
