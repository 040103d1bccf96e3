//! ICMP reachability via the system `ping` binary.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::monitor::OnlineChecker;
use crate::system::executor::run_ping;

#[derive(Debug, Default)]
pub struct PingChecker;

#[async_trait]
impl OnlineChecker for PingChecker {
    async fn probe(&self, host: &str) -> bool {
        match run_ping(host).await {
            Ok(online) => {
                debug!("Host: {} Online: {}", host, online);
                online
            }
            Err(e) => {
                warn!("Failed to ping {}: {:#}", host, e);
                false
            }
        }
    }
}
