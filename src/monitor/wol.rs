//! Wake-on-LAN magic packet over UDP broadcast.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::net::Ipv4Addr;
use tokio::net::UdpSocket;
use tracing::{debug, error, warn};

use crate::config::mac::MacAddress;
use crate::monitor::WolSender;

pub const WOL_PORT: u16 = 9;
pub const MAGIC_PACKET_LEN: usize = 102;

/// 6 x 0xFF followed by the MAC repeated 16 times.
pub fn magic_packet(mac: &MacAddress) -> [u8; MAGIC_PACKET_LEN] {
    let mut pkt = [0xFFu8; MAGIC_PACKET_LEN];
    let octets = mac.octets();
    for chunk in pkt[6..].chunks_exact_mut(6) {
        chunk.copy_from_slice(&octets);
    }
    pkt
}

fn parse_broadcast(addr: &str) -> Ipv4Addr {
    match addr.parse::<Ipv4Addr>() {
        Ok(ip) => ip,
        Err(_) => {
            warn!("Invalid broadcast address '{}', using 255.255.255.255", addr);
            Ipv4Addr::BROADCAST
        }
    }
}

pub struct UdpWolSender {
    port: u16,
}

impl UdpWolSender {
    pub fn new() -> Self {
        Self::with_port(WOL_PORT)
    }

    pub fn with_port(port: u16) -> Self {
        Self { port }
    }

    async fn send_packet(&self, mac: &MacAddress, broadcast: Ipv4Addr) -> Result<()> {
        let sock = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .context("bind error")?;
        sock.set_broadcast(true).context("cannot enable broadcast")?;

        let pkt = magic_packet(mac);
        sock.send_to(&pkt, (broadcast, self.port))
            .await
            .with_context(|| format!("send to {}:{} failed", broadcast, self.port))?;
        Ok(())
    }
}

#[async_trait]
impl WolSender for UdpWolSender {
    async fn send(&self, mac: &MacAddress, broadcast: &str) -> bool {
        let bcast = parse_broadcast(broadcast);
        debug!("Sending WOL packet to {} via {}:{}", mac, bcast, self.port);

        match self.send_packet(mac, bcast).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to send WOL packet to {}: {:#}", mac, e);
                false
            }
        }
    }
}
