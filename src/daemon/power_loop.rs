//! Power-event state machine: outage detection, client snapshot, restoration
//! with WOL retries, timeout and reset.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::types::{ClientConfig, NutwakeConfig};
use crate::monitor::{OnlineChecker, UpsReading, UpsStatusProvider, WolSender, DEFAULT_BATTERY_PERCENT};
use crate::state::ClientStateTracker;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PowerState {
    /// Line power, nothing pending.
    Online,
    /// Running on battery; the pre-outage snapshot has been taken.
    OnBattery,
    /// Power is back and previously-online clients are being woken.
    Restoring {
        /// Cycle start, set on the first tick evaluated in this state.
        started_at: Option<f64>,
        /// Cycle picked up from persisted state after a restart; no snapshot exists.
        resumed: bool,
    },
}

/// The I/O the loop needs on every tick.
#[derive(Clone)]
pub struct Collaborators {
    pub ups: Arc<dyn UpsStatusProvider>,
    pub checker: Arc<dyn OnlineChecker>,
    pub wol: Arc<dyn WolSender>,
}

pub struct PowerEventLoop {
    config: Arc<NutwakeConfig>,
    tracker: ClientStateTracker,
    io: Collaborators,
    clock: Arc<dyn Clock>,
    state: PowerState,
    pending_down: HashSet<String>,
    first_tick: bool,
}

impl PowerEventLoop {
    pub fn new(
        config: Arc<NutwakeConfig>,
        mut tracker: ClientStateTracker,
        io: Collaborators,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = if tracker.was_ups_on_battery() {
            info!("Resuming from a UPS battery event (battery was {}% at power loss)",
                tracker.battery_percent_at_shutdown());
            tracker.reset();
            PowerState::Restoring { started_at: None, resumed: true }
        } else {
            PowerState::Online
        };

        Self {
            config,
            tracker,
            io,
            clock,
            state,
            pending_down: HashSet::new(),
            first_tick: true,
        }
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    pub fn pending_down(&self) -> &HashSet<String> {
        &self.pending_down
    }

    /// Delay before the next tick: slow when idle, fast around an outage.
    pub fn next_interval(&self) -> Duration {
        match self.state {
            PowerState::Online => Duration::from_secs(self.config.poll_interval),
            _ => Duration::from_secs(self.config.fast_poll_interval),
        }
    }

    /// Tick until `shutdown` resolves. A tick in progress always completes.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            self.tick().await;
            let wait = self.next_interval();

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Stopping power monitor loop");
                    break;
                }
                _ = time::sleep(wait) => {}
            }
        }
    }

    /// One observation: status, every client probe, then one transition branch.
    pub async fn tick(&mut self) {
        let vars = self.io.ups.query(&self.config.nut.ups).await;
        let reading = UpsReading::from_vars(&vars);

        if self.first_tick {
            info!("UPS power status: {}, Battery: {}%", reading.power_status, reading.battery_percent);
            self.first_tick = false;
        } else {
            debug!("UPS power status: {}, Battery: {}%", reading.power_status, reading.battery_percent);
        }

        let config = Arc::clone(&self.config);
        for client in &config.clients {
            let online = self.io.checker.probe(&client.host).await;
            self.tracker.update(&client.name, online);
        }

        let restoring = matches!(self.state, PowerState::Restoring { .. });
        if reading.on_battery() && self.state != PowerState::OnBattery {
            self.enter_on_battery(&reading);
        } else if (reading.on_line() && self.state == PowerState::OnBattery) || restoring {
            self.restore(&reading, &config.clients).await;
        } else if self.state == PowerState::Online {
            // Housekeeping so stale flags never survive into the next outage
            self.tracker.reset();
            self.tracker.set_ups_on_battery(false, DEFAULT_BATTERY_PERCENT);
        }
    }

    fn enter_on_battery(&mut self, reading: &UpsReading) {
        if let PowerState::Restoring { .. } = self.state {
            warn!("Power lost again during restoration; abandoning the current wake cycle");
            self.pending_down.clear();
            self.tracker.reset();
        }

        self.tracker.mark_all_online_clients();
        self.tracker.set_ups_on_battery(true, reading.battery_percent);
        self.state = PowerState::OnBattery;
        warn!("UPS switched to battery power ({}% remaining)", reading.battery_percent);
    }

    async fn restore(&mut self, reading: &UpsReading, clients: &[ClientConfig]) {
        let now = self.clock.now();
        let (started_at, resumed) = match self.state {
            PowerState::Restoring { started_at, resumed } => (started_at.unwrap_or(now), resumed),
            _ => {
                info!("Power restored (status: {})", reading.power_status);
                (now, false)
            }
        };
        self.state = PowerState::Restoring { started_at: Some(started_at), resumed };

        let min_battery = self.config.wake_on.min_battery_percent;
        if reading.battery_percent < min_battery {
            info!("Power restored, but battery still below minimum percentage ({}% < {}%). Waiting...",
                reading.battery_percent, min_battery);
        } else {
            debug!("Power restored and battery >= {}%. Evaluating clients...", min_battery);
            self.wake_clients(clients).await;

            if self.pending_down.is_empty() {
                info!("Power restored and all clients are back online!");
                self.end_cycle(true);
                return;
            }
        }

        let elapsed = now - started_at;
        if elapsed > self.config.wake_on.client_timeout_sec as f64 {
            self.time_out(clients, elapsed);
        }
    }

    async fn wake_clients(&mut self, clients: &[ClientConfig]) {
        let reattempt_delay = self.config.wake_on.reattempt_delay;
        let broadcast = self.config.wake_on.broadcast_address.as_str();

        for client in clients {
            let name = client.name.as_str();

            if self.tracker.should_skip(name) {
                continue;
            }

            if !self.tracker.was_online_before_shutdown(name) {
                info!("Skipping WOL for {}: was not online before power loss", name);
                self.tracker.mark_skip(name);
                continue;
            }

            if self.tracker.is_online(name) {
                if self.pending_down.remove(name) {
                    if self.tracker.has_been_wol_sent(name) {
                        info!("{} is back online after WOL", name);
                    } else {
                        info!("{} is back online", name);
                    }
                } else {
                    debug!("{} is online", name);
                }
                continue;
            }

            self.pending_down.insert(client.name.clone());
            if self.tracker.should_attempt_wol(name, reattempt_delay) {
                info!("Sending WOL packet to {} at {}", name, client.mac);
                if self.io.wol.send(&client.mac, broadcast).await {
                    self.tracker.mark_wol_sent(name);
                } else {
                    warn!("WOL packet to {} failed, retrying next tick", name);
                }
            } else {
                debug!("Waiting to retry WOL for {} (delay not reached)", name);
            }
        }
    }

    fn time_out(&mut self, clients: &[ClientConfig], elapsed: f64) {
        if self.pending_down.is_empty() {
            warn!("Battery did not reach the wake threshold within {:.0}s; giving up on this restoration",
                elapsed);
        } else {
            warn!("Some devices failed to come back online within the timeout period.");
            for client in clients.iter().filter(|c| self.pending_down.contains(&c.name)) {
                warn!("{} failed to come back online within timeout period.", client.name);
            }
        }

        let reset = self.config.wake_on.reset_on_timeout;
        self.end_cycle(reset);
    }

    fn end_cycle(&mut self, reset_tracker: bool) {
        self.pending_down.clear();
        self.state = PowerState::Online;
        if reset_tracker {
            self.tracker.reset();
            self.tracker.set_ups_on_battery(false, DEFAULT_BATTERY_PERCENT);
        }
    }
}
