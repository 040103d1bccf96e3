use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::config::persistence::{load_config, load_nut_settings, parse_raw_config, resolve_config_path};
use crate::monitor::{
    ArpMacResolver, NutUpsMonitor, OnlineChecker, PingChecker, UpsReading, UpsStatusProvider,
};
use crate::state::{JsonFileStore, PersistedState, StateStore};

fn banner() {
    println!("\x1b[32mnutwake v{} ({})\x1b[0m", env!("CARGO_PKG_VERSION"), std::env::consts::ARCH);
}

/// State file path from the flag, else from the config file, else the default.
pub async fn state_file_path(config_path: Option<&str>, state_file: Option<&str>) -> PathBuf {
    if let Some(p) = state_file {
        return PathBuf::from(p);
    }
    let path = resolve_config_path(config_path);
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => parse_raw_config(&content)
            .map(|raw| raw.state_file)
            .unwrap_or_else(|_| crate::config::types::default_state_file()),
        Err(_) => crate::config::types::default_state_file(),
    }
}

pub fn render_state(state: &PersistedState) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "UPS on battery: {}\nBattery at power loss: {}%\n",
        if state.meta.ups_on_battery { "yes" } else { "no" },
        state.meta.battery_percent_at_shutdown
    ));

    if state.clients.is_empty() {
        out.push_str("\nNo client state recorded\n");
        return out;
    }

    out.push_str(&format!(
        "\n{:<20} {:<8} {:<14} {:<9} {:<5}\n",
        "CLIENT", "ONLINE", "WAS ONLINE", "WOL SENT", "SKIP"
    ));
    for (name, s) in &state.clients {
        out.push_str(&format!(
            "{:<20} {:<8} {:<14} {:<9} {:<5}\n",
            name,
            yes_no(s.is_online),
            yes_no(s.was_online_before_battery),
            yes_no(s.wol_sent),
            yes_no(s.skip)
        ));
    }
    out
}

fn yes_no(v: bool) -> &'static str {
    if v { "yes" } else { "no" }
}

pub async fn show_status(config_path: Option<&str>, state_file: Option<&str>) -> Result<()> {
    banner();
    println!("================================");

    let path = state_file_path(config_path, state_file).await;
    println!("State file: {}", path.display());

    match JsonFileStore::new(&path).load() {
        Ok(Some(state)) => print!("{}", render_state(&state)),
        Ok(None) => println!("No state recorded yet"),
        Err(e) => println!("Error: {}", e),
    }

    Ok(())
}

fn state_dir_writable(path: &Path) -> bool {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::metadata(&dir).map(|m| m.is_dir() && !m.permissions().readonly()).unwrap_or(false)
}

/// One-shot check of config, UPS and client reachability.
pub async fn run_health_check(config_path: Option<&str>, state_file: Option<&str>) -> Result<()> {
    banner();
    println!("Health Check");
    println!("============\n");

    let mut all_ok = true;

    let config = match load_config(config_path, &ArpMacResolver).await {
        Ok(c) => {
            println!("✓ Config file: {}", resolve_config_path(config_path).display());
            c
        }
        Err(e) => {
            println!("✗ Config file: {:#}", e);
            return Ok(());
        }
    };

    let state_path = state_file.map(PathBuf::from).unwrap_or_else(|| config.state_file.clone());
    if state_dir_writable(&state_path) {
        println!("✓ State file: {}", state_path.display());
    } else {
        println!("✗ State file directory not writable: {}", state_path.display());
        all_ok = false;
    }

    let vars = NutUpsMonitor::new(&config.nut).query(&config.nut.ups).await;
    if vars.is_empty() {
        println!("✗ UPS '{}': no data from upsc", config.nut.ups);
        all_ok = false;
    } else {
        let reading = UpsReading::from_vars(&vars);
        println!("✓ UPS '{}': {} ({}%)", config.nut.ups, reading.power_status, reading.battery_percent);
    }

    let checker = PingChecker;
    for client in &config.clients {
        if checker.probe(&client.host).await {
            println!("✓ Client {} ({}, {}): online", client.name, client.host, client.mac);
        } else {
            println!("⚠ Client {} ({}, {}): offline", client.name, client.host, client.mac);
        }
    }

    println!();
    if all_ok {
        println!("\x1b[32m✓ All checks passed!\x1b[0m");
    } else {
        println!("\x1b[33m⚠ Some issues found - see above\x1b[0m");
    }

    Ok(())
}

/// One-shot UPS query.
pub async fn run_ups_test(config_path: Option<&str>) -> Result<()> {
    let nut = load_nut_settings(config_path).await?;
    let vars = NutUpsMonitor::new(&nut).query(&nut.ups).await;
    let reading = UpsReading::from_vars(&vars);

    println!("UPS: {}", nut.ups);
    println!("Power status: {}", reading.power_status);
    println!("Battery: {}%", reading.battery_percent);
    if vars.is_empty() {
        println!("(no data returned; values above are defaults)");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ClientState;

    #[test]
    fn renders_meta_and_clients() {
        let mut state = PersistedState::default();
        state.meta.ups_on_battery = true;
        state.meta.battery_percent_at_shutdown = 40;
        state.clients.insert("nas".into(), ClientState { is_online: true, ..Default::default() });

        let text = render_state(&state);
        assert!(text.contains("UPS on battery: yes"));
        assert!(text.contains("40%"));
        assert!(text.lines().any(|l| l.starts_with("nas") && l.contains("yes")));
    }

    #[test]
    fn renders_empty_state() {
        assert!(render_state(&PersistedState::default()).contains("No client state recorded"));
    }

    #[tokio::test]
    async fn state_path_prefers_flag_then_config() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("config.yaml");
        std::fs::write(&cfg, "nut: { ups: ups }\nstate_file: /var/lib/nutwake/state.json\nclients: []\n").unwrap();
        let cfg = cfg.to_str().unwrap();

        assert_eq!(state_file_path(Some(cfg), Some("x.json")).await, PathBuf::from("x.json"));
        assert_eq!(state_file_path(Some(cfg), None).await, PathBuf::from("/var/lib/nutwake/state.json"));
    }
}
