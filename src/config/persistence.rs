//! Config file discovery, load and validation.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::mac::MacAddress;
use crate::config::types::{
    ClientConfig, ConfigError, NutSettings, NutwakeConfig, RawClient, RawConfig,
};
use crate::monitor::MacResolver;

pub const CONFIG_ENV: &str = "NUTWAKE_CONFIG";
pub const CONTAINER_CONFIG_PATH: &str = "/config/config.yaml";
pub const LOCAL_CONFIG_PATH: &str = "config.yaml";

/// Pick the config path: explicit flag, env var, container mount, then cwd.
pub fn resolve_config_path(path: Option<&str>) -> PathBuf {
    if let Some(p) = path {
        return PathBuf::from(p);
    }
    if let Ok(p) = std::env::var(CONFIG_ENV) {
        if !p.trim().is_empty() {
            return PathBuf::from(p);
        }
    }
    if Path::new(CONTAINER_CONFIG_PATH).exists() {
        PathBuf::from(CONTAINER_CONFIG_PATH)
    } else {
        PathBuf::from(LOCAL_CONFIG_PATH)
    }
}

/// Parse raw config text without validation.
pub fn parse_raw_config(content: &str) -> Result<RawConfig> {
    let raw: RawConfig = serde_yaml::from_str(content).context("Failed to parse config file")?;
    Ok(raw)
}

/// Check fields whose absence makes the run impossible.
pub fn validate_config(raw: &RawConfig) -> Result<(), ConfigError> {
    let ups = raw.nut.as_ref().and_then(|n| n.ups.as_deref()).unwrap_or("");
    if ups.trim().is_empty() {
        return Err(ConfigError::MissingField("nut.ups".into()));
    }

    let clients = raw
        .clients
        .as_ref()
        .ok_or_else(|| ConfigError::MissingField("clients".into()))?;

    for (i, client) in clients.iter().enumerate() {
        let name = match client.name.as_deref() {
            Some(n) if !n.trim().is_empty() => n,
            _ => return Err(ConfigError::MissingField(format!("clients[{}].name", i))),
        };
        if client.host.as_deref().map_or(true, |h| h.trim().is_empty()) {
            return Err(ConfigError::MissingField(format!("clients[{}].host ('{}')", i, name)));
        }
        if client.mac.is_none() {
            return Err(ConfigError::MissingField(format!("clients[{}].mac ('{}')", i, name)));
        }
    }

    if raw.poll_interval == 0 {
        return Err(ConfigError::InvalidValue {
            field: "poll_interval".into(),
            reason: "must be at least 1 second".into(),
        });
    }
    if raw.fast_poll_interval == 0 {
        return Err(ConfigError::InvalidValue {
            field: "fast_poll_interval".into(),
            reason: "must be at least 1 second".into(),
        });
    }
    if raw.wake_on.min_battery_percent > 100 {
        return Err(ConfigError::InvalidValue {
            field: "wake_on.min_battery_percent".into(),
            reason: format!("{} is not a percentage", raw.wake_on.min_battery_percent),
        });
    }

    Ok(())
}

/// Turn one validated raw client into a ClientConfig, resolving `mac: auto`.
async fn build_client(raw: &RawClient, resolver: &dyn MacResolver) -> Result<ClientConfig, ConfigError> {
    // validate_config already guaranteed these are present
    let name = raw.name.clone().unwrap_or_default();
    let host = raw.host.clone().unwrap_or_default();
    let mac_field = raw.mac.as_deref().unwrap_or_default().trim();

    let mac = if mac_field.eq_ignore_ascii_case("auto") {
        info!("Resolving MAC for {} at {}...", name, host);
        let resolved = resolver.resolve(&host).await.ok_or_else(|| ConfigError::InvalidValue {
            field: format!("clients.{}.mac", name),
            reason: format!("could not resolve MAC address for {} ({})", name, host),
        })?;
        info!("MAC for {}: {}", name, resolved);
        resolved
    } else {
        mac_field.parse::<MacAddress>().map_err(|e| ConfigError::InvalidValue {
            field: format!("clients.{}.mac", name),
            reason: e.to_string(),
        })?
    };

    Ok(ClientConfig { name, host, mac })
}

fn nut_settings(raw: &RawConfig) -> Result<NutSettings, ConfigError> {
    let raw_nut = raw.nut.clone().ok_or_else(|| ConfigError::MissingField("nut".into()))?;
    Ok(NutSettings {
        ups: raw_nut.ups.unwrap_or_default().trim().to_string(),
        username: raw_nut.username,
        password: raw_nut.password,
    })
}

/// Build the immutable run config. Per-client errors drop only that client.
pub async fn build_config(raw: RawConfig, resolver: &dyn MacResolver) -> Result<NutwakeConfig> {
    validate_config(&raw)?;

    let nut = nut_settings(&raw)?;

    let mut seen = HashSet::new();
    let mut clients = Vec::new();
    for raw_client in raw.clients.as_deref().unwrap_or_default() {
        let name = raw_client.name.as_deref().unwrap_or("?");
        if !seen.insert(name.to_string()) {
            error!("Failed to load client {}: duplicate client name", name);
            continue;
        }
        match build_client(raw_client, resolver).await {
            Ok(client) => clients.push(client),
            Err(e) => error!("Failed to load client {}: {}", name, e),
        }
    }

    if clients.is_empty() {
        warn!("No usable clients configured; nothing will be woken after an outage");
    }

    Ok(NutwakeConfig {
        nut,
        poll_interval: raw.poll_interval,
        fast_poll_interval: raw.fast_poll_interval,
        state_file: raw.state_file,
        log_level: raw.log_level.to_uppercase(),
        wake_on: raw.wake_on,
        clients,
    })
}

pub async fn load_config(path: Option<&str>, resolver: &dyn MacResolver) -> Result<NutwakeConfig> {
    let config_path = resolve_config_path(path);

    let content = tokio::fs::read_to_string(&config_path)
        .await
        .with_context(|| format!("Config file not found at {:?}", config_path))?;
    let raw = parse_raw_config(&content)?;
    let config = build_config(raw, resolver)
        .await
        .with_context(|| format!("Invalid configuration in {:?}", config_path))?;

    info!("Loaded configuration from: {:?}", config_path);
    for client in &config.clients {
        info!("Client: {} at MAC: {}", client.name, client.mac);
    }

    Ok(config)
}

/// Read only the NUT settings. Clients are validated but never resolved.
pub async fn load_nut_settings(path: Option<&str>) -> Result<NutSettings> {
    let config_path = resolve_config_path(path);
    let content = tokio::fs::read_to_string(&config_path)
        .await
        .with_context(|| format!("Config file not found at {:?}", config_path))?;
    let raw = parse_raw_config(&content)?;
    validate_config(&raw).with_context(|| format!("Invalid configuration in {:?}", config_path))?;
    Ok(nut_settings(&raw)?)
}

/// Read only the log level from the config file (used on SIGHUP).
pub async fn load_log_level(path: Option<&str>) -> Result<String> {
    let config_path = resolve_config_path(path);
    let content = tokio::fs::read_to_string(&config_path)
        .await
        .with_context(|| format!("Failed to read {:?}", config_path))?;
    Ok(parse_raw_config(&content)?.log_level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedResolver(Option<MacAddress>);

    #[async_trait]
    impl MacResolver for FixedResolver {
        async fn resolve(&self, _host: &str) -> Option<MacAddress> {
            self.0
        }
    }

    const FULL: &str = r#"
nut:
  ups: "ups@localhost"
  username: monuser
  password: secret
poll_interval: 15
wake_on:
  min_battery_percent: 30
  client_timeout_sec: 600
  reattempt_delay: 45
  restore_delay_sec: 30
clients:
  - name: nas
    host: 192.168.1.10
    mac: "AA:BB:CC:DD:EE:01"
  - name: desktop
    host: 192.168.1.11
    mac: auto
"#;

    #[tokio::test]
    async fn builds_full_config_and_resolves_auto_mac() {
        let resolver = FixedResolver(Some("aa:bb:cc:dd:ee:02".parse().unwrap()));
        let config = build_config(parse_raw_config(FULL).unwrap(), &resolver).await.unwrap();

        assert_eq!(config.nut.ups, "ups@localhost");
        assert_eq!(config.poll_interval, 15);
        assert_eq!(config.fast_poll_interval, 2);
        assert_eq!(config.wake_on.min_battery_percent, 30);
        assert_eq!(config.wake_on.reattempt_delay, 45);
        assert!(config.wake_on.reset_on_timeout);
        assert_eq!(config.clients.len(), 2);
        assert_eq!(config.clients[0].mac.to_string(), "aa:bb:cc:dd:ee:01");
        assert_eq!(config.clients[1].mac.to_string(), "aa:bb:cc:dd:ee:02");
        assert_eq!(config.log_level, "INFO");
    }

    #[tokio::test]
    async fn unresolved_or_bad_mac_drops_only_that_client() {
        let yaml = r#"
nut: { ups: ups }
clients:
  - { name: good, host: a, mac: "00:11:22:33:44:55" }
  - { name: bad, host: b, mac: "00:11:22:33:44" }
  - { name: unresolved, host: c, mac: auto }
  - { name: good, host: d, mac: "00:11:22:33:44:66" }
"#;
        let config = build_config(parse_raw_config(yaml).unwrap(), &FixedResolver(None)).await.unwrap();
        let names: Vec<_> = config.clients.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["good"]);
        assert_eq!(config.clients[0].host, "a");
    }

    #[test]
    fn missing_required_fields_are_fatal() {
        let no_ups = parse_raw_config("nut: {}\nclients: []\n").unwrap();
        assert!(matches!(validate_config(&no_ups), Err(ConfigError::MissingField(f)) if f == "nut.ups"));

        let no_clients = parse_raw_config("nut: { ups: ups }\n").unwrap();
        assert!(matches!(validate_config(&no_clients), Err(ConfigError::MissingField(f)) if f == "clients"));

        let no_host = parse_raw_config("nut: { ups: ups }\nclients:\n  - { name: x, mac: auto }\n").unwrap();
        assert!(validate_config(&no_host).is_err());
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let raw = parse_raw_config("nut: { ups: ups }\npoll_interval: 0\nclients: []\n").unwrap();
        assert!(matches!(validate_config(&raw), Err(ConfigError::InvalidValue { .. })));
    }

    #[tokio::test]
    async fn load_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, FULL).unwrap();

        let resolver = FixedResolver(Some("aa:bb:cc:dd:ee:02".parse().unwrap()));
        let config = load_config(Some(path.to_str().unwrap()), &resolver).await.unwrap();
        assert_eq!(config.clients.len(), 2);

        let level = load_log_level(Some(path.to_str().unwrap())).await.unwrap();
        assert_eq!(level, "INFO");
    }

    #[tokio::test]
    async fn nut_settings_load_without_resolving_clients() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "nut: { ups: ups@nas, username: mon, password: pw }\nclients:\n  - { name: pc, host: 10.9.9.9, mac: auto }\n",
        )
        .unwrap();

        let nut = load_nut_settings(Some(path.to_str().unwrap())).await.unwrap();
        assert_eq!(nut.ups, "ups@nas");
        assert_eq!(nut.username.as_deref(), Some("mon"));
        assert_eq!(nut.password.as_deref(), Some("pw"));

        std::fs::write(&path, "nut: { ups: ' ' }\nclients: []\n").unwrap();
        assert!(load_nut_settings(Some(path.to_str().unwrap())).await.is_err());
    }

    #[tokio::test]
    async fn load_config_fails_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        let result = load_config(Some(path.to_str().unwrap()), &FixedResolver(None)).await;
        assert!(result.is_err());
    }
}
