//! Subprocess executor for the NUT client, ping and arp.
//! Every command runs under a timeout so a hung tool cannot stall a tick.

use anyhow::{anyhow, Context, Result};
use std::time::Duration;
use tracing::{debug, trace};

pub const UPSC_TIMEOUT: Duration = Duration::from_secs(5);
pub const PING_TIMEOUT: Duration = Duration::from_secs(5);
pub const ARP_TIMEOUT: Duration = Duration::from_secs(5);

/// Build an `upsc <ups>` Command.
/// Credentials, when configured, are handed to the child through its environment.
pub fn build_upsc_command(
    ups: &str,
    username: Option<&str>,
    password: Option<&str>,
) -> std::process::Command {
    let mut cmd = std::process::Command::new("upsc");
    cmd.arg(ups);

    if let (Some(user), Some(pass)) = (username, password) {
        debug!("Passing NUT credentials for user '{}' to upsc", user);
        cmd.env("USERNAME", user).env("PASSWORD", pass);
    }

    cmd
}

/// Build a single-echo ping Command for the current platform.
/// The reply wait is capped at one second so an offline host fails fast.
pub fn build_ping_command(host: &str) -> std::process::Command {
    let (count_flag, wait_flag, wait) = if cfg!(target_os = "windows") {
        ("-n", "-w", "1000") // milliseconds
    } else if cfg!(target_os = "macos") {
        ("-c", "-W", "1000") // milliseconds
    } else {
        ("-c", "-W", "1") // seconds
    };

    let mut cmd = std::process::Command::new("ping");
    cmd.args([count_flag, "1", wait_flag, wait, host]);
    cmd
}

async fn output_with_timeout(
    cmd: std::process::Command,
    limit: Duration,
    what: &str,
) -> Result<std::process::Output> {
    let mut cmd = tokio::process::Command::from(cmd);
    cmd.kill_on_drop(true);

    tokio::time::timeout(limit, cmd.output())
        .await
        .map_err(|_| anyhow!("{} timed out after {:?}", what, limit))?
        .with_context(|| format!("Failed to execute {}", what))
}

/// Execute `upsc <ups>` and return its stdout.
pub async fn run_upsc(ups: &str, username: Option<&str>, password: Option<&str>) -> Result<String> {
    let cmd = build_upsc_command(ups, username, password);
    trace!("Executing: upsc {}", ups);

    let output = output_with_timeout(cmd, UPSC_TIMEOUT, "upsc").await?;

    if !output.status.success() {
        return Err(anyhow!(
            "upsc returned error: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Execute one ping; Ok(true) iff the host answered.
pub async fn run_ping(host: &str) -> Result<bool> {
    let mut cmd = build_ping_command(host);
    cmd.stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());

    let output = output_with_timeout(cmd, PING_TIMEOUT, "ping").await?;
    Ok(output.status.success())
}

/// Execute `arp -n <host>` and return its stdout.
pub async fn run_arp(host: &str) -> Result<String> {
    let mut cmd = std::process::Command::new("arp");
    cmd.args(["-n", host]);

    debug!("Executing: arp -n {}", host);

    let output = output_with_timeout(cmd, ARP_TIMEOUT, "arp").await?;
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsc_command_carries_credentials_only_when_both_set() {
        let cmd = build_upsc_command("ups@nas", Some("monuser"), Some("secret"));
        let envs: Vec<_> = cmd.get_envs().collect();
        assert_eq!(envs.len(), 2);
        assert_eq!(cmd.get_args().collect::<Vec<_>>(), vec!["ups@nas"]);

        let cmd = build_upsc_command("ups@nas", Some("monuser"), None);
        assert_eq!(cmd.get_envs().count(), 0);
    }

    #[test]
    fn ping_command_sends_one_echo() {
        let cmd = build_ping_command("10.0.0.5");
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().to_string()).collect();
        assert_eq!(args.len(), 5);
        assert_eq!(args[1], "1");
        assert_eq!(args[4], "10.0.0.5");
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn ping_reply_wait_is_shorter_than_process_timeout() {
        let cmd = build_ping_command("10.0.0.5");
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().to_string()).collect();
        assert_eq!(&args[..4], ["-c", "1", "-W", "1"]);
        assert!(Duration::from_secs(args[3].parse().unwrap()) < PING_TIMEOUT);
    }
}
