//! Daemon status and shutdown commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json, post_json};

#[derive(Deserialize)]
struct StatusResponse {
    online_peers: usize,
    known_peers: Option<usize>,
    uptime_secs: u64,
    inactivity_timeout_secs: u64,
    sweep_interval_secs: u64,
    roster_source: String,
    reaper: ReaperInfo,
}

#[derive(Deserialize)]
struct ReaperInfo {
    sweeps: u64,
    evictions: u64,
    store_failures: u64,
}

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    let known = resp
        .known_peers
        .map(|n| n.to_string())
        .unwrap_or_else(|| "unavailable".to_string());

    println!("═══════════════════════════════════════");
    println!("  Rendezvous Daemon Status");
    println!("═══════════════════════════════════════");
    println!("  Online peers     : {}", resp.online_peers);
    println!("  Known peers      : {}", known);
    println!("  Uptime           : {}s", resp.uptime_secs);
    println!("  Roster source    : {}", resp.roster_source);
    println!("  Inactivity limit : {}s", resp.inactivity_timeout_secs);
    println!("  Sweep interval   : {}s", resp.sweep_interval_secs);
    println!("\n  Reaper:");
    println!("    sweeps         : {}", resp.reaper.sweeps);
    println!("    evictions      : {}", resp.reaper.evictions);
    if resp.reaper.store_failures > 0 {
        println!("    store failures : {}", resp.reaper.store_failures);
    }

    Ok(())
}

pub async fn cmd_shutdown(port: u16) -> Result<()> {
    #[derive(Deserialize)]
    struct ShutdownResponse {
        message: String,
    }

    let resp: ShutdownResponse = post_json(&format!("{}/daemon/shutdown", base_url(port))).await?;
    println!("{}", resp.message);
    Ok(())
}
