//! Online and known peer listings.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};

#[derive(Deserialize)]
struct PeersResponse {
    peers: Vec<OnlinePeer>,
}

#[derive(Deserialize)]
#[allow(dead_code)]
struct OnlinePeer {
    public_key: String,
    fingerprint: String,
    ip_address: String,
    username: String,
    idle_secs: u64,
    online_secs: u64,
}

#[derive(Deserialize)]
struct KnownPeersResponse {
    peers: Vec<KnownPeer>,
}

#[derive(Deserialize)]
struct KnownPeer {
    public_key: String,
    ip_address: String,
    username: String,
    last_ping_ms: u64,
}

pub async fn cmd_peers(port: u16) -> Result<()> {
    let resp: PeersResponse = get_json(&format!("{}/peers", base_url(port))).await?;

    if resp.peers.is_empty() {
        println!("No peers online.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Online Peers ({})", resp.peers.len());
    println!("═══════════════════════════════════════");

    for p in &resp.peers {
        println!("  ┌─ {} [{}]", p.username, p.fingerprint);
        println!("  │  address   : {}", p.ip_address);
        println!("  │  online    : {}s", p.online_secs);
        println!("  └─ last ping : {}s ago", p.idle_secs);
    }

    Ok(())
}

pub async fn cmd_known(port: u16) -> Result<()> {
    let resp: KnownPeersResponse = get_json(&format!("{}/peers/known", base_url(port))).await?;

    if resp.peers.is_empty() {
        println!("No peers in the store.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Known Peers ({})", resp.peers.len());
    println!("═══════════════════════════════════════");

    for p in &resp.peers {
        println!("  ┌─ {}", p.username);
        println!("  │  public key : {}", p.public_key);
        println!("  │  address    : {}", p.ip_address);
        println!("  └─ last ping  : {} (unix ms)", p.last_ping_ms);
    }

    Ok(())
}
