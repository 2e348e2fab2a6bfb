//! rendezvous-ctl — command-line interface for the rendezvous daemon.

mod cmd;

use anyhow::{Context, Result};

use cmd::peers::{cmd_known, cmd_peers};
use cmd::status::{cmd_shutdown, cmd_status};

const DEFAULT_PORT: u16 = 9101;

fn print_usage() {
    println!("Usage: rendezvous-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status        Show daemon status and reaper counters");
    println!("  peers         List peers currently online");
    println!("  known         List peers recorded in the store");
    println!("  shutdown      Stop the daemon");
    println!();
    println!("Options:");
    println!("  --port <port>   Status API port (default: {})", DEFAULT_PORT);
}

/// Split `--port` out of the argument list.
fn parse_args(args: &[String]) -> Result<(u16, Vec<&str>)> {
    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args
                .get(i)
                .context("--port requires a value")?
                .parse()
                .context("--port must be a number")?;
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }
    Ok((port, remaining))
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (port, remaining) = parse_args(&args)?;

    match remaining.as_slice() {
        ["status"] | []                => cmd_status(port).await,
        ["peers"]                      => cmd_peers(port).await,
        ["known"]                      => cmd_known(port).await,
        ["shutdown"]                   => cmd_shutdown(port).await,
        ["help"] | ["--help"] | ["-h"] => { print_usage(); Ok(()) }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
