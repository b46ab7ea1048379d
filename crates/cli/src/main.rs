//! netdiag CLI - Command-line client for the netdiag daemon

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8080";

#[derive(Parser)]
#[command(name = "netdiag")]
#[command(about = "Network diagnostics client", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "NETDIAG_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// DNS lookup
    Dig {
        domain: String,

        /// Record type (A, AAAA, MX, TXT, ...)
        #[arg(short = 't', long = "type")]
        record_type: Option<String>,
    },

    /// Send ICMP echo requests
    Ping {
        host: String,

        /// Number of packets (1-10)
        #[arg(short, long)]
        count: Option<u8>,
    },

    /// Trace the route to a host
    Traceroute { host: String },

    /// Port scan (unprivileged scan types only)
    Nmap {
        host: String,

        /// Extra nmap options, e.g. "-p 22,80 -sV"
        #[arg(short, long, allow_hyphen_values = true)]
        options: Option<String>,
    },

    /// Domain registration lookup
    Whois { domain: String },

    /// Check that the daemon is up
    Health,

    /// Show admission queue statistics
    Stats,
}

impl Commands {
    /// JSON-RPC method and params for this command
    fn to_rpc(&self) -> (&'static str, serde_json::Value) {
        match self {
            Commands::Dig {
                domain,
                record_type,
            } => ("net.dig.v1", json!({ "domain": domain, "type": record_type })),
            Commands::Ping { host, count } => {
                ("net.ping.v1", json!({ "host": host, "count": count }))
            }
            Commands::Traceroute { host } => ("net.traceroute.v1", json!({ "host": host })),
            Commands::Nmap { host, options } => {
                ("net.nmap.v1", json!({ "host": host, "options": options }))
            }
            Commands::Whois { domain } => ("net.whois.v1", json!({ "domain": domain })),
            Commands::Health => ("admin.health.v1", json!({})),
            Commands::Stats => ("admin.stats.v1", json!({})),
        }
    }
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize)]
struct StatsResult {
    active: usize,
    pending: usize,
    max_concurrency: usize,
    max_pending: Option<usize>,
    dispatched_total: u64,
    completed_total: u64,
    failed_total: u64,
    rejected_total: u64,
    uptime_seconds: u64,
}

#[derive(Tabled)]
struct StatsRow {
    active: String,
    pending: String,
    dispatched: u64,
    completed: u64,
    failed: u64,
    rejected: u64,
}

impl From<&StatsResult> for StatsRow {
    fn from(stats: &StatsResult) -> Self {
        Self {
            active: format!("{}/{}", stats.active, stats.max_concurrency),
            pending: match stats.max_pending {
                Some(limit) => format!("{}/{}", stats.pending, limit),
                None => stats.pending.to_string(),
            },
            dispatched: stats.dispatched_total,
            completed: stats.completed_total,
            failed: stats.failed_total,
            rejected: stats.rejected_total,
        }
    }
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (method, params) = cli.command.to_rpc();

    match cli.command {
        Commands::Health => match call_rpc(&cli.rpc_url, method, params).await {
            Ok(result) => {
                let status = result["status"].as_str().unwrap_or("UNKNOWN");
                println!("  {} {}", "RPC URL:".bold(), cli.rpc_url);
                println!("  {} {}", "Status:".bold(), status.green());
            }
            Err(e) => {
                println!("  {} {}", "Status:".bold(), "ERROR".red());
                println!("  {} {}", "Error:".bold(), e);
                std::process::exit(1);
            }
        },

        Commands::Stats => {
            let result = call_rpc(&cli.rpc_url, method, params).await?;
            let stats: StatsResult = serde_json::from_value(result)?;

            println!("{}", "Admission Queue".cyan().bold());
            println!();
            println!("{}", Table::new(vec![StatsRow::from(&stats)]));
            println!("  {} {} seconds", "Uptime:".bold(), stats.uptime_seconds);
        }

        _ => {
            let result = call_rpc(&cli.rpc_url, method, params)
                .await
                .with_context(|| format!("{} failed", method))?;
            match result["result"].as_str() {
                Some(output) => print!("{}", output),
                None => println!("{}", "Empty result".yellow()),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dig_params_use_type_key() {
        let cli = Cli::parse_from(["netdiag", "dig", "example.com", "-t", "MX"]);
        let (method, params) = cli.command.to_rpc();
        assert_eq!(method, "net.dig.v1");
        assert_eq!(params, json!({ "domain": "example.com", "type": "MX" }));
    }

    #[test]
    fn test_nmap_accepts_hyphenated_options() {
        let cli = Cli::parse_from(["netdiag", "nmap", "scanme.nmap.org", "-o", "-p 22 -sV"]);
        let (method, params) = cli.command.to_rpc();
        assert_eq!(method, "net.nmap.v1");
        assert_eq!(params["options"], "-p 22 -sV");
    }

    #[test]
    fn test_stats_row_formats_limits() {
        let stats = StatsResult {
            active: 2,
            pending: 3,
            max_concurrency: 8,
            max_pending: Some(16),
            dispatched_total: 10,
            completed_total: 8,
            failed_total: 1,
            rejected_total: 0,
            uptime_seconds: 60,
        };
        let row = StatsRow::from(&stats);
        assert_eq!(row.active, "2/8");
        assert_eq!(row.pending, "3/16");
    }
}
