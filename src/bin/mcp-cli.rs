use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde_json::{json, Value};

const SESSION_HEADER: &str = "mcp-session-id";

#[derive(Parser)]
#[command(name = "mcp-cli")]
#[command(about = "Operator CLI for the MCP session server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    /// Accept self-signed certificates (local HTTPS testing)
    #[arg(long)]
    insecure: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show server health
    Health,
    /// Show session statistics
    Sessions,
    /// Open a session, ping it and close it again
    Probe,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(cli.insecure)
        .build()?;
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/health", base)).send().await?;
            print_response(res).await?;
        }
        Commands::Sessions => {
            let res = client.get(format!("{}/sessions", base)).send().await?;
            print_response(res).await?;
        }
        Commands::Probe => probe(&client, base).await?,
    }

    Ok(())
}

async fn probe(client: &reqwest::Client, base: &str) -> Result<(), Box<dyn std::error::Error>> {
    let endpoint = format!("{}/mcp", base);
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/event-stream"));

    let init = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-06-18",
            "capabilities": {},
            "clientInfo": { "name": "mcp-cli", "version": env!("CARGO_PKG_VERSION") }
        }
    });
    let res = client.post(&endpoint).headers(headers.clone()).json(&init).send().await?;
    let status = res.status();
    let session_id = res
        .headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body: Value = res.json().await?;
    let Some(session_id) = session_id else {
        eprintln!("Error: initialize returned {} without a session id", status);
        eprintln!("Response: {}", body);
        return Ok(());
    };
    println!("initialize: {} session={}", status, session_id);
    println!("{}", serde_json::to_string_pretty(&body["result"]["serverInfo"])?);

    headers.insert(SESSION_HEADER, HeaderValue::from_str(&session_id)?);

    let initialized = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
    let res = client.post(&endpoint).headers(headers.clone()).json(&initialized).send().await?;
    println!("notifications/initialized: {}", res.status());

    let ping = json!({ "jsonrpc": "2.0", "id": 2, "method": "ping" });
    let res = client.post(&endpoint).headers(headers.clone()).json(&ping).send().await?;
    println!("ping: {}", res.status());

    let res = client.delete(&endpoint).headers(headers).send().await?;
    println!("delete: {}", res.status());

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
