//! xrpl-escrow CLI - session actions as JSON
//!
//!   xrpl-escrow status                      → {connection_state, ...}
//!   xrpl-escrow address --secret <seed>     → {address, key_type, public_key}
//!   xrpl-escrow generate [--funded]         → {address, secret[, balance]}
//!   xrpl-escrow escrow --to <addr> --amount <xrp> --finish <secs> [--cancel <secs>]
//!   xrpl-escrow serve [--port <port>]       → HTTP session API
//!
//! Configuration comes from flags, then the environment, then `.env`:
//!   XRPL_RPC_URL, XRPL_FAUCET_URL, XRPL_EXPLORER_HOST, XRPL_SEED, XRPL_ESCROW_PORT

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};
use std::env;
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::{debug, info};
use xrpl_escrow::logging::init_logging;
use xrpl_escrow::{load_dotenv, EscrowRequest, KeyType, SessionConfig, SessionCoordinator, WalletSession};

fn main() {
    let dotenv = load_dotenv(".env");
    init_logging();
    let _ = rustls::crypto::ring::default_provider().install_default();
    debug!(applied = dotenv, "Loaded .env");

    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);

    if opts.help {
        print_usage();
        return;
    }

    if opts.version {
        println!("xrpl-escrow {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let result = match opts.command.as_deref() {
        Some("address") => cmd_address(&opts),
        Some("generate") if !opts.funded => cmd_generate(&opts),
        Some(cmd @ ("status" | "generate" | "escrow" | "serve")) => run_async(cmd, &opts),
        Some(cmd) => Err(anyhow!("Unknown command: {}", cmd)),
        None => {
            print_usage();
            return;
        }
    };

    let pretty = opts.pretty || (!opts.json && std::io::stdout().is_terminal());
    match result {
        Ok(output) => println!("{}", render(&output, pretty)),
        Err(e) => {
            eprintln!("{}", render(&json!({"error": format!("{:#}", e)}), pretty));
            std::process::exit(1);
        }
    }
}

fn render(value: &Value, pretty: bool) -> String {
    let text = if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
    text.unwrap_or_else(|_| value.to_string())
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    endpoint: Option<String>,
    secret: Option<String>,
    // Escrow options
    destination: Option<String>,
    amount: Option<String>,
    finish: Option<String>,
    cancel: Option<String>,
    // Generate options
    funded: bool,
    ed25519: bool,
    // Server options
    port: Option<u16>,
    // Output options
    json: bool,
    pretty: bool,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        let mut opts = ParsedArgs::default();
        let mut positional = Vec::new();
        let mut i = 0;

        while i < args.len() {
            let arg = &args[i];
            let value = args.get(i + 1).cloned();
            let mut takes_value = |slot: &mut Option<String>| {
                if value.is_some() {
                    *slot = value.clone();
                    i += 1;
                }
            };
            match arg.as_str() {
                "--help" | "-h" => opts.help = true,
                "--version" | "-V" => opts.version = true,
                "--json" => opts.json = true,
                "--pretty" => opts.pretty = true,
                "--funded" => opts.funded = true,
                "--ed25519" => opts.ed25519 = true,
                "--endpoint" | "-e" => takes_value(&mut opts.endpoint),
                "--secret" | "-s" => takes_value(&mut opts.secret),
                "--to" | "--destination" => takes_value(&mut opts.destination),
                "--amount" | "-a" => takes_value(&mut opts.amount),
                "--finish" => takes_value(&mut opts.finish),
                "--cancel" => takes_value(&mut opts.cancel),
                "--port" | "-p" => {
                    let mut port = None;
                    takes_value(&mut port);
                    opts.port = port.and_then(|p| p.parse().ok());
                }
                _ if !arg.starts_with('-') => positional.push(arg.clone()),
                _ => {} // Ignore unknown flags
            }
            i += 1;
        }

        if !positional.is_empty() {
            opts.command = Some(positional.remove(0));
        }

        // Environment is lower priority than flags
        if opts.secret.is_none() {
            opts.secret = env::var("XRPL_SEED").ok().filter(|s| !s.trim().is_empty());
        }
        if opts.port.is_none() {
            opts.port = env::var("XRPL_ESCROW_PORT").ok().and_then(|s| s.parse().ok());
        }

        opts
    }

    fn config(&self) -> SessionConfig {
        let mut config = SessionConfig::from_env();
        if let Some(endpoint) = &self.endpoint {
            config.endpoint_url = Some(endpoint.clone());
        }
        config
    }

    fn key_type(&self) -> KeyType {
        if self.ed25519 { KeyType::Ed25519 } else { KeyType::Secp256k1 }
    }
}

fn print_usage() {
    println!(
        r#"xrpl-escrow - XRP Ledger escrow session

USAGE:
    xrpl-escrow <command> [options]

COMMANDS:
    status                  Connect and print the session view
    address                 Derive the address for --secret (offline)
    generate                New wallet (offline); --funded asks the faucet
    escrow                  Create one escrow from the --secret wallet
    serve                   Start the HTTP session API

CONNECTION OPTIONS:
    --endpoint, -e <url>    Ledger WebSocket URL (env: XRPL_RPC_URL)
    --secret, -s <seed>     Wallet seed (env: XRPL_SEED)

ESCROW OPTIONS:
    --to <address>          Destination account
    --amount, -a <xrp>      Amount in XRP (up to 6 decimals)
    --finish <secs>         Releasable after this many seconds
    --cancel <secs>         Cancellable after this many seconds

GENERATE OPTIONS:
    --funded                Fund the new wallet from the network faucet
    --ed25519               Use an ed25519 key instead of secp256k1

SERVER OPTIONS:
    --port, -p <port>       Server port (default: 8080, env: XRPL_ESCROW_PORT)

OUTPUT OPTIONS:
    --json                  Compact JSON output
    --pretty                Pretty-print JSON
    --version, -V           Print version

SERVER ROUTES:
    GET  /health             → {{status, service, ledger}}
    GET  /session            → {{connection_state, wallet_address, status_message, ...}}
    POST /wallet/import      ← {{secret}}
    POST /wallet/disconnect  ← {{}}
    POST /wallet/generate    ← {{}}
    POST /escrow             ← {{destination, amount, finish_after, cancel_after}}

EXAMPLES:
    xrpl-escrow generate --funded -e wss://s.altnet.rippletest.net:51233
    xrpl-escrow escrow --to rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe --amount 10 --finish 1800 --cancel 3600
    xrpl-escrow status --json | jq .connection_state
"#
    );
}

fn cmd_address(opts: &ParsedArgs) -> Result<Value> {
    let secret = opts.secret.as_deref().ok_or_else(|| anyhow!("Provide --secret or XRPL_SEED"))?;
    let wallet = WalletSession::import_from_secret(secret)?;
    Ok(json!({
        "address": wallet.address(),
        "key_type": wallet.key_type().as_str(),
        "public_key": wallet.public_key(),
    }))
}

fn cmd_generate(opts: &ParsedArgs) -> Result<Value> {
    let wallet = WalletSession::generate_with(opts.key_type())?;
    Ok(json!({
        "address": wallet.address(),
        "secret": wallet.reveal_secret(),
        "key_type": wallet.key_type().as_str(),
    }))
}

fn run_async(command: &str, opts: &ParsedArgs) -> Result<Value> {
    let rt = tokio::runtime::Runtime::new().context("Failed to create runtime")?;
    rt.block_on(async {
        let session = Arc::new(SessionCoordinator::start_rippled(opts.config()).await?);
        let result = match command {
            "status" => serde_json::to_value(session.view().await).map_err(Into::into),
            "generate" => cmd_generate_funded(&session).await,
            "escrow" => cmd_escrow(&session, opts).await,
            "serve" => cmd_serve(session.clone(), opts).await,
            other => Err(anyhow!("Unknown command: {}", other)),
        };
        session.stop().await;
        result
    })
}

async fn cmd_generate_funded(session: &SessionCoordinator) -> Result<Value> {
    let report = session.generate_funded_wallet().await?;
    Ok(serde_json::to_value(report)?)
}

async fn cmd_escrow(session: &SessionCoordinator, opts: &ParsedArgs) -> Result<Value> {
    let secret = opts.secret.as_deref().ok_or_else(|| anyhow!("Provide --secret or XRPL_SEED"))?;
    let destination = opts.destination.clone().ok_or_else(|| anyhow!("Provide --to <address>"))?;
    let amount = opts.amount.clone().ok_or_else(|| anyhow!("Provide --amount <xrp>"))?;

    session.import_wallet(secret).await.context("Invalid seed")?;

    let mut request = EscrowRequest::new(destination, xrpl_escrow::sanitize_amount(&amount));
    request.finish_after = opts.finish.clone();
    request.cancel_after = opts.cancel.clone();

    let outcome = session.submit_escrow(&request).await;
    let explorer_url = session.explorer_url().await;

    if let Some(err) = &outcome.error_message {
        bail!("{}", err);
    }
    let mut value = serde_json::to_value(&outcome)?;
    value["explorer_url"] = json!(explorer_url);
    Ok(value)
}

async fn cmd_serve(session: Arc<SessionCoordinator>, opts: &ParsedArgs) -> Result<Value> {
    if let Some(secret) = opts.secret.as_deref() {
        session.import_wallet(secret).await.context("Invalid seed")?;
    }

    let port = opts.port.unwrap_or(8080);
    let router = xrpl_escrow::create_router(session.clone());
    let addr = format!("0.0.0.0:{}", port);

    info!("xrpl-escrow listening on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /health              - Health check");
    info!("  GET  /session             - Session view");
    debug!("  POST /wallet/import       - Import a seed");
    debug!("  POST /escrow              - Create an escrow");

    let listener = tokio::net::TcpListener::bind(&addr).await.context("Failed to bind")?;

    tokio::select! {
        result = axum::serve(listener, router) => {
            result.context("Server error")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, stopping server...");
        }
    }

    Ok(json!({"status": "stopped"}))
}
