//! Janus - Main Entry Point
//!
//! Opens the symbol registry, wires the order router and the trade-event
//! engine, and runs until interrupted.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use janus::common::channels::create_order_channel;
use janus::config::types::DatabaseConfig;
use janus::config::{load_config, AppConfig};
use janus::registry::{InMemorySymbolStore, PostgresSymbolStore, SymbolStore};
use janus::{OrderIntent, OrderRouter, SymbolRegistry, TradeEventEngine};

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error); overrides the configuration file
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Symbol registry database URL (overrides the configuration file)
    #[arg(long, env = "JANUS_DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the router and trade-event engine until ctrl-c (default)
    Serve,
    /// Print every symbol registry record
    Symbols,
    /// Validate and normalize an order intent given as JSON
    CheckIntent {
        /// e.g. '{"action":"buy","symbol":"AAPL","volume":1}'
        intent: String,
    },
}

impl Args {
    /// `--log-level` when given, else the configured level
    fn log_level<'a>(&'a self, config: &'a AppConfig) -> &'a str {
        self.log_level.as_deref().unwrap_or(&config.settings.log_level)
    }
}

fn init_logging(log_level: &str, json: bool) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // RUST_LOG wins over --log-level when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

async fn open_registry(config: &AppConfig) -> Result<Arc<SymbolRegistry>> {
    let store: Arc<dyn SymbolStore> = match config.database {
        Some(ref database) => {
            info!("Opening symbol registry database");
            Arc::new(
                PostgresSymbolStore::connect(database)
                    .await
                    .context("connecting to symbol registry database")?,
            )
        }
        None => {
            warn!("No database configured, symbol registry is in-memory only");
            Arc::new(InMemorySymbolStore::new())
        }
    };

    let registry = SymbolRegistry::open(store)
        .await
        .context("loading symbol registry")?;
    Ok(Arc::new(registry))
}

async fn serve(config: AppConfig, registry: Arc<SymbolRegistry>) -> Result<()> {
    let (notifier, mut updates) = create_order_channel();
    let router = Arc::new(OrderRouter::new(registry, config.router.clone(), notifier));
    let engine = Arc::new(TradeEventEngine::for_router(router.clone(), config.trade_events.clone()));

    // Broker SDK adapters are linked in by the embedding application; here
    // every configured gateway is only announced.
    for gateway in &config.gateways {
        let settings = config.trade_events_for(gateway);
        info!(
            "Gateway {} ({}) configured, trade events {}",
            gateway.name,
            gateway.broker,
            if settings.enabled { "enabled" } else { "disabled" }
        );
    }

    let updates_task = tokio::spawn(async move {
        while let Some(state) = updates.recv().await {
            info!(
                "Order {} {} {} {}/{}",
                state.order_ref(),
                state.symbol,
                state.status,
                state.traded,
                state.volume
            );
        }
    });
    let health_task = engine.clone().run_health_ticks();

    info!("Janus running with {} gateways", router.gateway_names().await.len());

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal, cleaning up...");

    health_task.abort();
    engine.shutdown().await;
    updates_task.abort();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load environment variables from .env file if present, before RUST_LOG is read
    dotenvy::dotenv().ok();

    let mut config = load_config(Some(&args.config))?;
    init_logging(args.log_level(&config), args.json_logs)?;

    info!("Starting Janus");
    info!("Configuration file: {}", args.config);

    if let Some(url) = args.database_url {
        config.database = Some(match config.database.take() {
            Some(database) => DatabaseConfig { url, ..database },
            None => DatabaseConfig::new(url),
        });
    }

    match args.command.unwrap_or(Command::Serve) {
        Command::CheckIntent { intent } => {
            let value: serde_json::Value = serde_json::from_str(&intent).context("parsing intent JSON")?;
            match OrderIntent::from_value(&value, &config.router) {
                Ok(intent) => println!("{:#?}", intent),
                Err(e) => println!("Rejected: {}", e.reason()),
            }
        }
        Command::Symbols => {
            let registry = open_registry(&config).await?;
            for record in registry.list_records().await {
                println!(
                    "{:<12} {:<8} {:<4} conid={:<12} ticker={:<8} {}",
                    record.canonical_symbol,
                    record.asset_class,
                    record.currency,
                    record.ib_conid.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
                    record.webull_ticker.as_deref().unwrap_or("-"),
                    record.description.as_deref().unwrap_or("")
                );
            }
        }
        Command::Serve => {
            let registry = open_registry(&config).await?;
            serve(config, registry).await?;
        }
    }

    Ok(())
}
