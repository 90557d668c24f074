//! Telemetry relay server
//!
//! Run with: cargo run --example telemetry_server -- [OPTIONS]
//!
//! Settings come from flags or the environment (a `.env` file is loaded
//! first):
//!
//!   PORT                 listening port (default 3000)
//!   BIND_ADDR            listening address (default 0.0.0.0)
//!   DATABASE_URL         Postgres URL; without it journeys are kept in memory
//!   DB_POOL_SIZE         Postgres pool size (default 20)
//!   MAX_CONNECTIONS      connection limit, 0 = unlimited
//!   IDLE_TIMEOUT_SECS    close silent connections, 0 = never
//!   MAX_JOURNEY_SAMPLES  checkpoint journeys at this many samples, 0 = never
//!
//! ## Trying it out
//!
//! With websocat, watch a vehicle:
//!   websocat ws://localhost:3000
//!   {"event":"subscribe","data":"1HGCM82633A004352"}
//!
//! And from a second terminal, report for it:
//!   websocat ws://localhost:3000
//!   {"event":"telemetry","data":{"vin":"1HGCM82633A004352","vehicleSpeed":42,"fuelLevel":70}}
//!
//! Without a database, register VINs so their journeys are kept:
//!   cargo run --example telemetry_server -- --register 1HGCM82633A004352=1

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use obd_relay::store::{InMemoryStore, JourneyBackend, PostgresConfig, PostgresStore};
use obd_relay::{ServerConfig, SessionConfig, TelemetryServer};

#[derive(Parser, Debug)]
#[command(author, version, about = "Real-time OBD telemetry relay")]
struct Args {
    /// Listening port
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Listening address
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    bind_addr: IpAddr,

    /// Postgres connection URL
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Postgres pool size
    #[arg(long, env = "DB_POOL_SIZE", default_value_t = 20)]
    db_pool_size: usize,

    /// Maximum concurrent connections (0 = unlimited)
    #[arg(long, env = "MAX_CONNECTIONS", default_value_t = 0)]
    max_connections: usize,

    /// Idle timeout in seconds (0 = disabled)
    #[arg(long, env = "IDLE_TIMEOUT_SECS", default_value_t = 0)]
    idle_timeout_secs: u64,

    /// Samples per journey before checkpointing (0 = unbounded)
    #[arg(long, env = "MAX_JOURNEY_SAMPLES", default_value_t = 0)]
    max_journey_samples: usize,

    /// Seconds between stats reports (0 = never)
    #[arg(long, default_value_t = 30)]
    stats_interval_secs: u64,

    /// In-memory only: register a vehicle as VIN=ID (repeatable)
    #[arg(long = "register", value_parser = parse_registration)]
    registrations: Vec<(String, i64)>,
}

fn parse_registration(s: &str) -> Result<(String, i64), String> {
    let (vin, id) = s
        .split_once('=')
        .ok_or_else(|| format!("expected VIN=ID, got '{}'", s))?;
    let id = id
        .parse()
        .map_err(|e| format!("invalid vehicle id '{}': {}", id, e))?;
    Ok((vin.to_string(), id))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("obd_relay=info,telemetry_server=info")
                }),
        )
        .init();

    let server_config = ServerConfig::with_addr(SocketAddr::new(args.bind_addr, args.port))
        .max_connections(args.max_connections)
        .idle_timeout(Duration::from_secs(args.idle_timeout_secs));
    let session_config = SessionConfig::default().max_journey_samples(args.max_journey_samples);

    match &args.database_url {
        Some(url) => {
            let pg = PostgresConfig::new(url.clone()).max_connections(args.db_pool_size);
            let store = PostgresStore::connect(&pg)
                .await
                .context("failed to connect to Postgres")?;
            serve(&args, server_config, session_config, Arc::new(store)).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, journeys are kept in memory");
            let store = InMemoryStore::new();
            for (vin, id) in &args.registrations {
                store.register_vehicle(vin.clone(), *id).await;
            }
            serve(&args, server_config, session_config, Arc::new(store)).await
        }
    }
}

async fn serve<B: JourneyBackend>(
    args: &Args,
    server_config: ServerConfig,
    session_config: SessionConfig,
    store: Arc<B>,
) -> anyhow::Result<()> {
    let server = Arc::new(TelemetryServer::new(server_config, session_config, store));

    if args.stats_interval_secs > 0 {
        let sessions = server.sessions().clone();
        let period = Duration::from_secs(args.stats_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Ok(stats) = sessions.stats().await else {
                    break;
                };
                tracing::info!(
                    connections = stats.active_connections,
                    vehicles = stats.active_vehicles,
                    samples = stats.samples_received,
                    updates = stats.updates_delivered,
                    dropped = stats.updates_dropped,
                    saved = stats.journeys_saved,
                    pending = stats.journeys_pending(),
                    "Relay stats"
                );
            }
        });
    }

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("server failed")?;

    tracing::info!("Server stopped");
    Ok(())
}
