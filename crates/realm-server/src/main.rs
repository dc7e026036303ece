//! Realm game server entry point.
//!
//! Loads the configuration, builds the immutable registries, places the
//! boot-time world, and runs the TCP accept loop until Ctrl-C.
//!
//! # Usage
//!
//! ```text
//! realm-server [OPTIONS]
//!
//! Options:
//!   --config    <PATH>   TOML configuration file [default: realm.toml]
//!   --port      <PORT>   Override `[server] port`
//!   --log-level <LEVEL>  Override `[server] log_level`
//! ```
//!
//! Each option can also be given through the environment (`REALM_CONFIG`,
//! `REALM_PORT`, `REALM_LOG_LEVEL`); `RUST_LOG` overrides the log level
//! altogether.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()           -- TOML file, defaults when absent
//!  └─ build_taxonomy()        -- entity kinds; aborts boot if inconsistent
//!  └─ standard_registry()     -- opcode tables; aborts boot if inconsistent
//!  └─ World::populate()       -- NPCs, items, matching rooms
//!  └─ run_server()            -- accept loop, one task pair per connection
//! ```

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use realm_core::{standard_registry, InstanceType};
use realm_server::application::collaborators::StandardCombatRules;
use realm_server::application::context::ServerContext;
use realm_server::application::coordinator::Coordinator;
use realm_server::infrastructure::network::server::run_server;
use realm_server::infrastructure::storage::config::{load_config, AppConfig};
use realm_server::infrastructure::storage::data_store::ConfigDataStore;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Realm game server.
#[derive(Debug, Parser)]
#[command(name = "realm-server", about = "Game server communication core", version)]
struct Cli {
    /// Path to the TOML configuration file.  A missing file means defaults.
    #[arg(long, default_value = "realm.toml", env = "REALM_CONFIG")]
    config: PathBuf,

    /// TCP port to listen on, overriding the config file.
    #[arg(long, env = "REALM_PORT")]
    port: Option<u16>,

    /// Log level, overriding the config file.
    #[arg(long, env = "REALM_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Applies command-line overrides on top of the loaded file.
    fn apply(&self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(level) = &self.log_level {
            config.server.log_level = level.clone();
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    cli.apply(&mut config);

    // Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    info!("Realm server starting");

    let taxonomy = InstanceType::build_taxonomy().context("entity taxonomy is inconsistent")?;
    let registry = standard_registry().context("opcode registry is inconsistent")?;
    let store = ConfigDataStore::from_config(&config);
    info!(
        kinds = taxonomy.len(),
        inbound = registry.inbound_len(),
        outbound = registry.outbound_len(),
        characters = store.character_count(),
        "registries built"
    );

    let ctx = Arc::new(ServerContext::new(
        registry,
        taxonomy,
        Arc::new(StandardCombatRules),
        Arc::new(store),
        config.execution_settings(),
    ));
    ctx.world.populate(&config.npcs, &config.items, &config.rooms).await;

    let coordinator = Arc::new(Coordinator::new(Arc::clone(&ctx), config.session_settings()));

    let bind = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind game listener on {bind}"))?;

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => error!("failed to listen for Ctrl-C signal: {e}"),
        }
    });

    run_server(listener, coordinator, running).await?;

    info!("Realm server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
