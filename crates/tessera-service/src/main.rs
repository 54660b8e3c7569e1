use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use tessera_core::{CollectionConfig, StorageConfig};
use tessera_service::{build_router, ServiceConfig, ServiceState};
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LedgerStorageMode {
    Auto,
    Memory,
    Postgres,
}

#[derive(Debug, Parser)]
#[command(name = "tesserad", version, about = "Tessera issuance REST service")]
struct Cli {
    /// REST socket address to bind, e.g. 127.0.0.1:8091
    #[arg(long, default_value = "127.0.0.1:8091")]
    listen: SocketAddr,
    /// Ledger persistence backend. `auto` picks postgres when database url is configured.
    #[arg(long, value_enum, default_value_t = LedgerStorageMode::Auto, env = "TESSERA_LEDGER_STORAGE")]
    ledger_storage: LedgerStorageMode,
    /// PostgreSQL url for record log persistence.
    #[arg(long, env = "TESSERA_DATABASE_URL")]
    database_url: Option<String>,
    /// Max PostgreSQL pool connections for record log persistence.
    #[arg(long, default_value_t = 5, env = "TESSERA_PG_MAX_CONNECTIONS")]
    pg_max_connections: u32,
    /// Collection display name.
    #[arg(long, default_value = "Tessera", env = "TESSERA_COLLECTION_NAME")]
    collection_name: String,
    /// Collection ticker symbol.
    #[arg(long, default_value = "TSR", env = "TESSERA_COLLECTION_SYMBOL")]
    collection_symbol: String,
    /// Price per token in minor currency units.
    #[arg(long, default_value_t = 10, env = "TESSERA_COST_PER_UNIT")]
    cost_per_unit: u64,
    /// Hard cap on the number of tokens that can ever exist.
    #[arg(long, default_value_t = 10_000, env = "TESSERA_MAX_SUPPLY")]
    max_supply: u64,
    /// Unix second (inclusive) from which minting is allowed.
    #[arg(long, default_value_t = 0, env = "TESSERA_ALLOW_MINTING_ON")]
    allow_minting_on: u64,
    /// Prefix for per-token metadata URIs.
    #[arg(long, default_value = "ipfs://tessera/", env = "TESSERA_BASE_URI")]
    base_uri: String,
    /// Identity allowed to withdraw the treasury.
    #[arg(long, env = "TESSERA_AUTHORITY")]
    authority: String,
}

fn resolve_storage(cli: &Cli) -> anyhow::Result<StorageConfig> {
    let resolved_url = cli
        .database_url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok());

    let storage = match cli.ledger_storage {
        LedgerStorageMode::Memory => StorageConfig::Memory,
        LedgerStorageMode::Postgres => {
            let database_url = resolved_url.ok_or_else(|| {
                anyhow::anyhow!(
                    "ledger_storage=postgres requires --database-url or DATABASE_URL"
                )
            })?;
            StorageConfig::postgres(database_url, cli.pg_max_connections)
        }
        LedgerStorageMode::Auto => {
            if let Some(database_url) = resolved_url {
                StorageConfig::postgres(database_url, cli.pg_max_connections)
            } else {
                StorageConfig::Memory
            }
        }
    };

    Ok(storage)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "tessera_service=info,info".to_string()),
        )
        .init();

    let cli = Cli::parse();
    let storage = resolve_storage(&cli)?;
    let collection = CollectionConfig::new(
        &cli.collection_name,
        &cli.collection_symbol,
        cli.cost_per_unit,
        cli.max_supply,
        cli.allow_minting_on,
        &cli.base_uri,
        &cli.authority,
    );

    let config = ServiceConfig {
        collection,
        storage,
    };
    let state = ServiceState::bootstrap(config).await?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!("tessera-service REST listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
