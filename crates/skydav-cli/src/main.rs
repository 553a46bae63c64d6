//! Skydav Gateway - WebDAV access to Swift object storage

use clap::Parser;
use skydav_cli::{run_server_with_shutdown, GatewayConfig, MoveStatus};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "skydav-gateway")]
#[command(about = "WebDAV gateway for Swift object storage")]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "SKYDAV_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "SKYDAV_PORT")]
    port: u16,

    /// Swift auth endpoint
    #[arg(
        short = 'a',
        long,
        default_value = "http://127.0.0.1:8080/auth/v1.0",
        env = "SKYDAV_AUTH_URL"
    )]
    auth_url: String,

    /// Auth protocol version (1 = tempauth/swauth, 2 = keystone)
    #[arg(long, default_value = "1", env = "SKYDAV_AUTH_VERSION")]
    auth_version: u8,

    /// Accept invalid TLS certificates from the auth and storage services
    #[arg(long, env = "SKYDAV_INSECURE")]
    insecure: bool,

    /// Use in-memory storage (for testing, data will not persist)
    #[arg(long, env = "SKYDAV_MEMORY_STORE")]
    memory_store: bool,

    /// Session lifetime when the auth service gives none (seconds)
    #[arg(long, default_value = "3600", env = "SKYDAV_SESSION_TTL")]
    session_ttl: u64,

    /// Requests per second allowed per account
    #[arg(long, default_value = "100", env = "SKYDAV_RATE_LIMIT")]
    rate_limit: u32,

    /// Status for a collection COPY/MOVE that creates its destination
    #[arg(long, value_enum, default_value = "created", env = "SKYDAV_COLLECTION_MOVE_STATUS")]
    collection_move_status: MoveStatus,

    /// Keep a listing's own prefix entry when listing a collection
    #[arg(long, env = "SKYDAV_KEEP_SELF_ENTRY")]
    keep_self_entry: bool,

    /// Disable CORS headers
    #[arg(long, env = "SKYDAV_NO_CORS")]
    no_cors: bool,

    /// Enable debug logging
    #[arg(short, long, env = "SKYDAV_DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "skydav_cli={0},skydav_core={0},skydav_store={0},tower_http=debug",
                    log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Skydav gateway on {}:{}", args.host, args.port);

    if args.memory_store {
        tracing::warn!("Using in-memory storage - data will NOT persist!");
    } else {
        tracing::info!("Auth endpoint: {} (v{})", args.auth_url, args.auth_version);
    }
    if args.insecure {
        tracing::warn!("TLS certificate validation is DISABLED");
    }

    let config = GatewayConfig {
        host: args.host,
        port: args.port,
        auth_url: args.auth_url,
        auth_version: args.auth_version,
        insecure: args.insecure,
        use_memory_store: args.memory_store,
        session_ttl_secs: args.session_ttl,
        rate_limit_rps: args.rate_limit,
        cors_enabled: !args.no_cors,
        collection_move_status: args.collection_move_status,
        skip_self_entry: !args.keep_self_entry,
        ..Default::default()
    };

    run_server_with_shutdown(config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await
}
