use std::{sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use pulsechat_auth::SharedSecretAuth;
use pulsechat_presence::InProcessPresenceStore;
use pulsechat_store::SqliteMessageStore;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "pulsechat", about = "pulsechat — realtime messaging gateway")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server.
    Gateway {
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Mint a bearer token for the shared-secret auth collaborator. For
    /// exercising the core end-to-end; a real deployment replaces this
    /// with its own registration/login system (§1, Non-goals).
    IssueToken {
        #[arg(long)]
        user_id: Option<Uuid>,
        #[arg(long)]
        display_name: String,
        #[arg(long, default_value_t = 3600)]
        ttl_secs: u64,
    },
    /// Print the resolved configuration.
    Config,
}

fn init_telemetry(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_thread_ids(false).with_ansi(true))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "pulsechat starting");

    let config = pulsechat_config::discover_and_load();

    match cli.command {
        Commands::Gateway { bind, port } => {
            let bind = bind.unwrap_or(config.server.bind.clone());
            let port = port.unwrap_or(config.server.port);

            let presence = Arc::new(InProcessPresenceStore::new(
                Duration::from_secs(config.presence.online_ttl_secs),
                Duration::from_secs(config.presence.queue_ttl_days * 24 * 60 * 60),
            ));
            let store = Arc::new(SqliteMessageStore::connect(&config.store.database_url).await?);

            let secret = if config.auth.shared_secret.is_empty() {
                tracing::warn!("no auth shared secret configured; generating an ephemeral one");
                Uuid::new_v4().to_string()
            } else {
                config.auth.shared_secret.clone()
            };
            let auth = Arc::new(SharedSecretAuth::new(secret.as_bytes()));

            pulsechat_gateway::startup::run(
                &bind,
                port,
                config.server.max_connections_per_user,
                Duration::from_secs(config.presence.online_ttl_secs),
                presence,
                store,
                auth,
            )
            .await
        },
        Commands::IssueToken { user_id, display_name, ttl_secs } => {
            let secret = if config.auth.shared_secret.is_empty() {
                anyhow::bail!("no auth.shared_secret configured; set PULSECHAT_AUTH_SECRET");
            } else {
                config.auth.shared_secret.clone()
            };
            let auth = SharedSecretAuth::new(secret.as_bytes());
            let user_id = user_id.unwrap_or_else(Uuid::new_v4);
            let token = auth
                .issue(user_id, &display_name, ttl_secs)
                .map_err(|e| anyhow::anyhow!("failed to issue token: {e}"))?;
            println!("{token}");
            Ok(())
        },
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        },
    }
}
