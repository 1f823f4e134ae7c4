use std::{net::SocketAddr, sync::Arc, time::Duration};

use pulsechat_auth::AuthProvider;
use pulsechat_presence::PresenceStore;
use pulsechat_store::MessageStore;
use tracing::info;

use crate::{server::build_app, state::GatewayState};

/// Start the gateway HTTP + WebSocket server. Grounded on the teacher's
/// `start_gateway`: resolve collaborators, build state, print a banner,
/// spawn the tick timer, then serve. The auth/presence/store collaborators
/// are assembled by the caller (the CLI) so this crate stays agnostic of
/// config file formats and storage backends.
pub async fn run(
    bind: &str,
    port: u16,
    max_connections_per_user: usize,
    online_ttl: Duration,
    presence: Arc<dyn PresenceStore>,
    store: Arc<dyn MessageStore>,
    auth: Arc<dyn AuthProvider>,
) -> anyhow::Result<()> {
    let state = GatewayState::new(max_connections_per_user, presence, store, auth);

    let app = build_app(Arc::clone(&state));
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let lines = [
        format!("pulsechat gateway v{}", state.version),
        format!("protocol v{}, listening on {}", pulsechat_protocol::PROTOCOL_VERSION, addr),
        format!("host {}", state.hostname),
    ];
    let width = lines.iter().map(|l| l.len()).max().unwrap_or(0) + 4;
    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));

    // Sweep period tracks the online TTL, same proportion the teacher used
    // between its tick interval and the events it ticks for.
    let _sweep_handle = state.spawn_presence_sweep(online_ttl / 2);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
