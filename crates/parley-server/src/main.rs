use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use parley_gateway::connection;
use parley_gateway::dispatcher::Dispatcher;
use parley_types::participant::ParticipantKey;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("PARLEY_DB_PATH").unwrap_or_else(|_| "parley.db".into());
    let host = std::env::var("PARLEY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("PARLEY_PORT")
        .unwrap_or_else(|_| "5000".into())
        .parse()?;

    // Init database
    let db = Arc::new(parley_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let dispatcher = Dispatcher::new(db);

    // Routes
    let app = Router::new()
        .route("/", get(|| async { "Parley backend is running" }))
        .route("/gateway", get(ws_upgrade))
        .with_state(dispatcher)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Parley server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Connection parameters. The HTTP auth layer validated the session before
/// the upgrade, so `participantId` arrives trusted; an absent or
/// placeholder value means an anonymous connection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectParams {
    participant_id: Option<String>,
    is_admin: Option<String>,
}

impl ConnectParams {
    fn identity(self) -> Option<ParticipantKey> {
        let id = self.participant_id?;
        // Browser clients serialize a missing id as the literal strings
        // "null" or "undefined".
        if id.is_empty() || id == "null" || id == "undefined" {
            return None;
        }
        let is_admin = self.is_admin.as_deref() == Some("true");
        Some(ParticipantKey::from_connect_params(id, is_admin))
    }
}

async fn ws_upgrade(
    State(dispatcher): State<Dispatcher>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let identity = params.identity();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, identity))
}
