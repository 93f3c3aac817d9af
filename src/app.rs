use std::net::SocketAddr;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::Value;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::envelope::Envelope;
use crate::state::AppState;
use crate::{access, auth, db};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(access::router())
                .route("/health", get(health)),
        )
        .merge(access::views(&state))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    let request_id = uuid::Uuid::new_v4();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        %request_id,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

async fn health(State(state): State<AppState>) -> Json<Envelope> {
    let database = if db::ping(&state.db).await { "up" } else { "down" };
    Json(Envelope::ok("ok").with("database", Value::from(database)))
}

pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
