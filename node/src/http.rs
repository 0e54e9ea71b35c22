//! Operator HTTP surface.
//!
//! Auxiliary controls outside consensus: peer management, miner
//! start/stop, and the Prometheus metrics endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::error::NodeError;
use crate::node::Node;

#[derive(Debug, Deserialize)]
struct AddPeersRequest {
    addresses: Vec<String>,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: String,
}

fn status(s: &str) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: s.to_string(),
    })
}

pub fn router(node: Arc<Node>) -> Router {
    Router::new()
        .route("/addpeers", post(add_peers))
        .route("/mineblocks", post(mine_blocks))
        .route("/stopmining", post(stop_mining))
        .route("/metrics", get(metrics))
        .with_state(node)
}

async fn add_peers(
    State(node): State<Arc<Node>>,
    Json(request): Json<AddPeersRequest>,
) -> Json<StatusResponse> {
    tracing::info!(peers = ?request.addresses, "addpeers requested");
    node.peers().add_peers(&request.addresses).await;
    node.metrics
        .peer_count
        .set(node.peers().peer_count().await as i64);
    status("peers added")
}

async fn mine_blocks(
    State(node): State<Arc<Node>>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    tracing::info!("mineblocks requested");
    node.start_mining()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(status("mining started"))
}

async fn stop_mining(
    State(node): State<Arc<Node>>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    tracing::info!("stopmining requested");
    node.stop_mining()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(status("mining stopped"))
}

async fn metrics(State(node): State<Arc<Node>>) -> Result<String, (StatusCode, String)> {
    node.metrics
        .encode()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// Bind the operator listener and serve until shutdown.
pub async fn spawn_http_server(node: Arc<Node>, port: u16) -> Result<JoinHandle<()>, NodeError> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "operator HTTP server listening");

    let mut shutdown_rx = node.shutdown.subscribe();
    let app = router(node);
    Ok(tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "HTTP server failed");
        }
    }))
}
