//! `POST /api/supervisor`: the gateway's HTTP surface.
//!
//! Status mapping: 200 with `{content, threadId?, assistantId?}` on success,
//! 400 `{error}` for validation failures, 500 `{error}` for upstream failures.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use super::{GatewayRequest, GatewayResponse, SupervisorGateway};
use crate::error::GatewayError;

pub const SUPERVISOR_PATH: &str = "/api/supervisor";

/// Error body for non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

type SharedGateway = Arc<dyn SupervisorGateway>;

/// Router exposing the gateway.
pub fn router(gateway: SharedGateway) -> Router {
    Router::new()
        .route(SUPERVISOR_PATH, post(supervisor_handler))
        .with_state(gateway)
}

/// Bind `listen_addr` and serve until `shutdown` flips to true.
pub async fn serve(
    listen_addr: &str,
    gateway: SharedGateway,
    shutdown: watch::Receiver<bool>,
) -> Result<(), String> {
    let addr: SocketAddr = listen_addr
        .parse()
        .map_err(|e| format!("invalid listen address {listen_addr:?}: {e}"))?;

    info!(addr = %addr, path = SUPERVISOR_PATH, "starting supervisor gateway");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("failed to bind {addr}: {e}"))?;

    let mut shutdown = shutdown;
    axum::serve(listener, router(gateway))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|&v| v).await;
        })
        .await
        .map_err(|e| format!("HTTP server error: {e}"))
}

async fn supervisor_handler(
    State(gateway): State<SharedGateway>,
    Json(body): Json<GatewayRequest>,
) -> Response {
    let (provider, request) = match body.into_parts() {
        Ok(parts) => parts,
        Err(e) => return error_response(e),
    };
    match gateway.invoke(provider, &request).await {
        Ok(reply) => (StatusCode::OK, Json(GatewayResponse::from(reply))).into_response(),
        Err(e) => {
            warn!(provider = %provider, error = %e, "supervisor call failed");
            error_response(e)
        }
    }
}

fn error_response(error: GatewayError) -> Response {
    let status = if error.is_validation() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (
        status,
        Json(ErrorBody {
            error: error.to_string(),
        }),
    )
        .into_response()
}
