//! HTTP surfaces of the three roles.
//!
//! - [`league_router`]: the league manager's REST API (`/health`, `/register`, `/agents`,
//!   `/standings`, `/start`), plain JSON in and out. Errors are `{"error": message}` with
//!   status 400 or 409.
//! - [`player_router`] and [`referee_router`]: `POST /mcp` (JSON-RPC 2.0, see
//!   [`jsonrpc`](crate::jsonrpc)) plus `GET /health`. JSON-RPC errors are sent with status 200.
//!
//! [`serve`] runs any of them until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::{
    agent::AgentRecord,
    error::ApiError,
    jsonrpc::{dispatch, RpcHandler, RpcResponse},
    league::{League, LeagueHealth, StandingsReport, StartAck},
    match_runner::{RefereeHealth, RefereeService},
    player::{PlayerAgent, PlayerHealth},
    registry::RegisterAck,
};

/// REST API of the league manager.
pub fn league_router(league: Arc<League>) -> Router {
    Router::new()
        .route("/health", get(league_health))
        .route("/register", post(register))
        .route("/agents", get(list_agents))
        .route("/standings", get(standings))
        .route("/start", post(start))
        .with_state(league)
}

async fn league_health(State(league): State<Arc<League>>) -> Json<LeagueHealth> {
    Json(league.health())
}

async fn register(
    State(league): State<Arc<League>>,
    payload: Result<Json<AgentRecord>, JsonRejection>,
) -> Result<Json<RegisterAck>, ApiError> {
    let Json(record) = payload.map_err(|rejection| {
        warn!("rejected registration: {}", rejection.body_text());
        ApiError::BadRequest(rejection.body_text())
    })?;
    if record.display_name.trim().is_empty() {
        return Err(ApiError::BadRequest("display_name must not be empty".into()));
    }
    if record.endpoint_url.trim().is_empty() {
        return Err(ApiError::BadRequest("endpoint must not be empty".into()));
    }
    Ok(Json(league.register(record)))
}

async fn list_agents(State(league): State<Arc<League>>) -> Json<Value> {
    Json(json!({ "agents": league.registry().list() }))
}

async fn standings(State(league): State<Arc<League>>) -> Json<StandingsReport> {
    Json(league.standings())
}

async fn start(State(league): State<Arc<League>>) -> Result<Json<StartAck>, ApiError> {
    Ok(Json(league.start()?))
}

/// `POST /mcp` for any JSON-RPC service.
pub fn rpc_router<H: RpcHandler + 'static>(handler: Arc<H>) -> Router {
    Router::new()
        .route("/mcp", post(rpc_endpoint::<H>))
        .with_state(handler)
}

async fn rpc_endpoint<H: RpcHandler + 'static>(
    State(handler): State<Arc<H>>,
    body: Bytes,
) -> Json<RpcResponse> {
    Json(dispatch(handler.as_ref(), &body).await)
}

/// JSON-RPC endpoint and health check of a player.
pub fn player_router(player: Arc<PlayerAgent>) -> Router {
    rpc_router(player.clone()).merge(
        Router::new()
            .route("/health", get(player_health))
            .with_state(player),
    )
}

async fn player_health(State(player): State<Arc<PlayerAgent>>) -> Json<PlayerHealth> {
    Json(player.health())
}

/// JSON-RPC endpoint and health check of a referee.
pub fn referee_router(referee: Arc<RefereeService>) -> Router {
    rpc_router(referee.clone()).merge(
        Router::new()
            .route("/health", get(referee_health))
            .with_state(referee),
    )
}

async fn referee_health(State(referee): State<Arc<RefereeService>>) -> Json<RefereeHealth> {
    Json(referee.health())
}

/// Bind a listener on `addr` (`host:port`).
pub async fn bind(addr: &str) -> anyhow::Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("could not listen on {addr}"))
}

/// Serve `app` on `listener` until Ctrl-C.
pub async fn serve(listener: TcpListener, app: Router) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!("listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(err) => {
            warn!("could not listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod server_tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use crate::{configuration::LeagueConfig, game::Parity, strategy::Constant};

    use super::*;

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn register_then_list() {
        let league = Arc::new(League::new(LeagueConfig::new()));
        let app = league_router(league.clone());

        let (status, ack) = send(
            app.clone(),
            post_json(
                "/register",
                r#"{"display_name":"alice","version":"1.0","endpoint":"http://a/mcp"}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["status"], "registered");
        assert_eq!(ack["agent_id"], "agent_alice");

        let (status, agents) =
            send(app.clone(), Request::get("/agents").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(agents["agents"][0]["endpoint"], "http://a/mcp");
        assert_eq!(agents["agents"][0]["agent_type"], "player");

        let (_, standings) =
            send(app.clone(), Request::get("/standings").body(Body::empty()).unwrap()).await;
        assert_eq!(standings["standings"][0]["agent"], "alice");
        assert_eq!(standings["status"], "not_started");

        let (_, health) = send(app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(health["registered_agents"], 1);
        assert_eq!(health["ok"], true);
    }

    #[tokio::test]
    async fn bad_registrations_are_400() {
        let app = league_router(Arc::new(League::new(LeagueConfig::new())));
        for body in [
            "not json",
            r#"{"display_name":"alice"}"#,
            r#"{"display_name":"","version":"1","endpoint":"http://a/mcp"}"#,
        ] {
            let (status, error) = send(app.clone(), post_json("/register", body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert!(error["error"].is_string());
        }
    }

    #[tokio::test]
    async fn player_mcp_and_health() {
        let player = Arc::new(PlayerAgent::new("alice", Box::new(Constant(Parity::Even))));
        let app = player_router(player);

        let (status, response) = send(
            app.clone(),
            post_json(
                "/mcp",
                r#"{"jsonrpc":"2.0","id":3,"method":"choose_parity","params":{"game_id":"g"}}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["id"], 3);
        assert_eq!(response["result"]["choice"], "even");

        let (status, response) = send(app.clone(), post_json("/mcp", "{oops")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["error"]["code"], -32700);
        assert_eq!(response["id"], Value::Null);

        let (_, health) = send(app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(health["display_name"], "alice");
        assert_eq!(health["strategy"], "always_even");
    }
}
