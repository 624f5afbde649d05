use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::ParseIntError;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{MatchedPath, Request};
use axum::middleware::{self, Next, from_fn};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::api::handler::interactions;
use crate::api::interaction::InteractionErr;
use crate::api::middleware::verify::{Verifier, verify_interaction};
use crate::db::prelude::Ledger;
use crate::util::discord::Discord;
use crate::util::env::{EnvErr, Var};
use crate::var;

pub type JsonResult<T> = core::result::Result<Json<T>, RouteError>;

#[derive(Debug)]
pub struct AppState {
    pub ledger: Ledger,
    pub discord: Discord,
    pub verifier: Arc<Verifier>,
}

pub fn router(state: Arc<AppState>) -> Router {
    let interaction_routes = Router::new()
        .route("/interactions", post(interactions))
        .route_layer(middleware::from_fn_with_state(
            state.verifier.clone(),
            verify_interaction,
        ));

    Router::new()
        .merge(interaction_routes)
        .route("/", get(|| async { Response::new(Body::empty()) }))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method();
                let uri = req.uri();

                let matched_path = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|matched| matched.as_str());

                tracing::debug_span!("api_request", ?method, ?uri, ?matched_path)
            }),
        )
        .layer(from_fn(log_route_errors))
        .with_state(state)
}

/// Logs the `RouteError` stashed in a response's extensions.
#[instrument(skip(request, next), fields(uri = request.uri().to_string()))]
async fn log_route_errors(request: Request, next: Next) -> Response {
    let res = next.run(request).await;
    if let Some(err) = res.extensions().get::<Arc<RouteError>>() {
        tracing::error!(error = ?err, "error occurred inside route handler");
    }

    res
}

/// Binds the configured port and serves until ctrl-c.
#[instrument(skip(state))]
pub async fn start_server(state: Arc<AppState>) -> ServerResult<()> {
    let port = var!(Var::ServerApiPort).await?.parse::<u16>()?;
    let socket_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
    let listener = tokio::net::TcpListener::bind(socket_addr).await?;

    tracing::info!(
        server_url = &format!("http://127.0.0.1:{port}"),
        "server ready"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = ?e, "unable to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

pub type ServerResult<T> = core::result::Result<T, ServerErr>;

#[derive(Debug, Error)]
pub enum ServerErr {
    #[error(transparent)]
    EnvError(#[from] EnvErr),

    #[error("invalid SERVER_API_PORT: {0}")]
    PortError(#[from] ParseIntError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("malformed interaction body: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    InvalidInteraction(#[from] InteractionErr),

    #[error("command task ended without acknowledging the interaction")]
    ChannelRecvError(#[from] oneshot::error::RecvError),
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            message: String,
        }

        let status = match &self {
            RouteError::JsonError(_) => StatusCode::BAD_REQUEST,
            RouteError::InvalidInteraction(_) => StatusCode::BAD_REQUEST,
            RouteError::ChannelRecvError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = self.to_string();
        let mut response = (status, Json(ErrorResponse { message })).into_response();
        response.extensions_mut().insert(Arc::new(self));

        response
    }
}

#[cfg(test)]
mod test {
    use http::header::CONTENT_TYPE;
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::api::interaction::testing::{command_interaction, givepoints};
    use crate::api::middleware::verify::testing::SigningKey;
    use crate::api::middleware::verify::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
    use crate::commands::grant::BOT_TARGET_REJECTED;
    use crate::db::prelude::{GuildId, UserId};

    const TIMESTAMP: &str = "1700000000";

    struct Harness {
        _dir: TempDir,
        key: SigningKey,
        state: Arc<AppState>,
    }

    async fn harness(api_base: &str) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::initialize(dir.path().join("points.db")).await.unwrap();
        let key = SigningKey::generate();

        let state = Arc::new(AppState {
            ledger,
            discord: Discord::new("test-token", "4242", api_base).unwrap(),
            verifier: Arc::new(key.verifier()),
        });

        Harness {
            _dir: dir,
            key,
            state,
        }
    }

    fn signed_request(key: &SigningKey, body: &Value) -> Request {
        let body = serde_json::to_vec(body).unwrap();
        http::Request::post("/interactions")
            .header(CONTENT_TYPE, "application/json")
            .header(TIMESTAMP_HEADER, TIMESTAMP)
            .header(SIGNATURE_HEADER, key.sign(TIMESTAMP, &body))
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(res: Response) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ping() {
        let h = harness("http://127.0.0.1:9").await;

        let res = router(h.state.clone())
            .oneshot(signed_request(&h.key, &json!({ "type": 1 })))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await, json!({ "type": 1 }));
    }

    #[tokio::test]
    async fn test_signature_rejections() {
        let h = harness("http://127.0.0.1:9").await;

        let forged = SigningKey::generate();
        let res = router(h.state.clone())
            .oneshot(signed_request(&forged, &json!({ "type": 1 })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let unsigned = http::Request::post("/interactions")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"type":1}"#))
            .unwrap();
        let res = router(h.state.clone()).oneshot(unsigned).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_givepoints_end_to_end() {
        let h = harness("http://127.0.0.1:9").await;

        let res = router(h.state.clone())
            .oneshot(signed_request(&h.key, &givepoints(42, false, 30)))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["type"], 4);
        assert_eq!(body["data"]["embeds"][0]["title"], "Points Awarded!");

        let rows = h.state.ledger.transactions(GuildId(10)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, UserId(42));
        assert_eq!(rows[0].points, 30);
    }

    #[tokio::test]
    async fn test_givepoints_to_bot() {
        let h = harness("http://127.0.0.1:9").await;

        let res = router(h.state.clone())
            .oneshot(signed_request(&h.key, &givepoints(43, true, 30)))
            .await
            .unwrap();

        let body = json_body(res).await;
        assert_eq!(body["data"]["content"], BOT_TARGET_REJECTED);
        assert_eq!(body["data"]["flags"], 64);
        assert!(h.state.ledger.transactions(GuildId(10)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_leaderboard_defers_then_edits() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/webhooks/4242/interaction-token/messages/@original"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "1" })))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server.uri()).await;
        let interaction = command_interaction("leaderboard", "0", json!([]), json!({}));

        let res = router(h.state.clone())
            .oneshot(signed_request(&h.key, &interaction))
            .await
            .unwrap();
        assert_eq!(json_body(res).await, json!({ "type": 5 }));

        // the edit happens on the spawned task after the acknowledgement
        for _ in 0..50 {
            if !server.received_requests().await.unwrap_or_default().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }

        let requests = server.received_requests().await.unwrap();
        let edit: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(
            edit["embeds"][0]["description"],
            "No contributions have been recorded for this period yet."
        );
    }

    #[tokio::test]
    async fn test_invalid_interaction_is_bad_request() {
        let h = harness("http://127.0.0.1:9").await;
        let interaction = command_interaction("balance", "0", json!([]), json!({}));

        let res = router(h.state.clone())
            .oneshot(signed_request(&h.key, &interaction))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["message"], "unknown command 'balance'");
    }
}
