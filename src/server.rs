//! Inbound webhook server.
//!
//! Two rules drive the handlers: the GET handshake only ever echoes the
//! challenge for a matching token, and the POST endpoint acknowledges with
//! 200 as soon as the body is structurally accepted — processing runs as a
//! detached task so the platform never times out and retry-storms us.

use crate::payload::WebhookPayload;
use crate::processor::Processor;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use konbit_core::config::WebhookConfig;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    verify_token: String,
    processor: Arc<Processor>,
}

/// Query parameters of the platform's verification handshake.
#[derive(Debug, Deserialize, Default)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Outcome of the verification handshake.
#[derive(Debug, PartialEq, Eq)]
pub enum Handshake {
    /// Echo the challenge back with 200.
    Verified(String),
    /// Mode/token present but wrong — 403, no body.
    Forbidden,
    /// Not a handshake request at all — 400.
    BadRequest,
}

/// Pure handshake decision, kept out of the handler so it is testable
/// without a socket.
pub fn verify_handshake(params: &VerifyParams, expected_token: &str) -> Handshake {
    match (&params.mode, &params.verify_token) {
        (Some(mode), Some(token)) => {
            if mode == "subscribe" && !expected_token.is_empty() && token == expected_token {
                Handshake::Verified(params.challenge.clone().unwrap_or_default())
            } else {
                Handshake::Forbidden
            }
        }
        _ => Handshake::BadRequest,
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", get(verify).post(receive))
        .route("/health", get(health))
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn serve(config: &WebhookConfig, processor: Arc<Processor>) -> anyhow::Result<()> {
    let state = AppState {
        verify_token: config.verify_token.clone(),
        processor,
    };

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("webhook server listening on {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received shutdown signal");
}

async fn verify(State(state): State<AppState>, Query(params): Query<VerifyParams>) -> Response {
    match verify_handshake(&params, &state.verify_token) {
        Handshake::Verified(challenge) => {
            info!("webhook verified");
            (StatusCode::OK, challenge).into_response()
        }
        Handshake::Forbidden => StatusCode::FORBIDDEN.into_response(),
        Handshake::BadRequest => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn receive(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> StatusCode {
    // Acknowledge now; whatever processing needs to happen keeps running
    // after this 200 is on the wire.
    let processor = state.processor.clone();
    tokio::spawn(async move {
        processor.process(payload).await;
    });
    StatusCode::OK
}

async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(mode: Option<&str>, token: Option<&str>, challenge: Option<&str>) -> VerifyParams {
        VerifyParams {
            mode: mode.map(String::from),
            verify_token: token.map(String::from),
            challenge: challenge.map(String::from),
        }
    }

    #[test]
    fn test_handshake_echoes_challenge() {
        let outcome = verify_handshake(
            &params(Some("subscribe"), Some("sekrè"), Some("123")),
            "sekrè",
        );
        assert_eq!(outcome, Handshake::Verified("123".to_string()));
    }

    #[test]
    fn test_handshake_rejects_wrong_token() {
        let outcome = verify_handshake(
            &params(Some("subscribe"), Some("move-token"), Some("123")),
            "sekrè",
        );
        assert_eq!(outcome, Handshake::Forbidden);
    }

    #[test]
    fn test_handshake_rejects_wrong_mode() {
        let outcome = verify_handshake(
            &params(Some("unsubscribe"), Some("sekrè"), Some("123")),
            "sekrè",
        );
        assert_eq!(outcome, Handshake::Forbidden);
    }

    #[test]
    fn test_handshake_rejects_when_unconfigured() {
        // No configured secret means nothing can ever verify.
        let outcome = verify_handshake(&params(Some("subscribe"), Some(""), Some("123")), "");
        assert_eq!(outcome, Handshake::Forbidden);
    }

    #[test]
    fn test_handshake_without_params_is_bad_request() {
        assert_eq!(
            verify_handshake(&params(None, None, None), "sekrè"),
            Handshake::BadRequest
        );
        assert_eq!(
            verify_handshake(&params(Some("subscribe"), None, None), "sekrè"),
            Handshake::BadRequest
        );
    }
}
