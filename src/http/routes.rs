//! Router construction and request handlers.
//!
//! # Responsibilities
//! - Build the Axum router from the frozen [`AppContext`]
//! - Wire up middleware (request ID, tracing, timeout) according to the mode
//!
//! # Endpoints
//! - `GET /ping`: liveness
//! - `GET /health`: pings every registered store
//! - `GET /api/v1/ids?count=N`: issues distinct IDs

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::Mode;
use crate::context::AppContext;
use crate::http::request::{propagate_request_id, set_request_id};

/// Upper bound on IDs issued by one request.
pub const MAX_IDS_PER_REQUEST: i64 = 100;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Build the router. Pure construction; called only once startup succeeded.
#[allow(deprecated)]
pub fn build(mode: Mode, ctx: AppContext, request_timeout: Duration) -> Router {
    let api = Router::new().route("/ids", get(issue_ids));

    let router = Router::new()
        .route("/ping", get(ping))
        .route("/health", get(health))
        .nest("/api/v1", api)
        .with_state(ctx)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(propagate_request_id());

    let router = match mode {
        Mode::Debug => router.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG).include_headers(true))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        ),
        Mode::Release => router.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        ),
        Mode::Test => router,
    };

    router.layer(set_request_id())
}

async fn ping() -> &'static str {
    "pong"
}

#[derive(Debug, Serialize)]
struct HealthBody {
    name: String,
    version: String,
    mode: Mode,
    status: &'static str,
    checks: BTreeMap<String, String>,
}

async fn health(State(ctx): State<AppContext>) -> Response {
    let mut checks = BTreeMap::new();
    let mut healthy = true;

    for probe in ctx.probes.iter() {
        let status = match tokio::time::timeout(PROBE_TIMEOUT, probe.ping()).await {
            Ok(Ok(())) => "ok".to_string(),
            Ok(Err(e)) => {
                healthy = false;
                tracing::warn!(probe = probe.name(), error = %e, "Health probe failed");
                format!("error: {e}")
            }
            Err(_) => {
                healthy = false;
                tracing::warn!(probe = probe.name(), "Health probe timed out");
                "error: timeout".to_string()
            }
        };
        checks.insert(probe.name().to_string(), status);
    }

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = HealthBody {
        name: ctx.info.name.clone(),
        version: ctx.info.version.clone(),
        mode: ctx.info.mode,
        status: if healthy { "ok" } else { "degraded" },
        checks,
    };
    (code, Json(body)).into_response()
}

#[derive(Debug, Serialize)]
struct IdsBody {
    ids: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: u16,
    msg: String,
}

async fn issue_ids(
    State(ctx): State<AppContext>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let count = ctx
        .validator
        .integer("count", params.get("count").map(String::as_str), Some(1))
        .and_then(|n| ctx.validator.range("count", n, 1, MAX_IDS_PER_REQUEST));

    match count {
        Ok(count) => {
            // Serialized as strings: JavaScript clients lose precision above 2^53.
            let ids: Result<Vec<String>, _> =
                (0..count).map(|_| ctx.ids.next_id().map(|id| id.to_string())).collect();
            match ids {
                Ok(ids) => Json(IdsBody { ids }).into_response(),
                Err(err) => {
                    tracing::error!(error = %err, "ID generation failed");
                    let body = ErrorBody {
                        code: StatusCode::SERVICE_UNAVAILABLE.as_u16(),
                        msg: err.to_string(),
                    };
                    (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
                }
            }
        }
        Err(err) => {
            let body = ErrorBody {
                code: StatusCode::BAD_REQUEST.as_u16(),
                msg: ctx.validator.translate(&err),
            };
            (StatusCode::BAD_REQUEST, Json(body)).into_response()
        }
    }
}
