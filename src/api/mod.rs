//! HTTP surface: the WebSocket upgrade route and the health probe.

use std::sync::Arc;

use axum::{
    extract::{Request, State, WebSocketUpgrade},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::context::AppContext;
use crate::relay;

pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/ws/ssh", get(ws_handler))
        .route("/health", get(health_handler))
        .layer(middleware::from_fn_with_state(ctx.clone(), cors_middleware))
        .with_state(ctx)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(ctx): State<Arc<AppContext>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| relay::handle_session(socket, ctx))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    active_sessions: usize,
    uptime_secs: u64,
}

async fn health_handler(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        active_sessions: ctx.sessions.active(),
        uptime_secs: ctx.start_time.elapsed().as_secs(),
    })
}

/// CORS for the REST surface. Origins come from `CORS_ORIGIN`; an empty
/// list leaves responses untouched. WebSocket upgrades are unaffected
/// (browsers do not enforce CORS on them).
async fn cors_middleware(
    State(ctx): State<Arc<AppContext>>,
    req: Request,
    next: Next,
) -> Response {
    let origin = req.headers().get(header::ORIGIN).cloned();
    let preflight = req.method() == Method::OPTIONS;

    let mut response = if preflight {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };

    if let Some(origin) = origin {
        let allowed = origin
            .to_str()
            .map(|o| ctx.config.cors_origins.iter().any(|a| a == o))
            .unwrap_or(false);
        if allowed {
            let headers = response.headers_mut();
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
            headers.insert(header::VARY, HeaderValue::from_static("Origin"));
            if preflight {
                headers.insert(
                    header::ACCESS_CONTROL_ALLOW_METHODS,
                    HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
                );
                headers.insert(
                    header::ACCESS_CONTROL_ALLOW_HEADERS,
                    HeaderValue::from_static("content-type, authorization"),
                );
            }
        }
    }

    response
}
