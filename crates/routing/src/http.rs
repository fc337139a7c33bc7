//! `GET /api/v0/inlet/route?ip=<addr>`
//!
//! | status | when |
//! |---|---|
//! | 200 | routes found, body is the JSON route list |
//! | 400 | query string cannot be decoded, `{"message": ...}` |
//! | 404 | no route covers the address, `{"error": ...}` |
//! | 500 | `ip` missing or not an address, `{"error": ...}` |

use std::net::IpAddr;
use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use ironflow_core::metrics as m;
use serde::Deserialize;
use serde_json::json;

use crate::component::Routing;

pub const ROUTE_PATH: &str = "/api/v0/inlet/route";

#[derive(Debug, Deserialize)]
struct RouteParameters {
    #[serde(default)]
    ip: String,
}

/// Router serving the route lookup endpoint.
pub fn router(routing: Arc<Routing>) -> Router {
    Router::new()
        .route(ROUTE_PATH, get(route_handler))
        .layer(middleware::from_fn(track_clients))
        .with_state(routing)
}

async fn route_handler(
    State(routing): State<Arc<Routing>>,
    params: Result<Query<RouteParameters>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "message": capitalize(&rejection.body_text()) })),
            )
                .into_response();
        }
    };

    let ip = match params.ip.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => IpAddr::V6(v4.to_ipv6_mapped()),
        Ok(ip) => ip,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("failed to parse ip {}: {}", params.ip, e) })),
            )
                .into_response();
        }
    };

    match routing.lookup_routes(ip) {
        Ok(routes) => (StatusCode::OK, Json(routes)).into_response(),
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("failed to look up {ip}: {e}") })),
        )
            .into_response(),
    }
}

async fn track_clients(request: Request, next: Next) -> Response {
    let clients = metrics::gauge!(m::HTTP_CLIENTS);
    clients.increment(1.0);
    let response = next.run(request).await;
    clients.decrement(1.0);
    response
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
