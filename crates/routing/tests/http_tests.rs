//! Route lookup HTTP endpoint tests.

use std::net::IpAddr;
use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use ironflow_core::net::parse_prefix;
use ironflow_core::types::LargeCommunity;
use ironflow_routing::{Route, Routing, StaticRib, http};
use serde_json::Value;
use tower::ServiceExt;

fn app() -> axum::Router {
    let rib = StaticRib::new();
    rib.insert(
        parse_prefix("192.0.2.0/27").unwrap(),
        Route {
            next_hop: "198.51.100.1".parse::<IpAddr>().unwrap(),
            asn: 174,
            as_path: vec![64200, 1299, 174],
            communities: vec![100, 200, 400],
            large_communities: vec![LargeCommunity::new(64200, 2, 3)],
        },
    );
    http::router(Arc::new(Routing::new(Arc::new(rib))))
}

async fn get(uri: &str) -> (StatusCode, Value) {
    let response = app()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn known_ipv4_address_returns_routes() {
    let (status, body) = get("/api/v0/inlet/route?ip=192.0.2.10").await;
    assert_eq!(status, StatusCode::OK);
    let routes = body.as_array().unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0]["asn"], 174);
    assert_eq!(routes[0]["prefix"], "192.0.2.0/27");
    assert_eq!(routes[0]["as_path"], serde_json::json!([64200, 1299, 174]));
    assert_eq!(routes[0]["large_communities"][0]["local_data2"], 3);
}

#[tokio::test]
async fn mapped_ipv6_address_returns_routes() {
    let (status, _) = get("/api/v0/inlet/route?ip=::ffff:192.0.2.10").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_address_is_not_found() {
    let (status, body) = get("/api/v0/inlet/route?ip=203.0.113.1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("failed to look up ::ffff:203.0.113.1"));
}

#[tokio::test]
async fn unparsable_address_is_server_error() {
    let (status, body) = get("/api/v0/inlet/route?ip=not-an-ip").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .starts_with("failed to parse ip not-an-ip")
    );
}

#[tokio::test]
async fn missing_address_is_server_error() {
    let (status, _) = get("/api/v0/inlet/route").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn malformed_query_is_bad_request() {
    let (status, body) = get("/api/v0/inlet/route?ip=192.0.2.1&ip=192.0.2.2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["message"].as_str().unwrap();
    assert!(message.chars().next().unwrap().is_uppercase());
}

#[tokio::test]
async fn plural_route_endpoint_is_absent() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/api/v0/inlet/routes?ip=192.0.2.10")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
