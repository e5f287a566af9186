//! Shared helpers for router-level tests against a mocked SewaHub API.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sewahub_frontend::config::{ApiSettings, ServerSettings};
use sewahub_frontend::startup::build_router;
use sewahub_frontend::AppState;
use tower::util::ServiceExt;
use wiremock::matchers::{header as header_matcher, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn server_settings() -> ServerSettings {
    ServerSettings {
        host: "127.0.0.1".to_string(),
        port: 0,
        secure_cookies: false,
        session_idle_hours: 1,
        allowed_origins: vec!["http://localhost:3000".to_string()],
    }
}

pub fn app_for(api: &MockServer) -> Router {
    let state = AppState::new(ApiSettings {
        base_url: api.uri(),
        public_url: Some("http://cdn.sewahub.test".to_string()),
        timeout_secs: 2,
    })
    .expect("Failed to build app state");
    build_router(state, &server_settings())
}

pub fn user_json(id: &str, fullname: &str, role: &str) -> Value {
    json!({
        "_id": id,
        "fullname": fullname,
        "email": format!("{}@example.com", id),
        "role": role
    })
}

pub async fn mock_login(api: &MockServer, token: &str, user: Value) {
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Login successful",
            "data": { "token": token, "user": user }
        })))
        .mount(api)
        .await;
}

pub async fn mock_whoami(api: &MockServer, token: &str, user: Value) {
    Mock::given(method("GET"))
        .and(path("/api/auth/whoami"))
        .and(header_matcher("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": user
        })))
        .mount(api)
        .await;
}

pub fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// `name=value` of the session cookie set on a response.
pub fn session_cookie(response: &Response<Body>) -> String {
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("response did not set a session cookie")
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value, Response<Body>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let (parts, body) = response.into_parts();
    let bytes = body.collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json, Response::from_parts(parts, Body::empty()))
}

/// Logs in through the router and returns the session cookie.
pub async fn login(app: &Router, email: &str) -> String {
    let (status, body, response) = send(
        app,
        json_request(
            "POST",
            "/login",
            None,
            json!({ "email": email, "password": "secret1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    session_cookie(&response)
}
