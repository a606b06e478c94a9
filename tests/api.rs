#![allow(clippy::unwrap_used)]

use anyhow::{Context, Result};
use authgate::{
    api,
    auth::{AuthConfig, AuthService, PasswordHasher},
    email::{EmailMessage, EmailSender},
    oauth::{OAuthProvider, ProviderEndpoints, ProviderKind, ProviderRegistry},
    store::MemoryStore,
};
use axum::{
    body::{to_bytes, Body},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
        Request, Response, StatusCode,
    },
    Router,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

const FRONTEND: &str = "http://localhost:3000";

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<EmailMessage>>,
}

impl Outbox {
    fn last_token(&self) -> Result<String> {
        let sent = self.sent.lock().unwrap();
        let message = sent.last().context("no email sent")?;
        let payload: Value = serde_json::from_str(&message.payload_json)?;
        let url = payload["verify_url"].as_str().context("no verify_url")?;
        let (_, token) = url.split_once("token=").context("no token in url")?;
        Ok(token.to_string())
    }

    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl EmailSender for Outbox {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

struct TestApp {
    router: Router,
    outbox: Arc<Outbox>,
}

fn test_app(providers: Vec<OAuthProvider>) -> Result<TestApp> {
    let outbox = Arc::new(Outbox::default());
    let registry = ProviderRegistry::new("http://localhost:8080", providers)?;
    let config = AuthConfig::new("http://localhost:8080".to_string(), FRONTEND.to_string());
    let hasher = PasswordHasher::with_params(argon2::Params::new(1024, 1, 1, None).unwrap());
    let service = AuthService::with_hasher(
        Arc::new(MemoryStore::new()),
        Arc::new(registry),
        outbox.clone(),
        config,
        hasher,
    );
    Ok(TestApp {
        router: api::router(Arc::new(service)),
        outbox,
    })
}

fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

async fn send(router: &Router, request: Request<Body>) -> Result<Response<Body>> {
    Ok(router.clone().oneshot(request).await?)
}

fn post_json(uri: &str, body: &Value) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))?)
}

fn with_cookie(method: &str, uri: &str, cookie: &str) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method(method)
        .uri(uri)
        .header(COOKIE, cookie)
        .body(Body::empty())?)
}

async fn body_json(response: Response<Body>) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// `name=value` part of the `Set-Cookie` header.
fn cookie_pair(response: &Response<Body>) -> Result<String> {
    let header = response
        .headers()
        .get(SET_COOKIE)
        .context("missing Set-Cookie")?
        .to_str()?;
    Ok(header.split(';').next().unwrap_or_default().to_string())
}

fn register_body(email: &str) -> Value {
    json!({
        "email": email,
        "password": "s3cret-pass",
        "passwordRepeat": "s3cret-pass",
        "name": "Ann"
    })
}

async fn register_and_verify(app: &TestApp, email: &str) -> Result<()> {
    let response = send(&app.router, post_json("/auth/register", &register_body(email))?).await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let token = app.outbox.last_token()?;
    let response = send(
        &app.router,
        post_json("/auth/email-confirmation", &json!({ "token": token }))?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

async fn login(app: &TestApp, email: &str) -> Result<Response<Body>> {
    send(
        &app.router,
        post_json(
            "/auth/login",
            &json!({ "email": email, "password": "s3cret-pass" }),
        )?,
    )
    .await
}

#[tokio::test]
async fn register_returns_created_and_sends_confirmation() -> Result<()> {
    let app = test_app(Vec::new())?;

    let response = send(
        &app.router,
        post_json("/auth/register", &register_body(" Ann@Example.COM "))?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await?;
    assert_eq!(body["email"], "ann@example.com");
    assert!(body["message"].as_str().is_some());
    assert_eq!(app.outbox.count(), 1);
    Ok(())
}

#[tokio::test]
async fn register_rejects_bad_payloads() -> Result<()> {
    let app = test_app(Vec::new())?;

    let cases = [
        json!({"email": "not-an-email", "password": "p", "passwordRepeat": "p", "name": "Ann"}),
        json!({"email": "ann@example.com", "password": "", "passwordRepeat": "", "name": "Ann"}),
        json!({"email": "ann@example.com", "password": "a", "passwordRepeat": "b", "name": "Ann"}),
    ];
    for case in cases {
        let response = send(&app.router, post_json("/auth/register", &case)?).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "payload {case}");
    }
    assert_eq!(app.outbox.count(), 0);
    Ok(())
}

#[tokio::test]
async fn register_twice_is_conflict() -> Result<()> {
    let app = test_app(Vec::new())?;

    let first = send(&app.router, post_json("/auth/register", &register_body("ann@example.com"))?).await?;
    assert_eq!(first.status(), StatusCode::CREATED);
    let second = send(&app.router, post_json("/auth/register", &register_body("ANN@example.com"))?).await?;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(app.outbox.count(), 1);
    Ok(())
}

#[tokio::test]
async fn unverified_login_is_unauthorized_and_resends_link() -> Result<()> {
    let app = test_app(Vec::new())?;

    send(&app.router, post_json("/auth/register", &register_body("ann@example.com"))?).await?;
    let response = login(&app, "ann@example.com").await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert_eq!(app.outbox.count(), 2);
    Ok(())
}

#[tokio::test]
async fn login_unknown_email_is_not_found() -> Result<()> {
    let app = test_app(Vec::new())?;
    let response = login(&app, "ghost@example.com").await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn email_confirmation_rejects_unknown_token() -> Result<()> {
    let app = test_app(Vec::new())?;
    let response = send(
        &app.router,
        post_json("/auth/email-confirmation", &json!({ "token": "nope" }))?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn session_lifecycle_over_cookie() -> Result<()> {
    let app = test_app(Vec::new())?;
    register_and_verify(&app, "ann@example.com").await?;

    let response = login(&app, "ann@example.com").await?;
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response
        .headers()
        .get(SET_COOKIE)
        .context("missing Set-Cookie")?
        .to_str()?
        .to_string();
    assert!(set_cookie.starts_with("authgate_session="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(!set_cookie.contains("Secure"));
    let cookie = cookie_pair(&response)?;
    let profile = body_json(response).await?;
    assert_eq!(profile["email"], "ann@example.com");
    assert_eq!(profile["isVerified"], true);

    let response = send(&app.router, with_cookie("GET", "/users/profile", &cookie)?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let profile = body_json(response).await?;
    assert_eq!(profile["displayName"], "Ann");

    let response = send(&app.router, with_cookie("POST", "/auth/logout", &cookie)?).await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cleared = response
        .headers()
        .get(SET_COOKIE)
        .context("missing Set-Cookie")?
        .to_str()?;
    assert!(cleared.contains("Max-Age=0"));

    let response = send(&app.router, with_cookie("GET", "/users/profile", &cookie)?).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // the session is gone, so a second logout cannot destroy anything
    let response = send(&app.router, with_cookie("POST", "/auth/logout", &cookie)?).await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get(SET_COOKIE).is_none());
    Ok(())
}

#[tokio::test]
async fn bearer_token_is_accepted() -> Result<()> {
    let app = test_app(Vec::new())?;
    register_and_verify(&app, "ann@example.com").await?;
    let response = login(&app, "ann@example.com").await?;
    let cookie = cookie_pair(&response)?;
    let (_, token) = cookie.split_once('=').context("malformed cookie")?;

    let request = Request::builder()
        .uri("/users/profile")
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())?;
    let response = send(&app.router, request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn relogin_rotates_the_session() -> Result<()> {
    let app = test_app(Vec::new())?;
    register_and_verify(&app, "ann@example.com").await?;
    let first = cookie_pair(&login(&app, "ann@example.com").await?)?;

    let request = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header(CONTENT_TYPE, "application/json")
        .header(COOKIE, first.as_str())
        .body(Body::from(
            json!({ "email": "ann@example.com", "password": "s3cret-pass" }).to_string(),
        ))?;
    let response = send(&app.router, request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let second = cookie_pair(&response)?;
    assert_ne!(first, second);

    let response = send(&app.router, with_cookie("GET", "/users/profile", &first)?).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let response = send(&app.router, with_cookie("GET", "/users/profile", &second)?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn profile_update_and_admin_lookup() -> Result<()> {
    let app = test_app(Vec::new())?;
    register_and_verify(&app, "ann@example.com").await?;
    register_and_verify(&app, "bob@example.com").await?;
    let cookie = cookie_pair(&login(&app, "ann@example.com").await?)?;

    let patch = |body: Value| -> Result<Request<Body>> {
        Ok(Request::builder()
            .method("PATCH")
            .uri("/users/profile")
            .header(CONTENT_TYPE, "application/json")
            .header(COOKIE, cookie.as_str())
            .body(Body::from(body.to_string()))?)
    };

    let response = send(&app.router, patch(json!({ "name": " Annie ", "isTwoFactorEnabled": true }))?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let profile = body_json(response).await?;
    assert_eq!(profile["displayName"], "Annie");
    assert_eq!(profile["isTwoFactorEnabled"], true);
    let id = profile["id"].as_str().context("missing id")?.to_string();

    let response = send(&app.router, patch(json!({ "email": "BOB@example.com" }))?).await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = send(&app.router, patch(json!({ "name": "  " }))?).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app.router,
        with_cookie("GET", &format!("/users/by-id/{id}"), &cookie)?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let request = Request::builder()
        .uri(format!("/users/by-id/{id}"))
        .body(Body::empty())?;
    let response = send(&app.router, request).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn health_reports_store_and_build() -> Result<()> {
    let app = test_app(Vec::new())?;

    let request = Request::builder().uri("/health").body(Body::empty())?;
    let response = send(&app.router, request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let x_app = response
        .headers()
        .get("X-App")
        .context("missing X-App")?
        .to_str()?
        .to_string();
    assert!(x_app.starts_with(&format!("authgate:{}:", env!("CARGO_PKG_VERSION"))));
    let body = body_json(response).await?;
    assert_eq!(body["name"], "authgate");
    assert_eq!(body["database"], "ok");
    Ok(())
}

#[tokio::test]
async fn openapi_document_is_served() -> Result<()> {
    let app = test_app(Vec::new())?;
    let request = Request::builder()
        .uri("/api-docs/openapi.json")
        .body(Body::empty())?;
    let response = send(&app.router, request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert!(body["paths"]["/auth/register"].is_object());
    Ok(())
}

fn google(endpoints: ProviderEndpoints) -> OAuthProvider {
    OAuthProvider::new(
        ProviderKind::Google,
        "client-id".to_string(),
        SecretString::from("client-secret".to_string()),
        vec!["email".to_string()],
    )
    .with_endpoints(endpoints)
}

fn endpoints(base: &str) -> ProviderEndpoints {
    ProviderEndpoints {
        authorize_url: format!("{base}/authorize"),
        token_url: format!("{base}/token"),
        profile_url: format!("{base}/profile"),
    }
}

#[tokio::test]
async fn oauth_routes_guard_unknown_provider_and_missing_code() -> Result<()> {
    let app = test_app(vec![google(endpoints("http://127.0.0.1:9"))])?;

    let request = Request::builder()
        .uri("/auth/oauth/connect/github")
        .body(Body::empty())?;
    assert_eq!(send(&app.router, request).await?.status(), StatusCode::NOT_FOUND);

    let request = Request::builder()
        .uri("/auth/oauth/callback/github?code=abc")
        .body(Body::empty())?;
    assert_eq!(send(&app.router, request).await?.status(), StatusCode::NOT_FOUND);

    let request = Request::builder()
        .uri("/auth/oauth/callback/google")
        .body(Body::empty())?;
    assert_eq!(send(&app.router, request).await?.status(), StatusCode::BAD_REQUEST);

    let (url, state_cookie) = connect(&app, "google").await?;
    assert!(url.starts_with("http://127.0.0.1:9/authorize?"));
    assert!(url.contains("response_type=code"));
    let state = state_cookie
        .strip_prefix("authgate_oauth_state=")
        .context("state cookie name")?;
    assert!(url.contains(&format!("state={state}")));
    Ok(())
}

/// Call the connect endpoint and return the consent URL and the state cookie pair.
async fn connect(app: &TestApp, provider: &str) -> Result<(String, String)> {
    let request = Request::builder()
        .uri(format!("/auth/oauth/connect/{provider}"))
        .body(Body::empty())?;
    let response = send(&app.router, request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let state_cookie = cookie_pair(&response)?;
    let body = body_json(response).await?;
    let url = body["url"].as_str().context("missing url")?.to_string();
    Ok((url, state_cookie))
}

fn state_from(url: &str) -> Result<String> {
    let (_, rest) = url.split_once("state=").context("no state in url")?;
    Ok(rest.split('&').next().unwrap_or_default().to_string())
}

async fn mock_google_provider(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": "g-123",
            "email": "ann@example.com",
            "name": "Ann"
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn oauth_callback_signs_in_and_redirects() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    mock_google_provider(&server).await;
    let app = test_app(vec![google(endpoints(&server.uri()))])?;

    let (url, state_cookie) = connect(&app, "google").await?;
    let state = state_from(&url)?;
    let uri = format!("/auth/oauth/callback/google?code=abc&state={state}");
    let response = send(&app.router, with_cookie("GET", &uri, &state_cookie)?).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(LOCATION).map(|v| v.to_str().ok()),
        Some(Some("http://localhost:3000/dashboard/settings"))
    );
    let cookies: Vec<&str> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();
    assert!(cookies
        .iter()
        .any(|cookie| cookie.starts_with("authgate_oauth_state=;")));
    let cookie = cookie_pair(&response)?;
    assert!(cookie.starts_with("authgate_session="));

    let response = send(&app.router, with_cookie("GET", "/users/profile", &cookie)?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let profile = body_json(response).await?;
    assert_eq!(profile["method"], "google");
    assert_eq!(profile["isVerified"], true);
    assert_eq!(profile["accounts"][0]["provider"], "google");
    Ok(())
}

#[tokio::test]
async fn oauth_callback_rejects_missing_or_forged_state() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    mock_google_provider(&server).await;
    let app = test_app(vec![google(endpoints(&server.uri()))])?;
    let (url, state_cookie) = connect(&app, "google").await?;
    let state = state_from(&url)?;

    let request = Request::builder()
        .uri(format!("/auth/oauth/callback/google?code=abc&state={state}"))
        .body(Body::empty())?;
    let response = send(&app.router, request).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(SET_COOKIE).is_none());

    let forged = with_cookie(
        "GET",
        "/auth/oauth/callback/google?code=abc&state=attacker",
        &state_cookie,
    )?;
    let response = send(&app.router, forged).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(SET_COOKIE).is_none());

    let no_state = with_cookie("GET", "/auth/oauth/callback/google?code=abc", &state_cookie)?;
    let response = send(&app.router, no_state).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.is_empty());
    Ok(())
}
