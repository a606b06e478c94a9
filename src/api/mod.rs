//! HTTP surface: thin axum handlers over [`AuthService`].

use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::AuthService;

pub mod handlers;
mod openapi;

pub use openapi::{openapi, ApiDoc};

use handlers::{auth, health, oauth, users, verification};

/// Routes plus the shared service, without transport layers.
pub fn router(service: Arc<AuthService>) -> Router {
    Router::new()
        .route("/health", get(health::health).options(health::health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/oauth/connect/:provider", get(oauth::connect))
        .route("/auth/oauth/callback/:provider", get(oauth::callback))
        .route(
            "/auth/email-confirmation",
            post(verification::email_confirmation),
        )
        .route(
            "/users/profile",
            get(users::get_profile).patch(users::update_profile),
        )
        .route("/users/by-id/:id", get(users::find_by_id))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .layer(Extension(service))
}

/// Full application: routes, request ids, tracing spans and CORS.
///
/// # Errors
/// Fails when the frontend base URL cannot be turned into a CORS origin.
pub fn app(service: Arc<AuthService>) -> Result<Router> {
    let frontend_origin = frontend_origin(service.config().frontend_base_url())?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    Ok(router(service).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(cors),
    ))
}

/// Serve until Ctrl-C.
///
/// # Errors
/// Fails if the listener cannot bind or the server stops with an error.
pub async fn new(port: u16, service: Arc<AuthService>) -> Result<()> {
    let app = app(service)?;

    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}
