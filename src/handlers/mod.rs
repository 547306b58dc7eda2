// HTTP surface: GraphQL endpoint, explorer page, health and service descriptor

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{Html, IntoResponse, Json},
    routing::{get, post},
    Router,
};
use juniper::http::{graphiql::graphiql_source, GraphQLRequest};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::config::SecurityConfig;
use crate::graphql::{self, Context, Schema};
use crate::middleware::authorization_header;
use crate::services::Services;

#[derive(Clone)]
pub struct AppState {
    pub schema: Arc<Schema>,
    pub services: Services,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        Self {
            schema: Arc::new(graphql::schema()),
            services,
        }
    }
}

pub fn app(state: AppState, security: &SecurityConfig) -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        // GraphQL
        .route("/graphql", post(graphql_handler))
        .route("/graphiql", get(graphiql))
        .with_state(state)
        // Global middleware
        .layer(cors_layer(&security.cors_origins))
        .layer(TraceLayer::new_for_http())
}

/// Allow every origin unless a list is configured.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

async fn graphql_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<GraphQLRequest>,
) -> impl IntoResponse {
    let context = Context::new(state.services.clone(), authorization_header(&headers));
    let response = request.execute(&state.schema, &context).await;

    // Field errors still come back as 200 with an `errors` array
    let status = if response.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(response))
}

async fn graphiql() -> Html<String> {
    Html(graphiql_source("/graphql", None))
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Marketplace API",
            "version": version,
            "description": "Marketplace backend: accounts, listings and image uploads over GraphQL",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "graphql": "/graphql (POST; Authorization: Bearer <token> for mutations)",
                "graphiql": "/graphiql (in-browser explorer)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.services.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
