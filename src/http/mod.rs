mod routes;
mod types;

use crate::relay::Relay;
use axum::http::{HeaderName, HeaderValue};
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

#[derive(Clone)]
pub struct HttpState {
    pub relay: Relay,
}

pub fn create_app(relay: Relay) -> axum::Router {
    axum::Router::new()
        .route("/", get(routes::health))
        .route("/webhook", post(routes::webhook))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-version"),
            HeaderValue::from_static(crate::VERSION),
        ))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(HttpState { relay })
}
