//! Weather API charging 0.01 STX per request.
//!
//! ```text
//! PAYWARDEN_ADDRESS=ST... cargo run --example weather_api --features axum
//! curl -i localhost:3001/api/weather?city=tokyo
//! curl -i -H "X-Payment-Proof: 0x<txid>" localhost:3001/api/weather?city=tokyo
//! ```
//!
//! Set `PAYWARDEN_CONFIG` to load a `stackpay.config.json` instead.

use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{middleware, Extension, Json, Router};
use paywarden::integrations::axum::require_payment;
use paywarden::{Currency, Gate, GateConfig, PaymentContext};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const CITIES: &[(&str, f64, f64)] = &[
    ("tokyo", 35.6762, 139.6503),
    ("london", 51.5074, -0.1278),
    ("new york", 40.7128, -74.006),
    ("paris", 48.8566, 2.3522),
    ("singapore", 1.3521, 103.8198),
];

#[derive(Deserialize)]
struct CityQuery {
    city: Option<String>,
}

fn load_config() -> Result<GateConfig, paywarden::PaywardenError> {
    if let Ok(path) = std::env::var("PAYWARDEN_CONFIG") {
        return GateConfig::from_file(path);
    }
    let address = std::env::var("PAYWARDEN_ADDRESS").unwrap_or_default();
    let mut config = GateConfig::new(0.01, Currency::Stx, address);
    config.project_name = Some("weather-api".to_string());
    Ok(config)
}

async fn index(Extension(gate): Extension<Arc<Gate>>) -> impl IntoResponse {
    let pricing = gate
        .descriptor()
        .map(|d| format!("{} {} per request", d.amount_decimal(), d.currency))
        .unwrap_or_else(|| "unavailable".to_string());
    Json(json!({
        "name": "Weather API",
        "pricing": pricing,
        "endpoints": ["/api/weather?city=tokyo"],
        "supportedCities": CITIES.iter().map(|(name, _, _)| *name).collect::<Vec<_>>(),
    }))
}

async fn health() -> &'static str {
    "ok"
}

async fn weather(
    Extension(payment): Extension<PaymentContext>,
    Query(query): Query<CityQuery>,
) -> impl IntoResponse {
    let city = query.city.unwrap_or_default().to_lowercase();
    let Some((name, lat, lon)) = CITIES.iter().find(|(name, _, _)| *name == city) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "City not found",
                "message": format!("City {:?} not supported", city),
            })),
        );
    };

    (
        StatusCode::OK,
        Json(json!({
            "city": name,
            "coordinates": { "lat": lat, "lon": lon },
            "temperatureC": 21.5,
            "conditions": "Partly cloudy",
            "payment": payment,
        })),
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,paywarden=debug")),
        )
        .init();

    let gate = Arc::new(Gate::new(load_config()?)?);

    let app = Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/weather", get(weather))
        .layer(middleware::from_fn_with_state(gate.clone(), require_payment))
        .layer(Extension(gate));

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3001").await?;
    tracing::info!("Weather API listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
