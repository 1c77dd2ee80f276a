#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the crime intelligence engine.
//!
//! Every analytical operation is exposed as a `GET` endpoint under
//! `/api`. Handlers parse the query string into typed parameters, run the
//! engine call on the blocking pool with a deadline-bearing cancel token,
//! and map engine error kinds onto HTTP status codes.

mod handlers;

use std::sync::Arc;

use actix_web::{App, HttpResponse, HttpServer, error::InternalError, middleware, web};
use crime_intel_analytics::{Engine, EngineConfig};
use crime_intel_database::db;
use crime_intel_server_models::ErrorResponse;

/// Shared application state.
pub struct AppState {
    /// Analytics engine over the loaded snapshot.
    pub engine: Engine,
}

/// Registers the `/api` routes and the JSON query error handler.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::QueryConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::BadRequest().json(ErrorResponse {
            error: "invalid_query".to_string(),
            message: err.to_string(),
        });
        InternalError::from_response(err, response).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::BadRequest().json(ErrorResponse {
            error: "invalid_query".to_string(),
            message: err.to_string(),
        });
        InternalError::from_response(err, response).into()
    }))
    .service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/heatmap", web::get().to(handlers::heatmap))
            .route("/clusters", web::get().to(handlers::clusters))
            .route("/cases/{id}/related", web::get().to(handlers::related_cases))
            .route("/cases/{id}/similar", web::get().to(handlers::similar_cases))
            .route("/patterns", web::get().to(handlers::patterns))
            .route("/repeat-offenders", web::get().to(handlers::repeat_offenders))
            .route("/persons/{id}/risk", web::get().to(handlers::risk))
            .route("/search", web::get().to(handlers::search))
            .route("/stats/tags", web::get().to(handlers::tag_stats))
            .route("/stats/districts", web::get().to(handlers::district_stats))
            .route("/stats/monthly", web::get().to(handlers::monthly_stats)),
    );
}

/// Starts the crime intelligence API server.
///
/// Loads the engine configuration (`CRIME_INTEL_CONFIG`) and the snapshot
/// (`CRIME_INTEL_SNAPSHOT`), then serves on `BIND_ADDR:PORT`. The caller
/// provides the async runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Error` if the configuration or snapshot cannot
/// be loaded, or if the HTTP server fails to bind or run.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    log::info!("Loading engine configuration...");
    let config = EngineConfig::resolve(None).map_err(std::io::Error::other)?;

    log::info!("Loading snapshot...");
    let snapshot = db::open_from_env().map_err(std::io::Error::other)?;

    let engine = Engine::new(Arc::new(snapshot), config).map_err(std::io::Error::other)?;
    serve(engine).await
}

/// Serves `engine` on `BIND_ADDR:PORT` (default `127.0.0.1:8080`).
///
/// # Errors
///
/// Returns an `std::io::Error` if the HTTP server fails to bind or run.
#[allow(clippy::future_not_send)]
pub async fn serve(engine: Engine) -> std::io::Result<()> {
    let state = web::Data::new(AppState { engine });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test};
    use crime_intel_database::Snapshot;
    use serde_json::Value;

    const SNAPSHOT: &str = r#"{
        "tags": [{"id": 1, "name": "burglary"}, {"id": 2, "name": "night"}],
        "incidents": [
            {"id": 10, "incident_type": "burglary", "occurred_at": "2024-03-01T22:00:00Z",
             "latitude": 12.96, "longitude": 77.58, "district": "North", "tag_ids": [1, 2]},
            {"id": 20, "incident_type": "burglary", "occurred_at": "2024-03-03T22:00:00Z",
             "latitude": 12.961, "longitude": 77.581, "district": "North", "tag_ids": [1, 2]}
        ],
        "cases": [
            {"id": 1, "title": "First", "status": "open", "primary_incident_id": 10,
             "created_at": "2024-03-02T00:00:00Z"},
            {"id": 2, "title": "Second", "status": "closed", "primary_incident_id": 20,
             "created_at": "2024-03-04T00:00:00Z"}
        ],
        "persons": [{"id": 100, "name": "Pat Doe"}],
        "case_persons": [
            {"case_id": 1, "person_id": 100, "role": "suspect"},
            {"case_id": 2, "person_id": 100, "role": "suspect"}
        ]
    }"#;

    fn state() -> web::Data<AppState> {
        let snapshot = Snapshot::from_json_str(SNAPSHOT).unwrap();
        let config = EngineConfig {
            parallelism: 2,
            ..EngineConfig::default()
        };
        web::Data::new(AppState {
            engine: Engine::new(Arc::new(snapshot), config).unwrap(),
        })
    }

    async fn get(uri: &str) -> (StatusCode, Value) {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        let status = resp.status();
        let body: Value = test::read_body_json(resp).await;
        (status, body)
    }

    #[actix_web::test]
    async fn health_reports_version() {
        let (status, body) = get("/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["healthy"], true);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[actix_web::test]
    async fn heatmap_counts_every_incident() {
        let (status, body) = get("/api/heatmap?bbox=12.95,77.55,12.98,77.60&cellSize=250").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalIncidents"], 2);
    }

    #[actix_web::test]
    async fn malformed_bbox_is_bad_request() {
        let (status, body) = get("/api/heatmap?bbox=12.95,77.55,12.98").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_query");
    }

    #[actix_web::test]
    async fn unparseable_number_is_json_bad_request() {
        let (status, body) = get("/api/heatmap?bbox=12.95,77.55,12.98,77.60&cellSize=wide").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_query");
    }

    #[actix_web::test]
    async fn related_cases_rank_the_other_case() {
        let (status, body) = get("/api/cases/1/related").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["referenceCaseId"], 1);
        assert_eq!(body["results"][0]["caseId"], 2);
    }

    #[actix_web::test]
    async fn unknown_case_is_not_found() {
        let (status, body) = get("/api/cases/99/similar").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[actix_web::test]
    async fn search_filters_by_status() {
        let (status, body) = get("/api/search?status=closed").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["results"][0]["caseId"], 2);

        let (status, _) = get("/api/search?status=sleeping").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn repeat_offenders_and_risk() {
        let (status, body) = get("/api/repeat-offenders?role=suspect&minCases=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["personId"], 100);
        assert_eq!(body[0]["caseCount"], 2);

        let (status, body) = get("/api/persons/100/risk?asOf=2024-03-05T00:00:00Z").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["personId"], 100);
        assert_eq!(body["factors"]["caseCount"], 2);
    }

    #[actix_web::test]
    async fn stats_endpoints() {
        let (status, body) = get("/api/stats/monthly?year=2024").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["months"][2]["count"], 2);

        let (status, body) = get("/api/stats/districts").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["district"], "North");

        let (status, body) = get("/api/patterns?minOccurrence=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tagPairs"][0]["count"], 2);
    }
}
