//! HTTP handler functions for the crime intelligence API.

use actix_web::{HttpResponse, web};
use chrono::{Datelike as _, Utc};
use crime_intel_analytics::{AnalyticsError, Engine};
use crime_intel_analytics_models::RiskParams;
use crime_intel_server_models::{
    ApiHealth, ClusterQuery, ErrorResponse, HeatmapQuery, MonthlyQuery, PatternQuery, QueryError,
    RelatedQuery, RepeatOffenderQuery, RiskQuery, ScopeQuery, SearchQueryParams, SimilarQuery,
};
use crime_intel_spatial::CancelToken;
use serde::Serialize;

use crate::AppState;

fn error_body(kind: &str, message: String) -> ErrorResponse {
    ErrorResponse {
        error: kind.to_string(),
        message,
    }
}

fn bad_query(err: &QueryError) -> HttpResponse {
    HttpResponse::BadRequest().json(error_body("invalid_query", err.to_string()))
}

fn engine_error(what: &str, err: &AnalyticsError) -> HttpResponse {
    let body = error_body(err.kind(), err.to_string());
    match err {
        AnalyticsError::InvalidQuery { .. } => HttpResponse::BadRequest().json(body),
        AnalyticsError::NotFound { .. } => HttpResponse::NotFound().json(body),
        AnalyticsError::Cancelled => {
            log::warn!("{what} timed out");
            HttpResponse::ServiceUnavailable().json(body)
        }
        AnalyticsError::DataProvider(_) | AnalyticsError::Config { .. } => {
            log::error!("Failed to compute {what}: {err}");
            HttpResponse::InternalServerError().json(body)
        }
    }
}

/// Runs `op` on the blocking pool with a fresh request token and renders
/// its result as JSON.
async fn run<T, F>(state: web::Data<AppState>, what: &'static str, op: F) -> HttpResponse
where
    T: Serialize + Send + 'static,
    F: FnOnce(&Engine, &CancelToken) -> Result<T, AnalyticsError> + Send + 'static,
{
    let result = web::block(move || {
        let cancel = state.engine.request_token();
        op(&state.engine, &cancel)
    })
    .await;

    match result {
        Ok(Ok(value)) => HttpResponse::Ok().json(value),
        Ok(Err(e)) => engine_error(what, &e),
        Err(e) => {
            log::error!("Blocking task for {what} failed: {e}");
            HttpResponse::InternalServerError().json(error_body("internal", e.to_string()))
        }
    }
}

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/heatmap`
///
/// Grid density over a required bounding box.
pub async fn heatmap(state: web::Data<AppState>, query: web::Query<HeatmapQuery>) -> HttpResponse {
    let params = match query.into_inner().into_params() {
        Ok(params) => params,
        Err(e) => return bad_query(&e),
    };
    run(state, "heatmap", move |engine, cancel| {
        engine.heatmap(&params, cancel)
    })
    .await
}

/// `GET /api/clusters`
///
/// Density-based clusters, optionally within a bounding box.
pub async fn clusters(state: web::Data<AppState>, query: web::Query<ClusterQuery>) -> HttpResponse {
    let params = match query.into_inner().into_params() {
        Ok(params) => params,
        Err(e) => return bad_query(&e),
    };
    run(state, "clusters", move |engine, cancel| {
        engine.clusters(&params, cancel)
    })
    .await
}

/// `GET /api/cases/{id}/related`
pub async fn related_cases(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    query: web::Query<RelatedQuery>,
) -> HttpResponse {
    let params = query.into_inner().into_params(path.into_inner());
    run(state, "related cases", move |engine, cancel| {
        engine.related_cases(&params, cancel)
    })
    .await
}

/// `GET /api/cases/{id}/similar`
pub async fn similar_cases(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    query: web::Query<SimilarQuery>,
) -> HttpResponse {
    let params = query.into_inner().into_params(path.into_inner());
    run(state, "similar behavior", move |engine, cancel| {
        engine.similar_behavior(&params, cancel)
    })
    .await
}

/// `GET /api/patterns`
pub async fn patterns(
    state: web::Data<AppState>,
    scope: web::Query<ScopeQuery>,
    query: web::Query<PatternQuery>,
) -> HttpResponse {
    let params = match query.into_inner().into_params(&scope) {
        Ok(params) => params,
        Err(e) => return bad_query(&e),
    };
    run(state, "patterns", move |engine, cancel| {
        engine.patterns(&params, cancel)
    })
    .await
}

/// `GET /api/repeat-offenders`
pub async fn repeat_offenders(
    state: web::Data<AppState>,
    scope: web::Query<ScopeQuery>,
    query: web::Query<RepeatOffenderQuery>,
) -> HttpResponse {
    let params = match query.into_inner().into_params(&scope) {
        Ok(params) => params,
        Err(e) => return bad_query(&e),
    };
    run(state, "repeat offenders", move |engine, cancel| {
        engine.repeat_offenders(&params, cancel)
    })
    .await
}

/// `GET /api/persons/{id}/risk`
///
/// Scores as of `asOf`, or now when absent.
pub async fn risk(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    query: web::Query<RiskQuery>,
) -> HttpResponse {
    let params = RiskParams {
        person_id: path.into_inner(),
        as_of: query.as_of.unwrap_or_else(Utc::now),
    };
    run(state, "risk score", move |engine, cancel| {
        engine.risk(&params, cancel)
    })
    .await
}

/// `GET /api/search`
pub async fn search(
    state: web::Data<AppState>,
    query: web::Query<SearchQueryParams>,
) -> HttpResponse {
    let params = match query.into_inner().into_params() {
        Ok(params) => params,
        Err(e) => return bad_query(&e),
    };
    run(state, "search", move |engine, cancel| {
        engine.search(params, cancel)
    })
    .await
}

/// `GET /api/stats/tags`
pub async fn tag_stats(state: web::Data<AppState>, scope: web::Query<ScopeQuery>) -> HttpResponse {
    let filter = match scope.to_filter() {
        Ok(filter) => filter,
        Err(e) => return bad_query(&e),
    };
    run(state, "tag frequency", move |engine, cancel| {
        engine.tag_frequency(&filter, cancel)
    })
    .await
}

/// `GET /api/stats/districts`
pub async fn district_stats(
    state: web::Data<AppState>,
    scope: web::Query<ScopeQuery>,
) -> HttpResponse {
    let filter = match scope.to_filter() {
        Ok(filter) => filter,
        Err(e) => return bad_query(&e),
    };
    run(state, "district counts", move |engine, cancel| {
        engine.districts(&filter, cancel)
    })
    .await
}

/// `GET /api/stats/monthly`
///
/// Twelve monthly counts for `year`, or the current year when absent.
pub async fn monthly_stats(
    state: web::Data<AppState>,
    scope: web::Query<ScopeQuery>,
    query: web::Query<MonthlyQuery>,
) -> HttpResponse {
    let filter = match scope.to_filter() {
        Ok(filter) => filter,
        Err(e) => return bad_query(&e),
    };
    let year = query.year.unwrap_or_else(|| Utc::now().year());
    run(state, "monthly trend", move |engine, cancel| {
        engine.monthly_trend(&filter, year, cancel)
    })
    .await
}
