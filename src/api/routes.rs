use crate::config::Config;
use crate::db::{Database, LocationRow, TimestampRange};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

const DEFAULT_PAGE_LIMIT: usize = 100_000;

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
    /// Read once at startup; new ingestion runs need a restart to show up.
    pub timestamps: Arc<TimestampRange>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/timestamps", get(timestamps))
        .route("/locations", get(locations))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct LocationsQuery {
    page: Option<usize>,
    limit: Option<usize>,
}

#[derive(Debug, Serialize, PartialEq)]
struct PointGeometry {
    #[serde(rename = "type")]
    kind: &'static str,
    coordinates: [f64; 2],
}

#[derive(Debug, Serialize, PartialEq)]
struct LocationView {
    id: i64,
    geojson: PointGeometry,
    timestamp: NaiveDateTime,
    #[serde(rename = "type")]
    point_type: String,
}

impl From<LocationRow> for LocationView {
    fn from(row: LocationRow) -> Self {
        Self {
            id: row.id,
            geojson: PointGeometry {
                kind: "Point",
                coordinates: [row.longitude, row.latitude],
            },
            timestamp: row.timestamp,
            point_type: row.point_type,
        }
    }
}

async fn timestamps(State(state): State<ApiState>) -> Json<TimestampRange> {
    Json(state.timestamps.as_ref().clone())
}

async fn locations(
    State(state): State<ApiState>,
    Query(query): Query<LocationsQuery>,
) -> ApiResult<Json<Vec<LocationView>>> {
    let (limit, offset) = page_bounds(query.page, query.limit);

    let database = Database::open(&state.config.db_path)?;
    let rows = database
        .locations_page(limit, offset)?
        .into_iter()
        .map(LocationView::from)
        .collect::<Vec<_>>();

    tracing::debug!(rows = rows.len(), limit, offset, "locations page served");

    Ok(Json(rows))
}

fn page_bounds(page: Option<usize>, limit: Option<usize>) -> (usize, usize) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit
        .unwrap_or(DEFAULT_PAGE_LIMIT)
        .clamp(1, DEFAULT_PAGE_LIMIT);

    (limit, (page - 1).saturating_mul(limit))
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum ApiError {
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Internal(error) => {
                tracing::error!(error = %error, "database query error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal Server Error" })),
                )
                    .into_response()
            }
        }
    }
}
