use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use crate::error::ServiceError;
use crate::query::{ExportParams, ReadParams};
use crate::report::Envelope;
use crate::service::ReadingService;

pub struct AppState {
    pub service: ReadingService,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

fn status_for(err: &ServiceError) -> StatusCode {
    if err.is_validation() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Read sensor data in one of the query-parameter-driven modes
pub async fn read_sensor_data(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReadParams>,
) -> Result<Json<Envelope>, (StatusCode, Json<Envelope>)> {
    match state.service.read_params(params).await {
        Ok(envelope) => Ok(Json(envelope)),
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                error!("Failed to read sensor data: {}", e);
            }
            Err((status, Json(Envelope::failure(e.to_string()))))
        }
    }
}

/// Export one device-month as a CSV or spreadsheet attachment
pub async fn export_sensor_data(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ExportParams>,
) -> Result<Response, (StatusCode, String)> {
    match state.service.export_params(params).await {
        Ok(file) => Ok((
            [
                (header::CONTENT_TYPE, file.content_type.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", file.filename),
                ),
            ],
            file.bytes,
        )
            .into_response()),
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                error!("Failed to export sensor data: {}", e);
            }
            Err((status, e.to_string()))
        }
    }
}

/// Health check endpoint; pings the store
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SuccessResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.service.ping().await {
        Ok(()) => Ok(Json(SuccessResponse {
            message: "OK".to_string(),
        })),
        Err(e) => {
            error!("Health check failed: {}", e);
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
    }
}
