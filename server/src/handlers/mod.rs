pub mod accounting;
pub mod activity;
pub mod appointments;
pub mod auth;
pub mod dashboard;
pub mod knowledge;
pub mod patients;
pub mod profile;
pub mod resource;
pub mod settings;
pub mod visa;

use axum::http::StatusCode;

/// Health check endpoint
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}
