//! HTTP API of the agency CRM: session-gated CRUD over clients, patients,
//! appointments, invoices, accounting, visa cases and the knowledge base,
//! plus the dashboard and activity aggregates.

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod pagination;
pub mod repository;
pub mod stats;
pub mod validation;
pub mod workflow;

use std::sync::Arc;

use agency_store::SharedStore;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{LogOtpSender, OtpSender, Session, SessionKeys};
use crate::handlers::resource::resource_routes;
use crate::handlers::{
    accounting, activity, appointments, auth as auth_handlers, dashboard, health_check, knowledge, patients,
    profile, settings, visa,
};
use crate::models::{Client, Invoice, Resource, User};
use crate::repository::Repository;

pub const DEFAULT_MAX_PAGE_SIZE: u64 = 100;

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub sessions: Arc<SessionKeys>,
    pub otp: Arc<dyn OtpSender>,
    pub max_page_size: u64,
}

impl AppState {
    pub fn new(store: SharedStore, sessions: SessionKeys, max_page_size: u64) -> Self {
        Self {
            store,
            sessions: Arc::new(sessions),
            otp: Arc::new(LogOtpSender),
            max_page_size: max_page_size.max(1),
        }
    }

    pub fn with_otp_sender(mut self, sender: Arc<dyn OtpSender>) -> Self {
        self.otp = sender;
        self
    }

    pub fn repo<T: Resource>(&self) -> Repository<T> {
        Repository::new(self.store.clone())
    }
}

/// Every `/api` route except login sits behind the session gate.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .nest("/clients", resource_routes::<Client>())
        .nest("/patients", patients::routes())
        .nest("/appointments", appointments::routes())
        .nest("/invoices", resource_routes::<Invoice>())
        .nest("/accounting", accounting::routes())
        .nest("/visa-applications", visa::routes())
        .nest("/knowledge", knowledge::routes())
        .nest("/users", resource_routes::<User>())
        .nest("/settings", settings::routes())
        .nest("/profile", profile::routes())
        .route("/dashboard", get(dashboard::summary))
        .route("/activity", get(activity::feed))
        .route("/knowledge-help", get(knowledge::help))
        .route("/auth/logout", post(auth_handlers::logout))
        .route_layer(middleware::from_extractor_with_state::<Session, AppState>(state.clone()))
        .route("/auth/login", post(auth_handlers::login));

    Router::new()
        .nest("/api", api)
        .route("/health", get(health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
