//! Application startup and lifecycle management.

use crate::config::InvoicingConfig;
use crate::handlers::{health, invoices, recurring};
use crate::services::{
    init_metrics, run_recurring_scheduler, Clock, Database, InMemoryStore, InvoiceService,
    InvoiceStore, RecurringEngine, SystemClock,
};
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn InvoiceStore>,
    pub clock: Arc<dyn Clock>,
    pub invoices: InvoiceService,
    pub recurring: RecurringEngine,
}

impl AppState {
    pub fn new(store: Arc<dyn InvoiceStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            invoices: InvoiceService::new(store.clone(), clock.clone()),
            recurring: RecurringEngine::new(store.clone(), clock.clone()),
            store,
            clock,
        }
    }
}

/// HTTP routes with the shared middleware stack.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/invoices",
            post(invoices::create_invoice).get(invoices::list_invoices),
        )
        .route("/invoices/:id", get(invoices::get_invoice))
        .route("/invoices/:id/status", put(invoices::update_status))
        .route("/invoices/:id/payments", post(invoices::record_payment))
        .route(
            "/recurring",
            post(recurring::create_schedule).get(recurring::list_schedules),
        )
        .route("/recurring/run", post(recurring::run_due_schedules))
        .route("/recurring/:id", get(recurring::get_schedule))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
    config: InvoicingConfig,
}

impl Application {
    /// Build the application with the given configuration.
    ///
    /// Uses PostgreSQL when a database URL is configured, memory otherwise.
    pub async fn build(config: InvoicingConfig) -> Result<Self, AppError> {
        init_metrics();

        let store: Arc<dyn InvoiceStore> = match &config.database.url {
            Some(url) => {
                let db = Database::new(
                    url,
                    config.database.max_connections,
                    config.database.min_connections,
                )
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to connect to PostgreSQL");
                    e
                })?;

                if config.database.run_migrations {
                    db.run_migrations().await.map_err(|e| {
                        tracing::error!(error = %e, "Failed to run migrations");
                        e
                    })?;
                }

                Arc::new(db)
            }
            None => {
                tracing::warn!("No database URL configured, keeping data in memory");
                Arc::new(InMemoryStore::new())
            }
        };

        Self::build_with_store(config, store, Arc::new(SystemClock)).await
    }

    /// Build around an existing store and clock.
    pub async fn build_with_store(
        config: InvoicingConfig,
        store: Arc<dyn InvoiceStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        let state = AppState::new(store, clock);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            port = port,
            storage = state.store.backend(),
            "Invoicing service listener bound"
        );

        Ok(Self {
            port,
            listener,
            state,
            config,
        })
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        if self.config.scheduler.enabled {
            tokio::spawn(run_recurring_scheduler(
                self.state.recurring.clone(),
                self.config.scheduler.interval(),
            ));
        } else {
            tracing::info!("Recurring scheduler disabled");
        }

        let router = build_router(self.state);

        tracing::info!(
            service = "invoicing-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, router).await
    }
}
