use anyhow::Result;
use axum::{
    Router,
    body::Body,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::actions;
use crate::credit_policy::CreditPolicy;
use crate::credit_store::CreditStore;
use crate::ledger::Ledger;
use crate::metrics::metrics_handler;
use crate::reconciler::WebhookReconciler;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

// App state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub ledger: Ledger,
    pub reconciler: WebhookReconciler,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn CreditStore>,
        policy: CreditPolicy,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            ledger: Ledger::new(store.clone()),
            reconciler: WebhookReconciler::new(store, policy),
            metrics,
        }
    }
}

// Middleware for request logging with correlation ID
async fn request_logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = Uuid::new_v4().to_string()[..8].to_string();
    let start_time = Instant::now();

    info!("Started {} {} [{}]", method, path, request_id);

    let response = next.run(request).await;
    let duration = start_time.elapsed();
    let status = response.status();

    info!(
        "Completed {} {} [{}] {} in {:.2}ms",
        method,
        path,
        request_id,
        status.as_u16(),
        duration.as_secs_f64() * 1000.0
    );

    response
}

// Middleware to capture HTTP errors to Sentry
async fn sentry_error_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    if response.status().is_server_error() {
        let status = response.status();
        error!("HTTP {} error on {} {}", status.as_u16(), method, uri);

        sentry::configure_scope(|scope| {
            scope.set_tag("http.method", method.as_str());
            scope.set_tag("http.url", uri.to_string());
            scope.set_tag("http.status_code", status.as_u16().to_string());
        });

        sentry::capture_message(
            &format!("HTTP {} error on {} {}", status.as_u16(), method, uri),
            sentry::Level::Error,
        );
    }

    response
}

/// Build the application router. Split out from [`start_web_server`] so
/// tests can drive it without a listener.
pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(actions::health_check))
        .route("/metrics", get(metrics_handler))
        // Credit ledger routes
        .route("/register-user", post(actions::register_user))
        .route("/get-credits/{app_user_id}", get(actions::get_credits))
        .route("/add-credits", post(actions::add_credits))
        .route("/use-credits", post(actions::use_credits))
        // RevenueCat webhook
        .route("/PostBack", post(actions::handle_webhook))
        .with_state(app_state)
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(middleware::from_fn(sentry_error_middleware))
        .layer(CorsLayer::permissive())
}

pub async fn start_web_server(interface: String, port: u16, app_state: AppState) -> Result<()> {
    sentry::configure_scope(|scope| {
        scope.set_tag("operation", "web-server");
    });
    info!("Starting web server on {}:{}", interface, port);

    let app = build_router(app_state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", interface, port)).await?;
    info!("Web server listening on http://{}:{}", interface, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Web server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal (Ctrl+C), finishing in-flight requests..."),
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
