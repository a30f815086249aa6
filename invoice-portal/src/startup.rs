use crate::config::{ServerSettings, Settings, StorageBackend};
use crate::handlers::{admin, app, auth, finance, metrics, vendor};
use crate::middleware::auth::{role_gate, RoleGate};
use crate::models::user::Role;
use crate::services::{backend_client::BackendClient, storage};
use crate::AppState;
use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use service_core::error::AppError;
use service_core::observability::extract_request_id;
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::future::IntoFuture;
use std::path::PathBuf;
use std::sync::Arc;
use time::Duration;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

const VENDOR: &[Role] = &[Role::Vendor];
const FINANCE: &[Role] = &[Role::Finance];
const ADMIN: &[Role] = &[Role::Admin];

/// PDFs and workbooks are proxied through the portal.
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

pub fn build_router(state: AppState, server: &ServerSettings, files_dir: Option<PathBuf>) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(server.secure_cookies)
        .with_expiry(Expiry::OnInactivity(Duration::hours(
            server.session_ttl_hours,
        )));

    let vendor_routes = Router::new()
        .route("/vendor/draft", get(vendor::get_draft))
        .route("/vendor/draft/fields", put(vendor::update_fields))
        .route("/vendor/draft/autofill", post(vendor::autofill))
        .route(
            "/vendor/draft/pdfs/:field",
            post(vendor::attach_pdfs).delete(vendor::detach_pdf),
        )
        .route("/vendor/draft/clear", post(vendor::clear_draft))
        .route("/vendor/draft/submit", post(vendor::submit_draft))
        .route("/vendor/inbox", get(vendor::inbox))
        .route("/vendor/inbox/:id/reupload", post(vendor::reupload))
        .route_layer(from_fn_with_state(
            RoleGate::new(state.backend.clone(), VENDOR),
            role_gate,
        ));

    let finance_routes = Router::new()
        .route("/finance/invoices", get(finance::list_invoices))
        .route("/finance/invoices/export", get(finance::export))
        .route("/finance/invoices/:id/remark", post(finance::send_remark))
        .route("/finance/invoices/:id/payment", post(finance::send_for_payment))
        .route_layer(from_fn_with_state(
            RoleGate::new(state.backend.clone(), FINANCE),
            role_gate,
        ));

    let admin_routes = Router::new()
        .route(
            "/admin/vendors",
            get(admin::list_vendors).post(admin::create_vendor),
        )
        .route("/admin/vendors/import", post(admin::import_vendors))
        .route(
            "/admin/vendors/:id",
            put(admin::update_vendor).delete(admin::delete_vendor),
        )
        .route("/admin/audit-logs", get(admin::audit_logs))
        .route("/admin/audit-logs/export", get(admin::export_audit_logs))
        .route_layer(from_fn_with_state(
            RoleGate::new(state.backend.clone(), ADMIN),
            role_gate,
        ));

    let mut router = Router::new()
        .route("/health", get(app::health_check))
        .route("/metrics", get(metrics::metrics))
        .route("/unauthorized", get(app::unauthorized))
        .route("/login", post(auth::login_handler))
        .route("/signup", post(auth::signup_handler))
        .route("/logout", post(auth::logout_handler))
        .merge(vendor_routes)
        .merge(finance_routes)
        .merge(admin_routes)
        .layer(from_fn(security_headers_middleware));

    if let Some(dir) = files_dir {
        router = router.nest_service("/files", ServeDir::new(dir));
    }

    router
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(session_layer)
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id =
                    extract_request_id(request.headers()).unwrap_or_else(|| "-".to_string());

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
}

impl Application {
    pub async fn build(settings: Settings) -> Result<Self, AppError> {
        let backend = Arc::new(BackendClient::new(&settings.backend)?);
        let storage = storage::from_settings(&settings.storage).await.map_err(|e| {
            tracing::error!("Failed to initialize object storage: {}", e);
            e
        })?;

        let files_dir = match settings.storage.backend {
            StorageBackend::Local => Some(PathBuf::from(&settings.storage.local_path)),
            StorageBackend::S3 => None,
        };

        let draft_ttl =
            std::time::Duration::from_secs(settings.server.session_ttl_hours.max(1) as u64 * 3600);
        let state = AppState::new(backend, storage, draft_ttl);
        let app = build_router(state, &settings.server, files_dir);

        let address = format!("{}:{}", settings.server.host, settings.server.port);
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            port,
            backend = %settings.backend.url,
            "Invoice portal listening"
        );

        let server = axum::serve(listener, app);

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}
