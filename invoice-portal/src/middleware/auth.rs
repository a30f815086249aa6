use crate::models::user::Role;
use crate::services::backend_client::BackendClient;
use crate::services::session::{authorize, resolve_identity, Access};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tower_sessions::Session;

/// Guard state for one route group.
#[derive(Clone)]
pub struct RoleGate {
    pub backend: Arc<BackendClient>,
    pub allowed: &'static [Role],
}

impl RoleGate {
    pub fn new(backend: Arc<BackendClient>, allowed: &'static [Role]) -> Self {
        Self { backend, allowed }
    }
}

/// Resolve the session against `GET /me` and admit only the gate's roles.
/// The resolved [`SessionContext`](crate::services::session::SessionContext)
/// is handed to the handler through the request extensions.
pub async fn role_gate(
    State(gate): State<RoleGate>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = match resolve_identity(&gate.backend, &session).await {
        Ok(identity) => identity,
        Err(e) => return e.into_response(),
    };

    match authorize(identity, gate.allowed) {
        Access::Granted(context) => {
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Access::Login => Redirect::to("/login").into_response(),
        Access::Unauthorized => {
            tracing::warn!(path = %request.uri().path(), "Role not admitted");
            Redirect::to("/unauthorized").into_response()
        }
    }
}
