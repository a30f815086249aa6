//! Per-user session state held server side.
//!
//! The browser only carries the session cookie. The backend token, the
//! resolved user and the key of the login's invoice draft live in the session
//! store under the keys below.

use crate::models::user::{Role, UserProfile};
use crate::services::backend_client::BackendClient;
use crate::services::draft::DraftStore;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use secrecy::{ExposeSecret, Secret};
use service_core::error::AppError;
use tower_sessions::Session;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

fn store_error(e: tower_sessions::session::Error) -> AppError {
    AppError::InternalError(anyhow::anyhow!("Session store error: {}", e))
}

/// Identity of the caller, passed explicitly to everything that talks to the
/// backend on the user's behalf.
#[derive(Debug, Clone)]
pub struct SessionContext {
    token: Secret<String>,
    user: Option<UserProfile>,
}

impl SessionContext {
    pub fn new(token: impl Into<String>, user: Option<UserProfile>) -> Self {
        Self {
            token: Secret::new(token.into()),
            user,
        }
    }

    pub fn token(&self) -> &str {
        self.token.expose_secret()
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn with_user(mut self, user: UserProfile) -> Self {
        self.user = Some(user);
        self
    }

    /// The signed-in user, or 401 when the identity was never resolved.
    pub fn require_user(&self) -> Result<&UserProfile, AppError> {
        self.user
            .as_ref()
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Not signed in")))
    }

    /// Read the token and cached user back out of the session, if any.
    pub async fn hydrate(session: &Session) -> Result<Option<Self>, AppError> {
        let token: Option<String> = session.get(TOKEN_KEY).await.map_err(store_error)?;
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(None);
        };
        let user: Option<UserProfile> = session.get(USER_KEY).await.map_err(store_error)?;
        Ok(Some(Self::new(token, user)))
    }

    /// Save this identity into the session, under a fresh session id.
    pub async fn persist(&self, session: &Session) -> Result<(), AppError> {
        session.cycle_id().await.map_err(store_error)?;
        session
            .insert(TOKEN_KEY, self.token.expose_secret())
            .await
            .map_err(store_error)?;
        if let Some(user) = &self.user {
            session.insert(USER_KEY, user).await.map_err(store_error)?;
        }
        session
            .insert(DraftStore::SESSION_KEY, DraftStore::new_key())
            .await
            .map_err(store_error)?;
        Ok(())
    }

    /// Forget everything stored for this browser. The login's draft becomes
    /// unreachable with its key.
    pub async fn teardown(session: &Session) -> Result<(), AppError> {
        session.flush().await.map_err(store_error)
    }
}

/// Handlers behind the role gate take the resolved identity as an extractor.
#[async_trait]
impl<S> FromRequestParts<S> for SessionContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionContext>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Not signed in")))
    }
}

/// Outcome of the session guard for one protected page.
#[derive(Debug)]
pub enum Access {
    Granted(SessionContext),
    /// No usable session: send the browser to the login page.
    Login,
    /// Signed in, but with a role this page does not admit.
    Unauthorized,
}

/// Decide access from an already resolved identity.
pub fn authorize(identity: Option<SessionContext>, allowed: &[Role]) -> Access {
    let Some(context) = identity else {
        return Access::Login;
    };
    match context.user() {
        None => Access::Login,
        Some(user) if allowed.is_empty() || allowed.contains(&user.role) => {
            Access::Granted(context)
        }
        Some(_) => Access::Unauthorized,
    }
}

/// Resolve the session's identity against the backend.
///
/// Any failure of `GET /me`, transport errors included, clears the session and
/// yields no identity.
pub async fn resolve_identity(
    backend: &BackendClient,
    session: &Session,
) -> Result<Option<SessionContext>, AppError> {
    let Some(context) = SessionContext::hydrate(session).await? else {
        return Ok(None);
    };

    match backend.me(&context).await {
        Ok(user) => {
            if context.user() != Some(&user) {
                session.insert(USER_KEY, &user).await.map_err(store_error)?;
            }
            Ok(Some(context.with_user(user)))
        }
        Err(e) => {
            tracing::info!(error = %e, "Session token rejected, clearing session");
            SessionContext::teardown(session).await?;
            Ok(None)
        }
    }
}
