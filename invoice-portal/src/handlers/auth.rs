use crate::models::user::{Role, SignupRequest, UserProfile};
use crate::services::session::SessionContext;
use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use tower_sessions::Session;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginForm {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignupForm {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct LoginReply {
    pub redirect: &'static str,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct Redirecting {
    pub redirect: &'static str,
}

pub async fn login_handler(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<LoginForm>,
) -> Result<Json<LoginReply>, AppError> {
    form.validate()?;

    let login = state.backend.login(&form.email, &form.password).await?;
    let context = SessionContext::new(login.token, Some(login.user.clone()));
    context.persist(&session).await?;

    tracing::info!(email = %login.user.email, role = %login.user.role, "User logged in");

    Ok(Json(LoginReply {
        redirect: login.user.role.landing_path(),
        user: login.user,
    }))
}

pub async fn signup_handler(
    State(state): State<AppState>,
    Json(form): Json<SignupForm>,
) -> Result<impl IntoResponse, AppError> {
    form.validate()?;
    if form.role == Role::Other {
        return Err(AppError::invalid("Role must be vendor, finance or admin"));
    }

    state
        .backend
        .signup(&SignupRequest {
            email: form.email.clone(),
            password: form.password,
            role: form.role,
        })
        .await?;

    tracing::info!(email = %form.email, role = %form.role, "Account created");
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "message": "Account created", "redirect": "/login" })),
    ))
}

pub async fn logout_handler(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Redirecting>, AppError> {
    state.drafts.discard(&session).await?;
    SessionContext::teardown(&session).await?;
    Ok(Json(Redirecting { redirect: "/login" }))
}
