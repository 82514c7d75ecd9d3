// src/handlers/auth.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{RequireAdmin, RequireRole},
    },
    models::auth::{
        AuthResponse, FirstAdminPayload, LoginUserPayload, RegisterUserPayload,
        UpdateProfilePayload, UpdateStatusPayload, User,
    },
};

// =============================================================================
//  ROTAS PÚBLICAS
// =============================================================================

// POST /api/auth/first-admin-signup
#[utoipa::path(
    post,
    path = "/api/auth/first-admin-signup",
    tag = "Auth",
    request_body = FirstAdminPayload,
    responses(
        (status = 201, description = "Primeiro admin criado", body = AuthResponse),
        (status = 409, description = "Já existe um administrador")
    )
)]
pub async fn first_admin_signup(
    State(app_state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<FirstAdminPayload>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let response = app_state
        .auth_service
        .first_admin_signup(&payload.name, &payload.email, &payload.password)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

// POST /api/auth/login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginUserPayload,
    responses(
        (status = 200, description = "Login bem-sucedido", body = AuthResponse),
        (status = 401, description = "Credenciais inválidas")
    )
)]
pub async fn login(
    State(app_state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<LoginUserPayload>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let response = app_state.auth_service.login(&payload.email, &payload.password).await?;
    Ok((StatusCode::OK, Json(response)))
}

// =============================================================================
//  USUÁRIOS (protegidas)
// =============================================================================

// GET /api/users/me
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "Users",
    responses(
        (status = 200, description = "Dados do usuário logado", body = User),
        (status = 401, description = "Não autenticado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_me(AuthenticatedUser(user): AuthenticatedUser) -> Json<User> {
    Json(user)
}

// PATCH /api/users/me
#[utoipa::path(
    patch,
    path = "/api/users/me",
    tag = "Users",
    request_body = UpdateProfilePayload,
    responses(
        (status = 200, description = "Perfil atualizado", body = User),
        (status = 409, description = "E-mail em uso")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_me(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    WithRejection(Json(payload), _): WithRejection<Json<UpdateProfilePayload>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let updated = app_state
        .auth_service
        .update_profile(&user.caller(), payload.name, payload.email, payload.password)
        .await?;
    Ok((StatusCode::OK, Json(updated)))
}

// POST /api/users/register
#[utoipa::path(
    post,
    path = "/api/users/register",
    tag = "Users",
    request_body = RegisterUserPayload,
    responses(
        (status = 201, description = "Usuário cadastrado", body = User),
        (status = 403, description = "Somente admin"),
        (status = 409, description = "E-mail em uso")
    ),
    security(("api_jwt" = []))
)]
pub async fn register(
    State(app_state): State<AppState>,
    RequireRole(caller, _): RequireAdmin,
    WithRejection(Json(payload), _): WithRejection<Json<RegisterUserPayload>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = app_state
        .auth_service
        .register(&payload.name, &payload.email, &payload.password, payload.role, &caller)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

// GET /api/users/team-members
#[utoipa::path(
    get,
    path = "/api/users/team-members",
    tag = "Users",
    responses(
        (status = 200, description = "Agentes (CSR)", body = Vec<User>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_team_members(
    State(app_state): State<AppState>,
    RequireRole(caller, _): RequireAdmin,
) -> Result<impl IntoResponse, AppError> {
    let team = app_state.auth_service.list_team_members(&caller).await?;
    Ok((StatusCode::OK, Json(team)))
}

// PATCH /api/users/{id}/status
#[utoipa::path(
    patch,
    path = "/api/users/{id}/status",
    tag = "Users",
    params(("id" = Uuid, Path, description = "ID do usuário")),
    request_body = UpdateStatusPayload,
    responses(
        (status = 200, description = "Status alterado", body = User),
        (status = 404, description = "Usuário não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_user_status(
    State(app_state): State<AppState>,
    RequireRole(caller, _): RequireAdmin,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(payload), _): WithRejection<Json<UpdateStatusPayload>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let user = app_state
        .auth_service
        .update_user_status(id, payload.status, &caller)
        .await?;
    Ok((StatusCode::OK, Json(user)))
}
