// src/handlers/reports.rs

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    common::{error::AppError, time_window::ReportBucket},
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{RequireAdmin, RequireRole},
    },
    models::report::{AdminStats, BucketCount, CsrStats},
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BucketQuery {
    /// day | week | month (padrão: month)
    #[serde(rename = "type", default)]
    pub bucket: ReportBucket,
}

// GET /api/dashboard/csr-stats
#[utoipa::path(
    get,
    path = "/api/dashboard/csr-stats",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Indicadores do agente", body = CsrStats)
    ),
    security(("api_jwt" = []))
)]
pub async fn csr_stats(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let stats = app_state.report_service.csr_stats(&user.caller()).await?;
    Ok((StatusCode::OK, Json(stats)))
}

// GET /api/dashboard/admin-stats
#[utoipa::path(
    get,
    path = "/api/dashboard/admin-stats",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Indicadores gerais", body = AdminStats),
        (status = 403, description = "Somente admin")
    ),
    security(("api_jwt" = []))
)]
pub async fn admin_stats(
    State(app_state): State<AppState>,
    RequireRole(caller, _): RequireAdmin,
) -> Result<impl IntoResponse, AppError> {
    let stats = app_state.report_service.admin_stats(&caller).await?;
    Ok((StatusCode::OK, Json(stats)))
}

// GET /api/reports/leads
#[utoipa::path(
    get,
    path = "/api/reports/leads",
    tag = "Reports",
    params(BucketQuery),
    responses(
        (status = 200, description = "Leads por período", body = Vec<BucketCount>)
    ),
    security(("api_jwt" = []))
)]
pub async fn leads_grouped(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    WithRejection(Query(query), _): WithRejection<Query<BucketQuery>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let buckets = app_state.report_service.leads_grouped(query.bucket, &user.caller()).await?;
    Ok((StatusCode::OK, Json(buckets)))
}

// GET /api/reports/sales
#[utoipa::path(
    get,
    path = "/api/reports/sales",
    tag = "Reports",
    params(BucketQuery),
    responses(
        (status = 200, description = "Vendas por período", body = Vec<BucketCount>)
    ),
    security(("api_jwt" = []))
)]
pub async fn sales_grouped(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    WithRejection(Query(query), _): WithRejection<Query<BucketQuery>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let buckets = app_state.report_service.sales_grouped(query.bucket, &user.caller()).await?;
    Ok((StatusCode::OK, Json(buckets)))
}
