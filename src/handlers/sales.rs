// src/handlers/sales.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use axum_extra::extract::WithRejection;
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        time_window::{resolve_local, DateRange, TimeWindow},
    },
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{RequireAdmin, RequireRole},
    },
    models::sale::{Sale, VerifySalePayload},
};

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SaleListQuery {
    pub csr_id: Option<Uuid>,
    pub window: Option<TimeWindow>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DateRangeQuery {
    #[param(example = "2026-10-01")]
    pub start: NaiveDate,
    #[param(example = "2026-10-31")]
    pub end: NaiveDate,
}

// GET /api/sales
#[utoipa::path(
    get,
    path = "/api/sales",
    tag = "Sales",
    params(SaleListQuery),
    responses(
        (status = 200, description = "Vendas visíveis para quem chama", body = Vec<Sale>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_sales(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    WithRejection(Query(query), _): WithRejection<Query<SaleListQuery>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let created = resolve_local(query.window, query.start, query.end)?;
    let sales = app_state
        .sale_service
        .list_all_sales(&user.caller(), query.csr_id, created)
        .await?;
    Ok((StatusCode::OK, Json(sales)))
}

// GET /api/sales/by-date
#[utoipa::path(
    get,
    path = "/api/sales/by-date",
    tag = "Sales",
    params(DateRangeQuery),
    responses(
        (status = 200, description = "Vendas entre as datas (inclusive)", body = Vec<Sale>),
        (status = 400, description = "Intervalo inválido")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_sales_by_date(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    WithRejection(Query(query), _): WithRejection<Query<DateRangeQuery>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let range = DateRange::between_dates(&chrono::Local, query.start, query.end)?;
    let sales = app_state
        .sale_service
        .list_sales_by_date_range(range, &user.caller())
        .await?;
    Ok((StatusCode::OK, Json(sales)))
}

// GET /api/sales/csr/{csr_id}
#[utoipa::path(
    get,
    path = "/api/sales/csr/{csr_id}",
    tag = "Sales",
    params(("csr_id" = Uuid, Path, description = "ID do agente")),
    responses(
        (status = 200, description = "Vendas do agente", body = Vec<Sale>),
        (status = 403, description = "Vendas de outro agente")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_sales_by_csr(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    WithRejection(Path(csr_id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let sales = app_state.sale_service.list_sales_by_csr(csr_id, &user.caller()).await?;
    Ok((StatusCode::OK, Json(sales)))
}

// GET /api/sales/{id}
#[utoipa::path(
    get,
    path = "/api/sales/{id}",
    tag = "Sales",
    params(("id" = Uuid, Path, description = "ID da venda")),
    responses(
        (status = 200, description = "Venda", body = Sale),
        (status = 404, description = "Venda não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_sale(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let sale = app_state.sale_service.get_sale(id, &user.caller()).await?;
    Ok((StatusCode::OK, Json(sale)))
}

// PATCH /api/sales/{id}/verify
#[utoipa::path(
    patch,
    path = "/api/sales/{id}/verify",
    tag = "Sales",
    params(("id" = Uuid, Path, description = "ID da venda")),
    request_body = VerifySalePayload,
    responses(
        (status = 200, description = "Venda verificada", body = Sale),
        (status = 403, description = "Somente admin")
    ),
    security(("api_jwt" = []))
)]
pub async fn verify_sale(
    State(app_state): State<AppState>,
    RequireRole(caller, _): RequireAdmin,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(payload), _): WithRejection<Json<VerifySalePayload>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let sale = app_state.sale_service.verify_sale(id, payload.status, &caller).await?;
    Ok((StatusCode::OK, Json(sale)))
}
