// src/handlers/leads.rs

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use axum_extra::extract::WithRejection;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        error::AppError,
        time_window::{resolve_local, TimeWindow},
    },
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{RequireAdmin, RequireRole},
    },
    models::{
        import::{BulkIngestReport, BulkPreview},
        lead::{CreateLeadPayload, Lead, LeadPatch, LeadStatus, UpdateLeadPayload},
        sale::{ConversionOptions, ConvertLeadPayload, Sale},
    },
    services::lead_service::LeadFilter,
};

// =============================================================================
//  CONSULTAS
// =============================================================================

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LeadListQuery {
    /// Busca livre em nome, telefone, curso e cidade
    pub search: Option<String>,
    #[param(example = "follow-up")]
    pub status: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub window: Option<TimeWindow>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BulkTargetQuery {
    /// Agente que recebe os leads importados (só admin)
    pub target_csr: Option<Uuid>,
}

fn parse_status(raw: Option<&str>) -> Result<Option<LeadStatus>, AppError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .transpose()
}

// =============================================================================
//  ÁREA 1: CRUD
// =============================================================================

// POST /api/leads
#[utoipa::path(
    post,
    path = "/api/leads",
    tag = "Leads",
    request_body = CreateLeadPayload,
    responses(
        (status = 201, description = "Lead criado", body = Lead),
        (status = 400, description = "Dados inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_lead(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    WithRejection(Json(payload), _): WithRejection<Json<CreateLeadPayload>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let lead = app_state.lead_service.create_lead(&user.caller(), payload).await?;
    Ok((StatusCode::CREATED, Json(lead)))
}

// GET /api/leads
#[utoipa::path(
    get,
    path = "/api/leads",
    tag = "Leads",
    params(LeadListQuery),
    responses(
        (status = 200, description = "Leads visíveis para quem chama", body = Vec<Lead>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_leads(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    WithRejection(Query(query), _): WithRejection<Query<LeadListQuery>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let filter = LeadFilter {
        search: query.search,
        status: parse_status(query.status.as_deref())?,
        assigned_to: query.assigned_to,
        created: resolve_local(query.window, query.start, query.end)?,
    };

    let leads = app_state.lead_service.list_leads(&user.caller(), filter).await?;
    Ok((StatusCode::OK, Json(leads)))
}

// GET /api/leads/csr/{csr_id}
#[utoipa::path(
    get,
    path = "/api/leads/csr/{csr_id}",
    tag = "Leads",
    params(("csr_id" = Uuid, Path, description = "ID do agente")),
    responses(
        (status = 200, description = "Leads do agente", body = Vec<Lead>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_leads_by_csr(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    WithRejection(Path(csr_id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let filter = LeadFilter { assigned_to: Some(csr_id), ..Default::default() };
    let leads = app_state.lead_service.list_leads(&user.caller(), filter).await?;
    Ok((StatusCode::OK, Json(leads)))
}

// GET /api/leads/{id}
#[utoipa::path(
    get,
    path = "/api/leads/{id}",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses(
        (status = 200, description = "Lead", body = Lead),
        (status = 403, description = "Lead de outro agente"),
        (status = 404, description = "Lead não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_lead(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let lead = app_state.lead_service.get_lead(id, &user.caller()).await?;
    Ok((StatusCode::OK, Json(lead)))
}

// PATCH /api/leads/{id}
#[utoipa::path(
    patch,
    path = "/api/leads/{id}",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    request_body = UpdateLeadPayload,
    responses(
        (status = 200, description = "Lead atualizado", body = Lead),
        (status = 409, description = "Lead convertido não volta de status")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_lead(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(payload), _): WithRejection<Json<UpdateLeadPayload>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let patch = LeadPatch::try_from(payload)?;

    let lead = app_state.lead_service.update_lead(id, patch, &user.caller()).await?;
    Ok((StatusCode::OK, Json(lead)))
}

// DELETE /api/leads/{id}
#[utoipa::path(
    delete,
    path = "/api/leads/{id}",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses(
        (status = 204, description = "Lead removido")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_lead(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    app_state.lead_service.delete_lead(id, &user.caller()).await?;
    Ok(StatusCode::NO_CONTENT)
}

// DELETE /api/leads/admin/delete-all
#[utoipa::path(
    delete,
    path = "/api/leads/admin/delete-all",
    tag = "Leads",
    responses(
        (status = 200, description = "Todos os leads removidos"),
        (status = 403, description = "Somente admin")
    ),
    security(("api_jwt" = []))
)]
pub async fn purge_all(
    State(app_state): State<AppState>,
    RequireRole(caller, _): RequireAdmin,
) -> Result<impl IntoResponse, AppError> {
    let removed = app_state.lead_service.purge_all(&caller).await?;
    Ok((StatusCode::OK, Json(json!({ "deletedCount": removed }))))
}

// =============================================================================
//  ÁREA 2: CONVERSÃO
// =============================================================================

// POST /api/leads/{id}/convert
#[utoipa::path(
    post,
    path = "/api/leads/{id}/convert",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    request_body = ConvertLeadPayload,
    responses(
        (status = 201, description = "Venda registrada", body = Sale),
        (status = 400, description = "Valor inválido"),
        (status = 409, description = "Lead já convertido")
    ),
    security(("api_jwt" = []))
)]
pub async fn convert_lead(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(payload), _): WithRejection<Json<ConvertLeadPayload>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let opts = ConversionOptions {
        payment_method: payload.payment_method,
        remarks: payload.remarks,
    };

    let sale = app_state
        .conversion_service
        .convert(id, payload.amount, &user.caller(), opts)
        .await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

// =============================================================================
//  ÁREA 3: IMPORTAÇÃO EM MASSA (corpo = arquivo da planilha)
// =============================================================================

// POST /api/leads/bulk/upload-excel
#[utoipa::path(
    post,
    path = "/api/leads/bulk/upload-excel",
    tag = "Leads",
    params(BulkTargetQuery),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Resumo da importação", body = BulkIngestReport),
        (status = 400, description = "Arquivo inválido ou vazio")
    ),
    security(("api_jwt" = []))
)]
pub async fn bulk_upload(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    WithRejection(Query(query), _): WithRejection<Query<BulkTargetQuery>, AppError>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let report = app_state
        .import_service
        .ingest_bytes(&body, query.target_csr, &user.caller())
        .await?;
    Ok((StatusCode::OK, Json(report)))
}

// POST /api/leads/excel/parse
#[utoipa::path(
    post,
    path = "/api/leads/excel/parse",
    tag = "Leads",
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Linhas lidas da primeira aba")
    ),
    security(("api_jwt" = []))
)]
pub async fn parse_excel(
    State(app_state): State<AppState>,
    _admin: RequireAdmin,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let rows = app_state.import_service.parse(&body)?;
    Ok((StatusCode::OK, Json(rows)))
}

// POST /api/leads/excel/validate
#[utoipa::path(
    post,
    path = "/api/leads/excel/validate",
    tag = "Leads",
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Validação sem gravar", body = BulkPreview)
    ),
    security(("api_jwt" = []))
)]
pub async fn validate_excel(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let preview = app_state.import_service.preview(&body, &user.caller())?;
    Ok((StatusCode::OK, Json(preview)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        extract::{FromRequest, FromRequestParts},
        http::Request,
    };

    async fn error_body(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn malformed_create_body_is_a_validation_error() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/leads")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name":"Ali","phone":"03001234567"}"#))
            .unwrap();

        let err = WithRejection::<Json<CreateLeadPayload>, AppError>::from_request(request, &())
            .await
            .unwrap_err();

        let (status, body) = error_body(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "ValidationError");
        assert!(body["message"].as_str().unwrap().contains("course"));
    }

    #[tokio::test]
    async fn unknown_window_is_a_validation_error() {
        let (mut parts, _) = Request::builder()
            .uri("/api/leads?window=year")
            .body(Body::empty())
            .unwrap()
            .into_parts();

        let err = WithRejection::<Query<LeadListQuery>, AppError>::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();

        let (status, body) = error_body(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "ValidationError");
    }
}
