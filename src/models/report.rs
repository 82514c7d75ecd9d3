// src/models/report.rs

use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::lead::LeadStatus;

// 1. Painel do CSR (os cards do topo)
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CsrStats {
    pub total_leads: i64,
    pub total_sales: i64,
    pub total_revenue: Decimal,
    // Percentual com 2 casas (0 quando não há leads)
    #[schema(example = "12.50")]
    pub conversion_rate: Decimal,
}

// 2. Painel do admin
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_leads: i64,
    pub total_sales: i64,
    pub total_revenue: Decimal,
    pub leads_by_status: Vec<StatusCount>,
    pub leads_by_csr: Vec<CsrLeadCount>,
    pub sales_by_csr: Vec<CsrSalesTotal>,
}

#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: LeadStatus,
    pub total: i64,
}

#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CsrLeadCount {
    pub csr_id: Uuid,
    pub total: i64,
}

#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CsrSalesTotal {
    pub csr_id: Uuid,
    pub total_sales: i64,
    pub revenue: Decimal,
}

// 3. Séries agrupadas por dia / semana / mês
#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BucketCount {
    #[schema(example = "2026-10")]
    pub bucket: String,
    pub total: i64,
}
