// src/models/sale.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::{error::AppError, time_window::DateRange};

pub const DEFAULT_PAYMENT_METHOD: &str = "Bank Transfer";

// Colunas de valor são NUMERIC(12,2)
const MONEY_SCALE: u32 = 2;
const MONEY_LIMIT: Decimal = Decimal::from_parts(1_410_065_408, 2, 0, false, 0); // 10^10

/// Valor monetário que cabe na coluna sem arredondar nem estourar.
pub fn check_money(amount: Decimal) -> Result<(), AppError> {
    if amount.round_dp(MONEY_SCALE) != amount {
        return Err(AppError::validation("O valor aceita no máximo 2 casas decimais."));
    }
    if amount.abs() >= MONEY_LIMIT {
        return Err(AppError::validation("O valor excede o máximo permitido."));
    }
    Ok(())
}

// Mapeia o CREATE TYPE sale_status do banco.
// Apenas metadado: nenhum status de venda reverte o lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "sale_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    #[default]
    Completed,
    Pending,
    Refunded,
    Cancelled,
}

// Registro do livro-razão de vendas. Curso e CSR são copiados do lead
// no momento da conversão, então a venda sobrevive à edição/remoção do lead.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub csr_id: Uuid,
    #[schema(example = "15000.00")]
    pub amount: Decimal,
    #[schema(example = "IELTS")]
    pub course: String,
    pub status: SaleStatus,
    #[schema(example = "Bank Transfer")]
    pub payment_method: String,
    pub remarks: Option<String>,
    pub verified_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConvertLeadPayload {
    #[schema(value_type = f64, example = 15000)]
    pub amount: Decimal,
    #[schema(example = "EasyPaisa")]
    pub payment_method: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConversionOptions {
    pub payment_method: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifySalePayload {
    pub status: Option<SaleStatus>,
}

/// Escrita dupla da conversão: cria a venda e leva o lead ao estado convertido.
/// CSR e curso da venda são copiados da linha do lead dentro da mesma unidade de trabalho.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub lead_id: Uuid,
    pub amount: Decimal,
    pub payment_method: String,
    pub remarks: Option<String>,
    pub converted_by: Uuid,
    pub converted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct SaleQuery {
    pub lead_id: Option<Uuid>,
    pub created: DateRange,
}

#[cfg(test)]
impl SaleQuery {
    pub fn matches(&self, sale: &Sale) -> bool {
        self.lead_id.is_none_or(|id| sale.lead_id == id) && self.created.contains(sale.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn money_limit_is_ten_billion() {
        assert_eq!(MONEY_LIMIT, Decimal::from(10_000_000_000_i64));
    }

    #[test]
    fn money_rejects_extra_decimals_and_overflow() {
        assert!(check_money(Decimal::from_str("100.55").unwrap()).is_ok());
        assert!(check_money(Decimal::from_str("100.500").unwrap()).is_ok());
        assert!(check_money(Decimal::from_str("9999999999.99").unwrap()).is_ok());

        for raw in ["0.001", "100.555", "10000000000"] {
            let err = check_money(Decimal::from_str(raw).unwrap()).unwrap_err();
            assert_eq!(err.kind(), "ValidationError", "valor {raw}");
        }
    }
}
