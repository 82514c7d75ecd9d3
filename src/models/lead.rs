// src/models/lead.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::common::{error::AppError, time_window::DateRange};

pub const DEFAULT_CITY: &str = "Unknown";
pub const SOURCE_MANUAL: &str = "manual";
pub const SOURCE_EXCEL_UPLOAD: &str = "excel-upload";

// --- ENUMS ---

/// Status do lead. `Converted` é o único estado terminal de sucesso;
/// "paid" e "sale" são aceitos na entrada e normalizados para ele.
// Mapeia o CREATE TYPE lead_status do banco
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "lead_status", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum LeadStatus {
    New,
    Contacted,
    Interested,
    Converted,
    Rejected,
    NotPickedUp,
    Busy,
    WrongNumber,
    FollowUp,
}

impl LeadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Interested => "interested",
            LeadStatus::Converted => "converted",
            LeadStatus::Rejected => "rejected",
            LeadStatus::NotPickedUp => "not-picked-up",
            LeadStatus::Busy => "busy",
            LeadStatus::WrongNumber => "wrong-number",
            LeadStatus::FollowUp => "follow-up",
        }
    }

    pub fn is_converted(self) -> bool {
        self == LeadStatus::Converted
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let key: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '_' { '-' } else { c })
            .collect();

        let status = match key.as_str() {
            "new" => LeadStatus::New,
            "contacted" => LeadStatus::Contacted,
            "interested" => LeadStatus::Interested,
            "converted" | "paid" | "sale" => LeadStatus::Converted,
            "rejected" => LeadStatus::Rejected,
            "not-picked-up" | "not-picked" => LeadStatus::NotPickedUp,
            "busy" => LeadStatus::Busy,
            "wrong-number" => LeadStatus::WrongNumber,
            "follow-up" | "followup" => LeadStatus::FollowUp,
            _ => {
                return Err(AppError::validation(format!(
                    "Status de lead desconhecido: '{}'.",
                    raw.trim()
                )))
            }
        };

        Ok(status)
    }
}

impl<'de> Deserialize<'de> for LeadStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// --- LEAD (O Dado) ---

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,

    #[schema(example = "Ali Raza")]
    pub name: String,
    // Sempre normalizado: só dígitos e um '+' inicial opcional
    #[schema(example = "03001234567")]
    pub phone: String,
    #[schema(example = "IELTS")]
    pub course: String,
    #[schema(example = "Lahore")]
    pub city: String,
    #[schema(example = "manual")]
    pub source: String,

    pub status: LeadStatus,

    // Dono do lead (sempre um CSR)
    pub assigned_to: Uuid,
    pub created_by: Uuid,
    pub last_updated_by: Option<Uuid>,

    #[schema(example = "15000.00")]
    pub sale_amount: Decimal,
    pub follow_up_date: Option<DateTime<Utc>>,
    pub remarks: Option<String>,
    // Preenchido se e somente se status = converted
    pub converted_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- ENTRADAS ---

// Payload de criação (também usado pela importação em massa)
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadPayload {
    #[validate(length(min = 2, message = "O nome deve ter no mínimo 2 caracteres."))]
    #[schema(example = "Ali Raza")]
    pub name: String,

    #[validate(length(min = 10, message = "O telefone deve ter no mínimo 10 dígitos."))]
    #[schema(example = "0300-1234567")]
    pub phone: String,

    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "IELTS")]
    pub course: String,

    pub city: Option<String>,
    pub source: Option<String>,

    // Obrigatório para admin; ignorado para CSR
    pub assigned_to: Option<Uuid>,

    pub follow_up_date: Option<DateTime<Utc>>,
    pub remarks: Option<String>,
}

// Payload de atualização parcial. O status chega como texto e é normalizado no handler.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeadPayload {
    #[validate(length(min = 2, message = "O nome deve ter no mínimo 2 caracteres."))]
    pub name: Option<String>,
    pub phone: Option<String>,
    #[validate(length(min = 1, message = "O curso não pode ficar vazio."))]
    pub course: Option<String>,
    pub city: Option<String>,
    pub source: Option<String>,

    #[schema(example = "contacted")]
    pub status: Option<String>,

    pub assigned_to: Option<Uuid>,
    pub sale_amount: Option<Decimal>,
    pub follow_up_date: Option<DateTime<Utc>>,
    pub remarks: Option<String>,
}

/// Atualização já com o status normalizado.
#[derive(Debug, Clone, Default)]
pub struct LeadPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub course: Option<String>,
    pub city: Option<String>,
    pub source: Option<String>,
    pub status: Option<LeadStatus>,
    pub assigned_to: Option<Uuid>,
    pub sale_amount: Option<Decimal>,
    pub follow_up_date: Option<DateTime<Utc>>,
    pub remarks: Option<String>,
}

impl TryFrom<UpdateLeadPayload> for LeadPatch {
    type Error = AppError;

    fn try_from(payload: UpdateLeadPayload) -> Result<Self, Self::Error> {
        let status = payload
            .status
            .as_deref()
            .map(LeadStatus::from_str)
            .transpose()?;

        Ok(Self {
            name: payload.name,
            phone: payload.phone,
            course: payload.course,
            city: payload.city,
            source: payload.source,
            status,
            assigned_to: payload.assigned_to,
            sale_amount: payload.sale_amount,
            follow_up_date: payload.follow_up_date,
            remarks: payload.remarks,
        })
    }
}

// --- ESCRITA NO BANCO ---

/// Lead validado, pronto para INSERT (status inicial = new).
#[derive(Debug, Clone)]
pub struct NewLead {
    pub name: String,
    pub phone: String,
    pub course: String,
    pub city: String,
    pub source: String,
    pub assigned_to: Uuid,
    pub created_by: Uuid,
    pub follow_up_date: Option<DateTime<Utc>>,
    pub remarks: Option<String>,
}

/// Campos a alterar; `None` mantém o valor atual.
#[derive(Debug, Clone, Default)]
pub struct LeadChanges {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub course: Option<String>,
    pub city: Option<String>,
    pub source: Option<String>,
    pub status: Option<LeadStatus>,
    pub assigned_to: Option<Uuid>,
    pub sale_amount: Option<Decimal>,
    pub follow_up_date: Option<DateTime<Utc>>,
    pub remarks: Option<String>,
    // Só é gravado se o lead ainda não tiver `converted_at`
    pub converted_at: Option<DateTime<Utc>>,
}

// --- CONSULTA ---

#[derive(Debug, Clone, Default)]
pub struct LeadQuery {
    pub search: Option<String>,
    pub status: Option<LeadStatus>,
    pub created: DateRange,
}

// Filtro em memória, equivalente ao WHERE montado pelo LeadRepository
#[cfg(test)]
impl LeadQuery {
    pub fn matches(&self, lead: &Lead) -> bool {
        if let Some(status) = self.status {
            if lead.status != status {
                return false;
            }
        }

        if !self.created.contains(lead.created_at) {
            return false;
        }

        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                [&lead.name, &lead.phone, &lead.course, &lead.city]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&term))
            }
            _ => true,
        }
    }
}
