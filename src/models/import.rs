// src/models/import.rs

use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

/// Valor de uma célula da planilha.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Empty,
}

impl CellValue {
    /// Texto aparado; `None` para células vazias.
    pub fn as_text(&self) -> Option<String> {
        let text = match self {
            CellValue::Text(s) => s.trim().to_string(),
            // Telefones costumam vir como número (3001234567.0)
            CellValue::Number(n) if n.fract() == 0.0 && n.is_finite() => format!("{:.0}", n),
            CellValue::Number(n) => n.to_string(),
            CellValue::Empty => return None,
        };

        if text.is_empty() { None } else { Some(text) }
    }
}

/// Uma linha da planilha: cabeçalho -> valor.
pub type RawRow = BTreeMap<String, CellValue>;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RejectedRow {
    // Número da linha na planilha (a linha 1 é o cabeçalho)
    #[schema(example = 2)]
    pub row: usize,
    #[schema(value_type = Object)]
    pub data: RawRow,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkIngestReport {
    pub inserted_count: usize,
    pub skipped_duplicate_count: usize,
    pub failed_count: usize,
    pub rejected_rows: Vec<RejectedRow>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkPreview {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub rejected_rows: Vec<RejectedRow>,
}
