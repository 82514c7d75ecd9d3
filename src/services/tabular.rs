// src/services/tabular.rs

//! Leitura de planilhas enviadas para importação em massa.

use std::collections::HashMap;
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};

use crate::{
    common::error::AppError,
    models::import::{CellValue, RawRow},
};

/// Converte um arquivo binário em linhas `cabeçalho -> valor`.
/// O núcleo de importação nunca lê bytes diretamente.
pub trait TabularImport: Send + Sync {
    fn read_rows(&self, bytes: &[u8]) -> Result<Vec<RawRow>, AppError>;
}

/// xlsx / xls / xlsb / ods. Lê só a primeira aba; a primeira linha é o cabeçalho.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkbookImporter;

impl TabularImport for WorkbookImporter {
    fn read_rows(&self, bytes: &[u8]) -> Result<Vec<RawRow>, AppError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| AppError::Parse(format!("Arquivo não é uma planilha válida: {}", e)))?;

        let range = match workbook.worksheet_range_at(0) {
            Some(Ok(range)) => range,
            Some(Err(e)) => {
                return Err(AppError::Parse(format!("Falha ao ler a primeira aba: {}", e)));
            }
            None => return Ok(Vec::new()),
        };

        Ok(rows_from_range(&range))
    }
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(dt) => CellValue::Text(dt.to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

/// Primeira linha = cabeçalhos. Colunas sem cabeçalho e linhas totalmente vazias são ignoradas.
pub fn rows_from_range(range: &Range<Data>) -> Vec<RawRow> {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Vec::new();
    };

    // Cabeçalho repetido não pode sobrescrever a coluna anterior: "Phone", "Phone (2)"
    let mut seen: HashMap<String, usize> = HashMap::new();
    let headers: Vec<Option<String>> = header
        .iter()
        .map(|cell| {
            cell_value(cell).as_text().map(|name| {
                let count = seen.entry(name.to_lowercase()).or_insert(0);
                *count += 1;
                if *count == 1 { name } else { format!("{} ({})", name, count) }
            })
        })
        .collect();

    rows.filter_map(|cells| {
        let row: RawRow = headers
            .iter()
            .zip(cells.iter())
            .filter_map(|(name, cell)| name.clone().map(|name| (name, cell_value(cell))))
            .collect();

        let has_data = row.values().any(|v| v.as_text().is_some());
        has_data.then_some(row)
    })
    .collect()
}
