// src/services/import_service.rs

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{LeadStore, UserStore},
    models::{
        auth::Caller,
        import::{BulkIngestReport, BulkPreview, RawRow, RejectedRow},
        lead::{CreateLeadPayload, NewLead, SOURCE_EXCEL_UPLOAD},
    },
    services::{
        lead_service::prepare_new_lead,
        tabular::{TabularImport, WorkbookImporter},
    },
};

pub const DEFAULT_COURSE: &str = "General";

// A linha 1 da planilha é o cabeçalho
const FIRST_DATA_ROW: usize = 2;

/// Reconcilia linhas de planilha com a base de leads.
#[derive(Clone)]
pub struct ImportService {
    leads: Arc<dyn LeadStore>,
    users: Arc<dyn UserStore>,
    importer: Arc<dyn TabularImport>,
}

/// Linha que passou na validação, ainda com a origem para o relatório.
struct Candidate {
    row: usize,
    data: RawRow,
    lead: NewLead,
}

// "Phone (2)" -> "phone": cabeçalhos repetidos ganham sufixo na leitura
fn header_key(header: &str) -> String {
    let header = header.trim();
    let base = match header.rsplit_once(" (") {
        Some((base, n))
            if n.strip_suffix(')')
                .is_some_and(|d| !d.is_empty() && d.chars().all(|c| c.is_ascii_digit())) =>
        {
            base
        }
        _ => header,
    };
    base.trim().to_lowercase()
}

// Busca por cabeçalho sem diferenciar maiúsculas ("Name", "name", "NAME").
// Os apelidos valem em ordem e célula vazia não conta como valor.
fn field(row: &RawRow, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        row.iter()
            .filter(|(header, _)| header_key(header) == *name)
            .find_map(|(_, value)| value.as_text())
    })
}

fn row_to_input(row: &RawRow) -> Result<CreateLeadPayload, String> {
    let name = field(row, &["name", "full name"]).ok_or("O nome é obrigatório.")?;
    let phone = field(row, &["phone", "phone number", "mobile"]).ok_or("O telefone é obrigatório.")?;

    Ok(CreateLeadPayload {
        name,
        phone,
        course: field(row, &["course"]).unwrap_or_else(|| DEFAULT_COURSE.to_string()),
        city: field(row, &["city"]),
        source: Some(SOURCE_EXCEL_UPLOAD.to_string()),
        assigned_to: None,
        follow_up_date: None,
        remarks: field(row, &["remarks", "notes"]),
    })
}

fn reject(row: usize, data: RawRow, reason: impl Into<String>) -> RejectedRow {
    RejectedRow { row, data, reason: reason.into() }
}

impl ImportService {
    pub fn new(leads: Arc<dyn LeadStore>, users: Arc<dyn UserStore>) -> Self {
        Self::with_importer(leads, users, Arc::new(WorkbookImporter))
    }

    pub fn with_importer(
        leads: Arc<dyn LeadStore>,
        users: Arc<dyn UserStore>,
        importer: Arc<dyn TabularImport>,
    ) -> Self {
        Self { leads, users, importer }
    }

    fn read(&self, bytes: &[u8]) -> Result<Vec<RawRow>, AppError> {
        let rows = self.importer.read_rows(bytes)?;
        if rows.is_empty() {
            return Err(AppError::validation("A planilha não tem linhas de dados."));
        }
        Ok(rows)
    }

    /// Separa as linhas em candidatas e rejeitadas, sem tocar no banco.
    fn reconcile(rows: Vec<RawRow>, assigned_to: Uuid, created_by: Uuid) -> (Vec<Candidate>, Vec<RejectedRow>) {
        let mut candidates = Vec::new();
        let mut rejected = Vec::new();

        for (index, data) in rows.into_iter().enumerate() {
            let row = index + FIRST_DATA_ROW;
            let prepared = row_to_input(&data).and_then(|input| {
                prepare_new_lead(&input, assigned_to, created_by, SOURCE_EXCEL_UPLOAD)
                    .map_err(|e| e.to_string())
            });

            match prepared {
                Ok(lead) => candidates.push(Candidate { row, data, lead }),
                Err(reason) => rejected.push(reject(row, data, reason)),
            }
        }

        (candidates, rejected)
    }

    pub fn parse(&self, bytes: &[u8]) -> Result<Vec<RawRow>, AppError> {
        self.read(bytes)
    }

    pub fn preview(&self, bytes: &[u8], caller: &Caller) -> Result<BulkPreview, AppError> {
        let rows = self.read(bytes)?;
        let total_rows = rows.len();
        let (candidates, rejected_rows) = Self::reconcile(rows, caller.id, caller.id);

        Ok(BulkPreview {
            total_rows,
            valid_rows: candidates.len(),
            rejected_rows,
        })
    }

    pub async fn ingest_bytes(
        &self,
        bytes: &[u8],
        target_csr: Option<Uuid>,
        caller: &Caller,
    ) -> Result<BulkIngestReport, AppError> {
        let rows = self.read(bytes)?;
        self.ingest_rows(rows, target_csr, caller).await
    }

    pub async fn ingest_rows(
        &self,
        rows: Vec<RawRow>,
        target_csr: Option<Uuid>,
        caller: &Caller,
    ) -> Result<BulkIngestReport, AppError> {
        // 1. Dono dos leads importados
        let assigned_to = if caller.is_admin() {
            let target = target_csr.unwrap_or(caller.id);
            if self.users.find_by_id(target).await?.is_none() {
                return Err(AppError::validation("O agente de destino não existe."));
            }
            target
        } else {
            caller.id
        };

        // 2. Validação por linha
        let (candidates, rejected_rows) = Self::reconcile(rows, assigned_to, caller.id);
        let mut report = BulkIngestReport { rejected_rows, ..Default::default() };

        // 3. Duplicados: telefones já na base ou repetidos dentro do lote
        let phones: Vec<String> = candidates.iter().map(|c| c.lead.phone.clone()).collect();
        let mut seen = self.leads.find_existing_phones(&phones).await?;

        // 4. Inserção best-effort: uma falha não derruba o resto
        for candidate in candidates {
            if !seen.insert(candidate.lead.phone.clone()) {
                report.skipped_duplicate_count += 1;
                continue;
            }

            match self.leads.insert_lead(&candidate.lead).await {
                Ok(_) => report.inserted_count += 1,
                Err(e) => {
                    tracing::warn!("Importação: linha {} falhou: {}", candidate.row, e);
                    report.failed_count += 1;
                    report.rejected_rows.push(reject(
                        candidate.row,
                        candidate.data,
                        "Falha ao gravar o lead.",
                    ));
                }
            }
        }

        tracing::info!(
            "📥 Importação de {}: {} inseridos, {} duplicados, {} falhas, {} rejeitados",
            caller.id,
            report.inserted_count,
            report.skipped_duplicate_count,
            report.failed_count,
            report.rejected_rows.len() - report.failed_count
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::import::CellValue;
    use crate::services::lead_service::LeadFilter;
    use crate::services::test_support::Fixture;

    fn row(cells: &[(&str, &str)]) -> RawRow {
        cells
            .iter()
            .map(|(k, v)| (k.to_string(), CellValue::Text(v.to_string())))
            .collect()
    }

    #[tokio::test]
    async fn headers_match_case_insensitively_and_defaults_apply() {
        let fx = Fixture::new().await;
        let rows = vec![
            row(&[("Name", "Sara"), ("PHONE", "0300-1111111")]),
            row(&[("name", "Umar"), ("phone", "03002222222"), ("Course", "PTE"), ("City", "Karachi")]),
        ];

        let report = fx.import_service().ingest_rows(rows, Some(fx.csr1.id), &fx.admin).await.unwrap();
        assert_eq!(report.inserted_count, 2);
        assert!(report.rejected_rows.is_empty());

        let leads = fx.lead_service().list_leads(&fx.csr1, LeadFilter::default()).await.unwrap();
        let sara = leads.iter().find(|l| l.name == "Sara").unwrap();
        assert_eq!(sara.course, DEFAULT_COURSE);
        assert_eq!(sara.city, "Unknown");
        assert_eq!(sara.source, SOURCE_EXCEL_UPLOAD);
        assert_eq!(sara.phone, "03001111111");
        assert_eq!(sara.assigned_to, fx.csr1.id);
    }

    #[test]
    fn blank_header_match_falls_through_to_the_next_alias() {
        let data = row(&[("Name", "  "), ("Full Name", "Sara Khan"), ("Phone", ""), ("Mobile", "03001111111")]);
        assert_eq!(field(&data, &["name", "full name"]).as_deref(), Some("Sara Khan"));
        assert_eq!(field(&data, &["phone", "phone number", "mobile"]).as_deref(), Some("03001111111"));
    }

    #[test]
    fn repeated_header_columns_are_all_searched() {
        let data = row(&[("Phone", ""), ("Phone (2)", "0300-2222222"), ("Course (x)", "PTE")]);
        assert_eq!(field(&data, &["phone"]).as_deref(), Some("0300-2222222"));
        assert_eq!(field(&data, &["course"]), None);
    }

    #[tokio::test]
    async fn duplicates_of_stored_phone_are_skipped() {
        let fx = Fixture::new().await;
        fx.lead_for(&fx.csr1, "03001234567").await;

        let rows = vec![
            row(&[("name", "Ali Dois"), ("phone", "0300-1234567")]),
            row(&[("name", "Ali Três"), ("phone", " 03001234567 ")]),
        ];
        let report = fx.import_service().ingest_rows(rows, Some(fx.csr1.id), &fx.admin).await.unwrap();

        assert_eq!(report.skipped_duplicate_count, 2);
        assert_eq!(report.inserted_count, 0);
        assert_eq!(fx.store.lead_count().await, 1);
    }

    #[tokio::test]
    async fn repeated_phone_inside_batch_is_inserted_once() {
        let fx = Fixture::new().await;
        let rows = vec![
            row(&[("name", "Hina"), ("phone", "03005555555")]),
            row(&[("name", "Hina B"), ("phone", "0300 5555555")]),
        ];
        let report = fx.import_service().ingest_rows(rows, None, &fx.csr2).await.unwrap();

        assert_eq!(report.inserted_count, 1);
        assert_eq!(report.skipped_duplicate_count, 1);
    }

    #[tokio::test]
    async fn invalid_rows_are_reported_with_sheet_row_numbers() {
        let fx = Fixture::new().await;
        let rows = vec![
            row(&[("name", "Ok"), ("phone", "03001111111")]),
            row(&[("name", ""), ("phone", "03002222222")]),
            row(&[("name", "Curto"), ("phone", "12345")]),
        ];
        let report = fx.import_service().ingest_rows(rows, None, &fx.csr1).await.unwrap();

        assert_eq!(report.inserted_count, 1);
        let rejected: Vec<usize> = report.rejected_rows.iter().map(|r| r.row).collect();
        assert_eq!(rejected, vec![3, 4]);
    }

    #[tokio::test]
    async fn storage_failure_on_one_row_does_not_abort_the_batch() {
        let fx = Fixture::new().await;
        fx.store.fail_inserts_for_phone("03002222222");

        let rows = vec![
            row(&[("name", "Um"), ("phone", "03001111111")]),
            row(&[("name", "Dois"), ("phone", "03002222222")]),
            row(&[("name", "Tres"), ("phone", "03003333333")]),
        ];
        let report = fx.import_service().ingest_rows(rows, None, &fx.csr1).await.unwrap();

        assert_eq!(report.inserted_count, 2);
        assert_eq!(report.failed_count, 1);
        assert_eq!(report.rejected_rows.len(), 1);
        assert_eq!(report.rejected_rows[0].row, 3);
    }

    #[tokio::test]
    async fn csr_cannot_import_into_someone_else() {
        let fx = Fixture::new().await;
        let rows = vec![row(&[("name", "Zara"), ("phone", "03009999999")])];

        fx.import_service().ingest_rows(rows, Some(fx.csr2.id), &fx.csr1).await.unwrap();
        let leads = fx.lead_service().list_leads(&fx.admin, LeadFilter::default()).await.unwrap();
        assert_eq!(leads[0].assigned_to, fx.csr1.id);
    }

    #[tokio::test]
    async fn admin_target_must_exist() {
        let fx = Fixture::new().await;
        let rows = vec![row(&[("name", "Zara"), ("phone", "03009999999")])];

        let err = fx
            .import_service()
            .ingest_rows(rows, Some(Uuid::new_v4()), &fx.admin)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
    }

    struct FixedRows(Vec<RawRow>);

    impl TabularImport for FixedRows {
        fn read_rows(&self, _bytes: &[u8]) -> Result<Vec<RawRow>, AppError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn preview_validates_without_inserting() {
        let fx = Fixture::new().await;
        let importer = FixedRows(vec![
            row(&[("name", "Ok"), ("phone", "03001111111")]),
            row(&[("phone", "03002222222")]),
        ]);
        let service = ImportService::with_importer(fx.store.clone(), fx.store.clone(), Arc::new(importer));

        let preview = service.preview(b"qualquer", &fx.admin).unwrap();
        assert_eq!(preview.total_rows, 2);
        assert_eq!(preview.valid_rows, 1);
        assert_eq!(preview.rejected_rows[0].row, 3);
        assert_eq!(fx.store.lead_count().await, 0);
    }

    #[tokio::test]
    async fn empty_sheet_is_a_validation_error() {
        let fx = Fixture::new().await;
        let service = ImportService::with_importer(fx.store.clone(), fx.store.clone(), Arc::new(FixedRows(vec![])));

        let err = service.ingest_bytes(b"x", None, &fx.admin).await.unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
    }
}
