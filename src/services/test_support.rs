// src/services/test_support.rs

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::{
    db::memory_repo::MemoryStore,
    models::{
        auth::{Caller, Role},
        lead::{CreateLeadPayload, Lead},
        sale::{ConversionOptions, Sale},
    },
    services::{
        AuthService, ConversionService, ImportService, LeadService, ReportService, SaleService,
    },
};

pub const TEST_JWT_SECRET: &str = "segredo-de-teste";

/// Um admin e dois CSRs sobre o mesmo store em memória.
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub admin: Caller,
    pub csr1: Caller,
    pub csr2: Caller,
}

impl Fixture {
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let admin = store.seed_user("Admin", Role::Admin).await.caller();
        let csr1 = store.seed_user("Ayesha", Role::Csr).await.caller();
        let csr2 = store.seed_user("Bilal", Role::Csr).await.caller();
        Self { store, admin, csr1, csr2 }
    }

    pub fn lead_service(&self) -> LeadService {
        LeadService::new(self.store.clone(), self.store.clone())
    }

    pub fn conversion_service(&self) -> ConversionService {
        ConversionService::new(self.store.clone(), self.store.clone())
    }

    pub fn sale_service(&self) -> SaleService {
        SaleService::new(self.store.clone())
    }

    pub fn import_service(&self) -> ImportService {
        ImportService::new(self.store.clone(), self.store.clone())
    }

    pub fn report_service(&self) -> ReportService {
        ReportService::new(self.store.clone(), self.store.clone())
    }

    pub fn auth_service(&self) -> AuthService {
        AuthService::new(self.store.clone(), TEST_JWT_SECRET.to_string(), 24, 4)
    }

    pub async fn lead_for(&self, owner: &Caller, phone: &str) -> Lead {
        let input = CreateLeadPayload {
            name: "Ali".into(),
            phone: phone.into(),
            course: "IELTS".into(),
            assigned_to: Some(owner.id),
            ..Default::default()
        };
        self.lead_service()
            .create_lead(&self.admin, input)
            .await
            .expect("lead de teste")
    }

    pub async fn sale_for(&self, owner: &Caller, phone: &str, amount: i64) -> Sale {
        let lead = self.lead_for(owner, phone).await;
        self.conversion_service()
            .convert(lead.id, Decimal::from(amount), owner, ConversionOptions::default())
            .await
            .expect("venda de teste")
    }
}
