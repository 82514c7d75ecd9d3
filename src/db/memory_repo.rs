// src/db/memory_repo.rs

//! Implementação em memória dos stores, usada nos testes dos serviços.
//! Cada operação roda inteira sob o mesmo lock, então a conversão é atômica
//! como a transação do Postgres.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{LeadStore, SaleStore, UserStore},
    models::{
        auth::{NewUser, Role, User, UserChanges, UserStatus},
        lead::{Lead, LeadChanges, LeadQuery, LeadStatus, NewLead},
        sale::{Conversion, Sale, SaleQuery, SaleStatus},
    },
    services::access::Scope,
};

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    leads: HashMap<Uuid, Lead>,
    sales: HashMap<Uuid, Sale>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    fail_sale_writes: AtomicBool,
    failing_phones: Mutex<HashSet<String>>,
}

fn injected_fault() -> AppError {
    AppError::DatabaseError(sqlx::Error::Protocol("falha simulada de armazenamento".into()))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Faz o INSERT da venda falhar (a conversão inteira deve ser desfeita).
    pub fn fail_sale_writes(&self, fail: bool) {
        self.fail_sale_writes.store(fail, Ordering::SeqCst);
    }

    /// Faz o INSERT de leads com este telefone falhar no "banco".
    pub fn fail_inserts_for_phone(&self, phone: &str) {
        if let Ok(mut phones) = self.failing_phones.lock() {
            phones.insert(phone.to_string());
        }
    }

    pub async fn seed_user(&self, name: &str, role: Role) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@leadflow.test", name.to_lowercase().replace(' ', ".")),
            password_hash: String::new(),
            role,
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.state.write().await.users.insert(user.id, user.clone());
        user
    }

    /// Reescreve `created_at` (testes de janelas de tempo e relatórios).
    pub async fn backdate_lead(&self, id: Uuid, at: DateTime<Utc>) {
        if let Some(lead) = self.state.write().await.leads.get_mut(&id) {
            lead.created_at = at;
        }
    }

    pub async fn backdate_sale(&self, id: Uuid, at: DateTime<Utc>) {
        if let Some(sale) = self.state.write().await.sales.get_mut(&id) {
            sale.created_at = at;
        }
    }

    pub async fn sales_for_lead(&self, lead_id: Uuid) -> Vec<Sale> {
        self.state
            .read()
            .await
            .sales
            .values()
            .filter(|s| s.lead_id == lead_id)
            .cloned()
            .collect()
    }

    pub async fn lead_count(&self) -> usize {
        self.state.read().await.leads.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn create_user(&self, new_user: &NewUser) -> Result<User, AppError> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email == new_user.email) {
            return Err(AppError::EmailAlreadyExists);
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name.clone(),
            email: new_user.email.clone(),
            password_hash: new_user.password_hash.clone(),
            role: new_user.role,
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn admin_exists(&self) -> Result<bool, AppError> {
        let state = self.state.read().await;
        Ok(state.users.values().any(|u| u.role == Role::Admin))
    }

    async fn create_first_admin(&self, new_user: &NewUser) -> Result<Option<User>, AppError> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.role == Role::Admin) {
            return Ok(None);
        }
        if state.users.values().any(|u| u.email == new_user.email) {
            return Err(AppError::EmailAlreadyExists);
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name.clone(),
            email: new_user.email.clone(),
            password_hash: new_user.password_hash.clone(),
            role: Role::Admin,
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(Some(user))
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<User>, AppError> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state.users.values().filter(|u| u.role == role).cloned().collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn update_user(&self, id: Uuid, changes: &UserChanges) -> Result<Option<User>, AppError> {
        let mut state = self.state.write().await;

        if let Some(email) = &changes.email {
            if state.users.values().any(|u| u.id != id && &u.email == email) {
                return Err(AppError::EmailAlreadyExists);
            }
        }

        let Some(user) = state.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = &changes.name {
            user.name = name.clone();
        }
        if let Some(email) = &changes.email {
            user.email = email.clone();
        }
        if let Some(hash) = &changes.password_hash {
            user.password_hash = hash.clone();
        }
        if let Some(status) = changes.status {
            user.status = status;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }
}

#[async_trait]
impl LeadStore for MemoryStore {
    async fn insert_lead(&self, new_lead: &NewLead) -> Result<Lead, AppError> {
        let fails = self
            .failing_phones
            .lock()
            .map(|phones| phones.contains(&new_lead.phone))
            .unwrap_or(false);
        if fails {
            return Err(injected_fault());
        }

        let now = Utc::now();
        let lead = Lead {
            id: Uuid::new_v4(),
            name: new_lead.name.clone(),
            phone: new_lead.phone.clone(),
            course: new_lead.course.clone(),
            city: new_lead.city.clone(),
            source: new_lead.source.clone(),
            status: LeadStatus::New,
            assigned_to: new_lead.assigned_to,
            created_by: new_lead.created_by,
            last_updated_by: None,
            sale_amount: Decimal::ZERO,
            follow_up_date: new_lead.follow_up_date,
            remarks: new_lead.remarks.clone(),
            converted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.state.write().await.leads.insert(lead.id, lead.clone());
        Ok(lead)
    }

    async fn find_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        Ok(self.state.read().await.leads.get(&id).cloned())
    }

    async fn list_leads(&self, scope: &Scope, query: &LeadQuery) -> Result<Vec<Lead>, AppError> {
        let state = self.state.read().await;
        let mut leads: Vec<Lead> = state
            .leads
            .values()
            .filter(|l| scope.permits(l.assigned_to) && query.matches(l))
            .cloned()
            .collect();
        leads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(leads)
    }

    async fn update_lead(
        &self,
        id: Uuid,
        scope: &Scope,
        changes: &LeadChanges,
        updated_by: Uuid,
    ) -> Result<Option<Lead>, AppError> {
        let mut state = self.state.write().await;
        let Some(lead) = state.leads.get_mut(&id) else {
            return Ok(None);
        };

        if !scope.permits(lead.assigned_to) {
            return Ok(None);
        }
        if let Some(status) = changes.status {
            if lead.status.is_converted() && !status.is_converted() {
                return Ok(None);
            }
        }

        if let Some(v) = &changes.name { lead.name = v.clone(); }
        if let Some(v) = &changes.phone { lead.phone = v.clone(); }
        if let Some(v) = &changes.course { lead.course = v.clone(); }
        if let Some(v) = &changes.city { lead.city = v.clone(); }
        if let Some(v) = &changes.source { lead.source = v.clone(); }
        if let Some(v) = changes.assigned_to { lead.assigned_to = v; }
        if let Some(v) = changes.sale_amount { lead.sale_amount = v; }
        if let Some(v) = changes.follow_up_date { lead.follow_up_date = Some(v); }
        if let Some(v) = &changes.remarks { lead.remarks = Some(v.clone()); }
        if let Some(status) = changes.status {
            lead.status = status;
            if status.is_converted() && lead.converted_at.is_none() {
                lead.converted_at = changes.converted_at;
            }
        }
        lead.last_updated_by = Some(updated_by);
        lead.updated_at = Utc::now();

        Ok(Some(lead.clone()))
    }

    async fn delete_lead(&self, id: Uuid, scope: &Scope) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        let owned = state.leads.get(&id).is_some_and(|l| scope.permits(l.assigned_to));
        if owned {
            state.leads.remove(&id);
        }
        Ok(owned)
    }

    async fn delete_all_leads(&self) -> Result<u64, AppError> {
        let mut state = self.state.write().await;
        let removed = state.leads.len() as u64;
        state.leads.clear();
        Ok(removed)
    }

    async fn find_existing_phones(&self, phones: &[String]) -> Result<HashSet<String>, AppError> {
        let wanted: HashSet<&String> = phones.iter().collect();
        let state = self.state.read().await;
        Ok(state
            .leads
            .values()
            .filter(|l| wanted.contains(&l.phone))
            .map(|l| l.phone.clone())
            .collect())
    }
}

#[async_trait]
impl SaleStore for MemoryStore {
    async fn record_conversion(&self, scope: &Scope, conversion: &Conversion) -> Result<Sale, AppError> {
        let mut state = self.state.write().await;

        let (csr_id, course) = match state.leads.get(&conversion.lead_id) {
            None => return Err(AppError::not_found("Lead não encontrado.")),
            Some(lead) if lead.status.is_converted() => {
                return Err(AppError::conflict("Lead já convertido em venda."));
            }
            Some(lead) if !scope.permits(lead.assigned_to) => {
                return Err(AppError::access_denied(
                    "Acesso negado: este registro pertence a outro agente.",
                ));
            }
            Some(lead) => (lead.assigned_to, lead.course.clone()),
        };

        // Passo 1: UPDATE do lead (guarda a linha anterior para o rollback)
        let Some(lead) = state.leads.get_mut(&conversion.lead_id) else {
            return Err(AppError::not_found("Lead não encontrado."));
        };
        let before = lead.clone();
        lead.status = LeadStatus::Converted;
        lead.sale_amount = conversion.amount;
        lead.converted_at = Some(conversion.converted_at);
        lead.last_updated_by = Some(conversion.converted_by);
        lead.updated_at = conversion.converted_at;

        // Passo 2: INSERT da venda; qualquer falha desfaz o passo 1
        let inserted = if self.fail_sale_writes.load(Ordering::SeqCst) {
            Err(injected_fault())
        } else if state.sales.values().any(|s| s.lead_id == conversion.lead_id) {
            Err(AppError::conflict("Lead já convertido em venda."))
        } else {
            Ok(Sale {
                id: Uuid::new_v4(),
                lead_id: conversion.lead_id,
                csr_id,
                amount: conversion.amount,
                course,
                status: SaleStatus::Completed,
                payment_method: conversion.payment_method.clone(),
                remarks: conversion.remarks.clone(),
                verified_by: None,
                created_at: conversion.converted_at,
                updated_at: conversion.converted_at,
            })
        };

        let sale = match inserted {
            Ok(sale) => sale,
            Err(e) => {
                state.leads.insert(before.id, before);
                return Err(e);
            }
        };
        state.sales.insert(sale.id, sale.clone());

        Ok(sale)
    }

    async fn find_sale(&self, id: Uuid) -> Result<Option<Sale>, AppError> {
        Ok(self.state.read().await.sales.get(&id).cloned())
    }

    async fn list_sales(&self, scope: &Scope, query: &SaleQuery) -> Result<Vec<Sale>, AppError> {
        let state = self.state.read().await;
        let mut sales: Vec<Sale> = state
            .sales
            .values()
            .filter(|s| scope.permits(s.csr_id) && query.matches(s))
            .cloned()
            .collect();
        sales.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sales)
    }

    async fn verify_sale(
        &self,
        id: Uuid,
        verified_by: Uuid,
        status: Option<SaleStatus>,
    ) -> Result<Option<Sale>, AppError> {
        let mut state = self.state.write().await;
        let Some(sale) = state.sales.get_mut(&id) else {
            return Ok(None);
        };
        sale.verified_by = Some(verified_by);
        if let Some(status) = status {
            sale.status = status;
        }
        sale.updated_at = Utc::now();
        Ok(Some(sale.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with_lead() -> (MemoryStore, User, Lead) {
        let store = MemoryStore::new();
        let csr = store.seed_user("Bilal", Role::Csr).await;
        let lead = store
            .insert_lead(&NewLead {
                name: "Ali".into(),
                phone: "03001234567".into(),
                course: "IELTS".into(),
                city: "Lahore".into(),
                source: "Manual".into(),
                assigned_to: csr.id,
                created_by: csr.id,
                follow_up_date: None,
                remarks: None,
            })
            .await
            .unwrap();
        (store, csr, lead)
    }

    fn conversion(lead_id: Uuid, by: Uuid) -> Conversion {
        Conversion {
            lead_id,
            amount: Decimal::from(500),
            payment_method: "Cash".into(),
            remarks: None,
            converted_by: by,
            converted_at: Utc::now(),
        }
    }

    fn assert_same_lead(a: &Lead, b: &Lead) {
        assert_eq!(a.status, b.status);
        assert_eq!(a.sale_amount, b.sale_amount);
        assert_eq!(a.converted_at, b.converted_at);
        assert_eq!(a.last_updated_by, b.last_updated_by);
        assert_eq!(a.updated_at, b.updated_at);
    }

    #[tokio::test]
    async fn failed_sale_insert_restores_the_lead_row() {
        let (store, csr, lead) = store_with_lead().await;
        store.fail_sale_writes(true);

        let err = store
            .record_conversion(&Scope::Owner(csr.id), &conversion(lead.id, csr.id))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "StorageError");

        let after = store.find_lead(lead.id).await.unwrap().unwrap();
        assert_same_lead(&after, &lead);
        assert!(store.sales_for_lead(lead.id).await.is_empty());
    }

    #[tokio::test]
    async fn existing_sale_for_the_lead_conflicts_and_rolls_back() {
        let (store, csr, lead) = store_with_lead().await;
        let orphan = Sale {
            id: Uuid::new_v4(),
            lead_id: lead.id,
            csr_id: csr.id,
            amount: Decimal::from(100),
            course: "IELTS".into(),
            status: SaleStatus::Completed,
            payment_method: "Cash".into(),
            remarks: None,
            verified_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.state.write().await.sales.insert(orphan.id, orphan);

        let err = store
            .record_conversion(&Scope::All, &conversion(lead.id, csr.id))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ConflictError");

        let after = store.find_lead(lead.id).await.unwrap().unwrap();
        assert_same_lead(&after, &lead);
        assert_eq!(store.sales_for_lead(lead.id).await.len(), 1);
    }
}
