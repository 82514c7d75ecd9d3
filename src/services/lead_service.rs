// src/services/lead_service.rs

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        phone::{digit_count, normalize_phone, MIN_PHONE_DIGITS},
        time_window::DateRange,
    },
    db::{LeadStore, UserStore},
    models::{
        auth::Caller,
        sale::check_money,
        lead::{
            CreateLeadPayload, Lead, LeadChanges, LeadPatch, LeadQuery, LeadStatus, NewLead,
            DEFAULT_CITY, SOURCE_MANUAL,
        },
    },
    services::access::{require_admin, scope_for},
};

/// Filtros aceitos pela listagem de leads.
#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub search: Option<String>,
    pub status: Option<LeadStatus>,
    // Só tem efeito real para admin; para CSR vira interseção com o próprio id
    pub assigned_to: Option<Uuid>,
    pub created: DateRange,
}

#[derive(Clone)]
pub struct LeadService {
    leads: Arc<dyn LeadStore>,
    users: Arc<dyn UserStore>,
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}

fn valid_name(raw: &str) -> Result<String, AppError> {
    let name = non_empty(raw).ok_or_else(|| AppError::validation("O nome é obrigatório."))?;
    if name.chars().count() < 2 {
        return Err(AppError::validation("O nome deve ter no mínimo 2 caracteres."));
    }
    Ok(name)
}

fn valid_phone(raw: &str) -> Result<String, AppError> {
    let phone = normalize_phone(raw);
    if digit_count(&phone) < MIN_PHONE_DIGITS {
        return Err(AppError::validation(format!(
            "O telefone deve ter no mínimo {} dígitos.",
            MIN_PHONE_DIGITS
        )));
    }
    Ok(phone)
}

fn valid_course(raw: &str) -> Result<String, AppError> {
    non_empty(raw).ok_or_else(|| AppError::validation("O curso é obrigatório."))
}

/// Validação comum da criação manual e da importação em massa.
/// O dono (`assigned_to`) já deve ter sido decidido por quem chama.
pub fn prepare_new_lead(
    input: &CreateLeadPayload,
    assigned_to: Uuid,
    created_by: Uuid,
    default_source: &str,
) -> Result<NewLead, AppError> {
    Ok(NewLead {
        name: valid_name(&input.name)?,
        phone: valid_phone(&input.phone)?,
        course: valid_course(&input.course)?,
        city: input
            .city
            .as_deref()
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_CITY.to_string()),
        source: input
            .source
            .as_deref()
            .and_then(non_empty)
            .unwrap_or_else(|| default_source.to_string()),
        assigned_to,
        created_by,
        follow_up_date: input.follow_up_date,
        remarks: input.remarks.as_deref().and_then(non_empty),
    })
}

impl LeadService {
    pub fn new(leads: Arc<dyn LeadStore>, users: Arc<dyn UserStore>) -> Self {
        Self { leads, users }
    }

    // Admin só pode atribuir leads a usuários que existem
    async fn ensure_user_exists(&self, id: Uuid) -> Result<(), AppError> {
        match self.users.find_by_id(id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::validation("O agente informado em 'assignedTo' não existe.")),
        }
    }

    pub async fn create_lead(&self, caller: &Caller, input: CreateLeadPayload) -> Result<Lead, AppError> {
        // 1. Decide o dono: CSR sempre cria para si mesmo
        let assigned_to = if caller.is_admin() {
            let target = input
                .assigned_to
                .ok_or_else(|| AppError::validation("O campo 'assignedTo' é obrigatório para administradores."))?;
            self.ensure_user_exists(target).await?;
            target
        } else {
            caller.id
        };

        // 2. Valida e normaliza
        let new_lead = prepare_new_lead(&input, assigned_to, caller.id, SOURCE_MANUAL)?;

        // 3. Persiste
        let lead = self.leads.insert_lead(&new_lead).await?;
        tracing::info!("Lead {} criado por {} (dono: {})", lead.id, caller.id, lead.assigned_to);
        Ok(lead)
    }

    pub async fn get_lead(&self, id: Uuid, caller: &Caller) -> Result<Lead, AppError> {
        let lead = self
            .leads
            .find_lead(id)
            .await?
            .ok_or_else(|| AppError::not_found("Lead não encontrado."))?;

        scope_for(caller).ensure(lead.assigned_to)?;
        Ok(lead)
    }

    pub async fn list_leads(&self, caller: &Caller, filter: LeadFilter) -> Result<Vec<Lead>, AppError> {
        let Some(scope) = scope_for(caller).narrow(filter.assigned_to) else {
            return Ok(Vec::new());
        };

        let query = LeadQuery {
            search: filter.search,
            status: filter.status,
            created: filter.created,
        };
        self.leads.list_leads(&scope, &query).await
    }

    pub async fn update_lead(&self, id: Uuid, patch: LeadPatch, caller: &Caller) -> Result<Lead, AppError> {
        // 1. Carrega e checa o dono
        let current = self.get_lead(id, caller).await?;
        let scope = scope_for(caller);

        // 2. CSR não reatribui: o campo é descartado sem erro
        let assigned_to = if caller.is_admin() { patch.assigned_to } else { None };
        if let Some(target) = assigned_to {
            self.ensure_user_exists(target).await?;
        }

        // 3. Revalida os campos enviados
        let mut changes = LeadChanges {
            name: patch.name.as_deref().map(valid_name).transpose()?,
            phone: patch.phone.as_deref().map(valid_phone).transpose()?,
            course: patch.course.as_deref().map(valid_course).transpose()?,
            city: patch.city.as_deref().and_then(non_empty),
            source: patch.source.as_deref().and_then(non_empty),
            status: patch.status,
            assigned_to,
            sale_amount: patch.sale_amount,
            follow_up_date: patch.follow_up_date,
            remarks: patch.remarks,
            converted_at: None,
        };

        if let Some(amount) = changes.sale_amount {
            if amount < Decimal::ZERO {
                return Err(AppError::validation("O valor da venda não pode ser negativo."));
            }
            check_money(amount)?;
        }

        // 4. Regras de transição de status
        let effective_amount = changes.sale_amount.unwrap_or(current.sale_amount);
        match changes.status {
            Some(next) if current.status.is_converted() && !next.is_converted() => {
                return Err(AppError::conflict(
                    "Lead já convertido; o status não pode voltar atrás.",
                ));
            }
            Some(next) if next.is_converted() => {
                if effective_amount <= Decimal::ZERO {
                    return Err(AppError::validation(
                        "Um lead convertido exige 'saleAmount' maior que zero.",
                    ));
                }
                changes.converted_at = Some(Utc::now());
            }
            _ if current.status.is_converted() && effective_amount <= Decimal::ZERO => {
                return Err(AppError::validation(
                    "Um lead convertido exige 'saleAmount' maior que zero.",
                ));
            }
            _ => {}
        }

        // 5. Escrita condicional; se não pegou nenhuma linha, descobre o motivo
        match self.leads.update_lead(id, &scope, &changes, caller.id).await? {
            Some(lead) => Ok(lead),
            None => {
                let latest = self
                    .leads
                    .find_lead(id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Lead não encontrado."))?;
                scope.ensure(latest.assigned_to)?;
                Err(AppError::conflict(
                    "Lead já convertido; o status não pode voltar atrás.",
                ))
            }
        }
    }

    pub async fn delete_lead(&self, id: Uuid, caller: &Caller) -> Result<(), AppError> {
        self.get_lead(id, caller).await?;

        if !self.leads.delete_lead(id, &scope_for(caller)).await? {
            return Err(AppError::not_found("Lead não encontrado."));
        }
        tracing::info!("Lead {} removido por {}", id, caller.id);
        Ok(())
    }

    pub async fn purge_all(&self, caller: &Caller) -> Result<u64, AppError> {
        require_admin(caller)?;

        let removed = self.leads.delete_all_leads().await?;
        tracing::warn!("Purge: {} leads removidos pelo admin {}", removed, caller.id);
        Ok(removed)
    }
}
