// src/db/lead_repo.rs

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::lead::{Lead, LeadChanges, LeadQuery, NewLead},
    services::access::Scope,
};

/// Fonte única do estado dos leads. Escritas condicionais recebem o [`Scope`]
/// de quem chama para que a checagem de dono valha também no próprio UPDATE/DELETE.
#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn insert_lead(&self, lead: &NewLead) -> Result<Lead, AppError>;
    async fn find_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError>;
    async fn list_leads(&self, scope: &Scope, query: &LeadQuery) -> Result<Vec<Lead>, AppError>;

    /// Retorna `None` se o lead não existe, saiu do escopo ou se a mudança
    /// tentaria tirar um lead do estado convertido.
    async fn update_lead(
        &self,
        id: Uuid,
        scope: &Scope,
        changes: &LeadChanges,
        updated_by: Uuid,
    ) -> Result<Option<Lead>, AppError>;

    async fn delete_lead(&self, id: Uuid, scope: &Scope) -> Result<bool, AppError>;
    async fn delete_all_leads(&self) -> Result<u64, AppError>;

    /// Quais desses telefones (já normalizados) existem na base.
    async fn find_existing_phones(&self, phones: &[String]) -> Result<HashSet<String>, AppError>;
}

#[derive(Clone)]
pub struct LeadRepository {
    pool: PgPool,
}

impl LeadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Escapa curingas do ILIKE para a busca livre
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl LeadStore for LeadRepository {
    async fn insert_lead(&self, lead: &NewLead) -> Result<Lead, AppError> {
        let created = sqlx::query_as::<_, Lead>(
            r#"
            INSERT INTO leads (
                name, phone, course, city, source,
                assigned_to, created_by, follow_up_date, remarks
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
            .bind(&lead.name)
            .bind(&lead.phone)
            .bind(&lead.course)
            .bind(&lead.city)
            .bind(&lead.source)
            .bind(lead.assigned_to)
            .bind(lead.created_by)
            .bind(lead.follow_up_date)
            .bind(lead.remarks.as_deref())
            .fetch_one(&self.pool)
            .await?;

        Ok(created)
    }

    async fn find_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        let lead = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(lead)
    }

    async fn list_leads(&self, scope: &Scope, query: &LeadQuery) -> Result<Vec<Lead>, AppError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM leads WHERE TRUE");

        // O escopo entra sempre na query, nunca depois dela
        if let Some(owner) = scope.owner() {
            qb.push(" AND assigned_to = ").push_bind(owner);
        }
        if let Some(status) = query.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(from) = query.created.from {
            qb.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = query.created.to {
            qb.push(" AND created_at < ").push_bind(to);
        }
        if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = like_pattern(term);
            qb.push(" AND (name ILIKE ").push_bind(pattern.clone())
                .push(" OR phone ILIKE ").push_bind(pattern.clone())
                .push(" OR course ILIKE ").push_bind(pattern.clone())
                .push(" OR city ILIKE ").push_bind(pattern)
                .push(")");
        }
        qb.push(" ORDER BY created_at DESC");

        let leads = qb.build_query_as::<Lead>().fetch_all(&self.pool).await?;
        Ok(leads)
    }

    async fn update_lead(
        &self,
        id: Uuid,
        scope: &Scope,
        changes: &LeadChanges,
        updated_by: Uuid,
    ) -> Result<Option<Lead>, AppError> {
        // COALESCE mantém o valor atual quando o campo não veio no patch.
        // A última condição impede que um lead convertido volte a outro status.
        let updated = sqlx::query_as::<_, Lead>(
            r#"
            UPDATE leads SET
                name = COALESCE($2, name),
                phone = COALESCE($3, phone),
                course = COALESCE($4, course),
                city = COALESCE($5, city),
                source = COALESCE($6, source),
                status = COALESCE($7, status),
                assigned_to = COALESCE($8, assigned_to),
                sale_amount = COALESCE($9, sale_amount),
                follow_up_date = COALESCE($10, follow_up_date),
                remarks = COALESCE($11, remarks),
                converted_at = CASE
                    WHEN $7::lead_status = 'converted' THEN COALESCE(converted_at, $12)
                    ELSE converted_at
                END,
                last_updated_by = $13,
                updated_at = NOW()
            WHERE id = $1
              AND ($14::uuid IS NULL OR assigned_to = $14)
              AND ($7::lead_status IS NULL OR $7::lead_status = 'converted' OR status <> 'converted')
            RETURNING *
            "#,
        )
            .bind(id)
            .bind(changes.name.as_deref())
            .bind(changes.phone.as_deref())
            .bind(changes.course.as_deref())
            .bind(changes.city.as_deref())
            .bind(changes.source.as_deref())
            .bind(changes.status)
            .bind(changes.assigned_to)
            .bind(changes.sale_amount)
            .bind(changes.follow_up_date)
            .bind(changes.remarks.as_deref())
            .bind(changes.converted_at)
            .bind(updated_by)
            .bind(scope.owner())
            .fetch_optional(&self.pool)
            .await?;

        Ok(updated)
    }

    async fn delete_lead(&self, id: Uuid, scope: &Scope) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM leads WHERE id = $1 AND ($2::uuid IS NULL OR assigned_to = $2)",
        )
            .bind(id)
            .bind(scope.owner())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_all_leads(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM leads")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn find_existing_phones(&self, phones: &[String]) -> Result<HashSet<String>, AppError> {
        if phones.is_empty() {
            return Ok(HashSet::new());
        }

        let existing = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT phone FROM leads WHERE phone = ANY($1)",
        )
            .bind(phones)
            .fetch_all(&self.pool)
            .await?;

        Ok(existing.into_iter().collect())
    }
}
