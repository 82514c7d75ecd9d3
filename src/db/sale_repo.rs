// src/db/sale_repo.rs

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        lead::Lead,
        sale::{Conversion, Sale, SaleQuery, SaleStatus},
    },
    services::access::Scope,
};

/// Livro-razão de vendas. Não existe INSERT avulso: a única forma de criar
/// uma venda é [`SaleStore::record_conversion`], junto com a transição do lead.
#[async_trait]
pub trait SaleStore: Send + Sync {
    /// Unidade de trabalho da conversão: (a) transição do lead para `converted`
    /// condicionada a ele ainda não estar convertido e (b) criação da venda.
    /// Ou as duas escritas ficam visíveis, ou nenhuma.
    async fn record_conversion(&self, scope: &Scope, conversion: &Conversion) -> Result<Sale, AppError>;

    async fn find_sale(&self, id: Uuid) -> Result<Option<Sale>, AppError>;
    async fn list_sales(&self, scope: &Scope, query: &SaleQuery) -> Result<Vec<Sale>, AppError>;
    async fn verify_sale(
        &self,
        id: Uuid,
        verified_by: Uuid,
        status: Option<SaleStatus>,
    ) -> Result<Option<Sale>, AppError>;
}

#[derive(Clone)]
pub struct SaleRepository {
    pool: PgPool,
}

impl SaleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Dono e curso lidos da linha travada do lead.
#[derive(sqlx::FromRow)]
struct ConvertedLead {
    assigned_to: Uuid,
    course: String,
}

#[async_trait]
impl SaleStore for SaleRepository {
    async fn record_conversion(&self, scope: &Scope, conversion: &Conversion) -> Result<Sale, AppError> {
        // 1. Inicia a transação
        let mut tx = self.pool.begin().await?;

        // 2. Compare-and-swap: só transiciona se ainda não estiver convertido.
        // O UPDATE trava a linha; uma segunda conversão concorrente espera o commit
        // e então não encontra mais a linha elegível.
        let transitioned = sqlx::query_as::<_, ConvertedLead>(
            r#"
            UPDATE leads SET
                status = 'converted',
                sale_amount = $2,
                converted_at = $3,
                last_updated_by = $4,
                updated_at = NOW()
            WHERE id = $1
              AND status <> 'converted'
              AND ($5::uuid IS NULL OR assigned_to = $5)
            RETURNING assigned_to, course
            "#,
        )
            .bind(conversion.lead_id)
            .bind(conversion.amount)
            .bind(conversion.converted_at)
            .bind(conversion.converted_by)
            .bind(scope.owner())
            .fetch_optional(&mut *tx)
            .await?;

        let Some(lead) = transitioned else {
            // Descobre por que a transição não aconteceu (o tx sofre rollback no drop)
            let current = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
                .bind(conversion.lead_id)
                .fetch_optional(&mut *tx)
                .await?;

            return Err(match current {
                None => AppError::not_found("Lead não encontrado."),
                Some(lead) if lead.status.is_converted() => {
                    AppError::conflict("Lead já convertido em venda.")
                }
                Some(_) => AppError::access_denied(
                    "Acesso negado: este registro pertence a outro agente.",
                ),
            });
        };

        // 3. Cria a venda com dados copiados do lead (passando a mesma transação)
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            INSERT INTO sales (lead_id, csr_id, amount, course, status, payment_method, remarks)
            VALUES ($1, $2, $3, $4, 'completed', $5, $6)
            RETURNING *
            "#,
        )
            .bind(conversion.lead_id)
            .bind(lead.assigned_to)
            .bind(conversion.amount)
            .bind(&lead.course)
            .bind(&conversion.payment_method)
            .bind(conversion.remarks.as_deref())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_unique_violation() {
                        return AppError::conflict("Lead já convertido em venda.");
                    }
                }
                e.into()
            })?; // Se falhar aqui, a transição do lead acima é desfeita!

        // 4. Se chegou aqui, deu tudo certo. "Commita" a transação.
        tx.commit().await?;

        Ok(sale)
    }

    async fn find_sale(&self, id: Uuid) -> Result<Option<Sale>, AppError> {
        let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(sale)
    }

    async fn list_sales(&self, scope: &Scope, query: &SaleQuery) -> Result<Vec<Sale>, AppError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM sales WHERE TRUE");

        if let Some(owner) = scope.owner() {
            qb.push(" AND csr_id = ").push_bind(owner);
        }
        if let Some(lead_id) = query.lead_id {
            qb.push(" AND lead_id = ").push_bind(lead_id);
        }
        if let Some(from) = query.created.from {
            qb.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = query.created.to {
            qb.push(" AND created_at < ").push_bind(to);
        }
        qb.push(" ORDER BY created_at DESC");

        let sales = qb.build_query_as::<Sale>().fetch_all(&self.pool).await?;
        Ok(sales)
    }

    async fn verify_sale(
        &self,
        id: Uuid,
        verified_by: Uuid,
        status: Option<SaleStatus>,
    ) -> Result<Option<Sale>, AppError> {
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            UPDATE sales SET
                verified_by = $2,
                status = COALESCE($3, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
            .bind(id)
            .bind(verified_by)
            .bind(status)
            .fetch_optional(&self.pool)
            .await?;
        Ok(sale)
    }
}
