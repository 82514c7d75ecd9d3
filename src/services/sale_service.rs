// src/services/sale_service.rs

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    common::{error::AppError, time_window::DateRange},
    db::SaleStore,
    models::{
        auth::Caller,
        sale::{Sale, SaleQuery, SaleStatus},
    },
    services::access::{require_admin, scope_for},
};

/// Leituras do livro-razão de vendas (a escrita é da conversão).
#[derive(Clone)]
pub struct SaleService {
    sales: Arc<dyn SaleStore>,
}

impl SaleService {
    pub fn new(sales: Arc<dyn SaleStore>) -> Self {
        Self { sales }
    }

    /// Admin vê todas (opcionalmente de um agente); CSR vê só as suas.
    pub async fn list_all_sales(
        &self,
        caller: &Caller,
        csr_id: Option<Uuid>,
        created: DateRange,
    ) -> Result<Vec<Sale>, AppError> {
        let Some(scope) = scope_for(caller).narrow(csr_id) else {
            return Ok(Vec::new());
        };
        let query = SaleQuery { lead_id: None, created };
        self.sales.list_sales(&scope, &query).await
    }

    pub async fn list_sales_by_csr(&self, csr_id: Uuid, caller: &Caller) -> Result<Vec<Sale>, AppError> {
        // Pedido explícito por outro agente: nega em vez de devolver lista vazia
        scope_for(caller).ensure(csr_id)?;
        self.list_all_sales(caller, Some(csr_id), DateRange::unbounded()).await
    }

    pub async fn list_sales_by_date_range(
        &self,
        range: DateRange,
        caller: &Caller,
    ) -> Result<Vec<Sale>, AppError> {
        self.list_all_sales(caller, None, range).await
    }

    pub async fn get_sale(&self, id: Uuid, caller: &Caller) -> Result<Sale, AppError> {
        let sale = self
            .sales
            .find_sale(id)
            .await?
            .ok_or_else(|| AppError::not_found("Venda não encontrada."))?;

        scope_for(caller).ensure(sale.csr_id)?;
        Ok(sale)
    }

    pub async fn verify_sale(
        &self,
        id: Uuid,
        status: Option<SaleStatus>,
        caller: &Caller,
    ) -> Result<Sale, AppError> {
        require_admin(caller)?;

        let sale = self
            .sales
            .verify_sale(id, caller.id, status)
            .await?
            .ok_or_else(|| AppError::not_found("Venda não encontrada."))?;

        tracing::info!("Venda {} verificada por {} (status: {:?})", sale.id, caller.id, sale.status);
        Ok(sale)
    }
}
