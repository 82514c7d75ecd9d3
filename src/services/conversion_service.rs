// src/services/conversion_service.rs

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{LeadStore, SaleStore},
    models::{
        auth::Caller,
        sale::{check_money, Conversion, ConversionOptions, Sale, DEFAULT_PAYMENT_METHOD},
    },
    services::access::scope_for,
};

/// Transição lead -> venda. É a única porta de entrada para criar vendas.
#[derive(Clone)]
pub struct ConversionService {
    leads: Arc<dyn LeadStore>,
    sales: Arc<dyn SaleStore>,
}

impl ConversionService {
    pub fn new(leads: Arc<dyn LeadStore>, sales: Arc<dyn SaleStore>) -> Self {
        Self { leads, sales }
    }

    pub async fn convert(
        &self,
        lead_id: Uuid,
        amount: Decimal,
        caller: &Caller,
        opts: ConversionOptions,
    ) -> Result<Sale, AppError> {
        // 1. Carrega o lead
        let lead = self
            .leads
            .find_lead(lead_id)
            .await?
            .ok_or_else(|| AppError::not_found("Lead não encontrado."))?;

        // 2. Autorização
        let scope = scope_for(caller);
        scope.ensure(lead.assigned_to)?;

        // 3. Valor
        if amount <= Decimal::ZERO {
            return Err(AppError::validation("O valor da venda deve ser maior que zero."));
        }
        check_money(amount)?;

        // 4. Atalho para o caso comum de conversão repetida.
        // A garantia de verdade está no compare-and-swap do passo 5.
        if lead.status.is_converted() {
            return Err(AppError::conflict("Lead já convertido em venda."));
        }

        // 5. Transição + venda numa única unidade de trabalho
        let conversion = Conversion {
            lead_id,
            amount,
            payment_method: opts
                .payment_method
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string()),
            remarks: opts.remarks.filter(|r| !r.trim().is_empty()),
            converted_by: caller.id,
            converted_at: Utc::now(),
        };

        let sale = self.sales.record_conversion(&scope, &conversion).await?;

        tracing::info!(
            "💰 Lead {} convertido: venda {} de {} para o agente {}",
            lead_id, sale.id, sale.amount, sale.csr_id
        );
        Ok(sale)
    }
}
