// src/services/report_service.rs

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{Local, TimeZone};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::{error::AppError, time_window::ReportBucket},
    db::{LeadStore, SaleStore},
    models::{
        auth::Caller,
        lead::{LeadQuery, LeadStatus},
        report::{AdminStats, BucketCount, CsrLeadCount, CsrSalesTotal, CsrStats, StatusCount},
        sale::SaleQuery,
    },
    services::access::{require_admin, scope_for},
};

/// Projeções somente-leitura sobre leads e vendas, sempre dentro do escopo de quem pede.
#[derive(Clone)]
pub struct ReportService {
    leads: Arc<dyn LeadStore>,
    sales: Arc<dyn SaleStore>,
}

/// Taxa de conversão em %, duas casas. Sem leads, 0.
pub fn conversion_rate(total_leads: i64, total_sales: i64) -> Decimal {
    if total_leads == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(total_sales) * Decimal::from(100) / Decimal::from(total_leads)).round_dp(2)
}

fn into_buckets(counts: BTreeMap<String, i64>) -> Vec<BucketCount> {
    counts
        .into_iter()
        .map(|(bucket, total)| BucketCount { bucket, total })
        .collect()
}

impl ReportService {
    pub fn new(leads: Arc<dyn LeadStore>, sales: Arc<dyn SaleStore>) -> Self {
        Self { leads, sales }
    }

    pub async fn csr_stats(&self, caller: &Caller) -> Result<CsrStats, AppError> {
        let scope = scope_for(caller);
        let leads = self.leads.list_leads(&scope, &LeadQuery::default()).await?;
        let sales = self.sales.list_sales(&scope, &SaleQuery::default()).await?;

        let total_leads = leads.len() as i64;
        let total_sales = sales.len() as i64;

        Ok(CsrStats {
            total_leads,
            total_sales,
            total_revenue: sales.iter().map(|s| s.amount).sum(),
            conversion_rate: conversion_rate(total_leads, total_sales),
        })
    }

    pub async fn admin_stats(&self, caller: &Caller) -> Result<AdminStats, AppError> {
        require_admin(caller)?;
        let scope = scope_for(caller);
        let leads = self.leads.list_leads(&scope, &LeadQuery::default()).await?;
        let sales = self.sales.list_sales(&scope, &SaleQuery::default()).await?;

        // --- Leads por status ---
        let mut by_status: BTreeMap<LeadStatus, i64> = BTreeMap::new();
        for lead in &leads {
            *by_status.entry(lead.status).or_default() += 1;
        }

        // --- Leads por agente ---
        let mut by_csr: HashMap<Uuid, i64> = HashMap::new();
        for lead in &leads {
            *by_csr.entry(lead.assigned_to).or_default() += 1;
        }
        let mut leads_by_csr: Vec<CsrLeadCount> = by_csr
            .into_iter()
            .map(|(csr_id, total)| CsrLeadCount { csr_id, total })
            .collect();
        leads_by_csr.sort_by(|a, b| b.total.cmp(&a.total).then(a.csr_id.cmp(&b.csr_id)));

        // --- Vendas por agente ---
        let mut sales_totals: HashMap<Uuid, (i64, Decimal)> = HashMap::new();
        for sale in &sales {
            let entry = sales_totals.entry(sale.csr_id).or_insert((0, Decimal::ZERO));
            entry.0 += 1;
            entry.1 += sale.amount;
        }
        let mut sales_by_csr: Vec<CsrSalesTotal> = sales_totals
            .into_iter()
            .map(|(csr_id, (total_sales, revenue))| CsrSalesTotal { csr_id, total_sales, revenue })
            .collect();
        sales_by_csr.sort_by(|a, b| b.revenue.cmp(&a.revenue).then(a.csr_id.cmp(&b.csr_id)));

        Ok(AdminStats {
            total_leads: leads.len() as i64,
            total_sales: sales.len() as i64,
            total_revenue: sales.iter().map(|s| s.amount).sum(),
            leads_by_status: by_status
                .into_iter()
                .map(|(status, total)| StatusCount { status, total })
                .collect(),
            leads_by_csr,
            sales_by_csr,
        })
    }

    pub async fn leads_grouped(&self, bucket: ReportBucket, caller: &Caller) -> Result<Vec<BucketCount>, AppError> {
        self.leads_grouped_in(bucket, caller, &Local).await
    }

    pub async fn sales_grouped(&self, bucket: ReportBucket, caller: &Caller) -> Result<Vec<BucketCount>, AppError> {
        self.sales_grouped_in(bucket, caller, &Local).await
    }

    pub async fn leads_grouped_in<Tz: TimeZone>(
        &self,
        bucket: ReportBucket,
        caller: &Caller,
        tz: &Tz,
    ) -> Result<Vec<BucketCount>, AppError> {
        let leads = self.leads.list_leads(&scope_for(caller), &LeadQuery::default()).await?;

        let mut counts: BTreeMap<String, i64> = BTreeMap::new();
        for lead in &leads {
            *counts.entry(bucket.label(lead.created_at, tz)).or_default() += 1;
        }
        Ok(into_buckets(counts))
    }

    pub async fn sales_grouped_in<Tz: TimeZone>(
        &self,
        bucket: ReportBucket,
        caller: &Caller,
        tz: &Tz,
    ) -> Result<Vec<BucketCount>, AppError> {
        let sales = self.sales.list_sales(&scope_for(caller), &SaleQuery::default()).await?;

        let mut counts: BTreeMap<String, i64> = BTreeMap::new();
        for sale in &sales {
            *counts.entry(bucket.label(sale.created_at, tz)).or_default() += 1;
        }
        Ok(into_buckets(counts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::services::test_support::Fixture;

    #[test]
    fn rate_has_two_decimals_and_handles_no_leads() {
        assert_eq!(conversion_rate(0, 0), Decimal::ZERO);
        assert_eq!(conversion_rate(3, 1).to_string(), "33.33");
        assert_eq!(conversion_rate(8, 1), Decimal::new(1250, 2));
    }

    #[tokio::test]
    async fn csr_stats_cover_only_own_records() {
        let fx = Fixture::new().await;
        fx.sale_for(&fx.csr1, "03001111111", 1000).await;
        fx.lead_for(&fx.csr1, "03002222222").await;
        fx.sale_for(&fx.csr2, "03003333333", 5000).await;

        let stats = fx.report_service().csr_stats(&fx.csr1).await.unwrap();
        assert_eq!(stats.total_leads, 2);
        assert_eq!(stats.total_sales, 1);
        assert_eq!(stats.total_revenue, Decimal::from(1000));
        assert_eq!(stats.conversion_rate, Decimal::from(50));
    }

    #[tokio::test]
    async fn admin_stats_break_down_by_status_and_agent() {
        let fx = Fixture::new().await;
        fx.sale_for(&fx.csr1, "03001111111", 1000).await;
        fx.sale_for(&fx.csr1, "03002222222", 2000).await;
        fx.lead_for(&fx.csr2, "03003333333").await;
        let service = fx.report_service();

        assert_eq!(service.admin_stats(&fx.csr1).await.unwrap_err().kind(), "AccessDeniedError");

        let stats = service.admin_stats(&fx.admin).await.unwrap();
        assert_eq!(stats.total_leads, 3);
        assert_eq!(stats.total_revenue, Decimal::from(3000));
        assert_eq!(
            stats.leads_by_status,
            vec![
                StatusCount { status: LeadStatus::New, total: 1 },
                StatusCount { status: LeadStatus::Converted, total: 2 },
            ]
        );
        assert_eq!(stats.leads_by_csr[0], CsrLeadCount { csr_id: fx.csr1.id, total: 2 });
        assert_eq!(
            stats.sales_by_csr,
            vec![CsrSalesTotal { csr_id: fx.csr1.id, total_sales: 2, revenue: Decimal::from(3000) }]
        );
    }

    #[tokio::test]
    async fn grouping_by_month_is_sorted_and_scoped() {
        let fx = Fixture::new().await;
        let jan = fx.lead_for(&fx.csr1, "03001111111").await;
        let feb = fx.lead_for(&fx.csr1, "03002222222").await;
        let other = fx.lead_for(&fx.csr2, "03003333333").await;
        fx.store.backdate_lead(feb.id, Utc.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap()).await;
        fx.store.backdate_lead(jan.id, Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap()).await;
        fx.store.backdate_lead(other.id, Utc.with_ymd_and_hms(2026, 1, 6, 12, 0, 0).unwrap()).await;

        let buckets = fx
            .report_service()
            .leads_grouped_in(ReportBucket::Month, &fx.csr1, &Utc)
            .await
            .unwrap();
        assert_eq!(
            buckets,
            vec![
                BucketCount { bucket: "2026-01".into(), total: 1 },
                BucketCount { bucket: "2026-02".into(), total: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn sales_group_by_day() {
        let fx = Fixture::new().await;
        let a = fx.sale_for(&fx.csr1, "03001111111", 10).await;
        let b = fx.sale_for(&fx.csr1, "03002222222", 20).await;
        let at = Utc.with_ymd_and_hms(2026, 3, 9, 8, 0, 0).unwrap();
        fx.store.backdate_sale(a.id, at).await;
        fx.store.backdate_sale(b.id, at).await;

        let buckets = fx
            .report_service()
            .sales_grouped_in(ReportBucket::Day, &fx.admin, &Utc)
            .await
            .unwrap();
        assert_eq!(buckets, vec![BucketCount { bucket: "2026-03-09".into(), total: 2 }]);
    }
}
