// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::{
    db::{LeadRepository, SaleRepository, UserRepository},
    services::{
        AuthService, ConversionService, ImportService, LeadService, ReportService, SaleService,
    },
};

/// Configuração lida do ambiente (`.env` é carregado se existir).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_lifetime_hours: i64,
    pub bind_addr: String,
    pub max_connections: u32,
    pub bcrypt_cost: u32,
}

fn var_or<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} tem um valor inválido: '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?,
            jwt_lifetime_hours: var_or("JWT_LIFETIME_HOURS", 24)?,
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:5000".to_string())?,
            max_connections: var_or("DATABASE_MAX_CONNECTIONS", 5)?,
            bcrypt_cost: var_or("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    pub lead_service: LeadService,
    pub conversion_service: ConversionService,
    pub sale_service: SaleService,
    pub import_service: ImportService,
    pub report_service: ReportService,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        sqlx::migrate!()
            .run(&db_pool)
            .await
            .context("Falha ao rodar as migrações do banco de dados")?;

        tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

        // --- Monta o gráfico de dependências ---
        let users = Arc::new(UserRepository::new(db_pool.clone()));
        let leads = Arc::new(LeadRepository::new(db_pool.clone()));
        let sales = Arc::new(SaleRepository::new(db_pool.clone()));

        Ok(Self {
            auth_service: AuthService::new(
                users.clone(),
                config.jwt_secret.clone(),
                config.jwt_lifetime_hours,
                config.bcrypt_cost,
            ),
            lead_service: LeadService::new(leads.clone(), users.clone()),
            conversion_service: ConversionService::new(leads.clone(), sales.clone()),
            sale_service: SaleService::new(sales.clone()),
            import_service: ImportService::new(leads.clone(), users),
            report_service: ReportService::new(leads, sales),
        })
    }
}
