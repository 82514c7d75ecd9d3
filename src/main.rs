//src/main.rs

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, patch, post},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::{AppState, Config};
use crate::docs::ApiDoc;
use crate::middleware::auth::auth_guard;

// Planilhas podem passar do limite padrão de 2 MB do axum
const UPLOAD_LIMIT_BYTES: usize = 10 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Inicializa o logger (RUST_LOG, padrão "info")
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let config = Config::from_env()?;
    let app_state = AppState::new(&config).await?;

    // Define as rotas de autenticação (públicas)
    let auth_routes = Router::new()
        .route("/first-admin-signup", post(handlers::auth::first_admin_signup))
        .route("/login", post(handlers::auth::login));

    // Define as rotas de usuário (protegidas pelo middleware)
    let user_routes = Router::new()
        .route("/me", get(handlers::auth::get_me).patch(handlers::auth::update_me))
        .route("/register", post(handlers::auth::register))
        .route("/team-members", get(handlers::auth::list_team_members))
        .route("/{id}/status", patch(handlers::auth::update_user_status));

    let lead_routes = Router::new()
        .route("/"
               ,post(handlers::leads::create_lead)
               .get(handlers::leads::list_leads)
        )
        .route("/csr/{csr_id}", get(handlers::leads::list_leads_by_csr))
        .route("/admin/delete-all", delete(handlers::leads::purge_all))
        .route("/bulk/upload-excel", post(handlers::leads::bulk_upload))
        .route("/excel/parse", post(handlers::leads::parse_excel))
        .route("/excel/validate", post(handlers::leads::validate_excel))
        .route("/{id}"
               ,get(handlers::leads::get_lead)
               .patch(handlers::leads::update_lead)
               .delete(handlers::leads::delete_lead)
        )
        .route("/{id}/convert", post(handlers::leads::convert_lead))
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES));

    let sale_routes = Router::new()
        .route("/", get(handlers::sales::list_sales))
        .route("/by-date", get(handlers::sales::list_sales_by_date))
        .route("/csr/{csr_id}", get(handlers::sales::list_sales_by_csr))
        .route("/{id}", get(handlers::sales::get_sale))
        .route("/{id}/verify", patch(handlers::sales::verify_sale));

    let dashboard_routes = Router::new()
        .route("/csr-stats", get(handlers::reports::csr_stats))
        .route("/admin-stats", get(handlers::reports::admin_stats));

    let report_routes = Router::new()
        .route("/leads", get(handlers::reports::leads_grouped))
        .route("/sales", get(handlers::reports::sales_grouped));

    // Tudo abaixo de /api (exceto auth e health) exige um Bearer válido
    let protected = Router::new()
        .nest("/api/users", user_routes)
        .nest("/api/leads", lead_routes)
        .nest("/api/sales", sale_routes)
        .nest("/api/dashboard", dashboard_routes)
        .nest("/api/reports", report_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    // Combina tudo no router principal
    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .merge(protected)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state);

    // Inicia o servidor
    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
