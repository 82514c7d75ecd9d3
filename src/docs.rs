// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::common::time_window;
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::first_admin_signup,
        handlers::auth::login,

        // --- Users ---
        handlers::auth::get_me,
        handlers::auth::update_me,
        handlers::auth::register,
        handlers::auth::list_team_members,
        handlers::auth::update_user_status,

        // --- Leads ---
        handlers::leads::create_lead,
        handlers::leads::list_leads,
        handlers::leads::list_leads_by_csr,
        handlers::leads::get_lead,
        handlers::leads::update_lead,
        handlers::leads::delete_lead,
        handlers::leads::purge_all,
        handlers::leads::convert_lead,
        handlers::leads::bulk_upload,
        handlers::leads::parse_excel,
        handlers::leads::validate_excel,

        // --- Sales ---
        handlers::sales::list_sales,
        handlers::sales::list_sales_by_date,
        handlers::sales::list_sales_by_csr,
        handlers::sales::get_sale,
        handlers::sales::verify_sale,

        // --- Dashboard / Reports ---
        handlers::reports::csr_stats,
        handlers::reports::admin_stats,
        handlers::reports::leads_grouped,
        handlers::reports::sales_grouped,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::Role,
            models::auth::UserStatus,
            models::auth::User,
            models::auth::FirstAdminPayload,
            models::auth::RegisterUserPayload,
            models::auth::LoginUserPayload,
            models::auth::UpdateProfilePayload,
            models::auth::UpdateStatusPayload,
            models::auth::AuthResponse,

            // --- Leads ---
            models::lead::LeadStatus,
            models::lead::Lead,
            models::lead::CreateLeadPayload,
            models::lead::UpdateLeadPayload,
            time_window::TimeWindow,
            time_window::ReportBucket,

            // --- Sales ---
            models::sale::SaleStatus,
            models::sale::Sale,
            models::sale::ConvertLeadPayload,
            models::sale::VerifySalePayload,

            // --- Importação ---
            models::import::RejectedRow,
            models::import::BulkIngestReport,
            models::import::BulkPreview,

            // --- Relatórios ---
            models::report::CsrStats,
            models::report::AdminStats,
            models::report::StatusCount,
            models::report::CsrLeadCount,
            models::report::CsrSalesTotal,
            models::report::BucketCount,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação e primeiro administrador"),
        (name = "Users", description = "Perfil e gestão da equipe"),
        (name = "Leads", description = "Ciclo de vida dos leads, conversão e importação"),
        (name = "Sales", description = "Livro-razão de vendas"),
        (name = "Dashboard", description = "Indicadores do agente e do admin"),
        (name = "Reports", description = "Séries por dia, semana e mês")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
