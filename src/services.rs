pub mod access;
pub mod auth;
pub use auth::AuthService;
pub mod lead_service;
pub use lead_service::LeadService;
pub mod conversion_service;
pub use conversion_service::ConversionService;
pub mod sale_service;
pub use sale_service::SaleService;
pub mod tabular;
pub mod import_service;
pub use import_service::ImportService;
pub mod report_service;
pub use report_service::ReportService;

#[cfg(test)]
pub mod test_support;
