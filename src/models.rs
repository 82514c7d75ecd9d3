pub mod auth;
pub mod import;
pub mod lead;
pub mod report;
pub mod sale;
