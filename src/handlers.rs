pub mod auth;
pub mod leads;
pub mod reports;
pub mod sales;
