pub mod user_repo;
pub use user_repo::{UserRepository, UserStore};
pub mod lead_repo;
pub use lead_repo::{LeadRepository, LeadStore};
pub mod sale_repo;
pub use sale_repo::{SaleRepository, SaleStore};

#[cfg(test)]
pub mod memory_repo;
