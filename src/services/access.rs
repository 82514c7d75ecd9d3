// src/services/access.rs

//! Escopo de acesso por papel. Toda leitura e escrita de leads e vendas passa
//! por [`scope_for`]: admin enxerga tudo, CSR enxerga só o que é dele.

use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::auth::{Caller, Role},
};

/// Predicado de visibilidade aplicado sobre o dono do registro
/// (`leads.assigned_to` / `sales.csr_id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    Owner(Uuid),
}

pub fn scope_for(caller: &Caller) -> Scope {
    match caller.role {
        Role::Admin => Scope::All,
        Role::Csr => Scope::Owner(caller.id),
    }
}

impl Scope {
    pub fn permits(&self, owner_id: Uuid) -> bool {
        match self {
            Scope::All => true,
            Scope::Owner(id) => *id == owner_id,
        }
    }

    /// Dono exigido pelo escopo (`None` = sem restrição).
    pub fn owner(&self) -> Option<Uuid> {
        match self {
            Scope::All => None,
            Scope::Owner(id) => Some(*id),
        }
    }

    /// Falha com `AccessDenied` se o registro não pertence ao escopo.
    pub fn ensure(&self, owner_id: Uuid) -> Result<(), AppError> {
        if self.permits(owner_id) {
            Ok(())
        } else {
            Err(AppError::access_denied(
                "Acesso negado: este registro pertence a outro agente.",
            ))
        }
    }

    /// Interseção com um filtro de dono pedido pelo cliente.
    /// `None` significa conjunto vazio (CSR pedindo dados de outro agente).
    pub fn narrow(self, requested_owner: Option<Uuid>) -> Option<Scope> {
        match (self, requested_owner) {
            (scope, None) => Some(scope),
            (Scope::All, Some(owner)) => Some(Scope::Owner(owner)),
            (Scope::Owner(id), Some(owner)) if id == owner => Some(Scope::Owner(id)),
            (Scope::Owner(_), Some(_)) => None,
        }
    }
}

/// Operações exclusivas de admin (purge, cadastro de agentes, relatórios gerais).
pub fn require_admin(caller: &Caller) -> Result<(), AppError> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(AppError::access_denied("Acesso negado: operação restrita a administradores."))
    }
}
