// src/middleware/rbac.rs

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    common::error::AppError,
    middleware::auth::AuthenticatedUser,
    models::auth::{Caller, Role},
};

/// 1. O Trait que define qual papel a rota exige
pub trait RoleDef: Send + Sync + 'static {
    fn role() -> Role;
}

/// 2. O Extractor (Guardião). Entrega o `Caller` já checado.
pub struct RequireRole<T>(pub Caller, pub PhantomData<T>);

// 3. Implementação do FromRequestParts
impl<T, S> FromRequestParts<S> for RequireRole<T>
where
    T: RoleDef,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // A. Extrai Usuário (colocado pelo auth_guard)
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        let caller = user.caller();

        // B. Confere o papel
        if !caller.has_role(T::role()) {
            tracing::warn!("Acesso negado: {} tentou uma rota restrita", caller.id);
            return Err(AppError::access_denied(
                "Acesso negado: operação restrita a administradores.",
            ));
        }

        Ok(RequireRole(caller, PhantomData))
    }
}

// ---
// DEFINIÇÃO DOS PAPÉIS (TIPOS)
// ---

pub struct AdminOnly;
impl RoleDef for AdminOnly {
    fn role() -> Role { Role::Admin }
}

pub type RequireAdmin = RequireRole<AdminOnly>;
