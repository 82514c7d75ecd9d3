// src/services/auth.rs

use std::sync::Arc;

use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::UserStore,
    models::auth::{
        AuthResponse, Caller, Claims, NewUser, Role, User, UserChanges, UserStatus,
    },
    services::access::require_admin,
};

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    jwt_secret: String,
    token_lifetime_hours: i64,
    bcrypt_cost: u32,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        jwt_secret: String,
        token_lifetime_hours: i64,
        bcrypt_cost: u32,
    ) -> Self {
        Self { users, jwt_secret, token_lifetime_hours, bcrypt_cost }
    }

    // Hashing é caro: roda fora do executor async
    async fn hash_password(&self, password: &str) -> Result<String, AppError> {
        let password_clone = password.to_owned();
        let cost = self.bcrypt_cost;
        let hashed = tokio::task::spawn_blocking(move || hash(&password_clone, cost))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;
        Ok(hashed)
    }

    async fn new_user(&self, name: &str, email: &str, password: &str, role: Role) -> Result<NewUser, AppError> {
        Ok(NewUser {
            name: name.trim().to_string(),
            email: normalize_email(email),
            password_hash: self.hash_password(password).await?,
            role,
        })
    }

    async fn create(&self, name: &str, email: &str, password: &str, role: Role) -> Result<User, AppError> {
        let new_user = self.new_user(name, email, password, role).await?;
        self.users.create_user(&new_user).await
    }

    /// Cria o primeiro administrador. Depois disso a rota fica fechada.
    pub async fn first_admin_signup(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, AppError> {
        // Atalho antes do bcrypt; a garantia fica no insert condicional
        if self.users.admin_exists().await? {
            return Err(AppError::conflict("Já existe um administrador cadastrado."));
        }

        let new_user = self.new_user(name, email, password, Role::Admin).await?;
        let user = self
            .users
            .create_first_admin(&new_user)
            .await?
            .ok_or_else(|| AppError::conflict("Já existe um administrador cadastrado."))?;
        tracing::info!("👑 Primeiro administrador criado: {}", user.email);

        let token = self.create_token(&user)?;
        Ok(AuthResponse { token, user })
    }

    /// Cadastro de agentes (ou outro admin) feito por um administrador.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Option<Role>,
        caller: &Caller,
    ) -> Result<User, AppError> {
        require_admin(caller)?;

        let user = self.create(name, email, password, role.unwrap_or(Role::Csr)).await?;
        tracing::info!("Usuário {} ({:?}) cadastrado por {}", user.email, user.role, caller.id);
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, AppError> {
        let user = self
            .users
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let password_clone = password.to_owned();
        let password_hash_clone = user.password_hash.clone();

        // Executa a verificação em um thread separado
        let is_password_valid = tokio::task::spawn_blocking(move || {
            verify(&password_clone, &password_hash_clone)
        })
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))?
            // Hash corrompido conta como senha errada
            .unwrap_or(false);

        if !is_password_valid {
            return Err(AppError::InvalidCredentials);
        }
        if user.status == UserStatus::Inactive {
            return Err(AppError::access_denied("Conta desativada. Procure um administrador."));
        }

        let token = self.create_token(&user)?;
        Ok(AuthResponse { token, user })
    }

    /// Valida o token e recarrega o usuário, para que papel e status sejam os atuais.
    pub async fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let validation = Validation::default();
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &validation,
        )
        .map_err(|_| AppError::InvalidToken)?;

        let user = self
            .users
            .find_by_id(token_data.claims.sub)
            .await?
            .ok_or(AppError::InvalidToken)?;

        if user.status == UserStatus::Inactive {
            return Err(AppError::access_denied("Conta desativada. Procure um administrador."));
        }
        Ok(user)
    }

    pub async fn me(&self, caller: &Caller) -> Result<User, AppError> {
        self.users
            .find_by_id(caller.id)
            .await?
            .ok_or_else(|| AppError::not_found("Usuário não encontrado."))
    }

    pub async fn update_profile(
        &self,
        caller: &Caller,
        name: Option<String>,
        email: Option<String>,
        password: Option<String>,
    ) -> Result<User, AppError> {
        let current = self.me(caller).await?;

        // E-mail novo precisa estar livre
        let email = email.map(|e| normalize_email(&e)).filter(|e| *e != current.email);
        if let Some(email) = &email {
            if self.users.find_by_email(email).await?.is_some() {
                return Err(AppError::EmailAlreadyExists);
            }
        }

        let password_hash = match password {
            Some(password) => Some(self.hash_password(&password).await?),
            None => None,
        };

        let changes = UserChanges {
            name: name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            email,
            password_hash,
            status: None,
        };

        self.users
            .update_user(caller.id, &changes)
            .await?
            .ok_or_else(|| AppError::not_found("Usuário não encontrado."))
    }

    pub async fn list_team_members(&self, caller: &Caller) -> Result<Vec<User>, AppError> {
        require_admin(caller)?;
        self.users.list_by_role(Role::Csr).await
    }

    pub async fn update_user_status(
        &self,
        id: Uuid,
        status: UserStatus,
        caller: &Caller,
    ) -> Result<User, AppError> {
        require_admin(caller)?;
        if id == caller.id && status == UserStatus::Inactive {
            return Err(AppError::validation("Um administrador não pode desativar a própria conta."));
        }

        let changes = UserChanges { status: Some(status), ..Default::default() };
        let user = self
            .users
            .update_user(id, &changes)
            .await?
            .ok_or_else(|| AppError::not_found("Usuário não encontrado."))?;

        tracing::info!("Status de {} alterado para {:?} por {}", user.email, status, caller.id);
        Ok(user)
    }

    fn create_token(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::hours(self.token_lifetime_hours);

        let claims = Claims {
            sub: user.id,
            role: user.role,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        // Usa '?' para um tratamento de erro mais limpo
        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}
