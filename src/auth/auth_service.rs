use std::sync::Arc;

use crate::auth::{create_jwt, hash_password, verify_password};
use crate::auth::auth_dto::RegisterRequest;
use crate::error::{AppError, Result};
use crate::user::{NewUser, User, UserStore};

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    jwt_secret: String,
    jwt_expiration_hours: i64,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        jwt_secret: String,
        jwt_expiration_hours: i64,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            users,
            jwt_secret,
            jwt_expiration_hours,
            bcrypt_cost,
        }
    }

    pub async fn register(&self, payload: RegisterRequest) -> Result<(User, String)> {
        let password_hash = hash_password(&payload.password, self.bcrypt_cost)?;
        let user = self
            .users
            .create(NewUser {
                name: payload.name,
                username: payload.username,
                email: payload.email,
                password_hash,
            })
            .await?;

        let token = self.issue_token(&user)?;
        tracing::info!("Registered user {} ({})", user.username, user.id);

        Ok((user, token))
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<(User, String)> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid credentials".into()))?;

        verify_password(password, &user.password_hash)?;

        let token = self.issue_token(&user)?;
        Ok((user, token))
    }

    pub fn token_max_age_secs(&self) -> i64 {
        self.jwt_expiration_hours * 3600
    }

    fn issue_token(&self, user: &User) -> Result<String> {
        create_jwt(
            user.id,
            &user.username,
            &self.jwt_secret,
            self.jwt_expiration_hours,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_jwt;
    use crate::storage::MemoryStore;

    fn service() -> AuthService {
        AuthService::new(Arc::new(MemoryStore::new()), "secret".to_string(), 1, 4)
    }

    fn register_request(username: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Ada Lovelace".to_string(),
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password: "hunter22".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let service = service();
        let (user, token) = service.register(register_request("ada")).await.unwrap();
        assert_eq!(verify_jwt(&token, "secret").unwrap().sub, user.id.to_string());

        let (logged_in, _) = service.login("ada", "hunter22").await.unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let service = service();
        service.register(register_request("ada")).await.unwrap();

        assert!(matches!(
            service.login("ada", "wrong-password").await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            service.login("nobody", "hunter22").await,
            Err(AppError::Unauthorized(_))
        ));
    }
}
