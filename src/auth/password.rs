use crate::error::{AppError, Result};

pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    bcrypt::hash(password, cost).map_err(|e| {
        tracing::error!("Password hashing failed: {}", e);
        AppError::InternalError
    })
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<()> {
    match bcrypt::verify(password, password_hash) {
        Ok(true) => Ok(()),
        _ => Err(AppError::Unauthorized("Invalid credentials".to_string())),
    }
}
