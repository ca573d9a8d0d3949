//! Lobby password hashing. bcrypt is CPU bound, so both calls run on the
//! blocking pool.

use thiserror::Error;

pub use bcrypt::DEFAULT_COST;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error(transparent)]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error("password task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// An empty password means the lobby is open.
pub fn normalize(password: Option<&str>) -> Option<&str> {
    password.filter(|password| !password.is_empty())
}

pub async fn hash_password(password: &str, cost: u32) -> Result<String, PasswordError> {
    let password = password.to_string();
    Ok(tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??)
}

pub async fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let (password, hash) = (password.to_string(), hash.to_string());
    Ok(tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??)
}
