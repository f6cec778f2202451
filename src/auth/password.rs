use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tokio::sync::OnceCell;
use tracing::{error, warn};

use crate::error::HashingError;

/// Hash a password with Argon2id and a fresh random salt. Output is a PHC string.
pub fn hash_password(plain: &str) -> Result<String, HashingError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            HashingError(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Check a password against a stored PHC hash.
///
/// The digest comparison inside argon2 is constant time. A hash that does not
/// parse is treated as a mismatch.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "stored password hash is malformed");
            return false;
        }
    };
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok()
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_async(plain: String) -> Result<String, HashingError> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|e| HashingError(format!("hashing task failed: {e}")))?
}

/// [`verify_password`] on the blocking pool. A panicked task counts as a mismatch.
pub async fn verify_password_async(plain: String, hash: String) -> bool {
    match tokio::task::spawn_blocking(move || verify_password(&plain, &hash)).await {
        Ok(ok) => ok,
        Err(e) => {
            error!(error = %e, "verify task failed");
            false
        }
    }
}

static DECOY_HASH: OnceCell<String> = OnceCell::const_new();

/// Hash checked against when a login names no stored account. Built once on
/// the blocking pool; [`warm_decoy`] builds it at startup.
async fn decoy_hash() -> Result<&'static String, HashingError> {
    DECOY_HASH
        .get_or_try_init(|| hash_password_async("decoy-password".to_owned()))
        .await
}

pub async fn warm_decoy() -> Result<(), HashingError> {
    decoy_hash().await.map(|_| ())
}

/// Spend the same work as a real verification when there is no stored hash to
/// check, so a missing account costs as much as a wrong password.
pub async fn decoy_verify(plain: String) -> Result<(), HashingError> {
    let hash = decoy_hash().await?;
    let _ = verify_password_async(plain, hash.clone()).await;
    Ok(())
}
