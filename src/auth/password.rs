//! Password hashing for local accounts.

use actix_web::web;

use crate::error::AppError;

/// Work factor for new hashes. Existing hashes carry their own cost.
pub const BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    Ok(bcrypt::hash(password, BCRYPT_COST)?)
}

/// A stored value that is not a bcrypt hash is an internal error, not a mismatch.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, AppError> {
    Ok(bcrypt::verify(password, stored_hash)?)
}

/// [`hash_password`] on the blocking pool, so a slow hash never stalls a worker.
pub async fn hash_password_blocking(password: String) -> Result<String, AppError> {
    web::block(move || hash_password(&password)).await?
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_blocking(
    password: String,
    stored_hash: String,
) -> Result<bool, AppError> {
    web::block(move || verify_password(&password, &stored_hash)).await?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashes_are_salted() {
        let first = hash_password("correct horse").unwrap();
        let second = hash_password("correct horse").unwrap();

        assert_ne!(first, second);
        assert!(verify_password("correct horse", &first).unwrap());
        assert!(verify_password("correct horse", &second).unwrap());
        assert!(!verify_password("battery staple", &first).unwrap());
    }

    #[test]
    fn test_garbage_hash_never_verifies() {
        // bcrypt reports most malformed hashes as errors, some as a plain mismatch
        assert!(!matches!(verify_password("anything", "not-a-bcrypt-hash"), Ok(true)));
    }

    #[actix_rt::test]
    async fn test_blocking_variants_agree() {
        let stored = hash_password_blocking("blocking_pw_123".to_string())
            .await
            .unwrap();
        assert!(verify_password_blocking("blocking_pw_123".to_string(), stored.clone())
            .await
            .unwrap());
        assert!(!verify_password_blocking("other".to_string(), stored).await.unwrap());
    }
}
