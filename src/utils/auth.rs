use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("password hashing failed: {0}")]
pub struct HashingError(String);

/// Hashes a password with Argon2id and a fresh random salt.
///
/// The output is a PHC string (`$argon2id$v=19$...`) that carries its own
/// salt and parameters, so `verify_password` needs nothing else.
/// Only fails if the RNG or the algorithm itself does; input content never
/// causes an error.
pub fn hash_password(password: &str) -> Result<String, HashingError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| HashingError(e.to_string()))
}

/// Checks a password against a stored PHC string.
///
/// Any mismatch comes back as `false`, including a digest that doesn't parse.
/// The comparison itself is constant-time.
pub fn verify_password(password: &str, digest: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(digest) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// [`hash_password`] on the blocking pool. Argon2 is deliberately slow and
/// would otherwise stall the async worker running the request.
pub async fn hash_password_blocking(password: String) -> Result<String, HashingError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| HashingError(e.to_string()))?
}

/// [`verify_password`] on the blocking pool. A panicked task counts as a mismatch.
pub async fn verify_password_blocking(password: String, digest: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&password, &digest))
        .await
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let digest = hash_password("pw123456").unwrap();
        assert!(digest.starts_with("$argon2id$"));
        assert!(verify_password("pw123456", &digest));
        assert!(!verify_password("pw1234567", &digest));
    }

    #[test]
    fn same_password_gets_different_salts() {
        let a = hash_password("hunter22").unwrap();
        let b = hash_password("hunter22").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_digest_is_just_a_mismatch() {
        assert!(!verify_password("anything", ""));
        assert!(!verify_password("anything", "not-a-phc-string"));
        assert!(!verify_password("anything", "$argon2id$v=19$garbage"));
    }

    #[tokio::test]
    async fn blocking_wrappers_agree() {
        let digest = hash_password_blocking("pw123456".to_string()).await.unwrap();
        assert!(verify_password_blocking("pw123456".to_string(), digest.clone()).await);
        assert!(!verify_password_blocking("wrong".to_string(), digest).await);
    }
}
