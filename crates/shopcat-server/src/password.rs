//! Argon2id password hashing. Hashes are stored as PHC strings, which carry
//! their own salt and parameters.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hashes `password` under a fresh random salt.
///
/// # Errors
///
/// Returns [`argon2::password_hash::Error`] if hashing fails.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

/// `false` for a wrong password or an unparseable stored hash.
#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Runs hashing on the blocking pool; Argon2 is CPU-bound.
pub async fn hash_password_blocking(password: String) -> anyhow::Result<String> {
    let hash = tokio::task::spawn_blocking(move || hash_password(&password)).await?;
    hash.map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))
}

/// Verification counterpart of [`hash_password_blocking`].
pub async fn verify_password_blocking(password: String, stored: String) -> anyhow::Result<bool> {
    Ok(tokio::task::spawn_blocking(move || verify_password(&password, &stored)).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_a_salted_argon2id_phc_string() {
        let first = hash_password("hunter22").unwrap();
        let second = hash_password("hunter22").unwrap();
        assert!(first.starts_with("$argon2id$"), "{first}");
        assert_ne!(first, second);
    }

    #[test]
    fn verifies_only_the_original_password() {
        let stored = hash_password("hunter22").unwrap();
        assert!(verify_password("hunter22", &stored));
        assert!(!verify_password("hunter23", &stored));
    }

    #[test]
    fn malformed_stored_hash_never_verifies() {
        assert!(!verify_password("hunter22", ""));
        assert!(!verify_password("hunter22", "5e884898da28047151d0e56f8dc62927"));
    }

    #[tokio::test]
    async fn blocking_wrappers_round_trip() {
        let stored = hash_password_blocking("correct horse".to_owned()).await.unwrap();
        assert!(verify_password_blocking("correct horse".to_owned(), stored.clone())
            .await
            .unwrap());
        assert!(!verify_password_blocking("wrong horse".to_owned(), stored)
            .await
            .unwrap());
    }
}
