// src/auth.rs
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::AppError;

// --- 密码处理 (Argon2) ---

/// 生成带随机盐的密码哈希，明文不落库
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?
        .to_string();
    Ok(password_hash)
}

/// 哈希不存在或解析失败都视为不匹配，不抛错
pub fn verify_password(password: &str, password_hash: Option<&str>) -> bool {
    let Some(password_hash) = password_hash else {
        return false;
    };
    let parsed_hash = match PasswordHash::new(password_hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_round_trips_and_rejects_wrong_password() {
        let hash = hash_password("hunter22").unwrap();
        assert_ne!(hash, "hunter22");
        assert!(verify_password("hunter22", Some(&hash)));
        assert!(!verify_password("hunter23", Some(&hash)));
    }

    #[test]
    fn missing_or_garbage_hash_never_verifies() {
        assert!(!verify_password("anything", None));
        assert!(!verify_password("", None));
        assert!(!verify_password("anything", Some("not-a-phc-string")));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("pw").unwrap();
        let b = hash_password("pw").unwrap();
        assert_ne!(a, b);
    }
}
