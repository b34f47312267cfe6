// src/users.rs
use crate::auth::{hash_password, verify_password};
use crate::models::{now_millis, User};
use crate::store::Store;
use crate::AppError;

/// 注册用户；密码可选（空字符串视为未设置）
pub async fn create_user(
    store: &dyn Store,
    username: &str,
    password: Option<&str>,
) -> Result<User, AppError> {
    let password_hash = match password.filter(|p| !p.is_empty()) {
        Some(p) => Some(hash_password(p)?),
        None => None,
    };

    let now = now_millis();
    let user = store
        .insert_user(&User {
            username: username.to_owned(),
            created_date: now,
            updated_date: now,
            password_hash,
        })
        .await?;

    tracing::info!(username = %user.username, protected = user.password_hash.is_some(), "user created");
    Ok(user)
}

pub async fn get_user(store: &dyn Store, username: &str) -> Result<User, AppError> {
    store
        .find_user(username)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// 用户不存在、未设置密码或密码不匹配都返回 false，而不是错误
pub async fn verify_credentials(
    store: &dyn Store,
    username: &str,
    password: &str,
) -> Result<bool, AppError> {
    let Some(user) = store.find_user(username).await? else {
        return Ok(false);
    };
    Ok(verify_password(password, user.password_hash.as_deref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let store = MemoryStore::new();
        create_user(&store, "amy", None).await.unwrap();

        let err = create_user(&store, "amy", Some("pw")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn password_is_stored_hashed() {
        let store = MemoryStore::new();
        let user = create_user(&store, "bob", Some("secret")).await.unwrap();

        let hash = user.password_hash.unwrap();
        assert!(!hash.contains("secret"));
        assert!(verify_credentials(&store, "bob", "secret").await.unwrap());
        assert!(!verify_credentials(&store, "bob", "Secret").await.unwrap());
    }

    #[tokio::test]
    async fn passwordless_and_unknown_users_never_verify() {
        let store = MemoryStore::new();
        create_user(&store, "amy", Some("")).await.unwrap();

        let amy = get_user(&store, "amy").await.unwrap();
        assert!(amy.password_hash.is_none());
        assert!(!verify_credentials(&store, "amy", "").await.unwrap());
        assert!(!verify_credentials(&store, "amy", "guess").await.unwrap());
        assert!(!verify_credentials(&store, "nobody", "guess").await.unwrap());
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let store = MemoryStore::new();
        let err = get_user(&store, "ghost").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
