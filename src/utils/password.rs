use bcrypt::{hash, verify};
use crate::error::{AppError, AppResult};

pub const MIN_PASSWORD_LEN: usize = 6;

/// 验证密码长度
pub fn validate_password(password: &str) -> AppResult<()> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=128).contains(&len) {
        return Err(AppError::ValidationError(format!(
            "Password must be between {MIN_PASSWORD_LEN} and 128 characters"
        )));
    }
    Ok(())
}

/// 对密码进行哈希
pub fn hash_password(password: &str, cost: u32) -> AppResult<String> {
    hash(password, cost)
        .map_err(|e| AppError::InternalError(format!("Password hashing failed: {e}")))
}

/// 验证密码
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    verify(password, hash)
        .map_err(|e| AppError::InternalError(format!("Password verification failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_password() {
        assert!(validate_password("user123").is_ok());
        assert!(validate_password("Passw0rd1").is_ok());
        assert!(validate_password("12345").is_err()); // 太短
        assert!(validate_password(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_hash_and_verify_password() {
        let password = "Passw0rd1";
        let hashed = hash_password(password, 4).unwrap();

        assert_ne!(hashed, password);
        assert!(verify_password(password, &hashed).unwrap());
        assert!(!verify_password("WrongPassword", &hashed).unwrap());
    }
}
