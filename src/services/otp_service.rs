use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};
use crate::external::Notification;
use crate::models::*;
use crate::services::AccountService;
use crate::utils::{generate_six_digit_code, hash_secret, validate_password};

/// Alternate reset channel: a six digit code sent out of band, kept in memory only.
#[derive(Clone)]
pub struct OtpService {
    account_service: AccountService,
    ttl_seconds: i64,
    codes: Arc<RwLock<HashMap<String, OtpEntry>>>,
}

impl OtpService {
    pub fn new(account_service: AccountService, ttl_seconds: i64) -> Self {
        Self {
            account_service,
            ttl_seconds,
            codes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 发送验证码
    pub async fn send_otp(&self, email: &str) -> AppResult<SendOtpResponse> {
        if !self.account_service.user_exists(email).await {
            return Err(AppError::AccountNotFound);
        }

        let code = generate_six_digit_code();
        let expires_at = Utc::now() + Duration::seconds(self.ttl_seconds);

        // 先发送再保存，发送失败时不留下无法使用的验证码
        self.account_service
            .notifier()
            .send(Notification {
                to: email.to_string(),
                subject: "Your password reset code".to_string(),
                body: format!(
                    "Your verification code is {code}. It is valid for {} minutes.",
                    self.ttl_seconds / 60
                ),
                secret: Some(code.clone()),
            })
            .await?;

        self.codes.write().await.insert(
            email.to_string(),
            OtpEntry {
                code_hash: hash_secret(&code),
                expires_at,
            },
        );
        log::info!("OTP issued for {email}");

        Ok(SendOtpResponse {
            expires_in: self.ttl_seconds,
        })
    }

    /// 验证码校验并重置密码
    ///
    /// The code is taken out under the write lock before the password changes, so
    /// concurrent requests with the same code see at most one success.
    pub async fn verify_otp(&self, request: VerifyOtpRequest) -> AppResult<()> {
        // 密码不合格时保留验证码
        validate_password(&request.new_password)?;

        let entry = {
            let mut codes = self.codes.write().await;
            let entry = codes.get(&request.email).ok_or(AppError::InvalidOtp)?;
            if entry.code_hash != hash_secret(request.otp.trim()) || Utc::now() > entry.expires_at
            {
                return Err(AppError::InvalidOtp);
            }
            codes.remove(&request.email).ok_or(AppError::InvalidOtp)?
        };

        if let Err(e) = self
            .account_service
            .set_password(&request.email, &request.new_password)
            .await
        {
            // 写入失败时归还验证码，除非期间已经发出新的
            self.codes
                .write()
                .await
                .entry(request.email.clone())
                .or_insert(entry);
            return Err(e);
        }

        log::info!("Password reset via OTP for {}", request.email);
        Ok(())
    }

    /// Drops expired codes. Returns how many were removed.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut codes = self.codes.write().await;
        let before = codes.len();
        codes.retain(|_, entry| now <= entry.expires_at);
        before - codes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;
    use crate::external::Notifier;
    use crate::storage::MemoryStore;
    use crate::utils::JwtService;

    fn otp_service(ttl: i64) -> OtpService {
        let accounts = AccountService::load(
            Arc::new(MemoryStore::new()),
            JwtService::new("test-secret", 3600, 7200),
            Notifier::outbox(),
            SecurityConfig {
                bcrypt_cost: 4,
                ..SecurityConfig::default()
            },
            true,
        )
        .unwrap();
        OtpService::new(accounts, ttl)
    }

    fn sent_code(svc: &OtpService, email: &str) -> String {
        svc.account_service
            .notifier()
            .last_sent_to(email)
            .unwrap()
            .secret
            .unwrap()
    }

    fn verify(email: &str, otp: &str, new_password: &str) -> VerifyOtpRequest {
        VerifyOtpRequest {
            email: email.into(),
            otp: otp.into(),
            new_password: new_password.into(),
        }
    }

    async fn can_login(svc: &OtpService, email: &str, password: &str) -> bool {
        svc.account_service
            .login(LoginRequest {
                email: email.into(),
                password: password.into(),
            })
            .await
            .is_ok()
    }

    #[tokio::test]
    async fn test_send_otp_unknown_account() {
        let svc = otp_service(600);
        let err = svc.send_otp("ghost@x.com").await.unwrap_err();
        assert!(matches!(err, AppError::AccountNotFound));
    }

    #[tokio::test]
    async fn test_verify_otp_resets_password_once() {
        let svc = otp_service(600);
        let resp = svc.send_otp("user@example.com").await.unwrap();
        assert_eq!(resp.expires_in, 600);

        let code = sent_code(&svc, "user@example.com");
        assert_eq!(code.len(), 6);

        svc.verify_otp(verify("user@example.com", &code, "fresh-pass"))
            .await
            .unwrap();
        assert!(can_login(&svc, "user@example.com", "fresh-pass").await);
        assert!(!can_login(&svc, "user@example.com", "user123").await);

        // 验证码只能使用一次
        let err = svc
            .verify_otp(verify("user@example.com", &code, "other-pass"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidOtp));
    }

    #[tokio::test]
    async fn test_verify_otp_rejects_missing_or_wrong_code() {
        let svc = otp_service(600);
        let err = svc
            .verify_otp(verify("user@example.com", "123456", "fresh-pass"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidOtp));

        svc.send_otp("user@example.com").await.unwrap();
        let code = sent_code(&svc, "user@example.com");
        let wrong = if code == "000000" { "111111" } else { "000000" };
        let err = svc
            .verify_otp(verify("user@example.com", wrong, "fresh-pass"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidOtp));
        assert!(can_login(&svc, "user@example.com", "user123").await);
    }

    #[tokio::test]
    async fn test_short_password_keeps_code() {
        let svc = otp_service(600);
        svc.send_otp("user@example.com").await.unwrap();
        let code = sent_code(&svc, "user@example.com");

        let err = svc
            .verify_otp(verify("user@example.com", &code, "123"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(
            svc.verify_otp(verify("user@example.com", &code, "fresh-pass"))
                .await
                .is_ok()
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_verify_uses_code_once() {
        let svc = otp_service(600);
        for round in 0..5 {
            svc.send_otp("user@example.com").await.unwrap();
            let code = sent_code(&svc, "user@example.com");

            let handles: Vec<_> = (0..4)
                .map(|i| {
                    let svc = svc.clone();
                    let request = verify("user@example.com", &code, &format!("pass-{round}-{i}"));
                    tokio::spawn(async move { svc.verify_otp(request).await })
                })
                .collect();

            let mut succeeded = 0;
            for handle in handles {
                match handle.await.unwrap() {
                    Ok(()) => succeeded += 1,
                    Err(e) => assert!(matches!(e, AppError::InvalidOtp)),
                }
            }
            assert_eq!(succeeded, 1, "round {round}");
        }
    }

    #[tokio::test]
    async fn test_expired_code_is_rejected_and_purged() {
        let svc = otp_service(-1);
        svc.send_otp("user@example.com").await.unwrap();
        let code = sent_code(&svc, "user@example.com");

        let err = svc
            .verify_otp(verify("user@example.com", &code, "fresh-pass"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidOtp));
        assert_eq!(svc.purge_expired(Utc::now()).await, 1);
    }
}
