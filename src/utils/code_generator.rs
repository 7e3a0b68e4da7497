use rand::Rng;
use rand::distributions::Alphanumeric;
use sha2::{Digest, Sha256};

const RESET_TOKEN_LEN: usize = 32;

/// 生成6位数字代码（用于 OTP）
pub fn generate_six_digit_code() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(100000..=999999))
}

/// Opaque single-use token for the emailed reset link.
pub fn generate_reset_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RESET_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Five two-digit groups joined by hyphens, e.g. `42-15-67-23-11`.
pub fn generate_ticket_number() -> String {
    let mut rng = rand::thread_rng();
    (0..5)
        .map(|_| rng.gen_range(10..=99).to_string())
        .collect::<Vec<_>>()
        .join("-")
}

/// Secrets are kept at rest only as their sha256 hex digest.
pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_six_digit_code() {
        let code = generate_six_digit_code();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));

        let code_num: u32 = code.parse().unwrap();
        assert!((100000..=999999).contains(&code_num));
    }

    #[test]
    fn test_generate_reset_token() {
        let token = generate_reset_token();
        assert_eq!(token.len(), RESET_TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, generate_reset_token());
    }

    #[test]
    fn test_generate_ticket_number_format() {
        for _ in 0..50 {
            let number = generate_ticket_number();
            let groups: Vec<&str> = number.split('-').collect();
            assert_eq!(groups.len(), 5);
            for g in groups {
                let n: u32 = g.parse().unwrap();
                assert!((10..=99).contains(&n));
            }
        }
    }

    #[test]
    fn test_hash_secret_is_stable() {
        assert_eq!(hash_secret("abc"), hash_secret("abc"));
        assert_ne!(hash_secret("abc"), hash_secret("abd"));
        assert_eq!(hash_secret("abc").len(), 64);
    }
}
