//! One-time password reset codes.

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::TimeMs;

/// Codes stop being accepted this long after they are issued.
pub const OTP_TTL_MS: i64 = 10 * 60 * 1000;

const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

/// A persisted reset code. Only its SHA-256 digest is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordResetOtp {
    pub id: i64,
    pub user_id: i64,
    pub code_hash: String,
    pub created_at: TimeMs,
    pub is_used: bool,
}

impl PasswordResetOtp {
    /// A code is expired once more than ten minutes have passed.
    pub fn is_expired(&self, now: TimeMs) -> bool {
        now.as_i64() - self.created_at.as_i64() > OTP_TTL_MS
    }
}

/// Generate a six-digit numeric code.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.gen_range(CODE_MIN..=CODE_MAX).to_string()
}

/// Digest under which a code is stored and looked up.
pub fn hash_code(code: &str) -> String {
    let digest = Sha256::digest(code.trim().as_bytes());
    hex::encode(digest)
}
