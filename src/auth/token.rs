//! HS256 access and refresh tokens.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::TimeMs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id, as a decimal string.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub typ: TokenKind,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, TokenError> {
        self.sub.parse::<i64>().map_err(|_| TokenError::Invalid)
    }

    pub fn expires_at(&self) -> TimeMs {
        TimeMs::new(self.exp.saturating_mul(1000))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("expected a {expected:?} token")]
    WrongKind { expected: TokenKind },
    #[error("token encoding failed: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
}

pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenIssuer {
    pub fn new(secret: &str, access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.jwt_secret,
            config.access_token_ttl_secs,
            config.refresh_token_ttl_secs,
        )
    }

    /// Sign a token of `kind` for `user_id`, returning it with its claims.
    pub fn issue(&self, user_id: i64, kind: TokenKind) -> Result<(String, Claims), TokenError> {
        let iat = TimeMs::now().as_i64() / 1000;
        let ttl = match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => self.refresh_ttl_secs,
        };
        let claims = Claims {
            sub: user_id.to_string(),
            iat,
            exp: iat + ttl,
            jti: Uuid::new_v4().to_string(),
            typ: kind,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok((token, claims))
    }

    pub fn issue_pair(&self, user_id: i64) -> Result<TokenPair, TokenError> {
        let (access_token, _) = self.issue(user_id, TokenKind::Access)?;
        let (refresh_token, _) = self.issue(user_id, TokenKind::Refresh)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Check signature and expiry of a token of either kind.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| TokenError::Invalid)
    }

    /// Like `verify`, additionally requiring the token to be of `expected` kind.
    pub fn decode(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let claims = self.verify(token)?;
        if claims.typ != expected {
            return Err(TokenError::WrongKind { expected });
        }
        Ok(claims)
    }
}
