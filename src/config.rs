use std::collections::HashMap;
use thiserror::Error;

/// Shortest accepted HS256 signing secret, in bytes.
pub const MIN_JWT_SECRET_LEN: usize = 16;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub mail_from: String,
    /// Emails that are granted superuser rights on registration.
    pub superuser_emails: Vec<String>,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = parse_or(&env_map, "PORT", 8080u16, "must be a valid u16")?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let jwt_secret = env_map
            .get("JWT_SECRET")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("JWT_SECRET".to_string()))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::InvalidValue(
                "JWT_SECRET".to_string(),
                format!("must be at least {} bytes", MIN_JWT_SECRET_LEN),
            ));
        }

        let access_token_ttl_secs =
            parse_or(&env_map, "ACCESS_TOKEN_TTL_SECS", 300i64, "must be a valid i64")?;
        let refresh_token_ttl_secs =
            parse_or(&env_map, "REFRESH_TOKEN_TTL_SECS", 86_400i64, "must be a valid i64")?;
        if access_token_ttl_secs <= 0 || refresh_token_ttl_secs <= 0 {
            return Err(ConfigError::InvalidValue(
                "TOKEN_TTL".to_string(),
                "token lifetimes must be positive".to_string(),
            ));
        }

        let mail_from = env_map
            .get("MAIL_FROM")
            .cloned()
            .unwrap_or_else(|| "noreply@tradejournal.local".to_string());

        let superuser_emails = env_map
            .get("SUPERUSER_EMAILS")
            .map(|s| {
                s.split(',')
                    .map(|e| e.trim().to_lowercase())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let argon2_memory_kib =
            parse_or(&env_map, "ARGON2_MEMORY_KIB", 19_456u32, "must be a valid u32")?;
        let argon2_iterations =
            parse_or(&env_map, "ARGON2_ITERATIONS", 2u32, "must be a valid u32")?;

        Ok(Config {
            port,
            database_path,
            jwt_secret,
            access_token_ttl_secs,
            refresh_token_ttl_secs,
            mail_from,
            superuser_emails,
            argon2_memory_kib,
            argon2_iterations,
        })
    }

    pub fn is_superuser_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.superuser_emails.iter().any(|e| *e == email)
    }
}

fn parse_or<T: std::str::FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: T,
    expectation: &str,
) -> Result<T, ConfigError> {
    match env_map.get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), expectation.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/journal.db".to_string());
        map.insert(
            "JWT_SECRET".to_string(),
            "0123456789abcdef0123456789abcdef".to_string(),
        );
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.access_token_ttl_secs, 300);
        assert_eq!(config.refresh_token_ttl_secs, 86_400);
        assert_eq!(config.mail_from, "noreply@tradejournal.local");
        assert!(config.superuser_emails.is_empty());
        assert_eq!(config.argon2_memory_kib, 19_456);
        assert_eq!(config.argon2_iterations, 2);
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        match Config::from_env_map(env_map) {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_missing_jwt_secret() {
        let mut env_map = setup_required_env();
        env_map.remove("JWT_SECRET");
        match Config::from_env_map(env_map) {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "JWT_SECRET"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_short_jwt_secret() {
        let mut env_map = setup_required_env();
        env_map.insert("JWT_SECRET".to_string(), "short".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "JWT_SECRET"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_non_positive_ttl() {
        let mut env_map = setup_required_env();
        env_map.insert("ACCESS_TOKEN_TTL_SECS".to_string(), "0".to_string());
        assert!(matches!(
            Config::from_env_map(env_map),
            Err(ConfigError::InvalidValue(_, _))
        ));
    }

    #[test]
    fn test_superuser_emails_are_normalized() {
        let mut env_map = setup_required_env();
        env_map.insert(
            "SUPERUSER_EMAILS".to_string(),
            " Admin@Example.com, ,ops@example.com".to_string(),
        );
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(
            config.superuser_emails,
            vec!["admin@example.com".to_string(), "ops@example.com".to_string()]
        );
        assert!(config.is_superuser_email("ADMIN@example.com"));
        assert!(!config.is_superuser_email("someone@example.com"));
    }
}
