use rand::{distr::Alphanumeric, Rng};
use std::time::Duration;

/// How operator-supplied SSID names end up in the `Called-Station-Id` pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SsidMatchMode {
    /// Names are matched literally (regex metacharacters escaped)
    Literal,
    /// Names are inserted verbatim as regex fragments
    Regex,
}

impl SsidMatchMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "literal" => Some(SsidMatchMode::Literal),
            "regex" => Some(SsidMatchMode::Regex),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_expiry_secs: i64,
    pub stats_cache_ttl: Duration,
    pub frontend_dir: String,
    pub ssid_match_mode: SsidMatchMode,
    pub bootstrap_admin: Option<(String, String)>,
    pub freeradius_service: String,
}

impl Config {
    /// Read the process environment. Every key has a default except the
    /// bootstrap admin, which is only set up when both variables are present.
    pub fn from_env() -> Self {
        let database_url = env_or("DATABASE_URL", "sqlite:./data/radius_admin.db");
        let port = env_parse("PORT", 3000);

        let jwt_secret = match std::env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!("JWT_SECRET not set, generating an ephemeral secret (tokens will not survive a restart)");
                rand::rng()
                    .sample_iter(&Alphanumeric)
                    .take(48)
                    .map(char::from)
                    .collect()
            }
        };

        let ssid_match_mode = match std::env::var("SSID_MATCH_MODE") {
            Ok(raw) => SsidMatchMode::parse(&raw).unwrap_or_else(|| {
                tracing::warn!("Unknown SSID_MATCH_MODE '{}', using literal", raw);
                SsidMatchMode::Literal
            }),
            Err(_) => SsidMatchMode::Literal,
        };

        let bootstrap_admin = match (std::env::var("ADMIN_USERNAME"), std::env::var("ADMIN_PASSWORD")) {
            (Ok(user), Ok(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        };

        Config {
            database_url,
            port,
            jwt_secret,
            jwt_expiry_secs: env_parse("JWT_EXPIRY_SECS", 3600),
            stats_cache_ttl: Duration::from_secs(env_parse("STATS_CACHE_TTL_SECS", 30)),
            frontend_dir: env_or("FRONTEND_DIR", "../frontend/dist"),
            ssid_match_mode,
            bootstrap_admin,
            freeradius_service: env_or("FREERADIUS_SERVICE", "freeradius"),
        }
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            database_url: "sqlite::memory:".into(),
            port: 0,
            jwt_secret: "test-secret".into(),
            jwt_expiry_secs: 3600,
            stats_cache_ttl: Duration::from_secs(30),
            frontend_dir: "./does-not-exist".into(),
            ssid_match_mode: SsidMatchMode::Literal,
            bootstrap_admin: None,
            freeradius_service: "freeradius".into(),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparsable {}='{}'", key, raw);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssid_mode_parsing() {
        assert_eq!(SsidMatchMode::parse("Literal"), Some(SsidMatchMode::Literal));
        assert_eq!(SsidMatchMode::parse(" regex "), Some(SsidMatchMode::Regex));
        assert_eq!(SsidMatchMode::parse("glob"), None);
    }
}
