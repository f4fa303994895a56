use {
    crate::adapters::stripe::{StripeConfig, signature::DEFAULT_TOLERANCE_SECS},
    std::{net::SocketAddr, str::FromStr, time::Duration},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Mock provider wiring, enabled with `MOCK_PROVIDER_ENABLED=true`.
#[derive(Clone)]
pub struct MockConfig {
    pub webhook_secret: String,
}

impl std::fmt::Debug for MockConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockConfig")
            .field("webhook_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub db_max_connections: u32,
    pub provider_timeout: Duration,
    pub request_timeout: Duration,
    pub stripe: StripeConfig,
    pub mock: Option<MockConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let mock_enabled: bool = parse_or(get("MOCK_PROVIDER_ENABLED"), "MOCK_PROVIDER_ENABLED", false)?;
        let mock = if mock_enabled {
            Some(MockConfig {
                webhook_secret: required("MOCK_WEBHOOK_SECRET")?,
            })
        } else {
            None
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            bind_addr: parse_or(
                get("BIND_ADDR"),
                "BIND_ADDR",
                SocketAddr::from(([0, 0, 0, 0], 3000)),
            )?,
            db_max_connections: parse_or(get("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", 20)?,
            provider_timeout: Duration::from_secs(parse_or(
                get("PROVIDER_TIMEOUT_SECS"),
                "PROVIDER_TIMEOUT_SECS",
                10,
            )?),
            request_timeout: Duration::from_secs(parse_or(
                get("REQUEST_TIMEOUT_SECS"),
                "REQUEST_TIMEOUT_SECS",
                30,
            )?),
            stripe: StripeConfig {
                secret_key: required("STRIPE_SECRET_KEY")?,
                webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
                success_url: required("STRIPE_SUCCESS_URL")?,
                cancel_url: required("STRIPE_CANCEL_URL")?,
                signature_tolerance_secs: DEFAULT_TOLERANCE_SECS,
            },
            mock,
        })
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::collections::HashMap};

    fn base() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("STRIPE_SECRET_KEY", "sk_test_1"),
            ("STRIPE_WEBHOOK_SECRET", "whsec_1"),
            ("STRIPE_SUCCESS_URL", "https://shop.example/success"),
            ("STRIPE_CANCEL_URL", "https://shop.example/cancel"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|name| vars.get(name).map(|v| v.to_string()))
    }

    #[test]
    fn applies_defaults() {
        let config = load(&base()).unwrap();
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:3000");
        assert_eq!(config.db_max_connections, 20);
        assert_eq!(config.provider_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.mock.is_none());
        assert_eq!(config.stripe.signature_tolerance_secs, DEFAULT_TOLERANCE_SECS);
    }

    #[test]
    fn missing_required_var() {
        let mut vars = base();
        vars.remove("STRIPE_WEBHOOK_SECRET");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Missing("STRIPE_WEBHOOK_SECRET"))
        ));

        vars.insert("STRIPE_WEBHOOK_SECRET", "  ");
        assert!(matches!(load(&vars), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn rejects_unparsable_numbers() {
        let mut vars = base();
        vars.insert("PROVIDER_TIMEOUT_SECS", "ten");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { name: "PROVIDER_TIMEOUT_SECS", .. })
        ));
    }

    #[test]
    fn mock_provider_needs_its_secret() {
        let mut vars = base();
        vars.insert("MOCK_PROVIDER_ENABLED", "true");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Missing("MOCK_WEBHOOK_SECRET"))
        ));

        vars.insert("MOCK_WEBHOOK_SECRET", "mock_secret");
        let config = load(&vars).unwrap();
        assert_eq!(config.mock.unwrap().webhook_secret, "mock_secret");
    }

    #[test]
    fn debug_output_hides_secrets() {
        let rendered = format!("{:?}", load(&base()).unwrap());
        assert!(!rendered.contains("sk_test_1"));
        assert!(!rendered.contains("whsec_1"));
    }
}
