use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite connection string, e.g. "sqlite:./linkdash.db"
    pub database_url: String,

    /// Host to bind the HTTP server to, e.g. "0.0.0.0"
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Public base URL used when generating short links, e.g. "https://go.example.com"
    /// Must NOT have a trailing slash.
    pub base_url: String,

    /// Size of the SQLite connection pool
    pub db_max_connections: u32,

    /// Upper bound on click increments running in the background at once
    pub max_pending_clicks: u32,
}

impl AppConfig {
    /// Load configuration from environment variables (populated by dotenvy before this is called).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = var("PORT")
            .unwrap_or_else(|| "3000".into())
            .parse::<u16>()
            .context("PORT must be a valid port number (1–65535)")?;

        let base_url = var("BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_owned();

        let db_max_connections = var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".into())
            .parse::<u32>()
            .context("DB_MAX_CONNECTIONS must be a positive integer")?;
        if db_max_connections == 0 {
            anyhow::bail!("DB_MAX_CONNECTIONS must be at least 1");
        }

        let max_pending_clicks = var("MAX_PENDING_CLICKS")
            .unwrap_or_else(|| "1024".into())
            .parse::<u32>()
            .context("MAX_PENDING_CLICKS must be a positive integer")?;
        if max_pending_clicks == 0 {
            anyhow::bail!("MAX_PENDING_CLICKS must be at least 1");
        }

        Ok(Self {
            database_url: var("DATABASE_URL").unwrap_or_else(|| "sqlite:./linkdash.db".into()),
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            base_url,
            db_max_connections,
            max_pending_clicks,
        })
    }

    /// "host:port" string handed to the TCP listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = load(&[]).unwrap();
        assert_eq!(config.database_url, "sqlite:./linkdash.db");
        assert_eq!(config.port, 3000);
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
        assert_eq!(config.db_max_connections, 10);
        assert_eq!(config.max_pending_clicks, 1024);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = load(&[("BASE_URL", "https://go.example.com/")]).unwrap();
        assert_eq!(config.base_url, "https://go.example.com");
    }

    #[test]
    fn invalid_port_is_rejected() {
        assert!(load(&[("PORT", "seventy")]).is_err());
        assert!(load(&[("PORT", "70000")]).is_err());
    }

    #[test]
    fn zero_sized_pools_are_rejected() {
        assert!(load(&[("DB_MAX_CONNECTIONS", "0")]).is_err());
        assert!(load(&[("MAX_PENDING_CLICKS", "0")]).is_err());
    }
}
