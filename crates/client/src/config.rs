use std::env;

/// Cluster connection configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EsConfig {
    /// Base URL of the cluster, e.g. `http://localhost:9200`.
    pub url: String,
    /// Basic-auth username, if the cluster requires one.
    pub username: Option<String>,
    /// Basic-auth password.
    pub password: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl EsConfig {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        Self {
            url: env::var("ES_URL").unwrap_or_else(|_| "http://localhost:9200".to_string()),
            username: env::var("ES_USERNAME").ok(),
            password: env::var("ES_PASSWORD").ok(),
            timeout_secs: env::var("ES_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .expect("ES_TIMEOUT_SECS must be a valid u64"),
        }
    }

    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            timeout_secs: 30,
        }
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_defaults_to_anonymous_thirty_second_timeout() {
        let config = EsConfig::new("http://es:9200");
        assert_eq!(config.url, "http://es:9200");
        assert!(config.username.is_none());
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn basic_auth_sets_both_credentials() {
        let config = EsConfig::new("http://es:9200").basic_auth("elastic", "changeme");
        assert_eq!(config.username.as_deref(), Some("elastic"));
        assert_eq!(config.password.as_deref(), Some("changeme"));
    }
}
