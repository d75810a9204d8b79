use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Redis connection string for the job store. Unset means in-memory only.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Largest accepted upload, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Expiry of job records in Redis, in seconds.
    #[serde(default = "default_job_ttl_secs")]
    pub job_ttl_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_job_ttl_secs() -> u64 {
    24 * 60 * 60
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Redis URL, treating an empty value as unset.
    pub fn redis_url(&self) -> Option<&str> {
        self.redis_url.as_deref().filter(|url| !url.trim().is_empty())
    }

    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_when_unset() {
        let config: AppConfig = envy::from_iter(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.job_ttl(), Duration::from_secs(86_400));
        assert!(config.redis_url().is_none());
    }

    #[test]
    fn test_values_are_read_from_environment_pairs() {
        let config: AppConfig = envy::from_iter(vec![
            ("BIND_ADDR".to_string(), "127.0.0.1:8080".to_string()),
            ("REDIS_URL".to_string(), "redis://localhost:6379".to_string()),
            ("MAX_UPLOAD_BYTES".to_string(), "1024".to_string()),
        ])
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.redis_url(), Some("redis://localhost:6379"));
        assert_eq!(config.max_upload_bytes, 1024);
    }

    #[test]
    fn test_blank_redis_url_means_in_memory() {
        let config: AppConfig =
            envy::from_iter(vec![("REDIS_URL".to_string(), "  ".to_string())]).unwrap();
        assert!(config.redis_url().is_none());
    }
}
