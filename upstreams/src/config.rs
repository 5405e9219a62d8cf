use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("timeout for {0} cannot be 0")]
    ZeroTimeout(&'static str),

    #[error("user cache capacity cannot be 0")]
    ZeroCacheCapacity,

    #[error("max_retries for {0} cannot exceed {max}", max = MAX_RETRIES)]
    TooManyRetries(&'static str),
}

/// Upper bound on `max_retries`, keeping the exponential backoff bounded.
pub const MAX_RETRIES: u32 = 10;

/// Connection settings for one external service.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ServiceConfig {
    pub url: Url,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retries for 429 and 5xx gateway responses, per request.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl ServiceConfig {
    pub fn new(url: Url) -> Self {
        ServiceConfig {
            url,
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct UserCacheConfig {
    pub capacity: u64,
    pub ttl_secs: u64,
}

impl Default for UserCacheConfig {
    fn default() -> Self {
        UserCacheConfig {
            capacity: 10_000,
            ttl_secs: 300,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    pub project_service: ServiceConfig,
    pub user_service: ServiceConfig,
    pub organization_service: ServiceConfig,
    /// Sent as a bearer token on every request when set.
    pub bearer_token: Option<String>,
    #[serde(default)]
    pub user_cache: UserCacheConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (name, service) in [
            ("project_service", &self.project_service),
            ("user_service", &self.user_service),
            ("organization_service", &self.organization_service),
        ] {
            if service.timeout_ms == 0 {
                return Err(ValidationError::ZeroTimeout(name));
            }
            if service.max_retries > MAX_RETRIES {
                return Err(ValidationError::TooManyRetries(name));
            }
        }
        if self.user_cache.capacity == 0 {
            return Err(ValidationError::ZeroCacheCapacity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_validation() {
        let yaml = r#"
            project_service:
                url: https://api.example.org/project-service/v1
            user_service:
                url: https://api.example.org/user-service/v1
                timeout_ms: 0
            organization_service:
                url: https://api.example.org/organization-service/v1
                max_retries: 1
        "#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.project_service.timeout_ms, 5000);
        assert_eq!(config.organization_service.max_retries, 1);
        assert_eq!(config.user_cache, UserCacheConfig::default());
        assert!(matches!(
            config.validate(),
            Err(ValidationError::ZeroTimeout("user_service"))
        ));
    }

    #[test]
    fn test_retry_count_is_bounded() {
        let url = Url::parse("https://api.example.org/").unwrap();
        let mut config = Config {
            project_service: ServiceConfig::new(url.clone()),
            user_service: ServiceConfig::new(url.clone()),
            organization_service: ServiceConfig::new(url),
            bearer_token: None,
            user_cache: UserCacheConfig::default(),
        };
        config.organization_service.max_retries = MAX_RETRIES;
        assert!(config.validate().is_ok());

        config.organization_service.max_retries = 64;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::TooManyRetries("organization_service"))
        ));
    }
}
