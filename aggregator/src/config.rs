use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("{0} port cannot be 0")]
    ZeroPort(&'static str),

    #[error("listener and admin listener cannot share port {0}")]
    SharedPort(u16),

    #[error("branch_timeout_ms cannot be 0")]
    ZeroBranchTimeout,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    pub listener: Listener,
    pub admin_listener: Listener,
    /// Deadline for every concurrent fan-out of a request.
    #[serde(default = "default_branch_timeout_ms")]
    pub branch_timeout_ms: u64,
    /// Base of the signed-document download links.
    pub document_base_url: Url,
}

fn default_branch_timeout_ms() -> u64 {
    10_000
}

impl Config {
    pub fn branch_timeout(&self) -> Duration {
        Duration::from_millis(self.branch_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.listener.port == 0 {
            return Err(ValidationError::ZeroPort("listener"));
        }
        if self.admin_listener.port == 0 {
            return Err(ValidationError::ZeroPort("admin_listener"));
        }
        if self.listener.port == self.admin_listener.port {
            return Err(ValidationError::SharedPort(self.listener.port));
        }
        if self.branch_timeout_ms == 0 {
            return Err(ValidationError::ZeroBranchTimeout);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Config {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_validate() {
        let config = parse(
            r#"
            listener: { host: 0.0.0.0, port: 8080 }
            admin_listener: { host: 0.0.0.0, port: 8081 }
            document_base_url: https://docs.example.org/
            "#,
        );
        assert_eq!(config.branch_timeout(), Duration::from_secs(10));
        assert_eq!(config.validate(), Ok(()));

        let shared = parse(
            r#"
            listener: { host: 0.0.0.0, port: 8080 }
            admin_listener: { host: 127.0.0.1, port: 8080 }
            document_base_url: https://docs.example.org/
            "#,
        );
        assert_eq!(shared.validate(), Err(ValidationError::SharedPort(8080)));
    }
}
