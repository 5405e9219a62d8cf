use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct TokenBody {
    // key of the last item evaluated by the previous page
    last_key: String,
}

/// Opaque pagination token handed back to scan callers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageToken(String);

impl PageToken {
    pub fn from_last_key(last_key: &str) -> Self {
        let body = TokenBody {
            last_key: last_key.to_string(),
        };
        // Serializing a single string field cannot fail.
        let json = serde_json::to_vec(&body).unwrap_or_default();
        PageToken(STANDARD.encode(json))
    }

    pub fn last_key(&self) -> Result<String, PageTokenError> {
        let decoded = STANDARD.decode(self.0.as_bytes())?;
        let body: TokenBody = serde_json::from_slice(&decoded)?;
        Ok(body.last_key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PageToken {
    type Err = PageTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = PageToken(s.to_string());
        token.last_key()?;
        Ok(token)
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PageTokenError {
    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_parse() {
        let encoded = STANDARD.encode(r#"{"last_key":"company#42"}"#);
        let token: PageToken = encoded.parse().unwrap();
        assert_eq!(token.last_key().unwrap(), "company#42");
        assert_eq!(token, PageToken::from_last_key("company#42"));
    }

    #[test]
    fn test_invalid_base64() {
        let result: Result<PageToken, _> = "not base64!".parse();
        assert!(matches!(result, Err(PageTokenError::Base64(_))));
    }

    #[test]
    fn test_invalid_json() {
        let encoded = STANDARD.encode("{\"cursor\": 1}");
        let result: Result<PageToken, _> = encoded.parse();
        assert!(matches!(result, Err(PageTokenError::Json(_))));
    }
}
