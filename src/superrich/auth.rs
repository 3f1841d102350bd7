//! Extraction of the Basic credential embedded in the Superrich site bundle.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;

use super::FetchError;

/// Matches `Authorization: "Basic <token>"` in the minified bundle.
const BASIC_AUTH_PATTERN: &str = r#"Authorization:\s*"Basic\s*([^"]+)""#;

/// Username and password for the rates API.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Finds the Base64 Basic authorization token in the JavaScript source.
pub fn extract_basic_auth(js_content: &str) -> Result<String, FetchError> {
    let pattern = Regex::new(BASIC_AUTH_PATTERN)?;
    pattern
        .captures(js_content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_owned())
        .filter(|token| !token.is_empty())
        .ok_or(FetchError::AuthNotFound)
}

/// Decodes a Base64 `username:password` token.
pub fn decode_basic_auth(encoded: &str) -> Result<Credentials, FetchError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| FetchError::InvalidAuth(e.to_string()))?;
    let decoded = String::from_utf8(bytes).map_err(|e| FetchError::InvalidAuth(e.to_string()))?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| FetchError::InvalidAuth("missing ':' separator".to_owned()))?;

    if username.is_empty() || password.is_empty() {
        return Err(FetchError::InvalidAuth("empty username or password".to_owned()));
    }

    Ok(Credentials {
        username: username.to_owned(),
        password: password.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_basic_auth() {
        let js = r#"var a=1;headers:{Authorization:"Basic c3VwZXI6cmljaA==","Content-Type":"x"}"#;
        assert_eq!(extract_basic_auth(js).unwrap(), "c3VwZXI6cmljaA==");
    }

    #[test]
    fn test_extract_basic_auth_with_spacing() {
        let js = r#"Authorization:   "Basic   dXNlcjpwYXNz""#;
        assert_eq!(extract_basic_auth(js).unwrap(), "dXNlcjpwYXNz");
    }

    #[test]
    fn test_extract_basic_auth_missing() {
        let js = r#"Authorization:"Bearer abc""#;
        assert!(matches!(extract_basic_auth(js), Err(FetchError::AuthNotFound)));
    }

    #[test]
    fn test_decode_basic_auth() {
        let creds = decode_basic_auth("c3VwZXI6cmljaA==").unwrap();
        assert_eq!(creds.username, "super");
        assert_eq!(creds.password, "rich");
    }

    #[test]
    fn test_decode_keeps_colons_in_password() {
        // "user:pa:ss"
        let creds = decode_basic_auth("dXNlcjpwYTpzcw==").unwrap();
        assert_eq!(creds.username, "user");
        assert_eq!(creds.password, "pa:ss");
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(matches!(decode_basic_auth("%%%"), Err(FetchError::InvalidAuth(_))));
        // "nocolon"
        assert!(matches!(decode_basic_auth("bm9jb2xvbg=="), Err(FetchError::InvalidAuth(_))));
    }

    #[test]
    fn test_debug_hides_password() {
        let creds = Credentials {
            username: "super".to_owned(),
            password: "rich".to_owned(),
        };
        assert!(!format!("{creds:?}").contains("rich"));
    }
}
