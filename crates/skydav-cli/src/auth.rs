//! HTTP Basic credentials

use base64::{engine::general_purpose, Engine as _};

/// User name and password from an `Authorization: Basic` header
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Decode the credentials of a Basic Authorization header
pub fn extract_basic_credentials(auth_header: &str) -> Option<Credentials> {
    let encoded = auth_header
        .strip_prefix("Basic ")
        .or_else(|| auth_header.strip_prefix("basic "))?;
    let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    if username.is_empty() {
        return None;
    }
    Some(Credentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(raw: &str) -> String {
        format!("Basic {}", general_purpose::STANDARD.encode(raw))
    }

    #[test]
    fn test_extract_basic_credentials() {
        let creds = extract_basic_credentials(&basic("test;tester:testing")).unwrap();
        assert_eq!(creds.username, "test;tester");
        assert_eq!(creds.password, "testing");

        // only the first colon separates
        let creds = extract_basic_credentials(&basic("user:pa:ss")).unwrap();
        assert_eq!(creds.password, "pa:ss");
    }

    #[test]
    fn test_rejects_malformed_headers() {
        assert!(extract_basic_credentials("Bearer abc123").is_none());
        assert!(extract_basic_credentials("Basic !!!").is_none());
        assert!(extract_basic_credentials(&basic("no-colon")).is_none());
        assert!(extract_basic_credentials(&basic(":secret")).is_none());
    }

    #[test]
    fn test_debug_hides_password() {
        let creds = extract_basic_credentials(&basic("user:secret")).unwrap();
        assert!(!format!("{:?}", creds).contains("secret"));
    }
}
