//! Configuration, built from environment variables.

use secrecy::SecretString;

use crate::error::ConfigError;

/// IMAP mailbox configuration.
///
/// Host, port, and TLS behavior have defaults matching the QQ mail
/// endpoint; username and password are required.
#[derive(Debug, Clone)]
pub struct MailboxConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    /// Skip TLS certificate verification. Defaults to true because the
    /// upstream provider's IMAP endpoint presents a certificate that does
    /// not validate against webpki roots.
    pub accept_invalid_certs: bool,
    /// Mailbox to select, normally "INBOX".
    pub mailbox: String,
    /// Domain appended to alias prefixes to form the full address.
    pub domain: String,
}

impl MailboxConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host =
            std::env::var("MAILCODE_IMAP_HOST").unwrap_or_else(|_| "imap.qq.com".to_string());

        let port: u16 = std::env::var("MAILCODE_IMAP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(993);

        let username = std::env::var("MAILCODE_IMAP_USER")
            .map_err(|_| ConfigError::MissingEnvVar("MAILCODE_IMAP_USER".into()))?;

        let password = std::env::var("MAILCODE_IMAP_PASSWORD")
            .map(SecretString::from)
            .map_err(|_| ConfigError::MissingEnvVar("MAILCODE_IMAP_PASSWORD".into()))?;

        let accept_invalid_certs = std::env::var("MAILCODE_ACCEPT_INVALID_CERTS")
            .map(|s| parse_bool(&s))
            .unwrap_or(true);

        let mailbox = std::env::var("MAILCODE_MAILBOX").unwrap_or_else(|_| "INBOX".to_string());

        let domain = std::env::var("MAILCODE_DOMAIN").unwrap_or_else(|_| "qq.com".to_string());

        Ok(Self {
            host,
            port,
            username,
            password,
            accept_invalid_certs,
            mailbox,
            domain,
        })
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_port: u16,
    pub db_path: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let http_port: u16 = std::env::var("MAILCODE_HTTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);

        let db_path = std::env::var("MAILCODE_DB_PATH")
            .unwrap_or_else(|_| "./data/mailcode.db".to_string());

        Self { http_port, db_path }
    }
}

fn parse_bool(s: &str) -> bool {
    !matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_forms() {
        assert!(parse_bool("true"));
        assert!(parse_bool("1"));
        assert!(parse_bool("yes"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("No"));
        assert!(!parse_bool(" off "));
    }
}
