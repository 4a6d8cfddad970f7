use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, SnowRsError};

/// Credentials used to create a connection.
/// Values are passed to the driver as-is; nothing is validated here.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    pub account: String,
    pub username: String,
    pub password: String,
}

impl ConnectionConfig {
    pub fn new(
        account: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Parse credentials from TOML text with `account`, `username` and `password` keys.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| SnowRsError::InvalidConfig(e.to_string()))
    }

    /// Read credentials from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SnowRsError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("account", &self.account)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_from_toml_str() {
        let config = ConnectionConfig::from_toml_str(
            r#"
            account = "acct1"
            username = "u"
            password = "p"
            "#,
        )
        .unwrap();
        assert_eq!(config, ConnectionConfig::new("acct1", "u", "p"));
    }

    #[test]
    fn test_from_toml_str_missing_field() {
        let err = ConnectionConfig::from_toml_str("account = \"acct1\"").unwrap_err();
        assert!(matches!(err, SnowRsError::InvalidConfig(_)));
    }

    #[test]
    fn test_empty_values_are_not_validated() {
        let config =
            ConnectionConfig::from_toml_str("account = \"\"\nusername = \"\"\npassword = \"\"")
                .unwrap();
        assert!(config.account.is_empty());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "account = \"acct1\"").unwrap();
        writeln!(file, "username = \"u\"").unwrap();
        writeln!(file, "password = \"p\"").unwrap();

        let config = ConnectionConfig::from_file(file.path()).unwrap();
        assert_eq!(config.account, "acct1");
        assert_eq!(config.username, "u");
        assert_eq!(config.password, "p");
    }

    #[test]
    fn test_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConnectionConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, SnowRsError::InvalidConfig(_)));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ConnectionConfig::new("acct1", "u", "hunter2");
        let debug = format!("{:?}", config);
        assert!(debug.contains("acct1"));
        assert!(!debug.contains("hunter2"));
    }
}
