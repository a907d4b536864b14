//! Configuration loading and environment variable interpolation

use crate::error::{Error, Result};
use regex::Regex;
use std::env;
use std::fs;
use std::path::Path;

use super::Config;

const CONFIG_FILENAME: &str = "gatekeeper.toml";

/// Load configuration from gatekeeper.toml
pub fn load_config() -> Result<Config> {
    let config_path = find_config_file()?;
    load_config_from_path(&config_path)
}

/// Load configuration from a specific path
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path).map_err(|_| Error::ConfigNotFound)?;
    let content = interpolate_env_vars(&content);
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Find the configuration file, searching upward from current directory
fn find_config_file() -> Result<std::path::PathBuf> {
    let mut current = env::current_dir().map_err(|e| Error::Config(e.to_string()))?;

    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.exists() {
            return Ok(config_path);
        }

        if !current.pop() {
            return Err(Error::ConfigNotFound);
        }
    }
}

/// Interpolate environment variables in the format ${VAR_NAME} or ${VAR_NAME:-default}
fn interpolate_env_vars(content: &str) -> String {
    // This regex is a compile-time constant, panicking is acceptable here
    // as it indicates a programming error in the codebase, not a runtime issue
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
        .expect("Invalid regex pattern - this is a bug in the codebase");

    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");

        env::var(var_name).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}

/// Generate a default configuration file content
pub fn default_config_content() -> &'static str {
    r#"# Gatekeeper Configuration

[server]
host = "0.0.0.0"
port = 8000

[auth]
# Symmetric signing secret, at least 32 bytes. Supply via environment.
secret = "${GATEKEEPER_SECRET}"
algorithm = "HS256"                # HS256, HS384 or HS512
access_token_expiry_minutes = 15
refresh_token_expiry_days = 30
default_role = "user"

[rate_limit]
# Applied to unauthenticated routes such as /auth/login
window_secs = 60
max_requests = 10

# Accounts seeded into the in-memory credential store at startup.
# password_hash is a bcrypt hash; generate one with 'gatekeeper hash-password'.
# [[users]]
# email = "admin@example.com"
# password_hash = "$2b$12$..."
# role = "admin"
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_interpolation() {
        env::set_var("TEST_GK_VAR", "hello");
        let content = "value = \"${TEST_GK_VAR}\"";
        let result = interpolate_env_vars(content);
        assert_eq!(result, "value = \"hello\"");
        env::remove_var("TEST_GK_VAR");
    }

    #[test]
    fn test_env_interpolation_with_default() {
        let content = "value = \"${NONEXISTENT_VAR:-default_value}\"";
        let result = interpolate_env_vars(content);
        assert_eq!(result, "value = \"default_value\"");
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(
            &path,
            r#"
[auth]
secret = "0123456789abcdef0123456789abcdef"
access_token_expiry_minutes = 5
"#,
        )
        .unwrap();

        let config = load_config_from_path(&path).unwrap();
        assert_eq!(config.auth.access_token_expiry_minutes, 5);
        assert_eq!(config.auth.refresh_token_expiry_days, 30);
    }

    #[test]
    fn test_load_config_rejects_short_secret() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "[auth]\nsecret = \"short\"\n").unwrap();

        assert!(load_config_from_path(&path).is_err());
    }
}
