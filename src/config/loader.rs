use crate::config::schema::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// Environment variables recognized as overrides, highest precedence after
/// CLI flags: FLOWGATE_KV_ENDPOINT, FLOWGATE_KV_TOKEN, FLOWGATE_DB_PATH,
/// FLOWGATE_KEY_PREFIX.
pub fn load_config(cli_config_path: Option<PathBuf>) -> Result<Config> {
    tracing::debug!("Loading configuration");

    let mut config = Config::default();

    // Layer 1: config file (~/.flowgate/config.json unless overridden)
    let config_file = cli_config_path.or_else(get_default_config_path);

    if let Some(ref path) = config_file {
        if path.exists() {
            tracing::debug!(config_path = %path.display(), "Loading configuration from file");
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            config = serde_json::from_str(&contents)
                .with_context(|| format!("Config file {} contains invalid JSON", path.display()))?;
        } else {
            tracing::debug!(config_path = %path.display(), "Config file not found, using defaults");
        }
    }

    // Layer 2: environment variable overrides
    config = merge_env_variables(config);

    tracing::debug!(
        kv_configured = config.kv_endpoint.is_some(),
        database_path = ?config.database_path,
        key_prefix = %config.key_prefix,
        authorized_users = config.access.authorized_users.len(),
        "Configuration loaded successfully"
    );

    Ok(config)
}

fn merge_env_variables(mut config: Config) -> Config {
    if let Ok(endpoint) = std::env::var("FLOWGATE_KV_ENDPOINT") {
        tracing::debug!("Applying FLOWGATE_KV_ENDPOINT override");
        config.kv_endpoint = Some(endpoint);
    }
    if let Ok(token) = std::env::var("FLOWGATE_KV_TOKEN") {
        config.kv_api_token = Some(token);
    }
    if let Ok(path) = std::env::var("FLOWGATE_DB_PATH") {
        tracing::debug!(path = %path, "Applying FLOWGATE_DB_PATH override");
        config.database_path = Some(PathBuf::from(path));
    }
    if let Ok(prefix) = std::env::var("FLOWGATE_KEY_PREFIX") {
        config.key_prefix = prefix;
    }
    config
}

/// Default config file location: ~/.flowgate/config.json
pub fn get_default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".flowgate").join("config.json"))
}

/// Default database location: ~/.flowgate/flowgate.db
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".flowgate").join("flowgate.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env-var mutating tests must not interleave
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_load_config_defaults_when_file_missing() {
        let _guard = ENV_LOCK.lock().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let config = load_config(Some(temp.path().join("missing.json"))).unwrap();
        assert_eq!(config.key_prefix, "flowgate");
    }

    #[test]
    fn test_load_config_from_file() {
        let _guard = ENV_LOCK.lock().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{"key_prefix": "wfp", "memory_ttl_secs": 15}"#).unwrap();

        let config = load_config(Some(path)).unwrap();
        assert_eq!(config.key_prefix, "wfp");
        assert_eq!(config.memory_ttl_secs, 15);
    }

    #[test]
    fn test_load_config_invalid_json_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, "not json").unwrap();

        assert!(load_config(Some(path)).is_err());
    }

    #[test]
    fn test_env_override_takes_precedence() {
        let _guard = ENV_LOCK.lock().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{"kv_endpoint": "http://from-file"}"#).unwrap();

        unsafe { std::env::set_var("FLOWGATE_KV_ENDPOINT", "http://from-env") };
        let config = load_config(Some(path)).unwrap();
        unsafe { std::env::remove_var("FLOWGATE_KV_ENDPOINT") };

        assert_eq!(config.kv_endpoint.as_deref(), Some("http://from-env"));
    }
}
