//! Configuration loader
//!
//! Loads and saves configuration from/to files and strings.

use crate::config::Config;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use tracing::info;

static RE_ENV: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z0-9_]+)(?::-([^}]*))?\}").expect("environment pattern is valid")
});

/// Load configuration from a YAML file
///
/// `${VAR_NAME}` and `${VAR_NAME:-default}` are replaced with environment
/// values before parsing.
///
/// # Errors
///
/// Returns an error if the file cannot be read, a referenced variable is
/// unset without a default, or the result does not parse or validate.
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;
    let config = load_from_yaml(&contents)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Substitute environment variables in configuration text
fn substitute_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut last = 0;

    for cap in RE_ENV.captures_iter(content) {
        let Some(whole) = cap.get(0) else { continue };
        let var_name = cap.get(1).map_or("", |m| m.as_str());

        let value = match (env::var(var_name), cap.get(2)) {
            (Ok(v), _) => v,
            (Err(_), Some(default)) => default.as_str().to_string(),
            (Err(_), None) => {
                return Err(Error::Config(format!(
                    "Environment variable {} not found and no default provided",
                    var_name
                )))
            }
        };

        result.push_str(&content[last..whole.start()]);
        result.push_str(&value);
        last = whole.end();
    }
    result.push_str(&content[last..]);

    Ok(result)
}

/// Load configuration from a YAML string
///
/// `LOG_LEVEL`, `LOG_FORMAT` and `LOG_FILE` from the environment override
/// the file's `log` section.
///
/// # Errors
///
/// Returns an error if the YAML cannot be parsed or does not validate.
pub fn load_from_yaml(yaml: &str) -> Result<Config> {
    let mut config: Config = if yaml.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("Failed to parse YAML: {}", e)))?
    };

    let snapshot: HashMap<String, String> = env::vars().collect();
    apply_env_overrides(&mut config, &snapshot);

    config.validate()?;
    Ok(config)
}

/// Apply `LOG_*` overrides from an environment snapshot
///
/// Empty values count as unset.
pub(crate) fn apply_env_overrides(config: &mut Config, env_snapshot: &HashMap<String, String>) {
    let get = |key: &str| env_snapshot.get(key).filter(|v| !v.is_empty()).cloned();

    if let Some(val) = get("LOG_LEVEL") {
        info!("Applied env override: LOG_LEVEL = {}", val);
        config.log.level = val;
    }
    if let Some(val) = get("LOG_FORMAT") {
        info!("Applied env override: LOG_FORMAT = {}", val);
        config.log.format = val;
    }
    if let Some(val) = get("LOG_FILE") {
        info!("Applied env override: LOG_FILE = {}", val);
        config.log.file = Some(val);
    }
}

/// Save configuration to a YAML file
///
/// # Errors
///
/// Returns an error if serialization fails or the file cannot be written.
pub fn save_to_file<P: AsRef<Path>>(config: &Config, path: P) -> Result<()> {
    let yaml = to_yaml(config)?;

    fs::write(path.as_ref(), yaml)
        .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

    Ok(())
}

/// Convert configuration to a YAML string
pub fn to_yaml(config: &Config) -> Result<String> {
    serde_yaml::to_string(config)
        .map_err(|e| Error::Config(format!("Failed to serialize YAML: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Protocol;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_from_yaml_minimal() {
        let config = load_from_yaml("log:\n  format: json\n").unwrap();
        assert_eq!(config.log.format, "json");
        assert_eq!(config.resolver.retries, 3);
    }

    #[test]
    fn test_load_from_yaml_full() {
        let yaml = r#"
log:
  level: debug
  rotate: daily
  file: /var/log/lazyresolv.log
resolver:
  name_servers: ["1.1.1.1", "9.9.9.9:5353"]
  protocol: tcp
  timeout_ms: 1500
  retries: 1
  recursive: false
  doh_method: get
  edns_udp_size: 1232
servers:
  - protocol: udp
    addr: "127.0.0.1:5353"
  - protocol: doh
    addr: "127.0.0.1:8053"
    path: /resolve
"#;
        let config = load_from_yaml(yaml).unwrap();
        assert_eq!(config.log.rotate, "daily");
        assert_eq!(config.resolver.protocol, Protocol::Tcp);
        assert_eq!(config.resolver.name_servers.len(), 2);
        assert!(!config.resolver.recursive);
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.servers[1].protocol, Protocol::DoH);
        assert_eq!(config.servers[1].path, "/resolve");
        assert_eq!(config.servers[0].path, "/dns-query");

        let resolver = config.resolver.to_resolver_config();
        assert_eq!(resolver.timeout, std::time::Duration::from_millis(1500));
        assert_eq!(resolver.edns_udp_size, Some(1232));
    }

    #[test]
    fn test_load_from_yaml_invalid() {
        assert!(load_from_yaml("invalid: yaml: content: [").is_err());
        assert!(load_from_yaml("resolver:\n  protocol: quic\n").is_err());
        assert!(load_from_yaml("resolver:\n  name_servers: []\n").is_err());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = load_from_yaml("").unwrap();
        assert_eq!(config.resolver, Config::default().resolver);
    }

    #[test]
    fn test_save_and_load_file() {
        let mut config = Config::new();
        config.resolver.name_servers = vec!["192.0.2.53".to_string()];

        let temp_file = NamedTempFile::new().unwrap();
        save_to_file(&config, temp_file.path()).unwrap();
        let loaded = load_from_file(temp_file.path()).unwrap();

        assert_eq!(config.resolver, loaded.resolver);
        assert_eq!(config.servers, loaded.servers);
    }

    #[test]
    fn test_load_file_with_env_substitution() {
        env::set_var("LAZYRESOLV_TEST_UPSTREAM", "203.0.113.9");

        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "resolver:\n  name_servers: [\"${{LAZYRESOLV_TEST_UPSTREAM}}\", \"${{LAZYRESOLV_TEST_UNSET:-198.51.100.1}}\"]"
        )
        .unwrap();

        let config = load_from_file(file.path()).unwrap();
        assert_eq!(
            config.resolver.name_servers,
            vec!["203.0.113.9", "198.51.100.1"]
        );

        env::remove_var("LAZYRESOLV_TEST_UPSTREAM");
    }

    #[test]
    fn test_load_nonexistent_file() {
        assert!(load_from_file("/nonexistent/path/config.yaml").is_err());
    }

    #[test]
    fn test_substitute_env_vars() {
        env::set_var("LAZYRESOLV_TEST_VAR", "test_value");

        let result = substitute_env_vars("a: ${LAZYRESOLV_TEST_VAR}\nb: x${LAZYRESOLV_TEST_VAR}y").unwrap();
        assert_eq!(result, "a: test_value\nb: xtest_valuey");

        env::remove_var("LAZYRESOLV_TEST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        let result = substitute_env_vars("value: ${LAZYRESOLV_MISSING_VAR:-fallback}").unwrap();
        assert_eq!(result, "value: fallback");

        let err = substitute_env_vars("value: ${LAZYRESOLV_MISSING_VAR}").unwrap_err();
        assert!(err.to_string().contains("LAZYRESOLV_MISSING_VAR not found"));
    }

    #[test]
    fn test_env_overrides_from_snapshot() {
        let mut config = Config::new();
        let mut snapshot = HashMap::new();
        snapshot.insert("LOG_LEVEL".to_string(), "debug".to_string());
        snapshot.insert("LOG_FORMAT".to_string(), String::new());
        snapshot.insert("LOG_FILE".to_string(), "/tmp/lazyresolv.log".to_string());

        apply_env_overrides(&mut config, &snapshot);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, "text");
        assert_eq!(config.log.file.as_deref(), Some("/tmp/lazyresolv.log"));
    }
}
