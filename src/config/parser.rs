use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// Keys missing from the file fall back to their defaults; the merged result
/// is validated before it is returned.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use mastodonte::config::load_config;
///
/// let config = load_config(Path::new("mastodonte.toml")).unwrap();
/// println!("Max pages: {}", config.crawler.max_pages);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so collected data can be traced back to the settings
/// that produced it.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CheckpointBackend;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[crawler]
page-limit = 20
max-pages = 5
workers = 3
politeness-delay-ms = 250
rate-limit-tolerance = 3

[user-agent]
crawler-name = "TestCrawler"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[output]
state-dir = "./state"
data-dir = "./data"
checkpoint-backend = "sqlite"

[api]
remaining-header = "RateLimit-Remaining"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.page_limit, 20);
        assert_eq!(config.crawler.max_pages, 5);
        assert_eq!(config.crawler.workers, 3);
        assert_eq!(config.crawler.rate_limit_tolerance, 3);
        assert_eq!(config.user_agent.crawler_name, "TestCrawler");
        assert_eq!(config.output.checkpoint_backend, CheckpointBackend::Sqlite);
        assert_eq!(config.api.remaining_header, "RateLimit-Remaining");
        // Untouched keys keep their defaults
        assert_eq!(config.crawler.follow_page_limit, 80);
        assert_eq!(config.api.reset_header, "X-RateLimit-Reset");
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let file = create_temp_config("");
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.page_limit, 40);
        assert_eq!(config.crawler.max_pages, 100);
        assert_eq!(config.output.state_dir, "__mastodonte__");
        assert_eq!(config.output.checkpoint_backend, CheckpointBackend::Json);
        assert_eq!(config.api.cursor_param, "max_id");
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let config_content = "this is not valid TOML {{{";
        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_unknown_backend() {
        let file = create_temp_config("[output]\ncheckpoint-backend = \"redis\"\n");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[crawler]
workers = 0
"#;

        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_config_hash_tracks_content() {
        let first = create_temp_config("[crawler]\nmax-pages = 5\n");
        let same = create_temp_config("[crawler]\nmax-pages = 5\n");
        let other = create_temp_config("[crawler]\nmax-pages = 6\n");

        let (_, hash) = load_config_with_hash(first.path()).unwrap();
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, compute_config_hash(same.path()).unwrap());
        assert_ne!(hash, compute_config_hash(other.path()).unwrap());
    }
}
