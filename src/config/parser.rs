use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// Environment overrides from the process environment are applied after parsing,
/// then the result is validated.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, override or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use site_indexer::config::load_config;
///
/// let config = load_config(Path::new("indexer.toml")).unwrap();
/// println!("Max depth: {}", config.crawler.max_depth);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut config = parse_config(&content)?;

    apply_env_overrides(&mut config, std::env::vars())?;

    validate(&config)?;

    Ok(config)
}

/// Parses TOML content into a configuration without validating it
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Applies environment-style key/value overrides on top of a parsed configuration
///
/// Unknown keys are ignored. List values are comma-separated.
///
/// | Key | Field |
/// |-----|-------|
/// | `INDEXER_SEEDS` | `crawler.seeds` |
/// | `INDEXER_ALLOWED_HOSTS` | `crawler.allowed-hosts` |
/// | `INDEXER_MAX_DEPTH` | `crawler.max-depth` |
/// | `INDEXER_MAX_PAGES` | `crawler.max-pages` |
/// | `INDEXER_CONCURRENCY` | `crawler.concurrency` |
/// | `INDEXER_SNAPSHOT_DIR` | `output.snapshot-dir` |
/// | `QDRANT_URL` | `vector-store.url` |
/// | `QDRANT_HOST` / `QDRANT_PORT` | `vector-store.url` (when `QDRANT_URL` is unset) |
/// | `QDRANT_API_KEY` | `vector-store.api-key` |
/// | `QDRANT_COLLECTION` | `vector-store.collection` |
/// | `EMBEDDING_ENDPOINT` | `embedding.endpoint` |
/// | `EMBEDDING_MODEL` | `embedding.model` |
/// | `EMBEDDING_API_KEY` | `embedding.api-key` |
pub fn apply_env_overrides<I>(config: &mut Config, vars: I) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut qdrant_url = None;
    let mut qdrant_host = None;
    let mut qdrant_port = None;

    for (key, value) in vars {
        match key.as_str() {
            "INDEXER_SEEDS" => config.crawler.seeds = split_list(&value),
            "INDEXER_ALLOWED_HOSTS" => config.crawler.allowed_hosts = split_list(&value),
            "INDEXER_MAX_DEPTH" => config.crawler.max_depth = parse_number(&key, &value)?,
            "INDEXER_MAX_PAGES" => config.crawler.max_pages = parse_number(&key, &value)?,
            "INDEXER_CONCURRENCY" => config.crawler.concurrency = parse_number(&key, &value)?,
            "INDEXER_SNAPSHOT_DIR" => config.output.snapshot_dir = Some(value),
            "QDRANT_URL" => qdrant_url = Some(value),
            "QDRANT_HOST" => qdrant_host = Some(value),
            "QDRANT_PORT" => qdrant_port = Some(parse_number::<u16>(&key, &value)?),
            "QDRANT_API_KEY" => config.vector_store.api_key = Some(value),
            "QDRANT_COLLECTION" => config.vector_store.collection = value,
            "EMBEDDING_ENDPOINT" => config.embedding.endpoint = value,
            "EMBEDDING_MODEL" => config.embedding.model = value,
            "EMBEDDING_API_KEY" => config.embedding.api_key = Some(value),
            _ => {}
        }
    }

    if let Some(url) = qdrant_url {
        config.vector_store.url = url;
    } else if qdrant_host.is_some() || qdrant_port.is_some() {
        config.vector_store.url = format!(
            "http://{}:{}",
            qdrant_host.as_deref().unwrap_or("localhost"),
            qdrant_port.unwrap_or(6333)
        );
    }

    Ok(())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Computes a SHA-256 hash of the configuration file content
///
/// The hash is logged at startup so runs can be matched to the configuration that drove them.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
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
