use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not found. Set it in the environment or in a .env file")]
    MissingCredential(&'static str),

    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("Failed to read env file {}: {source}", path.display())]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },

    #[error("Env file already exists at: {}. Please edit it directly.", .0.display())]
    TemplateExists(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub providers: ProvidersConfig,
    pub backend: BackendConfig,
    pub models: ModelConfig,
    pub import: ImportConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub openai: ProviderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
}

/// Graph-ingestion service location and graph partitioning.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BackendConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub group_id: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8000,
            database: "confluence-oc".to_string(),
            group_id: "confluence-oc".to_string(),
        }
    }
}

impl BackendConfig {
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    pub llm: String,
    pub small_llm: String,
    pub embedding: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            llm: "gpt-4o-mini".to_string(),
            small_llm: "gpt-4o-mini".to_string(),
            embedding: "text-embedding-3-small".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ImportConfig {
    pub max_chars: usize,
    pub timeout_secs: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_chars: 6000,
            timeout_secs: 300,
        }
    }
}

impl Config {
    /// Default env file, relative to the working directory.
    pub const DEFAULT_ENV_FILE: &'static str = ".env";

    /// Loads configuration from `source`. Keys found by the source lookup
    /// win over env files, and an earlier file wins over a later one.
    /// Missing files are skipped.
    pub fn load(source: &EnvSource) -> Result<Self, ConfigError> {
        let mut file_values: HashMap<String, String> = HashMap::new();
        for path in &source.env_files {
            if !path.exists() {
                debug!("Env file {} not present, skipping", path.display());
                continue;
            }
            let env_file_error = |source| ConfigError::EnvFile {
                path: path.clone(),
                source,
            };
            for entry in dotenvy::from_path_iter(path).map_err(env_file_error)? {
                let (key, value) = entry.map_err(env_file_error)?;
                file_values.entry(key).or_insert(value);
            }
            info!("Loaded environment from {}", path.display());
        }

        Self::from_lookup(|key| (source.lookup)(key).or_else(|| file_values.get(key).cloned()))
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let openai_key =
            get("OPENAI_API_KEY").ok_or(ConfigError::MissingCredential("OPENAI_API_KEY"))?;

        let backend_defaults = BackendConfig::default();
        let model_defaults = ModelConfig::default();
        let import_defaults = ImportConfig::default();

        Ok(Self {
            providers: ProvidersConfig {
                openai: ProviderConfig {
                    api_key: openai_key,
                },
            },
            backend: BackendConfig {
                host: get("GRAPHITI_HOST").unwrap_or(backend_defaults.host),
                port: parse_or(get("GRAPHITI_PORT"), "GRAPHITI_PORT", backend_defaults.port)?,
                database: get("GRAPH_DATABASE").unwrap_or(backend_defaults.database),
                group_id: get("GROUP_ID").unwrap_or(backend_defaults.group_id),
            },
            models: ModelConfig {
                llm: get("LLM_MODEL").unwrap_or(model_defaults.llm),
                small_llm: get("SMALL_LLM_MODEL").unwrap_or(model_defaults.small_llm),
                embedding: get("EMBEDDING_MODEL").unwrap_or(model_defaults.embedding),
            },
            import: ImportConfig {
                max_chars: parse_positive(
                    get("IMPORT_MAX_CHARS"),
                    "IMPORT_MAX_CHARS",
                    import_defaults.max_chars,
                )?,
                timeout_secs: parse_positive(
                    get("IMPORT_TIMEOUT_SECS"),
                    "IMPORT_TIMEOUT_SECS",
                    import_defaults.timeout_secs,
                )?,
            },
        })
    }

    /// Writes a commented `.env` template. Refuses to overwrite.
    pub fn create_env_template(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Err(ConfigError::TemplateExists(path.to_path_buf()));
        }

        let template = r"# Credentials
OPENAI_API_KEY=your-openai-api-key-here

# Graph-ingestion service
GRAPHITI_HOST=localhost
GRAPHITI_PORT=8000
GRAPH_DATABASE=confluence-oc
GROUP_ID=confluence-oc

# Extraction models
LLM_MODEL=gpt-4o-mini
SMALL_LLM_MODEL=gpt-4o-mini
EMBEDDING_MODEL=text-embedding-3-small

# Per-item limits
IMPORT_MAX_CHARS=6000
IMPORT_TIMEOUT_SECS=300
";
        std::fs::write(path, template)?;

        println!("✅ Created env file at: {}", path.display());
        println!();
        println!("📝 Next steps:");
        println!("   1. Edit the file and add your OpenAI API key");
        println!("   2. Ensure the graph-ingestion service is running at the configured host/port");
        println!("   3. Run 'kgimport confluence' or 'kgimport memory' to start an import");
        println!();
        Ok(())
    }
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

/// Like [`parse_or`], but zero is rejected.
fn parse_positive<T>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default,
{
    let shown = raw.clone().unwrap_or_default();
    let value = parse_or(raw, key, default)?;
    if value == T::default() {
        return Err(ConfigError::Invalid { key, value: shown });
    }
    Ok(value)
}

/// Where configuration values come from: env files, plus a key lookup that
/// takes precedence over them. The lookup defaults to the process
/// environment.
#[derive(Debug, Clone)]
pub struct EnvSource {
    env_files: Vec<PathBuf>,
    lookup: fn(&str) -> Option<String>,
}

impl EnvSource {
    #[must_use]
    pub fn new(env_files: Vec<PathBuf>) -> Self {
        Self {
            env_files,
            lookup: process_env,
        }
    }

    #[must_use]
    pub fn with_lookup(mut self, lookup: fn(&str) -> Option<String>) -> Self {
        self.lookup = lookup;
        self
    }
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_api_key_is_fatal() {
        let err = Config::from_lookup(lookup(&[("GROUP_ID", "x")])).err();
        assert!(matches!(
            err,
            Some(ConfigError::MissingCredential("OPENAI_API_KEY"))
        ));
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let err = Config::from_lookup(lookup(&[("OPENAI_API_KEY", "   ")])).err();
        assert!(matches!(err, Some(ConfigError::MissingCredential(_))));
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-test")]))
            .unwrap_or_else(|e| panic!("config: {e}"));
        assert_eq!(config.providers.openai.api_key, "sk-test");
        assert_eq!(config.backend.base_url(), "http://localhost:8000");
        assert_eq!(config.backend.group_id, "confluence-oc");
        assert_eq!(config.models.embedding, "text-embedding-3-small");
        assert_eq!(config.import.max_chars, 6000);
        assert_eq!(config.import.timeout_secs, 300);
    }

    #[test]
    fn overrides_apply() {
        let config = Config::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("GRAPHITI_HOST", "graph.internal"),
            ("GRAPHITI_PORT", "9000"),
            ("GROUP_ID", "memory"),
            ("IMPORT_MAX_CHARS", "8000"),
        ]))
        .unwrap_or_else(|e| panic!("config: {e}"));
        assert_eq!(config.backend.base_url(), "http://graph.internal:9000");
        assert_eq!(config.backend.group_id, "memory");
        assert_eq!(config.import.max_chars, 8000);
    }

    #[test]
    fn bad_number_is_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("GRAPHITI_PORT", "eighty"),
        ]))
        .err();
        assert!(matches!(
            err,
            Some(ConfigError::Invalid {
                key: "GRAPHITI_PORT",
                ..
            })
        ));
    }

    #[test]
    fn zero_limits_are_rejected() {
        for key in ["IMPORT_MAX_CHARS", "IMPORT_TIMEOUT_SECS"] {
            let err = Config::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-test"), (key, "0")]))
                .err();
            assert!(
                matches!(err, Some(ConfigError::Invalid { key: k, .. }) if k == key),
                "{key}"
            );
        }
    }

    fn no_process_env(_key: &str) -> Option<String> {
        None
    }

    #[test]
    fn env_files_fill_in_missing_keys() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let first = dir.path().join(".env");
        let second = dir.path().join(".env.shared");
        std::fs::write(&first, "OPENAI_API_KEY=sk-first\nGROUP_ID=ops\n")
            .unwrap_or_else(|e| panic!("write: {e}"));
        std::fs::write(&second, "OPENAI_API_KEY=sk-second\nGRAPHITI_PORT=9100\n")
            .unwrap_or_else(|e| panic!("write: {e}"));

        let source = EnvSource::new(vec![first, dir.path().join("absent.env"), second])
            .with_lookup(no_process_env);
        let config = Config::load(&source).unwrap_or_else(|e| panic!("config: {e}"));
        assert_eq!(config.providers.openai.api_key, "sk-first");
        assert_eq!(config.backend.group_id, "ops");
        assert_eq!(config.backend.port, 9100);
    }

    #[test]
    fn lookup_wins_over_env_files() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let path = dir.path().join(".env");
        std::fs::write(&path, "OPENAI_API_KEY=sk-file\n").unwrap_or_else(|e| panic!("write: {e}"));

        let source = EnvSource::new(vec![path]).with_lookup(|key| {
            (key == "OPENAI_API_KEY").then(|| "sk-shell".to_string())
        });
        let config = Config::load(&source).unwrap_or_else(|e| panic!("config: {e}"));
        assert_eq!(config.providers.openai.api_key, "sk-shell");
    }

    #[test]
    fn env_file_without_key_is_fatal() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let path = dir.path().join(".env");
        std::fs::write(&path, "GRAPHITI_HOST=graph.internal\n")
            .unwrap_or_else(|e| panic!("write: {e}"));

        let source = EnvSource::new(vec![path]).with_lookup(no_process_env);
        assert!(matches!(
            Config::load(&source),
            Err(ConfigError::MissingCredential("OPENAI_API_KEY"))
        ));
    }

    #[test]
    fn template_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let path = dir.path().join(".env");
        assert!(Config::create_env_template(&path).is_ok());
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        assert!(content.contains("OPENAI_API_KEY="));
        assert!(matches!(
            Config::create_env_template(&path),
            Err(ConfigError::TemplateExists(_))
        ));
    }
}
