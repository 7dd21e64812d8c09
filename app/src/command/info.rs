use kgimport_config::{Config, EnvSource};
use kgimport_providers::GraphitiClient;
use tracing::info;

/// Strategy for displaying the effective configuration.
///
/// Outputs the masked API key, the graph service location and whether it
/// answers, the extraction models and the per-item limits.
#[derive(Debug, Clone, Copy)]
pub struct InfoStrategy;

impl super::CommandStrategy for InfoStrategy {
    type Input = EnvSource;

    async fn execute(&self, env: Self::Input) -> anyhow::Result<()> {
        let config = Config::load(&env)?;

        println!("=== kgimport Configuration ===\n");

        println!("API Key:");
        println!("  OpenAI: {}", mask_key(&config.providers.openai.api_key));
        println!();

        println!("Graph Service:");
        let base_url = config.backend.base_url();
        println!("  URL: {base_url}");
        println!("  Database: {}", config.backend.database);
        println!("  Group: {}", config.backend.group_id);

        info!("Testing graph service connection");
        let client = GraphitiClient::new(base_url, config.providers.openai.api_key.clone());
        match client.health_check().await {
            Ok(()) => println!("  Status: Reachable"),
            Err(e) => {
                println!("  Status: Unreachable");
                println!("  Error: {e}");
            }
        }
        println!();

        println!("Models:");
        println!("  LLM: {}", config.models.llm);
        println!("  Small LLM: {}", config.models.small_llm);
        println!("  Embedding: {}", config.models.embedding);
        println!();

        println!("Import Limits:");
        println!("  Max Chars: {}", config.import.max_chars);
        println!("  Timeout: {}s", config.import.timeout_secs);

        Ok(())
    }
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_keys_keep_both_ends() {
        assert_eq!(mask_key("sk-proj-abcdef123456"), "sk-p...3456");
    }

    #[test]
    fn short_keys_are_hidden() {
        assert_eq!(mask_key("sk-1"), "***");
    }
}
