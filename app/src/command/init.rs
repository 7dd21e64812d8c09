use kgimport_config::Config;
use std::path::PathBuf;

/// Strategy for writing a `.env` template.
///
/// Refuses to overwrite an existing file.
#[derive(Debug, Clone, Copy)]
pub struct InitStrategy;

impl super::CommandStrategy for InitStrategy {
    type Input = PathBuf;

    async fn execute(&self, path: Self::Input) -> anyhow::Result<()> {
        Config::create_env_template(&path)?;
        Ok(())
    }
}
