// Configuration file loading

use super::RunnerConfig;
use anyhow::{anyhow, Result};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "runner.toml";

/// Loads runner configuration from the global and project locations
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    global_path: Option<PathBuf>,
    project_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            global_path: dirs::config_dir().map(|dir| dir.join("ralph").join(CONFIG_FILE_NAME)),
            project_path: None,
        }
    }

    /// Look for `.ralph/runner.toml` inside a project as well
    pub fn with_project_path(mut self, project: &Path) -> Self {
        self.project_path = Some(project.join(".ralph").join(CONFIG_FILE_NAME));
        self
    }

    pub fn with_global_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_path = Some(path.into());
        self
    }

    /// Project config if present, else global config, else defaults
    pub fn load(&self) -> Result<RunnerConfig> {
        for path in [&self.project_path, &self.global_path].into_iter().flatten() {
            if let Some(config) = self.load_from_path(path)? {
                log::info!("[ConfigLoader] Loaded runner config from {}", path.display());
                return Ok(config);
            }
        }
        Ok(RunnerConfig::default())
    }

    /// Load and validate one file; a missing file is `Ok(None)`
    pub fn load_from_path(&self, path: &Path) -> Result<Option<RunnerConfig>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config = Self::parse_str(&content)
            .map_err(|e| anyhow!("Invalid config file '{}': {}", path.display(), e))?;
        Ok(Some(config))
    }

    pub fn parse_str(content: &str) -> Result<RunnerConfig> {
        let config: RunnerConfig =
            toml::from_str(content).map_err(|e| anyhow!("Failed to parse config: {}", e))?;
        Self::validate(&config)?;
        Ok(config)
    }

    fn validate(config: &RunnerConfig) -> Result<()> {
        if config.retry.max_attempts == 0 {
            return Err(anyhow!("retry.max_attempts must be at least 1"));
        }
        if config.retry.backoff_multiplier < 1.0 {
            return Err(anyhow!("retry.backoff_multiplier must be >= 1.0"));
        }
        if config.fallback.max_attempts_per_model == 0 {
            return Err(anyhow!("fallback.max_attempts_per_model must be at least 1"));
        }
        for agent in crate::models::AgentType::all() {
            let agent_config = config.agent(*agent);
            if agent_config.max_budget_usd.is_some_and(|budget| budget < 0.0) {
                return Err(anyhow!("{}.max_budget_usd cannot be negative", agent));
            }
            if agent_config.cli_command.iter().any(|part| part.trim().is_empty()) {
                return Err(anyhow!("{}.cli_command contains an empty entry", agent));
            }
        }
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[claude]
defaultModel = "sonnet"
maxBudgetUsd = 2.5

[gemini]
cli_command = ["npx", "@google/gemini-cli"]

[gemini.modelAliases]
pro = "gemini-3-pro-preview"

[retry]
maxAttempts = 4

[fallback]
crossAgent = true
fallbackAgents = ["gemini", "codex"]

[fallback.modelChains]
claude = ["opus", "sonnet", "haiku"]
"#;

    #[test]
    fn test_parse_sample() {
        let config = ConfigLoader::parse_str(SAMPLE).unwrap();
        assert_eq!(config.claude.default_model.as_deref(), Some("sonnet"));
        assert_eq!(config.claude.max_budget_usd, Some(2.5));
        assert_eq!(config.gemini.cli_command.len(), 2);
        assert_eq!(
            config.gemini.model_aliases.get("pro").map(String::as_str),
            Some("gemini-3-pro-preview")
        );
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.retry.initial_delay_ms, 1000);
        assert_eq!(config.fallback.fallback_agents, vec!["gemini", "codex"]);
        assert_eq!(config.fallback.model_chains["claude"].len(), 3);
    }

    #[test]
    fn test_empty_file_is_defaults() {
        assert_eq!(ConfigLoader::parse_str("").unwrap(), RunnerConfig::default());
    }

    #[test]
    fn test_validation_errors() {
        assert!(ConfigLoader::parse_str("[retry]\nmaxAttempts = 0").is_err());
        assert!(ConfigLoader::parse_str("[retry]\nbackoffMultiplier = 0.5").is_err());
        assert!(ConfigLoader::parse_str("[codex]\nmaxBudgetUsd = -1.0").is_err());
        assert!(ConfigLoader::parse_str("[codex]\ncliCommand = [\"\"]").is_err());
        assert!(ConfigLoader::parse_str("[retry\n").is_err());
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let loader = ConfigLoader::new();
        assert!(loader.load_from_path(&dir.path().join("nope.toml")).unwrap().is_none());
    }

    #[test]
    fn test_project_overrides_global() {
        let dir = TempDir::new().unwrap();
        let global = dir.path().join("global.toml");
        fs::write(&global, "[retry]\nmaxAttempts = 7\n").unwrap();

        let loader = ConfigLoader::new().with_global_path(&global);
        assert_eq!(loader.load().unwrap().retry.max_attempts, 7);

        let project = dir.path().join("project");
        fs::create_dir_all(project.join(".ralph")).unwrap();
        fs::write(project.join(".ralph/runner.toml"), "[retry]\nmaxAttempts = 2\n").unwrap();

        let loader = loader.with_project_path(&project);
        assert_eq!(loader.load().unwrap().retry.max_attempts, 2);
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "retry = 3").unwrap();
        let err = ConfigLoader::new().load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }
}
