use crate::models::{MergeSettings, SettingsOverrides};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// File name of the settings file inside the configuration directory.
pub const SETTINGS_FILE: &str = "resmerge.yaml";

/// Prefix of environment variables overriding settings (`RESMERGE_NO_CRUNCH=true`).
pub const ENV_PREFIX: &str = "RESMERGE";

/// Configuration manager for loading and saving `resmerge.yaml`.
///
/// Settings come from the YAML file (defaults when it is missing) with
/// `RESMERGE_*` environment variables applied on top.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// The directory is created if it doesn't exist.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            settings_path: config_dir.join(SETTINGS_FILE),
            config_dir,
        })
    }

    /// Load settings from the file and the process environment.
    pub fn load_settings(&self) -> Result<MergeSettings> {
        self.load_settings_with_env(None)
    }

    /// Load settings, reading overrides from `env` instead of the process
    /// environment when given.
    pub fn load_settings_with_env(
        &self,
        env: Option<config::Map<String, String>>,
    ) -> Result<MergeSettings> {
        let mut settings = self.load_settings_file()?;
        let overrides = read_env_overrides(env)?;
        settings.apply(overrides);
        Ok(settings)
    }

    /// Load only the YAML file, without environment overrides.
    pub fn load_settings_file(&self) -> Result<MergeSettings> {
        if !self.settings_path.exists() {
            tracing::warn!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
            return Ok(MergeSettings::default());
        }

        let file_contents = fs::read_to_string(&self.settings_path)
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?;

        let settings: MergeSettings = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        tracing::info!("Loaded settings from {}", self.settings_path);
        Ok(settings)
    }

    /// Save the settings file.
    pub fn save_settings(&self, settings: &MergeSettings) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }
}

fn read_env_overrides(env: Option<config::Map<String, String>>) -> Result<SettingsOverrides> {
    let environment = config::Environment::with_prefix(ENV_PREFIX)
        .try_parsing(true)
        .source(env);

    config::Config::builder()
        .add_source(environment)
        .build()
        .context("Failed to read environment overrides")?
        .try_deserialize()
        .context("Invalid environment override")
}
