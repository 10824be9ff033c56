use crate::constants::{self, DEFAULT_OP_PATH, DEFAULT_OUTPUT_FILE, DEFAULT_TAG};
use anyhow::{Context, Result};
use dialoguer::{Input, theme::ColorfulTheme};
use ini::{Ini, Properties};
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// 1Password tag selecting AWS items
    pub tag: String,
    /// Output file, relative to the working directory unless absolute
    pub output_file: PathBuf,
    /// STS region; the SDK default chain applies when unset
    pub region: Option<String>,
    /// Path to the 1Password CLI
    pub op_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tag: DEFAULT_TAG.to_string(),
            output_file: PathBuf::from(DEFAULT_OUTPUT_FILE),
            region: None,
            op_path: PathBuf::from(DEFAULT_OP_PATH),
        }
    }
}

impl Config {
    fn from_ini_section(section: &Properties) -> Self {
        Self {
            tag: section
                .get("tag")
                .filter(|s| !s.is_empty())
                .unwrap_or(DEFAULT_TAG)
                .to_string(),
            output_file: section
                .get("output_file")
                .filter(|s| !s.is_empty())
                .map_or_else(|| PathBuf::from(DEFAULT_OUTPUT_FILE), PathBuf::from),
            region: section
                .get("region")
                .filter(|s| !s.is_empty())
                .map(String::from),
            op_path: section
                .get("op_path")
                .filter(|s| !s.is_empty())
                .map_or_else(|| PathBuf::from(DEFAULT_OP_PATH), PathBuf::from),
        }
    }

    fn save_to_ini(&self, ini: &mut Ini, profile: &str) {
        let mut section = ini.with_section(Some(section_name(profile)));
        section
            .set("tag", &self.tag)
            .set("output_file", self.output_file.to_string_lossy())
            .set("op_path", self.op_path.to_string_lossy());

        match &self.region {
            Some(region) => {
                section.set("region", region);
            }
            None => {
                section.delete(&"region");
            }
        }
    }
}

fn section_name(profile: &str) -> String {
    if profile == "default" {
        profile.to_string()
    } else {
        format!("profile {profile}")
    }
}

/// Load a profile, falling back to defaults when the file or profile is absent
pub async fn load(profile: &str) -> Result<Config> {
    let path = get_config_path()?;
    if !path.exists() {
        debug!("No config file at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let ini = Ini::load_from_file(&path)
        .with_context(|| format!("Failed to load config file {}", path.display()))?;

    Ok(ini
        .section(Some(section_name(profile)))
        .map(Config::from_ini_section)
        .unwrap_or_else(|| {
            debug!("Profile '{}' not found in config, using defaults", profile);
            Config::default()
        }))
}

pub async fn save(profile: &str, config: &Config) -> Result<()> {
    let path = get_config_path()?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let mut ini = if path.exists() {
        Ini::load_from_file(&path).unwrap_or_else(|_| Ini::new())
    } else {
        Ini::new()
    };

    config.save_to_ini(&mut ini, profile);

    ini.write_to_file(&path)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(())
}

pub async fn configure_interactive(profile: &str) -> Result<()> {
    println!("Configuring aws-op for profile: {profile}");
    println!("Press Enter to keep current values, or type new values.");
    println!();

    let current = load(profile).await?;
    let theme = ColorfulTheme::default();

    let tag = Input::<String>::with_theme(&theme)
        .with_prompt("1Password tag")
        .default(current.tag)
        .validate_with(|input: &String| {
            if input.trim().is_empty() {
                Err("Tag is required")
            } else {
                Ok(())
            }
        })
        .interact_text()
        .context("Failed to read tag")?;

    let output_file = Input::<String>::with_theme(&theme)
        .with_prompt("Output file")
        .default(current.output_file.to_string_lossy().to_string())
        .interact_text()
        .context("Failed to read output file")?;

    let region = Input::<String>::with_theme(&theme)
        .with_prompt("AWS region for STS (empty for SDK default)")
        .default(current.region.unwrap_or_default())
        .allow_empty(true)
        .validate_with(|input: &String| {
            if input.is_empty() || is_valid_region(input) {
                Ok(())
            } else {
                Err("Region must look like us-east-1")
            }
        })
        .interact_text()
        .context("Failed to read region")?;

    let op_path = Input::<String>::with_theme(&theme)
        .with_prompt("1Password CLI path")
        .default(current.op_path.to_string_lossy().to_string())
        .interact_text()
        .context("Failed to read 1Password CLI path")?;

    let config = Config {
        tag: tag.trim().to_string(),
        output_file: PathBuf::from(output_file),
        region: (!region.is_empty()).then_some(region),
        op_path: PathBuf::from(op_path),
    };

    save(profile, &config).await?;

    println!("\nConfiguration saved successfully.");
    Ok(())
}

fn get_config_path() -> Result<PathBuf> {
    constants::get_config_path().context("Failed to determine aws-op config path")
}

fn is_valid_region(s: &str) -> bool {
    let parts: Vec<&str> = s.split('-').collect();

    parts.len() >= 3
        && parts.iter().all(|p| {
            !p.is_empty() && p.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        })
        && parts
            .last()
            .is_some_and(|p| p.chars().all(|c| c.is_ascii_digit()))
}
