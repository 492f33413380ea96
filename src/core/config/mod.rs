//! Runtime configuration.
//!
//! Settings come from `config.yml` at the project root (path overridable via
//! `VETASSIST_CONFIG_PATH`), with serde defaults filling anything omitted.
//! The pipeline reads settings once at startup and never reloads them.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

mod paths;

pub use paths::AppPaths;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Documents retrieved per query.
    #[serde(default = "default_k")]
    pub default_k: usize,
    /// Minimum mean similarity required to attempt autonomous generation.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    /// Individual-score floor: at least one passage must clear this for the
    /// retrieved set to count as sufficient.
    #[serde(default = "default_min_passage_score")]
    pub min_passage_score: f32,

    #[serde(default = "default_temperature")]
    pub default_temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,

    /// OpenAI-compatible endpoint base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// API key; falls back to the OPENAI_API_KEY environment variable.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_contact_email")]
    pub contact_email: String,
    #[serde(default = "default_contact_phone")]
    pub contact_phone: String,
    #[serde(default = "default_contact_url")]
    pub contact_url: String,

    /// Overrides the index location under the data dir.
    #[serde(default)]
    pub index_path: Option<PathBuf>,
    /// Directory scanned by the offline index builder.
    #[serde(default)]
    pub docs_dir: Option<PathBuf>,

    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_k() -> usize {
    3
}

fn default_confidence_threshold() -> f32 {
    0.65
}

fn default_min_passage_score() -> f32 {
    0.05
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    500
}

fn default_generation_timeout_secs() -> u64 {
    60
}

fn default_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_contact_email() -> String {
    "info@vetassist.example".to_string()
}

fn default_contact_phone() -> String {
    "+54 11 0000-0000".to_string()
}

fn default_contact_url() -> String {
    "https://vetassist.example/contacto".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        serde_yaml::from_str("{}").unwrap_or_else(|_| unreachable!("empty mapping always parses"))
    }
}

impl Settings {
    /// Loads settings from the config file. When the file is absent,
    /// `VETASSIST_PRESET` (production / development / demo) selects a preset,
    /// defaults otherwise. A present-but-invalid file is an error, not a
    /// silent fallback.
    pub fn load(paths: &AppPaths) -> anyhow::Result<Self> {
        let path = config_path(paths);
        if !path.exists() {
            return match env::var("VETASSIST_PRESET") {
                Ok(name) => Self::preset(&name)
                    .ok_or_else(|| anyhow::anyhow!("unknown preset {name:?}")),
                Err(_) => Ok(Self::default()),
            };
        }

        let contents = fs::read_to_string(&path)?;
        let settings: Settings = serde_yaml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?;
        Ok(settings)
    }

    /// Preset lookup by name, as accepted by `VETASSIST_PRESET`.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "production" => Some(Self::production()),
            "development" => Some(Self::development()),
            "demo" => Some(Self::demo()),
            _ => None,
        }
    }

    /// Conservative settings for production traffic.
    pub fn production() -> Self {
        Settings {
            default_temperature: 0.5,
            default_max_tokens: 600,
            default_k: 5,
            confidence_threshold: 0.70,
            ..Self::default()
        }
    }

    /// Looser settings for local development.
    pub fn development() -> Self {
        Settings {
            default_temperature: 0.7,
            default_max_tokens: 800,
            default_k: 3,
            confidence_threshold: 0.60,
            ..Self::default()
        }
    }

    /// Demo preset: the documented defaults, spelled out.
    pub fn demo() -> Self {
        Settings {
            default_temperature: 0.7,
            default_max_tokens: 500,
            default_k: 3,
            confidence_threshold: 0.65,
            ..Self::default()
        }
    }

    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| env::var("OPENAI_API_KEY").ok())
    }

    pub fn resolved_index_path(&self, paths: &AppPaths) -> PathBuf {
        self.index_path
            .clone()
            .unwrap_or_else(|| paths.index_path.clone())
    }

    pub fn resolved_docs_dir(&self, paths: &AppPaths) -> PathBuf {
        self.docs_dir
            .clone()
            .unwrap_or_else(|| paths.project_root.join("docs"))
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}

fn config_path(paths: &AppPaths) -> PathBuf {
    if let Ok(path) = env::var("VETASSIST_CONFIG_PATH") {
        return PathBuf::from(path);
    }

    paths.project_root.join("config.yml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.default_k, 3);
        assert_eq!(settings.confidence_threshold, 0.65);
        assert_eq!(settings.default_temperature, 0.7);
        assert_eq!(settings.default_max_tokens, 500);
        assert!(settings.allowed_origins.is_empty());
    }

    #[test]
    fn partial_yaml_fills_missing_fields() {
        let settings: Settings =
            serde_yaml::from_str("confidence_threshold: 0.8\ncontact_email: soporte@acme.test")
                .unwrap();
        assert_eq!(settings.confidence_threshold, 0.8);
        assert_eq!(settings.contact_email, "soporte@acme.test");
        assert_eq!(settings.default_k, 3);
    }

    #[test]
    fn production_preset_is_more_conservative() {
        let prod = Settings::production();
        assert_eq!(prod.default_temperature, 0.5);
        assert_eq!(prod.default_k, 5);
        assert!(prod.confidence_threshold > Settings::demo().confidence_threshold);
    }

    #[test]
    fn preset_lookup_resolves_known_names_only() {
        assert_eq!(Settings::preset("production").map(|s| s.default_k), Some(5));
        assert_eq!(
            Settings::preset("development").map(|s| s.confidence_threshold),
            Some(0.60)
        );
        assert_eq!(Settings::preset("demo").map(|s| s.default_k), Some(3));
        assert!(Settings::preset("staging").is_none());
    }
}
