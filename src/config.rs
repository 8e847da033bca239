use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub workbook: WorkbookConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkbookConfig {
    /// Directory holding one JSON file per sheet.
    pub root: PathBuf,
    #[serde(default = "default_change_log")]
    pub change_log: String,
    /// A1 address of the version marker in the change-log sheet.
    #[serde(default = "default_version_cell")]
    pub version_cell: String,
    /// Name of the flat question/answer source sheet.
    #[serde(default = "default_faq_sheet")]
    pub faq_sheet: String,
    /// Location stamped onto rebuilt chunks.
    #[serde(default = "default_location")]
    pub default_location: String,
}

fn default_change_log() -> String {
    "Change Log".to_string()
}
fn default_version_cell() -> String {
    "M1".to_string()
}
fn default_faq_sheet() -> String {
    "FAQs".to_string()
}
fn default_location() -> String {
    "Main".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: 128,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    128
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f64,
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f64,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            semantic_weight: default_semantic_weight(),
            keyword_weight: default_keyword_weight(),
            top_k: default_top_k(),
        }
    }
}

fn default_semantic_weight() -> f64 {
    0.7
}
fn default_keyword_weight() -> f64 {
    0.3
}
fn default_top_k() -> usize {
    5
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate workbook
    if config.workbook.change_log.trim().is_empty() {
        anyhow::bail!("workbook.change_log must not be empty");
    }
    crate::workbook::parse_a1(&config.workbook.version_cell).with_context(|| {
        format!(
            "workbook.version_cell is not a valid A1 address: '{}'",
            config.workbook.version_cell
        )
    })?;

    // Validate search weights
    if !(0.0..=1.0).contains(&config.search.semantic_weight)
        || !(0.0..=1.0).contains(&config.search.keyword_weight)
    {
        anyhow::bail!("search weights must be in [0.0, 1.0]");
    }
    if config.search.top_k == 0 {
        anyhow::bail!("search.top_k must be >= 1");
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "voyage" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, voyage, or openai.",
            other
        ),
    }

    Ok(config)
}
