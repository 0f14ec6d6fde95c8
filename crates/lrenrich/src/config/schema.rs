use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Worker threads per batch. `0` means one per logical CPU.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default)]
    pub max_images: Option<usize>,
    #[serde(default = "default_true")]
    pub use_checkpoint: bool,
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,
    /// Process memory ceiling in MiB. `0` disables the memory valve.
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u64,
    #[serde(default = "default_memory_pressure_ratio")]
    pub memory_pressure_ratio: f64,
    #[serde(default = "default_preview_max_resolution")]
    pub preview_max_resolution: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default = "default_true")]
    pub deep_search: bool,
    #[serde(default = "default_true")]
    pub use_smart_previews: bool,
    #[serde(default)]
    pub use_original_if_no_preview: bool,
    #[serde(default)]
    pub known_preview_patterns: Vec<String>,
    #[serde(default = "default_true")]
    pub use_preview_db: bool,
    #[serde(default = "default_true")]
    pub use_id_global: bool,
    #[serde(default = "default_db_busy_timeout_ms")]
    pub db_busy_timeout_ms: u64,
    #[serde(default = "default_db_max_retries")]
    pub db_max_retries: u32,
    #[serde(default = "default_db_write_retries")]
    pub db_write_retries: u32,
    #[serde(default = "default_db_retry_base_ms")]
    pub db_retry_base_ms: u64,
    #[serde(default)]
    pub use_hierarchical_keywords: bool,
    #[serde(default = "default_keyword_delimiter")]
    pub keyword_delimiter: String,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub debug_mode: bool,
}

impl Config {
    /// Resolves `max_workers`, mapping `0` to the number of logical CPUs.
    pub fn worker_count(&self) -> usize {
        if self.max_workers == 0 {
            num_cpus::get()
        } else {
            self.max_workers
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            analyzer: AnalyzerConfig::default(),
            batch_size: default_batch_size(),
            max_workers: default_max_workers(),
            max_images: None,
            use_checkpoint: true,
            checkpoint_interval: default_checkpoint_interval(),
            memory_limit_mb: default_memory_limit_mb(),
            memory_pressure_ratio: default_memory_pressure_ratio(),
            preview_max_resolution: default_preview_max_resolution(),
            jpeg_quality: default_jpeg_quality(),
            deep_search: true,
            use_smart_previews: true,
            use_original_if_no_preview: false,
            known_preview_patterns: Vec::new(),
            use_preview_db: true,
            use_id_global: true,
            db_busy_timeout_ms: default_db_busy_timeout_ms(),
            db_max_retries: default_db_max_retries(),
            db_write_retries: default_db_write_retries(),
            db_retry_base_ms: default_db_retry_base_ms(),
            use_hierarchical_keywords: false,
            keyword_delimiter: default_keyword_delimiter(),
            logging: LoggingConfig::default(),
            debug_mode: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_batch_size() -> usize {
    10
}

fn default_max_workers() -> usize {
    1
}

fn default_checkpoint_interval() -> usize {
    5
}

fn default_memory_limit_mb() -> u64 {
    1024
}

fn default_memory_pressure_ratio() -> f64 {
    0.8
}

fn default_preview_max_resolution() -> u32 {
    1024
}

fn default_jpeg_quality() -> u8 {
    85
}

fn default_db_busy_timeout_ms() -> u64 {
    5000
}

fn default_db_max_retries() -> u32 {
    3
}

fn default_db_write_retries() -> u32 {
    5
}

fn default_db_retry_base_ms() -> u64 {
    500
}

fn default_keyword_delimiter() -> String {
    "|".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerProvider {
    /// Local Ollama server (`/api/generate`).
    #[default]
    Ollama,
    /// Any HTTP service accepting a base64 image and answering with JSON.
    Endpoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default)]
    pub provider: AnalyzerProvider,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_prompt")]
    pub prompt: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_analyzer_retries")]
    pub max_retries: u32,
}

fn default_api_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llava".to_string()
}

fn default_prompt() -> String {
    "Analyze this photograph. Respond with a single JSON object with the fields \
     keywords (array of strings), tags (array of strings), categories (object of \
     string arrays), aesthetic_score (number from 0 to 10) and description (string)."
        .to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_analyzer_retries() -> u32 {
    3
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            provider: AnalyzerProvider::default(),
            api_url: default_api_url(),
            model: default_model(),
            api_key: None,
            prompt: default_prompt(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_analyzer_retries(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            file: None,
        }
    }
}
