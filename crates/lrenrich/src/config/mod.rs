pub mod loader;
pub mod schema;
pub mod variables;

pub use loader::{load_config, load_config_from_str};
pub use schema::{AnalyzerConfig, AnalyzerProvider, Config, LogFormat, LoggingConfig};
pub use variables::substitute_env_vars;
