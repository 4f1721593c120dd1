pub mod config;
pub mod sniff;

pub use config::{AppConfig, ConfigManager};
pub use sniff::{resolve_api_key, API_KEY_ENV_VARS};
