use crate::models::default_candidates;
use crate::persona::Persona;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const DEFAULT_TEMPERATURE: f64 = 0.3;

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

/// The main configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Gemini API key. Environment variables are used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Candidate models in probe order.
    #[serde(default = "default_candidates")]
    pub candidate_models: Vec<String>,

    /// Build candidates from the live catalog instead of `candidate_models`.
    #[serde(default)]
    pub use_catalog: bool,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Override for the Generative Language API base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default)]
    pub persona: Persona,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            candidate_models: default_candidates(),
            use_catalog: false,
            temperature: DEFAULT_TEMPERATURE,
            base_url: None,
            persona: Persona::default(),
        }
    }
}

impl AppConfig {
    /// Temperature clamped to the 0.0..=1.0 range the form slider allows.
    pub fn effective_temperature(&self) -> f64 {
        if self.temperature.is_finite() {
            self.temperature.clamp(0.0, 1.0)
        } else {
            DEFAULT_TEMPERATURE
        }
    }
}

/// Manages reading/writing the config file with safe atomic writes + file lock.
#[derive(Clone)]
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    /// Create a config manager with a custom path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a config manager with the default path (~/.studybuddy/config.json).
    pub fn default_path() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(home.join(".studybuddy").join("config.json"))
    }

    /// Get the config file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        // A sibling lock file (avoids locking the config file itself during atomic replace).
        self.path.with_extension("json.lock")
    }

    /// Create the parent directory if it is missing. Only a directory created
    /// here is restricted to 700; an existing one keeps its mode.
    fn ensure_parent(&self) -> anyhow::Result<()> {
        let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };
        if parent.exists() {
            return Ok(());
        }

        fs::create_dir_all(parent)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(parent, fs::Permissions::from_mode(0o700));
        }
        Ok(())
    }

    fn with_exclusive_lock<T>(&self, f: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
        self.ensure_parent()?;

        let lock_file = fs::OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())?;

        lock_file.lock_exclusive()?;
        let out = f();
        let _ = lock_file.unlock();
        out
    }

    /// Load the config from disk. Returns default if file doesn't exist.
    pub fn load(&self) -> anyhow::Result<AppConfig> {
        self.with_exclusive_lock(|| self.load_unlocked())
    }

    /// Save the config to disk atomically (write to temp file, then rename).
    pub fn save(&self, config: &AppConfig) -> anyhow::Result<()> {
        self.with_exclusive_lock(|| self.save_unlocked(config))
    }

    /// Store an API key. A blank key clears it so environment variables apply again.
    pub fn set_api_key(&self, key: &str) -> anyhow::Result<()> {
        self.update(|cfg| {
            let key = key.trim();
            cfg.api_key = (!key.is_empty()).then(|| key.to_string());
            Ok(())
        })
    }

    /// Replace the candidate model list, keeping the given order.
    pub fn set_candidate_models(&self, models: &[String]) -> anyhow::Result<()> {
        self.update(|cfg| {
            let mut list: Vec<String> = Vec::new();
            for m in models {
                let m = crate::resolver::normalize_model_id(m);
                if !m.is_empty() && !list.iter().any(|x| x == m) {
                    list.push(m.to_string());
                }
            }
            if list.is_empty() {
                anyhow::bail!("at least one candidate model is required");
            }
            cfg.candidate_models = list;
            Ok(())
        })
    }

    pub fn set_use_catalog(&self, use_catalog: bool) -> anyhow::Result<()> {
        self.update(|cfg| {
            cfg.use_catalog = use_catalog;
            Ok(())
        })
    }

    fn update(&self, f: impl FnOnce(&mut AppConfig) -> anyhow::Result<()>) -> anyhow::Result<()> {
        self.with_exclusive_lock(|| {
            let mut cfg = self.load_unlocked()?;
            f(&mut cfg)?;
            self.save_unlocked(&cfg)
        })
    }

    fn load_unlocked(&self) -> anyhow::Result<AppConfig> {
        if !self.path.exists() {
            return Ok(AppConfig::default());
        }
        let content = fs::read_to_string(&self.path)?;
        let cfg: AppConfig = serde_json::from_str(&content)?;
        Ok(cfg)
    }

    fn save_unlocked(&self, config: &AppConfig) -> anyhow::Result<()> {
        self.ensure_parent()?;

        let json = serde_json::to_string_pretty(config)?;

        // Write to a temp file in the same directory, then rename for atomicity
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }

        // The file holds an API key: 600 on Unix (before rename)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600));
        }

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}
