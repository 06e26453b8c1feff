use std::env;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

pub const BASE_URL_ENV: &str = "TOKENDESK_BASE_URL";

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub base_url: Option<String>,
    pub timeout: Option<u64>,
    #[serde(alias = "limit")]
    pub page_limit: Option<u32>,
    pub proxy: Option<String>,
    pub header: Option<String>,
    pub no_color: Option<bool>,
    pub output_format: Option<String>,
    pub log_level: Option<String>,
    pub strict_amount: Option<bool>,
}

impl ConfigFile {
    /// Environment overrides that sit between the config file and CLI flags.
    pub fn apply_env(mut self) -> Self {
        if let Ok(url) = env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.base_url = Some(url);
            }
        }
        self
    }
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
        .or_else(|| {
            let drive = env::var_os("HOMEDRIVE")?;
            let path = env::var_os("HOMEPATH")?;
            Some(PathBuf::from(drive).join(path))
        })
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(home_dir()?.join(".tokendesk").join("config.yml"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn load_config(path: &PathBuf, allow_missing: bool) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_yaml::from_str::<Option<ConfigFile>>(&contents)
            .map(Option::unwrap_or_default)
            .map_err(|e| format!("failed to parse config '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}

fn default_config_yaml() -> String {
    r#"# tokendesk config
#
# Location (default):
#   ~/.tokendesk/config.yml

# Backend (TOKENDESK_BASE_URL overrides this)
base_url: http://localhost:8080

# Per-request timeout in seconds (0 = none)
timeout: 30

# Tokens per page
page_limit: 5

# HTTP (optional)
# proxy: http://127.0.0.1:8080
# header: "Authorization: Bearer ..."

# Reject amounts that are not whole integers instead of sending null
strict_amount: false

# Output
output_format: text
no_color: false

# error, warn, info, debug or trace (RUST_LOG wins when set)
log_level: warn
"#
    .to_string()
}

pub fn ensure_default_config_file(path: &PathBuf) -> Result<bool, String> {
    if path.exists() {
        return Ok(false);
    }
    let parent = path
        .parent()
        .ok_or_else(|| format!("invalid config path '{}'", path.display()))?;
    std::fs::create_dir_all(parent).map_err(|e| {
        format!(
            "failed to create config directory '{}': {e}",
            parent.display()
        )
    })?;
    std::fs::write(path, default_config_yaml())
        .map_err(|e| format!("failed to write config file '{}': {e}", path.display()))?;
    Ok(true)
}
