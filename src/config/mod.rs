use std::env;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

pub const DEFAULT_CRUMB_FIELD: &str = "Jenkins-Crumb";

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ConfigFile {
    #[serde(alias = "form_file")]
    pub form: Option<String>,
    #[serde(alias = "policy")]
    pub save_policy: Option<String>,
    pub output_format: Option<String>,
    #[serde(alias = "url")]
    pub server_url: Option<String>,
    pub crumb_field: Option<String>,
    pub crumb_value: Option<String>,
    pub poll_interval: Option<u64>,
    pub settle_delay: Option<u64>,
    pub timeout: Option<u64>,
    pub workers: Option<usize>,
    pub no_color: Option<bool>,
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
    Some(home_dir()?.join(".eventfilter").join("config.yml"))
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
        Ok(contents) => serde_yaml::from_str::<ConfigFile>(&contents)
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
    r#"# eventfilter config
#
# Location (default):
#   ~/.eventfilter/config.yml

# Form fields of the event filter page (YAML or JSON mapping with
# allEvents, defaultFilter, filterInForm and optionally filterOutForm).
# Without a form file the built-in event catalog is used.
# form: ./event-filter.yml

# How the filter is written back on save:
#   sentinel - space separated filter-in list, or "null" when it equals the default
#   dual     - both lists as [a, b, c]
save_policy: sentinel

# Output
output_format: text
no_color: false

# Server status console (optional)
# server_url: https://ci.example.com/gerrit-trigger
# crumb_field: Jenkins-Crumb
# crumb_value: ""

# Seconds between server table refreshes
poll_interval: 30
# Milliseconds to wait after a connection toggle before refreshing
settle_delay: 1000
# Per-request timeout in seconds
timeout: 10
workers: 2
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
    let contents = default_config_yaml();
    std::fs::write(path, contents)
        .map_err(|e| format!("failed to write config file '{}': {e}", path.display()))?;
    Ok(true)
}
