use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::keys;

pub const CONFIG_FILE_NAME: &str = "WarKey.toml";
pub const MIN_POLL_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_profile_dir")]
    pub profile_dir: String,
    #[serde(default = "default_active_profile")]
    pub active_profile: String,
    /// Empty disables the toggle key.
    #[serde(default = "default_toggle_key")]
    pub toggle_key: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_window_signature")]
    pub window_class: String,
    #[serde(default = "default_window_signature")]
    pub window_title: String,
    #[serde(default = "default_target_processes")]
    pub target_processes: Vec<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_profile_dir() -> String {
    "profiles".to_string()
}
fn default_active_profile() -> String {
    crate::profile::DEFAULT_PROFILE.to_string()
}
fn default_toggle_key() -> String {
    "SCROLL".to_string()
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_window_signature() -> String {
    "Warcraft III".to_string()
}
fn default_target_processes() -> Vec<String> {
    vec!["war3.exe".to_string(), "Warcraft III.exe".to_string()]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            profile_dir: default_profile_dir(),
            active_profile: default_active_profile(),
            toggle_key: default_toggle_key(),
            poll_interval_ms: default_poll_interval_ms(),
            window_class: default_window_signature(),
            window_title: default_window_signature(),
            target_processes: default_target_processes(),
        }
    }
}

impl AppConfig {
    /// Load config from file, or create default if not exists
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        if !path.as_ref().exists() {
            let default_config = Self::default();
            default_config.save_to_file(&path)?;
            return Ok(default_config);
        }
        Self::load_from_file(path)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config: AppConfig = toml::from_str(&content)?;

        if config.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            config.poll_interval_ms = MIN_POLL_INTERVAL_MS;
        }
        if config.active_profile.trim().is_empty() {
            config.active_profile = default_active_profile();
        }
        config.target_processes.retain(|name| !name.trim().is_empty());

        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = format!(
            "log_level = {:?}            # trace, debug, info, warn or error (RUST_LOG overrides)\n\
             profile_dir = {:?}      # Directory holding one <name>.toml per profile\n\
             active_profile = {:?}    # Profile loaded at startup\n\
             toggle_key = {:?}          # Key that pauses/resumes remapping (empty = none)\n\
             poll_interval_ms = {}        # Game window detection interval in ms (min 100)\n\n\
             # Window signature of the game, matched by class name or title substring\n\
             window_class = {:?}\n\
             window_title = {:?}\n\n\
             # Process names treated as the game, besides the profile's game_process\n\
             target_processes = {:?}\n",
            self.log_level,
            self.profile_dir,
            self.active_profile,
            self.toggle_key,
            self.poll_interval_ms,
            self.window_class,
            self.window_title,
            self.target_processes,
        );

        fs::write(path, content)?;
        Ok(())
    }

    /// Virtual key of the toggle key, `None` when disabled.
    pub fn toggle_vk(&self) -> anyhow::Result<Option<u32>> {
        let name = self.toggle_key.trim();
        if name.is_empty() {
            return Ok(None);
        }
        keys::key_name_to_vk(name)
            .map(Some)
            .ok_or_else(|| anyhow::anyhow!("Unknown toggle key: {name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("warkey_config_{}_{}.toml", name, std::process::id()))
    }

    #[test]
    fn test_save_then_load_keeps_values() {
        let path = temp_path("save_load");
        let mut config = AppConfig::default();
        config.toggle_key = "F12".to_string();
        config.target_processes.push("w3l.exe".to_string());

        config.save_to_file(&path).unwrap();
        let loaded = AppConfig::load_from_file(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_poll_interval_is_clamped() {
        let path = temp_path("clamp");
        fs::write(&path, "poll_interval_ms = 5\nactive_profile = \"\"\n").unwrap();

        let loaded = AppConfig::load_from_file(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(loaded.poll_interval_ms, MIN_POLL_INTERVAL_MS);
        assert_eq!(loaded.active_profile, "Default");
        assert_eq!(loaded.window_class, "Warcraft III");
    }

    #[test]
    fn test_toggle_vk() {
        let mut config = AppConfig::default();
        assert_eq!(config.toggle_vk().unwrap(), Some(0x91));

        config.toggle_key = String::new();
        assert_eq!(config.toggle_vk().unwrap(), None);

        config.toggle_key = "NOT_A_KEY".to_string();
        assert!(config.toggle_vk().is_err());
    }
}
