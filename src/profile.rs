//! Named mapping profiles.
//!
//! A [`ConfigSnapshot`] is the unit the mapping table imports and exports.
//! [`ProfileStore`] keeps a directory of `<name>.toml` snapshots and always
//! holds a `Default` profile.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, WarKeyError};
use crate::mapping::{self, Category, MappingEntry};

pub const DEFAULT_PROFILE: &str = "Default";
pub const DEFAULT_GAME_PROCESS: &str = "war3.exe";
const PROFILE_EXTENSION: &str = "toml";

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_true() -> bool {
    true
}

fn default_game_process() -> String {
    DEFAULT_GAME_PROCESS.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default = "default_true")]
    pub show_notifications: bool,
    #[serde(default)]
    pub use_modifier_key: bool,
    #[serde(default)]
    pub modifier_key: String,
    #[serde(default = "default_game_process")]
    pub game_process: String,
    #[serde(default)]
    pub item_mappings: Vec<MappingEntry>,
    #[serde(default)]
    pub hero_skill_mappings: Vec<MappingEntry>,
    #[serde(default)]
    pub unit_skill_mappings: Vec<MappingEntry>,
}

impl ConfigSnapshot {
    /// A snapshot with default flags and no mappings.
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: default_version(),
            auto_start: false,
            show_notifications: true,
            use_modifier_key: false,
            modifier_key: String::new(),
            game_process: default_game_process(),
            item_mappings: Vec::new(),
            hero_skill_mappings: Vec::new(),
            unit_skill_mappings: Vec::new(),
        }
    }

    /// A snapshot holding the default identity mappings.
    pub fn default_named(name: &str) -> Self {
        let mut snapshot = Self::empty(name);
        for entry in mapping::default_entries() {
            if let Some(list) = snapshot.mappings_mut(entry.category) {
                list.push(entry);
            }
        }
        snapshot
    }

    pub fn mappings(&self, category: Category) -> &[MappingEntry] {
        match category {
            Category::ItemSlot => &self.item_mappings,
            Category::HeroSkill => &self.hero_skill_mappings,
            Category::UnitSkill => &self.unit_skill_mappings,
            Category::Unknown => &[],
        }
    }

    pub fn mappings_mut(&mut self, category: Category) -> Option<&mut Vec<MappingEntry>> {
        match category {
            Category::ItemSlot => Some(&mut self.item_mappings),
            Category::HeroSkill => Some(&mut self.hero_skill_mappings),
            Category::UnitSkill => Some(&mut self.unit_skill_mappings),
            Category::Unknown => None,
        }
    }

    pub fn mapping_count(&self) -> usize {
        Category::ACTIVE.iter().map(|&c| self.mappings(c).len()).sum()
    }

    /// Stamps each entry with the category of its list and fills in missing
    /// key codes. Serialized entries do not carry their category.
    pub fn normalize(&mut self) {
        for category in Category::ACTIVE {
            if let Some(list) = self.mappings_mut(category) {
                for entry in list.iter_mut() {
                    entry.category = category;
                    entry.resolve_key_codes();
                }
            }
        }
    }

    /// Checks the profile name and every entry against its list's category.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;

        for category in Category::ACTIVE {
            for entry in self.mappings(category) {
                let mut entry = entry.clone();
                entry.category = category;
                if let Err(reason) = entry.validate() {
                    return Err(WarKeyError::InvalidSnapshot(format!(
                        "{}: {} mapping at position {}: {}",
                        self.name, category, entry.position, reason
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut snapshot: ConfigSnapshot = toml::from_str(content)?;
        snapshot.normalize();
        Ok(snapshot)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}

/// Profile names double as file stems.
fn validate_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(WarKeyError::InvalidSnapshot("profile name is empty".to_string()));
    }
    if trimmed != name || name == "." || name == ".." || name.contains(['/', '\\', ':']) {
        return Err(WarKeyError::InvalidSnapshot(format!(
            "profile name is not usable as a file name: {name:?}"
        )));
    }
    Ok(())
}

/// Directory-backed collection of named profiles.
#[derive(Debug)]
pub struct ProfileStore {
    dir: PathBuf,
    profiles: BTreeMap<String, ConfigSnapshot>,
    current: String,
}

impl ProfileStore {
    /// Opens `dir`, creating it and the `Default` profile when missing.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut store = Self {
            dir,
            profiles: BTreeMap::new(),
            current: DEFAULT_PROFILE.to_string(),
        };
        store.load_all()?;
        info!(dir = %store.dir.display(), profiles = store.profiles.len(), "Profile store opened");
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{PROFILE_EXTENSION}"))
    }

    /// Rereads every profile file. Unreadable files are skipped with a
    /// warning. Returns the number of profiles loaded.
    pub fn load_all(&mut self) -> Result<usize> {
        self.profiles.clear();

        for dir_entry in fs::read_dir(&self.dir)? {
            let path = dir_entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PROFILE_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            match ConfigSnapshot::load_from_file(&path) {
                Ok(mut snapshot) => {
                    if snapshot.name != stem {
                        debug!(file = stem, name = %snapshot.name, "Profile name follows its file name");
                        snapshot.name = stem.to_string();
                    }
                    self.profiles.insert(snapshot.name.clone(), snapshot);
                }
                Err(e) => warn!(path = %path.display(), "Skipping unreadable profile: {e}"),
            }
        }

        if !self.profiles.contains_key(DEFAULT_PROFILE) {
            self.save(ConfigSnapshot::default_named(DEFAULT_PROFILE))?;
            info!("Created default profile");
        }
        if !self.profiles.contains_key(&self.current) {
            self.current = DEFAULT_PROFILE.to_string();
        }
        Ok(self.profiles.len())
    }

    pub fn get(&self, name: &str) -> Option<&ConfigSnapshot> {
        self.profiles.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    pub fn current_name(&self) -> &str {
        &self.current
    }

    pub fn current(&self) -> Option<&ConfigSnapshot> {
        self.profiles.get(&self.current)
    }

    pub fn set_current(&mut self, name: &str) -> Result<()> {
        if !self.profiles.contains_key(name) {
            return Err(WarKeyError::ProfileNotFound(name.to_string()));
        }
        self.current = name.to_string();
        info!(profile = name, "Active profile changed");
        Ok(())
    }

    pub fn names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn validate(&self, snapshot: &ConfigSnapshot) -> Result<()> {
        snapshot.validate()
    }

    /// Writes the profile to disk and stores it, replacing one of the same name.
    pub fn save(&mut self, mut snapshot: ConfigSnapshot) -> Result<()> {
        snapshot.validate()?;
        snapshot.normalize();
        snapshot.save_to_file(self.path_for(&snapshot.name))?;
        debug!(profile = %snapshot.name, mappings = snapshot.mapping_count(), "Profile saved");
        self.profiles.insert(snapshot.name.clone(), snapshot);
        Ok(())
    }

    /// Removes a profile and its file. Falls back to `Default` when the
    /// active profile is deleted.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        if name == DEFAULT_PROFILE {
            return Err(WarKeyError::ProtectedProfile(name.to_string()));
        }
        if self.profiles.remove(name).is_none() {
            return Err(WarKeyError::ProfileNotFound(name.to_string()));
        }

        let path = self.path_for(name);
        if let Err(e) = fs::remove_file(&path) {
            warn!(path = %path.display(), "Failed to remove profile file: {e}");
        }
        if self.current == name {
            self.current = DEFAULT_PROFILE.to_string();
        }
        info!(profile = name, "Profile deleted");
        Ok(())
    }

    pub fn rename(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        if old_name == DEFAULT_PROFILE {
            return Err(WarKeyError::ProtectedProfile(old_name.to_string()));
        }
        validate_name(new_name)?;
        if self.profiles.contains_key(new_name) {
            return Err(WarKeyError::ProfileExists(new_name.to_string()));
        }
        let Some(mut snapshot) = self.profiles.remove(old_name) else {
            return Err(WarKeyError::ProfileNotFound(old_name.to_string()));
        };

        snapshot.name = new_name.to_string();
        if let Err(e) = snapshot.save_to_file(self.path_for(new_name)) {
            snapshot.name = old_name.to_string();
            self.profiles.insert(old_name.to_string(), snapshot);
            return Err(e);
        }
        let _ = fs::remove_file(self.path_for(old_name));
        self.profiles.insert(new_name.to_string(), snapshot);

        if self.current == old_name {
            self.current = new_name.to_string();
        }
        info!(from = old_name, to = new_name, "Profile renamed");
        Ok(())
    }

    pub fn copy(&mut self, source: &str, dest: &str) -> Result<()> {
        if self.profiles.contains_key(dest) {
            return Err(WarKeyError::ProfileExists(dest.to_string()));
        }
        let Some(snapshot) = self.profiles.get(source) else {
            return Err(WarKeyError::ProfileNotFound(source.to_string()));
        };

        let mut copy = snapshot.clone();
        copy.name = dest.to_string();
        self.save(copy)?;
        info!(from = source, to = dest, "Profile copied");
        Ok(())
    }

    /// Reads a profile from an arbitrary file and stores it under its own
    /// name, overwriting a profile of the same name. Returns that name.
    pub fn import_file<P: AsRef<Path>>(&mut self, path: P) -> Result<String> {
        let snapshot = ConfigSnapshot::load_from_file(path.as_ref())?;
        let name = snapshot.name.clone();
        self.save(snapshot)?;
        info!(profile = %name, path = %path.as_ref().display(), "Profile imported");
        Ok(name)
    }

    pub fn export_file<P: AsRef<Path>>(&self, name: &str, path: P) -> Result<()> {
        let snapshot = self
            .profiles
            .get(name)
            .ok_or_else(|| WarKeyError::ProfileNotFound(name.to_string()))?;
        snapshot.save_to_file(path.as_ref())?;
        info!(profile = name, path = %path.as_ref().display(), "Profile exported");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_named_holds_default_mappings() {
        let snapshot = ConfigSnapshot::default_named("Default");
        assert_eq!(snapshot.item_mappings.len(), 6);
        assert_eq!(snapshot.hero_skill_mappings.len(), 4);
        assert!(snapshot.unit_skill_mappings.is_empty());
        assert_eq!(snapshot.game_process, "war3.exe");
        assert_eq!(snapshot.version, env!("CARGO_PKG_VERSION"));
        assert!(snapshot.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_names() {
        for name in ["", "  ", "a/b", "a\\b", "..", " padded"] {
            assert!(ConfigSnapshot::empty(name).validate().is_err(), "{name:?}");
        }
        assert!(ConfigSnapshot::empty("Ladder 1v1").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_keys_in_any_list() {
        let mut snapshot = ConfigSnapshot::empty("broken");
        snapshot.unit_skill_mappings.push(MappingEntry::new(Category::Unknown, 0, "A", ""));
        assert!(matches!(
            snapshot.validate(),
            Err(WarKeyError::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn test_toml_restores_categories_from_lists() {
        let toml = r#"
name = "hand-written"

[[hero_skill_mappings]]
original = "Q"
mapped = "T"
position = 0
"#;
        let snapshot = ConfigSnapshot::from_toml(toml).unwrap();
        let entry = &snapshot.hero_skill_mappings[0];

        assert_eq!(entry.category, Category::HeroSkill);
        assert_eq!(entry.original_vk, 0x51);
        assert_eq!(entry.mapped_vk, 0x54);
        assert!(entry.enabled);
        assert!(snapshot.show_notifications);
        assert_eq!(snapshot.game_process, "war3.exe");
    }

    #[test]
    fn test_toml_output_parses_back() {
        let mut snapshot = ConfigSnapshot::default_named("serialized");
        snapshot.auto_start = true;
        snapshot.item_mappings[2].enabled = false;

        let parsed = ConfigSnapshot::from_toml(&snapshot.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, snapshot);
    }
}
