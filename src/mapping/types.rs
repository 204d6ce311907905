//! Mapping entry and category definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::keys;

/// Partition of mapping entries. `Unknown` never holds entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ItemSlot,
    HeroSkill,
    UnitSkill,
    #[default]
    Unknown,
}

impl Category {
    /// Categories that own a collection, in lookup priority order.
    pub const ACTIVE: [Category; 3] = [Category::ItemSlot, Category::HeroSkill, Category::UnitSkill];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ItemSlot => "item_slot",
            Category::HeroSkill => "hero_skill",
            Category::UnitSkill => "unit_skill",
            Category::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = std::convert::Infallible;

    /// Unrecognized names map to `Unknown`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "item" | "item_slot" => Category::ItemSlot,
            "hero_skill" | "hero" => Category::HeroSkill,
            "unit_skill" | "unit" => Category::UnitSkill,
            _ => Category::Unknown,
        })
    }
}

fn default_enabled() -> bool {
    true
}

/// Rule translating one original key into one replacement key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub original: String,
    #[serde(default)]
    pub original_vk: u32,
    pub mapped: String,
    #[serde(default)]
    pub mapped_vk: u32,
    /// Implied by the snapshot list an entry is stored in.
    #[serde(default, skip_serializing)]
    pub category: Category,
    pub position: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl MappingEntry {
    /// Builds an enabled entry, resolving both key codes from their names.
    pub fn new(category: Category, position: u32, original: &str, mapped: &str) -> Self {
        let mut entry = Self {
            original: original.to_string(),
            original_vk: 0,
            mapped: mapped.to_string(),
            mapped_vk: 0,
            category,
            position,
            enabled: true,
        };
        entry.resolve_key_codes();
        entry
    }

    /// Builds an entry with explicit key codes.
    pub fn with_codes(
        category: Category,
        position: u32,
        (original, original_vk): (&str, u32),
        (mapped, mapped_vk): (&str, u32),
    ) -> Self {
        Self {
            original: original.to_string(),
            original_vk,
            mapped: mapped.to_string(),
            mapped_vk,
            category,
            position,
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Fills in unset (zero) key codes from the key names.
    pub fn resolve_key_codes(&mut self) {
        if self.original_vk == 0 {
            self.original_vk = keys::key_name_to_vk(&self.original).unwrap_or(0);
        }
        if self.mapped_vk == 0 {
            self.mapped_vk = keys::key_name_to_vk(&self.mapped).unwrap_or(0);
        }
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.original.is_empty() {
            return Err("original key is empty");
        }
        if self.mapped.is_empty() {
            return Err("mapped key is empty");
        }
        if self.category == Category::Unknown {
            return Err("category is unknown");
        }
        Ok(())
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Result of a successful lookup on the hook path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedKey {
    pub category: Category,
    pub position: u32,
    pub mapped_vk: u32,
}

/// How [`super::MappingTable::add`] stored the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    Replaced,
}

/// Outcome of a bulk import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    /// Entries that overwrote an earlier one at the same position.
    pub replaced: usize,
    pub rejected: usize,
}
