//! Category-partitioned key mapping table.
//!
//! Three collections (item slots, hero skills, unit skills) behind one
//! table-wide mutex. The hook callback and the configuration path both go
//! through it, and every operation holds the lock for that operation only,
//! so a lookup sees the table entirely before or entirely after a mutation.

#[cfg(test)]
mod tests;
pub mod types;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::error::{Result, WarKeyError};
use crate::keys::{DEFAULT_HERO_SKILL_KEYS, DEFAULT_ITEM_KEYS};
use crate::profile::ConfigSnapshot;

pub use types::*;

#[derive(Debug, Default)]
struct Collections {
    item_slots: Vec<MappingEntry>,
    hero_skills: Vec<MappingEntry>,
    unit_skills: Vec<MappingEntry>,
}

impl Collections {
    fn get(&self, category: Category) -> Option<&Vec<MappingEntry>> {
        match category {
            Category::ItemSlot => Some(&self.item_slots),
            Category::HeroSkill => Some(&self.hero_skills),
            Category::UnitSkill => Some(&self.unit_skills),
            Category::Unknown => None,
        }
    }

    fn get_mut(&mut self, category: Category) -> Option<&mut Vec<MappingEntry>> {
        match category {
            Category::ItemSlot => Some(&mut self.item_slots),
            Category::HeroSkill => Some(&mut self.hero_skills),
            Category::UnitSkill => Some(&mut self.unit_skills),
            Category::Unknown => None,
        }
    }

    fn find(&self, vk_code: u32, category: Category) -> Option<&MappingEntry> {
        self.get(category)?
            .iter()
            .find(|m| m.enabled && m.original_vk == vk_code)
    }

    fn insert(&mut self, mut entry: MappingEntry) -> Result<AddOutcome> {
        if let Err(reason) = entry.validate() {
            return Err(WarKeyError::InvalidMappingEntry {
                category: entry.category,
                position: entry.position,
                reason,
            });
        }
        entry.resolve_key_codes();

        let Some(mappings) = self.get_mut(entry.category) else {
            return Err(WarKeyError::InvalidMappingEntry {
                category: entry.category,
                position: entry.position,
                reason: "category is unknown",
            });
        };
        match mappings.iter_mut().find(|m| m.position == entry.position) {
            Some(existing) => {
                *existing = entry;
                Ok(AddOutcome::Replaced)
            }
            None => {
                mappings.push(entry);
                Ok(AddOutcome::Added)
            }
        }
    }

    fn clear(&mut self) {
        self.item_slots.clear();
        self.hero_skills.clear();
        self.unit_skills.clear();
    }
}

#[derive(Debug, Default)]
pub struct MappingTable {
    inner: Mutex<Collections>,
    lookups: AtomicU64,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table holding the default item-slot and hero-skill identity mappings.
    pub fn with_defaults() -> Self {
        let table = Self::new();
        table.load_defaults();
        table
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds an entry, replacing any entry at the same (category, position).
    ///
    /// # Errors
    ///
    /// Returns `InvalidMappingEntry` and leaves the table unchanged if the
    /// entry has an empty key name or an unknown category.
    pub fn add(&self, entry: MappingEntry) -> Result<AddOutcome> {
        let (category, position) = (entry.category, entry.position);
        let summary = format!("{} -> {}", entry.original, entry.mapped);

        match self.lock().insert(entry) {
            Ok(outcome) => {
                info!(%category, position, mapping = %summary, ?outcome, "Key mapping stored");
                Ok(outcome)
            }
            Err(e) => {
                warn!(%category, position, mapping = %summary, "Rejected key mapping: {e}");
                Err(e)
            }
        }
    }

    /// Same as [`add`](Self::add).
    pub fn update(&self, entry: MappingEntry) -> Result<AddOutcome> {
        self.add(entry)
    }

    /// Removes the entry at `position`. Returns whether anything was removed.
    pub fn remove(&self, category: Category, position: u32) -> bool {
        let mut collections = self.lock();
        let Some(mappings) = collections.get_mut(category) else {
            return false;
        };
        let Some(index) = mappings.iter().position(|m| m.position == position) else {
            return false;
        };
        mappings.remove(index);
        drop(collections);

        info!(%category, position, "Key mapping removed");
        true
    }

    /// Toggles one entry. Returns false if no entry is at that position.
    pub fn set_enabled(&self, category: Category, position: u32, enabled: bool) -> bool {
        let mut collections = self.lock();
        let found = match collections
            .get_mut(category)
            .and_then(|mappings| mappings.iter_mut().find(|m| m.position == position))
        {
            Some(mapping) => {
                mapping.enabled = enabled;
                true
            }
            None => false,
        };
        drop(collections);

        if found {
            debug!(%category, position, enabled, "Key mapping toggled");
        }
        found
    }

    /// Toggles every entry of a category. Returns how many were touched.
    pub fn set_all_enabled(&self, category: Category, enabled: bool) -> usize {
        let mut collections = self.lock();
        let Some(mappings) = collections.get_mut(category) else {
            return 0;
        };
        mappings.iter_mut().for_each(|m| m.enabled = enabled);
        mappings.len()
    }

    /// First enabled entry of `category` whose original key is `vk_code`.
    pub fn find_by_key(&self, vk_code: u32, category: Category) -> Option<MappingEntry> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.lock().find(vk_code, category).cloned()
    }

    pub fn contains_key(&self, vk_code: u32, category: Category) -> bool {
        self.find_by_key(vk_code, category).is_some()
    }

    /// Scans item slots, then hero skills, then unit skills under a single
    /// lock acquisition. The first enabled match wins.
    #[inline]
    pub fn resolve(&self, vk_code: u32) -> Option<ResolvedKey> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let collections = self.lock();
        Category::ACTIVE.iter().find_map(|&category| {
            collections.find(vk_code, category).map(|m| ResolvedKey {
                category,
                position: m.position,
                mapped_vk: m.mapped_vk,
            })
        })
    }

    /// Number of lookups served so far.
    pub fn lookup_count(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    pub fn entries(&self, category: Category) -> Vec<MappingEntry> {
        self.lock().get(category).cloned().unwrap_or_default()
    }

    pub fn len(&self, category: Category) -> usize {
        self.lock().get(category).map_or(0, Vec::len)
    }

    pub fn total_len(&self) -> usize {
        let collections = self.lock();
        Category::ACTIVE
            .iter()
            .filter_map(|&c| collections.get(c))
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }

    pub fn clear(&self, category: Category) {
        if let Some(mappings) = self.lock().get_mut(category) {
            mappings.clear();
        }
        info!(%category, "Key mappings cleared");
    }

    pub fn clear_all(&self) {
        self.lock().clear();
        info!("All key mappings cleared");
    }

    /// Replaces one collection. Invalid entries are skipped; returns how many
    /// were stored.
    pub fn replace(&self, category: Category, entries: Vec<MappingEntry>) -> usize {
        let mut collections = self.lock();
        if let Some(mappings) = collections.get_mut(category) {
            mappings.clear();
        } else {
            return 0;
        }

        let mut stored = 0;
        for mut entry in entries {
            entry.category = category;
            if collections.insert(entry).is_ok() {
                stored += 1;
            }
        }
        stored
    }

    /// Replaces all three collections with the snapshot's mapping lists.
    ///
    /// Entries are normalized to the category of the list they came from and
    /// go through the same checks as [`add`](Self::add); failures are counted
    /// and skipped.
    pub fn import_snapshot(&self, snapshot: &ConfigSnapshot) -> ImportReport {
        let mut report = ImportReport::default();
        let mut collections = self.lock();
        collections.clear();

        for category in Category::ACTIVE {
            for entry in snapshot.mappings(category) {
                let mut entry = entry.clone();
                entry.category = category;
                match collections.insert(entry) {
                    Ok(AddOutcome::Added) => report.imported += 1,
                    Ok(AddOutcome::Replaced) => report.replaced += 1,
                    Err(_) => report.rejected += 1,
                }
            }
        }
        drop(collections);

        if report.rejected > 0 || report.replaced > 0 {
            warn!(
                profile = %snapshot.name,
                imported = report.imported,
                replaced = report.replaced,
                rejected = report.rejected,
                "Imported profile with duplicate or invalid mappings"
            );
        } else {
            info!(profile = %snapshot.name, imported = report.imported, "Imported profile");
        }
        report
    }

    /// Writes the three collections into `snapshot`, keeping its other fields.
    pub fn export_into(&self, snapshot: &mut ConfigSnapshot) {
        let collections = self.lock();
        for category in Category::ACTIVE {
            if let (Some(list), Some(mappings)) =
                (snapshot.mappings_mut(category), collections.get(category))
            {
                *list = mappings.clone();
            }
        }
    }

    /// A snapshot named `name` with default flags and the current mappings.
    pub fn export_snapshot(&self, name: &str) -> ConfigSnapshot {
        let mut snapshot = ConfigSnapshot::empty(name);
        self.export_into(&mut snapshot);
        snapshot
    }

    /// Whether every stored entry still satisfies the entry invariant.
    pub fn validate_all(&self) -> bool {
        let collections = self.lock();
        Category::ACTIVE
            .iter()
            .filter_map(|&c| collections.get(c))
            .flatten()
            .all(MappingEntry::is_valid)
    }

    /// Appends the default identity mappings (keys 1-6 on item slots,
    /// Q/W/E/R on hero skills), replacing any at the same positions.
    pub fn load_defaults(&self) {
        let mut collections = self.lock();
        for entry in default_entries() {
            let _ = collections.insert(entry);
        }
        info!("Default key mappings loaded");
    }

    /// Test hook: puts an entry in place without validation.
    #[cfg(test)]
    fn insert_unchecked(&self, entry: MappingEntry) {
        if let Some(mappings) = self.lock().get_mut(entry.category) {
            mappings.push(entry);
        }
    }
}

/// Identity mappings for the default key layout.
pub fn default_entries() -> Vec<MappingEntry> {
    let items = DEFAULT_ITEM_KEYS
        .iter()
        .enumerate()
        .map(|(i, key)| MappingEntry::new(Category::ItemSlot, i as u32, key, key));
    let heroes = DEFAULT_HERO_SKILL_KEYS
        .iter()
        .enumerate()
        .map(|(i, key)| MappingEntry::new(Category::HeroSkill, i as u32, key, key));
    items.chain(heroes).collect()
}
