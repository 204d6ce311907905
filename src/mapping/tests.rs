//! Unit tests for the mapping table.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use crate::mapping::{AddOutcome, Category, MappingEntry, MappingTable};
    use crate::profile::ConfigSnapshot;

    fn item(position: u32, original: &str, mapped: &str) -> MappingEntry {
        MappingEntry::new(Category::ItemSlot, position, original, mapped)
    }

    #[test]
    fn test_add_resolves_key_codes() {
        let table = MappingTable::new();
        let outcome = table.add(item(0, "1", "2")).unwrap();

        assert_eq!(outcome, AddOutcome::Added);
        let entry = table.find_by_key(0x31, Category::ItemSlot).unwrap();
        assert_eq!(entry.original_vk, 0x31);
        assert_eq!(entry.mapped_vk, 0x32);
    }

    #[test]
    fn test_add_rejects_invalid_entries() {
        let table = MappingTable::new();

        assert!(table.add(item(0, "", "2")).is_err());
        assert!(table.add(item(0, "1", "")).is_err());
        assert!(
            table
                .add(MappingEntry::new(Category::Unknown, 0, "1", "2"))
                .is_err()
        );
        assert!(table.is_empty());
    }

    #[test]
    fn test_add_same_position_replaces() {
        let table = MappingTable::new();
        table.add(item(3, "4", "Z")).unwrap();
        assert_eq!(table.len(Category::ItemSlot), 1);

        let outcome = table.add(item(3, "4", "X")).unwrap();
        assert_eq!(outcome, AddOutcome::Replaced);
        assert_eq!(table.len(Category::ItemSlot), 1);
        assert_eq!(
            table.find_by_key(0x34, Category::ItemSlot).unwrap().mapped,
            "X"
        );
    }

    #[test]
    fn test_explicit_codes_are_kept() {
        let table = MappingTable::new();
        let entry = MappingEntry::with_codes(Category::ItemSlot, 0, ("1", 0x31), ("2", 0x32));
        table.add(entry).unwrap();

        let resolved = table.resolve(0x31).unwrap();
        assert_eq!(resolved.category, Category::ItemSlot);
        assert_eq!(resolved.position, 0);
        assert_eq!(resolved.mapped_vk, 0x32);

        // codes win over the names when both are set
        let entry = MappingEntry::with_codes(Category::HeroSkill, 0, ("Q", 0x70), ("W", 0x71));
        table.add(entry).unwrap();
        assert!(table.resolve(0x51).is_none());
        assert_eq!(table.resolve(0x70).unwrap().mapped_vk, 0x71);
    }

    #[test]
    fn test_update_replaces_entry_at_position() {
        let table = MappingTable::new();
        assert_eq!(table.update(item(2, "3", "4")).unwrap(), AddOutcome::Added);
        assert_eq!(table.update(item(2, "3", "5")).unwrap(), AddOutcome::Replaced);

        assert_eq!(table.len(Category::ItemSlot), 1);
        assert_eq!(table.resolve(0x33).unwrap().mapped_vk, 0x35);
        assert!(table.update(item(2, "", "5")).is_err());
        assert_eq!(table.resolve(0x33).unwrap().mapped_vk, 0x35);
    }

    #[test]
    fn test_contains_key_respects_category_and_enabled() {
        let table = MappingTable::new();
        table.add(item(0, "1", "2")).unwrap();

        assert!(table.contains_key(0x31, Category::ItemSlot));
        assert!(!table.contains_key(0x31, Category::HeroSkill));
        assert!(!table.contains_key(0x32, Category::ItemSlot));

        table.set_enabled(Category::ItemSlot, 0, false);
        assert!(!table.contains_key(0x31, Category::ItemSlot));
    }

    #[test]
    fn test_positions_are_per_category() {
        let table = MappingTable::new();
        table.add(item(0, "1", "2")).unwrap();
        table
            .add(MappingEntry::new(Category::HeroSkill, 0, "Q", "W"))
            .unwrap();

        assert_eq!(table.len(Category::ItemSlot), 1);
        assert_eq!(table.len(Category::HeroSkill), 1);
        assert_eq!(table.total_len(), 2);
    }

    #[test]
    fn test_disabled_entries_are_invisible_until_enabled() {
        let table = MappingTable::new();
        table.add(item(0, "1", "2").disabled()).unwrap();

        assert!(table.find_by_key(0x31, Category::ItemSlot).is_none());
        assert!(table.resolve(0x31).is_none());

        assert!(table.set_enabled(Category::ItemSlot, 0, true));
        assert!(table.find_by_key(0x31, Category::ItemSlot).is_some());
        assert_eq!(table.resolve(0x31).unwrap().mapped_vk, 0x32);
    }

    #[test]
    fn test_set_enabled_on_missing_entry_fails() {
        let table = MappingTable::new();
        assert!(!table.set_enabled(Category::ItemSlot, 7, true));
        assert!(!table.set_enabled(Category::Unknown, 0, true));
    }

    #[test]
    fn test_remove() {
        let table = MappingTable::new();
        table.add(item(0, "1", "2")).unwrap();
        table.add(item(1, "2", "3")).unwrap();

        assert!(table.remove(Category::ItemSlot, 0));
        assert!(!table.remove(Category::ItemSlot, 0));
        assert!(!table.remove(Category::HeroSkill, 1));
        assert_eq!(table.len(Category::ItemSlot), 1);
    }

    #[test]
    fn test_find_by_key_returns_first_match_in_collection_order() {
        let table = MappingTable::new();
        table.add(item(5, "1", "A")).unwrap();
        table.add(item(2, "1", "B")).unwrap();

        assert_eq!(
            table.find_by_key(0x31, Category::ItemSlot).unwrap().mapped,
            "A"
        );
    }

    #[test]
    fn test_resolve_prefers_item_then_hero_then_unit() {
        let table = MappingTable::new();
        table
            .add(MappingEntry::new(Category::UnitSkill, 0, "Q", "A"))
            .unwrap();
        table
            .add(MappingEntry::new(Category::HeroSkill, 0, "Q", "B"))
            .unwrap();
        assert_eq!(table.resolve(0x51).unwrap().mapped_vk, 0x42);

        table.add(item(0, "Q", "C")).unwrap();
        let resolved = table.resolve(0x51).unwrap();
        assert_eq!(resolved.category, Category::ItemSlot);
        assert_eq!(resolved.mapped_vk, 0x43);

        table.set_enabled(Category::ItemSlot, 0, false);
        table.set_enabled(Category::HeroSkill, 0, false);
        assert_eq!(table.resolve(0x51).unwrap().category, Category::UnitSkill);
    }

    #[test]
    fn test_lookup_count_tracks_queries() {
        let table = MappingTable::new();
        assert_eq!(table.lookup_count(), 0);

        table.resolve(0x31);
        table.find_by_key(0x31, Category::HeroSkill);
        assert_eq!(table.lookup_count(), 2);

        table.add(item(0, "1", "2")).unwrap();
        table.entries(Category::ItemSlot);
        assert_eq!(table.lookup_count(), 2);
    }

    #[test]
    fn test_set_all_enabled() {
        let table = MappingTable::with_defaults();

        assert_eq!(table.set_all_enabled(Category::ItemSlot, false), 6);
        assert!(table.resolve(0x31).is_none());
        assert!(table.resolve(0x51).is_some());
        assert_eq!(table.set_all_enabled(Category::Unknown, false), 0);
    }

    #[test]
    fn test_clear_and_clear_all() {
        let table = MappingTable::with_defaults();

        table.clear(Category::HeroSkill);
        assert_eq!(table.len(Category::HeroSkill), 0);
        assert_eq!(table.len(Category::ItemSlot), 6);

        table.clear_all();
        assert!(table.is_empty());
    }

    #[test]
    fn test_replace_skips_invalid_and_normalizes_category() {
        let table = MappingTable::with_defaults();
        let stored = table.replace(
            Category::UnitSkill,
            vec![
                MappingEntry::new(Category::Unknown, 0, "Z", "X"),
                MappingEntry::new(Category::UnitSkill, 1, "", "X"),
            ],
        );

        assert_eq!(stored, 1);
        assert_eq!(
            table.entries(Category::UnitSkill)[0].category,
            Category::UnitSkill
        );
        assert_eq!(table.len(Category::ItemSlot), 6);
    }

    #[test]
    fn test_defaults() {
        let table = MappingTable::with_defaults();
        assert_eq!(table.len(Category::ItemSlot), 6);
        assert_eq!(table.len(Category::HeroSkill), 4);
        assert_eq!(table.len(Category::UnitSkill), 0);
        assert!(table.validate_all());
    }

    #[test]
    fn test_validate_all_detects_bad_manual_edit() {
        let table = MappingTable::with_defaults();
        let mut broken = item(9, "1", "2");
        broken.mapped.clear();
        table.insert_unchecked(broken);

        assert!(!table.validate_all());
    }

    #[test]
    fn test_snapshot_export_then_import_into_fresh_table() {
        let source = MappingTable::with_defaults();
        source
            .add(MappingEntry::new(Category::UnitSkill, 2, "A", "F1").disabled())
            .unwrap();
        let snapshot = source.export_snapshot("custom");

        assert_eq!(snapshot.name, "custom");
        assert_eq!(snapshot.unit_skill_mappings.len(), 1);

        let target = MappingTable::new();
        let report = target.import_snapshot(&snapshot);
        assert_eq!(report.imported, 11);
        assert_eq!(report.rejected, 0);
        assert_eq!(target.entries(Category::UnitSkill), source.entries(Category::UnitSkill));
        assert!(target.resolve(0x41).is_none());
    }

    #[test]
    fn test_import_replaces_existing_and_counts_rejects() {
        let table = MappingTable::with_defaults();
        let mut snapshot = ConfigSnapshot::empty("partial");
        snapshot.hero_skill_mappings = vec![
            MappingEntry::new(Category::Unknown, 0, "Q", "T"),
            MappingEntry::new(Category::Unknown, 1, "", "T"),
        ];

        let report = table.import_snapshot(&snapshot);

        assert_eq!(report.imported, 1);
        assert_eq!(report.rejected, 1);
        assert_eq!(table.len(Category::ItemSlot), 0);
        assert_eq!(table.resolve(0x51).unwrap().mapped_vk, 0x54);
    }

    #[test]
    fn test_import_counts_duplicate_positions_as_replaced() {
        let table = MappingTable::new();
        let mut snapshot = ConfigSnapshot::empty("duplicates");
        snapshot.item_mappings = vec![item(0, "1", "2"), item(0, "1", "3")];

        let report = table.import_snapshot(&snapshot);

        assert_eq!(report.imported, 1);
        assert_eq!(report.replaced, 1);
        assert_eq!(report.rejected, 0);
        assert_eq!(table.len(Category::ItemSlot), 1);
        assert_eq!(table.resolve(0x31).unwrap().mapped_vk, 0x33);
    }

    #[test]
    fn test_export_into_keeps_profile_flags() {
        let table = MappingTable::with_defaults();
        let mut snapshot = ConfigSnapshot::empty("flags");
        snapshot.auto_start = true;
        snapshot.game_process = "custom.exe".to_string();

        table.export_into(&mut snapshot);

        assert!(snapshot.auto_start);
        assert_eq!(snapshot.game_process, "custom.exe");
        assert_eq!(snapshot.item_mappings.len(), 6);
        assert_eq!(snapshot.hero_skill_mappings.len(), 4);
    }

    #[test]
    fn test_concurrent_edits_and_lookups() {
        let table = Arc::new(MappingTable::with_defaults());

        let writer = {
            let table = table.clone();
            thread::spawn(move || {
                for i in 0..500u32 {
                    table.add(item(i % 6, "1", "2")).unwrap();
                    table.set_enabled(Category::ItemSlot, i % 6, i % 2 == 0);
                }
            })
        };
        let reader = {
            let table = table.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    if let Some(resolved) = table.resolve(0x31) {
                        assert_eq!(resolved.category, Category::ItemSlot);
                    }
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(table.len(Category::ItemSlot), 6);
    }
}
