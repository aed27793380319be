//! In-memory, insertion-ordered storage for one file's [`Record`]s.
//!
//! Grounded on `MetaFileTable`/`PlatformTable` from the original Python
//! parser: one table per file, ids assigned in a per-file block so that a
//! platform aggregating many files can keep them distinguishable, and a
//! `Query`-style filter whose `belongs_to_item` handling defaults to
//! top-level records rather than "any parent".

use crate::model::{Record, RecordModel, ScopeTriple, COMMON, DEFAULT_STORE};

/// How a [`RecordStore::query`] should treat `belongs_to_item`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BelongsToFilter {
    /// Only records with no parent (`belongs_to_item < 0`). The default —
    /// mirrors the original's `BelongsToItem is None` behavior.
    #[default]
    TopLevel,
    /// Only records whose `belongs_to_item` equals the given id.
    Under(i64),
    /// No filtering on `belongs_to_item` at all.
    Any,
}

/// The per-file id block width: file N owns ids in `[N * BLOCK, (N+1) * BLOCK)`.
pub const ID_BLOCK_SIZE: i64 = 1_000_000;

/// Insertion-ordered storage for the records parsed from a single file.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<Record>,
    next_id: i64,
    id_block_base: i64,
    has_end_flag: bool,
}

impl RecordStore {
    /// A new, empty store whose ids start at `file_index * ID_BLOCK_SIZE`.
    #[must_use]
    pub fn new(file_index: i64) -> Self {
        let base = file_index * ID_BLOCK_SIZE;
        Self {
            records: Vec::new(),
            next_id: base,
            id_block_base: base,
            has_end_flag: false,
        }
    }

    /// Insert a record, assigning it the next id in this store's block.
    /// Returns the assigned id.
    pub fn insert(&mut self, mut record: Record) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        record.id = id;
        self.records.push(record);
        id
    }

    /// All records in insertion order, including disabled ones and the
    /// end-flag sentinel if present.
    #[must_use]
    pub fn get_all(&self) -> &[Record] {
        &self.records
    }

    /// Mutable access to a record by id, if present.
    pub fn get_mut(&mut self, id: i64) -> Option<&mut Record> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    /// Immutable access to a record by id, if present.
    #[must_use]
    pub fn get(&self, id: i64) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Append the end-flag sentinel record (`id` negative, one past the
    /// last assigned id, negated) marking the store as closed. Idempotent.
    pub fn set_end_flag(&mut self) {
        if self.has_end_flag {
            return;
        }
        self.records.push(Record {
            id: -(self.next_id + 1),
            model: RecordModel::Unknown,
            value1: String::new(),
            value2: String::new(),
            value3: String::new(),
            scope1: COMMON.to_string(),
            scope2: COMMON.to_string(),
            scope3: COMMON.to_string(),
            belongs_to_item: -1,
            from_item: -1,
            start_line: 0,
            end_line: 0,
            enabled: true,
        });
        self.has_end_flag = true;
    }

    /// Whether the end-flag sentinel has been appended and every id in
    /// `[id_block_base, next_id)` is accounted for by exactly one record
    /// (sanity check against double-insertion or id corruption).
    #[must_use]
    pub fn is_integrity(&self) -> bool {
        if !self.has_end_flag {
            return false;
        }
        let mut seen = std::collections::HashSet::new();
        for r in &self.records {
            if r.is_sentinel() {
                continue;
            }
            if r.id < self.id_block_base || r.id >= self.next_id {
                return false;
            }
            if !seen.insert(r.id) {
                return false;
            }
        }
        seen.len() as i64 == self.next_id - self.id_block_base
    }

    /// Query records matching `model`, optionally narrowed by scope and by
    /// `belongs_to_item`. Disabled records are excluded.
    ///
    /// Scope matching: a query scope of `None` matches any value; `Some(s)`
    /// matches a record whose corresponding scope field is `COMMON`, equal
    /// to `s`, or (for `scope2`) the derived wildcard `"COMMON.<module>"`
    /// form produced by a multi-dimension section header.
    #[must_use]
    pub fn query(
        &self,
        model: Option<&RecordModel>,
        scope: Option<&ScopeTriple>,
        belongs_to: BelongsToFilter,
        from_item: Option<i64>,
    ) -> Vec<&Record> {
        self.records
            .iter()
            .filter(|r| r.enabled && !r.is_sentinel())
            .filter(|r| model.is_none_or(|m| &r.model == m))
            .filter(|r| scope.is_none_or(|s| scope_matches(r, s)))
            .filter(|r| match belongs_to {
                BelongsToFilter::TopLevel => r.belongs_to_item < 0,
                BelongsToFilter::Under(id) => r.belongs_to_item == id,
                BelongsToFilter::Any => true,
            })
            .filter(|r| from_item.is_none_or(|f| r.from_item == f))
            .collect()
    }

    /// Disable a record and every record whose `belongs_to_item` chain
    /// (directly or transitively) leads back to it — used when a
    /// `[Components]` entry's enclosing conditional evaluates false after
    /// the fact, or when PCD override resolution prunes a duplicate.
    pub fn disable_component(&mut self, id: i64) {
        let mut to_disable = vec![id];
        while let Some(current) = to_disable.pop() {
            let children: Vec<i64> = self
                .records
                .iter()
                .filter(|r| r.belongs_to_item == current)
                .map(|r| r.id)
                .collect();
            if let Some(r) = self.get_mut(current) {
                r.enabled = false;
            }
            to_disable.extend(children);
        }
    }

    /// The `@ValidRange`/`@ValidList`/`@Expression` comments attached to the
    /// PCD declaration named `token_space.pcd_name`, in source order.
    ///
    /// Mirrors `GetValidExpression` from the original Python parser: each
    /// comment record returned here was tagged by the raw parser at the
    /// point it recognized a validation-constraint comment directly
    /// preceding a PCD line, carrying that PCD's token-space/name in
    /// `value2`/`value3`.
    #[must_use]
    pub fn valid_expressions(&self, token_space: &str, pcd_name: &str) -> Vec<&Record> {
        self.records
            .iter()
            .filter(|r| {
                r.enabled
                    && !r.is_sentinel()
                    && r.model == RecordModel::ValidExpression
                    && r.value2 == token_space
                    && r.value3 == pcd_name
            })
            .collect()
    }
}

fn scope_matches(record: &Record, query: &ScopeTriple) -> bool {
    let arch_ok = record.scope1 == COMMON || record.scope1 == query.arch;
    let module_ok = record.scope2 == COMMON
        || record.scope2 == query.module_type
        || record.scope2 == format!("{COMMON}.{}", query.module_type)
        || record.scope2 == DEFAULT_STORE;
    let store_ok = record.scope3 == COMMON || record.scope3 == query.default_store;
    arch_ok && module_ok && store_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(model: RecordModel, value1: &str) -> Record {
        Record {
            id: 0,
            model,
            value1: value1.to_string(),
            value2: String::new(),
            value3: String::new(),
            scope1: COMMON.into(),
            scope2: COMMON.into(),
            scope3: COMMON.into(),
            belongs_to_item: -1,
            from_item: -1,
            start_line: 1,
            end_line: 1,
            enabled: true,
        }
    }

    #[test]
    fn ids_are_assigned_from_the_files_block() {
        let mut store = RecordStore::new(2);
        let id = store.insert(record(RecordModel::Header, "A"));
        assert_eq!(id, 2_000_000);
    }

    #[test]
    fn end_flag_is_idempotent_and_integrity_passes() {
        let mut store = RecordStore::new(0);
        store.insert(record(RecordModel::Header, "A"));
        store.set_end_flag();
        store.set_end_flag();
        assert!(store.is_integrity());
        assert_eq!(store.get_all().iter().filter(|r| r.is_sentinel()).count(), 1);
    }

    #[test]
    fn query_defaults_to_top_level_only() {
        let mut store = RecordStore::new(0);
        let parent = store.insert(record(RecordModel::Component, "Mod.inf"));
        let mut child = record(RecordModel::LibraryInstance, "Lib.inf");
        child.belongs_to_item = parent;
        store.insert(child);

        let top = store.query(None, None, BelongsToFilter::TopLevel, None);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].value1, "Mod.inf");

        let under = store.query(None, None, BelongsToFilter::Under(parent), None);
        assert_eq!(under.len(), 1);
        assert_eq!(under[0].value1, "Lib.inf");
    }

    #[test]
    fn disable_component_cascades_to_children() {
        let mut store = RecordStore::new(0);
        let parent = store.insert(record(RecordModel::Component, "Mod.inf"));
        let mut child = record(RecordModel::LibraryInstance, "Lib.inf");
        child.belongs_to_item = parent;
        let child_id = store.insert(child);

        store.disable_component(parent);
        assert!(!store.get(parent).unwrap().enabled);
        assert!(!store.get(child_id).unwrap().enabled);
    }

    #[test]
    fn scope_common_wildcard_matches_any_query() {
        let mut store = RecordStore::new(0);
        store.insert(record(RecordModel::Header, "A"));
        let triple = ScopeTriple {
            arch: "X64".into(),
            module_type: "DXE_DRIVER".into(),
            default_store: "STANDARD".into(),
        };
        let hits = store.query(None, Some(&triple), BelongsToFilter::Any, None);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn valid_expressions_filters_by_owning_pcd() {
        let mut store = RecordStore::new(0);
        let mut comment = record(RecordModel::ValidExpression, "# @ValidRange 0 | 1 - 10");
        comment.value2 = "gTokenSpace".to_string();
        comment.value3 = "PcdFoo".to_string();
        store.insert(comment);
        let mut other = record(RecordModel::ValidExpression, "# @ValidList 0 | 1, 2");
        other.value2 = "gTokenSpace".to_string();
        other.value3 = "PcdBar".to_string();
        store.insert(other);

        let hits = store.valid_expressions("gTokenSpace", "PcdFoo");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].value1, "# @ValidRange 0 | 1 - 10");
        assert_eq!(store.valid_expressions("gTokenSpace", "PcdBar").len(), 1);
        assert!(store.valid_expressions("gTokenSpace", "PcdMissing").is_empty());
    }

    #[test]
    fn valid_expressions_ignores_disabled_and_plain_comments() {
        let mut store = RecordStore::new(0);
        let mut disabled = record(RecordModel::ValidExpression, "# @Expression 0 | 1 == 1");
        disabled.value2 = "gTokenSpace".to_string();
        disabled.value3 = "PcdFoo".to_string();
        disabled.enabled = false;
        store.insert(disabled);
        let plain = record(RecordModel::Comment, "# just a note");
        store.insert(plain);

        assert!(store.valid_expressions("gTokenSpace", "PcdFoo").is_empty());
    }
}
