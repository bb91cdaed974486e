//! Deduplicating, time-ordered, bounded store of primary records.
//!
//! Records are kept newest first. Ids are unique. When the store grows past
//! `limit * 1.2` it is truncated back to the newest `limit` records, so a
//! long running session never holds more than 20% over its configured size.
//!
//! Readers take a [`MasterStore::snapshot`], a reference counted view that
//! later merges never mutate (copy-on-write through [`Arc::make_mut`]).

use fnv::FnvHashSet;
use pivot_data::model::Record;
use std::sync::Arc;

/// What a [`MasterStore::merge`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Replaced,
    /// Identical payload was already stored
    Unchanged,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, MergeOutcome::Unchanged)
    }
}

#[derive(Debug, Clone)]
pub struct MasterStore<R> {
    records: Arc<Vec<R>>,
    ids: FnvHashSet<String>,
    limit: usize,
    version: u64,
}

impl<R> MasterStore<R>
where
    R: Record + Clone + PartialEq,
{
    pub fn new(limit: usize) -> Self {
        Self {
            records: Arc::new(Vec::new()),
            ids: FnvHashSet::default(),
            limit: limit.max(1),
            version: 0,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Change the limit. A lower limit takes effect on the next eviction.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.max(1);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Incremented every time the contents change.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Immutable ordered view. Unaffected by later merges.
    pub fn snapshot(&self) -> Arc<Vec<R>> {
        Arc::clone(&self.records)
    }

    /// Insert a new record or replace the stored record with the same id,
    /// then evict if the store overflowed.
    pub fn merge(&mut self, record: R) -> MergeOutcome {
        let outcome = self.merge_one(record);
        if outcome.changed() {
            self.evict();
            self.version += 1;
        }
        outcome
    }

    /// Merge many records with a single eviction at the end.
    ///
    /// Returns the number of records that changed the store.
    pub fn merge_batch(&mut self, records: impl IntoIterator<Item = R>) -> usize {
        let changed = records
            .into_iter()
            .map(|record| self.merge_one(record))
            .filter(MergeOutcome::changed)
            .count();

        if changed > 0 {
            self.evict();
            self.version += 1;
        }
        changed
    }

    /// Truncate to the newest `limit` records when size exceeds `limit * 1.2`.
    ///
    /// Returns the number of records dropped. Dropping any bumps the version.
    pub fn evict(&mut self) -> usize {
        // len > limit * 1.2 without floats
        if self.records.len() * 5 <= self.limit * 6 {
            return 0;
        }

        let records = Arc::make_mut(&mut self.records);
        let dropped = records.split_off(self.limit);
        for record in &dropped {
            self.ids.remove(record.id());
        }
        self.version += 1;
        dropped.len()
    }

    pub fn clear(&mut self) {
        if !self.records.is_empty() {
            self.records = Arc::new(Vec::new());
            self.ids.clear();
            self.version += 1;
        }
    }

    fn merge_one(&mut self, record: R) -> MergeOutcome {
        if self.ids.contains(record.id()) {
            let position = self
                .records
                .iter()
                .position(|existing| existing.id() == record.id());

            if let Some(position) = position {
                let existing = &self.records[position];
                if *existing == record {
                    return MergeOutcome::Unchanged;
                }

                let same_time = existing.occurred_at() == record.occurred_at();
                let records = Arc::make_mut(&mut self.records);
                if same_time {
                    records[position] = record;
                } else {
                    records.remove(position);
                    insert_sorted(records, record);
                }
                return MergeOutcome::Replaced;
            }
        }

        self.ids.insert(record.id().to_string());
        insert_sorted(Arc::make_mut(&mut self.records), record);
        MergeOutcome::Inserted
    }
}

/// Insert after every record at least as new, so equal timestamps keep arrival order.
fn insert_sorted<R: Record>(records: &mut Vec<R>, record: R) {
    let occurred_at = record.occurred_at();
    let position = records.partition_point(|existing| existing.occurred_at() >= occurred_at);
    records.insert(position, record);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: String,
        at: DateTime<Utc>,
        value: u32,
    }

    impl Record for Item {
        fn id(&self) -> &str {
            &self.id
        }

        fn symbol(&self) -> &str {
            "TEST"
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.at
        }
    }

    fn item(id: &str, secs: i64) -> Item {
        Item {
            id: id.to_string(),
            at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            value: 0,
        }
    }

    fn ids(store: &MasterStore<Item>) -> Vec<String> {
        store.snapshot().iter().map(|item| item.id.clone()).collect()
    }

    #[test]
    fn test_merge_keeps_newest_first() {
        let mut store = MasterStore::new(10);
        store.merge(item("a", 10));
        store.merge(item("c", 30));
        store.merge(item("b", 20));

        assert_eq!(ids(&store), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_equal_timestamps_keep_arrival_order() {
        let mut store = MasterStore::new(10);
        store.merge(item("first", 10));
        store.merge(item("second", 10));
        store.merge(item("newer", 11));
        store.merge(item("third", 10));

        assert_eq!(ids(&store), vec!["newer", "first", "second", "third"]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut store = MasterStore::new(10);
        assert_eq!(store.merge(item("a", 1)), MergeOutcome::Inserted);
        let version = store.version();
        let before = store.snapshot();

        assert_eq!(store.merge(item("a", 1)), MergeOutcome::Unchanged);
        assert_eq!(store.version(), version);
        assert_eq!(store.snapshot(), before);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_replace_same_time_keeps_position() {
        let mut store = MasterStore::new(10);
        store.merge(item("a", 3));
        store.merge(item("b", 3));
        store.merge(item("c", 3));

        let mut updated = item("b", 3);
        updated.value = 7;
        assert_eq!(store.merge(updated), MergeOutcome::Replaced);

        assert_eq!(ids(&store), vec!["a", "b", "c"]);
        assert_eq!(store.snapshot()[1].value, 7);
    }

    #[test]
    fn test_replace_with_new_time_resorts() {
        let mut store = MasterStore::new(10);
        store.merge(item("a", 1));
        store.merge(item("b", 2));

        store.merge(item("a", 5));

        assert_eq!(ids(&store), vec!["a", "b"]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_snapshot_is_not_aliased() {
        let mut store = MasterStore::new(10);
        store.merge(item("a", 1));
        let snapshot = store.snapshot();

        store.merge(item("b", 2));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_evict_threshold() {
        let mut store = MasterStore::new(10);
        store.merge_batch((0..12).map(|i| item(&format!("r{i}"), i)));
        // 12 == 10 * 1.2 is not an overflow
        assert_eq!(store.len(), 12);

        store.merge(item("r12", 12));
        assert_eq!(store.len(), 10);
        assert_eq!(ids(&store).first().map(String::as_str), Some("r12"));
        assert!(!store.contains("r0"));
        assert!(!store.contains("r2"));
        assert!(store.contains("r3"));
    }

    #[test]
    fn test_evict_after_lower_limit_bumps_version() {
        let mut store = MasterStore::new(10);
        store.merge_batch((0..10).map(|i| item(&format!("r{i}"), i)));
        let version = store.version();

        // Nothing to drop, nothing changed
        assert_eq!(store.evict(), 0);
        assert_eq!(store.version(), version);

        store.set_limit(5);
        assert_eq!(store.evict(), 5);
        assert!(store.version() > version);
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn test_evicted_id_can_return() {
        let mut store = MasterStore::new(1);
        store.merge_batch(vec![item("a", 1), item("b", 2)]);
        assert_eq!(ids(&store), vec!["b"]);

        assert_eq!(store.merge(item("a", 1)), MergeOutcome::Inserted);
    }
}
