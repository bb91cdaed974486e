//! Fixed row height list virtualization.
//!
//! Only rows intersecting `[scroll_top - overscan, scroll_top + viewport + overscan]`
//! are materialized. Every change of the materialized rows bumps a generation;
//! a [`SlotRef`] taken under an older generation no longer resolves, so input
//! routed to a recycled slot can never reach the row it used to show.
//!
//! Rows are identified by record id, not by their visibility key: several rows
//! may share a key, as two signals for the same symbol do.

use derive_more::Constructor;
use std::ops::Range;

/// Row geometry, in the renderer's units (terminal lines for the TUI).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub row_height: u32,
    pub viewport_height: u32,
    pub overscan: u32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            row_height: 1,
            viewport_height: 20,
            overscan: 5,
        }
    }
}

/// One row of the input list.
#[derive(Debug, Clone, PartialEq, Eq, Constructor)]
pub struct ListRow {
    /// Record identity
    pub id: String,
    /// Visibility key, the symbol auxiliary data is fetched for
    pub key: String,
}

/// A materialized row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    /// Position in the full row list
    pub row: usize,
    pub id: String,
    pub key: String,
}

/// Generation-checked reference to a materialized slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotRef {
    pub generation: u64,
    pub slot: usize,
}

/// Emitted once per change of the materialized rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowUpdate {
    pub generation: u64,
    pub rows: Range<usize>,
    pub ids: Vec<String>,
    pub keys: Vec<String>,
}

/// What the renderer should draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Content<'a> {
    /// The input has no rows
    NoData,
    Rows(&'a [Slot]),
}

#[derive(Debug, Clone, Default)]
pub struct VirtualList {
    geometry: Geometry,
    scroll_top: u32,
    rows: Vec<ListRow>,
    window: Range<usize>,
    slots: Vec<Slot>,
    generation: u64,
    selected: Option<usize>,
}

impl VirtualList {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry: Geometry {
                row_height: geometry.row_height.max(1),
                ..geometry
            },
            ..Default::default()
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn scroll_top(&self) -> u32 {
        self.scroll_top
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn window(&self) -> Range<usize> {
        self.window.clone()
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn content(&self) -> Content<'_> {
        if self.rows.is_empty() {
            Content::NoData
        } else {
            Content::Rows(&self.slots)
        }
    }

    /// Key of row `row` of the full list.
    pub fn key(&self, row: usize) -> Option<&str> {
        self.rows.get(row).map(|entry| entry.key.as_str())
    }

    /// Record id of row `row` of the full list.
    pub fn id(&self, row: usize) -> Option<&str> {
        self.rows.get(row).map(|entry| entry.id.as_str())
    }

    /// Keys of the materialized rows, in row order.
    pub fn materialized_keys(&self) -> Vec<String> {
        self.slots.iter().map(|slot| slot.key.clone()).collect()
    }

    pub fn slot_ref(&self, slot: usize) -> Option<SlotRef> {
        (slot < self.slots.len()).then_some(SlotRef {
            generation: self.generation,
            slot,
        })
    }

    /// Resolve a slot reference taken earlier. Stale generations resolve to `None`.
    pub fn resolve(&self, slot_ref: SlotRef) -> Option<&Slot> {
        if slot_ref.generation != self.generation {
            return None;
        }
        self.slots.get(slot_ref.slot)
    }

    /// Replace the row list. Scroll position is kept where possible and the
    /// selection stays on the same record if it is still present.
    pub fn set_rows(&mut self, rows: Vec<ListRow>) -> Option<WindowUpdate> {
        let selected_id = self
            .selected
            .and_then(|selected| self.rows.get(selected))
            .map(|entry| entry.id.clone());

        self.rows = rows;
        self.selected = match (self.selected, selected_id) {
            _ if self.rows.is_empty() => None,
            (Some(selected), Some(id)) => Some(
                self.rows
                    .iter()
                    .position(|entry| entry.id == id)
                    .unwrap_or_else(|| selected.min(self.rows.len() - 1)),
            ),
            (Some(selected), None) => Some(selected.min(self.rows.len() - 1)),
            (None, _) => None,
        };
        self.scroll_top = self.scroll_top.min(self.max_scroll());
        self.recompute()
    }

    /// Back to the top with nothing selected. The window is recomputed by the
    /// next [`Self::set_rows`].
    pub fn reset_scroll(&mut self) {
        self.scroll_top = 0;
        self.selected = None;
    }

    pub fn set_viewport_height(&mut self, height: u32) -> Option<WindowUpdate> {
        self.geometry.viewport_height = height;
        self.scroll_top = self.scroll_top.min(self.max_scroll());
        self.recompute()
    }

    pub fn scroll_to(&mut self, scroll_top: u32) -> Option<WindowUpdate> {
        self.scroll_top = scroll_top.min(self.max_scroll());
        self.recompute()
    }

    /// Scroll by whole rows, negative is up.
    pub fn scroll_rows(&mut self, rows: i64) -> Option<WindowUpdate> {
        let delta = rows.saturating_mul(self.geometry.row_height as i64);
        let target = (self.scroll_top as i64 + delta).clamp(0, u32::MAX as i64) as u32;
        self.scroll_to(target)
    }

    /// Move the selection by `rows`, scrolling it into view.
    pub fn select_offset(&mut self, rows: i64) -> Option<WindowUpdate> {
        if self.rows.is_empty() {
            return None;
        }

        let last = self.rows.len() as i64 - 1;
        let current = self.selected.map_or(-1, |selected| selected as i64);
        let next = (current + rows).clamp(0, last) as usize;
        self.selected = Some(next);

        let height = self.geometry.row_height;
        let top = next as u32 * height;
        let bottom = top + height;
        if top < self.scroll_top {
            self.scroll_to(top)
        } else if bottom > self.scroll_top + self.geometry.viewport_height {
            self.scroll_to(bottom.saturating_sub(self.geometry.viewport_height))
        } else {
            None
        }
    }

    /// First row fully or partly inside the viewport, without overscan.
    pub fn first_visible_row(&self) -> usize {
        (self.scroll_top / self.geometry.row_height) as usize
    }

    fn max_scroll(&self) -> u32 {
        let content = (self.rows.len() as u64 * self.geometry.row_height as u64)
            .min(u32::MAX as u64) as u32;
        content.saturating_sub(self.geometry.viewport_height)
    }

    fn compute_window(&self) -> Range<usize> {
        let Geometry {
            row_height,
            viewport_height,
            overscan,
        } = self.geometry;

        let top = self.scroll_top.saturating_sub(overscan) as u64;
        let bottom = self.scroll_top as u64 + viewport_height as u64 + overscan as u64;

        let start = (top / row_height as u64) as usize;
        let end = bottom.div_ceil(row_height as u64) as usize;
        let end = end.min(self.rows.len());
        start.min(end)..end
    }

    fn recompute(&mut self) -> Option<WindowUpdate> {
        let window = self.compute_window();
        let unchanged = window == self.window
            && self
                .slots
                .iter()
                .map(|slot| (&slot.id, &slot.key))
                .eq(self.rows[window.clone()]
                    .iter()
                    .map(|entry| (&entry.id, &entry.key)));
        if unchanged {
            return None;
        }

        self.slots = window
            .clone()
            .map(|row| Slot {
                row,
                id: self.rows[row].id.clone(),
                key: self.rows[row].key.clone(),
            })
            .collect();
        self.window = window.clone();
        self.generation += 1;

        Some(WindowUpdate {
            generation: self.generation,
            rows: window,
            ids: self.slots.iter().map(|slot| slot.id.clone()).collect(),
            keys: self.materialized_keys(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(count: usize) -> Vec<ListRow> {
        (0..count)
            .map(|index| ListRow::new(format!("row{index}"), format!("row{index}")))
            .collect()
    }

    fn list(row_height: u32, viewport_height: u32, overscan: u32) -> VirtualList {
        VirtualList::new(Geometry {
            row_height,
            viewport_height,
            overscan,
        })
    }

    #[test]
    fn test_window_is_bounded_by_viewport() {
        let mut list = list(10, 100, 20);

        let update = list.set_rows(rows(10_000)).unwrap();
        // [0, 120] covers rows 0..12
        assert_eq!(update.rows, 0..12);
        assert_eq!(update.keys.len(), 12);

        let update = list.scroll_to(5_000).unwrap();
        // [4980, 5120] covers rows 498..512
        assert_eq!(update.rows, 498..512);
        assert_eq!(list.first_visible_row(), 500);
    }

    #[test]
    fn test_update_emitted_once_per_change() {
        let mut list = list(1, 10, 2);
        assert!(list.set_rows(rows(100)).is_some());

        // Same input and scroll: nothing to do
        assert!(list.set_rows(rows(100)).is_none());
        assert!(list.scroll_to(0).is_none());

        // Same range but different keys
        let mut changed = rows(100);
        changed[3] = ListRow::new("other".to_string(), "other".to_string());
        let update = list.set_rows(changed).unwrap();
        assert_eq!(update.keys[3], "other");
    }

    #[test]
    fn test_rows_sharing_a_key_are_tracked_by_id() {
        let same_key = |ids: &[&str]| -> Vec<ListRow> {
            ids.iter()
                .map(|id| ListRow::new(id.to_string(), "BTCUSDT".to_string()))
                .collect()
        };

        let mut list = list(1, 3, 0);
        list.set_rows(same_key(&["s2", "s1", "s0"]));
        list.select_offset(2);
        assert_eq!(list.selected(), Some(1));
        assert_eq!(list.id(1), Some("s1"));
        let slot_ref = list.slot_ref(0).unwrap();

        // A new record on top shifts every row; the keys alone would look unchanged
        let update = list.set_rows(same_key(&["s3", "s2", "s1", "s0"])).unwrap();
        assert_eq!(update.ids, vec!["s3", "s2", "s1"]);
        assert_eq!(update.keys, vec!["BTCUSDT"; 3]);

        assert_eq!(list.resolve(slot_ref), None);
        let fresh = list.slot_ref(1).unwrap();
        assert_eq!(list.resolve(fresh).map(|slot| slot.id.as_str()), Some("s2"));

        // Selection follows the record
        assert_eq!(list.selected(), Some(2));
        assert_eq!(list.id(2), Some("s1"));

        // Selected record gone: index is clamped
        list.set_rows(same_key(&["s3"]));
        assert_eq!(list.selected(), Some(0));
    }

    #[test]
    fn test_reset_scroll_recomputes_on_next_rows() {
        let mut list = list(1, 5, 0);
        list.set_rows(rows(50));
        list.select_offset(20);
        assert_eq!(list.window(), 15..20);

        list.reset_scroll();
        assert_eq!(list.scroll_top(), 0);
        assert_eq!(list.selected(), None);

        let update = list.set_rows(rows(50)).unwrap();
        assert_eq!(update.rows, 0..5);
    }

    #[test]
    fn test_scroll_is_clamped() {
        let mut list = list(1, 10, 0);
        list.set_rows(rows(15));

        list.scroll_to(1_000);
        assert_eq!(list.scroll_top(), 5);
        assert_eq!(list.window(), 5..15);

        list.set_rows(rows(3));
        assert_eq!(list.scroll_top(), 0);
        assert_eq!(list.window(), 0..3);
    }

    #[test]
    fn test_empty_input_renders_placeholder() {
        let mut list = list(1, 10, 2);
        list.set_rows(rows(5));
        assert!(matches!(list.content(), Content::Rows(slots) if slots.len() == 5));

        let update = list.set_rows(Vec::new()).unwrap();
        assert!(update.keys.is_empty());
        assert_eq!(list.content(), Content::NoData);
    }

    #[test]
    fn test_stale_slot_ref_does_not_resolve() {
        let mut list = list(1, 5, 0);
        list.set_rows(rows(50));

        let slot_ref = list.slot_ref(0).unwrap();
        assert_eq!(list.resolve(slot_ref).map(|slot| slot.row), Some(0));

        list.scroll_rows(10);
        assert_eq!(list.resolve(slot_ref), None);

        let fresh = list.slot_ref(0).unwrap();
        assert_eq!(list.resolve(fresh).map(|slot| slot.row), Some(10));
    }

    #[test]
    fn test_selection_scrolls_into_view() {
        let mut list = list(1, 5, 0);
        list.set_rows(rows(20));

        assert!(list.select_offset(1).is_none());
        assert_eq!(list.selected(), Some(0));

        let update = list.select_offset(7).unwrap();
        assert_eq!(list.selected(), Some(7));
        assert_eq!(update.rows, 3..8);

        list.select_offset(-100);
        assert_eq!(list.selected(), Some(0));
        assert_eq!(list.scroll_top(), 0);
    }
}
