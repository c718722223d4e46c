//! Array search handles (spec §4.4).
//!
//! Grounded on `tclVar.c`'s `ArraySearch` struct
//! (`examples/original_source/generic/tclVar.c`): an opaque handle over
//! a snapshot of an array's key order, advanced one key at a time and
//! tolerant of the array being mutated mid-search because the backing
//! [`crate::table::TombstoneMap`] never shifts indices out from under a
//! live search.

use crate::error::VarError;

/// One outstanding `array startsearch`/`nextelement` handle. The id is
/// only meaningful as `s-<id>-<arrayName>` to a caller formatting it as
/// an opaque Value (spec §4.4); we keep the numeric id and array name
/// separately and let callers format it as needed.
pub struct ArraySearch {
    pub id: u64,
    pub array_name: String,
    keys: Vec<String>,
    /// Index of the next key `next()` will try. Advances monotonically;
    /// never rewound even if earlier keys are deleted.
    cursor: usize,
    /// Set once the backing array's key set changed in a way this
    /// search can't reconcile (an element was deleted that the search
    /// had not yet delivered). Once set, every subsequent `next()`
    /// reports `ArrayChangedDuringIteration`.
    changed: bool,
}

impl ArraySearch {
    pub fn new(id: u64, array_name: impl Into<String>, snapshot_keys: Vec<String>) -> Self {
        ArraySearch {
            id,
            array_name: array_name.into(),
            keys: snapshot_keys,
            cursor: 0,
            changed: false,
        }
    }

    pub fn mark_changed(&mut self) {
        self.changed = true;
    }

    pub fn is_done(&self) -> bool {
        self.changed || self.cursor >= self.keys.len()
    }

    /// Advance and return the next live key, skipping any key this
    /// search already knows was deleted out from under it. A caller
    /// supplies `is_live` (a lookup into the current table) so deletions
    /// that happened after the snapshot was taken are honored without
    /// this struct owning a reference back into the table.
    pub fn next(&mut self, is_live: impl Fn(&str) -> bool) -> Result<Option<String>, VarError> {
        if self.changed {
            return Err(VarError::ArrayChangedDuringIteration {
                name: self.array_name.clone(),
            });
        }
        while self.cursor < self.keys.len() {
            let key = self.keys[self.cursor].clone();
            self.cursor += 1;
            if is_live(&key) {
                return Ok(Some(key));
            }
            // Key was deleted after the snapshot: spec §8 scenario 6
            // treats a delete of a not-yet-delivered key as ending the
            // search with an error, not as a silent skip.
            return Err(VarError::ArrayChangedDuringIteration {
                name: self.array_name.clone(),
            });
        }
        Ok(None)
    }

    pub fn any_more(&self, is_live: impl Fn(&str) -> bool) -> bool {
        !self.changed
            && self.keys[self.cursor..]
                .iter()
                .any(|k| is_live(k.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn iteration_survives_delete_of_already_delivered_key() {
        let mut search = ArraySearch::new(1, "a", vec!["k1".into(), "k2".into(), "k3".into()]);
        let mut live: HashSet<&str> = ["k1", "k2", "k3"].into_iter().collect();

        assert_eq!(search.next(|k| live.contains(k)).unwrap(), Some("k1".into()));
        // k3 deleted while k2 is being processed, before the search
        // reaches it.
        live.remove("k3");
        assert_eq!(search.next(|k| live.contains(k)).unwrap(), Some("k2".into()));
        let err = search.next(|k| live.contains(k)).unwrap_err();
        assert_eq!(err.code(), vec!["READ", "array", "for"]);
    }
}
