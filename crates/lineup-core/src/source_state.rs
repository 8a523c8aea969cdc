//! Per-source reconciliation
//!
//! A [`SourceState`] holds the current and previous lineup of one source and
//! the [`LineupDiff`] between them. Two complementary views are computed:
//!
//! - **by number**: which guide numbers appeared, disappeared or changed name
//! - **by name**: which display names appeared or disappeared, ignoring
//!   numbers, so a renumbered channel shows no change here
//!
//! Duplicates (one name at several numbers) are reported separately and do not
//! count as a change.

use crate::model::{ChannelNumber, ChannelRecord, Lineup, RawSource};
use std::collections::BTreeMap;

/// Diff between two lineups of the same source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineupDiff {
    /// Numbers present now but not before
    pub added_by_number: BTreeMap<ChannelNumber, ChannelRecord>,
    /// Numbers present before but not now
    pub removed_by_number: BTreeMap<ChannelNumber, ChannelRecord>,
    /// Numbers present in both whose name changed, as (old, new)
    pub modified_by_number: BTreeMap<ChannelNumber, (ChannelRecord, ChannelRecord)>,
    /// Names present now but not before, with their lowest-numbered record
    pub added_by_name: BTreeMap<String, ChannelRecord>,
    /// Names present before but not now, with their lowest-numbered record
    pub removed_by_name: BTreeMap<String, ChannelRecord>,
    /// Names carried by more than one number in the current lineup
    pub duplicates: BTreeMap<String, Vec<ChannelNumber>>,
    /// Channel count of the current lineup
    pub channel_count: usize,
    /// `current - previous` channel count
    pub count_delta: i64,
}

impl LineupDiff {
    /// Compute all views between `previous` and `current`
    pub fn between(previous: &Lineup, current: &Lineup) -> Self {
        let mut diff = Self {
            channel_count: current.len(),
            count_delta: current.len() as i64 - previous.len() as i64,
            duplicates: find_duplicates(current),
            ..Self::default()
        };

        for record in current.records() {
            match previous.get(&record.number) {
                None => {
                    diff.added_by_number
                        .insert(record.number.clone(), record.clone());
                }
                Some(old) if old.name != record.name => {
                    diff.modified_by_number
                        .insert(record.number.clone(), (old.clone(), record.clone()));
                }
                Some(_) => {}
            }
        }

        for record in previous.records() {
            if !current.contains(&record.number) {
                diff.removed_by_number
                    .insert(record.number.clone(), record.clone());
            }
        }

        let previous_names = previous.by_name();
        let current_names = current.by_name();

        for (name, records) in &current_names {
            if !previous_names.contains_key(name) {
                diff.added_by_name
                    .insert(name.to_string(), records[0].clone());
            }
        }

        for (name, records) in &previous_names {
            if !current_names.contains_key(name) {
                diff.removed_by_name
                    .insert(name.to_string(), records[0].clone());
            }
        }

        diff
    }

    /// Whether any add/remove/modify view is non-empty
    ///
    /// Duplicates are not counted: they may persist across cycles.
    pub fn has_lineup_changes(&self) -> bool {
        !self.added_by_number.is_empty()
            || !self.removed_by_number.is_empty()
            || !self.modified_by_number.is_empty()
            || !self.added_by_name.is_empty()
            || !self.removed_by_name.is_empty()
    }

    /// Signed channel count delta, `=` when unchanged
    pub fn count_delta_label(&self) -> String {
        format_delta(self.count_delta)
    }
}

/// Render a count delta as `+N`, `-N` or `=`
pub fn format_delta(delta: i64) -> String {
    match delta {
        0 => "=".to_string(),
        d if d > 0 => format!("+{}", d),
        d => d.to_string(),
    }
}

fn find_duplicates(lineup: &Lineup) -> BTreeMap<String, Vec<ChannelNumber>> {
    lineup
        .by_name()
        .into_iter()
        .filter(|(_, records)| records.len() > 1)
        .map(|(name, records)| {
            let numbers = records.iter().map(|r| r.number.clone()).collect();
            (name.to_string(), numbers)
        })
        .collect()
}

/// Reconciliation state of one source across poll cycles
#[derive(Debug, Clone)]
pub struct SourceState {
    name: String,
    current: Lineup,
    previous: Lineup,
    source_url: Option<String>,
    diff: LineupDiff,
}

impl SourceState {
    /// Start tracking a source
    ///
    /// `previous` is the persisted snapshot, or an empty lineup when the source
    /// has never been seen. The diff against `current` is computed immediately.
    pub fn new(name: impl Into<String>, previous: Lineup, current: Lineup) -> Self {
        let diff = LineupDiff::between(&previous, &current);
        Self {
            name: name.into(),
            current,
            previous,
            source_url: None,
            diff,
        }
    }

    /// Start tracking a freshly fetched source
    pub fn from_raw(source: &RawSource, previous: Lineup) -> Self {
        Self::new(source.name.clone(), previous, source.lineup())
    }

    /// Advance to the next cycle with a newly fetched lineup
    ///
    /// The diff is computed against the lineup of the prior cycle before it is
    /// shifted into `previous`.
    pub fn update(&mut self, lineup: Lineup) {
        self.diff = LineupDiff::between(&self.current, &lineup);
        self.previous = std::mem::replace(&mut self.current, lineup);
    }

    /// Advance to the next cycle from a raw server source
    pub fn update_from_raw(&mut self, source: &RawSource) {
        self.update(source.lineup());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current(&self) -> &Lineup {
        &self.current
    }

    pub fn previous(&self) -> &Lineup {
        &self.previous
    }

    pub fn diff(&self) -> &LineupDiff {
        &self.diff
    }

    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    pub fn set_source_url(&mut self, url: Option<String>) {
        self.source_url = url;
    }

    pub fn has_lineup_changes(&self) -> bool {
        self.diff.has_lineup_changes()
    }

    pub fn channel_count(&self) -> usize {
        self.current.len()
    }
}
