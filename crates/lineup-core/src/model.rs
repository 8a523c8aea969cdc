//! Channel lineup data model
//!
//! - [`ChannelNumber`]: guide number with a numeric-aware total order
//! - [`ChannelRecord`]: one channel of one source
//! - [`Lineup`]: number-keyed set of channels for one source at one point in time
//! - [`RawSource`] / [`RawChannel`]: typed view of what the server returned

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Guide number of a channel, e.g. `"7"`, `"2.1"` or `"1005"`
///
/// Ordering compares dot-separated components numerically when both sides are
/// numeric, so `2.1 < 2.10 < 10 < 100`. Non-numeric components sort after
/// numeric ones and compare lexicographically among themselves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelNumber(String);

impl ChannelNumber {
    pub fn new(number: impl Into<String>) -> Self {
        Self(number.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for ChannelNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        let mut lhs = self.0.split('.');
        let mut rhs = other.0.split('.');

        loop {
            match (lhs.next(), rhs.next()) {
                (None, None) => break,
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (Some(a), Some(b)) => {
                    let ord = match (a.parse::<u64>(), b.parse::<u64>()) {
                        (Ok(x), Ok(y)) => x.cmp(&y),
                        (Ok(_), Err(_)) => Ordering::Less,
                        (Err(_), Ok(_)) => Ordering::Greater,
                        (Err(_), Err(_)) => a.cmp(b),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
            }
        }

        // "02" and "2" are numerically equal but distinct keys
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for ChannelNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ChannelNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelNumber {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One channel offered by a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    /// Guide number, unique within a lineup
    pub number: ChannelNumber,
    /// Display name, may repeat within a lineup
    pub name: String,
    /// Stable identifier, when the server provides one
    pub id: Option<String>,
    /// HD flag, when the server provides one
    pub is_hd: Option<bool>,
}

impl ChannelRecord {
    /// Create a record with no optional fields
    pub fn new(number: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            number: ChannelNumber::new(number),
            name: name.into(),
            id: None,
            is_hd: None,
        }
    }

    /// Set the stable ID
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the HD flag
    pub fn with_hd(mut self, is_hd: bool) -> Self {
        self.is_hd = Some(is_hd);
        self
    }
}

/// The complete set of channels of one source at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lineup {
    channels: BTreeMap<ChannelNumber, ChannelRecord>,
}

impl Lineup {
    /// Create an empty lineup
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a lineup from the raw channel list of a source
    ///
    /// When two entries share a guide number, the later one wins.
    pub fn from_channels<'a>(channels: impl IntoIterator<Item = &'a RawChannel>) -> Self {
        let mut lineup = Self::new();
        for channel in channels {
            lineup.insert(channel.to_record());
        }
        lineup
    }

    /// Insert a record, replacing any record with the same number
    pub fn insert(&mut self, record: ChannelRecord) -> Option<ChannelRecord> {
        self.channels.insert(record.number.clone(), record)
    }

    pub fn get(&self, number: &ChannelNumber) -> Option<&ChannelRecord> {
        self.channels.get(number)
    }

    pub fn contains(&self, number: &ChannelNumber) -> bool {
        self.channels.contains_key(number)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Records in channel number order
    pub fn records(&self) -> impl Iterator<Item = &ChannelRecord> {
        self.channels.values()
    }

    /// Group records by name
    ///
    /// Each name maps to its records in channel number order, so the first
    /// entry is always the lowest-numbered channel carrying that name.
    pub fn by_name(&self) -> BTreeMap<&str, Vec<&ChannelRecord>> {
        let mut index: BTreeMap<&str, Vec<&ChannelRecord>> = BTreeMap::new();
        for record in self.channels.values() {
            index.entry(record.name.as_str()).or_default().push(record);
        }
        index
    }
}

impl FromIterator<ChannelRecord> for Lineup {
    fn from_iter<T: IntoIterator<Item = ChannelRecord>>(iter: T) -> Self {
        let mut lineup = Self::new();
        for record in iter {
            lineup.insert(record);
        }
        lineup
    }
}

/// A channel entry as returned by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChannel {
    pub guide_number: String,
    pub guide_name: String,
    pub id: Option<String>,
    pub hd: Option<bool>,
}

impl RawChannel {
    pub fn new(guide_number: impl Into<String>, guide_name: impl Into<String>) -> Self {
        Self {
            guide_number: guide_number.into(),
            guide_name: guide_name.into(),
            id: None,
            hd: None,
        }
    }

    fn to_record(&self) -> ChannelRecord {
        ChannelRecord {
            number: ChannelNumber::new(self.guide_number.clone()),
            name: self.guide_name.clone(),
            id: self.id.clone(),
            is_hd: self.hd,
        }
    }
}

/// A source (tuner, M3U provider, ...) as returned by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSource {
    /// Friendly name, the stable identity of the source
    pub name: String,
    /// Lineup identifier; sources without one are not monitored
    pub lineup_id: Option<String>,
    /// Device identifier, used to look up source settings
    pub device_id: Option<String>,
    pub channels: Vec<RawChannel>,
}

impl RawSource {
    pub fn new(name: impl Into<String>, lineup_id: Option<&str>) -> Self {
        Self {
            name: name.into(),
            lineup_id: lineup_id.map(str::to_string),
            device_id: None,
            channels: Vec::new(),
        }
    }

    /// Append a channel
    pub fn with_channel(mut self, number: &str, name: &str) -> Self {
        self.channels.push(RawChannel::new(number, name));
        self
    }

    /// Whether this source has a lineup worth monitoring
    pub fn is_monitored(&self) -> bool {
        self.lineup_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty())
    }

    /// Typed lineup of this source
    pub fn lineup(&self) -> Lineup {
        Lineup::from_channels(&self.channels)
    }
}
