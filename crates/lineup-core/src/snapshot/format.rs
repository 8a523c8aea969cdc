//! Line-oriented snapshot format
//!
//! ```text
//! # Antenna Tuner
//! 2.1|KTVU|1234|1
//! 7|KGO||0
//! 44|KBCW
//! ```
//!
//! The optional first line names the source. Each following line is one
//! channel: `number|name|id|hd`. Older snapshots carry only `number|name` or
//! `number|name|id`; missing trailing fields read as absent, and so do empty ones.

use crate::error::{Error, Result};
use crate::model::{ChannelNumber, ChannelRecord, Lineup};

/// Field separator, not expected in channel names
pub const FIELD_SEPARATOR: char = '|';

const HEADER_PREFIX: &str = "# ";

/// A decoded snapshot file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedSnapshot {
    /// Source name from the header line, if the file has one
    pub source_name: Option<String>,
    pub lineup: Lineup,
    /// Lines that could not be parsed (lenient mode only)
    pub skipped_lines: usize,
}

/// Render one channel as a snapshot line
pub fn encode_record(record: &ChannelRecord) -> String {
    let hd = match record.is_hd {
        Some(true) => "1",
        Some(false) => "0",
        None => "",
    };
    format!(
        "{number}{sep}{name}{sep}{id}{sep}{hd}",
        number = record.number,
        name = record.name,
        id = record.id.as_deref().unwrap_or(""),
        hd = hd,
        sep = FIELD_SEPARATOR,
    )
}

/// Render a whole snapshot file
pub fn encode(source_name: &str, lineup: &Lineup) -> String {
    let mut out = format!("{}{}\n", HEADER_PREFIX, source_name);
    for record in lineup.records() {
        out.push_str(&encode_record(record));
        out.push('\n');
    }
    out
}

/// Parse one snapshot line (2, 3 or 4 fields)
pub fn parse_record(line: &str) -> Result<ChannelRecord> {
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    if !(2..=4).contains(&fields.len()) {
        return Err(Error::snapshot(format!(
            "expected 2 to 4 fields, got {}: {:?}",
            fields.len(),
            line
        )));
    }

    let number = fields[0].trim();
    if number.is_empty() {
        return Err(Error::snapshot(format!("empty channel number: {:?}", line)));
    }

    let id = fields
        .get(2)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let is_hd = match fields.get(3).map(|s| s.trim()) {
        None | Some("") => None,
        Some("1") | Some("true") => Some(true),
        Some("0") | Some("false") => Some(false),
        Some(other) => {
            return Err(Error::snapshot(format!(
                "invalid HD flag {:?}: {:?}",
                other, line
            )));
        }
    };

    Ok(ChannelRecord {
        number: ChannelNumber::new(number),
        name: fields[1].to_string(),
        id,
        is_hd,
    })
}

/// Parse a whole snapshot file
///
/// In strict mode the first malformed line is an error. Otherwise malformed
/// lines are logged and skipped.
pub fn decode(content: &str, strict: bool) -> Result<DecodedSnapshot> {
    let mut decoded = DecodedSnapshot::default();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        if let Some(name) = line.strip_prefix(HEADER_PREFIX) {
            if index == 0 {
                decoded.source_name = Some(name.to_string());
            }
            continue;
        }

        match parse_record(line) {
            Ok(record) => {
                decoded.lineup.insert(record);
            }
            Err(e) if strict => {
                return Err(Error::snapshot(format!("line {}: {}", index + 1, e)));
            }
            Err(e) => {
                tracing::warn!("Skipping malformed snapshot line {}: {}", index + 1, e);
                decoded.skipped_lines += 1;
            }
        }
    }

    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_preserves_optional_fields() {
        let lineup: Lineup = vec![
            ChannelRecord::new("2.1", "KTVU").with_id("1234").with_hd(true),
            ChannelRecord::new("7", "KGO").with_hd(false),
            ChannelRecord::new("44", "KBCW"),
        ]
        .into_iter()
        .collect();

        let decoded = decode(&encode("Antenna Tuner", &lineup), true).unwrap();
        assert_eq!(decoded.source_name.as_deref(), Some("Antenna Tuner"));
        assert_eq!(decoded.lineup, lineup);
    }

    #[test]
    fn test_legacy_field_counts() {
        let two = parse_record("5|PBS").unwrap();
        assert_eq!(two.name, "PBS");
        assert_eq!(two.id, None);
        assert_eq!(two.is_hd, None);

        let three = parse_record("6|FOX|abc").unwrap();
        assert_eq!(three.id.as_deref(), Some("abc"));
        assert_eq!(three.is_hd, None);
    }

    #[test]
    fn test_legacy_file_without_header() {
        let decoded = decode("5|PBS\n6|FOX|abc\n", true).unwrap();
        assert_eq!(decoded.source_name, None);
        assert_eq!(decoded.lineup.len(), 2);
    }

    #[test]
    fn test_empty_content_is_empty_lineup() {
        let decoded = decode("", true).unwrap();
        assert!(decoded.lineup.is_empty());
        assert_eq!(decoded.source_name, None);
    }

    #[test]
    fn test_malformed_line_strict_vs_lenient() {
        let content = "# Tuner\n1|A\nnot a channel line\n2|B\n";

        assert!(decode(content, true).is_err());

        let decoded = decode(content, false).unwrap();
        assert_eq!(decoded.lineup.len(), 2);
        assert_eq!(decoded.skipped_lines, 1);
    }

    #[test]
    fn test_invalid_hd_flag_is_malformed() {
        assert!(parse_record("1|A||maybe").is_err());
        assert!(parse_record("|A").is_err());
    }
}
