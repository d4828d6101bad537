//! Date keys and the "what day is it" capability.

use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Serialize, Serializer};
use tracing::warn;

use crate::error::StoryError;

/// A calendar day, always rendered as `YYYY-MM-DD`.
///
/// This is both the daily note's file stem and the key of its row in the
/// aggregate note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NoteDate(NaiveDate);

impl NoteDate {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn naive(self) -> NaiveDate {
        self.0
    }

    /// Vault-relative path of this day's note.
    pub fn note_path(self) -> String {
        format!("{self}.md")
    }
}

impl From<NaiveDate> for NoteDate {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for NoteDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for NoteDate {
    type Err = StoryError;

    /// Accepts exactly ten characters, `YYYY-MM-DD`, zero padded.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StoryError::InvalidDate {
            input: s.to_string(),
        };
        let bytes = s.as_bytes();
        let shape_ok = bytes.len() == 10
            && bytes.iter().enumerate().all(|(i, b)| match i {
                4 | 7 => *b == b'-',
                _ => b.is_ascii_digit(),
            });
        if !shape_ok {
            return Err(invalid());
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Self)
            .map_err(|_| invalid())
    }
}

impl Serialize for NoteDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Supplies "today".
pub trait DateProvider: Send + Sync {
    fn today(&self) -> NoteDate;
}

/// Wall clock in either the system's local zone or a fixed IANA zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    zone: Option<Tz>,
}

impl SystemClock {
    pub fn local() -> Self {
        Self { zone: None }
    }

    pub fn in_zone(zone: Tz) -> Self {
        Self { zone: Some(zone) }
    }

    /// Build from the `vault.timezone` setting.  `"local"` (or an empty
    /// string) means the system zone; an unrecognised name falls back to it.
    pub fn from_setting(setting: &str) -> Self {
        let trimmed = setting.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("local") {
            return Self::local();
        }
        match trimmed.parse::<Tz>() {
            Ok(zone) => Self::in_zone(zone),
            Err(_) => {
                warn!(tz = %trimmed, "unrecognised timezone, falling back to local time");
                Self::local()
            }
        }
    }

    pub fn zone_label(&self) -> String {
        match self.zone {
            Some(zone) => zone.name().to_string(),
            None => "local".to_string(),
        }
    }
}

impl DateProvider for SystemClock {
    fn today(&self) -> NoteDate {
        match self.zone {
            Some(zone) => NoteDate(Utc::now().with_timezone(&zone).date_naive()),
            None => NoteDate(Local::now().date_naive()),
        }
    }
}

/// Always reports the same day.  Used for `--date` overrides and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedDate(pub NoteDate);

impl DateProvider for FixedDate {
    fn today(&self) -> NoteDate {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_zero_padded_iso() {
        let date = NoteDate::from_ymd(2024, 1, 2).unwrap();
        assert_eq!(date.to_string(), "2024-01-02");
        assert_eq!(date.note_path(), "2024-01-02.md");
    }

    #[test]
    fn parses_strict_iso_only() {
        assert_eq!(
            "2024-03-09".parse::<NoteDate>().unwrap(),
            NoteDate::from_ymd(2024, 3, 9).unwrap()
        );
        for bad in ["2024-3-9", "2024/03/09", "20240309", " 2024-03-09", "2024-02-30", ""] {
            assert!(bad.parse::<NoteDate>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn invalid_date_error_names_the_input() {
        let err = "yesterday".parse::<NoteDate>().unwrap_err();
        assert!(err.to_string().contains("\"yesterday\""));
    }

    #[test]
    fn serializes_as_plain_string() {
        let date = NoteDate::from_ymd(2023, 12, 31).unwrap();
        assert_eq!(serde_json::to_string(&date).unwrap(), "\"2023-12-31\"");
    }

    #[test]
    fn clock_setting_parsing() {
        assert_eq!(SystemClock::from_setting("local").zone_label(), "local");
        assert_eq!(SystemClock::from_setting("").zone_label(), "local");
        assert_eq!(
            SystemClock::from_setting("Europe/Berlin").zone_label(),
            "Europe/Berlin"
        );
        assert_eq!(SystemClock::from_setting("Mars/Olympus").zone_label(), "local");
    }

    #[test]
    fn fixed_date_reports_its_day() {
        let day = NoteDate::from_ymd(2024, 6, 1).unwrap();
        assert_eq!(FixedDate(day).today(), day);
    }
}
