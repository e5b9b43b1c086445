//! Display-zone handling.
//!
//! Readings are stored as local WIB wall-clock timestamps. The other two
//! Indonesian zones are whole-hour offsets from it, applied only when reading.

use chrono::{NaiveDateTime, TimeDelta, Utc};

/// UTC offset of the zone the table is written in.
pub const REFERENCE_UTC_OFFSET_HOURS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayZone {
    #[default]
    Wib,
    Wita,
    Wit,
}

impl DisplayZone {
    /// Case-insensitive lookup of a zone code. Empty input means WIB.
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "" | "WIB" => Some(Self::Wib),
            "WITA" => Some(Self::Wita),
            "WIT" => Some(Self::Wit),
            _ => None,
        }
    }

    pub const fn offset_hours(self) -> i64 {
        match self {
            Self::Wib => 0,
            Self::Wita => 1,
            Self::Wit => 2,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Wib => "WIB",
            Self::Wita => "WITA",
            Self::Wit => "WIT",
        }
    }

    pub fn to_display(self, stored: NaiveDateTime) -> NaiveDateTime {
        stored + TimeDelta::hours(self.offset_hours())
    }

    pub fn to_reference(self, displayed: NaiveDateTime) -> NaiveDateTime {
        displayed - TimeDelta::hours(self.offset_hours())
    }
}

/// Current wall-clock time in the reference zone.
pub fn reference_now() -> NaiveDateTime {
    Utc::now().naive_utc() + TimeDelta::hours(REFERENCE_UTC_OFFSET_HOURS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 11, 30)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(DisplayZone::parse("wita"), Some(DisplayZone::Wita));
        assert_eq!(DisplayZone::parse("WiT"), Some(DisplayZone::Wit));
        assert_eq!(DisplayZone::parse(""), Some(DisplayZone::Wib));
        assert_eq!(DisplayZone::parse("xyz"), None);
    }

    #[test]
    fn test_offsets_and_labels() {
        for (zone, hours, label) in [
            (DisplayZone::Wib, 0, "WIB"),
            (DisplayZone::Wita, 1, "WITA"),
            (DisplayZone::Wit, 2, "WIT"),
        ] {
            assert_eq!(zone.offset_hours(), hours);
            assert_eq!(zone.label(), label);
            assert_eq!(zone.to_display(at(10, 15)), at(10 + hours as u32, 15));
        }
    }

    #[test]
    fn test_shift_crosses_midnight_and_back() {
        let late = at(23, 30);
        let shown = DisplayZone::Wit.to_display(late);
        assert_eq!(shown.date(), NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
        assert_eq!(DisplayZone::Wit.to_reference(shown), late);
    }
}
