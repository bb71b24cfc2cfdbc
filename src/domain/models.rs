use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

pub const DEFAULT_GROUP_NAME: &str = "My Events";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupColor {
    pub hex: &'static str,
}

/// Ordered group palette. The second half repeats the first at 60% alpha and
/// is only reachable once more than five groups exist.
pub const GROUP_COLORS: [GroupColor; 10] = [
    GroupColor { hex: "#8a35de" },
    GroupColor { hex: "#10a2f5" },
    GroupColor { hex: "#eb4888" },
    GroupColor { hex: "#e9bc3f" },
    GroupColor { hex: "#24d05a" },
    GroupColor { hex: "#8a35de99" },
    GroupColor { hex: "#10a2f599" },
    GroupColor { hex: "#eb488899" },
    GroupColor { hex: "#e9bc3f99" },
    GroupColor { hex: "#24d05a99" },
];

pub fn palette_index(hex: &str) -> Option<usize> {
    GROUP_COLORS.iter().position(|color| color.hex == hex)
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Builds a range from two endpoints in either order.
    pub fn new(a: NaiveDate, b: NaiveDate) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.end < self.start {
            return Err("range.end must be >= range.start".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventGroup {
    pub id: String,
    pub name: String,
    pub color: String,
    pub ranges: Vec<DateRange>,
}

impl EventGroup {
    /// Returned by group creation when the registry is full.
    pub fn sentinel() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            color: String::new(),
            ranges: Vec::new(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.id.is_empty()
    }

    pub fn palette_index(&self) -> Option<usize> {
        palette_index(&self.color)
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "group.id")?;
        validate_non_empty(&self.name, "group.name")?;
        validate_non_empty(&self.color, "group.color")?;
        for range in &self.ranges {
            range.validate()?;
        }
        Ok(())
    }
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub(crate) fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

/// Parses the date part of an ISO 8601 string. Older share links carry full
/// timestamps such as `2024-01-01T05:00:00.000Z`; only the calendar day is kept.
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let date_part = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}
