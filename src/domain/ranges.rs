//! Range-set operations on a single group's dates.
//!
//! Ranges are kept in insertion order and are never merged automatically.
//! Two entry points edit a group interactively and they deliberately follow
//! different overlap policies:
//!
//! - [`split_on_date`] toggles one day. It removes the first stored range
//!   covering the day and re-adds the remainders on either side. Only that
//!   range is split, so after an overlapping paint the day may stay covered by
//!   a later range.
//! - [`commit_drag_selection`] paints the dragged span as a new range without
//!   looking at what is already stored, so a drag over selected days may leave
//!   overlapping ranges behind.

use crate::domain::models::{DateRange, EventGroup};
use chrono::{Datelike, Months, NaiveDate, Weekday};

pub fn is_date_in_any_range(date: NaiveDate, group: &EventGroup) -> bool {
    group.ranges.iter().any(|range| range.contains(date))
}

/// First range in stored order that covers `date`.
pub fn find_containing_range(date: NaiveDate, group: &EventGroup) -> Option<DateRange> {
    group
        .ranges
        .iter()
        .find(|range| range.contains(date))
        .copied()
}

pub fn add_range(group: &mut EventGroup, range: DateRange) {
    group.ranges.push(range);
}

/// Removes every range equal to `range`. Returns whether anything was removed.
pub fn delete_range(group: &mut EventGroup, range: DateRange) -> bool {
    let before = group.ranges.len();
    group.ranges.retain(|candidate| *candidate != range);
    group.ranges.len() != before
}

pub fn update_range(group: &mut EventGroup, old_range: DateRange, new_range: DateRange) -> bool {
    let mut replaced = false;
    for range in group.ranges.iter_mut().filter(|range| **range == old_range) {
        *range = new_range;
        replaced = true;
    }
    replaced
}

/// Click toggle: uncovers `date` when it is selected, selects it otherwise.
/// Only the first range containing `date` is split.
pub fn split_on_date(group: &mut EventGroup, date: NaiveDate) {
    let Some(existing) = find_containing_range(date, group) else {
        add_range(group, DateRange::single(date));
        return;
    };

    delete_range(group, existing);
    if existing.start < date {
        if let Some(before_end) = date.pred_opt() {
            add_range(group, DateRange::new(existing.start, before_end));
        }
    }
    if date < existing.end {
        if let Some(after_start) = date.succ_opt() {
            add_range(group, DateRange::new(after_start, existing.end));
        }
    }
}

/// Drag release: stores the span between anchor and pointer as-is.
pub fn commit_drag_selection(group: &mut EventGroup, anchor: NaiveDate, pointer: NaiveDate) -> DateRange {
    let range = DateRange::new(anchor, pointer);
    add_range(group, range);
    range
}

/// Keyboard shift-selection replaces the whole selection with one range.
pub fn replace_ranges(group: &mut EventGroup, anchor: NaiveDate, focus: NaiveDate) -> DateRange {
    let range = DateRange::new(anchor, focus);
    group.ranges.clear();
    group.ranges.push(range);
    range
}

/// Days of the rolling 12-month grid starting at the month of `start`.
pub fn calendar_dates(start: NaiveDate) -> Vec<NaiveDate> {
    let Some(first) = start.with_day(1) else {
        return Vec::new();
    };
    let Some(last) = first
        .checked_add_months(Months::new(12))
        .and_then(|next_year| next_year.pred_opt())
    else {
        return Vec::new();
    };
    first.iter_days().take_while(|day| *day <= last).collect()
}

pub fn visible_dates(start: NaiveDate, include_weekends: bool) -> Vec<NaiveDate> {
    calendar_dates(start)
        .into_iter()
        .filter(|day| include_weekends || !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .collect()
}
