//! Share-link encoding of a [`Snapshot`].
//!
//! Only the compact format is ever written:
//!
//! ```text
//! lz-string URI component of {"s":"2024-01-01","w":false,"t":false,"g":[{"n":"Trip","c":1,"r":[[4,6]]}]}
//! ```
//!
//! `w`, `t`, `g` and `n` are left out when they hold their default, and range
//! endpoints are day offsets from `s`. Two older formats are still read: plain
//! base64 JSON with `startDate` and full `eventGroups` objects, with or without
//! the display flags.

use crate::domain::groups::{first_free_color, next_id, GroupRegistry};
use crate::domain::models::{
    first_of_month, palette_index, parse_iso_date, DateRange, EventGroup, DEFAULT_GROUP_NAME,
    GROUP_COLORS,
};
use crate::domain::snapshot::Snapshot;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine as _;
use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("fragment is not lz-string compressed")]
    Decompress,
    #[error("fragment is not base64: {0}")]
    Base64(String),
    #[error("decoded payload is not UTF-8 text")]
    Utf8,
    #[error("decoded payload is not JSON: {0}")]
    Json(String),
    #[error("payload has neither `s` nor `startDate`")]
    UnrecognizedShape,
    #[error("invalid date: {0}")]
    InvalidDate(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompactState {
    pub s: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub g: Vec<CompactGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompactGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(default)]
    pub c: Option<i64>,
    #[serde(default)]
    pub r: Vec<[i64; 2]>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LegacyState {
    pub start_date: String,
    #[serde(default)]
    pub include_weekends: Option<bool>,
    #[serde(default)]
    pub show_today: Option<bool>,
    #[serde(default)]
    pub event_groups: Option<Vec<LegacyGroup>>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LegacyGroup {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub ranges: Vec<LegacyRange>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LegacyRange {
    pub start: String,
    pub end: String,
}

/// A parsed payload, tagged by the format it was written in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedState {
    Compact(CompactState),
    Legacy(LegacyState),
}

pub fn to_compact(snapshot: &Snapshot) -> CompactState {
    let start = snapshot.start_date;
    let groups = snapshot
        .groups
        .iter()
        .map(|group| CompactGroup {
            n: (group.name != DEFAULT_GROUP_NAME).then(|| group.name.clone()),
            c: Some(group.palette_index().map_or(-1, |index| index as i64)),
            r: group
                .ranges
                .iter()
                .map(|range| [(range.start - start).num_days(), (range.end - start).num_days()])
                .collect(),
        })
        .collect();

    CompactState {
        s: start.format("%Y-%m-%d").to_string(),
        w: (!snapshot.include_weekends).then_some(false),
        t: (!snapshot.show_today).then_some(false),
        g: groups,
    }
}

/// Encodes `snapshot` into a URL-fragment-safe string (without the `#`).
/// Equal snapshots always produce byte-identical output.
pub fn encode_snapshot(snapshot: &Snapshot) -> Result<String, CodecError> {
    let json = serde_json::to_string(&to_compact(snapshot))
        .map_err(|error| CodecError::Json(error.to_string()))?;
    Ok(lz_str::compress_to_encoded_uri_component(json.as_str()))
}

fn decompress(fragment: &str) -> Result<String, CodecError> {
    let wide = lz_str::decompress_from_encoded_uri_component(fragment).ok_or(CodecError::Decompress)?;
    let text = String::from_utf16(&wide).map_err(|_| CodecError::Utf8)?;
    if text.is_empty() {
        return Err(CodecError::Decompress);
    }
    Ok(text)
}

fn decode_base64(fragment: &str) -> Result<String, CodecError> {
    let bytes = STANDARD
        .decode(fragment)
        .or_else(|_| STANDARD_NO_PAD.decode(fragment.trim_end_matches('=')))
        .map_err(|error| CodecError::Base64(error.to_string()))?;
    String::from_utf8(bytes).map_err(|_| CodecError::Utf8)
}

/// Compact payloads are recognised by `s`, legacy ones by `startDate`.
pub fn parse_payload(text: &str) -> Result<DecodedState, CodecError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|error| CodecError::Json(error.to_string()))?;
    if value.get("s").is_some() {
        return serde_json::from_value::<CompactState>(value)
            .map(DecodedState::Compact)
            .map_err(|error| CodecError::Json(error.to_string()));
    }
    if value.get("startDate").is_some() {
        return serde_json::from_value::<LegacyState>(value)
            .map(DecodedState::Legacy)
            .map_err(|error| CodecError::Json(error.to_string()));
    }
    Err(CodecError::UnrecognizedShape)
}

/// Tries the lz-string stage first and falls back to plain base64.
pub fn decode_payload(fragment: &str) -> Result<DecodedState, CodecError> {
    match decompress(fragment).and_then(|text| parse_payload(&text)) {
        Ok(decoded) => Ok(decoded),
        Err(error) => {
            tracing::debug!("lz-string stage failed ({error}); trying base64");
            parse_payload(&decode_base64(fragment)?)
        }
    }
}

fn parse_start_date(value: &str) -> Result<NaiveDate, CodecError> {
    parse_iso_date(value)
        .map(first_of_month)
        .ok_or_else(|| CodecError::InvalidDate(value.to_string()))
}

fn offset_date(start: NaiveDate, offset: i64) -> Result<NaiveDate, CodecError> {
    TimeDelta::try_days(offset)
        .and_then(|delta| start.checked_add_signed(delta))
        .ok_or_else(|| CodecError::InvalidDate(format!("offset {offset} from {start}")))
}

/// Assigns a palette index to every incoming group so that no two groups
/// share one. Indices that are missing, out of range, or already taken by an
/// earlier group get the lowest index nobody referenced.
pub fn resolve_color_indices(requested: &[Option<i64>]) -> Vec<usize> {
    let palette_len = GROUP_COLORS.len() as i64;
    let valid = |index: Option<i64>| index.filter(|value| (0..palette_len).contains(value)).map(|value| value as usize);

    let mut claimed: HashSet<usize> = requested.iter().copied().filter_map(valid).collect();
    let mut assigned: HashSet<usize> = HashSet::new();

    requested
        .iter()
        .enumerate()
        .map(|(position, index)| {
            let resolved = match valid(*index) {
                Some(index) if !assigned.contains(&index) => index,
                _ => {
                    let index = first_free_color(&claimed, position);
                    claimed.insert(index);
                    index
                }
            };
            assigned.insert(resolved);
            resolved
        })
        .collect()
}

fn display_name(name: Option<String>) -> String {
    name.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_GROUP_NAME.to_string())
}

fn snapshot_with_groups(
    start_date: NaiveDate,
    include_weekends: bool,
    show_today: bool,
    groups: Vec<EventGroup>,
    today: NaiveDate,
) -> Snapshot {
    let groups = if groups.is_empty() {
        Snapshot::default_for(today).groups
    } else {
        GroupRegistry::from_groups(groups)
    };
    let selected_group_id = groups.first().map(|group| group.id.clone());
    Snapshot {
        start_date,
        include_weekends,
        show_today,
        groups,
        selected_group_id,
    }
}

fn from_compact(state: CompactState, today: NaiveDate) -> Result<Snapshot, CodecError> {
    let start_date = parse_start_date(&state.s)?;
    let requested: Vec<Option<i64>> = state.g.iter().map(|group| group.c).collect();
    let colors = resolve_color_indices(&requested);

    let groups = state
        .g
        .into_iter()
        .zip(colors)
        .map(|(group, color_index)| {
            let ranges = group
                .r
                .iter()
                .map(|[start, end]| {
                    Ok(DateRange::new(
                        offset_date(start_date, *start)?,
                        offset_date(start_date, *end)?,
                    ))
                })
                .collect::<Result<Vec<_>, CodecError>>()?;
            Ok(EventGroup {
                id: next_id("grp"),
                name: display_name(group.n),
                color: GROUP_COLORS[color_index].hex.to_string(),
                ranges,
            })
        })
        .collect::<Result<Vec<_>, CodecError>>()?;

    Ok(snapshot_with_groups(
        start_date,
        state.w.unwrap_or(true),
        state.t.unwrap_or(true),
        groups,
        today,
    ))
}

fn from_legacy(state: LegacyState, today: NaiveDate) -> Result<Snapshot, CodecError> {
    let start_date = parse_start_date(&state.start_date)?;
    let legacy_groups = state.event_groups.unwrap_or_default();

    let mut used_colors: HashSet<usize> = legacy_groups
        .iter()
        .filter_map(|group| group.color.as_deref())
        .filter_map(palette_index)
        .collect();

    let mut groups = Vec::with_capacity(legacy_groups.len());
    for (position, group) in legacy_groups.into_iter().enumerate() {
        let ranges = group
            .ranges
            .iter()
            .map(|range| {
                let start = parse_iso_date(&range.start)
                    .ok_or_else(|| CodecError::InvalidDate(range.start.clone()))?;
                let end = parse_iso_date(&range.end)
                    .ok_or_else(|| CodecError::InvalidDate(range.end.clone()))?;
                Ok(DateRange::new(start, end))
            })
            .collect::<Result<Vec<_>, CodecError>>()?;
        let color = match group.color.map(|value| value.trim().to_string()).filter(|value| !value.is_empty()) {
            Some(color) => color,
            None => {
                let index = first_free_color(&used_colors, position);
                used_colors.insert(index);
                GROUP_COLORS[index].hex.to_string()
            }
        };
        let id = group
            .id
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| next_id("grp"));
        groups.push(EventGroup {
            id,
            name: display_name(group.name),
            color,
            ranges,
        });
    }

    Ok(snapshot_with_groups(
        start_date,
        state.include_weekends.unwrap_or(true),
        state.show_today.unwrap_or(true),
        groups,
        today,
    ))
}

pub fn into_snapshot(decoded: DecodedState, today: NaiveDate) -> Result<Snapshot, CodecError> {
    match decoded {
        DecodedState::Compact(state) => from_compact(state, today),
        DecodedState::Legacy(state) => from_legacy(state, today),
    }
}

pub fn try_decode_fragment(fragment: &str, today: NaiveDate) -> Result<Snapshot, CodecError> {
    let fragment = fragment.trim().trim_start_matches('#');
    if fragment.is_empty() {
        return Err(CodecError::UnrecognizedShape);
    }
    into_snapshot(decode_payload(fragment)?, today)
}

/// Decodes any supported fragment. Anything unreadable yields the default
/// snapshot for `today`; this never fails.
pub fn decode_fragment(fragment: &str, today: NaiveDate) -> Snapshot {
    if fragment.trim().trim_start_matches('#').is_empty() {
        return Snapshot::default_for(today);
    }
    match try_decode_fragment(fragment, today) {
        Ok(snapshot) => snapshot,
        Err(error) => {
            tracing::warn!("discarding unreadable share state: {error}");
            Snapshot::default_for(today)
        }
    }
}
