use crate::domain::models::{EventGroup, GROUP_COLORS, DEFAULT_GROUP_NAME};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

/// Picks the first palette slot not in `used`, or `fallback_index mod len`
/// once every slot is taken.
pub fn first_free_color(used: &HashSet<usize>, fallback_index: usize) -> usize {
    (0..GROUP_COLORS.len())
        .find(|index| !used.contains(index))
        .unwrap_or(fallback_index % GROUP_COLORS.len())
}

pub fn new_group(name: &str, color_index: usize) -> EventGroup {
    let name = name.trim();
    EventGroup {
        id: next_id("grp"),
        name: if name.is_empty() {
            DEFAULT_GROUP_NAME.to_string()
        } else {
            name.to_string()
        },
        color: GROUP_COLORS[color_index % GROUP_COLORS.len()].hex.to_string(),
        ranges: Vec::new(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct GroupRegistry {
    groups: Vec<EventGroup>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_groups(groups: Vec<EventGroup>) -> Self {
        Self { groups }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventGroup> {
        self.groups.iter()
    }

    pub fn as_slice(&self) -> &[EventGroup] {
        &self.groups
    }

    pub fn first(&self) -> Option<&EventGroup> {
        self.groups.first()
    }

    pub fn get(&self, id: &str) -> Option<&EventGroup> {
        self.groups.iter().find(|group| group.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut EventGroup> {
        self.groups.iter_mut().find(|group| group.id == id)
    }

    fn used_colors(&self) -> HashSet<usize> {
        self.groups.iter().filter_map(EventGroup::palette_index).collect()
    }

    /// Appends a new group with the first unused palette color. Returns the
    /// sentinel group (empty id) without touching the registry when
    /// `max_groups` is already reached.
    pub fn create_group(&mut self, name: &str, max_groups: usize) -> EventGroup {
        if self.groups.len() >= max_groups {
            return EventGroup::sentinel();
        }
        let color_index = first_free_color(&self.used_colors(), self.groups.len());
        let group = new_group(name, color_index);
        self.groups.push(group.clone());
        group
    }

    pub fn rename_group(&mut self, id: &str, name: &str) -> bool {
        match self.get_mut(id) {
            Some(group) => {
                let name = name.trim();
                group.name = if name.is_empty() {
                    DEFAULT_GROUP_NAME.to_string()
                } else {
                    name.to_string()
                };
                true
            }
            None => false,
        }
    }

    pub fn delete_group(&mut self, id: &str) -> bool {
        let before = self.groups.len();
        self.groups.retain(|group| group.id != id);
        self.groups.len() != before
    }
}
