use crate::domain::groups::{new_group, GroupRegistry};
use crate::domain::models::{first_of_month, validate_non_empty, EventGroup, DEFAULT_GROUP_NAME};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Complete plan state. `selected_group_id` is UI selection and never part of
/// the share encoding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub start_date: NaiveDate,
    pub include_weekends: bool,
    pub show_today: bool,
    pub groups: GroupRegistry,
    pub selected_group_id: Option<String>,
}

impl Snapshot {
    /// One empty placeholder group, selected, starting at the month of `today`.
    pub fn default_for(today: NaiveDate) -> Self {
        let group = new_group(DEFAULT_GROUP_NAME, 0);
        let selected_group_id = Some(group.id.clone());
        Self {
            start_date: first_of_month(today),
            include_weekends: true,
            show_today: true,
            groups: GroupRegistry::from_groups(vec![group]),
            selected_group_id,
        }
    }

    pub fn set_start_date(&mut self, date: NaiveDate) {
        self.start_date = first_of_month(date);
    }

    pub fn group(&self, id: &str) -> Option<&EventGroup> {
        self.groups.get(id)
    }

    pub fn group_mut(&mut self, id: &str) -> Option<&mut EventGroup> {
        self.groups.get_mut(id)
    }

    pub fn selected_group(&self) -> Option<&EventGroup> {
        self.selected_group_id
            .as_deref()
            .and_then(|id| self.groups.get(id))
    }

    pub fn select_group(&mut self, id: Option<&str>) {
        self.selected_group_id = id.map(ToOwned::to_owned);
    }

    /// Removes the group and clears the selection if it pointed at it.
    pub fn delete_group(&mut self, id: &str) -> bool {
        let deleted = self.groups.delete_group(id);
        if deleted && self.selected_group_id.as_deref() == Some(id) {
            self.selected_group_id = None;
        }
        deleted
    }

    pub fn range_count(&self) -> usize {
        self.groups.iter().map(|group| group.ranges.len()).sum()
    }

    pub fn validate(&self) -> Result<(), String> {
        if first_of_month(self.start_date) != self.start_date {
            return Err("snapshot.start_date must be the first day of a month".to_string());
        }
        for group in self.groups.iter() {
            group.validate()?;
        }
        if let Some(selected) = self.selected_group_id.as_deref() {
            validate_non_empty(selected, "snapshot.selected_group_id")?;
            if self.groups.get(selected).is_none() {
                return Err("snapshot.selected_group_id must reference an existing group".to_string());
            }
        }
        Ok(())
    }
}
