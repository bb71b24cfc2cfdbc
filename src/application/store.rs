use crate::domain::license::LicenseTier;
use crate::domain::models::{DateRange, EventGroup};
use crate::domain::ranges;
use crate::domain::snapshot::Snapshot;
use chrono::NaiveDate;

pub type SubscriptionId = u64;

type Listener = Box<dyn FnMut(&Snapshot) + Send>;

/// Owns the current plan. Every mutation goes through [`PlannerStore::update`]
/// and is followed by one notification of every subscriber.
pub struct PlannerStore {
    snapshot: Snapshot,
    tier: LicenseTier,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: SubscriptionId,
}

impl PlannerStore {
    pub fn new(snapshot: Snapshot, tier: LicenseTier) -> Self {
        Self {
            snapshot,
            tier,
            listeners: Vec::new(),
            next_subscription: 1,
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn tier(&self) -> LicenseTier {
        self.tier
    }

    /// Tier only bounds future group creation; existing groups are kept.
    pub fn set_tier(&mut self, tier: LicenseTier) {
        self.tier = tier;
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&Snapshot) + Send + 'static,
    {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(candidate, _)| *candidate != id);
        self.listeners.len() != before
    }

    fn notify(&mut self) {
        let snapshot = &self.snapshot;
        for (_, listener) in self.listeners.iter_mut() {
            listener(snapshot);
        }
    }

    pub fn replace(&mut self, snapshot: Snapshot) {
        self.snapshot = snapshot;
        self.notify();
    }

    pub fn update<F, R>(&mut self, mutation: F) -> R
    where
        F: FnOnce(&mut Snapshot) -> R,
    {
        let result = mutation(&mut self.snapshot);
        self.notify();
        result
    }

    pub fn set_start_date(&mut self, date: NaiveDate) {
        self.update(|snapshot| snapshot.set_start_date(date));
    }

    pub fn set_include_weekends(&mut self, include: bool) {
        self.update(|snapshot| snapshot.include_weekends = include);
    }

    pub fn set_show_today(&mut self, show: bool) {
        self.update(|snapshot| snapshot.show_today = show);
    }

    /// Creates and selects a group. Returns the sentinel group when the tier's
    /// group limit is reached.
    pub fn add_group(&mut self, name: &str) -> EventGroup {
        let max_groups = self.tier.max_groups();
        self.update(|snapshot| {
            let group = snapshot.groups.create_group(name, max_groups);
            if !group.is_sentinel() {
                snapshot.select_group(Some(&group.id));
            }
            group
        })
    }

    pub fn rename_group(&mut self, id: &str, name: &str) -> bool {
        self.update(|snapshot| snapshot.groups.rename_group(id, name))
    }

    pub fn delete_group(&mut self, id: &str) -> bool {
        self.update(|snapshot| snapshot.delete_group(id))
    }

    pub fn select_group(&mut self, id: Option<&str>) {
        self.update(|snapshot| snapshot.select_group(id));
    }

    fn edit_group<F, R>(&mut self, group_id: &str, edit: F) -> Option<R>
    where
        F: FnOnce(&mut EventGroup) -> R,
    {
        self.update(|snapshot| snapshot.group_mut(group_id).map(edit))
    }

    /// Click on a day: uncovers it when selected, selects it otherwise.
    pub fn toggle_single_date(&mut self, group_id: &str, date: NaiveDate) -> bool {
        self.edit_group(group_id, |group| ranges::split_on_date(group, date))
            .is_some()
    }

    /// Drag release: adds the dragged span even when it overlaps stored ranges.
    pub fn paint_range(&mut self, group_id: &str, anchor: NaiveDate, pointer: NaiveDate) -> Option<DateRange> {
        self.edit_group(group_id, |group| ranges::commit_drag_selection(group, anchor, pointer))
    }

    pub fn replace_ranges(&mut self, group_id: &str, anchor: NaiveDate, focus: NaiveDate) -> Option<DateRange> {
        self.edit_group(group_id, |group| ranges::replace_ranges(group, anchor, focus))
    }

    pub fn add_range(&mut self, group_id: &str, range: DateRange) -> bool {
        self.edit_group(group_id, |group| ranges::add_range(group, range))
            .is_some()
    }

    pub fn update_range(&mut self, group_id: &str, old_range: DateRange, new_range: DateRange) -> bool {
        self.edit_group(group_id, |group| ranges::update_range(group, old_range, new_range))
            .unwrap_or(false)
    }

    pub fn delete_range(&mut self, group_id: &str, range: DateRange) -> bool {
        self.edit_group(group_id, |group| ranges::delete_range(group, range))
            .unwrap_or(false)
    }
}
