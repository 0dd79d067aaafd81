use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::model::*;

use super::Snapshot;

impl Snapshot {
    /// Every staff member with a configured entry or a meeting on `day`,
    /// ascending by id. Derived from content alone, so re-running it on the same
    /// inputs always yields the same columns in the same order.
    pub fn all_configured_staff_for_day(&self, day: NaiveDate) -> Vec<StaffId> {
        let mut staff: BTreeSet<StaffId> = self
            .availability
            .slots_for(day)
            .into_iter()
            .flat_map(|slots| slots.values())
            .flatten()
            .copied()
            .collect();
        staff.extend(self.overlapping(&Span::day(day)).filter_map(|m| m.staff_id));
        staff.into_iter().collect()
    }

    /// Zero-based column of `staff_id` on `day`, or `None` when the staff
    /// member has no column that day.
    pub fn column_index_of(&self, staff_id: StaffId, day: NaiveDate) -> Option<usize> {
        self.all_configured_staff_for_day(day)
            .binary_search(&staff_id)
            .ok()
    }
}
