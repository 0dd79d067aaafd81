use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::model::*;

use super::Snapshot;

impl Snapshot {
    /// Step 1: configured at exactly this time of day on this day.
    pub fn is_configured(&self, day: NaiveDate, time: TimeOfDay, staff_id: StaffId) -> bool {
        self.availability
            .staff_at(day, time)
            .is_some_and(|staff| staff.contains(&staff_id))
    }

    /// Step 2: some meeting assigned to `staff_id` contains the instant.
    pub fn is_covered(&self, day: NaiveDate, time: TimeOfDay, staff_id: StaffId) -> bool {
        self.covering(time.on(day)).any(|m| m.is_assigned_to(staff_id))
    }

    /// Step 3: the same person is booked under another context at this time.
    /// Only the selected date carries conflict data; every other day reports none.
    pub fn has_cross_context_conflict(&self, day: NaiveDate, time: TimeOfDay, staff_id: StaffId) -> bool {
        day == self.selected_date && self.has_conflict(staff_id, time)
    }

    pub fn is_bookable(&self, day: NaiveDate, time: TimeOfDay, staff_id: StaffId) -> bool {
        self.is_configured(day, time, staff_id)
            && self.is_active(staff_id)
            && !self.is_covered(day, time, staff_id)
            && !self.has_cross_context_conflict(day, time, staff_id)
    }

    /// Bookable staff at `(day, time)`, ascending by id with no duplicates.
    pub fn available_staff_for(&self, day: NaiveDate, time: TimeOfDay) -> Vec<StaffId> {
        let Some(configured) = self.availability.staff_at(day, time) else {
            return Vec::new();
        };
        let instant = time.on(day);
        let busy: BTreeSet<StaffId> = self
            .covering(instant)
            .filter_map(|m| m.staff_id)
            .collect();

        configured
            .iter()
            .copied()
            .filter(|id| self.is_active(*id))
            .filter(|id| !busy.contains(id))
            .filter(|id| !self.has_cross_context_conflict(day, time, *id))
            .collect()
    }
}
