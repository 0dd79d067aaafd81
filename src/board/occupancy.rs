use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::*;

use super::Snapshot;

/// Rendered height of a meeting, in visual units. Deliberately measured in
/// `VISUAL_UNIT_MINUTES`, not in grid steps.
pub fn visual_duration_slots(duration_minutes: u32) -> u32 {
    duration_minutes.max(1).div_ceil(VISUAL_UNIT_MINUTES)
}

/// Meetings of one staff member (or unassigned ones) starting in one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaffGroup<'a> {
    pub staff_id: Option<StaffId>,
    pub meetings: Vec<&'a Meeting>,
    /// Height of the tallest meeting in the group.
    pub visual_duration_slots: u32,
}

/// Result of resolving a click on a grid cell to the meeting occupying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cover<'a> {
    Vacant,
    Meeting(&'a Meeting),
    /// Meetings of several assignments cover the instant; the caller must name
    /// the staff member. Assignments ascending, `None` (unassigned) first.
    Ambiguous(Vec<Option<StaffId>>),
}

impl<'a> Cover<'a> {
    pub fn meeting(&self) -> Option<&'a Meeting> {
        match self {
            Cover::Meeting(m) => Some(*m),
            _ => None,
        }
    }
}

impl Snapshot {
    /// Meetings starting in `[time, time + GRID_STEP_MINUTES)` on `day`.
    pub fn meetings_starting_in_slot(&self, day: NaiveDate, time: TimeOfDay) -> Vec<&Meeting> {
        self.starting_within(&Slot::new(day, time).span()).iter().collect()
    }

    /// Meetings starting in the slot grouped per staff member, ascending by
    /// staff id with unassigned meetings first. Several meetings of one staff
    /// member in one slot (group sessions) stay together in one group.
    pub fn grouped_by_staff(&self, day: NaiveDate, time: TimeOfDay) -> Vec<StaffGroup<'_>> {
        let mut starting = self.meetings_starting_in_slot(day, time);
        // Stable: keeps (start, id) order inside each group.
        starting.sort_by_key(|m| m.staff_id);

        let mut groups: Vec<StaffGroup<'_>> = Vec::new();
        for meeting in starting {
            let height = visual_duration_slots(meeting.duration_minutes);
            match groups.last_mut() {
                Some(group) if group.staff_id == meeting.staff_id => {
                    group.meetings.push(meeting);
                    group.visual_duration_slots = group.visual_duration_slots.max(height);
                }
                _ => groups.push(StaffGroup {
                    staff_id: meeting.staff_id,
                    meetings: vec![meeting],
                    visual_duration_slots: height,
                }),
            }
        }
        groups
    }

    /// The meeting whose span contains the instant.
    ///
    /// With `staff_id`, the first of that staff member's covering meetings in
    /// `(start, id)` order. Without it, the first covering meeting when all of
    /// them share one assignment, and `Cover::Ambiguous` otherwise.
    pub fn covering_meeting(&self, day: NaiveDate, time: TimeOfDay, staff_id: Option<StaffId>) -> Cover<'_> {
        let instant = time.on(day);
        if let Some(staff_id) = staff_id {
            return self
                .covering(instant)
                .find(|m| m.is_assigned_to(staff_id))
                .map_or(Cover::Vacant, Cover::Meeting);
        }

        let mut covering = self.covering(instant);
        let Some(first) = covering.next() else {
            return Cover::Vacant;
        };
        let mut assignments: BTreeSet<Option<StaffId>> = BTreeSet::from([first.staff_id]);
        assignments.extend(covering.map(|m| m.staff_id));
        if assignments.len() == 1 {
            Cover::Meeting(first)
        } else {
            Cover::Ambiguous(assignments.into_iter().collect())
        }
    }

    /// Staff with a meeting covering the instant, ascending. Decides how many
    /// columns a row needs even when nothing starts in it.
    pub fn active_staff_in_slot(&self, day: NaiveDate, time: TimeOfDay) -> Vec<StaffId> {
        let staff: BTreeSet<StaffId> = self
            .covering(time.on(day))
            .filter_map(|m| m.staff_id)
            .collect();
        staff.into_iter().collect()
    }
}
