use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use dashmap::DashMap;

use crate::limits::*;
use crate::model::*;
use crate::source::*;

/// In-memory availability source and booking store for one organizational
/// context. Overlap between meetings is not checked here; the board does that.
pub struct InMemoryStore {
    staff: DashMap<StaffId, Staff>,
    windows: DashMap<WindowKey, BTreeMap<TimeOfDay, BTreeSet<StaffId>>>,
    meetings: DashMap<MeetingId, Meeting>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            staff: DashMap::new(),
            windows: DashMap::new(),
            meetings: DashMap::new(),
        }
    }

    // ── Staff ────────────────────────────────────────────────

    pub fn upsert_staff(&self, staff: Staff) {
        self.staff.insert(staff.id, staff);
    }

    pub fn staff_member(&self, id: &StaffId) -> Option<Staff> {
        self.staff.get(id).map(|e| e.value().clone())
    }

    /// Staff sharing an identity key, ascending by id.
    pub fn staff_by_identity(&self, identity_key: &str) -> Vec<Staff> {
        let mut found: Vec<Staff> = self
            .staff
            .iter()
            .filter(|e| e.identity_key.as_deref() == Some(identity_key))
            .map(|e| e.value().clone())
            .collect();
        found.sort_by_key(|s| s.id);
        found
    }

    // ── Availability ─────────────────────────────────────────

    /// Set the staff configured at one time of day, replacing any earlier
    /// entry for the same key and time. An empty set removes the entry.
    pub fn configure_window(&self, window: AvailabilityWindow) -> Result<(), SourceError> {
        if let WindowKey::Weekday(w) = window.key
            && w > 6
        {
            return Err(SourceError::Rejected(format!("weekday {w} out of range")));
        }
        let mut day = self.windows.entry(window.key).or_default();
        if window.staff_ids.is_empty() {
            day.remove(&window.time);
        } else {
            day.insert(window.time, window.staff_ids);
        }
        Ok(())
    }

    // ── Meetings ─────────────────────────────────────────────

    pub fn book_meeting(&self, meeting: Meeting) -> Result<(), SourceError> {
        if meeting.duration_minutes == 0 {
            return Err(SourceError::Rejected("meeting duration must be at least one minute".into()));
        }
        if meeting.duration_minutes > MAX_MEETING_DURATION_MINUTES {
            return Err(SourceError::LimitExceeded("meeting too long"));
        }
        if meeting.attendees.len() > MAX_ATTENDEES_PER_MEETING {
            return Err(SourceError::LimitExceeded("too many attendees"));
        }
        match self.meetings.entry(meeting.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(SourceError::AlreadyExists(meeting.id)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(meeting);
                Ok(())
            }
        }
    }

    pub fn meeting(&self, id: &MeetingId) -> Option<Meeting> {
        self.meetings.get(id).map(|e| e.value().clone())
    }

    pub fn meeting_count(&self) -> usize {
        self.meetings.len()
    }

    pub fn set_status(&self, id: MeetingId, status: MeetingStatus) -> Result<Meeting, SourceError> {
        let mut meeting = self.meetings.get_mut(&id).ok_or(SourceError::NotFound(id))?;
        meeting.status = status;
        Ok(meeting.clone())
    }

    /// Meetings of `staff_id` overlapping `date`, in `(start, id)` order.
    /// Canceled ones included.
    pub fn meetings_on(&self, date: NaiveDate, staff_id: StaffId) -> Vec<Meeting> {
        let day = Span::day(date);
        let mut found: Vec<Meeting> = self
            .meetings
            .iter()
            .filter(|e| e.is_assigned_to(staff_id) && e.span().overlaps(&day))
            .map(|e| e.value().clone())
            .collect();
        found.sort_by_key(|m| (m.start, m.id));
        found
    }
}

#[async_trait]
impl AvailabilitySource for InMemoryStore {
    async fn weekday_slots(&self, weekdays: &[u8]) -> Result<WeekdaySlots, SourceError> {
        let mut out = WeekdaySlots::new();
        for entry in self.windows.iter() {
            let WindowKey::Weekday(w) = *entry.key() else {
                continue;
            };
            if !weekdays.contains(&w) {
                continue;
            }
            out.entry(w).or_default().extend(entry.value().iter().map(|(time, staff)| WeekdaySlot {
                time: *time,
                staff_ids: staff.iter().copied().collect(),
            }));
        }
        Ok(out)
    }

    async fn date_slots(&self, range: DateRange) -> Result<DateSlots, SourceError> {
        let mut out = DateSlots::new();
        for entry in self.windows.iter() {
            let WindowKey::Date(date) = *entry.key() else {
                continue;
            };
            if !range.contains(date) || entry.value().is_empty() {
                continue;
            }
            let times: BTreeMap<TimeOfDay, Vec<StaffId>> = entry
                .value()
                .iter()
                .map(|(time, staff)| (*time, staff.iter().copied().collect()))
                .collect();
            out.insert(date, times);
        }
        Ok(out)
    }

    async fn staff(&self) -> Result<Vec<Staff>, SourceError> {
        let mut roster: Vec<Staff> = self.staff.iter().map(|e| e.value().clone()).collect();
        roster.sort_by_key(|s| s.id);
        Ok(roster)
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn list_meetings(
        &self,
        range: DateRange,
        staff_filter: Option<&[StaffId]>,
    ) -> Result<Vec<Meeting>, SourceError> {
        let span = range.span();
        let mut found: Vec<Meeting> = self
            .meetings
            .iter()
            .filter(|e| e.span().overlaps(&span))
            .filter(|e| match (staff_filter, e.staff_id) {
                (None, _) => true,
                (Some(filter), Some(staff)) => filter.contains(&staff),
                (Some(_), None) => false,
            })
            .map(|e| e.value().clone())
            .collect();
        found.sort_by_key(|m| (m.start, m.id));
        Ok(found)
    }

    async fn reschedule_meeting(
        &self,
        meeting_id: MeetingId,
        new_start: NaiveDateTime,
        staff_id: Option<StaffId>,
    ) -> Result<Meeting, SourceError> {
        let mut meeting = self
            .meetings
            .get_mut(&meeting_id)
            .ok_or(SourceError::NotFound(meeting_id))?;
        meeting.start = new_start;
        if let Some(staff_id) = staff_id {
            meeting.staff_id = Some(staff_id);
        }
        Ok(meeting.clone())
    }
}
