use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveDateTime};

use crate::config::GridSettings;
use crate::limits::*;
use crate::model::*;
use crate::source::DateRange;

use super::ScheduleError;

/// What the board is looking at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub range: DateRange,
    /// Cross-context conflicts are only resolved for this date.
    pub selected_date: NaiveDate,
    pub staff_filter: Option<Vec<StaffId>>,
}

impl View {
    pub fn day(day: NaiveDate) -> Self {
        Self {
            range: DateRange::single(day),
            selected_date: day,
            staff_filter: None,
        }
    }

    pub fn week(first: NaiveDate, selected_date: NaiveDate) -> Self {
        Self {
            range: DateRange::new(first, first + chrono::TimeDelta::days(6)),
            selected_date,
            staff_filter: None,
        }
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.range.is_empty() {
            return Err(ScheduleError::InvalidView("empty date range"));
        }
        if self.range.len() > MAX_DAYS_PER_VIEW {
            return Err(ScheduleError::LimitExceeded("date range too wide"));
        }
        if !self.range.contains(self.selected_date) {
            return Err(ScheduleError::InvalidView("selected date outside range"));
        }
        if let Some(filter) = &self.staff_filter
            && filter.len() > MAX_STAFF_FILTER_IDS
        {
            return Err(ScheduleError::LimitExceeded("too many staff ids in filter"));
        }
        Ok(())
    }
}

/// Immutable inputs for every derived computation on the board. Rebuilt from
/// the collaborators on each refresh, never patched from cached layout state.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub range: DateRange,
    pub selected_date: NaiveDate,
    pub settings: GridSettings,
    pub staff: BTreeMap<StaffId, Staff>,
    pub availability: AvailabilityConfig,
    /// Staff shown on the board; `None` shows everyone. Configuration, roster
    /// and meetings outside it are dropped together.
    staff_filter: Option<BTreeSet<StaffId>>,
    /// Non-canceled meetings sorted by `(start, id)`.
    meetings: Vec<Meeting>,
    /// Conflicts on `selected_date` only.
    conflicts: BTreeSet<ConflictRecord>,
}

impl Snapshot {
    pub fn new(
        view: &View,
        settings: GridSettings,
        staff: Vec<Staff>,
        mut availability: AvailabilityConfig,
        meetings: Vec<Meeting>,
        conflicts: Vec<ConflictRecord>,
    ) -> Self {
        let staff_filter: Option<BTreeSet<StaffId>> =
            view.staff_filter.as_ref().map(|ids| ids.iter().copied().collect());
        let mut staff: BTreeMap<StaffId, Staff> = staff.into_iter().map(|s| (s.id, s)).collect();
        if let Some(filter) = &staff_filter {
            availability.retain_staff(|id| filter.contains(id));
            staff.retain(|id, _| filter.contains(id));
        }

        let mut snapshot = Self {
            range: view.range,
            selected_date: view.selected_date,
            settings,
            staff,
            availability,
            staff_filter,
            meetings: Vec::with_capacity(meetings.len()),
            conflicts: conflicts.into_iter().collect(),
        };
        for meeting in meetings {
            snapshot.insert_meeting(meeting);
        }
        snapshot
    }

    pub fn with_conflicts(mut self, conflicts: Vec<ConflictRecord>) -> Self {
        self.conflicts = conflicts.into_iter().collect();
        self
    }

    /// An empty board for `view`.
    pub fn empty(view: &View, settings: GridSettings) -> Self {
        Self::new(view, settings, Vec::new(), AvailabilityConfig::new(), Vec::new(), Vec::new())
    }

    pub fn meetings(&self) -> &[Meeting] {
        &self.meetings
    }

    pub fn meeting(&self, id: MeetingId) -> Option<&Meeting> {
        self.meetings.iter().find(|m| m.id == id)
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &ConflictRecord> {
        self.conflicts.iter()
    }

    /// Insert keeping `(start, id)` order. Canceled meetings and meetings of
    /// staff outside the filter are dropped.
    pub fn insert_meeting(&mut self, meeting: Meeting) {
        if !meeting.status.occupies() || !self.shows(meeting.staff_id) {
            return;
        }
        let key = (meeting.start, meeting.id);
        let pos = self
            .meetings
            .binary_search_by_key(&key, |m| (m.start, m.id))
            .unwrap_or_else(|e| e);
        self.meetings.insert(pos, meeting);
    }

    pub fn remove_meeting(&mut self, id: MeetingId) -> Option<Meeting> {
        let pos = self.meetings.iter().position(|m| m.id == id)?;
        Some(self.meetings.remove(pos))
    }

    /// Meetings whose span overlaps `query`, in `(start, id)` order.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Meeting> {
        // Everything at index >= right_bound starts at or after query.end.
        let right_bound = self.meetings.partition_point(|m| m.start < query.end);
        self.meetings[..right_bound]
            .iter()
            .filter(move |m| m.end() > query.start)
    }

    /// Meetings whose span contains `instant`, in `(start, id)` order.
    pub fn covering(&self, instant: NaiveDateTime) -> impl Iterator<Item = &Meeting> {
        let right_bound = self.meetings.partition_point(|m| m.start <= instant);
        self.meetings[..right_bound]
            .iter()
            .filter(move |m| m.covers(instant))
    }

    /// Meetings whose start lies in `window`.
    pub fn starting_within(&self, window: &Span) -> &[Meeting] {
        let lo = self.meetings.partition_point(|m| m.start < window.start);
        let hi = self.meetings.partition_point(|m| m.start < window.end);
        &self.meetings[lo..hi]
    }

    /// Whether meetings assigned to `staff_id` belong on this board. Unassigned
    /// meetings only show without a filter.
    pub fn shows(&self, staff_id: Option<StaffId>) -> bool {
        match (&self.staff_filter, staff_id) {
            (None, _) => true,
            (Some(filter), Some(id)) => filter.contains(&id),
            (Some(_), None) => false,
        }
    }

    pub(super) fn has_conflict(&self, staff_id: StaffId, time: TimeOfDay) -> bool {
        self.conflicts.contains(&ConflictRecord { staff_id, time })
    }

    /// Staff missing from the roster count as active.
    pub fn is_active(&self, staff_id: StaffId) -> bool {
        self.staff.get(&staff_id).is_none_or(|s| s.active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ulid::Ulid;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        day(d).and_hms_opt(h, m, 0).unwrap()
    }

    fn meeting(start: NaiveDateTime, minutes: u32) -> Meeting {
        Meeting::new(Ulid::new(), start, minutes, Some(Ulid(1)))
    }

    fn snapshot(meetings: Vec<Meeting>) -> Snapshot {
        Snapshot::new(
            &View::day(day(5)),
            GridSettings::default(),
            Vec::new(),
            AvailabilityConfig::new(),
            meetings,
            Vec::new(),
        )
    }

    #[test]
    fn meetings_kept_in_start_order() {
        let snap = snapshot(vec![
            meeting(at(5, 11, 0), 30),
            meeting(at(5, 9, 0), 30),
            meeting(at(5, 10, 0), 30),
        ]);
        let starts: Vec<_> = snap.meetings().iter().map(|m| m.start).collect();
        assert_eq!(starts, vec![at(5, 9, 0), at(5, 10, 0), at(5, 11, 0)]);
    }

    #[test]
    fn same_start_ordered_by_id() {
        let mut a = meeting(at(5, 9, 0), 30);
        let mut b = meeting(at(5, 9, 0), 30);
        a.id = Ulid(20);
        b.id = Ulid(10);
        let snap = snapshot(vec![a.clone(), b.clone()]);
        assert_eq!(snap.meetings()[0].id, b.id);
        assert_eq!(snap.meetings()[1].id, a.id);
    }

    #[test]
    fn canceled_meetings_dropped() {
        let mut canceled = meeting(at(5, 9, 0), 30);
        canceled.status = MeetingStatus::Canceled;
        let snap = snapshot(vec![canceled.clone(), meeting(at(5, 10, 0), 30)]);
        assert_eq!(snap.meetings().len(), 1);
        assert!(snap.meeting(canceled.id).is_none());
    }

    #[test]
    fn overlapping_skips_past_and_future() {
        let past = meeting(at(5, 8, 0), 30);
        let hit = meeting(at(5, 9, 45), 30);
        let future = meeting(at(5, 12, 0), 30);
        let snap = snapshot(vec![past, hit.clone(), future]);
        let hits: Vec<_> = snap.overlapping(&Span::new(at(5, 10, 0), at(5, 11, 0))).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, hit.id);
    }

    #[test]
    fn overlapping_adjacent_not_included() {
        let snap = snapshot(vec![meeting(at(5, 9, 0), 60)]);
        assert_eq!(snap.overlapping(&Span::new(at(5, 10, 0), at(5, 11, 0))).count(), 0);
    }

    #[test]
    fn covering_is_half_open() {
        let long = meeting(at(5, 9, 0), 60);
        let snap = snapshot(vec![long.clone()]);
        assert_eq!(snap.covering(at(5, 9, 45)).next().map(|m| m.id), Some(long.id));
        assert!(snap.covering(at(5, 10, 0)).next().is_none());
        assert!(snap.covering(at(5, 8, 45)).next().is_none());
    }

    #[test]
    fn starting_within_window() {
        let a = meeting(at(5, 10, 0), 15);
        let b = meeting(at(5, 10, 10), 15);
        let c = meeting(at(5, 10, 15), 15);
        let snap = snapshot(vec![a.clone(), b.clone(), c]);
        let ids: Vec<_> = snap
            .starting_within(&Slot::new(day(5), TimeOfDay::hm(10, 0)).span())
            .iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a.id) && ids.contains(&b.id));
    }

    #[test]
    fn remove_then_insert_keeps_order() {
        let a = meeting(at(5, 9, 0), 30);
        let b = meeting(at(5, 10, 0), 30);
        let mut snap = snapshot(vec![a.clone(), b.clone()]);
        let mut moved = snap.remove_meeting(a.id).unwrap();
        moved.start = at(5, 11, 0);
        snap.insert_meeting(moved);
        let ids: Vec<_> = snap.meetings().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
        assert!(snap.remove_meeting(Ulid::new()).is_none());
    }

    #[test]
    fn unknown_staff_counts_as_active() {
        let mut inactive = Staff::new(Ulid(2), "Gone");
        inactive.active = false;
        let snap = Snapshot::new(
            &View::day(day(5)),
            GridSettings::default(),
            vec![inactive],
            AvailabilityConfig::new(),
            Vec::new(),
            Vec::new(),
        );
        assert!(snap.is_active(Ulid(1)));
        assert!(!snap.is_active(Ulid(2)));
    }

    #[test]
    fn staff_filter_drops_everything_outside_it() {
        let (x, y) = (Ulid(1), Ulid(2));
        let mut config = AvailabilityConfig::new();
        config.insert(AvailabilityWindow {
            key: WindowKey::Date(day(5)),
            time: TimeOfDay::hm(10, 0),
            staff_ids: [x, y].into(),
        });
        let mut view = View::day(day(5));
        view.staff_filter = Some(vec![x]);
        let mut snap = Snapshot::new(
            &view,
            GridSettings::default(),
            vec![Staff::new(x, "X"), Staff::new(y, "Y")],
            config,
            vec![
                Meeting::new(Ulid(10), at(5, 9, 0), 30, Some(y)),
                Meeting::new(Ulid(11), at(5, 9, 0), 30, None),
            ],
            Vec::new(),
        );

        assert!(snap.meetings().is_empty());
        assert_eq!(snap.staff.keys().copied().collect::<Vec<_>>(), vec![x]);
        assert_eq!(snap.availability.staff_at(day(5), TimeOfDay::hm(10, 0)), Some(&[x].into()));

        snap.insert_meeting(Meeting::new(Ulid(12), at(5, 11, 0), 30, Some(y)));
        snap.insert_meeting(Meeting::new(Ulid(13), at(5, 11, 0), 30, Some(x)));
        assert_eq!(snap.meetings().len(), 1);
        assert!(snap.shows(Some(x)) && !snap.shows(Some(y)) && !snap.shows(None));
    }

    #[test]
    fn view_validation() {
        assert!(View::day(day(5)).validate().is_ok());
        assert!(View::week(day(4), day(6)).validate().is_ok());

        let outside = View::week(day(4), day(20));
        assert!(matches!(outside.validate(), Err(ScheduleError::InvalidView(_))));

        let wide = View {
            range: DateRange::new(day(1), day(1) + chrono::TimeDelta::days(MAX_DAYS_PER_VIEW as i64)),
            selected_date: day(1),
            staff_filter: None,
        };
        assert!(matches!(wide.validate(), Err(ScheduleError::LimitExceeded(_))));

        let mut filtered = View::day(day(5));
        filtered.staff_filter = Some(vec![Ulid::new(); MAX_STAFF_FILTER_IDS + 1]);
        assert!(matches!(filtered.validate(), Err(ScheduleError::LimitExceeded(_))));
    }
}
