//! Collaborators the board reads from and writes to.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::model::*;

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl DateRange {
    pub fn new(first: NaiveDate, last: NaiveDate) -> Self {
        debug_assert!(first <= last, "DateRange first must not be after last");
        Self { first, last }
    }

    pub fn single(day: NaiveDate) -> Self {
        Self::new(day, day)
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.first <= day && day <= self.last
    }

    pub fn len(&self) -> usize {
        ((self.last - self.first).num_days() + 1).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.last < self.first
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.first.iter_days().take_while(|d| *d <= self.last)
    }

    /// `[first 00:00, (last + 1) 00:00)`.
    pub fn span(&self) -> Span {
        Span::new(midnight(self.first), midnight(self.last) + TimeDelta::days(1))
    }

    /// Distinct weekday indices covered by the range, ascending.
    pub fn weekdays(&self) -> Vec<u8> {
        let set: BTreeSet<u8> = self.days().take(7).map(weekday_index).collect();
        set.into_iter().collect()
    }
}

/// Recurring entry for one weekday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekdaySlot {
    pub time: TimeOfDay,
    pub staff_ids: Vec<StaffId>,
}

/// `weekday → [{time, staff_ids}]`.
pub type WeekdaySlots = BTreeMap<u8, Vec<WeekdaySlot>>;

/// `date → time → staff_ids`, e.g. `{"2024-03-05": {"10:00": ["01H…"]}}`.
pub type DateSlots = BTreeMap<NaiveDate, BTreeMap<TimeOfDay, Vec<StaffId>>>;

/// Fold both configuration shapes into one lookup structure.
pub fn availability_config(weekday: WeekdaySlots, dated: DateSlots) -> AvailabilityConfig {
    let mut config = AvailabilityConfig::new();
    for (weekday, slots) in weekday {
        for slot in slots {
            config.insert(AvailabilityWindow {
                key: WindowKey::Weekday(weekday),
                time: slot.time,
                staff_ids: slot.staff_ids.into_iter().collect(),
            });
        }
    }
    for (date, times) in dated {
        for (time, staff_ids) in times {
            config.insert(AvailabilityWindow {
                key: WindowKey::Date(date),
                time,
                staff_ids: staff_ids.into_iter().collect(),
            });
        }
    }
    config
}

/// Parse a `getWeekdaySlots` payload.
pub fn parse_weekday_slots(json: &str) -> Result<WeekdaySlots, SourceError> {
    serde_json::from_str(json).map_err(|e| SourceError::Rejected(format!("bad weekday slots: {e}")))
}

/// Parse a `getDateSlots` payload.
pub fn parse_date_slots(json: &str) -> Result<DateSlots, SourceError> {
    serde_json::from_str(json).map_err(|e| SourceError::Rejected(format!("bad date slots: {e}")))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    NotFound(MeetingId),
    AlreadyExists(MeetingId),
    Rejected(String),
    Unavailable(String),
    LimitExceeded(&'static str),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::NotFound(id) => write!(f, "meeting not found: {id}"),
            SourceError::AlreadyExists(id) => write!(f, "meeting already exists: {id}"),
            SourceError::Rejected(msg) => write!(f, "write rejected: {msg}"),
            SourceError::Unavailable(msg) => write!(f, "source unavailable: {msg}"),
            SourceError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}

#[async_trait]
pub trait AvailabilitySource: Send + Sync {
    async fn weekday_slots(&self, weekdays: &[u8]) -> Result<WeekdaySlots, SourceError>;

    async fn date_slots(&self, range: DateRange) -> Result<DateSlots, SourceError>;

    /// The staff roster. Immutable for the length of a scheduling session.
    async fn staff(&self) -> Result<Vec<Staff>, SourceError>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn list_meetings(
        &self,
        range: DateRange,
        staff_filter: Option<&[StaffId]>,
    ) -> Result<Vec<Meeting>, SourceError>;

    /// Move a meeting. `staff_id = None` keeps the current assignment.
    async fn reschedule_meeting(
        &self,
        meeting_id: MeetingId,
        new_start: NaiveDateTime,
        staff_id: Option<StaffId>,
    ) -> Result<Meeting, SourceError>;
}

#[async_trait]
pub trait ConflictSource: Send + Sync {
    async fn cross_context_conflicts(
        &self,
        staff_ids: &[StaffId],
        date: NaiveDate,
    ) -> Result<Vec<ConflictRecord>, SourceError>;
}

/// A conflict source for boards that live in a single context.
pub struct NoConflicts;

#[async_trait]
impl ConflictSource for NoConflicts {
    async fn cross_context_conflicts(
        &self,
        _staff_ids: &[StaffId],
        _date: NaiveDate,
    ) -> Result<Vec<ConflictRecord>, SourceError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn range_days_inclusive() {
        let r = DateRange::new(day(4), day(6));
        assert_eq!(r.len(), 3);
        assert_eq!(r.days().collect::<Vec<_>>(), vec![day(4), day(5), day(6)]);
        assert!(r.contains(day(6)));
        assert!(!r.contains(day(7)));
        assert_eq!(r.span().duration_minutes(), 3 * 24 * 60);
    }

    #[test]
    fn range_weekdays_wrap_and_dedup() {
        // Sat 2024-03-09 .. Mon 2024-03-18 covers every weekday.
        let r = DateRange::new(day(9), day(18));
        assert_eq!(r.weekdays(), vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(DateRange::single(day(5)).weekdays(), vec![2]);
    }

    #[test]
    fn date_slots_parse_from_json() {
        let x = Ulid(1);
        let json = format!(r#"{{"2024-03-05": {{"10:00": ["{x}"], "10:15": []}}}}"#);
        let parsed = parse_date_slots(&json).unwrap();
        assert_eq!(parsed[&day(5)][&TimeOfDay::hm(10, 0)], vec![x]);
        assert!(parsed[&day(5)][&TimeOfDay::hm(10, 15)].is_empty());
    }

    #[test]
    fn weekday_slots_parse_from_json() {
        let x = Ulid(1);
        let json = format!(r#"{{"2": [{{"time": "10:00", "staff_ids": ["{x}"]}}]}}"#);
        let parsed = parse_weekday_slots(&json).unwrap();
        assert_eq!(parsed[&2][0].time, TimeOfDay::hm(10, 0));
    }

    #[test]
    fn malformed_payload_rejected() {
        assert!(matches!(parse_date_slots(r#"{"2024-03-05": {"25:00": []}}"#), Err(SourceError::Rejected(_))));
        assert!(matches!(parse_weekday_slots("[]"), Err(SourceError::Rejected(_))));
    }

    #[test]
    fn config_from_both_shapes() {
        let x = Ulid(1);
        let y = Ulid(2);
        let weekday = WeekdaySlots::from([(
            2,
            vec![WeekdaySlot {
                time: TimeOfDay::hm(10, 0),
                staff_ids: vec![y, x],
            }],
        )]);
        let dated = DateSlots::from([(day(12), BTreeMap::from([(TimeOfDay::hm(9, 0), vec![y])]))]);
        let config = availability_config(weekday, dated);

        let tuesday: Vec<_> = config.staff_at(day(5), TimeOfDay::hm(10, 0)).unwrap().iter().copied().collect();
        assert_eq!(tuesday, vec![x, y]);
        assert!(config.staff_at(day(12), TimeOfDay::hm(10, 0)).is_none());
        assert!(config.staff_at(day(12), TimeOfDay::hm(9, 0)).unwrap().contains(&y));
    }
}
