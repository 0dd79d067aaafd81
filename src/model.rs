use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

pub type StaffId = Ulid;
pub type MeetingId = Ulid;

/// Width of one availability slot.
pub const GRID_STEP_MINUTES: u32 = 15;

/// Height unit used when rendering a meeting block. Independent of the grid
/// step: a meeting is drawn `ceil(duration / VISUAL_UNIT_MINUTES)` units tall.
pub const VISUAL_UNIT_MINUTES: u32 = 30;

/// Length assumed for a configured availability entry when widening the time axis.
pub const CONFIGURED_SLOT_MINUTES: u32 = 30;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Midnight at the start of `day`.
pub fn midnight(day: NaiveDate) -> NaiveDateTime {
    day.and_time(NaiveTime::MIN)
}

/// Weekday index with 0 = Sunday … 6 = Saturday.
pub fn weekday_index(day: NaiveDate) -> u8 {
    day.weekday().num_days_from_sunday() as u8
}

// ── Time of day ──────────────────────────────────────────────────

/// Minutes since midnight, `0..1440`. Serialized as `"HH:MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    /// Build from trusted constants.
    pub const fn hm(hour: u8, minute: u8) -> Self {
        debug_assert!(hour < 24 && minute < 60, "TimeOfDay out of range");
        Self(hour as u16 * 60 + minute as u16)
    }

    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self((hour * 60 + minute) as u16))
        } else {
            None
        }
    }

    pub fn from_minutes(minutes: u32) -> Option<Self> {
        (minutes < MINUTES_PER_DAY).then_some(Self(minutes as u16))
    }

    pub fn of(instant: &NaiveDateTime) -> Self {
        Self((instant.hour() * 60 + instant.minute()) as u16)
    }

    pub fn minutes(self) -> u32 {
        u32::from(self.0)
    }

    pub fn hour(self) -> u32 {
        self.minutes() / 60
    }

    pub fn minute(self) -> u32 {
        self.minutes() % 60
    }

    pub fn is_grid_aligned(self) -> bool {
        self.minutes() % GRID_STEP_MINUTES == 0
    }

    /// The instant this time of day falls on `day`.
    pub fn on(self, day: NaiveDate) -> NaiveDateTime {
        midnight(day) + TimeDelta::minutes(i64::from(self.0))
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTimeError(pub String);

impl fmt::Display for ParseTimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid time of day: {:?}", self.0)
    }
}

impl std::error::Error for ParseTimeError {}

impl FromStr for TimeOfDay {
    type Err = ParseTimeError;

    /// Accepts `HH:MM` and `HH:MM:SS` (seconds ignored).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseTimeError(s.to_string());
        let mut parts = s.split(':');
        let hour: u32 = parts.next().and_then(|h| h.parse().ok()).ok_or_else(err)?;
        let minute: u32 = parts.next().and_then(|m| m.parse().ok()).ok_or_else(err)?;
        if let Some(sec) = parts.next()
            && sec.parse::<u32>().map_or(true, |s| s >= 60)
        {
            return Err(err());
        }
        if parts.next().is_some() {
            return Err(err());
        }
        Self::new(hour, minute).ok_or_else(err)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ParseTimeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

// ── Spans and slots ──────────────────────────────────────────────

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Span {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// The whole calendar day `[00:00, next 00:00)`.
    pub fn day(day: NaiveDate) -> Self {
        let start = midnight(day);
        Self::new(start, start + TimeDelta::days(1))
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t < self.end
    }
}

/// One grid step on one day. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub day: NaiveDate,
    pub time: TimeOfDay,
}

impl Slot {
    pub fn new(day: NaiveDate, time: TimeOfDay) -> Self {
        Self { day, time }
    }

    pub fn instant(&self) -> NaiveDateTime {
        self.time.on(self.day)
    }

    /// `[instant, instant + GRID_STEP_MINUTES)`.
    pub fn span(&self) -> Span {
        let start = self.instant();
        Span::new(start, start + TimeDelta::minutes(i64::from(GRID_STEP_MINUTES)))
    }
}

// ── Staff ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staff {
    pub id: StaffId,
    pub name: String,
    pub color: Option<String>,
    pub active: bool,
    /// Correlates the same person across organizational contexts.
    pub identity_key: Option<String>,
}

impl Staff {
    pub fn new(id: StaffId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            color: None,
            active: true,
            identity_key: None,
        }
    }

    pub fn with_identity(mut self, key: impl Into<String>) -> Self {
        self.identity_key = Some(key.into());
        self
    }
}

// ── Availability configuration ───────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowKey {
    /// 0 = Sunday … 6 = Saturday.
    Weekday(u8),
    Date(NaiveDate),
}

/// Which staff may be booked at one time of day, either every given weekday
/// or on one calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub key: WindowKey,
    pub time: TimeOfDay,
    pub staff_ids: BTreeSet<StaffId>,
}

pub type DaySlots = BTreeMap<TimeOfDay, BTreeSet<StaffId>>;

/// All configured windows, indexed for exact (day, time) lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailabilityConfig {
    weekday: BTreeMap<u8, DaySlots>,
    dated: BTreeMap<NaiveDate, DaySlots>,
}

impl AvailabilityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, window: AvailabilityWindow) {
        let day = match window.key {
            WindowKey::Weekday(w) => self.weekday.entry(w).or_default(),
            WindowKey::Date(d) => self.dated.entry(d).or_default(),
        };
        day.entry(window.time).or_default().extend(window.staff_ids);
    }

    pub fn is_empty(&self) -> bool {
        self.weekday.values().all(BTreeMap::is_empty) && self.dated.values().all(BTreeMap::is_empty)
    }

    /// Entries in effect on `day`: per-date entries override the weekday ones
    /// whenever the date has any.
    pub fn slots_for(&self, day: NaiveDate) -> Option<&DaySlots> {
        match self.dated.get(&day) {
            Some(slots) if !slots.is_empty() => Some(slots),
            _ => self.weekday.get(&weekday_index(day)),
        }
    }

    /// Keep only the staff `keep` accepts. Times and dates stay in place even
    /// when emptied, so per-date entries still override the weekday ones.
    pub fn retain_staff(&mut self, keep: impl Fn(&StaffId) -> bool) {
        for slots in self.weekday.values_mut().chain(self.dated.values_mut()) {
            for staff in slots.values_mut() {
                staff.retain(&keep);
            }
        }
    }

    /// Staff configured at exactly `time` on `day`. No rounding.
    pub fn staff_at(&self, day: NaiveDate, time: TimeOfDay) -> Option<&BTreeSet<StaffId>> {
        self.slots_for(day).and_then(|slots| slots.get(&time))
    }
}

// ── Meetings ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Scheduled,
    Rescheduled,
    Completed,
    NoShow,
    Canceled,
    ContractPaid,
}

impl MeetingStatus {
    /// Canceled meetings free their slot.
    pub fn occupies(self) -> bool {
        !matches!(self, MeetingStatus::Canceled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendeeStatus {
    Invited,
    Completed,
    NoShow,
    Confirmed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    pub id: Ulid,
    pub name: Option<String>,
    /// Linked contact or deal.
    pub contact_ref: Option<String>,
    pub status: AttendeeStatus,
    pub secondary_decision_maker: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingContext {
    pub booked_by: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: MeetingId,
    pub start: NaiveDateTime,
    pub duration_minutes: u32,
    pub staff_id: Option<StaffId>,
    pub status: MeetingStatus,
    pub attendees: Vec<Attendee>,
    pub booking: BookingContext,
}

impl Meeting {
    pub fn new(id: MeetingId, start: NaiveDateTime, duration_minutes: u32, staff_id: Option<StaffId>) -> Self {
        Self {
            id,
            start,
            duration_minutes,
            staff_id,
            status: MeetingStatus::Scheduled,
            attendees: Vec::new(),
            booking: BookingContext::default(),
        }
    }

    /// Occupied interval. A zero duration is treated as one minute.
    pub fn span(&self) -> Span {
        let minutes = i64::from(self.duration_minutes.max(1));
        Span::new(self.start, self.start + TimeDelta::minutes(minutes))
    }

    pub fn end(&self) -> NaiveDateTime {
        self.span().end
    }

    pub fn covers(&self, instant: NaiveDateTime) -> bool {
        self.span().contains_instant(instant)
    }

    pub fn is_assigned_to(&self, staff_id: StaffId) -> bool {
        self.staff_id == Some(staff_id)
    }
}

/// A time of day on the selected date at which the staff member's identity is
/// already booked under a different organizational context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub staff_id: StaffId,
    pub time: TimeOfDay,
}
