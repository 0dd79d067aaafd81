use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::model::*;
use crate::notify::BoardEvent;

use super::{Board, ScheduleError, Snapshot};

/// A drop of `meeting_id` onto a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub meeting_id: MeetingId,
    pub day: NaiveDate,
    pub time: TimeOfDay,
    /// Column the meeting was dropped on. `None` keeps the current assignment.
    pub staff_id: Option<StaffId>,
}

impl RescheduleRequest {
    pub fn new(meeting_id: MeetingId, day: NaiveDate, time: TimeOfDay) -> Self {
        Self {
            meeting_id,
            day,
            time,
            staff_id: None,
        }
    }

    pub fn to_staff(mut self, staff_id: StaffId) -> Self {
        self.staff_id = Some(staff_id);
        self
    }

    pub fn destination(&self) -> NaiveDateTime {
        self.time.on(self.day)
    }
}

/// Why a drop was not accepted. Never an error: the write is simply not issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Decline {
    UnknownMeeting { meeting_id: MeetingId },
    /// An earlier reschedule of the same meeting has not settled.
    InFlight { meeting_id: MeetingId },
    SlotFull { staff_id: Option<StaffId>, occupied: usize },
    NotConfigured { staff_id: Option<StaffId> },
}

impl std::fmt::Display for Decline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decline::UnknownMeeting { meeting_id } => write!(f, "meeting {meeting_id} not on the board"),
            Decline::InFlight { meeting_id } => write!(f, "meeting {meeting_id} is already being moved"),
            Decline::SlotFull { occupied, .. } => write!(f, "destination slot full ({occupied} meetings)"),
            Decline::NotConfigured { .. } => write!(f, "staff not configured at destination"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RescheduleOutcome {
    Applied(Meeting),
    Declined(Decline),
}

impl RescheduleOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, RescheduleOutcome::Applied(_))
    }
}

/// A move that passed every precondition against one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub meeting_id: MeetingId,
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
    pub from_staff: Option<StaffId>,
    pub to_staff: Option<StaffId>,
}

impl Snapshot {
    /// Meetings of `staff_id` (or unassigned ones for `None`) occupying the
    /// instant, not counting `except`.
    pub fn occupancy_of(&self, instant: NaiveDateTime, staff_id: Option<StaffId>, except: MeetingId) -> usize {
        self.covering(instant)
            .filter(|m| m.staff_id == staff_id && m.id != except)
            .count()
    }

    /// Check a drop against this snapshot without touching any collaborator.
    pub fn plan_reschedule(&self, request: &RescheduleRequest) -> Result<PlannedMove, Decline> {
        let meeting = self.meeting(request.meeting_id).ok_or(Decline::UnknownMeeting {
            meeting_id: request.meeting_id,
        })?;
        let to = request.destination();
        let to_staff = request.staff_id.or(meeting.staff_id);

        if let Some(max) = self.settings.max_meetings_per_slot {
            let occupied = self.occupancy_of(to, to_staff, meeting.id);
            if occupied >= max {
                return Err(Decline::SlotFull {
                    staff_id: to_staff,
                    occupied,
                });
            }
        }

        if self.settings.require_configured_destination {
            let configured = to_staff.is_some_and(|staff| self.is_configured(request.day, request.time, staff));
            if !configured {
                return Err(Decline::NotConfigured { staff_id: to_staff });
            }
        }

        Ok(PlannedMove {
            meeting_id: meeting.id,
            from: meeting.start,
            to,
            from_staff: meeting.staff_id,
            to_staff,
        })
    }
}

/// Marks a meeting as being moved until dropped.
struct InFlightGuard<'a> {
    set: &'a DashMap<MeetingId, ()>,
    meeting_id: MeetingId,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a DashMap<MeetingId, ()>, meeting_id: MeetingId) -> Option<Self> {
        match set.entry(meeting_id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(Self { set, meeting_id })
            }
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.meeting_id);
    }
}

impl Board {
    /// Move a meeting to the dropped cell.
    ///
    /// Preconditions are checked against the current snapshot; a failed one
    /// declines the drop and nothing is written. A write failure at the booking
    /// store is returned as is and leaves the snapshot untouched. At most one
    /// reschedule per meeting is in flight at a time.
    pub async fn reschedule(&self, request: RescheduleRequest) -> Result<RescheduleOutcome, ScheduleError> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, request.meeting_id) else {
            return Ok(self.declined(Decline::InFlight {
                meeting_id: request.meeting_id,
            }));
        };

        let plan = match self.snapshot().await.plan_reschedule(&request) {
            Ok(plan) => plan,
            Err(decline) => return Ok(self.declined(decline)),
        };

        let updated = match self
            .bookings
            .reschedule_meeting(plan.meeting_id, plan.to, request.staff_id)
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                warn!("reschedule of {} to {} failed: {e}", plan.meeting_id, plan.to);
                metrics::counter!(crate::observability::RESCHEDULES_TOTAL, "outcome" => "failed").increment(1);
                return Err(e.into());
            }
        };

        {
            let mut current = self.snapshot.write().await;
            let snapshot = Arc::make_mut(&mut *current);
            snapshot.remove_meeting(updated.id);
            if updated.span().overlaps(&snapshot.range.span()) {
                snapshot.insert_meeting(updated.clone());
            }
        }

        self.notify.meeting_moved(&BoardEvent::MeetingMoved {
            meeting_id: updated.id,
            from: plan.from,
            to: updated.start,
            from_staff: plan.from_staff,
            to_staff: updated.staff_id,
        });
        metrics::counter!(crate::observability::RESCHEDULES_TOTAL, "outcome" => "applied").increment(1);
        info!("moved meeting {} from {} to {}", updated.id, plan.from, updated.start);
        Ok(RescheduleOutcome::Applied(updated))
    }

    fn declined(&self, decline: Decline) -> RescheduleOutcome {
        debug!("reschedule declined: {decline}");
        metrics::counter!(crate::observability::RESCHEDULES_TOTAL, "outcome" => "declined").increment(1);
        RescheduleOutcome::Declined(decline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::View;
    use crate::config::GridSettings;
    use ulid::Ulid;

    const X: StaffId = Ulid(1);
    const Y: StaffId = Ulid(2);

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    fn meeting(id: u128, h: u8, m: u8, staff: Option<StaffId>) -> Meeting {
        Meeting::new(Ulid(id), TimeOfDay::hm(h, m).on(day()), 30, staff)
    }

    fn snapshot(settings: GridSettings, config: AvailabilityConfig, meetings: Vec<Meeting>) -> Snapshot {
        Snapshot::new(&View::day(day()), settings, Vec::new(), config, meetings, Vec::new())
    }

    #[test]
    fn unknown_meeting_declined() {
        let snap = snapshot(GridSettings::default(), AvailabilityConfig::new(), Vec::new());
        let req = RescheduleRequest::new(Ulid(7), day(), TimeOfDay::hm(10, 0));
        assert_eq!(
            snap.plan_reschedule(&req),
            Err(Decline::UnknownMeeting { meeting_id: Ulid(7) })
        );
    }

    #[test]
    fn unbounded_default_never_fills() {
        let mut meetings: Vec<Meeting> = (0..999).map(|i| meeting(100 + i, 11, 0, Some(Y))).collect();
        meetings.push(meeting(1, 9, 0, Some(X)));
        let snap = snapshot(GridSettings::default(), AvailabilityConfig::new(), meetings);

        let req = RescheduleRequest::new(Ulid(1), day(), TimeOfDay::hm(11, 0)).to_staff(Y);
        let plan = snap.plan_reschedule(&req).unwrap();
        assert_eq!(plan.to_staff, Some(Y));
        assert_eq!(plan.from, TimeOfDay::hm(9, 0).on(day()));
        assert_eq!(plan.to, TimeOfDay::hm(11, 0).on(day()));
    }

    #[test]
    fn bounded_slot_fills_per_staff() {
        let settings = GridSettings {
            max_meetings_per_slot: Some(1),
            ..GridSettings::default()
        };
        let snap = snapshot(
            settings,
            AvailabilityConfig::new(),
            vec![meeting(1, 9, 0, Some(X)), meeting(2, 10, 45, Some(Y))],
        );

        // Y's 10:45 meeting still runs at 11:00.
        let onto_y = RescheduleRequest::new(Ulid(1), day(), TimeOfDay::hm(11, 0)).to_staff(Y);
        assert_eq!(
            snap.plan_reschedule(&onto_y),
            Err(Decline::SlotFull { staff_id: Some(Y), occupied: 1 })
        );

        let keep_x = RescheduleRequest::new(Ulid(1), day(), TimeOfDay::hm(11, 0));
        assert!(snap.plan_reschedule(&keep_x).is_ok());
    }

    #[test]
    fn moving_within_own_span_not_counted() {
        let settings = GridSettings {
            max_meetings_per_slot: Some(1),
            ..GridSettings::default()
        };
        let snap = snapshot(settings, AvailabilityConfig::new(), vec![meeting(1, 9, 0, Some(X))]);
        let req = RescheduleRequest::new(Ulid(1), day(), TimeOfDay::hm(9, 15));
        assert!(snap.plan_reschedule(&req).is_ok());
    }

    #[test]
    fn configured_destination_required_when_enabled() {
        let settings = GridSettings {
            require_configured_destination: true,
            ..GridSettings::default()
        };
        let mut config = AvailabilityConfig::new();
        config.insert(AvailabilityWindow {
            key: WindowKey::Date(day()),
            time: TimeOfDay::hm(14, 0),
            staff_ids: [X].into_iter().collect(),
        });
        let snap = snapshot(settings, config, vec![meeting(1, 9, 0, Some(X)), meeting(2, 9, 0, None)]);

        let ok = RescheduleRequest::new(Ulid(1), day(), TimeOfDay::hm(14, 0));
        assert!(snap.plan_reschedule(&ok).is_ok());

        let off_hours = RescheduleRequest::new(Ulid(1), day(), TimeOfDay::hm(15, 0));
        assert_eq!(
            snap.plan_reschedule(&off_hours),
            Err(Decline::NotConfigured { staff_id: Some(X) })
        );

        let unassigned = RescheduleRequest::new(Ulid(2), day(), TimeOfDay::hm(14, 0));
        assert_eq!(
            snap.plan_reschedule(&unassigned),
            Err(Decline::NotConfigured { staff_id: None })
        );
    }

    #[test]
    fn in_flight_guard_is_exclusive_until_dropped() {
        let set = DashMap::new();
        let id = Ulid(1);
        let guard = InFlightGuard::acquire(&set, id).unwrap();
        assert!(InFlightGuard::acquire(&set, id).is_none());
        assert!(InFlightGuard::acquire(&set, Ulid(2)).is_some());
        drop(guard);
        assert!(InFlightGuard::acquire(&set, id).is_some());
    }
}
