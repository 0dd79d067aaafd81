use chrono::{NaiveDate, TimeDelta};

use crate::model::*;

/// Grid ticks on `date` that fall inside the meeting's span.
pub fn claimed_times(meeting: &Meeting, date: NaiveDate) -> Vec<TimeOfDay> {
    let span = meeting.span();
    let day = Span::day(date);
    if !span.overlaps(&day) {
        return Vec::new();
    }

    let step = TimeDelta::minutes(GRID_STEP_MINUTES as i64);
    // First tick at or after the meeting start, clamped to the day.
    let mut tick = if span.start <= day.start {
        day.start
    } else {
        let offset = TimeOfDay::of(&span.start).minutes();
        let aligned = offset.div_ceil(GRID_STEP_MINUTES) * GRID_STEP_MINUTES;
        day.start + TimeDelta::minutes(aligned as i64)
    };

    let mut times = Vec::new();
    while tick < span.end && tick < day.end {
        times.push(TimeOfDay::of(&tick));
        tick += step;
    }
    times
}

/// Conflict records for `staff_id` from meetings held under another context.
pub fn conflicts_from<'a>(
    staff_id: StaffId,
    meetings: impl IntoIterator<Item = &'a Meeting>,
    date: NaiveDate,
) -> Vec<ConflictRecord> {
    let mut records: Vec<ConflictRecord> = meetings
        .into_iter()
        .filter(|m| m.status.occupies())
        .flat_map(|m| claimed_times(m, date))
        .map(|time| ConflictRecord { staff_id, time })
        .collect();
    records.sort();
    records.dedup();
    records
}
