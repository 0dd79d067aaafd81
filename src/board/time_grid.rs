use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use crate::model::*;

use super::Snapshot;

/// `ceil(minutes / 60)`, capped at the end of the day.
fn end_hour(end_minutes: u32) -> u32 {
    end_minutes.div_ceil(60).min(24)
}

/// Minutes `[from, to)` of `day` that `meeting` occupies, clamped to the day.
fn minutes_on(meeting: &Meeting, day: NaiveDate) -> Option<(u32, u32)> {
    let day_start = midnight(day);
    let span = meeting.span();
    let from = span.start.max(day_start);
    let to = span.end.min(day_start + TimeDelta::days(1));
    if from >= to {
        return None;
    }
    let minutes = |t: NaiveDateTime| u32::try_from((t - day_start).num_minutes()).unwrap_or(0);
    Some((minutes(from), minutes(to)))
}

/// Every grid tick in `[min_hour, max_hour)`.
pub fn ticks(min_hour: u32, max_hour: u32) -> Vec<TimeOfDay> {
    (min_hour * 60..max_hour.min(24) * 60)
        .step_by(GRID_STEP_MINUTES as usize)
        .filter_map(TimeOfDay::from_minutes)
        .collect()
}

impl Snapshot {
    /// Hour bounds `[min, max)` of the visible axis.
    ///
    /// Starts from the inverted default window (min = default end, max = default
    /// start) so that any meeting or configured entry narrows it; only when
    /// nothing is in view does the default window itself apply. A meeting
    /// running over midnight counts on each viewed day it touches.
    pub fn hour_bounds(&self) -> (u32, u32) {
        let defaults = (self.settings.default_start_hour, self.settings.default_end_hour);
        let (mut min_hour, mut max_hour) = (defaults.1, defaults.0);

        for day in self.range.days() {
            for meeting in self.overlapping(&Span::day(day)) {
                let Some((from, to)) = minutes_on(meeting, day) else { continue };
                min_hour = min_hour.min(from / 60);
                max_hour = max_hour.max(end_hour(to));
            }

            let Some(slots) = self.availability.slots_for(day) else { continue };
            for (time, staff) in slots {
                if staff.is_empty() {
                    continue;
                }
                min_hour = min_hour.min(time.hour());
                max_hour = max_hour.max(end_hour(time.minutes().saturating_add(CONFIGURED_SLOT_MINUTES)));
            }
        }

        if min_hour >= max_hour {
            return defaults;
        }
        (min_hour, max_hour)
    }

    /// The visible time axis at grid-step resolution.
    pub fn time_axis(&self) -> Vec<TimeOfDay> {
        let (min_hour, max_hour) = self.hour_bounds();
        ticks(min_hour, max_hour)
    }
}
