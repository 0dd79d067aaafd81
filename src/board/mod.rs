//! The scheduling board: one view over the collaborators, resolved into an
//! immutable [`Snapshot`] that every grid computation reads from.

mod availability;
mod columns;
mod conflict;
mod error;
mod occupancy;
mod reschedule;
mod snapshot;
mod time_grid;

pub use conflict::{claimed_times, conflicts_from};
pub use error::ScheduleError;
pub use occupancy::{visual_duration_slots, Cover, StaffGroup};
pub use reschedule::{Decline, PlannedMove, RescheduleOutcome, RescheduleRequest};
pub use snapshot::{Snapshot, View};
pub use time_grid::ticks;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

use crate::config::GridSettings;
use crate::model::*;
use crate::notify::{BoardEvent, NotifyHub};
use crate::source::*;

pub struct Board {
    snapshot: RwLock<Arc<Snapshot>>,
    view: RwLock<View>,
    settings: GridSettings,
    availability: Arc<dyn AvailabilitySource>,
    bookings: Arc<dyn BookingStore>,
    conflicts: Arc<dyn ConflictSource>,
    /// Meetings with a reschedule that has not settled yet.
    in_flight: DashMap<MeetingId, ()>,
    notify: Arc<NotifyHub>,
}

impl Board {
    /// A board over `view`, empty until the first [`Board::refresh`].
    pub fn new(
        view: View,
        settings: GridSettings,
        availability: Arc<dyn AvailabilitySource>,
        bookings: Arc<dyn BookingStore>,
        conflicts: Arc<dyn ConflictSource>,
        notify: Arc<NotifyHub>,
    ) -> Result<Self, ScheduleError> {
        view.validate()?;
        Ok(Self {
            snapshot: RwLock::new(Arc::new(Snapshot::empty(&view, settings))),
            view: RwLock::new(view),
            settings,
            availability,
            bookings,
            conflicts,
            in_flight: DashMap::new(),
            notify,
        })
    }

    /// A single-context board reading availability and meetings from one store.
    pub fn with_store<S>(view: View, settings: GridSettings, store: Arc<S>) -> Result<Self, ScheduleError>
    where
        S: AvailabilitySource + BookingStore + 'static,
    {
        Self::new(
            view,
            settings,
            store.clone(),
            store,
            Arc::new(NoConflicts),
            Arc::new(NotifyHub::new()),
        )
    }

    pub fn settings(&self) -> GridSettings {
        self.settings
    }

    pub fn notify(&self) -> &Arc<NotifyHub> {
        &self.notify
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.notify.subscribe_board()
    }

    /// The current snapshot. Holding it never blocks a refresh or a reschedule.
    pub async fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().await.clone()
    }

    pub async fn view(&self) -> View {
        self.view.read().await.clone()
    }

    /// Switch to another view and load it.
    pub async fn set_view(&self, view: View) -> Result<Arc<Snapshot>, ScheduleError> {
        view.validate()?;
        *self.view.write().await = view;
        self.refresh().await
    }

    /// Rebuild the snapshot from the collaborators. On failure the previous
    /// snapshot stays in place.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, ScheduleError> {
        let started = Instant::now();
        let view = self.view().await;

        let loaded = self.load(&view).await;
        metrics::histogram!(crate::observability::SNAPSHOT_REFRESH_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        let snapshot = match loaded {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                warn!("refresh of {:?} failed: {e}", view.range);
                metrics::counter!(crate::observability::SNAPSHOT_REFRESH_TOTAL, "status" => "error").increment(1);
                return Err(e.into());
            }
        };
        metrics::counter!(crate::observability::SNAPSHOT_REFRESH_TOTAL, "status" => "ok").increment(1);
        metrics::gauge!(crate::observability::SNAPSHOT_MEETINGS).set(snapshot.meetings().len() as f64);

        {
            let mut current = self.snapshot.write().await;
            // A view switched mid-load supersedes this result.
            if *self.view.read().await != view {
                debug!("view changed during refresh, dropping result");
                return Ok(current.clone());
            }
            *current = snapshot.clone();
        }

        debug!(
            "refreshed {} days: {} meetings, {} staff, {} conflicts",
            view.range.len(),
            snapshot.meetings().len(),
            snapshot.staff.len(),
            snapshot.conflicts().count()
        );
        self.notify.send_board(&BoardEvent::Refreshed {
            meetings: snapshot.meetings().len(),
        });
        Ok(snapshot)
    }

    async fn load(&self, view: &View) -> Result<Snapshot, SourceError> {
        let weekdays = view.range.weekdays();
        let (weekday, dated, staff, meetings) = futures::try_join!(
            self.availability.weekday_slots(&weekdays),
            self.availability.date_slots(view.range),
            self.availability.staff(),
            self.bookings.list_meetings(view.range, view.staff_filter.as_deref()),
        )?;

        let snapshot = Snapshot::new(
            view,
            self.settings,
            staff,
            availability_config(weekday, dated),
            meetings,
            Vec::new(),
        );

        // Roster and configuration are already narrowed to the staff filter.
        let mut staff_ids: BTreeSet<StaffId> = snapshot.staff.keys().copied().collect();
        staff_ids.extend(snapshot.all_configured_staff_for_day(view.selected_date));
        if staff_ids.is_empty() {
            return Ok(snapshot);
        }

        let staff_ids: Vec<StaffId> = staff_ids.into_iter().collect();
        let conflicts = self
            .conflicts
            .cross_context_conflicts(&staff_ids, view.selected_date)
            .await?;
        Ok(snapshot.with_conflicts(conflicts))
    }
}
