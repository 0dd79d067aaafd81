use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::board::Board;

/// Background task that periodically rebuilds the board's snapshot. A failed
/// refresh keeps the previous snapshot and is retried on the next tick.
pub async fn run_refresher(board: Arc<Board>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        match board.refresh().await {
            Ok(snapshot) => debug!("snapshot refreshed: {} meetings", snapshot.meetings().len()),
            Err(e) => warn!("snapshot refresh failed, keeping previous: {e}"),
        }
    }
}

/// Spawn [`run_refresher`] on the current runtime.
pub fn spawn_refresher(board: Arc<Board>, period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run_refresher(board, period))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::View;
    use crate::config::GridSettings;
    use crate::model::*;
    use crate::notify::BoardEvent;
    use crate::store::InMemoryStore;
    use chrono::NaiveDate;
    use ulid::Ulid;

    #[tokio::test]
    async fn refresher_picks_up_new_meetings() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let store = Arc::new(InMemoryStore::new());
        let board = Arc::new(Board::with_store(View::day(day), GridSettings::default(), store.clone()).unwrap());
        let mut events = board.subscribe();

        let handle = spawn_refresher(board.clone(), Duration::from_millis(10));
        // First tick fires immediately.
        assert_eq!(events.recv().await.unwrap(), BoardEvent::Refreshed { meetings: 0 });

        store
            .book_meeting(Meeting::new(Ulid::new(), TimeOfDay::hm(10, 0).on(day), 30, Some(Ulid(1))))
            .unwrap();
        let seen = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(BoardEvent::Refreshed { meetings: 1 }) = events.recv().await {
                    break;
                }
            }
        })
        .await;
        assert!(seen.is_ok(), "refresher never saw the new meeting");
        assert_eq!(board.snapshot().await.meetings().len(), 1);
        handle.abort();
    }
}
