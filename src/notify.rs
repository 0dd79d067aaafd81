use chrono::NaiveDateTime;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::model::{MeetingId, StaffId};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BoardEvent {
    MeetingMoved {
        meeting_id: MeetingId,
        from: NaiveDateTime,
        to: NaiveDateTime,
        from_staff: Option<StaffId>,
        to_staff: Option<StaffId>,
    },
    Refreshed {
        meetings: usize,
    },
}

/// Broadcast hub for board changes, per staff member plus one board-wide feed.
pub struct NotifyHub {
    channels: DashMap<StaffId, broadcast::Sender<BoardEvent>>,
    board: broadcast::Sender<BoardEvent>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
            board: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    /// Subscribe to events touching one staff member's column.
    pub fn subscribe(&self, staff_id: StaffId) -> broadcast::Receiver<BoardEvent> {
        let sender = self
            .channels
            .entry(staff_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Subscribe to every event on the board.
    pub fn subscribe_board(&self) -> broadcast::Receiver<BoardEvent> {
        self.board.subscribe()
    }

    /// Send to one staff member's listeners. No-op if nobody is listening.
    pub fn send(&self, staff_id: StaffId, event: &BoardEvent) {
        if let Some(sender) = self.channels.get(&staff_id) {
            let _ = sender.send(event.clone());
        }
    }

    pub fn send_board(&self, event: &BoardEvent) {
        let _ = self.board.send(event.clone());
    }

    /// Fan a move out to the board feed and to both affected columns once each.
    pub fn meeting_moved(&self, event: &BoardEvent) {
        self.send_board(event);
        if let BoardEvent::MeetingMoved { from_staff, to_staff, .. } = event {
            if let Some(staff) = from_staff {
                self.send(*staff, event);
            }
            if let Some(staff) = to_staff
                && *to_staff != *from_staff
            {
                self.send(*staff, event);
            }
        }
    }

    pub fn remove(&self, staff_id: &StaffId) {
        self.channels.remove(staff_id);
    }
}
