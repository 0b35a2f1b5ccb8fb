use std::collections::{HashMap, VecDeque};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Members per room. A session has exactly two endpoints.
pub const ROOM_CAPACITY: usize = 2;

/// Frames held for a member that has not joined yet.
pub const ROOM_BACKLOG_LIMIT: usize = 128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("room {room} already has {capacity} members")]
    Full { room: String, capacity: usize },
}

#[derive(Debug)]
struct Room<T> {
    members: HashMap<Uuid, mpsc::Sender<T>>,
    /// Frames sent while the sender was alone, replayed to the next member.
    backlog: VecDeque<T>,
}

impl<T> Room<T> {
    fn new() -> Self {
        Self {
            members: HashMap::new(),
            backlog: VecDeque::new(),
        }
    }
}

/// Live rooms keyed by name, each holding its members' outboxes.
#[derive(Debug)]
pub struct RoomTable<T> {
    rooms: HashMap<String, Room<T>>,
    capacity: usize,
}

impl<T> Default for RoomTable<T> {
    fn default() -> Self {
        Self::with_capacity(ROOM_CAPACITY)
    }
}

impl<T> RoomTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rooms: HashMap::new(),
            capacity,
        }
    }

    /// Add a member. Frames its peer sent while alone are delivered to the
    /// new outbox first.
    pub fn join(&mut self, room: &str, outbox: mpsc::Sender<T>) -> Result<Uuid, RoomError> {
        let entry = self.rooms.entry(room.to_string()).or_insert_with(Room::new);
        if entry.members.len() >= self.capacity {
            return Err(RoomError::Full {
                room: room.to_string(),
                capacity: self.capacity,
            });
        }

        let replayed = entry.backlog.len();
        for frame in entry.backlog.drain(..) {
            if outbox.try_send(frame).is_err() {
                warn!(room, "outbox rejected backlog frame");
            }
        }

        let member = Uuid::new_v4();
        entry.members.insert(member, outbox);
        info!(room, %member, members = entry.members.len(), replayed, "member joined");
        Ok(member)
    }

    /// Remove a member; empty rooms are dropped. Returns whether it was present.
    pub fn leave(&mut self, room: &str, member: Uuid) -> bool {
        let Some(entry) = self.rooms.get_mut(room) else {
            return false;
        };
        let removed = entry.members.remove(&member).is_some();
        if removed {
            info!(room, %member, members = entry.members.len(), "member left");
        }
        if entry.members.is_empty() {
            self.rooms.remove(room);
            debug!(room, "room closed");
        }
        removed
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn member_count(&self) -> usize {
        self.rooms.values().map(|room| room.members.len()).sum()
    }
}

impl<T: Clone> RoomTable<T> {
    /// Send `frame` to every other member of `room`, or hold it for the next
    /// member when `from` is alone. Returns the number of outboxes that took it.
    pub fn forward(&mut self, room: &str, from: Uuid, frame: T) -> usize {
        let Some(entry) = self.rooms.get_mut(room) else {
            return 0;
        };

        let mut delivered = 0;
        let mut peers = 0;
        for (id, outbox) in &entry.members {
            if *id == from {
                continue;
            }
            peers += 1;
            match outbox.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => warn!(room, %from, "peer outbox full or closed, dropping frame"),
            }
        }

        if peers == 0 {
            if entry.backlog.len() >= ROOM_BACKLOG_LIMIT {
                warn!(room, %from, "backlog full, dropping frame");
            } else {
                entry.backlog.push_back(frame);
                debug!(room, %from, held = entry.backlog.len(), "no peer yet, holding frame");
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outbox() -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
        mpsc::channel(8)
    }

    #[test]
    fn test_third_member_rejected() {
        let mut table = RoomTable::new();
        let (a, _a_rx) = outbox();
        let (b, _b_rx) = outbox();
        let (c, _c_rx) = outbox();

        table.join("room", a).unwrap();
        table.join("room", b).unwrap();
        let err = table.join("room", c).unwrap_err();
        assert_eq!(
            err,
            RoomError::Full {
                room: "room".into(),
                capacity: ROOM_CAPACITY
            }
        );
        assert_eq!(table.member_count(), 2);
    }

    #[test]
    fn test_rooms_are_independent() {
        let mut table = RoomTable::new();
        let (a, _a_rx) = outbox();
        let (b, _b_rx) = outbox();
        let (c, mut c_rx) = outbox();

        let first = table.join("one", a).unwrap();
        table.join("one", b).unwrap();
        table.join("two", c).unwrap();
        assert_eq!(table.room_count(), 2);
        assert_eq!(table.member_count(), 3);

        assert_eq!(table.forward("one", first, "hi".to_string()), 1);
        assert!(c_rx.try_recv().is_err());
    }

    #[test]
    fn test_forward_skips_sender() {
        let mut table = RoomTable::new();
        let (a, mut a_rx) = outbox();
        let (b, mut b_rx) = outbox();
        let first = table.join("room", a).unwrap();
        table.join("room", b).unwrap();

        assert_eq!(table.forward("room", first, "hello".to_string()), 1);
        assert_eq!(b_rx.try_recv().unwrap(), "hello");
        assert!(a_rx.try_recv().is_err());
    }

    #[test]
    fn test_frames_sent_alone_reach_next_member_in_order() {
        let mut table = RoomTable::new();
        let (a, _a_rx) = outbox();
        let (b, mut b_rx) = outbox();
        let first = table.join("room", a).unwrap();

        assert_eq!(table.forward("room", first, "offer".to_string()), 0);
        assert_eq!(table.forward("room", first, "candidate".to_string()), 0);
        table.join("room", b).unwrap();

        assert_eq!(b_rx.try_recv().unwrap(), "offer");
        assert_eq!(b_rx.try_recv().unwrap(), "candidate");
        assert!(b_rx.try_recv().is_err());
    }

    #[test]
    fn test_forward_to_unknown_room_is_noop() {
        let mut table: RoomTable<String> = RoomTable::new();
        assert_eq!(table.forward("missing", Uuid::new_v4(), "x".to_string()), 0);
        assert_eq!(table.room_count(), 0);
    }

    #[test]
    fn test_leave_frees_slot_and_drops_empty_room() {
        let mut table = RoomTable::new();
        let (a, _a_rx) = outbox();
        let (b, _b_rx) = outbox();
        let (c, _c_rx) = outbox();
        let first = table.join("room", a).unwrap();
        let second = table.join("room", b).unwrap();

        assert!(table.leave("room", first));
        assert!(!table.leave("room", first));
        table.join("room", c).unwrap();

        assert!(table.leave("room", second));
        assert_eq!(table.room_count(), 1);
    }

    #[test]
    fn test_last_leave_discards_backlog() {
        let mut table = RoomTable::new();
        let (a, _a_rx) = outbox();
        let (b, mut b_rx) = outbox();
        let member = table.join("room", a).unwrap();
        table.forward("room", member, "stale".to_string());
        table.leave("room", member);
        assert_eq!(table.room_count(), 0);

        table.join("room", b).unwrap();
        assert!(b_rx.try_recv().is_err());
    }
}
