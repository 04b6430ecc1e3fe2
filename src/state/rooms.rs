//! Per-activity broadcast rooms and presence tracking.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::ws::ServerMessage;

/// Who is connected, as shown in the room roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Presence {
    pub identity: String,
    pub name: String,
}

/// One activity room: a broadcast channel plus the connections inside it.
struct Room {
    sender: broadcast::Sender<ServerMessage>,
    members: DashMap<Uuid, Presence>,
}

impl Room {
    fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self {
            sender,
            members: DashMap::new(),
        }
    }
}

/// Registry of lazily-created rooms keyed by activity code.
///
/// Delivery is fire-and-forget: events to a room without subscribers are
/// dropped, and slow subscribers may observe lagged receives.
pub struct RoomHub {
    rooms: DashMap<u32, Arc<Room>>,
    capacity: usize,
}

impl RoomHub {
    /// Build the hub with the per-room broadcast channel capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            capacity,
        }
    }

    fn room(&self, code: u32) -> Arc<Room> {
        self.rooms
            .entry(code)
            .or_insert_with(|| Arc::new(Room::new(self.capacity)))
            .clone()
    }

    /// Register a new subscriber that will receive subsequent room events.
    pub fn subscribe(&self, code: u32) -> broadcast::Receiver<ServerMessage> {
        self.room(code).sender.subscribe()
    }

    /// Send an event to every subscriber of the room, ignoring delivery errors.
    pub fn broadcast(&self, code: u32, event: ServerMessage) {
        if let Some(room) = self.rooms.get(&code) {
            let _ = room.sender.send(event);
        }
    }

    /// Add a connection to the room and return the refreshed roster.
    pub fn join(&self, code: u32, connection: Uuid, presence: Presence) -> Vec<Presence> {
        let room = self.room(code);
        room.members.insert(connection, presence);
        self.roster(code)
    }

    /// Remove a connection and return its presence, if it was registered.
    pub fn leave(&self, code: u32, connection: Uuid) -> Option<Presence> {
        let room = self.rooms.get(&code)?;
        let (_, presence) = room.members.remove(&connection)?;
        Some(presence)
    }

    /// Update the display name attached to a connection.
    pub fn rename(&self, code: u32, connection: Uuid, name: &str) {
        if let Some(room) = self.rooms.get(&code) {
            if let Some(mut member) = room.members.get_mut(&connection) {
                member.name = name.to_owned();
            }
        }
    }

    /// Current roster, deduplicated on (identity, name) pairs.
    ///
    /// The same participant connected twice, for example from two tabs,
    /// shows up once.
    pub fn roster(&self, code: u32) -> Vec<Presence> {
        let Some(room) = self.rooms.get(&code) else {
            return Vec::new();
        };

        let mut roster: Vec<Presence> = Vec::new();
        for member in room.members.iter() {
            if !roster.contains(member.value()) {
                roster.push(member.value().clone());
            }
        }
        roster
    }
}
