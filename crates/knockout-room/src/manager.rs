//! Room manager: creates rooms by name and tracks who is where.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use knockout_protocol::{ClientId, ClientMessage};

use crate::room::spawn_room;
use crate::{PlayerSender, RoomConfig, RoomError, RoomHandle, RoomId, RoomSnapshot};

/// Counter for generating unique room IDs.
static NEXT_ROOM_ID: AtomicU64 = AtomicU64::new(1);

/// Default command channel size for room actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Manages all active rooms and tracks which client is in which room.
///
/// Rooms are addressed by name; the first client to ask for a name creates
/// the room. A client is in at most one room at a time.
pub struct RoomManager {
    config: RoomConfig,
    rooms: HashMap<RoomId, RoomHandle>,
    names: HashMap<String, RoomId>,
    player_rooms: HashMap<ClientId, RoomId>,
}

impl RoomManager {
    /// Creates an empty manager. Every room it creates uses `config`.
    pub fn new(config: RoomConfig) -> Self {
        Self {
            config: config.validated(),
            rooms: HashMap::new(),
            names: HashMap::new(),
            player_rooms: HashMap::new(),
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Returns the room called `name`, creating it if needed.
    pub fn get_or_create(&mut self, name: &str) -> RoomHandle {
        if let Some(handle) = self.names.get(name).and_then(|id| self.rooms.get(id)) {
            return handle.clone();
        }
        let room_id = RoomId(NEXT_ROOM_ID.fetch_add(1, Ordering::Relaxed));
        let handle = spawn_room(
            room_id,
            name.to_string(),
            self.config.clone(),
            DEFAULT_CHANNEL_SIZE,
        );
        self.rooms.insert(room_id, handle.clone());
        self.names.insert(name.to_string(), room_id);
        tracing::info!(%room_id, name, "room created");
        handle
    }

    /// Puts `client_id` into the room called `name` (creating it on first
    /// use) and returns the room's handle.
    pub async fn join_or_create(
        &mut self,
        client_id: ClientId,
        client_name: &str,
        room: &str,
        sender: PlayerSender,
    ) -> Result<RoomHandle, RoomError> {
        if let Some(current) = self.player_rooms.get(&client_id) {
            return Err(RoomError::AlreadyInRoom(client_id, *current));
        }

        let handle = self.get_or_create(room);
        handle.join(client_id, client_name, sender).await?;
        self.player_rooms.insert(client_id, handle.room_id());
        Ok(handle)
    }

    /// Removes a client from whatever room they are in.
    pub async fn leave(&mut self, client_id: ClientId) -> Result<(), RoomError> {
        let room_id = self
            .player_rooms
            .remove(&client_id)
            .ok_or(RoomError::NotInRoom(client_id))?;
        let handle = self.rooms.get(&room_id).ok_or(RoomError::NotFound(room_id))?;
        handle.leave(client_id).await
    }

    /// Routes a message from a client to their current room.
    pub async fn route(&self, client_id: ClientId, msg: ClientMessage) -> Result<(), RoomError> {
        let room_id = self
            .player_rooms
            .get(&client_id)
            .ok_or(RoomError::NotInRoom(client_id))?;
        let handle = self.rooms.get(room_id).ok_or(RoomError::NotFound(*room_id))?;
        handle.send_message(client_id, msg).await
    }

    pub async fn snapshot(&self, room_id: RoomId) -> Result<RoomSnapshot, RoomError> {
        let handle = self.rooms.get(&room_id).ok_or(RoomError::NotFound(room_id))?;
        handle.snapshot().await
    }

    /// Shuts a room down and forgets everyone who was in it.
    pub async fn destroy_room(&mut self, room_id: RoomId) -> Result<(), RoomError> {
        let handle = self.rooms.remove(&room_id).ok_or(RoomError::NotFound(room_id))?;
        let _ = handle.shutdown().await;
        self.names.retain(|_, id| *id != room_id);
        self.player_rooms.retain(|_, id| *id != room_id);
        tracing::info!(%room_id, "room destroyed");
        Ok(())
    }

    pub fn room_by_name(&self, name: &str) -> Option<RoomId> {
        self.names.get(name).copied()
    }

    pub fn player_room(&self, client_id: ClientId) -> Option<RoomId> {
        self.player_rooms.get(&client_id).copied()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}
