use duel_core::{ConnectionId, RoomCode};

use crate::protocol::ServerEvent;

/// Outbound side of the transport. Sends never block; a message that cannot
/// be queued is dropped.
pub trait Gateway: Send + Sync {
    /// Send to one connection. Returns false if it was not delivered.
    fn send_to(&self, conn: &ConnectionId, event: &ServerEvent) -> bool;

    /// Send to every connection in the room's group. Returns the number of
    /// recipients.
    fn broadcast_to_room(&self, code: &RoomCode, event: &ServerEvent) -> usize;

    fn join_group(&self, conn: &ConnectionId, code: &RoomCode);

    fn leave_group(&self, conn: &ConnectionId, code: &RoomCode);

    fn leave_all_groups(&self, conn: &ConnectionId);
}
