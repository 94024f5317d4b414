//! Live connections and the player each one speaks for.

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::protocol::ServerMessage;
use crate::util::id::{ConnectionId, PlayerId};

/// Sending half of a connection's outbound queue. The socket writer task
/// owns the receiving half.
pub type Outbound = mpsc::UnboundedSender<ServerMessage>;

#[derive(Debug)]
struct ConnectionHandle {
    conn: ConnectionId,
    tx: Outbound,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    by_player: DashMap<PlayerId, ConnectionHandle>,
    by_connection: DashMap<ConnectionId, PlayerId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `player` to `conn`. Fails if the player already has a live
    /// connection.
    pub fn register(&self, player: PlayerId, conn: ConnectionId, tx: Outbound) -> bool {
        use dashmap::mapref::entry::Entry;
        match self.by_player.entry(player) {
            Entry::Occupied(mut entry) => {
                if !entry.get().tx.is_closed() {
                    return false;
                }
                self.by_connection.remove(&entry.get().conn);
                entry.insert(ConnectionHandle { conn, tx });
            }
            Entry::Vacant(entry) => {
                entry.insert(ConnectionHandle { conn, tx });
            }
        }
        self.by_connection.insert(conn, player);
        true
    }

    /// Drops `conn` and returns the player it was bound to. The player entry
    /// is only removed if it still points at this connection.
    pub fn unregister(&self, conn: ConnectionId) -> Option<PlayerId> {
        let (_, player) = self.by_connection.remove(&conn)?;
        self.by_player.remove_if(&player, |_, handle| handle.conn == conn);
        Some(player)
    }

    pub fn player_for(&self, conn: ConnectionId) -> Option<PlayerId> {
        self.by_connection.get(&conn).map(|p| *p)
    }

    pub fn is_connected(&self, player: PlayerId) -> bool {
        self.by_player
            .get(&player)
            .map(|h| !h.tx.is_closed())
            .unwrap_or(false)
    }

    /// Queues `msg` for `player`. Returns false if nobody is listening;
    /// nothing is retried.
    pub fn send(&self, player: PlayerId, msg: ServerMessage) -> bool {
        match self.by_player.get(&player) {
            Some(handle) => handle.tx.send(msg).is_ok(),
            None => false,
        }
    }

    pub fn broadcast(&self, msg: &ServerMessage) {
        for handle in self.by_player.iter() {
            let _ = handle.tx.send(msg.clone());
        }
    }

    /// Registered players in connection order.
    pub fn players(&self) -> Vec<PlayerId> {
        let mut entries: Vec<(ConnectionId, PlayerId)> = self
            .by_player
            .iter()
            .map(|e| (e.value().conn, *e.key()))
            .collect();
        entries.sort_by_key(|(conn, _)| *conn);
        entries.into_iter().map(|(_, player)| player).collect()
    }

    pub fn len(&self) -> usize {
        self.by_player.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_player.is_empty()
    }
}
