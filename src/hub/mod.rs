//! Shared server state: live sessions, live connections, and the
//! connection lifecycle that ties them together.

pub mod presence;
pub mod registry;
pub mod router;
pub mod store;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::game::GameSession;
use crate::protocol::ServerMessage;
use crate::util::id::{ConnectionId, GameId, PlayerId};

pub use registry::{ConnectionRegistry, Outbound};
pub use store::{AdmissionError, SessionStore, SharedSession};

#[derive(Default)]
pub struct Hub {
    pub sessions: SessionStore,
    pub registry: ConnectionRegistry,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a new socket to a player id and announces it.
    ///
    /// A presented id is reused when it belongs to a player of an unfinished
    /// game who has no live connection; that player is put back into the game
    /// with a full snapshot. Otherwise a fresh id is minted.
    pub fn connect(&self, conn: ConnectionId, presented: Option<PlayerId>, tx: Outbound) -> PlayerId {
        let resumable = presented
            .filter(|id| !self.registry.is_connected(*id))
            .and_then(|id| self.sessions.active_session_of(id).map(|s| (id, s)));

        let (player, session) = match resumable {
            Some((id, session)) if self.registry.register(id, conn, tx.clone()) => (id, Some(session)),
            _ => {
                let id = PlayerId::new();
                self.registry.register(id, conn, tx);
                (id, None)
            }
        };
        info!(%player, %conn, resumed = session.is_some(), "client connected");
        self.registry.send(player, ServerMessage::YourId { id: player });

        if let Some(session) = session {
            let mut s = session.lock();
            self.rejoin(&mut s, player);
        }
        self.broadcast_presence();
        player
    }

    /// Forgets a socket. If its player was mid-game the opponent is told.
    pub fn disconnect(&self, conn: ConnectionId) {
        let Some(player) = self.registry.unregister(conn) else {
            debug!(%conn, "stale connection closed");
            return;
        };
        info!(%player, %conn, remaining = self.registry.len(), "client disconnected");

        if let Some(session) = self.sessions.active_session_of(player) {
            let mut s = session.lock();
            if let Ok(opponent) = s.mark_disconnected(player) {
                let game_id = s.id();
                if !self.registry.send(opponent, ServerMessage::OpponentDisconnected { game_id }) {
                    debug!(%game_id, %opponent, "opponent unreachable for disconnect notice");
                }
            }
        }
        self.broadcast_presence();
    }

    /// Tells the opponent `player` is back and sends `player` a resume
    /// snapshot. The caller holds the session lock.
    fn rejoin(&self, s: &mut GameSession, player: PlayerId) {
        let game_id = s.id();
        match s.mark_reconnected(player) {
            Ok((opponent, _)) => {
                self.registry.send(opponent, ServerMessage::OpponentReconnected { game_id });
                if let Some(snapshot) = game_start_for(s, player, true) {
                    self.registry.send(player, snapshot);
                }
                info!(%game_id, %player, "player rejoined game");
            }
            Err(err) => debug!(%game_id, %player, %err, "rejoin rejected"),
        }
    }

    /// Drops sessions with no connected player that have been idle for
    /// `max_idle`.
    pub fn evict_idle(&self, max_idle: Duration) -> Vec<GameId> {
        let evicted = self
            .sessions
            .prune_idle(max_idle, Instant::now(), |p| self.registry.is_connected(p));
        if !evicted.is_empty() {
            info!(count = evicted.len(), "evicted idle sessions");
        }
        evicted
    }

    /// Runs `evict_idle` every `every` until the handle is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration, max_idle: Duration) -> JoinHandle<()> {
        let hub = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                hub.evict_idle(max_idle);
            }
        })
    }

    pub fn shutdown(&self) {
        info!(sessions = self.sessions.len(), "clearing session store");
        self.sessions.clear();
    }
}

/// `game_start` addressed to `player`; with `snapshot` the current board is
/// attached so a returning client can resume.
pub(crate) fn game_start_for(s: &GameSession, player: PlayerId, snapshot: bool) -> Option<ServerMessage> {
    let seat = s.seat_of(player)?;
    Some(ServerMessage::GameStart {
        game_id: s.id(),
        opponent_id: s.player_at(seat.other()),
        block_win_if_two_ends: s.block_win_if_two_ends(),
        is_my_turn: s.is_turn_of(player),
        player_index: seat.index(),
        board: snapshot.then(|| s.board().clone()),
    })
}
