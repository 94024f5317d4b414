//! Registry of live game sessions.
//!
//! Lock order: the admission mutex may be taken before a session mutex,
//! never after. Map guards are never held while a session is locked; lookups
//! hand out a cloned `Arc` and release the shard first.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::game::GameSession;
use crate::util::id::{GameId, PlayerId};

pub type SharedSession = Arc<Mutex<GameSession>>;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("a player cannot start a game against themselves")]
    SamePlayer,
    #[error("player {0} is already in a game")]
    Busy(PlayerId),
}

#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<GameId, SharedSession>,
    admission: Mutex<()>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and stores a new session with `inviter` in seat 0.
    ///
    /// Refused if either player is seated in an unfinished game that both
    /// players are still in. An unfinished game someone has left does not
    /// hold either player; it is dropped once the new game is admitted.
    pub fn create(
        &self,
        inviter: PlayerId,
        accepter: PlayerId,
        block_win_if_two_ends: bool,
    ) -> Result<SharedSession, AdmissionError> {
        if inviter == accepter {
            return Err(AdmissionError::SamePlayer);
        }
        let _admit = self.admission.lock();
        let mut abandoned = Vec::new();
        for player in [inviter, accepter] {
            if let Some(existing) = self.active_session_of(player) {
                let s = existing.lock();
                if s.disconnected_player().is_none() {
                    return Err(AdmissionError::Busy(player));
                }
                abandoned.push(s.id());
            }
        }
        for old in abandoned {
            if self.sessions.remove(&old).is_some() {
                tracing::debug!(game_id = %old, "dropped abandoned game for new match");
            }
        }
        let id = GameId::new();
        let session = Arc::new(Mutex::new(GameSession::new(id, inviter, accepter, block_win_if_two_ends)));
        self.sessions.insert(id, session.clone());
        Ok(session)
    }

    pub fn get(&self, id: GameId) -> Option<SharedSession> {
        self.sessions.get(&id).map(|s| s.clone())
    }

    pub fn remove(&self, id: GameId) -> Option<SharedSession> {
        self.sessions.remove(&id).map(|(_, s)| s)
    }

    /// All sessions, detached from the map so callers may lock them freely.
    pub fn snapshot(&self) -> Vec<SharedSession> {
        self.sessions.iter().map(|e| e.value().clone()).collect()
    }

    /// The unfinished session `player` belongs to, if any.
    pub fn active_session_of(&self, player: PlayerId) -> Option<SharedSession> {
        self.snapshot().into_iter().find(|s| {
            let s = s.lock();
            !s.is_over() && s.has_player(player)
        })
    }

    /// Evicts sessions nobody is connected to and that have seen no activity
    /// for `max_idle`. Returns the evicted ids.
    pub fn prune_idle<F>(&self, max_idle: Duration, now: Instant, is_connected: F) -> Vec<GameId>
    where
        F: Fn(PlayerId) -> bool,
    {
        let expired: Vec<GameId> = self
            .snapshot()
            .into_iter()
            .filter_map(|s| {
                let s = s.lock();
                let abandoned = !s.players().into_iter().any(&is_connected);
                let idle = now.saturating_duration_since(s.last_activity()) >= max_idle;
                (abandoned && idle).then(|| s.id())
            })
            .collect();
        for id in &expired {
            self.sessions.remove(id);
        }
        expired
    }

    pub fn clear(&self) {
        self.sessions.clear();
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
