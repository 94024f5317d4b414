//! Player-list projection pushed to every connection.

use crate::protocol::{PlayerSummary, ServerMessage};
use crate::util::id::{GameId, PlayerId};

use super::Hub;

struct ActiveGame {
    id: GameId,
    players: [PlayerId; 2],
    disconnected: Option<PlayerId>,
}

impl Hub {
    /// One row per registered connection, annotated with the unfinished game
    /// the player is in.
    pub fn player_list(&self) -> Vec<PlayerSummary> {
        let games: Vec<ActiveGame> = self
            .sessions
            .snapshot()
            .into_iter()
            .filter_map(|s| {
                let s = s.lock();
                (!s.is_over()).then(|| ActiveGame {
                    id: s.id(),
                    players: s.players(),
                    disconnected: s.disconnected_player(),
                })
            })
            .collect();

        self.registry
            .players()
            .into_iter()
            .map(|id| match games.iter().find(|g| g.players.contains(&id)) {
                Some(game) => PlayerSummary {
                    id,
                    game_id: Some(game.id),
                    opponent_id: game.players.iter().copied().find(|p| *p != id),
                    disconnected: Some(game.disconnected == Some(id)),
                },
                None => PlayerSummary { id, game_id: None, opponent_id: None, disconnected: None },
            })
            .collect()
    }

    pub fn broadcast_presence(&self) {
        let players = self.player_list();
        tracing::trace!(count = players.len(), "broadcasting player list");
        self.registry.broadcast(&ServerMessage::PlayerList { players });
    }
}
