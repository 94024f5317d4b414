//! Inbound message dispatch and the per-kind handlers.
//!
//! Each handler locks at most one session and keeps it locked until every
//! outbound message for that step is queued. Invalid transitions are logged
//! at debug level and otherwise ignored.

use tracing::{debug, info, warn};

use crate::game::{GameOutcome, MoveOutcome, SessionError};
use crate::protocol::{ClientMessage, ServerMessage, WinnerView};
use crate::util::id::{GameId, PlayerId};

use super::{game_start_for, Hub, SharedSession};

fn rejected(sender: PlayerId, game_id: GameId, action: &str, err: SessionError) {
    debug!(%sender, %game_id, action, %err, "rejected");
}

impl Hub {
    pub fn handle(&self, sender: PlayerId, msg: ClientMessage) {
        debug!(%sender, kind = msg.kind(), "inbound message");
        match msg {
            ClientMessage::Invite { opponent_id, block_win_if_two_ends } => {
                self.on_invite(sender, opponent_id, block_win_if_two_ends)
            }
            ClientMessage::InviteAccepted { from, block_win_if_two_ends } => {
                self.on_invite_accepted(sender, from, block_win_if_two_ends)
            }
            ClientMessage::InviteDeclined { from } => self.on_invite_declined(sender, from),
            ClientMessage::MakeMove { game_id, index } => self.on_make_move(sender, game_id, index),
            ClientMessage::RequestUndo { game_id } => self.on_request_undo(sender, game_id),
            ClientMessage::UndoResponse { game_id, accepted } => self.on_undo_response(sender, game_id, accepted),
            ClientMessage::PlayAgainRequest { game_id } => self.on_play_again_request(sender, game_id),
            ClientMessage::PlayAgainResponse { game_id, accepted } => {
                self.on_play_again_response(sender, game_id, accepted)
            }
            ClientMessage::RequestYieldTurn { game_id } => self.on_request_yield_turn(sender, game_id),
            ClientMessage::YieldTurnResponse { game_id, accepted } => {
                self.on_yield_turn_response(sender, game_id, accepted)
            }
            ClientMessage::ReconnectToGame { game_id } => self.on_reconnect_to_game(sender, game_id),
            ClientMessage::PlayerLeavingGame { game_id } => self.on_player_leaving_game(sender, game_id),
            ClientMessage::ChatMessage { game_id, text } => {
                self.relay_to_opponent(sender, game_id, ServerMessage::ChatMessage { game_id, text })
            }
            ClientMessage::SendEmoji { game_id, emoji } => {
                self.relay_to_opponent(sender, game_id, ServerMessage::SendEmoji { game_id, emoji })
            }
            ClientMessage::Unknown => warn!(%sender, "ignoring unknown message type"),
        }
    }

    fn session(&self, sender: PlayerId, game_id: GameId) -> Option<SharedSession> {
        let found = self.sessions.get(game_id);
        if found.is_none() {
            debug!(%sender, %game_id, "no such game");
        }
        found
    }

    fn send_both(&self, players: [PlayerId; 2], msg: ServerMessage) {
        for player in players {
            self.registry.send(player, msg.clone());
        }
    }

    fn on_invite(&self, sender: PlayerId, opponent: PlayerId, block_win_if_two_ends: bool) {
        if opponent == sender {
            return;
        }
        let invite = ServerMessage::GameInvite { from: sender, block_win_if_two_ends };
        if self.registry.send(opponent, invite) {
            debug!(from = %sender, to = %opponent, "invite forwarded");
        } else {
            debug!(from = %sender, to = %opponent, "invitee unreachable");
        }
    }

    fn on_invite_accepted(&self, sender: PlayerId, inviter: PlayerId, block_win_if_two_ends: bool) {
        if !self.registry.is_connected(inviter) {
            debug!(%sender, %inviter, "inviter gone; not starting game");
            return;
        }
        let session = match self.sessions.create(inviter, sender, block_win_if_two_ends) {
            Ok(session) => session,
            Err(err) => {
                debug!(%sender, %inviter, %err, "game not created");
                return;
            }
        };
        {
            let s = session.lock();
            info!(game_id = %s.id(), %inviter, accepter = %sender, block_win_if_two_ends, "game started");
            for player in s.players() {
                if let Some(start) = game_start_for(&s, player, false) {
                    self.registry.send(player, start);
                }
            }
        }
        self.broadcast_presence();
    }

    fn on_invite_declined(&self, sender: PlayerId, inviter: PlayerId) {
        self.registry.send(inviter, ServerMessage::InviteDeclined { from: sender });
    }

    fn on_make_move(&self, sender: PlayerId, game_id: GameId, index: usize) {
        let Some(session) = self.session(sender, game_id) else { return };
        let finished = {
            let mut s = session.lock();
            let outcome = match s.apply_move(sender, index) {
                Ok(outcome) => outcome,
                Err(err) => return rejected(sender, game_id, "make_move", err),
            };
            let players = s.players();
            match outcome {
                MoveOutcome::Continue { next_turn } => {
                    let update = ServerMessage::MoveMade { game_id, board: s.board().clone(), next_turn, index };
                    self.send_both(players, update);
                    false
                }
                MoveOutcome::Finished(result) => {
                    info!(%game_id, ?result, "game over");
                    for player in players {
                        let winner = match result {
                            GameOutcome::Winner(w) if w == player => Some(WinnerView::Me),
                            GameOutcome::Winner(_) => Some(WinnerView::Opponent),
                            GameOutcome::Draw => None,
                        };
                        let over = ServerMessage::GameOver { game_id, board: s.board().clone(), winner };
                        self.registry.send(player, over);
                    }
                    true
                }
            }
        };
        if finished {
            self.broadcast_presence();
        }
    }

    fn on_request_undo(&self, sender: PlayerId, game_id: GameId) {
        let Some(session) = self.session(sender, game_id) else { return };
        let mut s = session.lock();
        let Some(opponent) = s.opponent_of(sender) else {
            return rejected(sender, game_id, "request_undo", SessionError::NotAPlayer);
        };
        if !self.registry.is_connected(opponent) {
            debug!(%game_id, %opponent, "opponent unreachable for undo");
            return;
        }
        match s.request_undo(sender) {
            Ok(opponent) => {
                self.registry.send(opponent, ServerMessage::UndoInvite { game_id, from: sender });
            }
            Err(err) => rejected(sender, game_id, "request_undo", err),
        }
    }

    fn on_undo_response(&self, sender: PlayerId, game_id: GameId, accepted: bool) {
        let Some(session) = self.session(sender, game_id) else { return };
        let mut s = session.lock();
        let requester = match s.respond_undo(sender, accepted) {
            Ok(requester) => requester,
            Err(err) => return rejected(sender, game_id, "undo_response", err),
        };
        if accepted {
            let undone = ServerMessage::MoveUndone { game_id, board: s.board().clone(), next_turn: s.turn() };
            self.send_both(s.players(), undone);
        } else {
            self.registry.send(requester, ServerMessage::UndoDeclined { game_id });
        }
    }

    fn on_request_yield_turn(&self, sender: PlayerId, game_id: GameId) {
        let Some(session) = self.session(sender, game_id) else { return };
        let mut s = session.lock();
        let Some(opponent) = s.opponent_of(sender) else {
            return rejected(sender, game_id, "request_yield_turn", SessionError::NotAPlayer);
        };
        if !self.registry.is_connected(opponent) {
            debug!(%game_id, %opponent, "opponent unreachable for yield");
            return;
        }
        match s.request_yield_turn(sender) {
            Ok(opponent) => {
                self.registry.send(opponent, ServerMessage::YieldTurnInvite { game_id, from: sender });
            }
            Err(err) => rejected(sender, game_id, "request_yield_turn", err),
        }
    }

    fn on_yield_turn_response(&self, sender: PlayerId, game_id: GameId, accepted: bool) {
        let Some(session) = self.session(sender, game_id) else { return };
        let mut s = session.lock();
        let requester = match s.respond_yield_turn(sender, accepted) {
            Ok(requester) => requester,
            Err(err) => return rejected(sender, game_id, "yield_turn_response", err),
        };
        if accepted {
            self.registry.send(requester, ServerMessage::TurnYielded { game_id, is_my_turn: false });
            self.registry.send(sender, ServerMessage::TurnYielded { game_id, is_my_turn: true });
        } else {
            self.registry.send(requester, ServerMessage::YieldTurnDeclined { game_id });
        }
    }

    fn on_play_again_request(&self, sender: PlayerId, game_id: GameId) {
        let Some(session) = self.session(sender, game_id) else { return };
        let mut s = session.lock();
        let Some(opponent) = s.opponent_of(sender) else {
            return rejected(sender, game_id, "play_again_request", SessionError::NotAPlayer);
        };
        if !s.is_over() {
            return rejected(sender, game_id, "play_again_request", SessionError::GameNotOver);
        }
        if !self.registry.is_connected(opponent) {
            self.registry.send(sender, ServerMessage::OpponentDisconnected { game_id });
            return;
        }
        match s.request_play_again(sender) {
            Ok(opponent) => {
                self.registry.send(opponent, ServerMessage::PlayAgainInvite { game_id, from: sender });
            }
            Err(err) => rejected(sender, game_id, "play_again_request", err),
        }
    }

    fn on_play_again_response(&self, sender: PlayerId, game_id: GameId, accepted: bool) {
        let Some(session) = self.session(sender, game_id) else { return };
        {
            let mut s = session.lock();
            let requester = match s.respond_play_again(sender, accepted) {
                Ok(requester) => requester,
                Err(err) => return rejected(sender, game_id, "play_again_response", err),
            };
            if accepted {
                info!(%game_id, first = %requester, "rematch started");
                for player in s.players() {
                    if let Some(seat) = s.seat_of(player) {
                        let reset = ServerMessage::GameReset {
                            game_id,
                            is_my_turn: s.is_turn_of(player),
                            player_index: seat.index(),
                        };
                        self.registry.send(player, reset);
                    }
                }
            } else {
                self.registry.send(requester, ServerMessage::PlayAgainDeclined { game_id });
            }
        }
        if !accepted {
            self.sessions.remove(game_id);
            info!(%game_id, "rematch declined; session closed");
        }
        self.broadcast_presence();
    }

    fn on_reconnect_to_game(&self, sender: PlayerId, game_id: GameId) {
        let Some(session) = self.session(sender, game_id) else { return };
        {
            let mut s = session.lock();
            self.rejoin(&mut s, sender);
        }
        self.broadcast_presence();
    }

    fn on_player_leaving_game(&self, sender: PlayerId, game_id: GameId) {
        let Some(session) = self.session(sender, game_id) else { return };
        {
            let mut s = session.lock();
            match s.mark_disconnected(sender) {
                Ok(opponent) => {
                    info!(%game_id, player = %sender, "player left game");
                    self.registry.send(opponent, ServerMessage::OpponentDisconnected { game_id });
                }
                Err(err) => return rejected(sender, game_id, "player_leaving_game", err),
            }
        }
        self.broadcast_presence();
    }

    /// Chat and emoji pass straight through to the other player.
    fn relay_to_opponent(&self, sender: PlayerId, game_id: GameId, msg: ServerMessage) {
        let Some(session) = self.session(sender, game_id) else { return };
        let s = session.lock();
        match s.opponent_of(sender) {
            Some(opponent) => {
                self.registry.send(opponent, msg);
            }
            None => rejected(sender, game_id, "relay", SessionError::NotAPlayer),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc::{self, UnboundedReceiver};

    use super::*;
    use crate::game::{Seat, BOARD_CELLS, BOARD_SIZE};
    use crate::util::id::ConnectionId;

    struct Client {
        id: PlayerId,
        conn: ConnectionId,
        rx: UnboundedReceiver<ServerMessage>,
    }

    impl Client {
        fn connect(hub: &Hub) -> Self {
            Self::connect_as(hub, None)
        }

        fn connect_as(hub: &Hub, presented: Option<PlayerId>) -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            let conn = ConnectionId::next();
            let id = hub.connect(conn, presented, tx);
            Self { id, conn, rx }
        }

        fn drain(&mut self) -> Vec<ServerMessage> {
            let mut out = Vec::new();
            while let Ok(msg) = self.rx.try_recv() {
                out.push(msg);
            }
            out
        }

        /// Queued messages minus presence updates.
        fn game_messages(&mut self) -> Vec<ServerMessage> {
            self.drain()
                .into_iter()
                .filter(|m| !matches!(m, ServerMessage::PlayerList { .. }))
                .collect()
        }
    }

    fn start_game(hub: &Hub, block_win_if_two_ends: bool) -> (Client, Client, GameId) {
        let mut a = Client::connect(hub);
        let mut b = Client::connect(hub);
        hub.handle(a.id, ClientMessage::Invite { opponent_id: b.id, block_win_if_two_ends });
        hub.handle(b.id, ClientMessage::InviteAccepted { from: a.id, block_win_if_two_ends });
        a.drain();
        b.drain();
        let game_id = hub.sessions.active_session_of(a.id).unwrap().lock().id();
        (a, b, game_id)
    }

    fn play(hub: &Hub, player: &Client, game_id: GameId, index: usize) {
        hub.handle(player.id, ClientMessage::MakeMove { game_id, index });
    }

    fn win_for_first(hub: &Hub, a: &mut Client, b: &mut Client, game_id: GameId) {
        for col in 0..4 {
            play(hub, a, game_id, col);
            play(hub, b, game_id, BOARD_SIZE + col);
        }
        play(hub, a, game_id, 4);
        a.drain();
        b.drain();
    }

    #[test]
    fn connect_sends_id_then_presence() {
        let hub = Hub::new();
        let mut a = Client::connect(&hub);
        let msgs = a.drain();
        assert_eq!(msgs[0], ServerMessage::YourId { id: a.id });
        match &msgs[1] {
            ServerMessage::PlayerList { players } => {
                assert_eq!(players.len(), 1);
                assert_eq!(players[0].id, a.id);
                assert_eq!(players[0].game_id, None);
            }
            other => panic!("expected player_list, got {:?}", other),
        }
    }

    #[test]
    fn invite_is_forwarded_and_decline_returns_to_inviter() {
        let hub = Hub::new();
        let mut a = Client::connect(&hub);
        let mut b = Client::connect(&hub);
        a.drain();
        b.drain();

        hub.handle(a.id, ClientMessage::Invite { opponent_id: b.id, block_win_if_two_ends: true });
        assert_eq!(b.game_messages(), vec![ServerMessage::GameInvite { from: a.id, block_win_if_two_ends: true }]);

        hub.handle(b.id, ClientMessage::InviteDeclined { from: a.id });
        assert_eq!(a.game_messages(), vec![ServerMessage::InviteDeclined { from: b.id }]);
        assert!(hub.sessions.is_empty());
    }

    #[test]
    fn acceptance_sends_each_player_their_own_view() {
        let hub = Hub::new();
        let mut a = Client::connect(&hub);
        let mut b = Client::connect(&hub);
        hub.handle(b.id, ClientMessage::InviteAccepted { from: a.id, block_win_if_two_ends: true });
        let game_id = hub.sessions.active_session_of(a.id).unwrap().lock().id();

        let start_a = ServerMessage::GameStart {
            game_id,
            opponent_id: b.id,
            block_win_if_two_ends: true,
            is_my_turn: true,
            player_index: 0,
            board: None,
        };
        let start_b = ServerMessage::GameStart {
            game_id,
            opponent_id: a.id,
            block_win_if_two_ends: true,
            is_my_turn: false,
            player_index: 1,
            board: None,
        };
        assert!(a.game_messages().contains(&start_a));
        assert!(b.game_messages().contains(&start_b));

        let rows = hub.player_list();
        let row_a = rows.iter().find(|r| r.id == a.id).unwrap();
        assert_eq!(row_a.game_id, Some(game_id));
        assert_eq!(row_a.opponent_id, Some(b.id));
        assert_eq!(row_a.disconnected, Some(false));
    }

    #[test]
    fn busy_player_cannot_start_a_second_game() {
        let hub = Hub::new();
        let (a, _b, _) = start_game(&hub, false);
        let c = Client::connect(&hub);
        hub.handle(a.id, ClientMessage::InviteAccepted { from: c.id, block_win_if_two_ends: false });
        assert_eq!(hub.sessions.len(), 1);
    }

    #[test]
    fn moves_are_broadcast_and_invalid_ones_are_silent() {
        let hub = Hub::new();
        let (mut a, mut b, game_id) = start_game(&hub, false);

        play(&hub, &b, game_id, 0);
        assert!(a.game_messages().is_empty());
        assert!(b.game_messages().is_empty());

        play(&hub, &a, game_id, 312);
        let b_id = b.id;
        for client in [&mut a, &mut b] {
            match client.game_messages().as_slice() {
                [ServerMessage::MoveMade { index, next_turn, board, .. }] => {
                    assert_eq!(*index, 312);
                    assert_eq!(*next_turn, b_id);
                    assert_eq!(board.get(312), Some(Seat::First));
                    assert_eq!(board.occupied(), 1);
                }
                other => panic!("expected move_made, got {:?}", other),
            }
        }

        play(&hub, &b, game_id, 312);
        play(&hub, &b, game_id, BOARD_CELLS + 3);
        hub.handle(b.id, ClientMessage::MakeMove { game_id: GameId::new(), index: 1 });
        assert!(a.game_messages().is_empty());
        assert!(b.game_messages().is_empty());
    }

    #[test]
    fn undo_round_trip_restores_the_cell_and_turn() {
        let hub = Hub::new();
        let (mut a, mut b, game_id) = start_game(&hub, false);
        play(&hub, &a, game_id, 312);
        a.drain();
        b.drain();

        hub.handle(b.id, ClientMessage::RequestUndo { game_id });
        assert!(a.game_messages().is_empty());

        hub.handle(a.id, ClientMessage::RequestUndo { game_id });
        assert_eq!(b.game_messages(), vec![ServerMessage::UndoInvite { game_id, from: a.id }]);

        hub.handle(b.id, ClientMessage::UndoResponse { game_id, accepted: true });
        let a_id = a.id;
        for client in [&mut a, &mut b] {
            match client.game_messages().as_slice() {
                [ServerMessage::MoveUndone { board, next_turn, .. }] => {
                    assert_eq!(board.occupied(), 0);
                    assert_eq!(*next_turn, a_id);
                }
                other => panic!("expected move_undone, got {:?}", other),
            }
        }
        let session = hub.sessions.get(game_id).unwrap();
        assert_eq!(session.lock().turn(), a.id);
        assert_eq!(session.lock().last_move(), None);
    }

    #[test]
    fn declined_undo_notifies_requester() {
        let hub = Hub::new();
        let (mut a, mut b, game_id) = start_game(&hub, false);
        play(&hub, &a, game_id, 40);
        hub.handle(a.id, ClientMessage::RequestUndo { game_id });
        b.drain();
        a.drain();

        hub.handle(b.id, ClientMessage::UndoResponse { game_id, accepted: false });
        assert_eq!(a.game_messages(), vec![ServerMessage::UndoDeclined { game_id }]);
        assert!(b.game_messages().is_empty());
        assert_eq!(hub.sessions.get(game_id).unwrap().lock().board().get(40), Some(Seat::First));
    }

    #[test]
    fn yield_turn_hands_the_opening_move_over() {
        let hub = Hub::new();
        let (mut a, mut b, game_id) = start_game(&hub, false);

        hub.handle(b.id, ClientMessage::RequestYieldTurn { game_id });
        assert!(a.game_messages().is_empty());

        hub.handle(a.id, ClientMessage::RequestYieldTurn { game_id });
        assert_eq!(b.game_messages(), vec![ServerMessage::YieldTurnInvite { game_id, from: a.id }]);

        hub.handle(b.id, ClientMessage::YieldTurnResponse { game_id, accepted: true });
        assert_eq!(a.game_messages(), vec![ServerMessage::TurnYielded { game_id, is_my_turn: false }]);
        assert_eq!(b.game_messages(), vec![ServerMessage::TurnYielded { game_id, is_my_turn: true }]);

        play(&hub, &b, game_id, 0);
        a.drain();
        b.drain();
        hub.handle(a.id, ClientMessage::RequestYieldTurn { game_id });
        assert!(b.game_messages().is_empty());
    }

    #[test]
    fn declined_yield_keeps_the_turn() {
        let hub = Hub::new();
        let (mut a, mut b, game_id) = start_game(&hub, false);
        hub.handle(a.id, ClientMessage::RequestYieldTurn { game_id });
        b.drain();
        hub.handle(b.id, ClientMessage::YieldTurnResponse { game_id, accepted: false });
        assert_eq!(a.game_messages(), vec![ServerMessage::YieldTurnDeclined { game_id }]);
        assert_eq!(hub.sessions.get(game_id).unwrap().lock().turn(), a.id);
    }

    #[test]
    fn winner_sees_me_and_loser_sees_opponent() {
        let hub = Hub::new();
        let (mut a, mut b, game_id) = start_game(&hub, false);
        for col in 0..4 {
            play(&hub, &a, game_id, col);
            play(&hub, &b, game_id, BOARD_SIZE + col);
        }
        a.drain();
        b.drain();
        play(&hub, &a, game_id, 4);

        let winner_of = |msgs: Vec<ServerMessage>| match msgs.as_slice() {
            [ServerMessage::GameOver { winner, .. }] => *winner,
            other => panic!("expected game_over, got {:?}", other),
        };
        assert_eq!(winner_of(a.game_messages()), Some(WinnerView::Me));
        assert_eq!(winner_of(b.game_messages()), Some(WinnerView::Opponent));

        play(&hub, &b, game_id, 200);
        assert!(a.game_messages().is_empty());
    }

    #[test]
    fn full_board_without_five_is_a_draw() {
        let hub = Hub::new();
        let (mut a, mut b, game_id) = start_game(&hub, false);
        let (mut first, mut second): (Vec<usize>, Vec<usize>) =
            (0..BOARD_CELLS).partition(|i| (i % BOARD_SIZE / 2 + i / BOARD_SIZE) % 2 == 0);
        assert_eq!(first.len(), second.len() + 1);

        while let Some(index) = first.pop() {
            play(&hub, &a, game_id, index);
            if let Some(index) = second.pop() {
                play(&hub, &b, game_id, index);
            }
        }

        let last = |msgs: Vec<ServerMessage>| msgs.last().cloned().unwrap();
        for client in [&mut a, &mut b] {
            match last(client.game_messages()) {
                ServerMessage::GameOver { winner, board, .. } => {
                    assert_eq!(winner, None);
                    assert!(board.is_full());
                }
                other => panic!("expected game_over, got {:?}", other),
            }
        }
    }

    #[test]
    fn accepted_rematch_resets_and_requester_moves_first() {
        let hub = Hub::new();
        let (mut a, mut b, game_id) = start_game(&hub, false);

        hub.handle(b.id, ClientMessage::PlayAgainRequest { game_id });
        assert!(a.game_messages().is_empty());

        win_for_first(&hub, &mut a, &mut b, game_id);
        hub.handle(b.id, ClientMessage::PlayAgainRequest { game_id });
        assert_eq!(a.game_messages(), vec![ServerMessage::PlayAgainInvite { game_id, from: b.id }]);

        hub.handle(a.id, ClientMessage::PlayAgainResponse { game_id, accepted: true });
        assert_eq!(a.game_messages(), vec![ServerMessage::GameReset { game_id, is_my_turn: false, player_index: 0 }]);
        assert_eq!(b.game_messages(), vec![ServerMessage::GameReset { game_id, is_my_turn: true, player_index: 1 }]);

        let session = hub.sessions.get(game_id).unwrap();
        let s = session.lock();
        assert_eq!(s.board().occupied(), 0);
        assert!(!s.is_over());
        assert_eq!(s.turn(), b.id);
    }

    #[test]
    fn declined_rematch_removes_the_session() {
        let hub = Hub::new();
        let (mut a, mut b, game_id) = start_game(&hub, false);
        win_for_first(&hub, &mut a, &mut b, game_id);

        hub.handle(a.id, ClientMessage::PlayAgainRequest { game_id });
        b.drain();
        hub.handle(b.id, ClientMessage::PlayAgainResponse { game_id, accepted: false });
        assert_eq!(a.game_messages(), vec![ServerMessage::PlayAgainDeclined { game_id }]);
        assert!(hub.sessions.get(game_id).is_none());
    }

    #[test]
    fn rematch_with_absent_opponent_tells_requester() {
        let hub = Hub::new();
        let (mut a, mut b, game_id) = start_game(&hub, false);
        win_for_first(&hub, &mut a, &mut b, game_id);
        hub.disconnect(b.conn);
        a.drain();

        hub.handle(a.id, ClientMessage::PlayAgainRequest { game_id });
        assert_eq!(a.game_messages(), vec![ServerMessage::OpponentDisconnected { game_id }]);
        assert_eq!(hub.sessions.get(game_id).unwrap().lock().pending(), None);
    }

    #[test]
    fn disconnect_then_reconnect_with_same_id_resumes() {
        let hub = Hub::new();
        let (mut a, b, game_id) = start_game(&hub, true);
        play(&hub, &a, game_id, 312);
        play(&hub, &b, game_id, 313);
        a.drain();

        hub.disconnect(b.conn);
        assert_eq!(a.game_messages(), vec![ServerMessage::OpponentDisconnected { game_id }]);
        assert_eq!(hub.sessions.get(game_id).unwrap().lock().disconnected_player(), Some(b.id));

        let mut b2 = Client::connect_as(&hub, Some(b.id));
        assert_eq!(b2.id, b.id);
        assert_eq!(a.game_messages(), vec![ServerMessage::OpponentReconnected { game_id }]);

        let msgs = b2.game_messages();
        assert_eq!(msgs[0], ServerMessage::YourId { id: b.id });
        match &msgs[1] {
            ServerMessage::GameStart { is_my_turn, player_index, board: Some(board), block_win_if_two_ends, opponent_id, .. } => {
                assert!(!is_my_turn);
                assert_eq!(*player_index, 1);
                assert!(*block_win_if_two_ends);
                assert_eq!(*opponent_id, a.id);
                assert_eq!(board.get(312), Some(Seat::First));
                assert_eq!(board.get(313), Some(Seat::Second));
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
        assert_eq!(hub.sessions.get(game_id).unwrap().lock().disconnected_player(), None);
    }

    #[test]
    fn presented_id_of_a_stranger_is_not_reused() {
        let hub = Hub::new();
        let stranger = PlayerId::new();
        let c = Client::connect_as(&hub, Some(stranger));
        assert_ne!(c.id, stranger);

        let (a, _b, _) = start_game(&hub, false);
        let dup = Client::connect_as(&hub, Some(a.id));
        assert_ne!(dup.id, a.id);
    }

    #[test]
    fn leaving_marks_player_disconnected_and_reconnect_message_restores() {
        let hub = Hub::new();
        let (mut a, mut b, game_id) = start_game(&hub, false);

        hub.handle(a.id, ClientMessage::PlayerLeavingGame { game_id });
        assert_eq!(b.game_messages(), vec![ServerMessage::OpponentDisconnected { game_id }]);
        let row = hub.player_list().into_iter().find(|r| r.id == a.id).unwrap();
        assert_eq!(row.disconnected, Some(true));

        hub.handle(a.id, ClientMessage::ReconnectToGame { game_id });
        assert_eq!(b.game_messages(), vec![ServerMessage::OpponentReconnected { game_id }]);
        assert!(matches!(
            a.game_messages().as_slice(),
            [ServerMessage::GameStart { is_my_turn: true, player_index: 0, board: Some(_), .. }]
        ));
    }

    #[test]
    fn both_players_can_start_new_games_after_one_leaves() {
        let hub = Hub::new();
        let (a, mut b, old_game) = start_game(&hub, false);
        hub.handle(a.id, ClientMessage::PlayerLeavingGame { game_id: old_game });

        let mut c = Client::connect(&hub);
        let mut d = Client::connect(&hub);
        b.drain();
        c.drain();

        hub.handle(b.id, ClientMessage::InviteAccepted { from: c.id, block_win_if_two_ends: false });
        let c_id = c.id;
        assert!(b.game_messages().iter().any(|m| matches!(
            m,
            ServerMessage::GameStart { opponent_id, player_index: 1, .. } if *opponent_id == c_id
        )));
        assert!(hub.sessions.get(old_game).is_none());

        d.drain();
        hub.handle(a.id, ClientMessage::InviteAccepted { from: d.id, block_win_if_two_ends: false });
        assert!(d.game_messages().iter().any(|m| matches!(m, ServerMessage::GameStart { player_index: 0, .. })));
        assert_eq!(hub.sessions.len(), 2);

        let row = hub.player_list().into_iter().find(|r| r.id == b.id).unwrap();
        assert_eq!(row.opponent_id, Some(c.id));
    }

    #[test]
    fn chat_and_emoji_reach_only_the_opponent() {
        let hub = Hub::new();
        let (mut a, mut b, game_id) = start_game(&hub, false);
        let mut outsider = Client::connect(&hub);
        a.drain();
        b.drain();
        outsider.drain();

        hub.handle(a.id, ClientMessage::ChatMessage { game_id, text: "gl hf".into() });
        hub.handle(b.id, ClientMessage::SendEmoji { game_id, emoji: "🎉".into() });
        assert_eq!(b.game_messages(), vec![ServerMessage::ChatMessage { game_id, text: "gl hf".into() }]);
        assert_eq!(a.game_messages(), vec![ServerMessage::SendEmoji { game_id, emoji: "🎉".into() }]);

        hub.handle(outsider.id, ClientMessage::ChatMessage { game_id, text: "hi".into() });
        assert!(a.game_messages().is_empty());
        assert!(b.game_messages().is_empty());
        assert!(outsider.game_messages().is_empty());
    }

    #[test]
    fn unknown_messages_are_ignored() {
        let hub = Hub::new();
        let mut a = Client::connect(&hub);
        a.drain();
        hub.handle(a.id, ClientMessage::Unknown);
        assert!(a.drain().is_empty());
    }

    #[test]
    fn abandoned_sessions_are_evicted() {
        let hub = Hub::new();
        let (a, b, game_id) = start_game(&hub, false);
        assert!(hub.evict_idle(Duration::ZERO).is_empty());

        hub.disconnect(a.conn);
        hub.disconnect(b.conn);
        assert_eq!(hub.evict_idle(Duration::ZERO), vec![game_id]);
        assert!(hub.sessions.is_empty());
    }
}
