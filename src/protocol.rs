//! Wire messages. Every frame is a JSON object with a `type` discriminator
//! and camelCase fields.

use serde::{Deserialize, Serialize};

use crate::game::Board;
use crate::util::id::{GameId, PlayerId};

/// Messages a client may send. Kinds the server does not know decode to
/// `Unknown` so they can be logged and skipped instead of failing the frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Invite {
        opponent_id: PlayerId,
        #[serde(default)]
        block_win_if_two_ends: bool,
    },
    /// `from` is the inviter whose invitation is being accepted.
    #[serde(rename_all = "camelCase")]
    InviteAccepted {
        from: PlayerId,
        #[serde(default)]
        block_win_if_two_ends: bool,
    },
    InviteDeclined {
        from: PlayerId,
    },
    #[serde(rename_all = "camelCase")]
    MakeMove { game_id: GameId, index: usize },
    #[serde(rename_all = "camelCase")]
    RequestUndo { game_id: GameId },
    #[serde(rename_all = "camelCase")]
    UndoResponse { game_id: GameId, accepted: bool },
    #[serde(rename_all = "camelCase")]
    PlayAgainRequest { game_id: GameId },
    #[serde(rename_all = "camelCase")]
    PlayAgainResponse { game_id: GameId, accepted: bool },
    #[serde(rename_all = "camelCase")]
    RequestYieldTurn { game_id: GameId },
    #[serde(rename_all = "camelCase")]
    YieldTurnResponse { game_id: GameId, accepted: bool },
    #[serde(rename_all = "camelCase")]
    ReconnectToGame { game_id: GameId },
    #[serde(rename_all = "camelCase")]
    PlayerLeavingGame { game_id: GameId },
    #[serde(rename_all = "camelCase")]
    ChatMessage { game_id: GameId, text: String },
    #[serde(rename_all = "camelCase")]
    SendEmoji { game_id: GameId, emoji: String },
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Invite { .. } => "invite",
            ClientMessage::InviteAccepted { .. } => "invite_accepted",
            ClientMessage::InviteDeclined { .. } => "invite_declined",
            ClientMessage::MakeMove { .. } => "make_move",
            ClientMessage::RequestUndo { .. } => "request_undo",
            ClientMessage::UndoResponse { .. } => "undo_response",
            ClientMessage::PlayAgainRequest { .. } => "play_again_request",
            ClientMessage::PlayAgainResponse { .. } => "play_again_response",
            ClientMessage::RequestYieldTurn { .. } => "request_yield_turn",
            ClientMessage::YieldTurnResponse { .. } => "yield_turn_response",
            ClientMessage::ReconnectToGame { .. } => "reconnect_to_game",
            ClientMessage::PlayerLeavingGame { .. } => "player_leaving_game",
            ClientMessage::ChatMessage { .. } => "chat_message",
            ClientMessage::SendEmoji { .. } => "send_emoji",
            ClientMessage::Unknown => "unknown",
        }
    }
}

/// Game result as seen by the receiving player. Serialized as `"me"` or
/// `"opponent"`; a draw is `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WinnerView {
    Me,
    Opponent,
}

/// One row of the presence list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub id: PlayerId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<GameId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opponent_id: Option<PlayerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disconnected: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    YourId {
        id: PlayerId,
    },
    PlayerList {
        players: Vec<PlayerSummary>,
    },
    #[serde(rename_all = "camelCase")]
    GameInvite {
        from: PlayerId,
        block_win_if_two_ends: bool,
    },
    InviteDeclined {
        from: PlayerId,
    },
    /// Sent when a match starts, and as a resume snapshot (with `board`) when
    /// a player rejoins.
    #[serde(rename_all = "camelCase")]
    GameStart {
        game_id: GameId,
        opponent_id: PlayerId,
        block_win_if_two_ends: bool,
        is_my_turn: bool,
        player_index: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        board: Option<Board>,
    },
    #[serde(rename_all = "camelCase")]
    MoveMade {
        game_id: GameId,
        board: Board,
        next_turn: PlayerId,
        index: usize,
    },
    #[serde(rename_all = "camelCase")]
    GameOver {
        game_id: GameId,
        board: Board,
        winner: Option<WinnerView>,
    },
    #[serde(rename_all = "camelCase")]
    UndoInvite { game_id: GameId, from: PlayerId },
    #[serde(rename_all = "camelCase")]
    MoveUndone {
        game_id: GameId,
        board: Board,
        next_turn: PlayerId,
    },
    #[serde(rename_all = "camelCase")]
    UndoDeclined { game_id: GameId },
    #[serde(rename_all = "camelCase")]
    YieldTurnInvite { game_id: GameId, from: PlayerId },
    #[serde(rename_all = "camelCase")]
    TurnYielded { game_id: GameId, is_my_turn: bool },
    #[serde(rename_all = "camelCase")]
    YieldTurnDeclined { game_id: GameId },
    #[serde(rename_all = "camelCase")]
    PlayAgainInvite { game_id: GameId, from: PlayerId },
    #[serde(rename_all = "camelCase")]
    GameReset {
        game_id: GameId,
        is_my_turn: bool,
        player_index: usize,
    },
    #[serde(rename_all = "camelCase")]
    PlayAgainDeclined { game_id: GameId },
    #[serde(rename_all = "camelCase")]
    OpponentDisconnected { game_id: GameId },
    #[serde(rename_all = "camelCase")]
    OpponentReconnected { game_id: GameId },
    #[serde(rename_all = "camelCase")]
    ChatMessage { game_id: GameId, text: String },
    #[serde(rename_all = "camelCase")]
    SendEmoji { game_id: GameId, emoji: String },
    Error {
        message: String,
    },
}
