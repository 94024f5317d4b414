//! Relay server for two-player five-in-a-row on a 25x25 board.

pub mod config;
pub mod game;
pub mod http;
pub mod hub;
pub mod protocol;
pub mod telemetry;
pub mod util;
pub mod ws;
