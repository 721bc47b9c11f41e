// pong_client: a headless pong peer.
//
// Plays one side of a match against a `pong_server` handler using the same
// protocol as the browser page: fixed-rate physics/publish and poll/reconcile
// timers, with player one authoritative for the ball.
//
// Module overview:
// - `game.rs`:    `ClientGame`, the owned per-peer match state: phases,
//                 physics, outgoing patches, reconciliation with polled state.
// - `client.rs`:  `ApiClient`, blocking HTTP calls for the six actions.
// - `runner.rs`:  `MatchRunner`, the two-timer loop and `PaddleBrain`.
//
// The `pong-bot` binary (`main.rs`) wraps `MatchRunner` for the command line;
// `multiplayer_tests` pits two runners against a real server.

pub mod client;
pub mod game;
pub mod runner;

pub use client::{ApiClient, ClientError};
pub use game::{ClientGame, ClientPhase, GameEvent};
pub use runner::{MatchReport, MatchRunner, PaddleBrain, RunnerOptions};
