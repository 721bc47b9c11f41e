// pong_protocol: wire types shared by the pong server and its clients.
//
// This crate defines what travels over HTTP between a browser (or the
// headless `pong-bot`) and the stateless request handler in `pong_server`,
// plus the table geometry and rules both peers simulate against. It has no
// networking and no storage of its own.
//
// Module overview:
// - `types.rs`:    `PlayerSlot`, player one (authoritative) or player two.
// - `session.rs`:  `Session`, the stored match state, and `SessionPatch`,
//                  the sparse body of an `update`.
// - `message.rs`:  `Action` tokens, request bodies, and reply bodies.
// - `rules.rs`:    Table size, paddle and ball geometry, serve velocity,
//                  speed-up factor, winning score, countdown length, tick.
//
// Design decisions:
// - **JSON with camelCase keys.** The browser client reads and writes these
//   bodies directly, so field names follow JavaScript conventions.
// - **One winning score.** `WINNING_SCORE` lives here so the server and both
//   clients cannot disagree about when a match ends.

pub mod message;
pub mod rules;
pub mod session;
pub mod types;

pub use message::{
    Ack, Action, CreateReply, ErrorReply, JoinReply, SessionRef, StateReply, UpdateRequest,
};
pub use session::{Session, SessionPatch};
pub use types::PlayerSlot;
